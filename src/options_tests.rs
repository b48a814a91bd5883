// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for configuration resolution.

use clap::Parser;

use super::*;

#[test]
fn test_cli_defaults() {
    let cli = Cli::parse_from([
        "cloudflare-tunnel-ingress-controller",
        "--cloudflare-api-token",
        "token",
        "--cloudflare-account-id",
        "account",
        "--tunnel-name",
        "my-tunnel",
    ]);

    assert_eq!(cli.ingress_class, "cloudflare-tunnel");
    assert_eq!(
        cli.controller_class,
        "strrl.dev/cloudflare-tunnel-ingress-controller"
    );
    assert_eq!(cli.namespace, "default");
    assert_eq!(cli.cloudflared_protocol, "auto");
    assert_eq!(cli.cluster_domain, "cluster.local");
    assert!(cli.cloudflared_extra_args.is_empty());
    assert!(cli.dns_comment_template.is_none());
    assert!(cli.cloudflared_config_file.is_none());
    assert_eq!(cli.log_level, "info");
}

#[test]
fn test_extra_args_are_comma_separated() {
    let cli = Cli::parse_from([
        "cloudflare-tunnel-ingress-controller",
        "--cloudflare-api-token",
        "token",
        "--cloudflare-account-id",
        "account",
        "--tunnel-name",
        "my-tunnel",
        "--cloudflared-extra-args",
        "--edge-ip-version,6",
    ]);

    assert_eq!(
        cli.cloudflared_extra_args,
        vec!["--edge-ip-version".to_string(), "6".to_string()]
    );
}

#[test]
fn test_parse_replica_count() {
    assert_eq!(parse_replica_count(None).unwrap(), None);
    assert_eq!(parse_replica_count(Some("0".to_string())).unwrap(), Some(0));
    assert_eq!(parse_replica_count(Some("3".to_string())).unwrap(), Some(3));
    assert!(parse_replica_count(Some("many".to_string())).is_err());
}
