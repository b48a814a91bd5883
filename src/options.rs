// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process configuration.
//!
//! All configuration is resolved once at startup into immutable values;
//! changing any of it requires a restart. Cloudflare credentials and the
//! connector image settings can come from the environment, everything else
//! from flags.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::constants::{
    DEFAULT_CLOUDFLARED_IMAGE, DEFAULT_CLOUDFLARED_PROTOCOL, DEFAULT_CLOUDFLARED_PULL_POLICY,
    DEFAULT_CLUSTER_DOMAIN, DEFAULT_CONTROLLER_CLASS, DEFAULT_INGRESS_CLASS,
};

/// Environment variable overriding the connector image.
pub const ENV_CLOUDFLARED_IMAGE: &str = "CLOUDFLARED_IMAGE";

/// Environment variable overriding the connector image pull policy.
pub const ENV_CLOUDFLARED_PULL_POLICY: &str = "CLOUDFLARED_IMAGE_PULL_POLICY";

/// Environment variable fixing the connector replica count.
pub const ENV_CLOUDFLARED_REPLICA_COUNT: &str = "CLOUDFLARED_REPLICA_COUNT";

/// Command line surface of the controller.
#[derive(Parser, Debug)]
#[command(
    name = "cloudflare-tunnel-ingress-controller",
    about = "Expose Kubernetes Ingresses through a named Cloudflare Tunnel"
)]
pub struct Cli {
    /// Ingress class name claimed via the `kubernetes.io/ingress.class`
    /// annotation.
    #[arg(long, default_value = DEFAULT_INGRESS_CLASS)]
    pub ingress_class: String,

    /// `IngressClass.spec.controller` value claimed by this controller.
    #[arg(long, default_value = DEFAULT_CONTROLLER_CLASS)]
    pub controller_class: String,

    /// Cloudflare API token with Zone:DNS:Edit and Account:Tunnel:Edit.
    #[arg(long, env = "CLOUDFLARE_API_TOKEN", hide_env_values = true)]
    pub cloudflare_api_token: String,

    /// Cloudflare account id owning the tunnel and the zones.
    #[arg(long, env = "CLOUDFLARE_ACCOUNT_ID")]
    pub cloudflare_account_id: String,

    /// Name of the tunnel to publish into; created when it does not exist.
    #[arg(long)]
    pub tunnel_name: String,

    /// Namespace the connector Deployment is managed in.
    #[arg(long, default_value = "default")]
    pub namespace: String,

    /// cloudflared transport protocol (`auto`, `http2`, `quic`).
    #[arg(long, default_value = DEFAULT_CLOUDFLARED_PROTOCOL)]
    pub cloudflared_protocol: String,

    /// Extra cloudflared arguments, comma separated, inserted between
    /// `tunnel` and `--metrics`.
    #[arg(long, value_delimiter = ',')]
    pub cloudflared_extra_args: Vec<String>,

    /// In-cluster DNS domain used for Service origin targets.
    #[arg(long, default_value = DEFAULT_CLUSTER_DOMAIN)]
    pub cluster_domain: String,

    /// Optional template for informational CNAME comments. Placeholders:
    /// `{tunnel_name}`, `{tunnel_id}`, `{hostname}`.
    #[arg(long)]
    pub dns_comment_template: Option<String>,

    /// Path to a JSON file with connector pod-spec overrides.
    #[arg(long)]
    pub cloudflared_config_file: Option<PathBuf>,

    /// Default log filter when `RUST_LOG` is not set.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Connector settings resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorEnv {
    pub image: String,
    pub image_pull_policy: String,
    pub replicas: Option<i32>,
}

/// Resolve the connector environment once at startup.
///
/// # Errors
///
/// Returns an error when `CLOUDFLARED_REPLICA_COUNT` is set but not an
/// integer; this is a startup failure.
pub fn resolve_connector_env() -> Result<ConnectorEnv> {
    Ok(ConnectorEnv {
        image: non_empty_env(ENV_CLOUDFLARED_IMAGE)
            .unwrap_or_else(|| DEFAULT_CLOUDFLARED_IMAGE.to_string()),
        image_pull_policy: non_empty_env(ENV_CLOUDFLARED_PULL_POLICY)
            .unwrap_or_else(|| DEFAULT_CLOUDFLARED_PULL_POLICY.to_string()),
        replicas: parse_replica_count(non_empty_env(ENV_CLOUDFLARED_REPLICA_COUNT))?,
    })
}

/// Parse the configured replica count. Unset or empty means "use the server
/// default".
pub fn parse_replica_count(value: Option<String>) -> Result<Option<i32>> {
    match value {
        None => Ok(None),
        Some(raw) => {
            let replicas = raw
                .parse::<i32>()
                .with_context(|| format!("invalid replica count {raw:?}"))?;
            Ok(Some(replicas))
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod options_tests;
