// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for annotation parsing.

use std::collections::BTreeMap;
use std::time::Duration;

use super::*;

fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

// ============================================================================
// Backend Protocol
// ============================================================================

#[test]
fn test_backend_protocol_defaults_to_http() {
    let protocol = backend_protocol(&BTreeMap::new()).unwrap();
    assert_eq!(protocol, BackendProtocol::Http);
}

#[test]
fn test_backend_protocol_https() {
    let protocol =
        backend_protocol(&annotations(&[(ANNOTATION_BACKEND_PROTOCOL, "https")])).unwrap();
    assert_eq!(protocol, BackendProtocol::Https);
}

#[test]
fn test_backend_protocol_is_case_insensitive() {
    let protocol =
        backend_protocol(&annotations(&[(ANNOTATION_BACKEND_PROTOCOL, "HTTPS")])).unwrap();
    assert_eq!(protocol, BackendProtocol::Https);

    let protocol =
        backend_protocol(&annotations(&[(ANNOTATION_BACKEND_PROTOCOL, "Http")])).unwrap();
    assert_eq!(protocol, BackendProtocol::Http);
}

#[test]
fn test_backend_protocol_rejects_unknown_value() {
    let result = backend_protocol(&annotations(&[(ANNOTATION_BACKEND_PROTOCOL, "tcp")]));
    assert!(result.is_err());
}

// ============================================================================
// Origin Request Options
// ============================================================================

#[test]
fn test_empty_annotations_produce_defaults() {
    let options = parse_origin_request_options(&BTreeMap::new()).unwrap();
    assert_eq!(options, OriginRequestOptions::default());
}

#[test]
fn test_proxy_ssl_verify_on_and_off() {
    let options =
        parse_origin_request_options(&annotations(&[(ANNOTATION_PROXY_SSL_VERIFY, "on")]))
            .unwrap();
    assert_eq!(options.proxy_ssl_verify, Some(true));

    let options =
        parse_origin_request_options(&annotations(&[(ANNOTATION_PROXY_SSL_VERIFY, "off")]))
            .unwrap();
    assert_eq!(options.proxy_ssl_verify, Some(false));
}

#[test]
fn test_proxy_ssl_verify_rejects_other_values() {
    for value in ["true", "false", "yes", "ON", ""] {
        let result =
            parse_origin_request_options(&annotations(&[(ANNOTATION_PROXY_SSL_VERIFY, value)]));
        assert!(result.is_err(), "value {value:?} should be rejected");
    }
}

#[test]
fn test_string_options_pass_through_verbatim() {
    let options = parse_origin_request_options(&annotations(&[
        (ANNOTATION_HTTP_HOST_HEADER, "internal.example.com"),
        (ANNOTATION_ORIGIN_SERVER_NAME, "origin.example.com"),
        (ANNOTATION_ORIGIN_CA_POOL, "/etc/ssl/origin-pool.pem"),
    ]))
    .unwrap();

    assert_eq!(
        options.http_host_header.as_deref(),
        Some("internal.example.com")
    );
    assert_eq!(
        options.origin_server_name.as_deref(),
        Some("origin.example.com")
    );
    assert_eq!(options.ca_pool.as_deref(), Some("/etc/ssl/origin-pool.pem"));
}

#[test]
fn test_tls_timeout_parsing() {
    let options =
        parse_origin_request_options(&annotations(&[(ANNOTATION_ORIGIN_TLS_TIMEOUT, "30")]))
            .unwrap();
    assert_eq!(options.tls_timeout, Some(Duration::from_secs(30)));

    let options =
        parse_origin_request_options(&annotations(&[(ANNOTATION_ORIGIN_TLS_TIMEOUT, "2m")]))
            .unwrap();
    assert_eq!(options.tls_timeout, Some(Duration::from_secs(120)));
}

#[test]
fn test_tls_timeout_rejects_garbage() {
    for value in ["", "fast", "10x", "s"] {
        let result =
            parse_origin_request_options(&annotations(&[(ANNOTATION_ORIGIN_TLS_TIMEOUT, value)]));
        assert!(result.is_err(), "value {value:?} should be rejected");
    }
}

#[test]
fn test_unrelated_annotations_are_ignored() {
    let options = parse_origin_request_options(&annotations(&[
        ("kubernetes.io/ingress.class", "cloudflare-tunnel"),
        ("example.com/other", "whatever"),
    ]))
    .unwrap();
    assert_eq!(options, OriginRequestOptions::default());
}

// ============================================================================
// Go Duration Parsing
// ============================================================================

#[test]
fn test_parse_go_duration_units() {
    assert_eq!(parse_go_duration("45").unwrap(), Duration::from_secs(45));
    assert_eq!(parse_go_duration("45s").unwrap(), Duration::from_secs(45));
    assert_eq!(parse_go_duration("3m").unwrap(), Duration::from_secs(180));
    assert_eq!(parse_go_duration("1h").unwrap(), Duration::from_secs(3600));
}
