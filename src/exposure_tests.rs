// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the exposure domain model.

use super::*;

// ============================================================================
// Domain Suffix Matching
// ============================================================================

#[test]
fn test_subdomain_of_parent_zone() {
    let host = Domain::new("dash.strrl.cloud");
    let zone = Domain::new("strrl.cloud");
    assert!(host.is_subdomain_of(&zone));
}

#[test]
fn test_deep_subdomain_of_parent_zone() {
    let host = Domain::new("a.b.c.example.com");
    let zone = Domain::new("example.com");
    assert!(host.is_subdomain_of(&zone));
}

#[test]
fn test_equal_domains_are_not_subdomains() {
    let host = Domain::new("example.com");
    let zone = Domain::new("example.com");
    assert!(!host.is_subdomain_of(&zone));
}

#[test]
fn test_suffix_match_is_per_label() {
    // "notexample.com" shares a string suffix with "example.com" but is not
    // a subdomain of it.
    let host = Domain::new("foo.notexample.com");
    let zone = Domain::new("example.com");
    assert!(!host.is_subdomain_of(&zone));
}

#[test]
fn test_unrelated_domains() {
    let host = Domain::new("test.example.com");
    let zone = Domain::new("example.org");
    assert!(!host.is_subdomain_of(&zone));
}

#[test]
fn test_parent_is_not_subdomain_of_child() {
    let host = Domain::new("example.com");
    let zone = Domain::new("test.example.com");
    assert!(!host.is_subdomain_of(&zone));
}

#[test]
fn test_matching_is_case_insensitive() {
    let host = Domain::new("Test.Example.COM");
    let zone = Domain::new("example.com");
    assert!(host.is_subdomain_of(&zone));

    let host = Domain::new("test.example.com");
    let zone = Domain::new("EXAMPLE.com");
    assert!(host.is_subdomain_of(&zone));
}

// ============================================================================
// Exposure Value Semantics
// ============================================================================

#[test]
fn test_exposures_compare_by_value() {
    let make = || Exposure {
        hostname: "test.example.com".to_string(),
        service_target: "http://10.0.0.1:233".to_string(),
        path_prefix: "/".to_string(),
        is_deleted: false,
        no_tls_verify: Some(true),
        ..Default::default()
    };

    assert_eq!(make(), make());

    let mut other = make();
    other.path_prefix = "/api".to_string();
    assert_ne!(make(), other);
}

#[test]
fn test_exposure_default_has_no_origin_options() {
    let exposure = Exposure::default();
    assert!(exposure.proxy_ssl_verify_enabled.is_none());
    assert!(exposure.http_host_header.is_none());
    assert!(exposure.origin_server_name.is_none());
    assert!(exposure.ca_pool.is_none());
    assert!(exposure.tls_timeout.is_none());
    assert!(exposure.no_tls_verify.is_none());
}
