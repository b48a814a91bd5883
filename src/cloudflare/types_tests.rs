// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the Cloudflare wire types.

use super::*;

#[test]
fn test_envelope_deserializes_success_response() {
    let body = r#"{
        "success": true,
        "errors": [],
        "result": [{"id": "abc", "name": "example.com"}],
        "result_info": {"page": 1, "per_page": 100, "total_pages": 1, "count": 1}
    }"#;

    let envelope: Envelope<Vec<Zone>> = serde_json::from_str(body).unwrap();
    assert!(envelope.success);
    assert_eq!(
        envelope.result.unwrap(),
        vec![Zone {
            id: "abc".to_string(),
            name: "example.com".to_string(),
        }]
    );
    let info = envelope.result_info.unwrap();
    assert_eq!(info.page, 1);
    assert_eq!(info.total_pages, 1);
}

#[test]
fn test_envelope_deserializes_error_response() {
    let body = r#"{
        "success": false,
        "errors": [{"code": 10000, "message": "Authentication error"}],
        "result": null
    }"#;

    let envelope: Envelope<Vec<Zone>> = serde_json::from_str(body).unwrap();
    assert!(!envelope.success);
    assert!(envelope.result.is_none());
    assert_eq!(envelope.errors.len(), 1);
    assert_eq!(envelope.errors[0].code, 10000);
    assert_eq!(
        envelope.errors[0].to_string(),
        "Authentication error (code 10000)"
    );
}

#[test]
fn test_dns_record_deserializes_with_optional_fields_absent() {
    let body = r#"{"id": "r1", "type": "CNAME", "name": "test.example.com", "content": "x.cfargotunnel.com"}"#;
    let record: DnsRecord = serde_json::from_str(body).unwrap();
    assert_eq!(record.record_type, "CNAME");
    assert!(record.proxied.is_none());
    assert!(record.comment.is_none());
}

#[test]
fn test_ingress_rule_serializes_in_api_casing() {
    let rule = IngressRule {
        hostname: Some("test.example.com".to_string()),
        path: Some("/api".to_string()),
        service: "https://web.default.svc.cluster.local:443".to_string(),
        origin_request: Some(OriginRequestConfig {
            no_tls_verify: Some(true),
            http_host_header: Some("internal.example.com".to_string()),
            tls_timeout: Some(30),
            ..Default::default()
        }),
    };

    let json = serde_json::to_value(&rule).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "hostname": "test.example.com",
            "path": "/api",
            "service": "https://web.default.svc.cluster.local:443",
            "originRequest": {
                "noTLSVerify": true,
                "httpHostHeader": "internal.example.com",
                "tlsTimeout": 30
            }
        })
    );
}

#[test]
fn test_terminal_rule_serializes_service_only() {
    let rule = IngressRule {
        service: "http_status:404".to_string(),
        ..Default::default()
    };

    let json = serde_json::to_value(&rule).unwrap();
    assert_eq!(json, serde_json::json!({"service": "http_status:404"}));
}

#[test]
fn test_empty_origin_request_config_is_detected() {
    assert!(OriginRequestConfig::default().is_empty());
    assert!(!OriginRequestConfig {
        no_tls_verify: Some(false),
        ..Default::default()
    }
    .is_empty());
}
