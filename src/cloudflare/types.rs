// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Wire types for the Cloudflare v4 REST API.
//!
//! Only the fields this controller reads or writes are modeled. Field names
//! follow the API's JSON casing via serde renames.

use serde::{Deserialize, Serialize};

/// The standard Cloudflare v4 response envelope.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiError>,
    pub result: Option<T>,
    pub result_info: Option<ResultInfo>,
}

/// One error entry from a failed API call.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub code: i64,
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// Pagination metadata attached to list responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultInfo {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
}

/// A DNS zone owned by the account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
}

/// A DNS record as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct DnsRecord {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub proxied: Option<bool>,
    #[serde(default)]
    pub ttl: Option<u32>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Body for DNS record create and update calls.
#[derive(Debug, Clone, Serialize)]
pub struct WriteDnsRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub proxied: bool,
    pub ttl: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A named tunnel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tunnel {
    pub id: String,
    pub name: String,
}

/// Body for the create-tunnel call. An empty secret lets the API generate one.
#[derive(Debug, Serialize)]
pub struct CreateTunnel<'a> {
    pub name: &'a str,
    pub config_src: &'a str,
}

/// The remote tunnel configuration: an ordered rule table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TunnelConfiguration {
    pub ingress: Vec<IngressRule>,
}

/// Body wrapper for the update-tunnel-configuration call.
#[derive(Debug, Serialize)]
pub struct PutTunnelConfiguration {
    pub config: TunnelConfiguration,
}

/// One tunnel routing rule. The terminal catch-all rule carries a service
/// only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct IngressRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub service: String,
    #[serde(rename = "originRequest", skip_serializing_if = "Option::is_none")]
    pub origin_request: Option<OriginRequestConfig>,
}

/// Per-rule origin-request options. Absent fields leave the edge default.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct OriginRequestConfig {
    #[serde(rename = "noTLSVerify", skip_serializing_if = "Option::is_none")]
    pub no_tls_verify: Option<bool>,
    #[serde(rename = "httpHostHeader", skip_serializing_if = "Option::is_none")]
    pub http_host_header: Option<String>,
    #[serde(rename = "originServerName", skip_serializing_if = "Option::is_none")]
    pub origin_server_name: Option<String>,
    #[serde(rename = "caPool", skip_serializing_if = "Option::is_none")]
    pub ca_pool: Option<String>,
    /// TLS handshake timeout towards the origin, in seconds.
    #[serde(rename = "tlsTimeout", skip_serializing_if = "Option::is_none")]
    pub tls_timeout: Option<u64>,
}

impl OriginRequestConfig {
    /// True when every field is unset, meaning the rule can omit the whole
    /// `originRequest` object.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == OriginRequestConfig::default()
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;
