// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Well-known annotations understood on claimed Ingresses.
//!
//! All keys live under the `cloudflare-tunnel-ingress-controller.strrl.dev/`
//! base. They tune how cloudflared dials the origin for every path produced
//! from the annotated Ingress. Absent annotations leave the corresponding
//! origin-request field at the server default.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Annotation key for `proxy-ssl-verify`, available values `"on"` or `"off"`.
pub const ANNOTATION_PROXY_SSL_VERIFY: &str =
    "cloudflare-tunnel-ingress-controller.strrl.dev/proxy-ssl-verify";

/// Annotation key for the origin scheme, available values `"http"` or `"https"`.
pub const ANNOTATION_BACKEND_PROTOCOL: &str =
    "cloudflare-tunnel-ingress-controller.strrl.dev/backend-protocol";

/// Annotation key overriding the HTTP `Host` header sent to the origin.
pub const ANNOTATION_HTTP_HOST_HEADER: &str =
    "cloudflare-tunnel-ingress-controller.strrl.dev/http-host-header";

/// Annotation key for the hostname expected on the origin server certificate.
pub const ANNOTATION_ORIGIN_SERVER_NAME: &str =
    "cloudflare-tunnel-ingress-controller.strrl.dev/origin-server-name";

/// Annotation key for the path to a CA pool validating the origin certificate.
pub const ANNOTATION_ORIGIN_CA_POOL: &str =
    "cloudflare-tunnel-ingress-controller.strrl.dev/origin-capool";

/// Annotation key for the origin TLS handshake timeout, a Go-style duration.
pub const ANNOTATION_ORIGIN_TLS_TIMEOUT: &str =
    "cloudflare-tunnel-ingress-controller.strrl.dev/origin-tls-timeout";

const VALUE_ON: &str = "on";
const VALUE_OFF: &str = "off";

/// The scheme cloudflared uses towards the origin service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendProtocol {
    #[default]
    Http,
    Https,
}

impl BackendProtocol {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BackendProtocol::Http => "http",
            BackendProtocol::Https => "https",
        }
    }
}

/// Origin-request options parsed from one Ingress's annotations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OriginRequestOptions {
    pub proxy_ssl_verify: Option<bool>,
    pub http_host_header: Option<String>,
    pub origin_server_name: Option<String>,
    pub ca_pool: Option<String>,
    pub tls_timeout: Option<Duration>,
}

/// Resolve the origin scheme from the `backend-protocol` annotation.
///
/// Missing annotation defaults to `http`. Matching is case-insensitive; any
/// other value is an error attributed to the Ingress.
pub fn backend_protocol(annotations: &BTreeMap<String, String>) -> Result<BackendProtocol> {
    match annotations.get(ANNOTATION_BACKEND_PROTOCOL) {
        None => Ok(BackendProtocol::Http),
        Some(value) => match value.to_lowercase().as_str() {
            "http" => Ok(BackendProtocol::Http),
            "https" => Ok(BackendProtocol::Https),
            other => bail!(
                "invalid value {other:?} for annotation {ANNOTATION_BACKEND_PROTOCOL}, \
                 available values: \"http\" or \"https\""
            ),
        },
    }
}

/// Parse all origin-request annotations into a typed options struct.
///
/// Annotations under other bases are ignored. A present-but-invalid value is
/// an error; the caller logs it with the Ingress identity and skips that
/// Ingress.
pub fn parse_origin_request_options(
    annotations: &BTreeMap<String, String>,
) -> Result<OriginRequestOptions> {
    let mut options = OriginRequestOptions::default();

    for (key, value) in annotations {
        match key.as_str() {
            ANNOTATION_PROXY_SSL_VERIFY => {
                options.proxy_ssl_verify = Some(
                    parse_on_off(value)
                        .with_context(|| format!("parsing annotation value ({key})"))?,
                );
            }
            ANNOTATION_HTTP_HOST_HEADER => {
                options.http_host_header = Some(value.clone());
            }
            ANNOTATION_ORIGIN_SERVER_NAME => {
                options.origin_server_name = Some(value.clone());
            }
            ANNOTATION_ORIGIN_CA_POOL => {
                options.ca_pool = Some(value.clone());
            }
            ANNOTATION_ORIGIN_TLS_TIMEOUT => {
                options.tls_timeout = Some(
                    parse_go_duration(value)
                        .with_context(|| format!("parsing annotation value ({key})"))?,
                );
            }
            _ => {}
        }
    }

    Ok(options)
}

fn parse_on_off(value: &str) -> Result<bool> {
    match value {
        VALUE_ON => Ok(true),
        VALUE_OFF => Ok(false),
        _ => bail!("available values: \"{VALUE_ON}\" or \"{VALUE_OFF}\""),
    }
}

/// Parse a Go-style duration string into a [`Duration`].
///
/// Supported forms:
/// - a bare integer, interpreted as seconds: `"30"`
/// - an integer with an `s`, `m`, or `h` unit: `"30s"`, `"5m"`, `"1h"`
///
/// # Errors
///
/// Returns an error for empty strings, non-numeric values, or unknown units.
pub fn parse_go_duration(value: &str) -> Result<Duration> {
    if value.is_empty() {
        bail!("duration string cannot be empty");
    }

    let split_pos = value
        .chars()
        .position(|c| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split_pos);

    let amount: u64 = digits
        .parse()
        .with_context(|| format!("invalid duration value {value:?}"))?;

    let seconds = match unit {
        "" | "s" => amount,
        "m" => amount * 60,
        "h" => amount * 3600,
        other => bail!("invalid duration unit {other:?}, expected \"s\", \"m\", or \"h\""),
    };

    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
#[path = "annotations_tests.rs"]
mod annotations_tests;
