// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Core domain model: the [`Exposure`] value type and [`Domain`] suffix matching.
//!
//! An `Exposure` is the canonical internal representation of one routable path:
//! a public hostname plus path prefix mapped to an in-cluster origin URL. The
//! tunnel rule table and the DNS record set are both projections of one
//! exposure list; neither holds a reference to the other.

use std::time::Duration;

/// The minimal information for exposing one service path through the tunnel.
///
/// Exposures compare by value: a second transform of the same Ingress must
/// produce an identical list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Exposure {
    /// The fully qualified domain name to expose, e.g. `hello.strrl.dev`.
    pub hostname: String,
    /// The URL of the origin service, e.g. `http://web.default.svc.cluster.local:8080`.
    pub service_target: String,
    /// The path prefix routed to the origin, e.g. `/hello`. May be empty or `/`.
    pub path_prefix: String,
    /// Set when the owning Ingress is being torn down. A deleted exposure must
    /// not appear in any remote state.
    pub is_deleted: bool,
    /// Whether cloudflared should verify the origin TLS certificate, from the
    /// `proxy-ssl-verify` annotation.
    pub proxy_ssl_verify_enabled: Option<bool>,
    /// Overrides the HTTP `Host` header sent to the origin.
    pub http_host_header: Option<String>,
    /// The hostname expected on the origin server certificate (SNI).
    pub origin_server_name: Option<String>,
    /// Filesystem path to a CA pool for validating the origin certificate.
    pub ca_pool: Option<String>,
    /// Timeout for completing a TLS handshake to the origin.
    pub tls_timeout: Option<Duration>,
    /// Effective "skip TLS verification" setting pushed to the edge. Derived
    /// by the transformer; `https` origins without `proxy-ssl-verify` default
    /// to `Some(true)`.
    pub no_tls_verify: Option<bool>,
}

/// A hostname treated as a sequence of DNS labels.
///
/// Used to bucket exposure hostnames into the Cloudflare zone they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    name: String,
}

impl Domain {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The raw hostname this domain was constructed from.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true when `self` is a strict subdomain of `target`.
    ///
    /// The comparison is a case-insensitive label-suffix match, and `self`
    /// must have strictly more labels than `target`: `example.com` is not a
    /// subdomain of itself. Callers that also want to accept the
    /// hostname-equals-zone case test equality separately.
    #[must_use]
    pub fn is_subdomain_of(&self, target: &Domain) -> bool {
        let current: Vec<String> = self
            .name
            .to_lowercase()
            .split('.')
            .map(str::to_owned)
            .collect();
        let target: Vec<String> = target
            .name
            .to_lowercase()
            .split('.')
            .map(str::to_owned)
            .collect();

        if current.len() <= target.len() {
            return false;
        }

        current
            .iter()
            .rev()
            .zip(target.iter().rev())
            .all(|(a, b)| a == b)
    }
}

impl From<&str> for Domain {
    fn from(name: &str) -> Self {
        Domain::new(name)
    }
}

#[cfg(test)]
#[path = "exposure_tests.rs"]
mod exposure_tests;
