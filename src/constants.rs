// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the tunnel ingress controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance. The wire-format constants
//! (tunnel domain suffix, ownership marker shapes, connector command) are compatibility
//! sensitive: other deployments of this controller recognize ownership through them.

// ============================================================================
// Controller Identity
// ============================================================================

/// Identifier recorded inside every ownership marker written by this controller.
pub const CONTROLLER_IDENTIFIER: &str = "strrl.dev/cloudflare-tunnel-ingress-controller";

/// Default ingress class name claimed via the well-known annotation.
pub const DEFAULT_INGRESS_CLASS: &str = "cloudflare-tunnel";

/// Default `IngressClass.spec.controller` value claimed by this controller.
pub const DEFAULT_CONTROLLER_CLASS: &str = "strrl.dev/cloudflare-tunnel-ingress-controller";

// ============================================================================
// Cloudflare API Constants
// ============================================================================

/// Base URL of the Cloudflare v4 REST API.
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Suffix appended to a lowercased tunnel id to form the CNAME target of
/// every managed hostname.
pub const TUNNEL_DOMAIN_SUFFIX: &str = "cfargotunnel.com";

/// Name prefix of the TXT records that carry ownership markers. The full
/// record name is `_ctic_managed.<hostname>`.
pub const MANAGED_TXT_PREFIX: &str = "_ctic_managed";

/// Terminal catch-all service appended to every published rule list.
pub const DEFAULT_404_SERVICE: &str = "http_status:404";

/// TTL for managed DNS records. `1` means "automatic" on Cloudflare.
pub const MANAGED_RECORD_TTL: u32 = 1;

/// Page size for paginated Cloudflare list calls.
pub const CLOUDFLARE_PAGE_SIZE: u32 = 100;

/// Cloudflare Free plan limit for DNS record comments, in characters.
/// Pro/Business/Enterprise plans allow up to 500.
pub const DNS_COMMENT_FREE_PLAN_LIMIT: usize = 100;

// ============================================================================
// Connector Constants
// ============================================================================

/// Name of the managed cloudflared connector Deployment.
pub const CONNECTOR_NAME: &str = "controlled-cloudflared-connector";

/// Default cloudflared container image.
pub const DEFAULT_CLOUDFLARED_IMAGE: &str = "cloudflare/cloudflared:latest";

/// Default image pull policy for the connector container.
pub const DEFAULT_CLOUDFLARED_PULL_POLICY: &str = "IfNotPresent";

/// Default cloudflared transport protocol.
pub const DEFAULT_CLOUDFLARED_PROTOCOL: &str = "auto";

/// Metrics endpoint cloudflared is instructed to serve on.
pub const CONNECTOR_METRICS_ADDRESS: &str = "0.0.0.0:44483";

/// Interval between connector convergence passes.
pub const CONNECTOR_SYNC_INTERVAL_SECS: u64 = 10;

// ============================================================================
// Kubernetes Constants
// ============================================================================

/// Default in-cluster DNS domain used when building Service origin targets.
pub const DEFAULT_CLUSTER_DOMAIN: &str = "cluster.local";

/// Page size for Kubernetes API list operations.
///
/// Limits each list response to 100 items so that memory usage stays flat
/// when a cluster carries a large number of Ingresses.
pub const KUBE_LIST_PAGE_SIZE: u32 = 100;

// ============================================================================
// Controller Error Handling Constants
// ============================================================================

/// Requeue duration after a failed reconcile (30 seconds).
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Resync interval after a successful reconcile (5 minutes).
pub const RESYNC_DURATION_SECS: u64 = 300;

// ============================================================================
// Leader Election Constants
// ============================================================================

/// Default leader election lease duration (15 seconds).
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 15;

/// Default leader election retry period (2 seconds).
pub const DEFAULT_LEASE_RETRY_PERIOD_SECS: u64 = 2;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for the Tokio runtime.
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for the Prometheus metrics HTTP server.
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for the Prometheus metrics endpoint.
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for the metrics HTTP server.
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
