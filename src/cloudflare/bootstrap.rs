// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Startup resolution of the configured tunnel name to a concrete tunnel.
//!
//! The tunnel identity is immutable for the controller's lifetime; failure
//! here is fatal to startup.

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::client::CloudflareApi;

/// The resolved identity of the tunnel this controller converges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelIdentity {
    pub account_id: String,
    pub tunnel_id: String,
    pub tunnel_name: String,
}

/// Resolve the configured tunnel name to its id, creating the tunnel when it
/// does not exist yet.
pub async fn resolve_or_create_tunnel(
    api: &CloudflareApi,
    account_id: &str,
    tunnel_name: &str,
) -> Result<TunnelIdentity> {
    debug!(account_id, tunnel_name, "resolving tunnel id from tunnel name");

    let tunnels = api
        .list_tunnels_by_name(tunnel_name)
        .await
        .context("list cloudflare tunnels")?;

    if let Some(tunnel) = tunnels.into_iter().find(|t| t.name == tunnel_name) {
        info!(tunnel_id = %tunnel.id, tunnel_name, "resolved existing tunnel");
        return Ok(TunnelIdentity {
            account_id: account_id.to_string(),
            tunnel_id: tunnel.id,
            tunnel_name: tunnel_name.to_string(),
        });
    }

    info!(tunnel_name, "tunnel not found, creating it");
    let tunnel = api
        .create_tunnel(tunnel_name)
        .await
        .with_context(|| format!("create tunnel {tunnel_name}"))?;
    info!(tunnel_id = %tunnel.id, tunnel_name, "created tunnel");

    Ok(TunnelIdentity {
        account_id: account_id.to_string(),
        tunnel_id: tunnel.id,
        tunnel_name: tunnel_name.to_string(),
    })
}
