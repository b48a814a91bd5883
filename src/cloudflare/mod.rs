// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cloudflare side of the controller: REST client, tunnel publishing, and
//! DNS convergence.

pub mod bootstrap;
pub mod client;
pub mod dns;
pub mod retry;
pub mod tunnel;
pub mod types;

pub use bootstrap::{resolve_or_create_tunnel, TunnelIdentity};
pub use client::CloudflareApi;
pub use tunnel::{CloudflareTunnelClient, TunnelClient};
