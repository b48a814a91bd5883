// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Thin REST client for the Cloudflare v4 API.
//!
//! Every list call exhausts pagination before returning: the DNS planner
//! cannot make ownership decisions from a partial view of the zone. Transient
//! failures retry with the policy in [`super::retry`]; anything else surfaces
//! to the caller.

use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::constants::{CLOUDFLARE_API_BASE, CLOUDFLARE_PAGE_SIZE};

use super::retry::{http_backoff, is_retryable_status, is_retryable_transport_error};
use super::types::{
    CreateTunnel, DnsRecord, Envelope, PutTunnelConfiguration, Tunnel, TunnelConfiguration,
    WriteDnsRecord, Zone,
};

/// Bearer-token client for the account-scoped Cloudflare API.
pub struct CloudflareApi {
    http: reqwest::Client,
    base_url: String,
    account_id: String,
}

impl CloudflareApi {
    /// Build a client authenticated with the given API token.
    ///
    /// # Errors
    ///
    /// Returns an error when the token is not a valid header value or the
    /// underlying HTTP client cannot be constructed.
    pub fn new(api_token: &str, account_id: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_token}"))
            .context("cloudflare api token is not a valid header value")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("build cloudflare http client")?;

        Ok(Self {
            http,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            account_id: account_id.to_string(),
        })
    }

    /// List all zones of the account, across all pages.
    pub async fn list_zones(&self) -> Result<Vec<Zone>> {
        self.get_paginated("/zones", &[], "list zones").await
    }

    /// List all records of one type in a zone, across all pages.
    pub async fn list_dns_records(&self, zone_id: &str, record_type: &str) -> Result<Vec<DnsRecord>> {
        self.get_paginated(
            &format!("/zones/{zone_id}/dns_records"),
            &[("type", record_type)],
            "list dns records",
        )
        .await
    }

    /// Create one DNS record in a zone.
    pub async fn create_dns_record(
        &self,
        zone_id: &str,
        record: &WriteDnsRecord,
    ) -> Result<DnsRecord> {
        let url = format!("{}/zones/{zone_id}/dns_records", self.base_url);
        let envelope: Envelope<DnsRecord> = self
            .send(|http| http.post(&url).json(record), "create dns record")
            .await?;
        envelope
            .result
            .context("create dns record response carried no result")
    }

    /// Overwrite one DNS record in a zone.
    pub async fn update_dns_record(
        &self,
        zone_id: &str,
        record_id: &str,
        record: &WriteDnsRecord,
    ) -> Result<DnsRecord> {
        let url = format!("{}/zones/{zone_id}/dns_records/{record_id}", self.base_url);
        let envelope: Envelope<DnsRecord> = self
            .send(|http| http.put(&url).json(record), "update dns record")
            .await?;
        envelope
            .result
            .context("update dns record response carried no result")
    }

    /// Delete one DNS record from a zone.
    pub async fn delete_dns_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        let url = format!("{}/zones/{zone_id}/dns_records/{record_id}", self.base_url);
        let _: Envelope<serde_json::Value> = self
            .send(|http| http.delete(&url), "delete dns record")
            .await?;
        Ok(())
    }

    /// Replace the tunnel's remote configuration in one idempotent call.
    pub async fn update_tunnel_configuration(
        &self,
        tunnel_id: &str,
        config: TunnelConfiguration,
    ) -> Result<()> {
        let url = format!(
            "{}/accounts/{}/cfd_tunnel/{tunnel_id}/configurations",
            self.base_url, self.account_id
        );
        let body = PutTunnelConfiguration { config };
        let _: Envelope<serde_json::Value> = self
            .send(|http| http.put(&url).json(&body), "update tunnel configuration")
            .await?;
        Ok(())
    }

    /// Fetch the connector token for a tunnel.
    pub async fn get_tunnel_token(&self, tunnel_id: &str) -> Result<String> {
        let url = format!(
            "{}/accounts/{}/cfd_tunnel/{tunnel_id}/token",
            self.base_url, self.account_id
        );
        let envelope: Envelope<String> = self
            .send(|http| http.get(&url), "get tunnel token")
            .await?;
        envelope
            .result
            .context("tunnel token response carried no result")
    }

    /// List non-deleted tunnels matching a name, across all pages.
    pub async fn list_tunnels_by_name(&self, name: &str) -> Result<Vec<Tunnel>> {
        self.get_paginated(
            &format!("/accounts/{}/cfd_tunnel", self.account_id),
            &[("name", name), ("is_deleted", "false")],
            "list tunnels",
        )
        .await
    }

    /// Create a named tunnel with a Cloudflare-managed configuration source.
    pub async fn create_tunnel(&self, name: &str) -> Result<Tunnel> {
        let url = format!("{}/accounts/{}/cfd_tunnel", self.base_url, self.account_id);
        let body = CreateTunnel {
            name,
            config_src: "cloudflare",
        };
        let envelope: Envelope<Tunnel> = self
            .send(|http| http.post(&url).json(&body), "create tunnel")
            .await?;
        envelope
            .result
            .context("create tunnel response carried no result")
    }

    /// Fetch every page of a list endpoint and concatenate the results.
    async fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        operation: &str,
    ) -> Result<Vec<T>> {
        let url = format!("{}{}", self.base_url, path);
        let per_page = CLOUDFLARE_PAGE_SIZE.to_string();

        let mut all_items = Vec::new();
        let mut page: u32 = 1;

        loop {
            let page_string = page.to_string();
            let envelope: Envelope<Vec<T>> = self
                .send(
                    |http| {
                        http.get(&url)
                            .query(query)
                            .query(&[("page", page_string.as_str()), ("per_page", per_page.as_str())])
                    },
                    operation,
                )
                .await?;

            if let Some(items) = envelope.result {
                all_items.extend(items);
            }

            let total_pages = envelope
                .result_info
                .as_ref()
                .map_or(1, |info| info.total_pages.max(1));
            debug!(operation, page, total_pages, total_items = all_items.len(), "fetched page");

            if page >= total_pages {
                break;
            }
            page += 1;
        }

        Ok(all_items)
    }

    /// Send one request with transient-error retry, returning the parsed
    /// envelope of a successful call.
    async fn send<T, F>(&self, build_request: F, operation: &str) -> Result<Envelope<T>>
    where
        T: DeserializeOwned,
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut backoff = http_backoff();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let outcome = build_request(&self.http).send().await;
            let retry_reason = match outcome {
                Ok(response) if is_retryable_status(response.status()) => {
                    format!("transient status {}", response.status())
                }
                Ok(response) => {
                    let status = response.status();
                    let envelope: Envelope<T> = response
                        .json()
                        .await
                        .with_context(|| format!("{operation}: parse response (status {status})"))?;
                    if !envelope.success {
                        let messages: Vec<String> =
                            envelope.errors.iter().map(ToString::to_string).collect();
                        bail!("{operation} failed: {}", messages.join("; "));
                    }
                    return Ok(envelope);
                }
                Err(err) if is_retryable_transport_error(&err) => {
                    format!("transport error: {err}")
                }
                Err(err) => {
                    return Err(anyhow::Error::new(err).context(format!("{operation} request failed")))
                }
            };

            let Some(delay) = backoff.next_backoff() else {
                bail!("{operation}: retries exhausted after {attempt} attempts ({retry_reason})");
            };
            warn!(
                operation,
                attempt,
                retry_after = ?delay,
                reason = %retry_reason,
                "retryable cloudflare api error, will retry"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
