// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The tunnel client: publishes the rule table and converges DNS.
//!
//! `put_exposures` always writes the tunnel configuration before touching
//! DNS, so a hostname becomes routable through the tunnel no later than its
//! public record starts pointing at it.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::constants::{
    DEFAULT_404_SERVICE, DNS_COMMENT_FREE_PLAN_LIMIT, MANAGED_RECORD_TTL, MANAGED_TXT_PREFIX,
};
use crate::exposure::{Domain, Exposure};
use crate::metrics;

use super::client::CloudflareApi;
use super::dns::{
    self, plan_legacy_migration, plan_zone_records, DnsPlan, RECORD_TYPE_CNAME,
};
use super::types::{IngressRule, OriginRequestConfig, TunnelConfiguration, WriteDnsRecord, Zone};

/// Capability surface of the tunnel, substitutable in tests.
#[async_trait]
pub trait TunnelClient: Send + Sync {
    /// Publish the complete exposure set: tunnel rule table first, then DNS.
    async fn put_exposures(&self, exposures: &[Exposure]) -> Result<()>;

    /// The CNAME target public hostnames point at.
    fn tunnel_domain(&self) -> String;

    /// Fetch the connector token for this tunnel.
    async fn fetch_tunnel_token(&self) -> Result<String>;
}

/// Production [`TunnelClient`] backed by the Cloudflare REST API.
pub struct CloudflareTunnelClient {
    api: CloudflareApi,
    tunnel_id: String,
    tunnel_name: String,
    dns_comment_template: Option<String>,
}

impl CloudflareTunnelClient {
    #[must_use]
    pub fn new(
        api: CloudflareApi,
        tunnel_id: impl Into<String>,
        tunnel_name: impl Into<String>,
        dns_comment_template: Option<String>,
    ) -> Self {
        Self {
            api,
            tunnel_id: tunnel_id.into(),
            tunnel_name: tunnel_name.into(),
            dns_comment_template: dns_comment_template.filter(|t| !t.is_empty()),
        }
    }

    async fn update_tunnel_ingress_rules(&self, exposures: &[Exposure]) -> Result<()> {
        let rules = build_ingress_rules(exposures)?;
        debug!(rule_count = rules.len(), "update tunnel configuration");

        self.api
            .update_tunnel_configuration(&self.tunnel_id, TunnelConfiguration { ingress: rules })
            .await
            .context("update tunnel configuration")
    }

    async fn sync_dns(&self, exposures: &[Exposure]) -> Result<()> {
        let zones = self.api.list_zones().await.context("list cloudflare zones")?;
        debug!(zone_count = zones.len(), "listed zones");

        let buckets = group_exposures_by_zone(exposures, &zones)?;

        // One zone failing must not block convergence of the others; failures
        // are collected and surfaced together.
        let mut failures = Vec::new();
        for (zone, items) in buckets {
            if let Err(err) = self.sync_zone(&zone, &items).await {
                error!(zone = %zone.name, error = %format!("{err:#}"), "dns sync failed for zone");
                failures.push(format!("zone {}: {err:#}", zone.name));
            }
        }

        if !failures.is_empty() {
            bail!("dns sync failed for {} zone(s): {}", failures.len(), failures.join("; "));
        }
        Ok(())
    }

    async fn sync_zone(&self, zone: &Zone, exposures: &[Exposure]) -> Result<()> {
        let cname_records = self
            .api
            .list_dns_records(&zone.id, "CNAME")
            .await
            .with_context(|| format!("list CNAME records for zone {}", zone.name))?;

        let managed_prefix = format!("{MANAGED_TXT_PREFIX}.");
        let txt_records: Vec<_> = self
            .api
            .list_dns_records(&zone.id, "TXT")
            .await
            .with_context(|| format!("list TXT records for zone {}", zone.name))?
            .into_iter()
            .filter(|record| record.name.starts_with(&managed_prefix))
            .collect();

        let mut plan = plan_zone_records(
            exposures,
            &cname_records,
            &txt_records,
            &self.tunnel_id,
            &self.tunnel_name,
        );
        plan.to_delete.extend(plan_legacy_migration(
            exposures,
            &cname_records,
            &txt_records,
            &self.tunnel_name,
        ));

        self.execute_plan(zone, plan).await
    }

    async fn execute_plan(&self, zone: &Zone, plan: DnsPlan) -> Result<()> {
        for op in plan.to_create {
            info!(zone = %zone.name, record_type = %op.record_type, name = %op.name, content = %op.content, "create DNS record");
            let record = WriteDnsRecord {
                proxied: op.record_type == RECORD_TYPE_CNAME,
                comment: self.record_comment(&op.record_type, &op.name),
                record_type: op.record_type,
                name: op.name,
                content: op.content,
                ttl: MANAGED_RECORD_TTL,
            };
            self.api
                .create_dns_record(&zone.id, &record)
                .await
                .with_context(|| format!("create DNS record {} in zone {}", record.name, zone.name))?;
            metrics::record_dns_operation("create");
        }

        for op in plan.to_update {
            info!(zone = %zone.name, id = %op.old_record.id, record_type = %op.record_type, name = %op.old_record.name, content = %op.content, "update DNS record");
            let record = WriteDnsRecord {
                proxied: op.record_type == RECORD_TYPE_CNAME,
                comment: self.record_comment(&op.record_type, &op.old_record.name),
                record_type: op.record_type,
                name: op.old_record.name.clone(),
                content: op.content,
                ttl: MANAGED_RECORD_TTL,
            };
            self.api
                .update_dns_record(&zone.id, &op.old_record.id, &record)
                .await
                .with_context(|| format!("update DNS record {} in zone {}", record.name, zone.name))?;
            metrics::record_dns_operation("update");
        }

        for op in plan.to_delete {
            info!(zone = %zone.name, id = %op.old_record.id, record_type = %op.old_record.record_type, name = %op.old_record.name, "delete DNS record");
            self.api
                .delete_dns_record(&zone.id, &op.old_record.id)
                .await
                .with_context(|| format!("delete DNS record {} in zone {}", op.old_record.name, zone.name))?;
            metrics::record_dns_operation("delete");
        }

        Ok(())
    }

    /// Comments are informational only and never consulted for ownership.
    fn record_comment(&self, record_type: &str, hostname: &str) -> Option<String> {
        if record_type != RECORD_TYPE_CNAME {
            return None;
        }
        let template = self.dns_comment_template.as_deref()?;

        let comment = render_comment_template(template, &self.tunnel_name, &self.tunnel_id, hostname);
        if comment.len() > DNS_COMMENT_FREE_PLAN_LIMIT {
            warn!(
                hostname,
                comment_length = comment.len(),
                "rendered DNS comment exceeds the Cloudflare Free plan limit of {DNS_COMMENT_FREE_PLAN_LIMIT} characters; \
                 the API call may fail on plans that do not allow longer comments"
            );
        }
        Some(comment)
    }
}

#[async_trait]
impl TunnelClient for CloudflareTunnelClient {
    async fn put_exposures(&self, exposures: &[Exposure]) -> Result<()> {
        self.update_tunnel_ingress_rules(exposures)
            .await
            .context("update tunnel ingress rules")?;
        self.sync_dns(exposures).await.context("sync DNS records")
    }

    fn tunnel_domain(&self) -> String {
        dns::tunnel_domain(&self.tunnel_id)
    }

    async fn fetch_tunnel_token(&self) -> Result<String> {
        self.api
            .get_tunnel_token(&self.tunnel_id)
            .await
            .context("fetch tunnel token")
    }
}

/// Build the complete ordered rule table for the tunnel.
///
/// Deleted exposures are dropped; the rest are sorted by hostname ascending
/// and path length descending, so the edge's longest-match router sees the
/// longest prefix first. A catch-all `http_status:404` rule terminates the
/// list.
pub fn build_ingress_rules(exposures: &[Exposure]) -> Result<Vec<IngressRule>> {
    let mut rules = exposures
        .iter()
        .filter(|e| !e.is_deleted)
        .map(ingress_rule_from_exposure)
        .collect::<Result<Vec<_>>>()?;

    rules.sort_by(|a, b| {
        let hostname_a = a.hostname.as_deref().unwrap_or_default().to_lowercase();
        let hostname_b = b.hostname.as_deref().unwrap_or_default().to_lowercase();
        hostname_a.cmp(&hostname_b).then_with(|| {
            let path_a = a.path.as_deref().unwrap_or_default().len();
            let path_b = b.path.as_deref().unwrap_or_default().len();
            path_b.cmp(&path_a)
        })
    });

    rules.push(IngressRule {
        service: DEFAULT_404_SERVICE.to_string(),
        ..Default::default()
    });

    Ok(rules)
}

/// Map one effective exposure to a tunnel rule.
///
/// # Errors
///
/// Returns an error for deleted exposures: they must never reach the remote
/// rule table.
pub fn ingress_rule_from_exposure(exposure: &Exposure) -> Result<IngressRule> {
    if exposure.is_deleted {
        bail!(
            "exposure {} is deleted, refusing to generate a tunnel rule for it",
            exposure.hostname
        );
    }

    // An explicit no-tls-verify wins; otherwise it follows proxy-ssl-verify,
    // and https origins without either skip verification entirely.
    let no_tls_verify = exposure.no_tls_verify.or(match exposure.proxy_ssl_verify_enabled {
        Some(enabled) => Some(!enabled),
        None if exposure.service_target.starts_with("https://") => Some(true),
        None => None,
    });

    let origin_request = OriginRequestConfig {
        no_tls_verify,
        http_host_header: exposure.http_host_header.clone(),
        origin_server_name: exposure.origin_server_name.clone(),
        ca_pool: exposure.ca_pool.clone(),
        tls_timeout: exposure.tls_timeout.map(|t| t.as_secs()),
    };

    Ok(IngressRule {
        hostname: Some(exposure.hostname.clone()),
        path: Some(exposure.path_prefix.clone()),
        service: exposure.service_target.clone(),
        origin_request: (!origin_request.is_empty()).then_some(origin_request),
    })
}

/// Bucket exposures into the zone each hostname belongs to, preserving zone
/// list order.
///
/// # Errors
///
/// Returns an error when any exposure's hostname matches no zone of the
/// account.
pub fn group_exposures_by_zone<'a>(
    exposures: &'a [Exposure],
    zones: &[Zone],
) -> Result<Vec<(Zone, Vec<Exposure>)>> {
    let mut buckets: Vec<(Zone, Vec<Exposure>)> = Vec::new();

    for exposure in exposures {
        let hostname = Domain::new(&exposure.hostname);
        let owning_zone = zones.iter().find(|zone| {
            hostname.is_subdomain_of(&Domain::new(&zone.name)) || exposure.hostname == zone.name
        });

        let Some(zone) = owning_zone else {
            bail!("hostname {} does not belong to any zone", exposure.hostname);
        };

        match buckets.iter_mut().find(|(z, _)| z.id == zone.id) {
            Some((_, items)) => items.push(exposure.clone()),
            None => buckets.push((zone.clone(), vec![exposure.clone()])),
        }
    }

    Ok(buckets)
}

/// Render a DNS comment template, substituting `{tunnel_name}`, `{tunnel_id}`,
/// and `{hostname}` placeholders.
#[must_use]
pub fn render_comment_template(
    template: &str,
    tunnel_name: &str,
    tunnel_id: &str,
    hostname: &str,
) -> String {
    template
        .replace("{tunnel_name}", tunnel_name)
        .replace("{tunnel_id}", tunnel_id)
        .replace("{hostname}", hostname)
}

#[cfg(test)]
#[path = "tunnel_tests.rs"]
mod tunnel_tests;
