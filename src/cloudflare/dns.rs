// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pure DNS record planning for managed hostnames.
//!
//! For each effective exposure hostname (e.g. `dash.strrl.cloud`) the planner
//! maintains two records in the owning zone:
//!
//! - CNAME: `dash.strrl.cloud` -> `<tunnel-id>.cfargotunnel.com` (proxied)
//! - TXT: `_ctic_managed.dash.strrl.cloud` -> JSON marker naming the
//!   controller and the tunnel
//!
//! The TXT marker is the only authoritative evidence of ownership. The planner
//! creates and updates aggressively (taking over foreign CNAMEs with a
//! warning) but deletes a record only when a marker for the current tunnel
//! proves ownership. Records carrying the older comment-based ownership mark
//! are migrated through a separate deletion pass.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::{CONTROLLER_IDENTIFIER, MANAGED_TXT_PREFIX, TUNNEL_DOMAIN_SUFFIX};
use crate::exposure::Exposure;

use super::types::DnsRecord;

/// Record type name for CNAME operations.
pub const RECORD_TYPE_CNAME: &str = "CNAME";

/// Record type name for TXT operations.
pub const RECORD_TYPE_TXT: &str = "TXT";

/// The JSON ownership marker stored in a managed TXT record.
///
/// Serialized compact with `controller` before `tunnel`; other deployments
/// compare the rendered string byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipMarker {
    pub controller: String,
    pub tunnel: String,
}

/// A record to create: `name` with `content` of `record_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsOperationCreate {
    pub name: String,
    pub record_type: String,
    pub content: String,
}

/// An existing record to overwrite with `content`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsOperationUpdate {
    pub old_record: DnsRecord,
    pub record_type: String,
    pub content: String,
}

/// An existing record to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsOperationDelete {
    pub old_record: DnsRecord,
}

/// The per-zone convergence plan. Operations execute in create, update,
/// delete order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DnsPlan {
    pub to_create: Vec<DnsOperationCreate>,
    pub to_update: Vec<DnsOperationUpdate>,
    pub to_delete: Vec<DnsOperationDelete>,
}

impl DnsPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

/// The synthetic CNAME target every managed hostname points at.
#[must_use]
pub fn tunnel_domain(tunnel_id: &str) -> String {
    format!("{tunnel_id}.{TUNNEL_DOMAIN_SUFFIX}").to_lowercase()
}

/// Name of the TXT record carrying the ownership marker for `hostname`.
#[must_use]
pub fn managed_txt_name(hostname: &str) -> String {
    format!("{MANAGED_TXT_PREFIX}.{hostname}")
}

/// Render the canonical marker content for the given tunnel.
#[must_use]
pub fn render_marker(tunnel_name: &str) -> String {
    // serde_json object keys are ordered, yielding the canonical
    // `{"controller":...,"tunnel":...}` form.
    serde_json::json!({
        "controller": CONTROLLER_IDENTIFIER,
        "tunnel": tunnel_name,
    })
    .to_string()
}

/// Parse a TXT record content back into an [`OwnershipMarker`].
pub fn parse_marker(content: &str) -> anyhow::Result<OwnershipMarker> {
    Ok(serde_json::from_str(content)?)
}

/// Render the legacy comment-based ownership mark. Matched only during
/// migration; never written.
#[must_use]
pub fn render_legacy_comment(tunnel_name: &str) -> String {
    format!("managed by {CONTROLLER_IDENTIFIER}, tunnel [{tunnel_name}]")
}

/// Compute the per-zone DNS plan for the given exposures.
///
/// `existing_cnames` must contain every CNAME record of the zone and
/// `existing_txts` every managed-prefix TXT record; partial views cause false
/// deletes, so callers exhaust pagination first.
///
/// For every effective exposure the plan ensures a proxied CNAME at the
/// hostname and a marker TXT beside it, creating or overwriting as needed. A
/// CNAME not backed by any effective exposure is deleted together with its
/// marker, but only when the marker matches the current tunnel.
#[must_use]
pub fn plan_zone_records(
    exposures: &[Exposure],
    existing_cnames: &[DnsRecord],
    existing_txts: &[DnsRecord],
    tunnel_id: &str,
    tunnel_name: &str,
) -> DnsPlan {
    let effective: Vec<&Exposure> = exposures.iter().filter(|e| !e.is_deleted).collect();
    let expected_marker = render_marker(tunnel_name);
    let target = tunnel_domain(tunnel_id);

    let mut plan = DnsPlan::default();

    for exposure in &effective {
        let txt_name = managed_txt_name(&exposure.hostname);

        match find_record_by_name(existing_cnames, &exposure.hostname) {
            Some(old_cname) => {
                if find_record_by_name(existing_txts, &txt_name).is_none() {
                    warn!(
                        hostname = %exposure.hostname,
                        existing_content = %old_cname.content,
                        "overriding DNS record not managed by this controller"
                    );
                }
                plan.to_update.push(DnsOperationUpdate {
                    old_record: old_cname.clone(),
                    record_type: RECORD_TYPE_CNAME.to_string(),
                    content: target.clone(),
                });
            }
            None => plan.to_create.push(DnsOperationCreate {
                name: exposure.hostname.clone(),
                record_type: RECORD_TYPE_CNAME.to_string(),
                content: target.clone(),
            }),
        }

        match find_record_by_name(existing_txts, &txt_name) {
            Some(old_txt) => plan.to_update.push(DnsOperationUpdate {
                old_record: old_txt.clone(),
                record_type: RECORD_TYPE_TXT.to_string(),
                content: expected_marker.clone(),
            }),
            None => plan.to_create.push(DnsOperationCreate {
                name: txt_name,
                record_type: RECORD_TYPE_TXT.to_string(),
                content: expected_marker.clone(),
            }),
        }
    }

    for cname in existing_cnames {
        if contains_hostname(&effective, &cname.name) {
            continue;
        }

        let txt_name = managed_txt_name(&cname.name);
        let matching_txt = existing_txts
            .iter()
            .find(|txt| txt.name == txt_name && txt.content == expected_marker);

        // Delete only with proof of ownership for this tunnel.
        if let Some(txt) = matching_txt {
            plan.to_delete.push(DnsOperationDelete {
                old_record: cname.clone(),
            });
            plan.to_delete.push(DnsOperationDelete {
                old_record: txt.clone(),
            });
        }
    }

    plan
}

/// Migration pass from comment-based to TXT-based ownership.
///
/// A CNAME that is no longer exposed, has no marker TXT for the current
/// tunnel, and still carries the legacy ownership comment for the current
/// tunnel is scheduled for deletion. Legacy comments naming a different
/// tunnel are left alone, as are records already tracked by TXT (those are
/// handled by [`plan_zone_records`]).
#[must_use]
pub fn plan_legacy_migration(
    exposures: &[Exposure],
    existing_cnames: &[DnsRecord],
    existing_txts: &[DnsRecord],
    tunnel_name: &str,
) -> Vec<DnsOperationDelete> {
    let effective: Vec<&Exposure> = exposures.iter().filter(|e| !e.is_deleted).collect();
    let legacy_comment = render_legacy_comment(tunnel_name);
    let expected_marker = render_marker(tunnel_name);

    let mut to_delete = Vec::new();

    for cname in existing_cnames {
        if contains_hostname(&effective, &cname.name) {
            continue;
        }

        let txt_name = managed_txt_name(&cname.name);
        let has_marker = existing_txts
            .iter()
            .any(|txt| txt.name == txt_name && txt.content == expected_marker);
        if has_marker {
            continue;
        }

        if cname.comment.as_deref() == Some(legacy_comment.as_str()) {
            info!(hostname = %cname.name, "migrating legacy comment-based record for deletion");
            to_delete.push(DnsOperationDelete {
                old_record: cname.clone(),
            });
        }
    }

    to_delete
}

fn find_record_by_name<'a>(records: &'a [DnsRecord], name: &str) -> Option<&'a DnsRecord> {
    records.iter().find(|record| record.name == name)
}

fn contains_hostname(exposures: &[&Exposure], hostname: &str) -> bool {
    exposures.iter().any(|e| e.hostname == hostname)
}

#[cfg(test)]
#[path = "dns_tests.rs"]
mod dns_tests;
