// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Event-driven reconciliation of claimed Ingresses.
//!
//! The tunnel's rule table is one monolithic remote resource and the DNS
//! planner needs the full exposure set to decide deletions, so every
//! reconcile republishes the exposures of *all* claimed Ingresses. One
//! Ingress failing to transform is logged and skipped; it must not block
//! unrelated routes.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use k8s_openapi::api::networking::v1::{Ingress, IngressClass};
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info, warn};

use crate::cloudflare::TunnelClient;
use crate::exposure::Exposure;
use crate::labels::{INGRESS_FINALIZER, WELL_KNOWN_INGRESS_CLASS_ANNOTATION};

use super::finalizers::{ensure_finalizer, remove_finalizer};
use super::pagination::list_all_paginated;
use super::transform::from_ingress_to_exposures;

/// Shared context for Ingress reconciles. Configuration is immutable after
/// startup.
pub struct IngressContext {
    pub client: Client,
    pub tunnel: Arc<dyn TunnelClient>,
    pub ingress_class_name: String,
    pub controller_class_name: String,
    pub cluster_domain: String,
}

/// Reconcile one Ingress key.
///
/// Unclaimed Ingresses return success without touching remote state. For a
/// claimed Ingress the full claimed set is transformed and republished; the
/// finalizer is removed only after a deleted Ingress's reconcile published
/// successfully.
pub async fn reconcile_ingress(ctx: &IngressContext, namespace: &str, name: &str) -> Result<()> {
    let api: Api<Ingress> = Api::namespaced(ctx.client.clone(), namespace);
    let Some(origin) = api
        .get_opt(name)
        .await
        .with_context(|| format!("fetch ingress {namespace}/{name}"))?
    else {
        // Deletion already observed; nothing left to converge for this key.
        return Ok(());
    };

    let controlled_class_names = list_controlled_ingress_class_names(ctx).await?;

    if !is_ingress_claimed(&origin, &ctx.ingress_class_name, &controlled_class_names) {
        debug!(
            ingress = %format!("{namespace}/{name}"),
            ingress_class = %ctx.ingress_class_name,
            controller_class = %ctx.controller_class_name,
            "ingress is not claimed by this controller"
        );
        return Ok(());
    }

    info!(triggered_by = %format!("{namespace}/{name}"), "publishing tunnel configuration");

    ensure_finalizer(&ctx.client, &origin, INGRESS_FINALIZER)
        .await
        .with_context(|| format!("attach finalizer to ingress {namespace}/{name}"))?;

    let claimed = list_claimed_ingresses(ctx, &controlled_class_names).await?;

    let mut all_exposures: Vec<Exposure> = Vec::new();
    for ingress in &claimed {
        match from_ingress_to_exposures(&ctx.client, ingress, &ctx.cluster_domain).await {
            Ok(exposures) => all_exposures.extend(exposures),
            Err(err) => {
                // Best effort: a bad Ingress is skipped, the rest still
                // converge.
                warn!(
                    triggered_by = %format!("{namespace}/{name}"),
                    ingress = %format!("{}/{}", ingress.namespace().unwrap_or_default(), ingress.name_any()),
                    error = %format!("{err:#}"),
                    "failed to transform ingress into exposures, skipped"
                );
            }
        }
    }
    debug!(exposure_count = all_exposures.len(), "collected exposures from claimed ingresses");

    ctx.tunnel
        .put_exposures(&all_exposures)
        .await
        .context("put exposures")?;

    if origin.metadata.deletion_timestamp.is_some() {
        remove_finalizer(&ctx.client, &origin, INGRESS_FINALIZER)
            .await
            .with_context(|| format!("clean finalizer from ingress {namespace}/{name}"))?;
    }

    debug!(triggered_by = %format!("{namespace}/{name}"), "reconcile completed");
    Ok(())
}

/// The claim predicate: an Ingress is claimed via the well-known annotation
/// or via an IngressClass controlled by this controller.
#[must_use]
pub fn is_ingress_claimed(
    ingress: &Ingress,
    ingress_class_name: &str,
    controlled_class_names: &[String],
) -> bool {
    let annotation_class = ingress
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(WELL_KNOWN_INGRESS_CLASS_ANNOTATION));
    if annotation_class.map(String::as_str) == Some(ingress_class_name) {
        return true;
    }

    ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.ingress_class_name.as_ref())
        .is_some_and(|class_name| controlled_class_names.contains(class_name))
}

/// Names of the IngressClasses whose `controller` field matches this
/// controller. Listed on demand; no cached state.
async fn list_controlled_ingress_class_names(ctx: &IngressContext) -> Result<Vec<String>> {
    let api: Api<IngressClass> = Api::all(ctx.client.clone());
    let classes = list_all_paginated(&api, ListParams::default())
        .await
        .with_context(|| {
            format!(
                "list ingress classes with controller {}",
                ctx.controller_class_name
            )
        })?;

    Ok(classes
        .into_iter()
        .filter(|class| {
            class
                .spec
                .as_ref()
                .is_some_and(|spec| spec.controller.as_deref() == Some(ctx.controller_class_name.as_str()))
        })
        .map(|class| class.name_any())
        .collect())
}

/// All claimed Ingresses, cluster-wide.
async fn list_claimed_ingresses(
    ctx: &IngressContext,
    controlled_class_names: &[String],
) -> Result<Vec<Ingress>> {
    let api: Api<Ingress> = Api::all(ctx.client.clone());
    let ingresses = list_all_paginated(&api, ListParams::default())
        .await
        .context("list ingresses")?;

    Ok(ingresses
        .into_iter()
        .filter(|ingress| {
            is_ingress_claimed(ingress, &ctx.ingress_class_name, controlled_class_names)
        })
        .collect())
}

#[cfg(test)]
#[path = "ingress_tests.rs"]
mod ingress_tests;
