// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Periodic convergence of the in-cluster cloudflared connector Deployment.
//!
//! The connector dials the tunnel edge and carries the traffic the published
//! rules route into the cluster. This loop is independent of Ingress events:
//! every tick it compares the live Deployment against the desired one and
//! creates or replaces it as needed. The selector labels are applied last and
//! may never be overridden; they are how the manager finds its own
//! Deployment.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::api::{ListParams, PostParams};
use kube::{Api, Client};
use tracing::{debug, error, info};

use crate::cloudflare::TunnelClient;
use crate::connector_config::ConnectorDeploymentConfig;
use crate::constants::{CONNECTOR_METRICS_ADDRESS, CONNECTOR_NAME, CONNECTOR_SYNC_INTERVAL_SECS};
use crate::labels::{ANNOTATION_CLOUDFLARED_CONFIG_HASH, OWNER_LABEL, OWNER_LABEL_CONNECTOR};
use crate::metrics;

use super::pagination::list_all_paginated;

/// Immutable desired state of the connector, resolved once at startup.
pub struct ConnectorOptions {
    /// Namespace the connector Deployment lives in.
    pub namespace: String,
    /// cloudflared container image.
    pub image: String,
    /// Image pull policy for the connector container.
    pub image_pull_policy: String,
    /// Desired replica count; `None` leaves the server default.
    pub replicas: Option<i32>,
    /// cloudflared transport protocol (`auto`, `http2`, `quic`).
    pub protocol: String,
    /// Extra cloudflared arguments, inserted between `tunnel` and `--metrics`.
    pub extra_args: Vec<String>,
    /// Pod-spec overrides loaded from the connector config file.
    pub config: ConnectorDeploymentConfig,
    /// Hex SHA-256 of the raw config file; empty when no file is configured.
    pub config_hash: String,
}

/// Run the connector convergence loop until the task is cancelled.
pub async fn run_connector_manager(
    client: Client,
    tunnel: Arc<dyn TunnelClient>,
    options: ConnectorOptions,
) {
    info!(
        namespace = %options.namespace,
        interval_secs = CONNECTOR_SYNC_INTERVAL_SECS,
        "starting connector manager"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(CONNECTOR_SYNC_INTERVAL_SECS));
    loop {
        interval.tick().await;
        match converge_connector(&client, tunnel.as_ref(), &options).await {
            Ok(()) => metrics::record_connector_sync("success"),
            Err(err) => {
                metrics::record_connector_sync("error");
                error!(error = %format!("{err:#}"), "failed to converge connector deployment");
            }
        }
    }
}

/// One convergence pass: create the Deployment when absent, replace it when
/// any update gate fires.
pub async fn converge_connector(
    client: &Client,
    tunnel: &dyn TunnelClient,
    options: &ConnectorOptions,
) -> Result<()> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), &options.namespace);
    let selector = format!("{OWNER_LABEL}={OWNER_LABEL_CONNECTOR}");
    let existing = list_all_paginated(&api, ListParams::default().labels(&selector))
        .await
        .with_context(|| format!("list {CONNECTOR_NAME} in namespace {}", options.namespace))?;

    let Some(existing) = existing.into_iter().next() else {
        let token = tunnel.fetch_tunnel_token().await?;
        let deployment = render_connector_deployment(options, &token);
        api.create(&PostParams::default(), &deployment)
            .await
            .with_context(|| format!("create {CONNECTOR_NAME} deployment"))?;
        info!(namespace = %options.namespace, "created connector deployment");
        return Ok(());
    };

    // The command embeds the token, so the token is fetched whenever a live
    // Deployment must be compared; a rotated token then rolls the pods.
    let token = tunnel.fetch_tunnel_token().await?;
    let desired_command = cloudflared_command(&options.protocol, &token, &options.extra_args);

    if !needs_update(&existing, options, &desired_command) {
        debug!(namespace = %options.namespace, "connector deployment is up to date");
        return Ok(());
    }

    let desired = render_connector_deployment(options, &token);
    let mut updated = existing;
    updated.spec = desired.spec;
    api.replace(CONNECTOR_NAME, &PostParams::default(), &updated)
        .await
        .with_context(|| format!("update {CONNECTOR_NAME} deployment"))?;
    info!(namespace = %options.namespace, "updated connector deployment");

    Ok(())
}

/// Whether the live Deployment deviates from the desired state.
///
/// Gates: replica count (only when configured), container image, image pull
/// policy, element-wise command, and the config-hash annotation.
#[must_use]
pub fn needs_update(
    existing: &Deployment,
    options: &ConnectorOptions,
    desired_command: &[String],
) -> bool {
    let spec = existing.spec.as_ref();

    if let Some(desired_replicas) = options.replicas {
        if spec.and_then(|s| s.replicas) != Some(desired_replicas) {
            return true;
        }
    }

    let template = spec.map(|s| &s.template);
    let container = template
        .and_then(|t| t.spec.as_ref())
        .and_then(|pod| pod.containers.first());

    if let Some(container) = container {
        if container.image.as_deref() != Some(options.image.as_str()) {
            return true;
        }
        if container.image_pull_policy.as_deref() != Some(options.image_pull_policy.as_str()) {
            return true;
        }
        if container.command.as_deref() != Some(desired_command) {
            return true;
        }
    } else {
        return true;
    }

    let existing_hash = template
        .and_then(|t| t.metadata.as_ref())
        .and_then(|meta| meta.annotations.as_ref())
        .and_then(|annotations| annotations.get(ANNOTATION_CLOUDFLARED_CONFIG_HASH))
        .cloned()
        .unwrap_or_default();

    existing_hash != options.config_hash
}

/// The full cloudflared invocation. Extra arguments land between `tunnel`
/// and `--metrics`.
#[must_use]
pub fn cloudflared_command(protocol: &str, token: &str, extra_args: &[String]) -> Vec<String> {
    let mut command = vec![
        "cloudflared".to_string(),
        "--protocol".to_string(),
        protocol.to_string(),
        "--no-autoupdate".to_string(),
        "tunnel".to_string(),
    ];
    command.extend(extra_args.iter().cloned());
    command.extend([
        "--metrics".to_string(),
        CONNECTOR_METRICS_ADDRESS.to_string(),
        "run".to_string(),
        "--token".to_string(),
        token.to_string(),
    ]);
    command
}

/// Render the desired connector Deployment.
#[must_use]
pub fn render_connector_deployment(options: &ConnectorOptions, token: &str) -> Deployment {
    let selector_labels = selector_labels();

    // User labels first; the selector labels are applied last and win.
    let mut pod_labels = options.config.pod_labels.clone().unwrap_or_default();
    pod_labels.extend(selector_labels.clone());

    let mut pod_annotations = options.config.pod_annotations.clone().unwrap_or_default();
    if !options.config_hash.is_empty() {
        pod_annotations.insert(
            ANNOTATION_CLOUDFLARED_CONFIG_HASH.to_string(),
            options.config_hash.clone(),
        );
    }

    let probes = options.config.probes.as_ref();

    let container = Container {
        name: CONNECTOR_NAME.to_string(),
        image: Some(options.image.clone()),
        image_pull_policy: Some(options.image_pull_policy.clone()),
        command: Some(cloudflared_command(&options.protocol, token, &options.extra_args)),
        resources: options.config.resources.clone(),
        security_context: options.config.security_context.clone(),
        volume_mounts: options.config.volume_mounts.clone(),
        liveness_probe: probes.and_then(|p| p.liveness.clone()),
        readiness_probe: probes.and_then(|p| p.readiness.clone()),
        startup_probe: probes.and_then(|p| p.startup.clone()),
        ..Default::default()
    };

    Deployment {
        metadata: ObjectMeta {
            name: Some(CONNECTOR_NAME.to_string()),
            namespace: Some(options.namespace.clone()),
            labels: Some(selector_labels.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: options.replicas,
            selector: LabelSelector {
                match_labels: Some(selector_labels),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    name: Some(CONNECTOR_NAME.to_string()),
                    labels: Some(pod_labels),
                    annotations: (!pod_annotations.is_empty()).then_some(pod_annotations),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    restart_policy: Some("Always".to_string()),
                    security_context: options.config.pod_security_context.clone(),
                    node_selector: options.config.node_selector.clone(),
                    tolerations: options.config.tolerations.clone(),
                    affinity: options.config.affinity.clone(),
                    topology_spread_constraints: options
                        .config
                        .topology_spread_constraints
                        .clone(),
                    priority_class_name: options.config.priority_class_name.clone(),
                    volumes: options.config.volumes.clone(),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn selector_labels() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), CONNECTOR_NAME.to_string()),
        (OWNER_LABEL.to_string(), OWNER_LABEL_CONNECTOR.to_string()),
    ])
}

#[cfg(test)]
#[path = "connector_tests.rs"]
mod connector_tests;
