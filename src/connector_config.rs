// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Customizable pod-spec overrides for the cloudflared connector Deployment.
//!
//! The overrides are loaded once at startup from a JSON file (typically
//! mounted from a ConfigMap). The SHA-256 hash of the raw file is stamped on
//! the rendered pod template; a changed hash is one of the gates that trigger
//! a connector rollout.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{
    Affinity, PodSecurityContext, Probe, ResourceRequirements, SecurityContext, Toleration,
    TopologySpreadConstraint, Volume, VolumeMount,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Pod-spec fields an operator may override on the connector Deployment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectorDeploymentConfig {
    pub resources: Option<ResourceRequirements>,
    pub security_context: Option<SecurityContext>,
    pub pod_security_context: Option<PodSecurityContext>,
    pub pod_labels: Option<BTreeMap<String, String>>,
    pub pod_annotations: Option<BTreeMap<String, String>>,
    pub node_selector: Option<BTreeMap<String, String>>,
    pub tolerations: Option<Vec<Toleration>>,
    pub affinity: Option<Affinity>,
    pub topology_spread_constraints: Option<Vec<TopologySpreadConstraint>>,
    pub priority_class_name: Option<String>,
    pub probes: Option<ConnectorProbes>,
    pub volumes: Option<Vec<Volume>>,
    pub volume_mounts: Option<Vec<VolumeMount>>,
}

/// Probe configuration for the cloudflared container.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectorProbes {
    pub liveness: Option<Probe>,
    pub readiness: Option<Probe>,
    pub startup: Option<Probe>,
}

/// Load the connector overrides from a JSON file.
///
/// Returns the parsed config together with the hex SHA-256 of the raw file
/// contents. An absent path yields an empty config and an empty hash.
///
/// # Errors
///
/// Returns an error when the file cannot be read or does not parse.
pub fn load_connector_config(
    path: Option<&Path>,
) -> Result<(ConnectorDeploymentConfig, String)> {
    let Some(path) = path else {
        return Ok((ConnectorDeploymentConfig::default(), String::new()));
    };

    let data = std::fs::read(path)
        .with_context(|| format!("read connector deployment config {}", path.display()))?;

    let config: ConnectorDeploymentConfig = serde_json::from_slice(&data)
        .with_context(|| format!("parse connector deployment config {}", path.display()))?;

    let hash = hex::encode(Sha256::digest(&data));
    Ok((config, hash))
}

#[cfg(test)]
#[path = "connector_config_tests.rs"]
mod connector_config_tests;
