// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for connector rendering and the update gates.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use super::*;
use crate::connector_config::ConnectorDeploymentConfig;

const TOKEN: &str = "tunnel-token-in-test";

fn options() -> ConnectorOptions {
    ConnectorOptions {
        namespace: "cloudflare-tunnel".to_string(),
        image: "cloudflare/cloudflared:latest".to_string(),
        image_pull_policy: "IfNotPresent".to_string(),
        replicas: Some(1),
        protocol: "auto".to_string(),
        extra_args: Vec::new(),
        config: ConnectorDeploymentConfig::default(),
        config_hash: String::new(),
    }
}

// ============================================================================
// Command Shape
// ============================================================================

#[test]
fn test_command_shape_without_extra_args() {
    let command = cloudflared_command("auto", TOKEN, &[]);
    assert_eq!(
        command,
        vec![
            "cloudflared",
            "--protocol",
            "auto",
            "--no-autoupdate",
            "tunnel",
            "--metrics",
            "0.0.0.0:44483",
            "run",
            "--token",
            TOKEN,
        ]
    );
}

#[test]
fn test_extra_args_are_inserted_between_tunnel_and_metrics() {
    let extra = vec!["--edge-ip-version".to_string(), "6".to_string()];
    let command = cloudflared_command("http2", TOKEN, &extra);
    assert_eq!(
        command,
        vec![
            "cloudflared",
            "--protocol",
            "http2",
            "--no-autoupdate",
            "tunnel",
            "--edge-ip-version",
            "6",
            "--metrics",
            "0.0.0.0:44483",
            "run",
            "--token",
            TOKEN,
        ]
    );
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn test_rendered_deployment_identity_and_selector() {
    let deployment = render_connector_deployment(&options(), TOKEN);

    assert_eq!(
        deployment.metadata.name.as_deref(),
        Some("controlled-cloudflared-connector")
    );
    assert_eq!(
        deployment.metadata.namespace.as_deref(),
        Some("cloudflare-tunnel")
    );

    let spec = deployment.spec.unwrap();
    let match_labels = spec.selector.match_labels.unwrap();
    assert_eq!(
        match_labels
            .get("strrl.dev/cloudflare-tunnel-ingress-controller")
            .map(String::as_str),
        Some("controlled-cloudflared-connector")
    );

    // The pod labels carry every selector label.
    let pod_labels = spec.template.metadata.unwrap().labels.unwrap();
    for (key, value) in &match_labels {
        assert_eq!(pod_labels.get(key), Some(value));
    }
}

#[test]
fn test_user_pod_labels_cannot_override_selector_labels() {
    let mut opts = options();
    opts.config.pod_labels = Some(BTreeMap::from([
        ("app".to_string(), "sneaky-override".to_string()),
        ("team".to_string(), "platform".to_string()),
    ]));

    let deployment = render_connector_deployment(&opts, TOKEN);
    let pod_labels = deployment
        .spec
        .unwrap()
        .template
        .metadata
        .unwrap()
        .labels
        .unwrap();

    assert_eq!(
        pod_labels.get("app").map(String::as_str),
        Some("controlled-cloudflared-connector")
    );
    assert_eq!(pod_labels.get("team").map(String::as_str), Some("platform"));
}

#[test]
fn test_replicas_unset_leaves_server_default() {
    let mut opts = options();
    opts.replicas = None;

    let deployment = render_connector_deployment(&opts, TOKEN);
    assert!(deployment.spec.unwrap().replicas.is_none());
}

#[test]
fn test_config_hash_annotation_is_stamped_on_the_pod_template() {
    let mut opts = options();
    opts.config_hash = "abc123".to_string();

    let deployment = render_connector_deployment(&opts, TOKEN);
    let annotations = deployment
        .spec
        .unwrap()
        .template
        .metadata
        .unwrap()
        .annotations
        .unwrap();
    assert_eq!(
        annotations
            .get("cloudflare-tunnel-ingress-controller.strrl.dev/cloudflared-config-hash")
            .map(String::as_str),
        Some("abc123")
    );
}

#[test]
fn test_no_config_hash_annotation_without_config_file() {
    let deployment = render_connector_deployment(&options(), TOKEN);
    let template_meta = deployment.spec.unwrap().template.metadata.unwrap();
    assert!(template_meta.annotations.is_none());
}

#[test]
fn test_pod_spec_overrides_are_applied() {
    let mut opts = options();
    opts.config.node_selector = Some(BTreeMap::from([(
        "kubernetes.io/os".to_string(),
        "linux".to_string(),
    )]));
    opts.config.priority_class_name = Some("system-cluster-critical".to_string());
    opts.config.resources = Some(ResourceRequirements {
        limits: Some(BTreeMap::from([(
            "memory".to_string(),
            Quantity("128Mi".to_string()),
        )])),
        ..Default::default()
    });

    let deployment = render_connector_deployment(&opts, TOKEN);
    let pod_spec = deployment.spec.unwrap().template.spec.unwrap();

    assert_eq!(
        pod_spec
            .node_selector
            .unwrap()
            .get("kubernetes.io/os")
            .map(String::as_str),
        Some("linux")
    );
    assert_eq!(
        pod_spec.priority_class_name.as_deref(),
        Some("system-cluster-critical")
    );
    assert!(pod_spec.containers[0].resources.is_some());
}

// ============================================================================
// Update Gates
// ============================================================================

#[test]
fn test_up_to_date_deployment_needs_no_update() {
    let opts = options();
    let command = cloudflared_command(&opts.protocol, TOKEN, &opts.extra_args);
    let deployment = render_connector_deployment(&opts, TOKEN);

    assert!(!needs_update(&deployment, &opts, &command));
}

#[test]
fn test_image_change_triggers_update() {
    let opts = options();
    let command = cloudflared_command(&opts.protocol, TOKEN, &opts.extra_args);
    let deployment = render_connector_deployment(&opts, TOKEN);

    let mut changed = opts;
    changed.image = "cloudflare/cloudflared:2026.1.0".to_string();
    assert!(needs_update(&deployment, &changed, &command));
}

#[test]
fn test_pull_policy_change_triggers_update() {
    let opts = options();
    let command = cloudflared_command(&opts.protocol, TOKEN, &opts.extra_args);
    let deployment = render_connector_deployment(&opts, TOKEN);

    let mut changed = opts;
    changed.image_pull_policy = "Always".to_string();
    assert!(needs_update(&deployment, &changed, &command));
}

#[test]
fn test_replica_change_triggers_update_only_when_configured() {
    let opts = options();
    let command = cloudflared_command(&opts.protocol, TOKEN, &opts.extra_args);
    let deployment = render_connector_deployment(&opts, TOKEN);

    let mut changed = options();
    changed.replicas = Some(3);
    assert!(needs_update(&deployment, &changed, &command));

    // Unset replicas never force a rollout, whatever the live count is.
    let mut unset = options();
    unset.replicas = None;
    assert!(!needs_update(&deployment, &unset, &command));
}

#[test]
fn test_token_rotation_changes_the_command_and_triggers_update() {
    let opts = options();
    let deployment = render_connector_deployment(&opts, TOKEN);

    let rotated = cloudflared_command(&opts.protocol, "rotated-token", &opts.extra_args);
    assert!(needs_update(&deployment, &opts, &rotated));
}

#[test]
fn test_config_hash_change_triggers_update() {
    let opts = options();
    let command = cloudflared_command(&opts.protocol, TOKEN, &opts.extra_args);
    let deployment = render_connector_deployment(&opts, TOKEN);

    let mut changed = options();
    changed.config_hash = "deadbeef".to_string();
    assert!(needs_update(&deployment, &changed, &command));
}

#[test]
fn test_deployment_without_containers_needs_update() {
    let opts = options();
    let command = cloudflared_command(&opts.protocol, TOKEN, &opts.extra_args);
    let mut deployment = render_connector_deployment(&opts, TOKEN);
    deployment
        .spec
        .as_mut()
        .unwrap()
        .template
        .spec
        .as_mut()
        .unwrap()
        .containers
        .clear();

    assert!(needs_update(&deployment, &opts, &command));
}
