// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label, annotation, and finalizer constants used across the reconcilers.
//!
//! These identify resources managed by this controller. The owner label pair is
//! how the connector manager finds its Deployment; losing it causes duplication.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the name of the application.
pub const K8S_NAME: &str = "app.kubernetes.io/name";

/// Standard label for the tool managing the application.
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value for `app.kubernetes.io/managed-by` on resources created by this controller.
pub const MANAGED_BY_VALUE: &str = "cloudflare-tunnel-ingress-controller";

// ============================================================================
// Controller-Specific Labels
// ============================================================================

/// Label key identifying resources owned by this controller.
pub const OWNER_LABEL: &str = "strrl.dev/cloudflare-tunnel-ingress-controller";

/// Label value marking the managed cloudflared connector Deployment.
pub const OWNER_LABEL_CONNECTOR: &str = "controlled-cloudflared-connector";

// ============================================================================
// Annotations
// ============================================================================

/// The well-known legacy ingress-class annotation consulted by the claim predicate.
pub const WELL_KNOWN_INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";

/// Annotation carrying the SHA-256 hash of the loaded connector pod-spec
/// overrides. A hash change triggers a connector rollout.
pub const ANNOTATION_CLOUDFLARED_CONFIG_HASH: &str =
    "cloudflare-tunnel-ingress-controller.strrl.dev/cloudflared-config-hash";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer placed on every claimed Ingress until its exposures are withdrawn.
pub const INGRESS_FINALIZER: &str = "strrl.dev/cloudflare-tunnel-ingress-controller-controlled";
