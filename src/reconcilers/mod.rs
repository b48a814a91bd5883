// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic: the Ingress reconciler, the exposure transformer,
//! and the connector manager, plus shared helpers for finalizers and
//! paginated listing.

pub mod connector;
pub mod finalizers;
pub mod ingress;
pub mod pagination;
pub mod transform;

pub use connector::{converge_connector, run_connector_manager, ConnectorOptions};
pub use ingress::{reconcile_ingress, IngressContext};
pub use transform::{from_ingress_to_exposures, ServiceReader};
