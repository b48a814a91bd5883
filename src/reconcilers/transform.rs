// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Transformation of one Ingress into its exposures.
//!
//! Pure apart from reading the backing Services through [`ServiceReader`]:
//! the same Ingress and Services always yield the same exposure list. Errors
//! identify the offending Ingress; the caller decides whether to skip it.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Service, ServicePort};
use k8s_openapi::api::networking::v1::Ingress;
use kube::{Api, Client, ResourceExt};
use tracing::warn;

use crate::annotations::{backend_protocol, parse_origin_request_options};
use crate::exposure::Exposure;

/// Read access to Services, substitutable in tests.
#[async_trait]
pub trait ServiceReader: Send + Sync {
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>>;
}

#[async_trait]
impl ServiceReader for Client {
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        let api: Api<Service> = Api::namespaced(self.clone(), namespace);
        api.get_opt(name)
            .await
            .with_context(|| format!("fetch service {namespace}/{name}"))
    }
}

/// Compute the exposures declared by one Ingress.
///
/// Rules:
/// - A deletion timestamp marks every produced exposure deleted.
/// - TLS stanzas are ignored with a warning; the tunnel terminates TLS at
///   the edge.
/// - The origin scheme defaults to `http` and follows the `backend-protocol`
///   annotation.
/// - ClusterIP Services are addressed through their in-cluster DNS name;
///   ExternalName Services verbatim; headless Services are an error.
/// - Only `Prefix` and `ImplementationSpecific` path types are supported.
pub async fn from_ingress_to_exposures<R>(
    services: &R,
    ingress: &Ingress,
    cluster_domain: &str,
) -> Result<Vec<Exposure>>
where
    R: ServiceReader + ?Sized,
{
    let namespace = ingress.namespace().unwrap_or_default();
    let name = ingress.name_any();
    let is_deleted = ingress.metadata.deletion_timestamp.is_some();

    let annotations = ingress.metadata.annotations.clone().unwrap_or_default();
    let scheme = backend_protocol(&annotations)
        .with_context(|| format!("resolve backend protocol for ingress {namespace}/{name}"))?;
    let origin_options = parse_origin_request_options(&annotations)
        .with_context(|| format!("parse origin request annotations for ingress {namespace}/{name}"))?;

    let spec = ingress.spec.clone().unwrap_or_default();

    if spec.tls.as_ref().is_some_and(|tls| !tls.is_empty()) {
        warn!(
            ingress = %format!("{namespace}/{name}"),
            "ingress declares TLS stanzas; they are ignored because the tunnel terminates TLS at the edge"
        );
    }

    let mut result = Vec::new();

    for rule in spec.rules.unwrap_or_default() {
        let hostname = match rule.host.as_deref() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => bail!("host in ingress {namespace}/{name} is empty"),
        };

        let Some(http) = rule.http else {
            continue;
        };

        for path in http.paths {
            let backend = path
                .backend
                .service
                .as_ref()
                .with_context(|| format!("ingress {namespace}/{name} has a path without a service backend"))?;

            let service = services
                .get_service(&namespace, &backend.name)
                .await?
                .with_context(|| format!("service {namespace}/{} not found", backend.name))?;

            let origin_host = origin_host_for_service(&service, &namespace, cluster_domain)
                .with_context(|| format!("resolve origin for service {namespace}/{}", backend.name))?;

            let port = resolve_backend_port(backend, &service)
                .with_context(|| format!("resolve port for service {namespace}/{}", backend.name))?;

            match path.path_type.as_str() {
                "Prefix" | "ImplementationSpecific" => {}
                other => bail!(
                    "path type {other} in ingress {namespace}/{name} is not supported, \
                     only Prefix and ImplementationSpecific are"
                ),
            }

            result.push(Exposure {
                hostname: hostname.clone(),
                service_target: format!("{}://{origin_host}:{port}", scheme.as_str()),
                path_prefix: path.path.clone().unwrap_or_default(),
                is_deleted,
                proxy_ssl_verify_enabled: origin_options.proxy_ssl_verify,
                http_host_header: origin_options.http_host_header.clone(),
                origin_server_name: origin_options.origin_server_name.clone(),
                ca_pool: origin_options.ca_pool.clone(),
                tls_timeout: origin_options.tls_timeout,
                no_tls_verify: None,
            });
        }
    }

    Ok(result)
}

/// The address cloudflared dials for a Service.
fn origin_host_for_service(
    service: &Service,
    namespace: &str,
    cluster_domain: &str,
) -> Result<String> {
    let name = service.name_any();
    let spec = service
        .spec
        .as_ref()
        .with_context(|| format!("service {name} has no spec"))?;

    match spec.cluster_ip.as_deref() {
        Some("None") => bail!("service {name} is headless, headless services are not supported"),
        Some(ip) if !ip.is_empty() => Ok(format!("{name}.{namespace}.svc.{cluster_domain}")),
        _ => match (spec.type_.as_deref(), spec.external_name.as_deref()) {
            (Some("ExternalName"), Some(external_name)) if !external_name.is_empty() => {
                Ok(external_name.to_string())
            }
            _ => bail!("service {name} has no cluster ip"),
        },
    }
}

fn resolve_backend_port(
    backend: &k8s_openapi::api::networking::v1::IngressServiceBackend,
    service: &Service,
) -> Result<i32> {
    let port = backend
        .port
        .as_ref()
        .context("ingress backend specifies no port")?;

    if let Some(port_name) = port.name.as_deref().filter(|n| !n.is_empty()) {
        let ports = service
            .spec
            .as_ref()
            .and_then(|spec| spec.ports.as_deref())
            .unwrap_or_default();
        return port_with_name(ports, port_name)
            .with_context(|| format!("service has no port named {port_name}"));
    }

    port.number.context("ingress backend specifies neither a port name nor a number")
}

fn port_with_name(ports: &[ServicePort], port_name: &str) -> Option<i32> {
    ports
        .iter()
        .find(|port| port.name.as_deref() == Some(port_name))
        .map(|port| port.port)
}

#[cfg(test)]
#[path = "transform_tests.rs"]
mod transform_tests;
