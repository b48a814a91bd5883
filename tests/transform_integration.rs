// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Integration tests for the Ingress-to-exposure transformation
//
// These tests verify the transformation against a real API server: the
// backing Service is resolved through the live client rather than a fake.
// They skip automatically when no cluster is reachable.

mod common;

use common::{cleanup_test_namespace, create_test_namespace, get_kube_client_or_skip};
use ctic::reconcilers::from_ingress_to_exposures;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, PostParams};

const TEST_CLUSTER_DOMAIN: &str = "cluster.local";

fn test_service(name: &str, namespace: &str) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port: 2333,
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn test_ingress(namespace: &str, service_name: &str, path_type: &str) -> Ingress {
    Ingress {
        metadata: ObjectMeta {
            name: Some("test-ingress".to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            rules: Some(vec![IngressRule {
                host: Some("test.example.com".to_string()),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".to_string()),
                        path_type: path_type.to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: service_name.to_string(),
                                port: Some(ServiceBackendPort {
                                    number: Some(2333),
                                    name: None,
                                }),
                            }),
                            resource: None,
                        },
                    }],
                }),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_transform_resolves_service_through_the_cluster() {
    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };
    let namespace = "ctic-transform-test";
    create_test_namespace(&client, namespace).await.unwrap();

    let services: Api<Service> = Api::namespaced(client.clone(), namespace);
    let service = services
        .create(&PostParams::default(), &test_service("test-service", namespace))
        .await
        .unwrap();
    let service_name = service.metadata.name.unwrap();

    let ingress = test_ingress(namespace, &service_name, "Prefix");
    let exposures = from_ingress_to_exposures(&client, &ingress, TEST_CLUSTER_DOMAIN)
        .await
        .unwrap();

    assert_eq!(exposures.len(), 1);
    assert_eq!(exposures[0].hostname, "test.example.com");
    assert_eq!(
        exposures[0].service_target,
        format!("http://{service_name}.{namespace}.svc.{TEST_CLUSTER_DOMAIN}:2333")
    );
    assert_eq!(exposures[0].path_prefix, "/");
    assert!(!exposures[0].is_deleted);

    cleanup_test_namespace(&client, namespace).await.unwrap();
}

#[tokio::test]
async fn test_transform_rejects_exact_path_type() {
    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };
    let namespace = "ctic-transform-exact-test";
    create_test_namespace(&client, namespace).await.unwrap();

    let services: Api<Service> = Api::namespaced(client.clone(), namespace);
    let service = services
        .create(&PostParams::default(), &test_service("test-service", namespace))
        .await
        .unwrap();
    let service_name = service.metadata.name.unwrap();

    let ingress = test_ingress(namespace, &service_name, "Exact");
    let result = from_ingress_to_exposures(&client, &ingress, TEST_CLUSTER_DOMAIN).await;
    assert!(result.is_err());

    cleanup_test_namespace(&client, namespace).await.unwrap();
}
