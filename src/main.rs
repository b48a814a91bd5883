// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{routing::get, Router};
use clap::Parser;
use ctic::cloudflare::{resolve_or_create_tunnel, CloudflareApi, CloudflareTunnelClient, TunnelClient};
use ctic::connector_config::load_connector_config;
use ctic::constants::{
    DEFAULT_LEASE_DURATION_SECS, DEFAULT_LEASE_RETRY_PERIOD_SECS, ERROR_REQUEUE_DURATION_SECS,
    METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH, METRICS_SERVER_PORT, RESYNC_DURATION_SECS,
    TOKIO_WORKER_THREADS,
};
use ctic::metrics;
use ctic::options::{resolve_connector_env, Cli};
use ctic::reconcilers::{
    reconcile_ingress, run_connector_manager, ConnectorOptions, IngressContext,
};
use futures::StreamExt;
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    runtime::{controller::Action, watcher, Controller},
    Api, Client, ResourceExt,
};
use kube_lease_manager::{LeaseManager, LeaseManagerBuilder};
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] anyhow::Error);

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("ctic-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Initialize logging with custom format
///
/// Respects `RUST_LOG` environment variable if set, otherwise falls back to
/// the `--log-level` flag. Respects `RUST_LOG_FORMAT` environment variable
/// for output format (json or text).
fn initialize_logging(default_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting Cloudflare Tunnel Ingress Controller");
}

/// Start the Prometheus metrics HTTP server
///
/// Serves metrics on the configured port and path (default: 0.0.0.0:8080/metrics)
/// plus a trivial liveness endpoint on /healthz.
fn start_metrics_server() -> tokio::task::JoinHandle<()> {
    info!(
        bind_address = METRICS_SERVER_BIND_ADDRESS,
        port = METRICS_SERVER_PORT,
        path = METRICS_SERVER_PATH,
        "Starting Prometheus metrics HTTP server"
    );

    tokio::spawn(async move {
        async fn metrics_handler() -> String {
            match metrics::gather_metrics() {
                Ok(metrics_text) => metrics_text,
                Err(e) => {
                    error!("Failed to gather metrics: {}", e);
                    String::from("# Error gathering metrics\n")
                }
            }
        }

        let app = Router::new()
            .route(METRICS_SERVER_PATH, get(metrics_handler))
            .route("/healthz", get(|| async { "ok" }));

        let bind_addr = format!("{METRICS_SERVER_BIND_ADDRESS}:{METRICS_SERVER_PORT}");
        let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind metrics server to {bind_addr}: {e}");
                return;
            }
        };

        info!("Metrics server listening on http://{bind_addr}{METRICS_SERVER_PATH}");

        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {e}");
        }
    })
}

/// Leader election configuration
struct LeaderElectionConfig {
    enabled: bool,
    lease_name: String,
    lease_namespace: String,
    identity: String,
    lease_duration: u64,
    retry_period: u64,
}

/// Load leader election configuration from environment variables
fn load_leader_election_config(default_namespace: &str) -> LeaderElectionConfig {
    let enabled = std::env::var("CTIC_ENABLE_LEADER_ELECTION")
        .unwrap_or_else(|_| "true".to_string())
        .parse::<bool>()
        .unwrap_or(true);

    let lease_name = std::env::var("CTIC_LEASE_NAME").unwrap_or_else(|_| "ctic-leader".to_string());

    let lease_namespace = std::env::var("CTIC_LEASE_NAMESPACE")
        .or_else(|_| std::env::var("POD_NAMESPACE"))
        .unwrap_or_else(|_| default_namespace.to_string());

    let lease_duration = std::env::var("CTIC_LEASE_DURATION_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_LEASE_DURATION_SECS);

    let retry_period = std::env::var("CTIC_LEASE_RETRY_PERIOD_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_LEASE_RETRY_PERIOD_SECS);

    let identity = std::env::var("POD_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| format!("ctic-{}", rand::random::<u32>()));

    LeaderElectionConfig {
        enabled,
        lease_name,
        lease_namespace,
        identity,
        lease_duration,
        retry_period,
    }
}

async fn async_main() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(&cli.log_level);

    // Resolve all configuration before touching any remote system; failures
    // here are fatal to startup.
    let (connector_config, config_hash) =
        load_connector_config(cli.cloudflared_config_file.as_deref())?;
    let connector_env = resolve_connector_env()?;
    let connector_options = ConnectorOptions {
        namespace: cli.namespace.clone(),
        image: connector_env.image,
        image_pull_policy: connector_env.image_pull_policy,
        replicas: connector_env.replicas,
        protocol: cli.cloudflared_protocol.clone(),
        extra_args: cli.cloudflared_extra_args.clone(),
        config: connector_config,
        config_hash,
    };

    let cloudflare_api = CloudflareApi::new(&cli.cloudflare_api_token, &cli.cloudflare_account_id)?;
    let identity =
        resolve_or_create_tunnel(&cloudflare_api, &cli.cloudflare_account_id, &cli.tunnel_name)
            .await?;
    info!(
        tunnel_id = %identity.tunnel_id,
        tunnel_name = %identity.tunnel_name,
        "tunnel resolved"
    );

    let tunnel: Arc<dyn TunnelClient> = Arc::new(CloudflareTunnelClient::new(
        cloudflare_api,
        identity.tunnel_id.clone(),
        identity.tunnel_name.clone(),
        cli.dns_comment_template.clone(),
    ));

    let client = Client::try_default().await?;

    let context = Arc::new(IngressContext {
        client: client.clone(),
        tunnel: tunnel.clone(),
        ingress_class_name: cli.ingress_class.clone(),
        controller_class_name: cli.controller_class.clone(),
        cluster_domain: cli.cluster_domain.clone(),
    });

    let _metrics_handle = start_metrics_server();

    let config = load_leader_election_config(&cli.namespace);

    if config.enabled {
        info!(
            lease_name = %config.lease_name,
            lease_namespace = %config.lease_namespace,
            identity = %config.identity,
            lease_duration_secs = config.lease_duration,
            "Leader election enabled"
        );

        info!("Starting leader election, waiting to acquire leadership...");

        let lease_manager = LeaseManagerBuilder::new(client.clone(), &config.lease_name)
            .with_namespace(&config.lease_namespace)
            .with_identity(&config.identity)
            .with_duration(config.lease_duration)
            .with_grace(config.retry_period)
            .build()
            .await?;

        let (leader_rx, lease_handle) = lease_manager.watch().await;

        // Wait until we become leader
        let mut rx = leader_rx.clone();
        while !*rx.borrow_and_update() {
            rx.changed().await?;
        }

        info!("Leadership acquired, starting controllers");

        run_controllers_with_leader_election(
            context,
            client,
            tunnel,
            connector_options,
            leader_rx,
            lease_handle,
        )
        .await?;
    } else {
        run_controllers_without_leader_election(context, client, tunnel, connector_options).await?;
    }

    Ok(())
}

/// Monitor leadership status - returns when leadership is lost or an error occurs
async fn monitor_leadership(
    mut leader_rx: tokio::sync::watch::Receiver<bool>,
) -> Result<(), anyhow::Error> {
    loop {
        leader_rx.changed().await?;
        if !*leader_rx.borrow() {
            return Ok(());
        }
    }
}

/// Run the Ingress controller and the connector manager side by side.
///
/// Neither task is expected to return; a return is a fatal error.
async fn run_all_controllers(
    context: Arc<IngressContext>,
    client: Client,
    tunnel: Arc<dyn TunnelClient>,
    connector_options: ConnectorOptions,
) -> Result<()> {
    tokio::select! {
        result = run_ingress_controller(context) => {
            error!("CRITICAL: Ingress controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("ingress controller exited unexpectedly without error")
        }
        () = run_connector_manager(client, tunnel, connector_options) => {
            anyhow::bail!("connector manager exited unexpectedly")
        }
    }
}

/// Run all controllers without leader election, with signal handling
async fn run_controllers_without_leader_election(
    context: Arc<IngressContext>,
    client: Client,
    tunnel: Arc<dyn TunnelClient>,
    connector_options: ConnectorOptions,
) -> Result<()> {
    warn!("Leader election DISABLED - running without high availability");
    info!("Starting all controllers with signal handling");

    let shutdown_result: Result<()> = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            result.map_err(anyhow::Error::from)
        }

        result = wait_for_sigterm() => {
            info!("Received SIGTERM (pod termination), initiating graceful shutdown...");
            result
        }

        result = run_all_controllers(context, client, tunnel, connector_options) => {
            result
        }
    };

    shutdown_result?;
    info!("Graceful shutdown completed successfully");

    Ok(())
}

/// Run controllers with leader election
///
/// If leadership is lost or SIGTERM/SIGINT is received, all controllers stop
/// and the process exits; the watch framework's at-least-once delivery makes
/// a replacement reconverge.
async fn run_controllers_with_leader_election(
    context: Arc<IngressContext>,
    client: Client,
    tunnel: Arc<dyn TunnelClient>,
    connector_options: ConnectorOptions,
    leader_rx: tokio::sync::watch::Receiver<bool>,
    _lease_handle: tokio::task::JoinHandle<
        Result<LeaseManager, kube_lease_manager::LeaseManagerError>,
    >,
) -> Result<()> {
    info!("Running controllers with leader election and signal handling");

    let shutdown_result: Result<()> = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            result.map_err(anyhow::Error::from)
        }

        result = wait_for_sigterm() => {
            info!("Received SIGTERM (pod termination), initiating graceful shutdown...");
            result
        }

        result = monitor_leadership(leader_rx) => {
            match result {
                Ok(()) => {
                    warn!("Leadership lost! Stopping all controllers...");
                    anyhow::bail!("leadership lost - stepping down")
                }
                Err(e) => {
                    error!("Leadership monitor error: {:?}", e);
                    anyhow::bail!("leadership monitoring failed: {e}")
                }
            }
        }

        result = run_all_controllers(context, client, tunnel, connector_options) => {
            result
        }
    };

    shutdown_result?;
    info!("Graceful shutdown completed successfully, leader election lease released");
    Ok(())
}

async fn wait_for_sigterm() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        sigterm.recv().await;
        Ok(())
    }
    #[cfg(not(unix))]
    {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Run the Ingress controller
async fn run_ingress_controller(context: Arc<IngressContext>) -> Result<()> {
    info!("Starting Ingress controller");

    let api = Api::<Ingress>::all(context.client.clone());

    Controller::new(api, watcher::Config::default())
        .run(reconcile_ingress_wrapper, error_policy, context)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for Ingress
async fn reconcile_ingress_wrapper(
    ingress: Arc<Ingress>,
    ctx: Arc<IngressContext>,
) -> Result<Action, ReconcileError> {
    let start = std::time::Instant::now();
    let namespace = ingress.namespace().unwrap_or_default();
    let name = ingress.name_any();

    debug!(
        ingress = %format!("{namespace}/{name}"),
        "Reconcile wrapper called for Ingress"
    );

    let result = reconcile_ingress(&ctx, &namespace, &name).await;
    let duration = start.elapsed();

    match result {
        Ok(()) => {
            metrics::record_reconciliation("success", duration);
            Ok(Action::requeue(Duration::from_secs(RESYNC_DURATION_SECS)))
        }
        Err(e) => {
            error!("Failed to reconcile Ingress {namespace}/{name}: {e:#}");
            metrics::record_reconciliation("error", duration);
            Err(e.into())
        }
    }
}

/// Error policy: requeue with a fixed delay, the external framework applies
/// its own backoff on repeated failures.
fn error_policy(_ingress: Arc<Ingress>, _err: &ReconcileError, _ctx: Arc<IngressContext>) -> Action {
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}
