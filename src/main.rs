// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use clap::Parser;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client};
use private_dns::{
    auth::{discover_project_id, ServiceAccountKey, TokenProvider, TokenSource},
    cloud_dns::{build_http_client, CloudDnsClient},
    config::Config,
    constants::{EVENT_CHANNEL_CAPACITY, SHUTDOWN_GRACE_PERIOD_SECS, TOKIO_WORKER_THREADS},
    informer::run_pod_informer,
    instance_source::{InstanceSource, KubeInstanceSource},
    reconciler::Reconciler,
    record_store::{memory::InMemoryZone, DnsApi, RecordStore},
    scanner::PeriodicScanner,
    server::serve_metrics,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    let config = Config::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("private-dns")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

/// Initialize logging.
///
/// Respects `RUST_LOG` if set, otherwise defaults to INFO (DEBUG with `--debug`).
/// `RUST_LOG_FORMAT=json` switches to JSON output.
fn init_tracing(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.default_log_filter()));

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
}

async fn async_main(config: Config) -> Result<()> {
    init_tracing(&config);
    config.validate()?;

    info!(
        namespace = %config.namespace,
        label = %config.label,
        domain = %config.domain,
        zone = %config.zone,
        format = ?config.name_format(),
        dry_run = config.dry_run,
        "Starting private DNS operator"
    );

    let cancel = CancellationToken::new();

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    let pods: Api<Pod> = Api::namespaced(client, &config.namespace);

    let dns_api = build_dns_api(&config).await?;
    let store = Arc::new(RecordStore::new(dns_api, cancel.clone()));
    let source: Arc<dyn InstanceSource> = Arc::new(KubeInstanceSource::new(
        pods.clone(),
        config.label_selector(),
    ));

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    let reconciler = Reconciler::new(
        store.clone(),
        source.clone(),
        config.namer(),
        config.timeout,
        cancel.clone(),
    );
    let scanner = PeriodicScanner::new(
        store,
        source,
        config.namer(),
        config.fallback_sync_interval,
        cancel.clone(),
    )
    .with_stale_deletion(config.delete_stale_records);

    let mut informer = tokio::spawn(run_pod_informer(
        pods,
        config.label_selector(),
        tx,
        config.watcher_sync_interval,
        cancel.clone(),
    ));
    let mut reconciler = tokio::spawn(reconciler.run(rx));
    let mut scanner = tokio::spawn(scanner.run());
    let mut metrics_server = tokio::spawn(serve_metrics(config.metrics_addr, cancel.clone()));

    // Every task runs until shutdown; any early exit stops the whole process
    let exit: Result<()> = tokio::select! {
        () = shutdown_signal() => {
            info!("Shutdown signal received");
            Ok(())
        }
        result = &mut informer => match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.context("pod informer failed")),
            Err(e) => Err(anyhow::anyhow!("pod informer panicked: {e}")),
        },
        result = &mut reconciler => {
            error!("CRITICAL: reconciler exited unexpectedly");
            result.context("reconciler panicked")
        }
        result = &mut scanner => {
            error!("CRITICAL: zone scanner exited unexpectedly");
            result.context("zone scanner panicked")
        }
        result = &mut metrics_server => match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.context("metrics server failed")),
            Err(e) => Err(anyhow::anyhow!("metrics server panicked: {e}")),
        },
    };

    cancel.cancel();
    wait_for_exit("pod informer", informer).await;
    wait_for_exit("reconciler", reconciler).await;
    wait_for_exit("zone scanner", scanner).await;
    wait_for_exit("metrics server", metrics_server).await;

    match &exit {
        Ok(()) => info!("Private DNS operator stopped"),
        Err(e) => error!(error = %e, "Private DNS operator stopped after a failure"),
    }
    exit
}

/// Give a task a grace period to finish after cancellation.
async fn wait_for_exit<T>(name: &str, handle: JoinHandle<T>) {
    if handle.is_finished() {
        return;
    }
    let grace = Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS);
    if tokio::time::timeout(grace, handle).await.is_err() {
        warn!(task = name, "Task did not stop within the shutdown grace period");
    }
}

/// Build the Cloud DNS client, or an in-memory zone in dry-run mode.
async fn build_dns_api(config: &Config) -> Result<Arc<dyn DnsApi>> {
    if config.dry_run {
        warn!("Dry-run mode: changes are logged and kept in memory only");
        return Ok(Arc::new(InMemoryZone::dry_run()));
    }

    let http = build_http_client()?;
    let key = match &config.sa_file {
        Some(path) => Some(ServiceAccountKey::from_file(path).await?),
        None => None,
    };
    let project = resolve_project(
        config.project.as_deref(),
        key.as_ref(),
        &http,
        &config.metadata_url,
    )
    .await?;

    let source = match key {
        Some(key) => TokenSource::ServiceAccount(key),
        None => TokenSource::Metadata {
            base_url: config.metadata_url.clone(),
        },
    };
    let tokens = Arc::new(TokenProvider::new(source, http.clone()));
    let credentials = tokens.describe();

    let client = CloudDnsClient::new(
        http,
        tokens,
        &config.cloud_dns_endpoint,
        project,
        config.zone.clone(),
    )?;
    info!(
        project = %client.project(),
        zone = %client.zone(),
        credentials = %credentials,
        "Using Cloud DNS"
    );
    Ok(Arc::new(client))
}

/// Pick the GCP project: the flag, then the key file, then the metadata server.
async fn resolve_project(
    flag: Option<&str>,
    key: Option<&ServiceAccountKey>,
    http: &reqwest::Client,
    metadata_url: &str,
) -> Result<String> {
    if let Some(project) = flag.map(str::trim).filter(|p| !p.is_empty()) {
        return Ok(project.to_string());
    }
    if let Some(project) = key
        .and_then(|k| k.project_id.as_deref())
        .filter(|p| !p.is_empty())
    {
        debug!(project = %project, "Using project from service account key");
        return Ok(project.to_string());
    }

    debug!("No project configured, asking the metadata server");
    discover_project_id(http, metadata_url)
        .await
        .context("--project not set and the metadata server could not provide one")
}

/// Resolve on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod main_tests;
