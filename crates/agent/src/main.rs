//! Energy Agent - per-workload energy attribution agent
//!
//! This binary runs as a DaemonSet on each Kubernetes node, resolving
//! kernel-visible process identifiers to pod/container identities for the
//! energy estimation pipeline.

use agent_lib::{
    health::{components, HealthRegistry},
    kubelet::{alive_pod_uids, KubeletClient, KubeletConfig, PodLister},
    observability::{AgentMetrics, StructuredLogger},
    resolver::{CgroupPathIndexer, IdentityResolver, PodMetadataCache},
};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting energy-agent");

    // Load configuration
    let config = config::AgentConfig::load()?;
    info!(
        node_name = %config.node_name,
        resolution_mode = %config.resolution_mode,
        "Agent configured"
    );

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::RESOLVER).await;
    health_registry.register(components::CGROUP_INDEX).await;
    health_registry.register(components::POD_CACHE).await;
    health_registry.register(components::KUBELET).await;

    // Initialize metrics
    let metrics = AgentMetrics::new();

    // Initialize structured logger
    let logger = StructuredLogger::new(&config.node_name);
    logger.log_startup(AGENT_VERSION, &config.resolution_mode);

    // Wire up the resolution core
    let kubelet: Arc<dyn PodLister> = Arc::new(
        KubeletClient::new(KubeletConfig {
            endpoint: config.kubelet_endpoint.clone(),
            token_path: config.kubelet_token_path.clone().into(),
            timeout: Duration::from_millis(config.kubelet_timeout_ms),
        })
        .context("Failed to create kubelet client")?,
    );

    let indexer = Arc::new(CgroupPathIndexer::with_timeout(
        &config.cgroup_root,
        Duration::from_millis(config.walk_timeout_ms),
    ));
    let pod_cache = Arc::new(PodMetadataCache::new(Arc::clone(&kubelet)));
    let resolver = Arc::new(IdentityResolver::with_proc_root(
        Arc::clone(&indexer),
        Arc::clone(&pod_cache),
        config.mode(),
        &config.proc_root,
    ));

    // Warm the pod cache so the first sampling tick does not pay for a
    // full sync
    match pod_cache.refresh(None).await {
        Ok(_) => health_registry.set_healthy(components::KUBELET).await,
        Err(err) => {
            logger.log_kubelet_unreachable(&format!("{err:#}"));
            health_registry
                .set_degraded(components::KUBELET, format!("{err:#}"))
                .await;
        }
    }

    // Create shared application state
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics.clone()));

    // Mark agent as ready after initialization
    health_registry.set_ready(true).await;

    // Start health and metrics server
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Alive-pod GC: prune per-pod state for pods that disappeared, on a
    // slower cadence than sampling
    let gc_handle = tokio::spawn(pod_gc_loop(
        Duration::from_secs(config.pod_gc_interval_secs),
        kubelet,
        pod_cache,
        resolver,
        indexer,
        health_registry.clone(),
        metrics,
        logger.clone(),
    ));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    gc_handle.abort();
    api_handle.abort();

    Ok(())
}

/// Periodically refresh the pod list, prune dead-pod cache entries, and
/// publish cache-size gauges
#[allow(clippy::too_many_arguments)]
async fn pod_gc_loop(
    interval: Duration,
    kubelet: Arc<dyn PodLister>,
    pod_cache: Arc<PodMetadataCache>,
    resolver: Arc<IdentityResolver>,
    indexer: Arc<CgroupPathIndexer>,
    health_registry: HealthRegistry,
    metrics: AgentMetrics,
    logger: StructuredLogger,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match alive_pod_uids(kubelet.as_ref()).await {
            Ok(alive) => {
                pod_cache.retain_pods(&alive);
                metrics.set_pods_alive(alive.len() as i64);
                health_registry.set_healthy(components::KUBELET).await;
                logger.log_pod_gc(alive.len(), pod_cache.len());
            }
            Err(err) => {
                // no new information; keep current state and try again
                warn!(error = %format!("{err:#}"), "alive-pod listing failed, skipping GC pass");
                health_registry
                    .set_degraded(components::KUBELET, format!("{err:#}"))
                    .await;
            }
        }

        metrics.set_cache_sizes(
            pod_cache.len() as i64,
            resolver.cached_ids() as i64,
            indexer.len() as i64,
        );
        metrics.set_cgroup_walks(indexer.walk_count() as i64);
    }
}
