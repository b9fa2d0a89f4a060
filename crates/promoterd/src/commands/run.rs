//! `promoterd run`: wire the collaborators and drive the scheduler.
//!
//! 1. Opens the dedup store and connects to the cluster
//! 2. Builds the approval client, notifier, executor and watcher
//! 3. Spawns the scheduler and the /ping + /status server
//! 4. On SIGINT/SIGTERM flips the shutdown signal and waits at most
//!    `shutdown_grace` for the in-flight cycle

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use promoter_approval::FeishuClient;
use promoter_core::PromoterConfig;
use promoter_pipeline::{Processor, Scheduler};
use promoter_rollout::{
    ClusterClient, ConvergenceWatcher, ExclusionPolicy, KubeCluster, RolloutExecutor, WatchConfig,
    naming_from_config,
};
use promoter_state::DedupStore;

pub async fn run(config: PromoterConfig) -> anyhow::Result<()> {
    info!("promoter daemon starting");

    let period = config.scheduler.period()?;
    let shutdown_grace = config.scheduler.shutdown_grace()?;

    // ── Collaborators ──────────────────────────────────────────

    if let Some(dir) = config.state.path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let store = Arc::new(DedupStore::open(&config.state.path)?);
    info!(path = ?config.state.path, "dedup store opened");

    let cluster: Arc<dyn ClusterClient> = Arc::new(
        KubeCluster::connect(&config.cluster.namespace, config.cluster.kubeconfig.as_deref()).await?,
    );
    info!(namespace = %config.cluster.namespace, "cluster client connected");

    let approvals = Arc::new(FeishuClient::from_config(
        &config.approval,
        config.approval.access_token()?,
    )?);
    let notifier = promoter_notify::from_config(&config.notify)?;

    let executor = RolloutExecutor::new(cluster.clone(), notifier.clone())
        .with_policy(ExclusionPolicy::new(&config.rollout.excluded)?);
    let watcher = ConvergenceWatcher::new(
        cluster,
        WatchConfig {
            interval: config.convergence.interval()?,
            deadline: config.convergence.deadline()?,
        },
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let processor = Processor::new(
        approvals,
        store,
        executor,
        watcher,
        notifier,
        shutdown_rx.clone(),
    )
    .with_naming(naming_from_config(&config.rollout.image_naming))
    .with_expiry_grace(config.approval.expiry_grace()?);

    // ── Scheduler ──────────────────────────────────────────────

    let (reports_tx, reports_rx) = watch::channel(None);
    let scheduler = Scheduler::new(period).with_reports(reports_tx);
    let scheduler_shutdown = shutdown_rx.clone();
    let mut scheduler_handle =
        tokio::spawn(async move { scheduler.run(&processor, scheduler_shutdown).await });

    // ── HTTP server ────────────────────────────────────────────

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "health server listening");

    let mut server_shutdown = shutdown_rx.clone();
    let server_handle = tokio::spawn(async move {
        let server = axum::serve(listener, promoterd::health::router(reports_rx))
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.wait_for(|stop| *stop).await;
            });
        if let Err(e) = server.await {
            error!(error = %e, "health server error");
        }
    });

    // ── Wait for a signal ──────────────────────────────────────

    shutdown_signal().await;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(shutdown_grace, &mut scheduler_handle).await {
        Ok(Ok(cycles)) => info!(cycles, "scheduler finished"),
        Ok(Err(e)) => error!(error = %e, "scheduler task failed"),
        Err(_) => {
            warn!(grace = ?shutdown_grace, "in-flight cycle did not finish within grace, abandoning it");
            scheduler_handle.abort();
        }
    }
    let _ = server_handle.await;

    info!("promoter daemon stopped");
    Ok(())
}

/// Resolve on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
