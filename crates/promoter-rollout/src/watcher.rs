//! Convergence watcher: waits until a new version is actually live.
//!
//! After a workload is submitted, the watcher re-reads it on a fixed
//! interval, selects its pods by the template labels, and declares
//! convergence as soon as any running pod has a running, ready container
//! with the expected image. The overall deadline is wall-clock from the
//! start of the watch and races every poll and every pause, so a slow
//! cluster call cannot stretch it. A shutdown signal ends the watch at
//! once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cluster::{ClusterClient, Pod, label_selector};
use crate::error::{ClusterError, WatchError};

/// Poll cadence and overall deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchConfig {
    pub interval: Duration,
    pub deadline: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            deadline: Duration::from_secs(120),
        }
    }
}

/// Evidence that the new version is serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converged {
    pub workload: String,
    pub pod: String,
    pub image: String,
    pub elapsed: Duration,
}

pub struct ConvergenceWatcher {
    cluster: Arc<dyn ClusterClient>,
    config: WatchConfig,
}

impl ConvergenceWatcher {
    pub fn new(cluster: Arc<dyn ClusterClient>, config: WatchConfig) -> Self {
        Self { cluster, config }
    }

    pub fn config(&self) -> WatchConfig {
        self.config
    }

    /// Watch with the configured deadline.
    pub async fn watch(
        &self,
        workload: &str,
        expected_image: &str,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Converged, WatchError> {
        self.await_convergence(workload, expected_image, self.config.deadline, shutdown)
            .await
    }

    /// Poll until one healthy replica runs `expected_image`, `deadline`
    /// elapses, or `shutdown` fires.
    pub async fn await_convergence(
        &self,
        workload: &str,
        expected_image: &str,
        deadline: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<Converged, WatchError> {
        let started = Instant::now();
        let expires = tokio::time::sleep(deadline);
        tokio::pin!(expires);

        let timed_out = || WatchError::TimedOut {
            workload: workload.to_string(),
            image: expected_image.to_string(),
        };
        let cancelled = || WatchError::Cancelled(workload.to_string());

        info!(%workload, image = %expected_image, ?deadline, "waiting for convergence");

        loop {
            if *shutdown.borrow() {
                return Err(cancelled());
            }

            tokio::select! {
                biased;
                _ = shutdown.changed() => return Err(cancelled()),
                _ = &mut expires => {
                    warn!(%workload, image = %expected_image, "convergence deadline exceeded");
                    return Err(timed_out());
                }
                polled = self.poll_once(workload, expected_image) => {
                    if let Some(pod) = polled? {
                        let elapsed = started.elapsed();
                        info!(%workload, %pod, image = %expected_image, ?elapsed, "workload converged");
                        return Ok(Converged {
                            workload: workload.to_string(),
                            pod,
                            image: expected_image.to_string(),
                            elapsed,
                        });
                    }
                }
            }

            debug!(%workload, interval = ?self.config.interval, "not converged yet, retrying");

            tokio::select! {
                biased;
                _ = shutdown.changed() => return Err(cancelled()),
                _ = &mut expires => {
                    warn!(%workload, image = %expected_image, "convergence deadline exceeded");
                    return Err(timed_out());
                }
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
    }

    /// One poll tick. `Ok(Some(pod))` on convergence, `Ok(None)` to retry.
    ///
    /// Only a vanished workload is fatal; transient cluster errors are
    /// retried until the deadline.
    async fn poll_once(&self, workload: &str, expected_image: &str) -> Result<Option<String>, WatchError> {
        let definition = match self.cluster.get_workload(workload).await {
            Ok(w) => w,
            Err(ClusterError::NotFound(_)) => return Err(WatchError::NotFound(workload.to_string())),
            Err(e) => {
                warn!(%workload, error = %e, "failed to fetch workload during watch");
                return Ok(None);
            }
        };

        if definition.template_labels.is_empty() {
            warn!(%workload, "workload has no template labels, cannot select its pods");
            return Ok(None);
        }

        let selector = label_selector(&definition.template_labels);
        let pods = match self.cluster.list_pods(&selector).await {
            Ok(pods) => pods,
            Err(e) => {
                warn!(%workload, %selector, error = %e, "failed to list pods during watch");
                return Ok(None);
            }
        };

        if pods.is_empty() {
            warn!(%workload, %selector, "no pods currently match the workload");
            return Ok(None);
        }

        Ok(find_converged_pod(&pods, expected_image).map(|p| p.name.clone()))
    }
}

/// The first running pod with a running, ready container on `expected_image`.
pub fn find_converged_pod<'a>(pods: &'a [Pod], expected_image: &str) -> Option<&'a Pod> {
    pods.iter().find(|pod| {
        if !pod.is_running() {
            debug!(pod = %pod.name, phase = %pod.phase, "pod not running");
            return false;
        }
        pod.containers.iter().any(|c| {
            debug!(
                pod = %pod.name,
                container = %c.name,
                image = %c.image,
                ready = c.ready,
                "checking container"
            );
            c.image == expected_image && c.running && c.ready
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ContainerStatus, InMemoryCluster, healthy_pod};

    const IMAGE: &str = "registry/repo/svcA:2.0.0";

    fn watcher(cluster: &InMemoryCluster) -> ConvergenceWatcher {
        ConvergenceWatcher::new(Arc::new(cluster.clone()), WatchConfig::default())
    }

    fn cluster() -> InMemoryCluster {
        InMemoryCluster::new().with_workload("svcA", IMAGE)
    }

    #[tokio::test(start_paused = true)]
    async fn converges_on_first_healthy_pod() {
        let cluster = cluster();
        cluster.set_pods("svcA", vec![healthy_pod("svcA", "svcA-1", IMAGE)]);
        let (_tx, rx) = watch::channel(false);

        let converged = watcher(&cluster).watch("svcA", IMAGE, rx).await.unwrap();

        assert_eq!(converged.pod, "svcA-1");
        assert!(converged.elapsed < Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn converges_once_pods_appear() {
        let cluster = cluster();
        let (_tx, rx) = watch::channel(false);

        let late = cluster.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(25)).await;
            late.set_pods("svcA", vec![healthy_pod("svcA", "svcA-2", IMAGE)]);
        });

        let converged = watcher(&cluster).watch("svcA", IMAGE, rx).await.unwrap();

        assert_eq!(converged.pod, "svcA-2");
        assert!(converged.elapsed >= Duration::from_secs(25));
        assert!(converged.elapsed < Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_no_earlier_than_deadline() {
        let cluster = cluster();
        let (_tx, rx) = watch::channel(false);
        let started = Instant::now();

        let err = watcher(&cluster)
            .await_convergence("svcA", IMAGE, Duration::from_secs(45), rx)
            .await
            .unwrap_err();

        assert!(matches!(err, WatchError::TimedOut { .. }));
        assert!(started.elapsed() >= Duration::from_secs(45));
    }

    #[tokio::test(start_paused = true)]
    async fn unready_or_stale_pods_do_not_converge() {
        let cluster = cluster();
        let mut unready = healthy_pod("svcA", "svcA-1", IMAGE);
        unready.containers[0].ready = false;
        let mut pending = healthy_pod("svcA", "svcA-2", IMAGE);
        pending.phase = "Pending".to_string();
        let stale = healthy_pod("svcA", "svcA-3", "registry/repo/svcA:1.0.0");
        cluster.set_pods("svcA", vec![unready, pending, stale]);
        let (_tx, rx) = watch::channel(false);

        let err = watcher(&cluster)
            .await_convergence("svcA", IMAGE, Duration::from_secs(30), rx)
            .await
            .unwrap_err();

        assert!(matches!(err, WatchError::TimedOut { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn vanished_workload_fails_immediately() {
        let cluster = InMemoryCluster::new();
        let (_tx, rx) = watch::channel(false);
        let started = Instant::now();

        let err = watcher(&cluster).watch("svcA", IMAGE, rx).await.unwrap_err();

        assert_eq!(err, WatchError::NotFound("svcA".to_string()));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_promptly() {
        let cluster = cluster();
        let (tx, rx) = watch::channel(false);
        let started = Instant::now();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(15)).await;
            let _ = tx.send(true);
        });

        let err = watcher(&cluster).watch("svcA", IMAGE, rx).await.unwrap_err();

        assert_eq!(err, WatchError::Cancelled("svcA".to_string()));
        assert!(started.elapsed() < Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn already_shut_down_returns_cancelled() {
        let cluster = cluster();
        cluster.set_pods("svcA", vec![healthy_pod("svcA", "svcA-1", IMAGE)]);
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let err = watcher(&cluster).watch("svcA", IMAGE, rx).await.unwrap_err();
        assert!(matches!(err, WatchError::Cancelled(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_list_failure_is_retried() {
        let cluster = cluster();
        cluster.set_pods("svcA", vec![healthy_pod("svcA", "svcA-1", IMAGE)]);
        cluster.fail_next_pod_list(ClusterError::Request("etcd timeout".to_string()));
        let (_tx, rx) = watch::channel(false);

        let converged = watcher(&cluster).watch("svcA", IMAGE, rx).await.unwrap();

        assert_eq!(converged.pod, "svcA-1");
        assert!(converged.elapsed >= Duration::from_secs(10));
    }

    #[test]
    fn find_converged_pod_requires_running_state() {
        let mut pod = healthy_pod("svcA", "svcA-1", IMAGE);
        pod.containers = vec![ContainerStatus {
            name: "svcA".to_string(),
            image: IMAGE.to_string(),
            running: false,
            ready: true,
        }];
        assert!(find_converged_pod(&[pod], IMAGE).is_none());
    }
}
