//! Rollout executor: points one workload at a new version.
//!
//! A single `apply` call checks the exclusion policy, fetches the
//! workload, rewrites the tag of the container named after the workload,
//! and submits the whole definition back. Every terminal branch sends
//! exactly one notification.

use std::sync::Arc;

use tracing::{info, warn};

use promoter_core::{Notifier, Severity};

use crate::cluster::ClusterClient;
use crate::error::{ClusterError, ExecutionError};
use crate::image::rewrite_image_tag;
use crate::policy::ExclusionPolicy;

/// A successfully submitted image change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub workload: String,
    pub previous_image: String,
    pub new_image: String,
}

pub struct RolloutExecutor {
    cluster: Arc<dyn ClusterClient>,
    notifier: Arc<dyn Notifier>,
    policy: ExclusionPolicy,
}

impl RolloutExecutor {
    pub fn new(cluster: Arc<dyn ClusterClient>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            cluster,
            notifier,
            policy: ExclusionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ExclusionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Apply `version` to `workload` and report the result.
    pub async fn apply(&self, workload: &str, version: &str) -> Result<Applied, ExecutionError> {
        let result = self.submit(workload, version).await;

        match &result {
            Ok(applied) => {
                info!(%workload, image = %applied.new_image, "workload updated");
                let message = format!(
                    "Workload {workload} updated successfully. New image: {}",
                    applied.new_image
                );
                self.notifier.notify(&message, workload, Severity::Info).await;
            }
            Err(e) => {
                warn!(%workload, %version, error = %e, "rollout not applied");
                let severity = match e {
                    ExecutionError::NotEligible(_) => Severity::Error,
                    _ => Severity::Warn,
                };
                self.notifier.notify(&e.to_string(), workload, severity).await;
            }
        }

        result
    }

    async fn submit(&self, name: &str, version: &str) -> Result<Applied, ExecutionError> {
        if let Some(token) = self.policy.excluded_by(name) {
            info!(workload = %name, %token, "workload excluded by policy");
            return Err(ExecutionError::NotEligible(name.to_string()));
        }

        let mut workload = self
            .cluster
            .get_workload(name)
            .await
            .map_err(|e| match e {
                ClusterError::NotFound(_) => ExecutionError::NotFound(name.to_string()),
                ClusterError::Request(reason) => ExecutionError::Cluster {
                    workload: name.to_string(),
                    reason,
                },
            })?;

        let container = workload
            .container_mut(name)
            .ok_or_else(|| ExecutionError::ContainerNotFound(name.to_string()))?;

        let previous_image = container.image.clone();
        let new_image = rewrite_image_tag(&previous_image, version)?;
        container.image = new_image.clone();

        self.cluster
            .update_workload(&workload)
            .await
            .map_err(|e| match e {
                ClusterError::NotFound(_) => ExecutionError::NotFound(name.to_string()),
                ClusterError::Request(reason) => ExecutionError::Submit {
                    workload: name.to_string(),
                    reason,
                },
            })?;

        Ok(Applied {
            workload: name.to_string(),
            previous_image,
            new_image,
        })
    }
}
