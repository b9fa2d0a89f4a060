//! Rollout error types.

use thiserror::Error;

/// Errors returned by a [`ClusterClient`](crate::ClusterClient).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClusterError {
    #[error("workload not found: {0}")]
    NotFound(String),

    #[error("cluster request failed: {0}")]
    Request(String),
}

/// Terminal failures of [`RolloutExecutor::apply`](crate::RolloutExecutor::apply).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("workload {0} is excluded from automated rollout")]
    NotEligible(String),

    #[error("workload {0} not found")]
    NotFound(String),

    #[error("container named {0} not found in workload {0}")]
    ContainerNotFound(String),

    #[error("invalid image reference {0:?}: expected <repository>:<tag>")]
    InvalidImageFormat(String),

    #[error("failed to submit workload {workload}: {reason}")]
    Submit { workload: String, reason: String },

    #[error("failed to fetch workload {workload}: {reason}")]
    Cluster { workload: String, reason: String },
}

/// Non-converged endings of a convergence watch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WatchError {
    #[error("no healthy replica of {workload} running {image} before the deadline")]
    TimedOut { workload: String, image: String },

    #[error("convergence watch for {0} cancelled")]
    Cancelled(String),

    #[error("workload {0} disappeared while waiting for convergence")]
    NotFound(String),
}
