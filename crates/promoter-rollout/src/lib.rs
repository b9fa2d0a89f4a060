//! promoter-rollout: apply a version to a workload and confirm it went live.
//!
//! # Components
//!
//! - **`cluster`**: `ClusterClient` trait, workload/pod model, in-memory cluster
//! - **`k8s`**: `ClusterClient` over the Kubernetes API (`kube`)
//! - **`policy`**: name-based exclusion from automated rollout
//! - **`image`**: tag rewrite and expected-image naming strategies
//! - **`executor`**: rewrite a workload's image and submit it
//! - **`watcher`**: poll until one healthy replica runs the new image
//!
//! ```text
//! apply(name, version) ──► Applied ──► ImageNaming ──► await_convergence
//!        │                                                │
//!        └─ ExecutionError                 Converged / TimedOut / Cancelled
//! ```

pub mod cluster;
pub mod error;
pub mod executor;
pub mod image;
pub mod k8s;
pub mod policy;
pub mod watcher;

pub use cluster::{
    ClusterClient, ContainerSpec, ContainerStatus, InMemoryCluster, Pod, Workload, healthy_pod,
    label_selector,
};
pub use error::{ClusterError, ExecutionError, WatchError};
pub use executor::{Applied, RolloutExecutor};
pub use image::{AppliedImage, ImageNaming, RegistryImage, naming_from_config, rewrite_image_tag};
pub use k8s::KubeCluster;
pub use policy::ExclusionPolicy;
pub use watcher::{Converged, ConvergenceWatcher, WatchConfig};
