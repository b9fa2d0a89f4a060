//! Cluster collaborator: the narrow view of the cluster a rollout needs.
//!
//! Workloads and pods are reduced to the fields the executor and watcher
//! read. [`InMemoryCluster`] holds them in a map and is what the tests
//! and local dry runs drive.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::ClusterError;

/// A container entry in a workload's pod template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
}

/// A replicated, container-based workload (a Deployment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub name: String,
    /// Labels on the pod template; pods are selected by equality on all of them.
    pub template_labels: BTreeMap<String, String>,
    pub containers: Vec<ContainerSpec>,
    /// Version token for optimistic replace, when the backend has one.
    pub resource_version: Option<String>,
}

impl Workload {
    pub fn container_mut(&mut self, name: &str) -> Option<&mut ContainerSpec> {
        self.containers.iter_mut().find(|c| c.name == name)
    }
}

/// Live status of one container in a pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    pub image: String,
    pub running: bool,
    pub ready: bool,
}

/// A replica of a workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    /// Pod phase as reported by the cluster, e.g. "Running" or "Pending".
    pub phase: String,
    pub containers: Vec<ContainerStatus>,
}

impl Pod {
    pub fn is_running(&self) -> bool {
        self.phase == "Running"
    }
}

/// Operations the rollout pipeline needs from a cluster.
#[async_trait::async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetch a workload by name. Absence is `ClusterError::NotFound`.
    async fn get_workload(&self, name: &str) -> Result<Workload, ClusterError>;

    /// Replace a workload's definition with `workload`.
    async fn update_workload(&self, workload: &Workload) -> Result<(), ClusterError>;

    /// List pods matching an equality label selector (`k=v,k2=v2`).
    async fn list_pods(&self, selector: &str) -> Result<Vec<Pod>, ClusterError>;
}

/// Build an equality label selector from a label map.
///
/// Keys are emitted in sorted order so the selector is stable.
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_selector(selector: &str) -> Vec<(&str, &str)> {
    selector
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .collect()
}

#[derive(Default)]
struct InMemoryState {
    workloads: HashMap<String, Workload>,
    pods: Vec<Pod>,
    /// Errors returned by the next `list_pods` calls, oldest first.
    pod_list_failures: Vec<ClusterError>,
    update_failure: Option<ClusterError>,
}

/// A cluster held entirely in memory.
///
/// Cloning shares the same underlying state.
#[derive(Clone, Default)]
pub struct InMemoryCluster {
    state: Arc<Mutex<InMemoryState>>,
    gets: Arc<AtomicUsize>,
    updates: Arc<AtomicUsize>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single-container workload whose container shares its name.
    pub fn with_workload(self, name: &str, image: &str) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), name.to_string());
        self.insert_workload(Workload {
            name: name.to_string(),
            template_labels: labels,
            containers: vec![ContainerSpec {
                name: name.to_string(),
                image: image.to_string(),
            }],
            resource_version: None,
        });
        self
    }

    pub fn insert_workload(&self, workload: Workload) {
        self.lock().workloads.insert(workload.name.clone(), workload);
    }

    pub fn workload(&self, name: &str) -> Option<Workload> {
        self.lock().workloads.get(name).cloned()
    }

    pub fn remove_workload(&self, name: &str) {
        self.lock().workloads.remove(name);
    }

    /// Replace every pod carrying `app=<workload>` with `pods`.
    pub fn set_pods(&self, workload: &str, pods: Vec<Pod>) {
        let mut state = self.lock();
        state
            .pods
            .retain(|p| p.labels.get("app").map(String::as_str) != Some(workload));
        state.pods.extend(pods);
    }

    /// Make the next `list_pods` call fail with `error`.
    pub fn fail_next_pod_list(&self, error: ClusterError) {
        self.lock().pod_list_failures.push(error);
    }

    /// Make the next `update_workload` call fail with `error`.
    pub fn fail_next_update(&self, error: ClusterError) {
        self.lock().update_failure = Some(error);
    }

    /// Number of `get_workload` calls served.
    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `update_workload` calls served.
    pub fn update_calls(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A running, ready pod for `workload` whose only container runs `image`.
pub fn healthy_pod(workload: &str, pod: &str, image: &str) -> Pod {
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), workload.to_string());
    Pod {
        name: pod.to_string(),
        labels,
        phase: "Running".to_string(),
        containers: vec![ContainerStatus {
            name: workload.to_string(),
            image: image.to_string(),
            running: true,
            ready: true,
        }],
    }
}

#[async_trait::async_trait]
impl ClusterClient for InMemoryCluster {
    async fn get_workload(&self, name: &str) -> Result<Workload, ClusterError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.lock()
            .workloads
            .get(name)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound(name.to_string()))
    }

    async fn update_workload(&self, workload: &Workload) -> Result<(), ClusterError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if let Some(err) = state.update_failure.take() {
            return Err(err);
        }
        if !state.workloads.contains_key(&workload.name) {
            return Err(ClusterError::NotFound(workload.name.clone()));
        }
        state
            .workloads
            .insert(workload.name.clone(), workload.clone());
        Ok(())
    }

    async fn list_pods(&self, selector: &str) -> Result<Vec<Pod>, ClusterError> {
        let mut state = self.lock();
        if !state.pod_list_failures.is_empty() {
            return Err(state.pod_list_failures.remove(0));
        }
        let wanted = parse_selector(selector);
        Ok(state
            .pods
            .iter()
            .filter(|pod| {
                wanted
                    .iter()
                    .all(|(k, v)| pod.labels.get(*k).map(String::as_str) == Some(*v))
            })
            .cloned()
            .collect())
    }
}
