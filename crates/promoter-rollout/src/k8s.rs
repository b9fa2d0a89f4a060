//! `ClusterClient` over the Kubernetes API.
//!
//! Workloads are `apps/v1` Deployments in one namespace. Updates are a
//! full `replace` carrying the resourceVersion read earlier, so a
//! concurrent external edit surfaces as a conflict error rather than
//! being merged.

use std::path::Path;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod as K8sPod;
use kube::api::{Api, ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::{debug, info};

use crate::cluster::{ClusterClient, ContainerSpec, ContainerStatus, Pod, Workload};
use crate::error::ClusterError;

pub struct KubeCluster {
    client: Client,
    namespace: String,
}

impl KubeCluster {
    /// Connect using an explicit kubeconfig, or the inferred in-cluster /
    /// `$KUBECONFIG` configuration when `kubeconfig` is `None`.
    pub async fn connect(namespace: &str, kubeconfig: Option<&Path>) -> Result<Self, ClusterError> {
        let config = match kubeconfig {
            Some(path) => {
                let kc = Kubeconfig::read_from(path).map_err(request_err)?;
                Config::from_custom_kubeconfig(kc, &KubeConfigOptions::default())
                    .await
                    .map_err(request_err)?
            }
            None => Config::infer().await.map_err(request_err)?,
        };
        let client = Client::try_from(config).map_err(request_err)?;
        info!(%namespace, "kubernetes client ready");
        Ok(Self::with_client(client, namespace))
    }

    pub fn with_client(client: Client, namespace: &str) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
        }
    }

    fn deployments(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn pods(&self) -> Api<K8sPod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

#[async_trait::async_trait]
impl ClusterClient for KubeCluster {
    async fn get_workload(&self, name: &str) -> Result<Workload, ClusterError> {
        let deployment = self
            .deployments()
            .get(name)
            .await
            .map_err(|e| map_kube_err(name, e))?;
        Ok(workload_from_deployment(&deployment))
    }

    async fn update_workload(&self, workload: &Workload) -> Result<(), ClusterError> {
        let api = self.deployments();
        let mut deployment = api
            .get(&workload.name)
            .await
            .map_err(|e| map_kube_err(&workload.name, e))?;

        apply_workload(&mut deployment, workload);

        api.replace(&workload.name, &PostParams::default(), &deployment)
            .await
            .map_err(|e| map_kube_err(&workload.name, e))?;
        debug!(workload = %workload.name, namespace = %self.namespace, "deployment replaced");
        Ok(())
    }

    async fn list_pods(&self, selector: &str) -> Result<Vec<Pod>, ClusterError> {
        let list = self
            .pods()
            .list(&ListParams::default().labels(selector))
            .await
            .map_err(request_err)?;
        Ok(list.items.iter().map(pod_from_k8s).collect())
    }
}

fn request_err(e: impl std::fmt::Display) -> ClusterError {
    ClusterError::Request(e.to_string())
}

fn map_kube_err(name: &str, e: kube::Error) -> ClusterError {
    match e {
        kube::Error::Api(resp) if resp.code == 404 => ClusterError::NotFound(name.to_string()),
        other => ClusterError::Request(other.to_string()),
    }
}

fn workload_from_deployment(deployment: &Deployment) -> Workload {
    let template = deployment.spec.as_ref().map(|s| &s.template);

    let template_labels = template
        .and_then(|t| t.metadata.as_ref())
        .and_then(|m| m.labels.clone())
        .unwrap_or_default();

    let containers = template
        .and_then(|t| t.spec.as_ref())
        .map(|spec| {
            spec.containers
                .iter()
                .map(|c| ContainerSpec {
                    name: c.name.clone(),
                    image: c.image.clone().unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default();

    Workload {
        name: deployment.metadata.name.clone().unwrap_or_default(),
        template_labels,
        containers,
        resource_version: deployment.metadata.resource_version.clone(),
    }
}

/// Copy container images and the resourceVersion from `workload` onto `deployment`.
fn apply_workload(deployment: &mut Deployment, workload: &Workload) {
    if workload.resource_version.is_some() {
        deployment.metadata.resource_version = workload.resource_version.clone();
    }

    let Some(pod_spec) = deployment
        .spec
        .as_mut()
        .and_then(|s| s.template.spec.as_mut())
    else {
        return;
    };

    for container in pod_spec.containers.iter_mut() {
        if let Some(wanted) = workload.containers.iter().find(|c| c.name == container.name) {
            container.image = Some(wanted.image.clone());
        }
    }
}

fn pod_from_k8s(pod: &K8sPod) -> Pod {
    let status = pod.status.as_ref();
    let containers = status
        .and_then(|s| s.container_statuses.as_ref())
        .map(|statuses| {
            statuses
                .iter()
                .map(|cs| ContainerStatus {
                    name: cs.name.clone(),
                    image: cs.image.clone(),
                    running: cs.state.as_ref().is_some_and(|st| st.running.is_some()),
                    ready: cs.ready,
                })
                .collect()
        })
        .unwrap_or_default();

    Pod {
        name: pod.metadata.name.clone().unwrap_or_default(),
        labels: pod.metadata.labels.clone().unwrap_or_default(),
        phase: status.and_then(|s| s.phase.clone()).unwrap_or_default(),
        containers,
    }
}
