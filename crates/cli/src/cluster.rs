//! Kubernetes API access

use anyhow::{Context, Result};
use async_trait::async_trait;
use cluster_lib::node::is_pod_active;
use cluster_lib::{ClusterLister, SnapshotError};
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client};
use tracing::debug;

/// Pods that still hold node resources
const ACTIVE_POD_SELECTOR: &str = "status.phase!=Succeeded,status.phase!=Failed";

/// Build a Kubernetes client from an explicit kubeconfig, or infer one from
/// the environment (`KUBECONFIG`, `~/.kube/config`, in-cluster)
pub async fn connect(kubeconfig: Option<&str>) -> Result<Client> {
    let config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("Failed to read kubeconfig {}", path))?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .context("Invalid kubeconfig")?
        }
        None => kube::Config::infer()
            .await
            .context("Failed to find Kubernetes configuration")?,
    };

    Client::try_from(config).context("Failed to create Kubernetes client")
}

/// Lists nodes and active pods across all namespaces
pub struct KubeClusterLister {
    client: Client,
}

impl KubeClusterLister {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterLister for KubeClusterLister {
    async fn list_nodes(&self) -> Result<Vec<Node>, SnapshotError> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes
            .list(&ListParams::default())
            .await
            .map_err(|e| SnapshotError::ListNodes(e.to_string()))?;

        debug!(nodes = list.items.len(), "Listed nodes");
        Ok(list.items)
    }

    async fn list_active_pods(&self) -> Result<Vec<Pod>, SnapshotError> {
        let pods: Api<Pod> = Api::all(self.client.clone());
        let list = pods
            .list(&ListParams::default().fields(ACTIVE_POD_SELECTOR))
            .await
            .map_err(|e| SnapshotError::ListPods(e.to_string()))?;

        // The field selector also admits phase Unknown
        let active: Vec<Pod> = list.items.into_iter().filter(is_pod_active).collect();
        debug!(pods = active.len(), "Listed active pods");
        Ok(active)
    }
}
