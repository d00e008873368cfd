//! Cluster snapshot construction
//!
//! One snapshot lists pods once, nodes once and, when asked to, runs the
//! metric catalog once. Listing failures are fatal. A metrics failure only
//! removes usage data and is reported as a warning.

use crate::context::SnapshotContext;
use crate::error::{MetricsError, SnapshotError};
use crate::health::{components, compute_status, ComponentHealth, ComponentStatus};
use crate::metrics::{MetricResultsByItem, MetricsConnector, QueryCatalog};
use crate::node::{is_node_ready, is_pod_active, node_name, pod_node_name, NodeInfo};
use crate::resources::{NodeResourceStatus, NodeStatus, ResourceQuantity};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Node, Pod};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

/// Read-only view of cluster topology
#[async_trait]
pub trait ClusterLister: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<Node>, SnapshotError>;

    /// Pods in phase Running or Pending, across all namespaces
    async fn list_active_pods(&self) -> Result<Vec<Pod>, SnapshotError>;
}

/// Point-in-time resource status of every node in the cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    /// In node listing order
    pub nodes: Vec<NodeResourceStatus>,
    /// Set when usage data could not be obtained
    pub warning: Option<String>,
    pub sources: BTreeMap<String, ComponentHealth>,
}

/// Cluster-wide sums over all nodes of a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterTotals {
    pub nodes: usize,
    pub ready_nodes: usize,
    pub capacity: ResourceQuantity,
    pub allocatable: ResourceQuantity,
    pub requested: ResourceQuantity,
    pub allocated: ResourceQuantity,
    pub gpus_in_use: usize,
    pub fractional_gpus: usize,
}

impl Snapshot {
    pub fn status(&self) -> ComponentStatus {
        compute_status(&self.sources)
    }

    pub fn node(&self, name: &str) -> Option<&NodeResourceStatus> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    pub fn totals(&self) -> ClusterTotals {
        let mut totals = ClusterTotals::default();
        for node in &self.nodes {
            totals.nodes += 1;
            if node.info.status == NodeStatus::Ready {
                totals.ready_nodes += 1;
            }
            totals.capacity += node.capacity;
            totals.allocatable += node.allocatable;
            totals.requested += node.requested;
            totals.allocated += node.allocated;
            totals.gpus_in_use += node.gpus_in_use;
            totals.fractional_gpus += node.number_of_fractional_allocated_gpus;
        }
        totals
    }
}

/// What happened to the metrics side of a snapshot
#[derive(Debug)]
pub enum MetricsOutcome {
    /// Metrics were not requested
    Skipped,
    Collected,
    /// Metrics were requested but could not be obtained
    Degraded(MetricsError),
}

/// Nodes with their pods and metrics, in node listing order
#[derive(Debug)]
pub struct GatheredNodes {
    pub nodes: Vec<NodeInfo>,
    pub metrics: MetricsOutcome,
}

/// Gather each node with the pods bound to it and its metrics
pub async fn gather_node_infos(
    ctx: &SnapshotContext,
    cluster: &dyn ClusterLister,
    metrics: Option<&dyn MetricsConnector>,
) -> Result<GatheredNodes, SnapshotError> {
    let all_pods = cluster.list_active_pods().await?;
    let nodes = cluster.list_nodes().await?;

    let mut outcome = MetricsOutcome::Skipped;
    let mut metrics_by_node: Option<MetricResultsByItem> = None;
    if ctx.include_metrics {
        match query_metrics(ctx, metrics).await {
            Ok(items) => {
                metrics_by_node = Some(items);
                outcome = MetricsOutcome::Collected;
            }
            Err(e) => {
                ctx.logger().log_metrics_degraded(&e);
                outcome = MetricsOutcome::Degraded(e);
            }
        }
    }

    let mut by_node = group_pods_by_node(all_pods);
    let infos = nodes
        .into_iter()
        .map(|node| {
            let name = node_name(&node).to_string();
            // A down node cannot host schedulable work, whatever stale
            // bindings still point at it.
            let pods = if is_node_ready(&node) {
                by_node.remove(&name).unwrap_or_default()
            } else {
                Vec::new()
            };
            let metrics = metrics_by_node
                .as_mut()
                .and_then(|items| items.remove(&name));
            NodeInfo {
                node,
                pods,
                metrics,
            }
        })
        .collect();

    Ok(GatheredNodes {
        nodes: infos,
        metrics: outcome,
    })
}

/// Build the resource status of every node
pub async fn build_snapshot(
    ctx: &SnapshotContext,
    cluster: &dyn ClusterLister,
    metrics: Option<&dyn MetricsConnector>,
) -> Result<Snapshot, SnapshotError> {
    let started = Instant::now();
    let taken_at = Utc::now();

    let gathered = gather_node_infos(ctx, cluster, metrics).await?;

    let mut sources = BTreeMap::new();
    sources.insert(components::CLUSTER.to_string(), ComponentHealth::healthy());

    let mut warning = None;
    match gathered.metrics {
        MetricsOutcome::Collected => {
            sources.insert(components::METRICS.to_string(), ComponentHealth::healthy());
        }
        MetricsOutcome::Degraded(e) => {
            warning = Some(format!(
                "Missing some data.\nreason: can't access the metrics server\ncause: {}",
                e
            ));
            sources.insert(
                components::METRICS.to_string(),
                ComponentHealth::degraded(e.to_string()),
            );
        }
        MetricsOutcome::Skipped => {}
    }

    let pods: usize = gathered.nodes.iter().map(|i| i.pods.len()).sum();
    let nodes: Vec<NodeResourceStatus> = gathered
        .nodes
        .iter()
        .map(|info| info.resource_status(ctx))
        .collect();

    ctx.logger().log_snapshot_built(
        nodes.len(),
        pods,
        nodes.iter().any(|n| n.has_usage_data),
        started.elapsed(),
    );

    Ok(Snapshot {
        taken_at,
        nodes,
        warning,
        sources,
    })
}

async fn query_metrics(
    ctx: &SnapshotContext,
    metrics: Option<&dyn MetricsConnector>,
) -> Result<MetricResultsByItem, MetricsError> {
    let connector =
        metrics.ok_or_else(|| MetricsError::unavailable("no metrics backend configured"))?;
    let executor = connector.connect().await?;
    executor
        .run_queries_grouped_by_label(&QueryCatalog::node_queries(), &ctx.node_label)
        .await
}

fn group_pods_by_node(pods: Vec<Pod>) -> HashMap<String, Vec<Pod>> {
    let mut by_node: HashMap<String, Vec<Pod>> = HashMap::new();
    for pod in pods {
        if !is_pod_active(&pod) {
            continue;
        }
        let Some(node) = pod_node_name(&pod).map(str::to_string) else {
            continue;
        };
        by_node.entry(node).or_default().push(pod);
    }
    by_node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricSample, MetricsExecutor};
    use k8s_openapi::api::core::v1::{NodeCondition, NodeStatus as K8sNodeStatus, PodSpec, PodStatus};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn node(name: &str, ready: bool, gpus: &str) -> Node {
        let resources: BTreeMap<String, Quantity> =
            [("nvidia.com/gpu".to_string(), Quantity(gpus.to_string()))].into();
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            status: Some(K8sNodeStatus {
                capacity: Some(resources.clone()),
                allocatable: Some(resources),
                conditions: Some(vec![NodeCondition {
                    type_: "Ready".to_string(),
                    status: if ready { "True" } else { "False" }.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn pod(name: &str, node_name: &str, phase: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                node_name: Some(node_name.to_string()),
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            }),
        }
    }

    struct FakeCluster {
        nodes: Vec<Node>,
        pods: Vec<Pod>,
        fail_nodes: bool,
        calls: AtomicUsize,
    }

    impl FakeCluster {
        fn new(nodes: Vec<Node>, pods: Vec<Pod>) -> Self {
            Self {
                nodes,
                pods,
                fail_nodes: false,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ClusterLister for FakeCluster {
        async fn list_nodes(&self) -> Result<Vec<Node>, SnapshotError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_nodes {
                return Err(SnapshotError::ListNodes("forbidden".to_string()));
            }
            Ok(self.nodes.clone())
        }

        async fn list_active_pods(&self) -> Result<Vec<Pod>, SnapshotError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.pods.clone())
        }
    }

    struct CpuOnlyExecutor;

    #[async_trait]
    impl MetricsExecutor for CpuOnlyExecutor {
        async fn run_query(&self, expression: &str) -> Result<Vec<MetricSample>, MetricsError> {
            if expression == crate::metrics::MetricQuery::UsedCpus.expression() {
                Ok(vec![MetricSample::new([("node", "a")], 12.0)])
            } else {
                Ok(Vec::new())
            }
        }
    }

    struct Connector {
        reachable: bool,
    }

    #[async_trait]
    impl MetricsConnector for Connector {
        async fn connect(&self) -> Result<Box<dyn MetricsExecutor>, MetricsError> {
            if self.reachable {
                Ok(Box::new(CpuOnlyExecutor))
            } else {
                Err(MetricsError::unavailable("connection refused"))
            }
        }
    }

    #[tokio::test]
    async fn test_nodes_keep_listing_order() {
        let cluster = FakeCluster::new(
            vec![node("c", true, "1"), node("a", true, "1"), node("b", true, "1")],
            Vec::new(),
        );
        let ctx = SnapshotContext::default().without_metrics();

        let snapshot = build_snapshot(&ctx, &cluster, None).await.unwrap();
        let names: Vec<&str> = snapshot.nodes.iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
        assert_eq!(cluster.calls.load(Ordering::SeqCst), 2);
        assert!(snapshot.warning.is_none());
        assert!(!snapshot.sources.contains_key(components::METRICS));
        assert_eq!(snapshot.status(), ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_pods_attach_to_their_ready_node_only() {
        let cluster = FakeCluster::new(
            vec![node("up", true, "2"), node("down", false, "2")],
            vec![
                pod("p1", "up", "Running"),
                pod("p2", "up", "Pending"),
                pod("p3", "up", "Succeeded"),
                pod("stale", "down", "Running"),
            ],
        );
        let ctx = SnapshotContext::default().without_metrics();

        let gathered = gather_node_infos(&ctx, &cluster, None).await.unwrap();
        assert_eq!(gathered.nodes[0].pods.len(), 2);
        assert!(gathered.nodes[1].pods.is_empty());
        assert!(matches!(gathered.metrics, MetricsOutcome::Skipped));
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let mut cluster = FakeCluster::new(vec![node("a", true, "1")], Vec::new());
        cluster.fail_nodes = true;
        let ctx = SnapshotContext::default();

        let err = build_snapshot(&ctx, &cluster, Some(&Connector { reachable: true }))
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::ListNodes(_)));
    }

    #[tokio::test]
    async fn test_unreachable_metrics_degrade_to_warning() {
        let cluster = FakeCluster::new(vec![node("a", true, "1")], Vec::new());
        let ctx = SnapshotContext::default();

        let snapshot = build_snapshot(&ctx, &cluster, Some(&Connector { reachable: false }))
            .await
            .unwrap();
        let warning = snapshot.warning.as_deref().unwrap();
        assert!(warning.contains("connection refused"));
        assert_eq!(snapshot.status(), ComponentStatus::Degraded);
        assert!(!snapshot.nodes[0].has_usage_data);
    }

    #[tokio::test]
    async fn test_missing_connector_degrades_to_warning() {
        let cluster = FakeCluster::new(vec![node("a", true, "1")], Vec::new());
        let snapshot = build_snapshot(&SnapshotContext::default(), &cluster, None)
            .await
            .unwrap();
        assert!(snapshot.warning.is_some());
    }

    #[tokio::test]
    async fn test_metrics_attach_by_node_label() {
        let cluster = FakeCluster::new(vec![node("a", true, "1"), node("b", true, "1")], Vec::new());
        let ctx = SnapshotContext::default();

        let snapshot = build_snapshot(&ctx, &cluster, Some(&Connector { reachable: true }))
            .await
            .unwrap();
        assert!(snapshot.warning.is_none());
        assert_eq!(snapshot.status(), ComponentStatus::Healthy);

        let a = snapshot.node("a").unwrap();
        assert!(a.has_usage_data);
        assert_eq!(a.usage.cpus, 12.0);

        let b = snapshot.node("b").unwrap();
        assert!(!b.has_usage_data);
        assert_eq!(b.usage.cpus, 0.0);
    }

    #[tokio::test]
    async fn test_totals() {
        let cluster = FakeCluster::new(
            vec![node("a", true, "4"), node("b", false, "2")],
            Vec::new(),
        );
        let snapshot = build_snapshot(&SnapshotContext::default().without_metrics(), &cluster, None)
            .await
            .unwrap();

        let totals = snapshot.totals();
        assert_eq!(totals.nodes, 2);
        assert_eq!(totals.ready_nodes, 1);
        assert_eq!(totals.capacity.gpus, 6.0);
        assert_eq!(totals.gpus_in_use, 0);
    }

    #[tokio::test]
    async fn test_snapshot_serializes() {
        let cluster = FakeCluster::new(vec![node("a", true, "1")], Vec::new());
        let snapshot = build_snapshot(&SnapshotContext::default().without_metrics(), &cluster, None)
            .await
            .unwrap();

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["nodes"][0]["info"]["name"], "a");
        assert_eq!(json["sources"]["cluster"]["status"], "healthy");
    }
}
