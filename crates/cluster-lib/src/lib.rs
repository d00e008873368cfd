//! Cluster resource and GPU utilization aggregation
//!
//! This crate reconciles live cluster topology with metrics-backend
//! telemetry into per-node and per-GPU resource snapshots:
//! - Metric query catalog and label grouping
//! - Resource quantity model
//! - Fractional GPU detection
//! - Per-node aggregation and whole-cluster snapshots

pub mod context;
pub mod error;
pub mod health;
pub mod metrics;
pub mod node;
pub mod observability;
pub mod resources;
pub mod snapshot;

pub use context::SnapshotContext;
pub use error::{MetricError, MetricsError, QuantityError, SnapshotError};
pub use health::{ComponentHealth, ComponentStatus};
pub use metrics::{MetricsConnector, MetricsExecutor, QueryCatalog};
pub use node::{compute_node_resource_status, NodeInfo};
pub use observability::SnapshotLogger;
pub use resources::{Gpu, NodeResourceStatus, PodResourceStatus, ResourceQuantity};
pub use snapshot::{build_snapshot, ClusterLister, ClusterTotals, Snapshot};
