//! Explicit configuration passed into snapshot and aggregation calls

use crate::observability::SnapshotLogger;
use serde::{Deserialize, Serialize};

/// Extended resource name of a whole NVIDIA GPU
pub const DEFAULT_GPU_RESOURCE: &str = "nvidia.com/gpu";
/// Pod annotation naming the physical GPU index a fractional pod is bound to
pub const DEFAULT_GPU_INDEX_ANNOTATION: &str = "runai-gpu";
/// Pod annotation holding the fraction of a GPU the pod asked for
pub const DEFAULT_GPU_FRACTION_ANNOTATION: &str = "gpu-fraction";

/// Names and switches that drive one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotContext {
    /// Cluster display name, attached to log events
    pub cluster_name: String,
    pub gpu_resource_name: String,
    pub gpu_index_annotation: String,
    pub gpu_fraction_annotation: String,
    /// Metrics label carrying the node name
    pub node_label: String,
    /// Metrics label carrying the GPU index
    pub gpu_label: String,
    /// Query the metrics backend for usage data
    pub include_metrics: bool,
}

impl Default for SnapshotContext {
    fn default() -> Self {
        Self {
            cluster_name: "default".to_string(),
            gpu_resource_name: DEFAULT_GPU_RESOURCE.to_string(),
            gpu_index_annotation: DEFAULT_GPU_INDEX_ANNOTATION.to_string(),
            gpu_fraction_annotation: DEFAULT_GPU_FRACTION_ANNOTATION.to_string(),
            node_label: "node".to_string(),
            gpu_label: "gpu".to_string(),
            include_metrics: true,
        }
    }
}

impl SnapshotContext {
    pub fn without_metrics(mut self) -> Self {
        self.include_metrics = false;
        self
    }

    pub fn with_cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = name.into();
        self
    }

    pub fn logger(&self) -> SnapshotLogger {
        SnapshotLogger::new(&self.cluster_name)
    }
}
