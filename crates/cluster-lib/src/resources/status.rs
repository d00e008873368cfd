//! Per-pod and per-node resource status records

use super::ResourceQuantity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Requested / allocated / limited rollup of one pod's containers
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PodResourceStatus {
    pub requested: ResourceQuantity,
    /// Same as `requested` except GPUs, which also count fractional slices
    pub allocated: ResourceQuantity,
    pub limited: ResourceQuantity,
}

impl PodResourceStatus {
    /// Accumulate another pod's status into this one
    pub fn add(&mut self, other: &PodResourceStatus) {
        self.requested += other.requested;
        self.allocated += other.allocated;
        self.limited += other.limited;
    }
}

/// Readiness of a node as reported by its `Ready` condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Ready,
    NotReady,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Ready => write!(f, "Ready"),
            NodeStatus::NotReady => write!(f, "NotReady"),
        }
    }
}

/// Identity and readiness of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeGeneralInfo {
    pub name: String,
    pub roles: Vec<String>,
    pub ip_address: Option<String>,
    pub status: NodeStatus,
}

/// Per-device detail for one physical GPU on a node.
///
/// Metric-derived fields are `None` when the backend had no value for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gpu {
    /// Device ordinal on the node, as labelled by the metrics backend
    pub index_id: String,
    /// Share of the device owned by pods, in 0..=1. Fractional sharing uses
    /// the summed fraction; otherwise the observed occupancy.
    pub allocated: Option<f64>,
    /// Total device memory in bytes
    pub memory: Option<f64>,
    /// Used device memory in bytes
    pub memory_usage: Option<f64>,
    /// Percent of device memory in use
    pub memory_utilization: Option<f64>,
    pub memory_usage_and_utilization: String,
    pub idle_time: Option<Duration>,
    /// Percent busy
    pub utilization: Option<f64>,
}

/// Resource status of one node in one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResourceStatus {
    pub info: NodeGeneralInfo,
    pub requested: ResourceQuantity,
    pub allocated: ResourceQuantity,
    pub limited: ResourceQuantity,
    pub capacity: ResourceQuantity,
    pub allocatable: ResourceQuantity,
    /// Zero-valued unless `has_usage_data`
    pub usage: ResourceQuantity,
    pub number_of_fractional_allocated_gpus: usize,
    pub gpus_in_use: usize,
    pub node_gpus: Vec<Gpu>,
    /// Metrics were attached to this node, so `usage` is observed rather
    /// than a placeholder
    pub has_usage_data: bool,
}

impl NodeResourceStatus {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Node advertises at least one whole GPU as allocatable
    pub fn is_gpu_exclusive(&self) -> bool {
        self.allocatable.gpus - self.number_of_fractional_allocated_gpus as f64 > 0.0
    }
}

/// Display string and percent utilization for a used/total memory pair
pub fn memory_usage_and_utilization(
    usage: Option<f64>,
    total: Option<f64>,
) -> (String, Option<f64>) {
    match (usage, total) {
        (Some(used), Some(total)) if total > 0.0 => {
            let utilization = used / total * 100.0;
            (
                format!(
                    "{} / {} ({:.0}%)",
                    format_bytes(used),
                    format_bytes(total),
                    utilization
                ),
                Some(utilization),
            )
        }
        (Some(used), _) => (format_bytes(used), None),
        (None, Some(total)) => (format!("- / {}", format_bytes(total)), None),
        (None, None) => ("-".to_string(), None),
    }
}

/// Format a byte count with binary units
pub fn format_bytes(bytes: f64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;
    const TIB: f64 = GIB * 1024.0;

    if bytes >= TIB {
        format!("{:.2} TiB", bytes / TIB)
    } else if bytes >= GIB {
        format!("{:.2} GiB", bytes / GIB)
    } else if bytes >= MIB {
        format!("{:.2} MiB", bytes / MIB)
    } else if bytes >= KIB {
        format!("{:.2} KiB", bytes / KIB)
    } else {
        format!("{:.0} B", bytes)
    }
}
