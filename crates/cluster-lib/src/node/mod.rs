//! Per-node resource aggregation
//!
//! Combines, for one node:
//! - pod-derived requested / allocated / limited totals
//! - node-reported capacity and allocatable, corrected for fractional sharing
//! - usage and per-GPU detail from the metrics backend, when present
//!
//! Nothing here performs I/O; every input comes from an immutable snapshot.

mod fractional;
mod info;


pub use fractional::{detect_fractional_gpus, pod_gpu_fraction, shared_gpu_index, FractionalGpus};
pub use info::{
    is_node_ready, is_pod_active, node_general_info, node_internal_address, node_name, node_roles,
    pod_node_name,
};

use crate::context::SnapshotContext;
use crate::error::MetricError;
use crate::metrics::{
    first_value, group_metrics, MetricQuery, MetricResultsByQueryName, QueryCatalog,
};
use crate::observability::SnapshotLogger;
use crate::resources::{
    memory_usage_and_utilization, Gpu, NodeResourceStatus, PodResourceStatus, ResourceQuantity,
};
use k8s_openapi::api::core::v1::{Node, Pod};
use std::time::Duration;

/// A node together with the pods bound to it and its metrics, as gathered
/// for one snapshot
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub node: Node,
    pub pods: Vec<Pod>,
    pub metrics: Option<MetricResultsByQueryName>,
}

impl NodeInfo {
    pub fn name(&self) -> &str {
        node_name(&self.node)
    }

    pub fn resource_status(&self, ctx: &SnapshotContext) -> NodeResourceStatus {
        compute_node_resource_status(&self.node, &self.pods, self.metrics.as_ref(), ctx)
    }
}

/// Sum a pod's container requests and limits.
///
/// `allocated` adds the pod's GPU fraction on top of its requested GPUs, as a
/// fractional pod holds a slice of a device it never requested as a unit.
pub fn pod_resource_status(pod: &Pod, ctx: &SnapshotContext) -> PodResourceStatus {
    let mut status = PodResourceStatus::default();

    if let Some(spec) = pod.spec.as_ref() {
        for container in &spec.containers {
            let Some(resources) = container.resources.as_ref() else {
                continue;
            };
            status.requested +=
                ResourceQuantity::from_resource_list(resources.requests.as_ref(), &ctx.gpu_resource_name);
            status.limited +=
                ResourceQuantity::from_resource_list(resources.limits.as_ref(), &ctx.gpu_resource_name);
        }
    }

    status.allocated = status.requested;
    if let Some(fraction) = pod_gpu_fraction(pod, ctx) {
        status.allocated.gpus += fraction;
    }

    status
}

/// Build the resource status of one node.
///
/// Metric extraction failures are logged and skipped field by field, so a
/// node always gets every value that could be computed.
pub fn compute_node_resource_status(
    node: &Node,
    pods: &[Pod],
    metrics: Option<&MetricResultsByQueryName>,
    ctx: &SnapshotContext,
) -> NodeResourceStatus {
    let logger = ctx.logger();
    let info = node_general_info(node);

    let mut pods_status = PodResourceStatus::default();
    for pod in pods {
        pods_status.add(&pod_resource_status(pod, ctx));
    }

    let node_status = node.status.as_ref();
    let mut capacity = ResourceQuantity::from_resource_list(
        node_status.and_then(|s| s.capacity.as_ref()),
        &ctx.gpu_resource_name,
    );
    let mut allocatable = ResourceQuantity::from_resource_list(
        node_status.and_then(|s| s.allocatable.as_ref()),
        &ctx.gpu_resource_name,
    );

    // A shared device is withheld from the node's allocatable and may be
    // missing from its capacity as well.
    let fractional = detect_fractional_gpus(pods, ctx);
    let fractional_count = fractional.len();
    if fractional_count > 0 {
        let total_gpus = allocatable.gpus + fractional_count as f64;
        allocatable.gpus = total_gpus;
        if total_gpus > capacity.gpus {
            capacity.gpus = total_gpus;
        }
    }

    for (index, share) in &fractional {
        if *share > 1.0 {
            logger.log_fractional_overcommit(&info.name, index, *share);
        }
    }
    if !allocatable.fits_within(&capacity) {
        logger.log_capacity_inconsistency(&info.name, &capacity, &allocatable);
    }

    let whole_gpus_limited = pods_status.limited.gpus.max(0.0).floor() as usize;

    let mut status = NodeResourceStatus {
        info,
        requested: pods_status.requested,
        allocated: pods_status.allocated,
        limited: pods_status.limited,
        capacity,
        allocatable,
        usage: ResourceQuantity::default(),
        number_of_fractional_allocated_gpus: fractional_count,
        gpus_in_use: fractional_count + whole_gpus_limited,
        node_gpus: Vec::new(),
        has_usage_data: false,
    };

    if let Some(data) = metrics {
        apply_metrics(&mut status, data, &fractional, ctx, &logger);
    }

    status
}

fn apply_metrics(
    status: &mut NodeResourceStatus,
    data: &MetricResultsByQueryName,
    fractional: &FractionalGpus,
    ctx: &SnapshotContext,
    logger: &SnapshotLogger,
) {
    let node = status.info.name.clone();
    status.has_usage_data = true;

    let fields: [(&mut f64, MetricQuery); 5] = [
        (&mut status.usage.cpus, MetricQuery::UsedCpus),
        (&mut status.usage.gpus, MetricQuery::UsedGpus),
        (&mut status.usage.memory, MetricQuery::UsedCpusMemory),
        (&mut status.usage.gpu_memory, MetricQuery::UsedGpusMemory),
        (&mut status.capacity.gpu_memory, MetricQuery::TotalGpusMemory),
    ];
    for (target, query) in fields {
        match first_value(data, query) {
            Ok(value) => *target = value,
            Err(e) => logger.log_extraction_failure(&node, query.name(), &e),
        }
    }

    match node_gpus(data, fractional, ctx) {
        Ok(gpus) => status.node_gpus = gpus,
        Err(e) => logger.log_extraction_failure(&node, "gpus", &e),
    }
}

/// Per-GPU detail from the metrics grouped by GPU index.
///
/// A fractionally shared index reports the summed pod fractions as its
/// allocation; otherwise the observed pod occupancy percentage is used as a
/// share of the device. Devices without metrics are not listed.
fn node_gpus(
    data: &MetricResultsByQueryName,
    fractional: &FractionalGpus,
    ctx: &SnapshotContext,
) -> Result<Vec<Gpu>, MetricError> {
    let catalog = QueryCatalog::node_queries();
    let names: Vec<&str> = MetricQuery::PER_GPU.iter().map(|q| q.name()).collect();
    let groups = group_metrics(&ctx.gpu_label, data, &catalog, &names)?;

    let mut gpus: Vec<Gpu> = groups
        .into_iter()
        .map(|(index, values)| {
            let value = |query: MetricQuery| values.get(query.name()).copied();

            let allocated = match fractional.get(&index) {
                Some(share) => Some(*share),
                None => value(MetricQuery::GpuUsedByPod).map(|percent| percent / 100.0),
            };
            let memory = value(MetricQuery::TotalGpuMemory);
            let memory_usage = value(MetricQuery::UsedGpuMemory);
            let (memory_usage_and_utilization, memory_utilization) =
                memory_usage_and_utilization(memory_usage, memory);
            // Negative, NaN and out-of-range samples leave the idle time unknown
            let idle_time = value(MetricQuery::GpuIdleTime)
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok());

            Gpu {
                index_id: index,
                allocated,
                memory,
                memory_usage,
                memory_utilization,
                memory_usage_and_utilization,
                idle_time,
                utilization: value(MetricQuery::UsedGpu),
            }
        })
        .collect();

    gpus.sort_by_key(|gpu| (gpu.index_id.parse::<u32>().unwrap_or(u32::MAX), gpu.index_id.clone()));
    Ok(gpus)
}
