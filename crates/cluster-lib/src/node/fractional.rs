//! Fractional GPU detection
//!
//! A pod that asks for less than one GPU is bound by the scheduler to a
//! physical device and marked with that device's index. Pods with whole-GPU
//! requests carry no marker and are invisible here; they are accounted as
//! ordinary `limited.gpus`.

use super::info::is_pod_active;
use crate::context::SnapshotContext;
use k8s_openapi::api::core::v1::Pod;
use std::collections::BTreeMap;
use tracing::debug;

/// Physical GPU index -> summed fraction of the pods sharing it
pub type FractionalGpus = BTreeMap<String, f64>;

fn pod_marker<'a>(pod: &'a Pod, key: &str) -> Option<&'a str> {
    let metadata = &pod.metadata;
    metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .or_else(|| metadata.labels.as_ref().and_then(|l| l.get(key)))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Index of the physical GPU a fractional pod is bound to
pub fn shared_gpu_index<'a>(pod: &'a Pod, ctx: &SnapshotContext) -> Option<&'a str> {
    pod_marker(pod, &ctx.gpu_index_annotation)
}

/// Fraction of a GPU requested by the pod, if it declares one
pub fn pod_gpu_fraction(pod: &Pod, ctx: &SnapshotContext) -> Option<f64> {
    let raw = pod_marker(pod, &ctx.gpu_fraction_annotation)?;
    match raw.parse::<f64>() {
        Ok(fraction) if fraction.is_finite() && fraction > 0.0 => Some(fraction),
        _ => {
            debug!(
                pod = pod.metadata.name.as_deref().unwrap_or_default(),
                value = %raw,
                "Ignoring invalid GPU fraction"
            );
            None
        }
    }
}

/// Sum the fractions of active, index-marked pods per physical GPU index.
///
/// An index is shared exactly when it has an entry. A marked pod with an
/// unreadable fraction still makes its index shared, contributing zero.
/// Sums above 1.0 are kept: they describe the cluster as it is.
pub fn detect_fractional_gpus(pods: &[Pod], ctx: &SnapshotContext) -> FractionalGpus {
    let mut shared = FractionalGpus::new();

    for pod in pods.iter().filter(|p| is_pod_active(p)) {
        let Some(index) = shared_gpu_index(pod, ctx) else {
            continue;
        };
        *shared.entry(index.to_string()).or_insert(0.0) += pod_gpu_fraction(pod, ctx).unwrap_or(0.0);
    }

    shared
}
