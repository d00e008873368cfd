//! Structured logging for snapshot events
//!
//! Every event carries an `event` field and the cluster name so that JSON
//! log output can be filtered without parsing messages.

use crate::error::{MetricError, MetricsError};
use crate::resources::ResourceQuantity;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Structured logger for aggregation events
#[derive(Debug, Clone)]
pub struct SnapshotLogger {
    cluster: String,
}

impl SnapshotLogger {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
        }
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Log a completed snapshot
    pub fn log_snapshot_built(
        &self,
        nodes: usize,
        pods: usize,
        with_metrics: bool,
        elapsed: Duration,
    ) {
        info!(
            event = "snapshot_built",
            cluster = %self.cluster,
            nodes = nodes,
            pods = pods,
            with_metrics = with_metrics,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Built cluster resource snapshot"
        );
    }

    /// Log that the snapshot continues without usage data
    pub fn log_metrics_degraded(&self, error: &MetricsError) {
        warn!(
            event = "metrics_degraded",
            cluster = %self.cluster,
            error = %error,
            "Metrics backend unavailable, continuing without usage data"
        );
    }

    /// Log one metric that could not be extracted for a node
    pub fn log_extraction_failure(&self, node: &str, metric: &str, error: &MetricError) {
        debug!(
            event = "metric_extraction_failed",
            cluster = %self.cluster,
            node = %node,
            metric = %metric,
            error = %error,
            "Failed to extract metric, skipping"
        );
    }

    /// Log a physical GPU whose fractional shares add up to more than one
    pub fn log_fractional_overcommit(&self, node: &str, gpu_index: &str, total_share: f64) {
        debug!(
            event = "fractional_overcommit",
            cluster = %self.cluster,
            node = %node,
            gpu = %gpu_index,
            total_share = total_share,
            "Fractional GPU shares exceed one device"
        );
    }

    /// Log a node whose allocatable exceeds its capacity
    pub fn log_capacity_inconsistency(
        &self,
        node: &str,
        capacity: &ResourceQuantity,
        allocatable: &ResourceQuantity,
    ) {
        debug!(
            event = "capacity_inconsistency",
            cluster = %self.cluster,
            node = %node,
            capacity = ?capacity,
            allocatable = ?allocatable,
            "Allocatable exceeds capacity"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_logger_creation() {
        let logger = SnapshotLogger::new("gpu-prod");
        assert_eq!(logger.cluster(), "gpu-prod");

        logger.log_snapshot_built(3, 12, true, Duration::from_millis(40));
        logger.log_metrics_degraded(&MetricsError::unavailable("connection refused"));
        logger.log_extraction_failure("n1", "usedGpu", &MetricError::NoResults("usedGpu".into()));
        logger.log_fractional_overcommit("n1", "0", 1.3);
        logger.log_capacity_inconsistency(
            "n1",
            &ResourceQuantity::new(32.0, 0.0, 2.0, 0.0),
            &ResourceQuantity::new(32.0, 0.0, 3.0, 0.0),
        );
    }
}
