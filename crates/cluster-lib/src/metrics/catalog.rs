//! Fixed catalog of named PromQL queries
//!
//! Node-level queries are summed `by (node)`; per-GPU queries are summed
//! `by (node, gpu)` so their results can be grouped a second time by GPU
//! index within a node.

use crate::error::MetricError;
use std::collections::BTreeMap;

/// Every query the aggregator knows how to interpret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricQuery {
    TotalGpusMemory,
    UsedGpusMemory,
    UsedCpusMemory,
    UsedCpus,
    UsedGpus,
    GpuIdleTime,
    UsedGpu,
    GpuUsedByPod,
    UsedGpuMemory,
    TotalGpuMemory,
}

impl MetricQuery {
    pub const ALL: [MetricQuery; 10] = [
        MetricQuery::TotalGpusMemory,
        MetricQuery::UsedGpusMemory,
        MetricQuery::UsedCpusMemory,
        MetricQuery::UsedCpus,
        MetricQuery::UsedGpus,
        MetricQuery::GpuIdleTime,
        MetricQuery::UsedGpu,
        MetricQuery::GpuUsedByPod,
        MetricQuery::UsedGpuMemory,
        MetricQuery::TotalGpuMemory,
    ];

    /// Queries whose results carry a `gpu` label
    pub const PER_GPU: [MetricQuery; 5] = [
        MetricQuery::GpuIdleTime,
        MetricQuery::UsedGpu,
        MetricQuery::UsedGpuMemory,
        MetricQuery::TotalGpuMemory,
        MetricQuery::GpuUsedByPod,
    ];

    /// Symbolic name, used as the key of result sets
    pub fn name(&self) -> &'static str {
        match self {
            MetricQuery::TotalGpusMemory => "totalGpusMemory",
            MetricQuery::UsedGpusMemory => "usedGpusMemory",
            MetricQuery::UsedCpusMemory => "usedCpusMemory",
            MetricQuery::UsedCpus => "usedCpus",
            MetricQuery::UsedGpus => "usedGpus",
            MetricQuery::GpuIdleTime => "gpuIdleTime",
            MetricQuery::UsedGpu => "usedGpu",
            MetricQuery::GpuUsedByPod => "gpuUsedByPod",
            MetricQuery::UsedGpuMemory => "usedGpuMemory",
            MetricQuery::TotalGpuMemory => "totalGpuMemory",
        }
    }

    pub fn expression(&self) -> &'static str {
        match self {
            MetricQuery::TotalGpusMemory => {
                "(sum(runai_node_gpu_total_memory * 1024 * 1024) by (node))"
            }
            MetricQuery::UsedGpus => {
                "((sum(runai_node_gpu_utilization) by (node)) / on (node) (count(runai_node_gpu_utilization) by (node)))"
            }
            MetricQuery::UsedGpusMemory => {
                "(sum(runai_node_gpu_used_memory * 1024 * 1024) by (node))"
            }
            MetricQuery::UsedCpusMemory => "runai_node_memory_used_bytes",
            MetricQuery::UsedCpus => "runai_node_cpu_utilization * 100",
            MetricQuery::UsedGpu => "(sum(runai_node_gpu_utilization) by (node, gpu))",
            MetricQuery::UsedGpuMemory => {
                "(sum(runai_node_gpu_used_memory * 1024 * 1024) by (node, gpu))"
            }
            MetricQuery::TotalGpuMemory => {
                "(sum(runai_node_gpu_total_memory * 1024 * 1024) by (node, gpu))"
            }
            MetricQuery::GpuIdleTime => {
                "(sum(time()-runai_node_gpu_last_not_idle_time) by (node, gpu))"
            }
            MetricQuery::GpuUsedByPod => "sum(runai_gpus_is_running_with_pod2 * 100) by (node, gpu)",
        }
    }
}

/// Name -> expression map handed to a metrics executor
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCatalog {
    queries: BTreeMap<String, String>,
}

impl QueryCatalog {
    /// The full catalog queried once per snapshot, grouped by node
    pub fn node_queries() -> Self {
        Self {
            queries: MetricQuery::ALL
                .iter()
                .map(|q| (q.name().to_string(), q.expression().to_string()))
                .collect(),
        }
    }

    pub fn expression(&self, name: &str) -> Result<&str, MetricError> {
        self.queries
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| MetricError::UnknownQuery(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.queries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

impl Default for QueryCatalog {
    fn default() -> Self {
        Self::node_queries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_covers_every_query() {
        let catalog = QueryCatalog::node_queries();
        assert_eq!(catalog.len(), MetricQuery::ALL.len());
        for query in MetricQuery::ALL {
            assert_eq!(catalog.expression(query.name()), Ok(query.expression()));
        }
    }

    #[test]
    fn test_unknown_names_fail_closed() {
        let catalog = QueryCatalog::node_queries();
        assert_eq!(
            catalog.expression("usedTpus"),
            Err(MetricError::UnknownQuery("usedTpus".to_string()))
        );
    }

    #[test]
    fn test_per_gpu_queries_group_by_gpu() {
        for query in MetricQuery::PER_GPU {
            assert!(query.expression().contains("gpu)"), "{} is not per-GPU", query.name());
        }
    }
}
