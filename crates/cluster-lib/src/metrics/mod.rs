//! Time-series metrics: query catalog, result grouping and the backend seam
//!
//! The aggregator never talks to a metrics backend directly. It consumes a
//! [`MetricsExecutor`] obtained from a [`MetricsConnector`], runs the whole
//! [`QueryCatalog`] once per snapshot, and works on the in-memory results.

mod catalog;
mod group;

pub use catalog::{MetricQuery, QueryCatalog};
pub use group::{flatten_results, group_metrics, group_records, LabeledValue, MetricGroups};

use crate::error::{MetricError, MetricsError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// One label-tagged scalar returned by an instant query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

impl MetricSample {
    pub fn new<'a>(labels: impl IntoIterator<Item = (&'a str, &'a str)>, value: f64) -> Self {
        Self {
            labels: labels
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            value,
        }
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }
}

/// Query name -> raw result set
pub type MetricResultsByQueryName = HashMap<String, Vec<MetricSample>>;

/// Label value (e.g. node name) -> query name -> raw result set
pub type MetricResultsByItem = HashMap<String, MetricResultsByQueryName>;

/// Executes queries against a metrics backend
#[async_trait]
pub trait MetricsExecutor: Send + Sync {
    /// Run one instant query
    async fn run_query(&self, expression: &str) -> Result<Vec<MetricSample>, MetricsError>;

    /// Run every query in the catalog and partition the samples by the value
    /// of `label`. Samples without that label cannot be attributed and are
    /// dropped.
    async fn run_queries_grouped_by_label(
        &self,
        catalog: &QueryCatalog,
        label: &str,
    ) -> Result<MetricResultsByItem, MetricsError> {
        let mut items = MetricResultsByItem::new();

        for (name, expression) in catalog.iter() {
            let samples = self.run_query(expression).await?;
            debug!(query = %name, samples = samples.len(), "Metric query returned");

            for sample in samples {
                let Some(item) = sample.label(label).map(str::to_string) else {
                    debug!(query = %name, label = %label, "Dropping sample without grouping label");
                    continue;
                };
                items
                    .entry(item)
                    .or_default()
                    .entry(name.to_string())
                    .or_default()
                    .push(sample);
            }
        }

        Ok(items)
    }
}

/// Builds an executor on demand, so a missing or unreachable backend is an
/// ordinary recoverable error rather than a construction-time failure
#[async_trait]
pub trait MetricsConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn MetricsExecutor>, MetricsError>;
}

/// Value of the first sample of a single-valued query
pub fn first_value(data: &MetricResultsByQueryName, query: MetricQuery) -> Result<f64, MetricError> {
    data.get(query.name())
        .and_then(|samples| samples.first())
        .map(|sample| sample.value)
        .ok_or_else(|| MetricError::NoResults(query.name().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StaticExecutor {
        results: HashMap<String, Vec<MetricSample>>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MetricsExecutor for StaticExecutor {
        async fn run_query(&self, expression: &str) -> Result<Vec<MetricSample>, MetricsError> {
            self.calls.lock().unwrap().push(expression.to_string());
            Ok(self.results.get(expression).cloned().unwrap_or_default())
        }
    }

    #[test]
    fn test_first_value() {
        let mut data = MetricResultsByQueryName::new();
        data.insert(
            MetricQuery::UsedCpus.name().to_string(),
            vec![
                MetricSample::new([("node", "n1")], 42.0),
                MetricSample::new([("node", "n1")], 7.0),
            ],
        );

        assert_eq!(first_value(&data, MetricQuery::UsedCpus), Ok(42.0));
        assert_eq!(
            first_value(&data, MetricQuery::UsedGpus),
            Err(MetricError::NoResults("usedGpus".to_string()))
        );
    }

    #[tokio::test]
    async fn test_grouped_by_label_partitions_samples() {
        let catalog = QueryCatalog::node_queries();
        let mut results = HashMap::new();
        results.insert(
            MetricQuery::UsedCpus.expression().to_string(),
            vec![
                MetricSample::new([("node", "n1")], 10.0),
                MetricSample::new([("node", "n2")], 20.0),
                MetricSample::new([("instance", "x")], 99.0),
            ],
        );
        results.insert(
            MetricQuery::UsedGpu.expression().to_string(),
            vec![
                MetricSample::new([("node", "n1"), ("gpu", "0")], 50.0),
                MetricSample::new([("node", "n1"), ("gpu", "1")], 70.0),
            ],
        );

        let executor = StaticExecutor {
            results,
            calls: Mutex::new(Vec::new()),
        };
        let items = executor
            .run_queries_grouped_by_label(&catalog, "node")
            .await
            .unwrap();

        assert_eq!(executor.calls.lock().unwrap().len(), catalog.len());
        assert_eq!(items.len(), 2);
        assert_eq!(items["n1"]["usedCpus"][0].value, 10.0);
        assert_eq!(items["n1"]["usedGpu"].len(), 2);
        assert_eq!(items["n2"]["usedCpus"][0].value, 20.0);
        assert!(!items["n2"].contains_key("usedGpu"));
    }
}
