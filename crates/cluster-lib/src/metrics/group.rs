//! Grouping of flat metric results by a label dimension
//!
//! Results are first flattened into [`LabeledValue`] records, then grouped
//! by a pure function so the policy can be tested without a backend:
//! - the first record for a (group, metric) pair wins
//! - a metric with no records is absent from every group, never zero

use super::{MetricResultsByQueryName, QueryCatalog};
use crate::error::MetricError;
use std::collections::{BTreeMap, HashMap};

/// One value of one metric for one value of the grouping label
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledValue {
    pub label_value: String,
    pub metric: String,
    pub value: f64,
}

impl LabeledValue {
    pub fn new(label_value: impl Into<String>, metric: impl Into<String>, value: f64) -> Self {
        Self {
            label_value: label_value.into(),
            metric: metric.into(),
            value,
        }
    }
}

/// Group key -> metric name -> value
pub type MetricGroups = BTreeMap<String, HashMap<String, f64>>;

/// Group records by label value, keeping the first value per metric
pub fn group_records<'a>(records: impl IntoIterator<Item = &'a LabeledValue>) -> MetricGroups {
    let mut groups = MetricGroups::new();
    for record in records {
        groups
            .entry(record.label_value.clone())
            .or_default()
            .entry(record.metric.clone())
            .or_insert(record.value);
    }
    groups
}

/// Flatten the requested metrics of `data` into records tagged by `label`.
///
/// Records follow the order of `names`, then the order of each result set.
pub fn flatten_results(
    label: &str,
    data: &MetricResultsByQueryName,
    catalog: &QueryCatalog,
    names: &[&str],
) -> Result<Vec<LabeledValue>, MetricError> {
    let mut records = Vec::new();

    for &name in names {
        catalog.expression(name)?;

        let Some(samples) = data.get(name) else {
            continue;
        };

        for sample in samples {
            let label_value = sample.label(label).ok_or_else(|| MetricError::MissingLabel {
                metric: name.to_string(),
                label: label.to_string(),
            })?;
            records.push(LabeledValue::new(label_value, name, sample.value));
        }
    }

    Ok(records)
}

/// Group the named metrics of `data` by the value of `label`
pub fn group_metrics(
    label: &str,
    data: &MetricResultsByQueryName,
    catalog: &QueryCatalog,
    names: &[&str],
) -> Result<MetricGroups, MetricError> {
    let records = flatten_results(label, data, catalog, names)?;
    Ok(group_records(&records))
}
