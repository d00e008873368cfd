//! Error types for snapshot construction and metric extraction

use thiserror::Error;

/// Fatal errors: the snapshot cannot be built without cluster topology.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to list nodes: {0}")]
    ListNodes(String),

    #[error("Failed to list pods: {0}")]
    ListPods(String),
}

/// Errors reaching or querying the metrics backend.
///
/// These never abort a snapshot; they are turned into a warning.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Metrics backend unavailable: {0}")]
    Unavailable(String),

    #[error("Query '{query}' failed: {reason}")]
    Query { query: String, reason: String },
}

impl MetricsError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn query(query: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Query {
            query: query.into(),
            reason: reason.into(),
        }
    }
}

/// Errors extracting a single named metric out of a result set.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricError {
    #[error("Unknown metric query '{0}'")]
    UnknownQuery(String),

    #[error("No results for metric '{0}'")]
    NoResults(String),

    #[error("Result of metric '{metric}' has no '{label}' label")]
    MissingLabel { metric: String, label: String },
}

/// Errors parsing a Kubernetes resource quantity string.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuantityError {
    #[error("Empty quantity")]
    Empty,

    #[error("Invalid quantity '{0}'")]
    Invalid(String),
}
