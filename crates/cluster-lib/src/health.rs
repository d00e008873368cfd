//! Health of the data sources behind a snapshot
//!
//! A snapshot records one [`ComponentHealth`] per source so consumers can
//! tell "no data" from "incomplete data".

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Health status of a data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Source answered normally
    Healthy,
    /// Source failed but the snapshot is still usable
    Degraded,
}

/// Health of one source at snapshot time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            message: None,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Degraded,
            message: Some(message.into()),
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Source names used as keys of [`compute_status`] input
pub mod components {
    pub const CLUSTER: &str = "cluster";
    pub const METRICS: &str = "metrics";
}

/// Overall status: degraded if any source is
pub fn compute_status(components: &BTreeMap<String, ComponentHealth>) -> ComponentStatus {
    if components
        .values()
        .any(|health| health.status == ComponentStatus::Degraded)
    {
        ComponentStatus::Degraded
    } else {
        ComponentStatus::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_status() {
        let mut sources = BTreeMap::new();
        sources.insert(components::CLUSTER.to_string(), ComponentHealth::healthy());
        assert_eq!(compute_status(&sources), ComponentStatus::Healthy);

        sources.insert(
            components::METRICS.to_string(),
            ComponentHealth::degraded("connection refused"),
        );
        assert_eq!(compute_status(&sources), ComponentStatus::Degraded);

        sources.insert(components::METRICS.to_string(), ComponentHealth::healthy());
        assert_eq!(compute_status(&sources), ComponentStatus::Healthy);
    }

    #[test]
    fn test_health_serialization() {
        let health = ComponentHealth::degraded("timeout");
        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["message"], "timeout");

        let json = serde_json::to_value(ComponentHealth::healthy()).unwrap();
        assert!(json.get("message").is_none());
    }
}
