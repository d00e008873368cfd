//! Resource quantity vectors and the per-pod / per-node status model
//!
//! A [`ResourceQuantity`] is the same four-component vector (CPU, memory,
//! GPUs, GPU memory) at every lifecycle stage: requested, allocated, limited,
//! capacity, allocatable and observed usage.

mod quantity;
mod status;

pub use quantity::parse_quantity;
pub use status::{
    format_bytes, memory_usage_and_utilization, Gpu, NodeGeneralInfo, NodeResourceStatus,
    NodeStatus, PodResourceStatus,
};

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Add, AddAssign};
use tracing::debug;

pub const CPU_RESOURCE: &str = "cpu";
pub const MEMORY_RESOURCE: &str = "memory";

/// Component-wise resource vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceQuantity {
    /// Fractional cores
    pub cpus: f64,
    /// Bytes
    pub memory: f64,
    /// Whole GPUs are 1.0, a shared slice is a fraction in (0, 1]
    pub gpus: f64,
    /// Bytes
    pub gpu_memory: f64,
}

impl ResourceQuantity {
    pub fn new(cpus: f64, memory: f64, gpus: f64, gpu_memory: f64) -> Self {
        Self {
            cpus,
            memory,
            gpus,
            gpu_memory,
        }
    }

    /// Build a vector from a Kubernetes resource list (`capacity`,
    /// `allocatable`, container `requests`/`limits`).
    ///
    /// A missing list is the zero vector. Quantities that fail to parse are
    /// logged and counted as zero.
    pub fn from_resource_list(
        list: Option<&BTreeMap<String, Quantity>>,
        gpu_resource_name: &str,
    ) -> Self {
        let mut result = Self::default();
        let Some(list) = list else {
            return result;
        };

        for (name, quantity) in list {
            let target = if name == CPU_RESOURCE {
                &mut result.cpus
            } else if name == MEMORY_RESOURCE {
                &mut result.memory
            } else if name == gpu_resource_name {
                &mut result.gpus
            } else {
                continue;
            };

            match parse_quantity(&quantity.0) {
                Ok(value) => *target += value,
                Err(e) => {
                    debug!(resource = %name, quantity = %quantity.0, error = %e, "Ignoring unparseable quantity");
                }
            }
        }

        result
    }

    /// True when every component is less than or equal to `other`'s
    pub fn fits_within(&self, other: &ResourceQuantity) -> bool {
        self.cpus <= other.cpus
            && self.memory <= other.memory
            && self.gpus <= other.gpus
            && self.gpu_memory <= other.gpu_memory
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl Add for ResourceQuantity {
    type Output = ResourceQuantity;

    fn add(self, rhs: ResourceQuantity) -> ResourceQuantity {
        ResourceQuantity {
            cpus: self.cpus + rhs.cpus,
            memory: self.memory + rhs.memory,
            gpus: self.gpus + rhs.gpus,
            gpu_memory: self.gpu_memory + rhs.gpu_memory,
        }
    }
}

impl AddAssign for ResourceQuantity {
    fn add_assign(&mut self, rhs: ResourceQuantity) {
        *self = *self + rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(entries: &[(&str, &str)]) -> BTreeMap<String, Quantity> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), Quantity(v.to_string())))
            .collect()
    }

    #[test]
    fn test_from_resource_list() {
        let resources = list(&[
            ("cpu", "500m"),
            ("memory", "2Gi"),
            ("nvidia.com/gpu", "2"),
            ("ephemeral-storage", "10Gi"),
        ]);

        let q = ResourceQuantity::from_resource_list(Some(&resources), "nvidia.com/gpu");
        assert_eq!(q.cpus, 0.5);
        assert_eq!(q.memory, 2.0 * 1024.0 * 1024.0 * 1024.0);
        assert_eq!(q.gpus, 2.0);
        assert_eq!(q.gpu_memory, 0.0);
    }

    #[test]
    fn test_missing_list_is_zero() {
        let q = ResourceQuantity::from_resource_list(None, "nvidia.com/gpu");
        assert!(q.is_zero());
    }

    #[test]
    fn test_bad_quantity_counts_as_zero() {
        let resources = list(&[("cpu", "lots"), ("memory", "1Ki")]);
        let q = ResourceQuantity::from_resource_list(Some(&resources), "nvidia.com/gpu");
        assert_eq!(q.cpus, 0.0);
        assert_eq!(q.memory, 1024.0);
    }

    #[test]
    fn test_add_is_component_wise() {
        let mut a = ResourceQuantity::new(1.0, 100.0, 0.5, 10.0);
        a += ResourceQuantity::new(0.5, 50.0, 0.3, 0.0);
        assert_eq!(a, ResourceQuantity::new(1.5, 150.0, 0.8, 10.0));
    }

    #[test]
    fn test_fits_within() {
        let small = ResourceQuantity::new(1.0, 100.0, 1.0, 0.0);
        let big = ResourceQuantity::new(2.0, 100.0, 1.0, 0.0);
        assert!(small.fits_within(&big));
        assert!(!big.fits_within(&small));
    }
}
