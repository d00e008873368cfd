//! Node identity, readiness and pod phase helpers

use crate::resources::{NodeGeneralInfo, NodeStatus};
use k8s_openapi::api::core::v1::{Node, Pod};

const ROLE_LABEL_PREFIX: &str = "node-role.kubernetes.io/";
const LEGACY_ROLE_LABEL: &str = "kubernetes.io/role";

pub fn node_name(node: &Node) -> &str {
    node.metadata.name.as_deref().unwrap_or_default()
}

/// Node has a `Ready` condition with status `True`
pub fn is_node_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

/// Roles from `node-role.kubernetes.io/<role>` and `kubernetes.io/role` labels
pub fn node_roles(node: &Node) -> Vec<String> {
    let mut roles: Vec<String> = Vec::new();

    if let Some(labels) = node.metadata.labels.as_ref() {
        for (key, value) in labels {
            if let Some(role) = key.strip_prefix(ROLE_LABEL_PREFIX) {
                if !role.is_empty() {
                    roles.push(role.to_string());
                }
            } else if key == LEGACY_ROLE_LABEL && !value.is_empty() {
                roles.push(value.clone());
            }
        }
    }

    roles.sort();
    roles.dedup();
    roles
}

pub fn node_internal_address(node: &Node) -> Option<String> {
    node.status
        .as_ref()
        .and_then(|s| s.addresses.as_ref())
        .and_then(|addresses| addresses.iter().find(|a| a.type_ == "InternalIP"))
        .map(|a| a.address.clone())
}

pub fn node_general_info(node: &Node) -> NodeGeneralInfo {
    NodeGeneralInfo {
        name: node_name(node).to_string(),
        roles: node_roles(node),
        ip_address: node_internal_address(node),
        status: if is_node_ready(node) {
            NodeStatus::Ready
        } else {
            NodeStatus::NotReady
        },
    }
}

/// Pod is Running or Pending, i.e. it holds resources on its node
pub fn is_pod_active(pod: &Pod) -> bool {
    matches!(
        pod.status.as_ref().and_then(|s| s.phase.as_deref()),
        Some("Running") | Some("Pending")
    )
}

pub fn pod_node_name(pod: &Pod) -> Option<&str> {
    pod.spec.as_ref().and_then(|s| s.node_name.as_deref())
}
