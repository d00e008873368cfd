//! Node and GPU resource overview

use crate::client::{PrometheusConnector, PrometheusSettings};
use crate::cluster::{self, KubeClusterLister};
use crate::config::Config;
use crate::output::{
    color_status, color_utilization, format_bytes, format_cpu, format_gpus, format_idle,
    format_percent, print_info, print_json, print_warning, OutputFormat,
};
use anyhow::{Context, Result};
use cluster_lib::resources::memory_usage_and_utilization;
use cluster_lib::{build_snapshot, ClusterTotals, NodeResourceStatus, Snapshot, SnapshotContext};
use colored::Colorize;
use tabled::builder::Builder;
use tabled::{settings::Style, Table, Tabled};

/// Flags of `gtop top node`
#[derive(Debug, Clone, Default)]
pub struct TopNodeOptions {
    pub no_metrics: bool,
    pub details: bool,
    pub prometheus_url: Option<String>,
}

/// Row of the per-GPU table
#[derive(Tabled)]
struct GpuRow {
    #[tabled(rename = "GPU")]
    index: String,
    #[tabled(rename = "ALLOCATED")]
    allocated: String,
    #[tabled(rename = "UTILIZATION")]
    utilization: String,
    #[tabled(rename = "MEMORY")]
    memory: String,
    #[tabled(rename = "IDLE")]
    idle: String,
}

/// Show resource status of every node
pub async fn top_nodes(
    config: &Config,
    kubeconfig: Option<&str>,
    options: TopNodeOptions,
    format: OutputFormat,
) -> Result<()> {
    let client = cluster::connect(kubeconfig).await?;

    let mut ctx = SnapshotContext::default().with_cluster_name(&config.cluster_name);
    if options.no_metrics {
        ctx = ctx.without_metrics();
    }

    let lister = KubeClusterLister::new(client.clone());
    let connector = PrometheusConnector::new(
        PrometheusSettings {
            url: options.prometheus_url.or_else(|| config.prometheus_url.clone()),
            namespace: config.prometheus_namespace.clone(),
            service: config.prometheus_service.clone(),
            port: config.prometheus_port,
            timeout: config.request_timeout(),
        },
        client,
    );

    let snapshot = build_snapshot(&ctx, &lister, Some(&connector))
        .await
        .context("Failed to build cluster snapshot")?;

    match format {
        OutputFormat::Json => print_json(&snapshot)?,
        OutputFormat::Table => print_snapshot(&snapshot, options.details),
    }

    Ok(())
}

fn print_snapshot(snapshot: &Snapshot, details: bool) {
    if let Some(warning) = &snapshot.warning {
        print_warning(warning);
        println!();
    }

    if snapshot.nodes.is_empty() {
        print_info("No nodes found");
        return;
    }

    println!("{}", node_table(snapshot));
    println!("\n{}", totals_line(&snapshot.totals()));

    if details {
        for node in &snapshot.nodes {
            if let Some(table) = gpu_table(node) {
                println!("\n{}", node.name().bold());
                println!("{}", table);
            }
        }
    }
}

/// One row per node; usage columns only when some node has metrics
fn node_table(snapshot: &Snapshot) -> String {
    let with_usage = snapshot.nodes.iter().any(|n| n.has_usage_data);

    let mut header = vec![
        "NAME",
        "IP",
        "ROLE",
        "STATUS",
        "GPUs (CAP/ALLOC)",
        "GPUs IN USE",
        "FRACTIONAL",
        "CPU (ALLOC/REQ)",
        "MEMORY (ALLOC/REQ)",
    ];
    if with_usage {
        header.extend(["CPU USAGE", "MEMORY USAGE", "GPU USAGE", "GPU MEMORY"]);
    }

    let mut builder = Builder::default();
    builder.push_record(header);

    for node in &snapshot.nodes {
        let mut row = vec![
            node.name().to_string(),
            node.info.ip_address.clone().unwrap_or_else(|| "-".to_string()),
            if node.info.roles.is_empty() {
                "<none>".to_string()
            } else {
                node.info.roles.join(",")
            },
            color_status(node.info.status),
            format!(
                "{}/{}",
                format_gpus(node.capacity.gpus),
                format_gpus(node.allocatable.gpus)
            ),
            node.gpus_in_use.to_string(),
            node.number_of_fractional_allocated_gpus.to_string(),
            format!(
                "{}/{}",
                format_cpu(node.allocatable.cpus),
                format_cpu(node.requested.cpus)
            ),
            format!(
                "{}/{}",
                format_bytes(node.allocatable.memory),
                format_bytes(node.requested.memory)
            ),
        ];

        if with_usage {
            row.extend(usage_cells(node));
        }
        builder.push_record(row);
    }

    builder.build().with(Style::rounded()).to_string()
}

fn usage_cells(node: &NodeResourceStatus) -> [String; 4] {
    if !node.has_usage_data {
        return ["-".to_string(), "-".to_string(), "-".to_string(), "-".to_string()];
    }

    let (gpu_memory, _) = memory_usage_and_utilization(
        Some(node.usage.gpu_memory),
        Some(node.capacity.gpu_memory),
    );
    [
        color_utilization(Some(node.usage.cpus)),
        format_bytes(node.usage.memory),
        if node.capacity.gpus > 0.0 {
            color_utilization(Some(node.usage.gpus))
        } else {
            "-".to_string()
        },
        gpu_memory,
    ]
}

fn totals_line(totals: &ClusterTotals) -> String {
    format!(
        "Nodes: {}/{} ready | GPUs: {} in use of {} allocatable ({} capacity, {} shared) | CPU: {} of {} requested | Memory: {} of {} requested",
        totals.ready_nodes,
        totals.nodes,
        totals.gpus_in_use,
        format_gpus(totals.allocatable.gpus),
        format_gpus(totals.capacity.gpus),
        totals.fractional_gpus,
        format_cpu(totals.requested.cpus),
        format_cpu(totals.allocatable.cpus),
        format_bytes(totals.requested.memory),
        format_bytes(totals.allocatable.memory),
    )
}

fn gpu_table(node: &NodeResourceStatus) -> Option<String> {
    if node.node_gpus.is_empty() {
        return None;
    }

    let rows: Vec<GpuRow> = node
        .node_gpus
        .iter()
        .map(|gpu| GpuRow {
            index: gpu.index_id.clone(),
            allocated: format_percent(gpu.allocated.map(|share| share * 100.0)),
            utilization: color_utilization(gpu.utilization),
            memory: gpu.memory_usage_and_utilization.clone(),
            idle: format_idle(gpu.idle_time),
        })
        .collect();

    Some(Table::new(rows).with(Style::rounded()).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster_lib::resources::{Gpu, NodeGeneralInfo, NodeStatus, ResourceQuantity};
    use std::collections::BTreeMap;
    use std::time::Duration;

    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

    fn node(name: &str, has_usage_data: bool) -> NodeResourceStatus {
        NodeResourceStatus {
            info: NodeGeneralInfo {
                name: name.to_string(),
                roles: vec!["worker".to_string()],
                ip_address: Some("10.0.0.7".to_string()),
                status: NodeStatus::Ready,
            },
            requested: ResourceQuantity::new(6.0, 24.0 * GIB, 1.0, 0.0),
            allocated: ResourceQuantity::new(6.0, 24.0 * GIB, 1.5, 0.0),
            limited: ResourceQuantity::new(8.0, 32.0 * GIB, 1.0, 0.0),
            capacity: ResourceQuantity::new(32.0, 128.0 * GIB, 4.0, 64.0 * GIB),
            allocatable: ResourceQuantity::new(31.5, 120.0 * GIB, 4.0, 0.0),
            usage: if has_usage_data {
                ResourceQuantity::new(42.0, 40.0 * GIB, 75.0, 16.0 * GIB)
            } else {
                ResourceQuantity::default()
            },
            number_of_fractional_allocated_gpus: 1,
            gpus_in_use: 2,
            node_gpus: Vec::new(),
            has_usage_data,
        }
    }

    fn snapshot(nodes: Vec<NodeResourceStatus>) -> Snapshot {
        Snapshot {
            taken_at: chrono::Utc::now(),
            nodes,
            warning: None,
            sources: BTreeMap::new(),
        }
    }

    #[test]
    fn test_node_table_without_metrics() {
        let table = node_table(&snapshot(vec![node("gpu-a", false)]));

        assert!(table.contains("gpu-a"));
        assert!(table.contains("10.0.0.7"));
        assert!(table.contains("worker"));
        assert!(table.contains("4/4"));
        assert!(table.contains("31.50/6"));
        assert!(!table.contains("CPU USAGE"));
    }

    #[test]
    fn test_node_table_with_metrics() {
        let table = node_table(&snapshot(vec![node("gpu-a", true), node("gpu-b", false)]));

        assert!(table.contains("CPU USAGE"));
        assert!(table.contains("42%"));
        assert!(table.contains("16.00 GiB / 64.00 GiB (25%)"));
        assert!(table.contains("gpu-b"));
    }

    #[test]
    fn test_totals_line() {
        let snap = snapshot(vec![node("gpu-a", false), node("gpu-b", false)]);
        let line = totals_line(&snap.totals());

        assert!(line.contains("Nodes: 2/2 ready"));
        assert!(line.contains("4 in use of 8 allocatable"));
        assert!(line.contains("2 shared"));
    }

    #[test]
    fn test_gpu_table() {
        let mut status = node("gpu-a", true);
        assert!(gpu_table(&status).is_none());

        status.node_gpus = vec![Gpu {
            index_id: "0".to_string(),
            allocated: Some(0.8),
            memory: Some(16.0 * GIB),
            memory_usage: Some(4.0 * GIB),
            memory_utilization: Some(25.0),
            memory_usage_and_utilization: "4.00 GiB / 16.00 GiB (25%)".to_string(),
            idle_time: Some(Duration::from_secs(200)),
            utilization: Some(30.0),
        }];

        let table = gpu_table(&status).unwrap();
        assert!(table.contains("80%"));
        assert!(table.contains("4.00 GiB / 16.00 GiB (25%)"));
        assert!(table.contains("3m 20s"));
    }
}
