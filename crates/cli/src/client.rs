//! Prometheus HTTP API client
//!
//! Runs instant queries against `/api/v1/query` and hands the vector result
//! to the aggregation library as [`MetricSample`]s.

use anyhow::{Context, Result};
use async_trait::async_trait;
use cluster_lib::metrics::{MetricSample, MetricsConnector, MetricsExecutor};
use cluster_lib::MetricsError;
use k8s_openapi::api::core::v1::Service;
use kube::Api;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Client for one Prometheus server
pub struct PrometheusClient {
    client: Client,
    base_url: Url,
}

impl PrometheusClient {
    /// Create a new Prometheus client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let mut base_url = Url::parse(base_url).context("Invalid Prometheus URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl MetricsExecutor for PrometheusClient {
    async fn run_query(&self, expression: &str) -> Result<Vec<MetricSample>, MetricsError> {
        let url = self
            .base_url
            .join("api/v1/query")
            .map_err(|e| MetricsError::query(expression, e.to_string()))?;

        let response = self
            .client
            .get(url)
            .query(&[("query", expression)])
            .send()
            .await
            .map_err(|e| MetricsError::unavailable(e.to_string()))?;

        let status = response.status();
        let body: QueryResponse = match response.json().await {
            Ok(body) => body,
            Err(e) if status.is_success() => {
                return Err(MetricsError::query(expression, format!("invalid response: {}", e)))
            }
            Err(_) => return Err(MetricsError::query(expression, format!("HTTP {}", status))),
        };

        if body.status != "success" {
            let reason = match (body.error_type, body.error) {
                (Some(kind), Some(error)) => format!("{}: {}", kind, error),
                (_, Some(error)) => error,
                _ => format!("HTTP {}", status),
            };
            return Err(MetricsError::query(expression, reason));
        }

        let data = body
            .data
            .ok_or_else(|| MetricsError::query(expression, "response has no data"))?;
        let samples = data.into_samples(expression)?;
        debug!(query = %expression, samples = samples.len(), "Prometheus query succeeded");
        Ok(samples)
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    data: Option<QueryData>,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
enum QueryData {
    Vector(Vec<VectorEntry>),
    Scalar(SampleValue),
    Matrix(serde_json::Value),
    String(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct VectorEntry {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    value: SampleValue,
}

/// `[<unix time>, "<value>"]`
#[derive(Debug, Deserialize)]
struct SampleValue(f64, String);

impl SampleValue {
    fn parse(&self, expression: &str) -> Result<f64, MetricsError> {
        self.1
            .parse()
            .map_err(|_| MetricsError::query(expression, format!("invalid sample value {:?}", self.1)))
    }
}

impl QueryData {
    fn into_samples(self, expression: &str) -> Result<Vec<MetricSample>, MetricsError> {
        match self {
            QueryData::Vector(entries) => entries
                .into_iter()
                .map(|entry| {
                    Ok(MetricSample {
                        value: entry.value.parse(expression)?,
                        labels: entry.metric,
                    })
                })
                .collect(),
            QueryData::Scalar(value) => Ok(vec![MetricSample {
                labels: BTreeMap::new(),
                value: value.parse(expression)?,
            }]),
            QueryData::Matrix(_) | QueryData::String(_) => Err(MetricsError::query(
                expression,
                "expected an instant vector result",
            )),
        }
    }
}

/// Where to find Prometheus
#[derive(Debug, Clone)]
pub struct PrometheusSettings {
    /// Explicit base URL; skips service discovery
    pub url: Option<String>,
    pub namespace: String,
    pub service: String,
    pub port: u16,
    pub timeout: Duration,
}

/// Connects to Prometheus at snapshot time, looking the service up through
/// the Kubernetes API when no URL is configured
pub struct PrometheusConnector {
    settings: PrometheusSettings,
    kube: kube::Client,
}

impl PrometheusConnector {
    pub fn new(settings: PrometheusSettings, kube: kube::Client) -> Self {
        Self { settings, kube }
    }

    async fn discover_url(&self) -> Result<String, MetricsError> {
        let services: Api<Service> = Api::namespaced(self.kube.clone(), &self.settings.namespace);
        let service = services.get(&self.settings.service).await.map_err(|e| {
            MetricsError::unavailable(format!(
                "prometheus service {}/{} not found: {}",
                self.settings.namespace, self.settings.service, e
            ))
        })?;

        let name = service.metadata.name.as_deref().unwrap_or(&self.settings.service);
        Ok(service_url(name, &self.settings.namespace, self.settings.port))
    }
}

#[async_trait]
impl MetricsConnector for PrometheusConnector {
    async fn connect(&self) -> Result<Box<dyn MetricsExecutor>, MetricsError> {
        let url = match &self.settings.url {
            Some(url) => url.clone(),
            None => self.discover_url().await?,
        };
        debug!(url = %url, "Connecting to Prometheus");

        let client = PrometheusClient::new(&url, self.settings.timeout)
            .map_err(|e| MetricsError::unavailable(format!("{:#}", e)))?;
        Ok(Box::new(client))
    }
}

/// In-cluster DNS URL of a service port
pub fn service_url(service: &str, namespace: &str, port: u16) -> String {
    format!("http://{}.{}.svc:{}", service, namespace, port)
}
