/// Telemetry service REST client: instance resources and metric measures
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::clients::{AuthToken, InstanceDirectory, MeasureResponse, MeasureSource};
use crate::error::{Result, SyncError};
use crate::sync::QueryWindow;
use crate::types::{Aggregation, Instance, Measure, MetricCatalog, MetricHandle};

#[derive(Debug, Deserialize)]
struct InstanceResource {
    id: String,
    #[serde(default)]
    resource_name: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    metrics: BTreeMap<String, String>,
}

impl InstanceResource {
    fn into_parts(self) -> (Instance, MetricCatalog) {
        let name = self
            .resource_name
            .or(self.display_name)
            .unwrap_or_else(|| "unknown".to_string());

        let catalog = self
            .metrics
            .into_iter()
            .map(|(metric, id)| (metric, MetricHandle(id)))
            .collect();

        let instance = Instance {
            id: self.id,
            name,
            project_id: self.project_id.filter(|p| !p.is_empty()),
        };

        (instance, catalog)
    }
}

/// Telemetry client with a per-run cache of instance metric catalogs
pub struct TelemetryClient {
    client: Client,
    base_url: String,
    token: AuthToken,
    catalogs: RwLock<HashMap<String, MetricCatalog>>,
}

impl TelemetryClient {
    pub fn new(client: Client, base_url: &str, token: AuthToken) -> Self {
        TelemetryClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            catalogs: RwLock::new(HashMap::new()),
        }
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, path))
            .header("Content-Type", "application/json")
            .header("X-Auth-Token", &self.token.value)
            .query(query)
            .send()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl InstanceDirectory for TelemetryClient {
    async fn list_instances(&self) -> Result<Vec<Instance>> {
        let response = self.get("resource/instance", &[]).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SyncError::UpstreamRejected {
                status: status.as_u16(),
                body,
            });
        }

        let resources: Vec<InstanceResource> = serde_json::from_str(&body)?;

        let mut instances = Vec::with_capacity(resources.len());
        let mut catalogs = HashMap::with_capacity(resources.len());
        for resource in resources {
            let (instance, catalog) = resource.into_parts();
            catalogs.insert(instance.id.clone(), catalog);
            instances.push(instance);
        }

        {
            let mut cache = self.catalogs.write().await;
            *cache = catalogs;
        }

        info!("Listed {} instances", instances.len());
        Ok(instances)
    }

    async fn metric_catalog(&self, instance_id: &str) -> Result<MetricCatalog> {
        {
            let cache = self.catalogs.read().await;
            if let Some(catalog) = cache.get(instance_id) {
                return Ok(catalog.clone());
            }
        }

        let response = self
            .get(&format!("resource/instance/{}", instance_id), &[])
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(SyncError::MissingData(format!(
                "Instance {} not found in telemetry directory",
                instance_id
            )));
        }
        if !status.is_success() {
            return Err(SyncError::UpstreamRejected {
                status: status.as_u16(),
                body,
            });
        }

        let resource: InstanceResource = serde_json::from_str(&body)?;
        let (_, catalog) = resource.into_parts();

        let mut cache = self.catalogs.write().await;
        cache.insert(instance_id.to_string(), catalog.clone());

        Ok(catalog)
    }
}

#[async_trait]
impl MeasureSource for TelemetryClient {
    async fn query_measures(
        &self,
        metric: &MetricHandle,
        aggregation: Aggregation,
        window: &QueryWindow,
    ) -> Result<MeasureResponse> {
        let params = window.query_params(aggregation);
        debug!("Fetching {} measures for metric {}: {:?}", aggregation.as_str(), metric, params);

        let response = self
            .get(&format!("metric/{}/measures", metric), &params)
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Ok(MeasureResponse::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let measures: Vec<Measure> = serde_json::from_str(&body)?;
        debug!("Fetched {} {} measures", measures.len(), aggregation.as_str());
        Ok(MeasureResponse::Measures(measures))
    }
}
