/// Narrow interfaces to the external services the sync core talks to
use async_trait::async_trait;

use crate::error::Result;
use crate::sync::QueryWindow;
use crate::types::{Aggregation, Domain, Instance, Measure, MergedRecord, MetricCatalog, MetricHandle, Project};

pub mod identity;
pub mod ingest;
pub mod telemetry;

pub use identity::{AuthToken, IdentityClient};
pub use ingest::IngestClient;
pub use telemetry::TelemetryClient;

/// Lists instances and the metrics each one exposes
#[async_trait]
pub trait InstanceDirectory: Send + Sync {
    async fn list_instances(&self) -> Result<Vec<Instance>>;

    async fn metric_catalog(&self, instance_id: &str) -> Result<MetricCatalog>;
}

/// Resolves project and domain names; `None` when the service refuses the lookup
#[async_trait]
pub trait OwnershipResolver: Send + Sync {
    async fn resolve_project(&self, project_id: &str) -> Result<Option<Project>>;

    async fn resolve_domain(&self, domain_id: &str) -> Result<Option<Domain>>;
}

/// Answer of a single measure query
#[derive(Debug, Clone, PartialEq)]
pub enum MeasureResponse {
    Measures(Vec<Measure>),
    Rejected { status: u16, body: String },
}

/// Backing service for aggregated measure queries
#[async_trait]
pub trait MeasureSource: Send + Sync {
    async fn query_measures(
        &self,
        metric: &MetricHandle,
        aggregation: Aggregation,
        window: &QueryWindow,
    ) -> Result<MeasureResponse>;
}

/// Outcome reported by the delivery endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub status: u16,
    pub body: String,
}

impl DeliveryReceipt {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Downstream ingestion endpoint receiving the full record set
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn deliver(&self, records: &[MergedRecord]) -> Result<DeliveryReceipt>;
}
