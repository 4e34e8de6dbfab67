pub mod artifact;
pub mod merger;
pub mod orchestrator;
pub mod plan;
pub mod query;
pub mod watermark;

pub use artifact::OutputArtifact;
pub use merger::{normalize_value, split_timestamp, InstanceRecords, RecordMerger, TimestampIndex};
pub use orchestrator::{DeliveryStatus, SyncOrchestrator, SyncOutcome, SyncReport};
pub use plan::{InstancePlan, SyncPlan, WorkItem};
pub use query::{AggregatedSeries, FetchOutcome, MetricQueryClient, QueryWindow};
pub use watermark::{FileWatermarkStore, WatermarkStore};
