/// Core type definitions for the metric sync pipeline
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Compute instance as listed by the telemetry resource directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub project_id: Option<String>,
}

/// Opaque upstream identifier of one metric on one instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricHandle(pub String);

impl MetricHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetricHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metric name -> handle mapping exposed by one instance
pub type MetricCatalog = BTreeMap<String, MetricHandle>;

/// Aggregation view requested from the measure source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aggregation {
    Mean,
    Max,
    Min,
}

impl Aggregation {
    pub fn as_str(&self) -> &str {
        match self {
            Aggregation::Mean => "mean",
            Aggregation::Max => "max",
            Aggregation::Min => "min",
        }
    }

    /// Query parameter value; the mean view is the upstream default and sends none
    pub fn as_param(&self) -> Option<&str> {
        match self {
            Aggregation::Mean => None,
            Aggregation::Max => Some("max"),
            Aggregation::Min => Some("min"),
        }
    }

    /// Suffix of the merged record field, e.g. `cpu_util_avg`
    pub fn field_suffix(&self) -> &str {
        match self {
            Aggregation::Mean => "avg",
            Aggregation::Max => "max",
            Aggregation::Min => "min",
        }
    }
}

/// One `[timestamp, granularity, value]` measure triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(String, f64, serde_json::Value)", into = "(String, f64, serde_json::Value)")]
pub struct Measure {
    pub timestamp: String,
    pub granularity: f64,
    pub value: serde_json::Value,
}

impl Measure {
    pub fn new(timestamp: impl Into<String>, granularity: f64, value: impl Into<serde_json::Value>) -> Self {
        Measure {
            timestamp: timestamp.into(),
            granularity,
            value: value.into(),
        }
    }
}

impl From<(String, f64, serde_json::Value)> for Measure {
    fn from((timestamp, granularity, value): (String, f64, serde_json::Value)) -> Self {
        Measure {
            timestamp,
            granularity,
            value,
        }
    }
}

impl From<Measure> for (String, f64, serde_json::Value) {
    fn from(measure: Measure) -> Self {
        (measure.timestamp, measure.granularity, measure.value)
    }
}

/// Cursor marking the most recent processed measure timestamp.
///
/// Ordering is plain string ordering; upstream timestamps are fixed-width
/// ISO-8601 with a normalized offset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Watermark(String);

impl Watermark {
    pub fn new(timestamp: impl Into<String>) -> Self {
        Watermark(timestamp.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a measure at `timestamp` lies strictly after this cursor
    pub fn precedes(&self, timestamp: &str) -> bool {
        timestamp > self.0.as_str()
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metric value stored on a merged record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    /// Non-numeric upstream value, passed through untouched
    Raw(serde_json::Value),
}

/// One output row: all tracked metrics of one instance at one timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub instance_id: String,
    pub instance_name: String,
    pub timestamp: String,
    pub date: String,
    pub time: String,
    pub granularity: f64,
    pub domain_name: String,
    pub project_name: String,
    #[serde(flatten)]
    pub metrics: BTreeMap<String, MetricValue>,
}

impl MergedRecord {
    /// Look up a metric field, e.g. `record.metric("cpu_util", Aggregation::Max)`
    pub fn metric(&self, metric: &str, aggregation: Aggregation) -> Option<&MetricValue> {
        self.metrics
            .get(&format!("{}_{}", metric, aggregation.field_suffix()))
    }

    pub fn set_metric(&mut self, metric: &str, aggregation: Aggregation, value: MetricValue) {
        self.metrics
            .insert(format!("{}_{}", metric, aggregation.field_suffix()), value);
    }
}

/// Project details returned by the identity service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub domain_id: String,
}

/// Domain details returned by the identity service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
}

/// Resolved owner names stamped on every record of an instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    pub project_name: String,
    pub domain_name: String,
}

/// Instance metadata carried into each merged record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceMeta {
    pub instance_id: String,
    pub instance_name: String,
    pub ownership: Ownership,
}

impl InstanceMeta {
    pub fn new(instance: &Instance, ownership: Ownership) -> Self {
        InstanceMeta {
            instance_id: instance.id.clone(),
            instance_name: instance.name.clone(),
            ownership,
        }
    }
}

/// Runtime configuration, constructed once at start-up
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub sync: SyncSettings,

    // Logging
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,

    // HTTP
    #[serde(default = "default_request_timeout_sec")]
    pub request_timeout_sec: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Endpoints {
    #[serde(default)]
    pub identity_url: String,
    #[serde(default)]
    pub telemetry_url: String,
    #[serde(default)]
    pub ingest_url: String,
}

#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub domain: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_tracked_metrics")]
    pub tracked_metrics: Vec<String>,
    /// Granularity (seconds) for the first, full-range run
    #[serde(default = "default_initial_granularity")]
    pub initial_granularity: u64,
    /// Granularity (seconds) when resuming from a watermark
    #[serde(default = "default_resume_granularity")]
    pub resume_granularity: u64,
    #[serde(default = "default_watermark_path")]
    pub watermark_path: String,
    #[serde(default = "default_output_path")]
    pub output_path: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            tracked_metrics: default_tracked_metrics(),
            initial_granularity: default_initial_granularity(),
            resume_granularity: default_resume_granularity(),
            watermark_path: default_watermark_path(),
            output_path: default_output_path(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_request_timeout_sec() -> u64 {
    30
}

pub fn default_tracked_metrics() -> Vec<String> {
    [
        "disk.write.requests.rate",
        "disk.read.bytes.rate",
        "cpu_util",
        "disk.write.bytes.rate",
        "memory.util",
        "memory.usage",
    ]
    .iter()
    .map(|m| m.to_string())
    .collect()
}

fn default_initial_granularity() -> u64 {
    86400
}

fn default_resume_granularity() -> u64 {
    300
}

fn default_watermark_path() -> String {
    "last_sync.txt".to_string()
}

fn default_output_path() -> String {
    "output.json".to_string()
}
