/// Joins mean/max/min series by timestamp into one record per instance and timestamp
use std::collections::{BTreeMap, HashMap};

use crate::sync::AggregatedSeries;
use crate::types::{Aggregation, InstanceMeta, Measure, MergedRecord, MetricValue, Watermark};

/// Fractional digits kept when normalizing numeric values
pub const FIXED_PRECISION: usize = 15;

/// Round a numeric measure to `FIXED_PRECISION` fractional digits.
///
/// Non-numeric values pass through as `MetricValue::Raw`.
pub fn normalize_value(value: &serde_json::Value) -> MetricValue {
    match value.as_f64() {
        Some(v) => MetricValue::Number(round_fixed(v)),
        None => MetricValue::Raw(value.clone()),
    }
}

fn round_fixed(v: f64) -> f64 {
    format!("{:.*}", FIXED_PRECISION, v).parse().unwrap_or(v)
}

/// Split `2024-03-01T12:00:00+00:00` into `("2024-03-01", "12:00:00")`
pub fn split_timestamp(timestamp: &str) -> (String, String) {
    let (date, rest) = timestamp.split_once('T').unwrap_or((timestamp, ""));
    let time = rest.split('+').next().unwrap_or(rest);
    (date.to_string(), time.to_string())
}

/// Timestamp -> value lookup over one aggregation series.
///
/// A timestamp that repeats keeps the value of its last occurrence.
#[derive(Debug, Default)]
pub struct TimestampIndex {
    values: HashMap<String, serde_json::Value>,
}

impl TimestampIndex {
    pub fn from_measures(measures: &[Measure]) -> Self {
        let mut values = HashMap::with_capacity(measures.len());
        for measure in measures {
            values.insert(measure.timestamp.clone(), measure.value.clone());
        }
        TimestampIndex { values }
    }

    /// Normalized value at `timestamp`, `0.0` when the series has none
    pub fn value_at(&self, timestamp: &str) -> MetricValue {
        match self.values.get(timestamp) {
            Some(value) => normalize_value(value),
            None => MetricValue::Number(0.0),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Per-timestamp records being assembled for one instance
#[derive(Debug)]
pub struct InstanceRecords {
    meta: InstanceMeta,
    records: BTreeMap<String, MergedRecord>,
}

impl InstanceRecords {
    pub fn new(meta: InstanceMeta) -> Self {
        InstanceRecords {
            meta,
            records: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, timestamp: &str) -> Option<&MergedRecord> {
        self.records.get(timestamp)
    }

    /// Records in ascending timestamp order
    pub fn into_records(self) -> Vec<MergedRecord> {
        self.records.into_values().collect()
    }

    fn entry(&mut self, measure: &Measure) -> &mut MergedRecord {
        let meta = &self.meta;
        self.records
            .entry(measure.timestamp.clone())
            .or_insert_with(|| {
                let (date, time) = split_timestamp(&measure.timestamp);
                MergedRecord {
                    instance_id: meta.instance_id.clone(),
                    instance_name: meta.instance_name.clone(),
                    timestamp: measure.timestamp.clone(),
                    date,
                    time,
                    granularity: measure.granularity,
                    domain_name: meta.ownership.domain_name.clone(),
                    project_name: meta.ownership.project_name.clone(),
                    metrics: BTreeMap::new(),
                }
            })
    }
}

/// Folds aggregated series into instance records and tracks the run's newest timestamp
#[derive(Debug, Default)]
pub struct RecordMerger {
    latest: Option<Watermark>,
    merged_measures: usize,
}

impl RecordMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one metric's series into `records`; returns the number of mean measures folded
    pub fn merge(&mut self, records: &mut InstanceRecords, metric: &str, series: &AggregatedSeries) -> usize {
        let max_index = TimestampIndex::from_measures(&series.max);
        let min_index = TimestampIndex::from_measures(&series.min);

        for measure in &series.mean {
            let avg = normalize_value(&measure.value);
            let max = max_index.value_at(&measure.timestamp);
            let min = min_index.value_at(&measure.timestamp);

            let record = records.entry(measure);
            record.set_metric(metric, Aggregation::Mean, avg);
            record.set_metric(metric, Aggregation::Max, max);
            record.set_metric(metric, Aggregation::Min, min);

            self.observe(&measure.timestamp);
        }

        self.merged_measures += series.mean.len();
        series.mean.len()
    }

    fn observe(&mut self, timestamp: &str) {
        let newer = match &self.latest {
            Some(latest) => latest.precedes(timestamp),
            None => true,
        };
        if newer {
            self.latest = Some(Watermark::new(timestamp));
        }
    }

    /// Newest timestamp merged so far, `None` if nothing was merged
    pub fn latest(&self) -> Option<&Watermark> {
        self.latest.as_ref()
    }

    pub fn merged_measures(&self) -> usize {
        self.merged_measures
    }
}
