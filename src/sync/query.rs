/// Three-view measure queries (mean, max, min) for one metric and window
use std::sync::Arc;
use tracing::{debug, warn};

use crate::clients::{MeasureResponse, MeasureSource};
use crate::error::Result;
use crate::types::{Aggregation, Measure, MetricHandle, SyncSettings, Watermark};

/// Time window of one run, derived from the loaded watermark
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryWindow {
    pub start: Option<Watermark>,
    pub granularity: u64,
}

impl QueryWindow {
    /// Full-range coarse window on the first run, fine-grained resume afterwards
    pub fn from_watermark(watermark: Option<&Watermark>, settings: &SyncSettings) -> Self {
        match watermark {
            Some(mark) => QueryWindow {
                start: Some(mark.clone()),
                granularity: settings.resume_granularity,
            },
            None => QueryWindow {
                start: None,
                granularity: settings.initial_granularity,
            },
        }
    }

    pub fn is_resume(&self) -> bool {
        self.start.is_some()
    }

    pub fn query_params(&self, aggregation: Aggregation) -> Vec<(&'static str, String)> {
        let mut params = vec![("granularity", self.granularity.to_string())];
        if let Some(start) = &self.start {
            params.push(("start", start.as_str().to_string()));
        }
        if let Some(agg) = aggregation.as_param() {
            params.push(("aggregation", agg.to_string()));
        }
        params
    }

    /// Upstream `start` is inclusive; the cursor itself was emitted last run
    pub fn admits(&self, timestamp: &str) -> bool {
        match &self.start {
            Some(start) => start.precedes(timestamp),
            None => true,
        }
    }
}

/// Mean, max and min series of one metric on one instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedSeries {
    pub mean: Vec<Measure>,
    pub max: Vec<Measure>,
    pub min: Vec<Measure>,
}

impl AggregatedSeries {
    /// Drop measures the window does not admit
    pub fn within(mut self, window: &QueryWindow) -> Self {
        self.mean.retain(|m| window.admits(&m.timestamp));
        self.max.retain(|m| window.admits(&m.timestamp));
        self.min.retain(|m| window.admits(&m.timestamp));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Complete(AggregatedSeries),
    /// The mean or max view was refused; the pair is skipped for this run
    Skipped {
        aggregation: Aggregation,
        status: u16,
        detail: String,
    },
}

pub struct MetricQueryClient {
    source: Arc<dyn MeasureSource>,
}

impl MetricQueryClient {
    pub fn new(source: Arc<dyn MeasureSource>) -> Self {
        MetricQueryClient { source }
    }

    /// Issue the mean, max and min queries in sequence.
    ///
    /// Transport errors propagate. A refused min view degrades to an empty
    /// series, since missing minima already default per timestamp.
    pub async fn fetch(&self, metric: &MetricHandle, window: &QueryWindow) -> Result<FetchOutcome> {
        let mean = self.source.query_measures(metric, Aggregation::Mean, window).await?;
        let max = self.source.query_measures(metric, Aggregation::Max, window).await?;
        let min = self.source.query_measures(metric, Aggregation::Min, window).await?;

        let mean = match mean {
            MeasureResponse::Measures(measures) => measures,
            MeasureResponse::Rejected { status, body } => {
                return Ok(FetchOutcome::Skipped {
                    aggregation: Aggregation::Mean,
                    status,
                    detail: body,
                })
            }
        };
        let max = match max {
            MeasureResponse::Measures(measures) => measures,
            MeasureResponse::Rejected { status, body } => {
                return Ok(FetchOutcome::Skipped {
                    aggregation: Aggregation::Max,
                    status,
                    detail: body,
                })
            }
        };
        let min = match min {
            MeasureResponse::Measures(measures) => measures,
            MeasureResponse::Rejected { status, .. } => {
                warn!("Min view of metric {} refused ({}), using empty series", metric, status);
                Vec::new()
            }
        };

        debug!(
            "Metric {}: {} mean, {} max, {} min measures",
            metric,
            mean.len(),
            max.len(),
            min.len()
        );

        Ok(FetchOutcome::Complete(AggregatedSeries { mean, max, min }))
    }
}
