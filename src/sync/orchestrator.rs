/// Incremental metric synchronization: plan, fetch, merge, persist, deliver
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clients::{InstanceDirectory, MeasureSource, OwnershipResolver, RecordSink};
use crate::error::Result;
use crate::sync::{
    FetchOutcome, InstancePlan, InstanceRecords, MetricQueryClient, OutputArtifact, QueryWindow,
    RecordMerger, SyncPlan, WatermarkStore,
};
use crate::types::{Instance, InstanceMeta, MergedRecord, Ownership, SyncSettings, Watermark};

/// What happened to the record set at the ingestion endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered { status: u16 },
    Rejected { status: u16, body: String },
    Failed { reason: String },
    Skipped,
}

/// Summary of one sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub granularity: u64,
    pub instances: usize,
    pub work_items: usize,
    pub pairs_merged: usize,
    pub measures_merged: usize,
    pub records_emitted: usize,
    pub skipped: Vec<String>,
    pub previous_watermark: Option<Watermark>,
    /// Stored cursor after the run
    pub watermark: Option<Watermark>,
    pub watermark_advanced: bool,
    pub delivery: DeliveryStatus,
}

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub records: Vec<MergedRecord>,
    pub report: SyncReport,
}

pub struct SyncOrchestrator {
    settings: SyncSettings,
    directory: Arc<dyn InstanceDirectory>,
    resolver: Arc<dyn OwnershipResolver>,
    query: MetricQueryClient,
    watermark: Arc<dyn WatermarkStore>,
    artifact: OutputArtifact,
    sink: Option<Arc<dyn RecordSink>>,
}

impl SyncOrchestrator {
    pub fn new(
        settings: SyncSettings,
        directory: Arc<dyn InstanceDirectory>,
        resolver: Arc<dyn OwnershipResolver>,
        source: Arc<dyn MeasureSource>,
        watermark: Arc<dyn WatermarkStore>,
    ) -> Self {
        let artifact = OutputArtifact::new(&settings.output_path);
        Self {
            settings,
            directory,
            resolver,
            query: MetricQueryClient::new(source),
            watermark,
            artifact,
            sink: None,
        }
    }

    /// Hand the final record set to `sink` at the end of each run
    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run one synchronization pass.
    ///
    /// Nothing is persisted until every work item has been fetched and
    /// merged; an error before that point leaves the watermark untouched.
    pub async fn run(&self) -> Result<SyncOutcome> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("🚀 Starting metric sync run {}", run_id);

        let previous = self.watermark.load().await?;
        let window = QueryWindow::from_watermark(previous.as_ref(), &self.settings);
        match &previous {
            Some(mark) => info!("   Resuming after {} (granularity {}s)", mark, window.granularity),
            None => info!("   No watermark, full-range fetch (granularity {}s)", window.granularity),
        }

        let mut skipped = Vec::new();
        let plan = self.build_plan(&mut skipped).await?;
        let instance_count = plan.instances.len();
        let work_items = plan.work_item_count();
        info!("📋 Planned {} work items across {} instances", work_items, instance_count);

        let mut merger = RecordMerger::new();
        let mut records = Vec::new();
        let mut pairs_merged = 0;

        for (idx, instance) in plan.instances.into_iter().enumerate() {
            info!(
                "📥 [{}/{}] Syncing {} ({} metrics)",
                idx + 1,
                instance_count,
                instance.meta.instance_name,
                instance.items.len()
            );

            let mut instance_records = InstanceRecords::new(instance.meta.clone());
            for item in &instance.items {
                match self.query.fetch(&item.handle, &window).await? {
                    FetchOutcome::Complete(series) => {
                        let series = series.within(&window);
                        let merged = merger.merge(&mut instance_records, &item.metric, &series);
                        debug!("   {} -> {} measures", item.metric, merged);
                        pairs_merged += 1;
                    }
                    FetchOutcome::Skipped {
                        aggregation,
                        status,
                        detail,
                    } => {
                        warn!(
                            "⚠️  Failed to fetch {} of instance {}: {} view returned {}",
                            item.metric,
                            instance.meta.instance_id,
                            aggregation.as_str(),
                            status
                        );
                        skipped.push(format!(
                            "{}/{}: {} view returned {}: {}",
                            instance.meta.instance_id,
                            item.metric,
                            aggregation.as_str(),
                            status,
                            detail
                        ));
                    }
                }
            }

            records.extend(instance_records.into_records());
        }

        self.artifact.write(&records).await?;

        let advanced = self.advance_watermark(previous.as_ref(), merger.latest()).await?;
        let delivery = self.deliver(&records).await;

        let report = SyncReport {
            run_id,
            started_at,
            duration_ms: (Utc::now() - started_at).num_milliseconds(),
            granularity: window.granularity,
            instances: instance_count,
            work_items,
            pairs_merged,
            measures_merged: merger.merged_measures(),
            records_emitted: records.len(),
            skipped,
            watermark_advanced: advanced.is_some(),
            watermark: advanced.or_else(|| previous.clone()),
            previous_watermark: previous,
            delivery,
        };

        info!("✅ Sync run {} finished:", run_id);
        info!("   Records: {}", report.records_emitted);
        info!("   Pairs merged: {}/{}", report.pairs_merged, report.work_items);
        if !report.skipped.is_empty() {
            warn!("   Skipped pairs: {}", report.skipped.len());
        }

        Ok(SyncOutcome { records, report })
    }

    /// Enumerate instances and their tracked metrics before any measure query
    async fn build_plan(&self, skipped: &mut Vec<String>) -> Result<SyncPlan> {
        let instances = self.directory.list_instances().await?;
        let mut owners: HashMap<String, Ownership> = HashMap::new();
        let mut plan = SyncPlan::default();

        for instance in &instances {
            let catalog = match self.directory.metric_catalog(&instance.id).await {
                Ok(catalog) => catalog,
                Err(e) if e.is_recoverable() => {
                    warn!("⚠️  No metric catalog for instance {}: {}", instance.id, e);
                    skipped.push(format!("{}: {}", instance.id, e));
                    continue;
                }
                Err(e) => return Err(e),
            };

            if !self.settings.tracked_metrics.iter().any(|m| catalog.contains_key(m)) {
                debug!("Instance {} exposes no tracked metrics", instance.id);
                continue;
            }

            let ownership = match instance.project_id.as_deref() {
                Some(project_id) => {
                    if let Some(cached) = owners.get(project_id) {
                        cached.clone()
                    } else {
                        let resolved = self.resolve_ownership(instance, project_id).await;
                        owners.insert(project_id.to_string(), resolved.clone());
                        resolved
                    }
                }
                None => Ownership::default(),
            };

            plan.push(InstancePlan::new(
                InstanceMeta::new(instance, ownership),
                &catalog,
                &self.settings.tracked_metrics,
            ));
        }

        Ok(plan)
    }

    /// Project and domain names; any failure degrades to empty names
    async fn resolve_ownership(&self, instance: &Instance, project_id: &str) -> Ownership {
        let project = match self.resolver.resolve_project(project_id).await {
            Ok(Some(project)) => project,
            Ok(None) => {
                warn!("⚠️  Project {} of instance {} not resolvable", project_id, instance.id);
                return Ownership::default();
            }
            Err(e) => {
                warn!("⚠️  Project lookup for {} failed: {} ({})", project_id, e, e.error_code());
                return Ownership::default();
            }
        };

        let domain_name = if project.domain_id.is_empty() {
            String::new()
        } else {
            match self.resolver.resolve_domain(&project.domain_id).await {
                Ok(Some(domain)) => domain.name,
                Ok(None) => {
                    warn!("⚠️  Domain {} not resolvable", project.domain_id);
                    String::new()
                }
                Err(e) => {
                    warn!("⚠️  Domain lookup for {} failed: {} ({})", project.domain_id, e, e.error_code());
                    String::new()
                }
            }
        };

        Ownership {
            project_name: project.name,
            domain_name,
        }
    }

    /// Persist the run's newest timestamp if it moves the cursor forward
    async fn advance_watermark(
        &self,
        previous: Option<&Watermark>,
        latest: Option<&Watermark>,
    ) -> Result<Option<Watermark>> {
        let Some(latest) = latest else {
            info!("No new measures, watermark unchanged");
            return Ok(None);
        };

        if let Some(previous) = previous {
            if latest <= previous {
                warn!("⚠️  Newest measure {} is not after watermark {}, keeping it", latest, previous);
                return Ok(None);
            }
        }

        self.watermark.save(latest).await?;
        info!("Updated last sync timestamp to {}", latest);
        Ok(Some(latest.clone()))
    }

    async fn deliver(&self, records: &[MergedRecord]) -> DeliveryStatus {
        let Some(sink) = &self.sink else {
            info!("Delivery disabled, {} records kept locally", records.len());
            return DeliveryStatus::Skipped;
        };

        match sink.deliver(records).await {
            Ok(receipt) if receipt.is_success() => {
                info!("📤 Delivered {} records (status {})", records.len(), receipt.status);
                DeliveryStatus::Delivered {
                    status: receipt.status,
                }
            }
            Ok(receipt) => {
                error!("❌ Delivery rejected with status {}: {}", receipt.status, receipt.body);
                DeliveryStatus::Rejected {
                    status: receipt.status,
                    body: receipt.body,
                }
            }
            Err(e) => {
                error!("❌ Delivery failed: {} ({})", e, e.error_code());
                DeliveryStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{DeliveryReceipt, MeasureResponse};
    use crate::error::SyncError;
    use crate::sync::FileWatermarkStore;
    use crate::types::{Aggregation, Domain, Measure, MetricCatalog, MetricHandle, MetricValue, Project};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    const T1: &str = "2024-03-01T00:00:00+00:00";
    const T2: &str = "2024-03-02T00:00:00+00:00";

    struct FakeDirectory {
        instances: Vec<(Instance, MetricCatalog)>,
    }

    #[async_trait]
    impl InstanceDirectory for FakeDirectory {
        async fn list_instances(&self) -> Result<Vec<Instance>> {
            Ok(self.instances.iter().map(|(i, _)| i.clone()).collect())
        }

        async fn metric_catalog(&self, instance_id: &str) -> Result<MetricCatalog> {
            self.instances
                .iter()
                .find(|(i, _)| i.id == instance_id)
                .map(|(_, c)| c.clone())
                .ok_or_else(|| SyncError::MissingData(instance_id.to_string()))
        }
    }

    #[derive(Default)]
    struct FakeResolver {
        projects: HashMap<String, Project>,
        domains: HashMap<String, Domain>,
        broken: bool,
        project_calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl OwnershipResolver for FakeResolver {
        async fn resolve_project(&self, project_id: &str) -> Result<Option<Project>> {
            self.project_calls.lock().unwrap().push(project_id.to_string());
            if self.broken {
                return Err(SyncError::UpstreamRejected {
                    status: 503,
                    body: "identity down".to_string(),
                });
            }
            Ok(self.projects.get(project_id).cloned())
        }

        async fn resolve_domain(&self, domain_id: &str) -> Result<Option<Domain>> {
            Ok(self.domains.get(domain_id).cloned())
        }
    }

    /// Upstream stand-in honouring the inclusive `start` bound
    #[derive(Default)]
    struct FakeSource {
        series: HashMap<(String, Aggregation), Vec<Measure>>,
        refused: HashSet<(String, Aggregation)>,
        broken: HashSet<String>,
        windows: Mutex<Vec<QueryWindow>>,
    }

    impl FakeSource {
        fn with_series(mut self, handle: &str, aggregation: Aggregation, measures: Vec<Measure>) -> Self {
            self.series.insert((handle.to_string(), aggregation), measures);
            self
        }
    }

    #[async_trait]
    impl MeasureSource for FakeSource {
        async fn query_measures(
            &self,
            metric: &MetricHandle,
            aggregation: Aggregation,
            window: &QueryWindow,
        ) -> Result<MeasureResponse> {
            self.windows.lock().unwrap().push(window.clone());
            let key = (metric.as_str().to_string(), aggregation);

            if self.broken.contains(metric.as_str()) {
                let parse_error = serde_json::from_str::<serde_json::Value>("<html>").unwrap_err();
                return Err(SyncError::DeserializationError(parse_error));
            }
            if self.refused.contains(&key) {
                return Ok(MeasureResponse::Rejected {
                    status: 404,
                    body: "Metric not found".to_string(),
                });
            }

            let measures = self
                .series
                .get(&key)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|m| match &window.start {
                    Some(start) => m.timestamp.as_str() >= start.as_str(),
                    None => true,
                })
                .collect();
            Ok(MeasureResponse::Measures(measures))
        }
    }

    struct RecordingSink {
        status: u16,
        deliveries: Mutex<Vec<Vec<MergedRecord>>>,
    }

    impl RecordingSink {
        fn new(status: u16) -> Arc<Self> {
            Arc::new(RecordingSink {
                status,
                deliveries: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RecordSink for RecordingSink {
        async fn deliver(&self, records: &[MergedRecord]) -> Result<DeliveryReceipt> {
            self.deliveries.lock().unwrap().push(records.to_vec());
            Ok(DeliveryReceipt {
                status: self.status,
                body: "{\"ok\": true}".to_string(),
            })
        }
    }

    fn settings(dir: &Path) -> SyncSettings {
        SyncSettings {
            tracked_metrics: vec!["cpu_util".to_string(), "memory.usage".to_string()],
            watermark_path: dir.join("last_sync.txt").to_string_lossy().into_owned(),
            output_path: dir.join("output.json").to_string_lossy().into_owned(),
            ..SyncSettings::default()
        }
    }

    fn web_instance() -> (Instance, MetricCatalog) {
        let instance = Instance {
            id: "i-1".to_string(),
            name: "web-1".to_string(),
            project_id: Some("p-1".to_string()),
        };
        let catalog = [("cpu_util", "m-cpu"), ("memory.usage", "m-mem"), ("vcpus", "m-vcpu")]
            .into_iter()
            .map(|(name, id)| (name.to_string(), MetricHandle(id.to_string())))
            .collect();
        (instance, catalog)
    }

    fn resolver() -> FakeResolver {
        FakeResolver {
            projects: [(
                "p-1".to_string(),
                Project {
                    name: "shop".to_string(),
                    domain_id: "d-1".to_string(),
                },
            )]
            .into_iter()
            .collect(),
            domains: [("d-1".to_string(), Domain { name: "Default".to_string() })]
                .into_iter()
                .collect(),
            broken: false,
            project_calls: Mutex::new(Vec::new()),
        }
    }

    fn instance(id: &str, name: &str, project_id: &str, metrics: &[(&str, &str)]) -> (Instance, MetricCatalog) {
        let instance = Instance {
            id: id.to_string(),
            name: name.to_string(),
            project_id: Some(project_id.to_string()),
        };
        let catalog = metrics
            .iter()
            .map(|(name, handle)| (name.to_string(), MetricHandle(handle.to_string())))
            .collect();
        (instance, catalog)
    }

    fn orchestrator(dir: &TempDir, resolver: FakeResolver, source: Arc<FakeSource>) -> SyncOrchestrator {
        orchestrator_over(dir, vec![web_instance()], Arc::new(resolver), source)
    }

    fn orchestrator_over(
        dir: &TempDir,
        instances: Vec<(Instance, MetricCatalog)>,
        resolver: Arc<FakeResolver>,
        source: Arc<FakeSource>,
    ) -> SyncOrchestrator {
        let settings = settings(dir.path());
        let store = Arc::new(FileWatermarkStore::new(&settings.watermark_path));
        SyncOrchestrator::new(
            settings,
            Arc::new(FakeDirectory { instances }),
            resolver,
            source,
            store,
        )
    }

    fn scenario_source() -> FakeSource {
        FakeSource::default()
            .with_series(
                "m-cpu",
                Aggregation::Mean,
                vec![Measure::new(T1, 86400.0, 1.0), Measure::new(T2, 86400.0, 2.0)],
            )
            .with_series("m-cpu", Aggregation::Max, vec![Measure::new(T1, 86400.0, 1.5)])
    }

    #[tokio::test]
    async fn test_merge_scenario_end_to_end() {
        let dir = tempdir().unwrap();
        let sink = RecordingSink::new(200);
        let sync = orchestrator(&dir, resolver(), Arc::new(scenario_source())).with_sink(sink.clone());

        let outcome = sync.run().await.unwrap();

        assert_eq!(outcome.records.len(), 2);
        let first = &outcome.records[0];
        assert_eq!(first.timestamp, T1);
        assert_eq!(first.instance_name, "web-1");
        assert_eq!(first.project_name, "shop");
        assert_eq!(first.domain_name, "Default");
        assert_eq!(first.granularity, 86400.0);
        assert_eq!(first.metric("cpu_util", Aggregation::Mean), Some(&MetricValue::Number(1.0)));
        assert_eq!(first.metric("cpu_util", Aggregation::Max), Some(&MetricValue::Number(1.5)));
        assert_eq!(first.metric("cpu_util", Aggregation::Min), Some(&MetricValue::Number(0.0)));
        let second = &outcome.records[1];
        assert_eq!(second.metric("cpu_util", Aggregation::Max), Some(&MetricValue::Number(0.0)));
        assert_eq!(second.metric("cpu_util", Aggregation::Min), Some(&MetricValue::Number(0.0)));

        assert_eq!(
            std::fs::read_to_string(dir.path().join("last_sync.txt")).unwrap(),
            T2
        );
        assert!(outcome.report.watermark_advanced);
        assert_eq!(outcome.report.watermark, Some(Watermark::new(T2)));
        assert_eq!(outcome.report.granularity, 86400);
        assert_eq!(outcome.report.work_items, 2);
        assert_eq!(outcome.report.pairs_merged, 2);
        assert_eq!(outcome.report.delivery, DeliveryStatus::Delivered { status: 200 });

        let delivered = sink.deliveries.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0], outcome.records);

        let artifact = OutputArtifact::new(dir.path().join("output.json"));
        assert_eq!(artifact.read().await.unwrap(), outcome.records);
    }

    #[tokio::test]
    async fn test_no_data_leaves_watermark_byte_identical() {
        let dir = tempdir().unwrap();
        let mark_path = dir.path().join("last_sync.txt");
        std::fs::write(&mark_path, "2024-03-01T00:00:00+00:00\n").unwrap();
        let before = std::fs::read(&mark_path).unwrap();

        let outcome = orchestrator(&dir, resolver(), Arc::new(FakeSource::default()))
            .run()
            .await
            .unwrap();

        assert!(outcome.records.is_empty());
        assert!(!outcome.report.watermark_advanced);
        assert_eq!(outcome.report.delivery, DeliveryStatus::Skipped);
        assert_eq!(std::fs::read(&mark_path).unwrap(), before);
        assert_eq!(std::fs::read_to_string(dir.path().join("output.json")).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_second_run_does_not_repeat_timestamps() {
        let dir = tempdir().unwrap();
        let source = Arc::new(scenario_source());
        let sync = orchestrator(&dir, resolver(), source.clone());

        let first = sync.run().await.unwrap();
        let second = sync.run().await.unwrap();

        assert_eq!(first.records.len(), 2);
        assert!(second.records.is_empty());
        assert!(!second.report.watermark_advanced);
        assert_eq!(second.report.previous_watermark, Some(Watermark::new(T2)));
        assert_eq!(second.report.watermark, Some(Watermark::new(T2)));
        assert_eq!(second.report.granularity, 300);

        let windows = source.windows.lock().unwrap();
        let resumed = windows.last().unwrap();
        assert_eq!(resumed.start, Some(Watermark::new(T2)));
        assert_eq!(resumed.granularity, 300);
    }

    #[tokio::test]
    async fn test_refused_pair_is_skipped_and_run_continues() {
        let dir = tempdir().unwrap();
        let mut source = scenario_source().with_series(
            "m-mem",
            Aggregation::Mean,
            vec![Measure::new(T1, 86400.0, 2048.0)],
        );
        source.refused.insert(("m-cpu".to_string(), Aggregation::Mean));

        let outcome = orchestrator(&dir, resolver(), Arc::new(source)).run().await.unwrap();

        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0];
        assert!(record.metric("cpu_util", Aggregation::Mean).is_none());
        assert_eq!(record.metric("memory.usage", Aggregation::Mean), Some(&MetricValue::Number(2048.0)));
        assert_eq!(record.metric("memory.usage", Aggregation::Max), Some(&MetricValue::Number(0.0)));
        assert_eq!(outcome.report.skipped.len(), 1);
        assert!(outcome.report.skipped[0].starts_with("i-1/cpu_util"));
        assert_eq!(outcome.report.watermark, Some(Watermark::new(T1)));
    }

    #[tokio::test]
    async fn test_resolution_failure_falls_back_to_empty_names() {
        let dir = tempdir().unwrap();
        let broken = FakeResolver {
            broken: true,
            ..FakeResolver::default()
        };

        let outcome = orchestrator(&dir, broken, Arc::new(scenario_source())).run().await.unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert!(outcome.records.iter().all(|r| r.project_name.is_empty() && r.domain_name.is_empty()));
    }

    #[tokio::test]
    async fn test_fatal_error_persists_nothing() {
        let dir = tempdir().unwrap();
        let mut source = scenario_source();
        source.broken.insert("m-mem".to_string());

        let result = orchestrator(&dir, resolver(), Arc::new(source)).run().await;

        assert!(matches!(result, Err(SyncError::DeserializationError(_))));
        assert!(!dir.path().join("last_sync.txt").exists());
        assert!(!dir.path().join("output.json").exists());
    }

    #[tokio::test]
    async fn test_rejected_delivery_still_advances_watermark() {
        let dir = tempdir().unwrap();
        let sink = RecordingSink::new(500);
        let sync = orchestrator(&dir, resolver(), Arc::new(scenario_source())).with_sink(sink);

        let outcome = sync.run().await.unwrap();

        assert!(matches!(outcome.report.delivery, DeliveryStatus::Rejected { status: 500, .. }));
        assert!(outcome.report.watermark_advanced);
        assert!(dir.path().join("output.json").exists());
    }

    #[tokio::test]
    async fn test_records_span_instances_in_directory_order() {
        let dir = tempdir().unwrap();
        let t3 = "2024-03-03T00:00:00+00:00";
        let instances = vec![
            web_instance(),
            instance("i-2", "idle-1", "p-1", &[("vcpus", "m-vcpu-2")]),
            instance("i-3", "db-1", "p-1", &[("cpu_util", "m-cpu-3")]),
        ];
        let source = FakeSource::default()
            .with_series("m-cpu", Aggregation::Mean, vec![Measure::new(T2, 86400.0, 2.0)])
            .with_series(
                "m-cpu-3",
                Aggregation::Mean,
                vec![Measure::new(T1, 86400.0, 30.0), Measure::new(t3, 86400.0, 40.0)],
            );
        let resolver = Arc::new(resolver());

        let outcome = orchestrator_over(&dir, instances, resolver.clone(), Arc::new(source))
            .run()
            .await
            .unwrap();

        let rows: Vec<(&str, &str)> = outcome
            .records
            .iter()
            .map(|r| (r.instance_id.as_str(), r.timestamp.as_str()))
            .collect();
        assert_eq!(rows, vec![("i-1", T2), ("i-3", T1), ("i-3", t3)]);
        assert!(outcome.records.iter().all(|r| r.instance_id != "i-2"));
        assert!(outcome.records.iter().all(|r| r.project_name == "shop"));
        assert_eq!(outcome.report.instances, 2);

        assert_eq!(std::fs::read_to_string(dir.path().join("last_sync.txt")).unwrap(), t3);
        assert_eq!(*resolver.project_calls.lock().unwrap(), vec!["p-1".to_string()]);
    }

    #[tokio::test]
    async fn test_stale_measures_never_move_watermark_back() {
        let dir = tempdir().unwrap();
        let mark_path = dir.path().join("last_sync.txt");
        std::fs::write(&mark_path, "2024-04-01T00:00:00+00:00").unwrap();

        let sync = orchestrator(&dir, resolver(), Arc::new(scenario_source()));
        let outcome = sync.run().await.unwrap();

        assert!(outcome.records.is_empty());
        assert_eq!(
            std::fs::read_to_string(&mark_path).unwrap(),
            "2024-04-01T00:00:00+00:00"
        );
    }
}
