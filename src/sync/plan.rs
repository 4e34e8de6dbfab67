/// Ordered (instance, metric) work items of one run
use crate::types::{InstanceMeta, MetricCatalog, MetricHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub metric: String,
    pub handle: MetricHandle,
}

#[derive(Debug, Clone)]
pub struct InstancePlan {
    pub meta: InstanceMeta,
    pub items: Vec<WorkItem>,
}

impl InstancePlan {
    /// One work item per tracked metric the catalog exposes, in tracked order
    pub fn new(meta: InstanceMeta, catalog: &MetricCatalog, tracked: &[String]) -> Self {
        let items = tracked
            .iter()
            .filter_map(|metric| {
                catalog.get(metric).map(|handle| WorkItem {
                    metric: metric.clone(),
                    handle: handle.clone(),
                })
            })
            .collect();

        InstancePlan { meta, items }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub instances: Vec<InstancePlan>,
}

impl SyncPlan {
    pub fn push(&mut self, instance: InstancePlan) {
        self.instances.push(instance);
    }

    pub fn work_item_count(&self) -> usize {
        self.instances.iter().map(|i| i.items.len()).sum()
    }
}
