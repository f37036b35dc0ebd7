use std::sync::Arc;

use crate::{
    core::{config::Config, pool::WorkerPool, template::RetryTemplate},
    metrics::{CollectorSet, MetricsCollector},
};

/// Builder for constructing a [`RetryTemplate`] with optional resources.
pub struct RetryTemplateBuilder {
    cfg: Config,
    pool: Option<WorkerPool>,
    collectors: Vec<Arc<dyn MetricsCollector>>,
}

impl RetryTemplateBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            pool: None,
            collectors: Vec::new(),
        }
    }

    /// Adds one metrics collector. Collectors are called in insertion order.
    pub fn with_collector(mut self, collector: Arc<dyn MetricsCollector>) -> Self {
        self.collectors.push(collector);
        self
    }

    /// Replaces the collector list.
    pub fn with_collectors(mut self, collectors: Vec<Arc<dyn MetricsCollector>>) -> Self {
        self.collectors = collectors;
        self
    }

    /// Uses `pool` for timed attempts instead of one sized from the config.
    ///
    /// The template shuts the pool down when it is shut down, so a pool shared
    /// between templates stops serving all of them.
    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Builds the template.
    pub fn build(self) -> RetryTemplate {
        let pool = self
            .pool
            .unwrap_or_else(|| WorkerPool::from_config(&self.cfg));
        let collectors = CollectorSet::new(self.collectors);
        RetryTemplate::new_internal(self.cfg, pool, collectors)
    }
}
