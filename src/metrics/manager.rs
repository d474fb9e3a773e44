use std::sync::{Arc, Mutex};

use prometheus_client::{encoding::text::encode, registry::Registry};

use crate::{errors::NexusError, metrics::collector::GaugeCollector, registry::MetricRegistry};

#[derive(Clone)]
pub struct MetricsManager {
    pub registry: Arc<Mutex<Registry>>,
}

impl MetricsManager {
    pub fn new(gauges: Arc<MetricRegistry>) -> Self {
        let mut registry = Registry::default();
        registry.register_collector(Box::new(GaugeCollector::new(gauges)));
        MetricsManager { registry: Arc::new(Mutex::new(registry)) }
    }

    /// Encodes every registered metric in the text exposition format.
    pub fn encode(&self) -> Result<String, NexusError> {
        let registry = self.registry.lock()?;
        let mut buffer = String::new();
        encode(&mut buffer, &registry).map_err(|e| anyhow::anyhow!("failed to encode metrics: {}", e))?;
        Ok(buffer)
    }
}
