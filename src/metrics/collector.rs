use std::{borrow::Cow, sync::Arc};

use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeMetric},
    metrics::gauge::ConstGauge,
};

use crate::registry::MetricRegistry;

/// Exposes every gauge of a [`MetricRegistry`] at scrape time. Nothing is registered per metric,
/// so a deleted metric is simply absent from the next scrape.
#[derive(Debug)]
pub struct GaugeCollector {
    gauges: Arc<MetricRegistry>,
}

impl GaugeCollector {
    pub fn new(gauges: Arc<MetricRegistry>) -> Self {
        Self { gauges }
    }
}

impl Collector for GaugeCollector {
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), std::fmt::Error> {
        let entries = self.gauges.entries().map_err(|e| {
            log::error!("failed to collect gauges: {}", e);
            std::fmt::Error
        })?;

        for metric in entries {
            let value = metric.get().map_err(|_| std::fmt::Error)?;
            let gauge = ConstGauge::new(value);
            let help = escape_help(metric.description());
            let metric_encoder = encoder.encode_descriptor(metric.key(), &help, None, gauge.metric_type())?;
            gauge.encode(metric_encoder)?;
        }

        Ok(())
    }
}

/// HELP text is written verbatim by the text encoder, so backslashes and line feeds are escaped
/// here to keep a description on its own line.
fn escape_help(help: &str) -> Cow<'_, str> {
    if !help.contains(['\\', '\n']) {
        return Cow::Borrowed(help);
    }
    Cow::Owned(help.replace('\\', "\\\\").replace('\n', "\\n"))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::metrics::manager::MetricsManager;

    #[test]
    fn test_gauge_collector_exposition() {
        let gauges = Arc::new(MetricRegistry::default());
        gauges.create("uptime", "metric server uptime", &3).unwrap();
        gauges.create("load", "load average", "0.5").unwrap();

        let manager = MetricsManager::new(Arc::clone(&gauges));
        let text = manager.encode().unwrap();
        println!("exposition:\n{}", text);
        assert!(text.contains("# HELP uptime metric server uptime"));
        assert!(text.contains("# TYPE uptime gauge"));
        assert!(text.contains("uptime 3.0"));
        assert!(text.contains("load 0.5"));

        assert!(gauges.delete("uptime").unwrap());
        let text = manager.encode().unwrap();
        assert!(!text.contains("uptime"));
        assert!(text.contains("load 0.5"));
    }

    #[test]
    fn test_gauge_collector_hostile_input() {
        let gauges = Arc::new(MetricRegistry::default());
        assert!(gauges.create("1abc", "", &1).is_err());
        gauges.create("__x", "multi\nline # TYPE evil counter", &1).unwrap();
        gauges.create("path", "C:\\temp", &2).unwrap();

        let manager = MetricsManager::new(Arc::clone(&gauges));
        let text = manager.encode().unwrap();
        println!("exposition:\n{}", text);
        assert!(!text.contains("1abc"));
        assert!(text.contains("# HELP __x multi\\nline # TYPE evil counter\n"));
        assert!(text.contains("# HELP path C:\\\\temp\n"));
        assert!(!text.lines().any(|line| line.starts_with("line")));
    }

    #[test]
    fn test_escape_help() {
        assert_eq!(escape_help("plain text"), "plain text");
        assert!(matches!(escape_help("plain text"), Cow::Borrowed(_)));
        assert_eq!(escape_help("a\nb"), "a\\nb");
        assert_eq!(escape_help("a\\b"), "a\\\\b");
        assert_eq!(escape_help("\\\n"), "\\\\\\n");
    }
}
