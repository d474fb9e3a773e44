//! The live metric registry.
//!
//! `MetricRegistry` maps normalized keys to [`Metric`]s. Locking is split in two tiers:
//!
//! * the registry-wide `RwLock` guards the set of keys. Create and delete take it exclusively;
//!   value operations only share it, so they never contend with each other.
//! * each metric's own mutex guards its value for the read-modify-write of a single operation.
//!
//! The snapshot mirror is kept in step with every change by [`MetricRegistry::sync_snapshot`].
//! Lock order is always registry, then metric, then snapshot.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{
    errors::NexusError,
    metric::{coerce_value, is_valid_key, normalize_key, Metric, ToMetricValue},
    snapshot::Snapshot,
};

#[derive(Debug)]
pub struct MetricRegistry {
    metrics: RwLock<HashMap<String, Arc<Metric>>>,
    snapshot: Arc<Snapshot>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new(Arc::new(Snapshot::new()))
    }
}

impl MetricRegistry {
    pub fn new(snapshot: Arc<Snapshot>) -> Self {
        Self { metrics: RwLock::new(HashMap::new()), snapshot }
    }

    /// Builds a registry holding every record of `snapshot`.
    pub fn from_snapshot(snapshot: Arc<Snapshot>) -> Result<Self, NexusError> {
        let registry = Self::new(snapshot);
        for record in registry.snapshot.records()? {
            registry.create(&record.key, &record.description, &record.value)?;
        }
        Ok(registry)
    }

    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    /// Creates the metric if no metric exists under the normalized key. Returns whether it was
    /// created; an existing metric is left untouched.
    pub fn create<V>(&self, key: &str, description: &str, value: &V) -> Result<bool, NexusError>
    where
        V: ToMetricValue + ?Sized,
    {
        let key = valid_key(key)?;
        let value = coerce_value(value)?;

        let mut metrics = self.metrics.write()?;
        if metrics.contains_key(&key) {
            return Ok(false);
        }

        let metric = Arc::new(Metric::new(&key, description, value));
        metric.modify(|_| value, |v| self.sync_snapshot(&metric, v, true))?;
        metrics.insert(key, metric);
        Ok(true)
    }

    /// Creates the metric if it is absent, then sets its value.
    pub fn create_or_update<V>(&self, key: &str, description: &str, value: &V) -> Result<(), NexusError>
    where
        V: ToMetricValue + ?Sized,
    {
        let key = valid_key(key)?;
        let value = coerce_value(value)?;

        let mut metrics = self.metrics.write()?;
        let metric =
            Arc::clone(metrics.entry(key).or_insert_with_key(|k| Arc::new(Metric::new(k, description, value))));
        metric.modify(|_| value, |v| self.sync_snapshot(&metric, v, true))?;
        Ok(())
    }

    pub fn read(&self, key: &str) -> Result<Option<f64>, NexusError> {
        let metrics = self.metrics.read()?;
        match metrics.get(&normalize_key(key)) {
            Some(metric) => Ok(Some(metric.get()?)),
            None => Ok(None),
        }
    }

    /// Overwrites the value of an existing metric. Returns false when the metric does not exist.
    pub fn update<V>(&self, key: &str, value: &V) -> Result<bool, NexusError>
    where
        V: ToMetricValue + ?Sized,
    {
        let value = coerce_value(value)?;
        Ok(self.modify(key, |_| value)?.is_some())
    }

    /// Adds `delta` to an existing metric and returns the new value.
    pub fn add<V>(&self, key: &str, delta: &V) -> Result<Option<f64>, NexusError>
    where
        V: ToMetricValue + ?Sized,
    {
        let delta = coerce_value(delta)?;
        self.modify(key, |v| v + delta)
    }

    pub fn subtract<V>(&self, key: &str, delta: &V) -> Result<Option<f64>, NexusError>
    where
        V: ToMetricValue + ?Sized,
    {
        let delta = coerce_value(delta)?;
        self.modify(key, |v| v - delta)
    }

    pub fn increment(&self, key: &str) -> Result<Option<f64>, NexusError> {
        self.add(key, &1.0)
    }

    pub fn decrement(&self, key: &str) -> Result<Option<f64>, NexusError> {
        self.add(key, &-1.0)
    }

    /// Removes the metric together with its snapshot record. Returns false when it does not exist.
    pub fn delete(&self, key: &str) -> Result<bool, NexusError> {
        let key = normalize_key(key);
        let mut metrics = self.metrics.write()?;
        if metrics.remove(&key).is_none() {
            return Ok(false);
        }

        self.snapshot.record_remove(&key)?;
        Ok(true)
    }

    pub fn keys(&self) -> Result<Vec<String>, NexusError> {
        let mut keys: Vec<String> = self.metrics.read()?.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    /// Handles to every live metric, sorted by key.
    pub fn entries(&self) -> Result<Vec<Arc<Metric>>, NexusError> {
        let mut entries: Vec<Arc<Metric>> = self.metrics.read()?.values().cloned().collect();
        entries.sort_by(|a, b| a.key().cmp(b.key()));
        Ok(entries)
    }

    pub fn len(&self) -> Result<usize, NexusError> {
        Ok(self.metrics.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, NexusError> {
        Ok(self.len()? == 0)
    }

    fn modify<F>(&self, key: &str, f: F) -> Result<Option<f64>, NexusError>
    where
        F: FnOnce(f64) -> f64,
    {
        let metrics = self.metrics.read()?;
        match metrics.get(&normalize_key(key)) {
            Some(metric) => Ok(Some(metric.modify(f, |v| self.sync_snapshot(metric, v, false))?)),
            None => Ok(None),
        }
    }

    /// Mirrors a new value into the snapshot. The record is only appended on create paths; a plain
    /// value change on a metric whose record is missing is left alone.
    fn sync_snapshot(&self, metric: &Metric, value: f64, append: bool) -> Result<(), NexusError> {
        if !self.snapshot.record_set(metric.key(), value)? && append {
            self.snapshot.record_append(metric.key(), metric.description(), value)?;
        }
        Ok(())
    }
}

fn valid_key(key: &str) -> Result<String, NexusError> {
    let key = normalize_key(key);
    if !is_valid_key(&key) {
        return Err(NexusError::ErrMetricKeyInvalid);
    }
    Ok(key)
}

#[cfg(test)]
mod test {
    use std::thread;

    use super::*;
    use crate::{snapshot::SnapshotRecord, test_utils::test_registry};

    #[test]
    fn test_registry_create_read() {
        let registry = MetricRegistry::default();
        assert!(registry.create("uptime", "metric server uptime", &0).unwrap());
        assert_eq!(registry.read("uptime").unwrap(), Some(0.0));

        assert!(registry.create("ratio", "a ratio", "0.75").unwrap());
        assert_eq!(registry.read("ratio").unwrap(), Some(0.75));

        // a second create is a no-op
        assert!(!registry.create("UPTIME", "other", &99).unwrap());
        assert_eq!(registry.read("uptime").unwrap(), Some(0.0));
        assert_eq!(registry.snapshot().records().unwrap()[0].description, "metric server uptime");
        assert_eq!(registry.len().unwrap(), 2);
    }

    #[test]
    fn test_registry_create_invalid() {
        let registry = MetricRegistry::default();
        assert_eq!(registry.create("!!!", "", &1).unwrap_err(), NexusError::ErrMetricKeyInvalid);
        assert_eq!(registry.create("1abc", "", &1).unwrap_err(), NexusError::ErrMetricKeyInvalid);
        assert_eq!(registry.create_or_update("2nd", "", &1).unwrap_err(), NexusError::ErrMetricKeyInvalid);
        assert_eq!(registry.create("x", "", "abc").unwrap_err(), NexusError::ErrMetricValueInvalid);
        assert!(registry.is_empty().unwrap());
        assert!(registry.snapshot().is_empty().unwrap());
    }

    #[test]
    fn test_registry_normalized_keys_share_entry() {
        let registry = MetricRegistry::default();
        assert!(registry.create("My Metric-1!", "normalized", &5).unwrap());
        assert_eq!(registry.read("my_metric_1").unwrap(), Some(5.0));
        assert!(registry.update("MY METRIC-1", &6u8).unwrap());
        assert_eq!(registry.read("My Metric-1!").unwrap(), Some(6.0));
        assert_eq!(registry.keys().unwrap(), vec!["my_metric_1".to_string()]);
    }

    #[test]
    fn test_registry_missing_key_fails_without_snapshot_change() {
        let registry = MetricRegistry::default();
        registry.create("present", "", &1).unwrap();
        let before = registry.snapshot().records().unwrap();

        assert!(!registry.update("absent", &1).unwrap());
        assert_eq!(registry.add("absent", &1).unwrap(), None);
        assert_eq!(registry.subtract("absent", &1).unwrap(), None);
        assert_eq!(registry.increment("absent").unwrap(), None);
        assert_eq!(registry.decrement("absent").unwrap(), None);
        assert!(!registry.delete("absent").unwrap());
        assert_eq!(registry.read("absent").unwrap(), None);

        assert_eq!(registry.snapshot().records().unwrap(), before);
    }

    #[test]
    fn test_registry_arithmetic() {
        let registry = MetricRegistry::default();
        registry.create("gauge", "", &10).unwrap();
        assert_eq!(registry.add("gauge", "2.5").unwrap(), Some(12.5));
        assert_eq!(registry.subtract("gauge", &0.5f32).unwrap(), Some(12.0));
        assert_eq!(registry.increment("gauge").unwrap(), Some(13.0));
        assert_eq!(registry.decrement("gauge").unwrap(), Some(12.0));
        assert_eq!(registry.subtract("gauge", &-3i32).unwrap(), Some(15.0));

        // coercion failure leaves the value alone
        assert_eq!(registry.add("gauge", "lots").unwrap_err(), NexusError::ErrMetricValueInvalid);
        assert_eq!(registry.update("gauge", b"\xff".as_slice()).unwrap_err(), NexusError::ErrMetricValueInvalid);
        assert_eq!(registry.read("gauge").unwrap(), Some(15.0));
        assert_eq!(registry.snapshot().records().unwrap()[0].value, 15.0);
    }

    #[test]
    fn test_registry_uptime_scenario() {
        let registry = MetricRegistry::default();
        assert!(registry.create("uptime", "metric server uptime", &0).unwrap());
        for _ in 0..3 {
            assert!(registry.increment("uptime").unwrap().is_some());
        }
        assert_eq!(registry.read("uptime").unwrap(), Some(3.0));
        assert_eq!(
            registry.snapshot().records().unwrap(),
            vec![SnapshotRecord { key: "uptime".into(), description: "metric server uptime".into(), value: 3.0 }]
        );

        assert!(registry.delete("uptime").unwrap());
        assert_eq!(registry.read("uptime").unwrap(), None);
        assert!(registry.snapshot().is_empty().unwrap());
    }

    #[test]
    fn test_registry_create_or_update() {
        let registry = MetricRegistry::default();
        registry.create_or_update("temp", "temperature", "21.5").unwrap();
        assert_eq!(registry.read("temp").unwrap(), Some(21.5));

        registry.create_or_update("temp", "ignored", &23).unwrap();
        assert_eq!(registry.read("temp").unwrap(), Some(23.0));

        let records = registry.snapshot().records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].description, "temperature");
        assert_eq!(records[0].value, 23.0);
    }

    #[test]
    fn test_registry_from_snapshot() {
        let snapshot = Arc::new(Snapshot::from_records(vec![
            SnapshotRecord { key: "a".into(), description: "first".into(), value: 1.0 },
            SnapshotRecord { key: "b".into(), description: "second".into(), value: 2.0 },
        ]));
        let registry = MetricRegistry::from_snapshot(snapshot).unwrap();
        assert_eq!(registry.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.read("b").unwrap(), Some(2.0));
        assert_eq!(registry.snapshot().len().unwrap(), 2);
    }

    #[test]
    fn test_registry_survives_restart() {
        let (state_file, registry) = test_registry("test_registry_survives_restart");
        assert!(registry.is_empty().unwrap());

        registry.create("uptime", "metric server uptime", &0).unwrap();
        registry.create("doomed", "", &1).unwrap();
        registry.add("uptime", &41).unwrap();
        registry.increment("uptime").unwrap();
        registry.delete("doomed").unwrap();
        registry.snapshot().save(&state_file).unwrap();

        let snapshot = Arc::new(Snapshot::load(&state_file).unwrap());
        let restored = MetricRegistry::from_snapshot(snapshot).unwrap();
        assert_eq!(restored.keys().unwrap(), vec!["uptime".to_string()]);
        assert_eq!(restored.read("uptime").unwrap(), Some(42.0));
        assert_eq!(restored.entries().unwrap()[0].description(), "metric server uptime");
    }

    #[test]
    fn test_registry_concurrent_increments() {
        let registry = Arc::new(MetricRegistry::default());
        registry.create("hits", "", &100).unwrap();
        registry.create("misses", "", &0).unwrap();

        let threads = 16;
        let per_thread = 250;
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..per_thread {
                        assert!(registry.increment("hits").unwrap().is_some());
                        if i % 2 == 0 {
                            assert!(registry.decrement("misses").unwrap().is_some());
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let expected_hits = 100.0 + (threads * per_thread) as f64;
        let expected_misses = -((threads / 2) * per_thread) as f64;
        assert_eq!(registry.read("hits").unwrap(), Some(expected_hits));
        assert_eq!(registry.read("misses").unwrap(), Some(expected_misses));

        let records = registry.snapshot().records().unwrap();
        assert_eq!(records.iter().find(|r| r.key == "hits").unwrap().value, expected_hits);
        assert_eq!(records.iter().find(|r| r.key == "misses").unwrap().value, expected_misses);
    }

    #[test]
    fn test_registry_concurrent_create_delete() {
        let registry = Arc::new(MetricRegistry::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for j in 0..100 {
                        let key = format!("m{}", j % 10);
                        if (i + j) % 2 == 0 {
                            let _ = registry.create(&key, "racing", &j).unwrap();
                        } else {
                            let _ = registry.delete(&key).unwrap();
                        }
                        let _ = registry.increment(&key).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // whatever survived, registry and snapshot agree one-to-one
        let mut snapshot_keys: Vec<String> =
            registry.snapshot().records().unwrap().into_iter().map(|r| r.key).collect();
        snapshot_keys.sort();
        assert_eq!(snapshot_keys, registry.keys().unwrap());
        for record in registry.snapshot().records().unwrap() {
            assert_eq!(registry.read(&record.key).unwrap(), Some(record.value));
        }
    }
}
