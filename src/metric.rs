//! A single named gauge together with the helpers that turn external input into registry keys
//! and values: key normalization and value coercion.

use std::sync::Mutex;

use crate::errors::NexusError;

/// One named scalar gauge. The key and description are fixed at creation, only the value changes,
/// and the value is guarded by the metric's own lock.
#[derive(Debug)]
pub struct Metric {
    key: String,
    description: String,
    value: Mutex<f64>,
}

impl Metric {
    pub fn new(key: &str, description: &str, value: f64) -> Self {
        Self { key: key.to_string(), description: description.to_string(), value: Mutex::new(value) }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn get(&self) -> Result<f64, NexusError> {
        Ok(*self.value.lock()?)
    }

    /// Runs `f` with the value lock held. `f` receives the current value and returns the new one;
    /// `then` is called with the new value before the lock is released so that mirrors of the value
    /// observe writes in the same order as the metric does.
    pub fn modify<F, T>(&self, f: F, then: T) -> Result<f64, NexusError>
    where
        F: FnOnce(f64) -> f64,
        T: FnOnce(f64) -> Result<(), NexusError>,
    {
        let mut value = self.value.lock()?;
        let new_value = f(*value);
        *value = new_value;
        then(new_value)?;
        Ok(new_value)
    }
}

/// Turns a raw metric name into its canonical key: lower-cased, spaces and hyphens become
/// underscores and everything outside `[a-zA-Z0-9_]` is dropped.
pub fn normalize_key(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Whether a normalized key can be exposed as a Prometheus metric name, `[a-zA-Z_][a-zA-Z0-9_]*`.
pub fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Conversion of externally typed input into a gauge value.
///
/// Implemented for every primitive integer width, `f32`/`f64`, and textual input (`str`, `String`,
/// `[u8]`, `Vec<u8>`) that parses as a base-10 float. `None` means the input is not a number.
pub trait ToMetricValue {
    fn to_metric_value(&self) -> Option<f64>;
}

macro_rules! impl_to_metric_value_for_number {
    ($($t:ty),*) => {
        $(
            impl ToMetricValue for $t {
                fn to_metric_value(&self) -> Option<f64> {
                    Some(*self as f64)
                }
            }
        )*
    };
}

impl_to_metric_value_for_number!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl ToMetricValue for str {
    fn to_metric_value(&self) -> Option<f64> {
        self.trim().parse::<f64>().ok()
    }
}

impl ToMetricValue for String {
    fn to_metric_value(&self) -> Option<f64> {
        self.as_str().to_metric_value()
    }
}

impl ToMetricValue for [u8] {
    fn to_metric_value(&self) -> Option<f64> {
        std::str::from_utf8(self).ok()?.to_metric_value()
    }
}

impl ToMetricValue for Vec<u8> {
    fn to_metric_value(&self) -> Option<f64> {
        self.as_slice().to_metric_value()
    }
}

impl<T: ToMetricValue + ?Sized> ToMetricValue for &T {
    fn to_metric_value(&self) -> Option<f64> {
        (**self).to_metric_value()
    }
}

pub fn coerce_value<V: ToMetricValue + ?Sized>(value: &V) -> Result<f64, NexusError> {
    value.to_metric_value().ok_or(NexusError::ErrMetricValueInvalid)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("My Metric-1!"), "my_metric_1");
        assert_eq!(normalize_key("my_metric_1"), "my_metric_1");
        assert_eq!(normalize_key(" Uptime\t"), "_uptime");
        assert_eq!(normalize_key("cpu.load/avg"), "cpuloadavg");
        assert_eq!(normalize_key("Ünïcode"), "ncode");
        assert_eq!(normalize_key("!!!"), "");

        for raw in ["My Metric-1!", "a b c", "x--y", "UPPER", "__metrics"] {
            let once = normalize_key(raw);
            assert_eq!(normalize_key(&once), once);
        }
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("uptime"));
        assert!(is_valid_key("_uptime"));
        assert!(is_valid_key("disk_free_2"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("1abc"));
        assert!(!is_valid_key("9"));
        assert!(!is_valid_key("cpu.load"));
        assert!(is_valid_key(&normalize_key("My Metric-1!")));
        assert!(!is_valid_key(&normalize_key("1st place")));
    }

    #[test]
    fn test_coerce_value() {
        assert_eq!(coerce_value(&42i8).unwrap(), 42.0);
        assert_eq!(coerce_value(&-7i64).unwrap(), -7.0);
        assert_eq!(coerce_value(&u64::MAX).unwrap(), u64::MAX as f64);
        assert_eq!(coerce_value(&1.5f32).unwrap(), 1.5);
        assert_eq!(coerce_value(&0.25f64).unwrap(), 0.25);
        assert_eq!(coerce_value("3.75").unwrap(), 3.75);
        assert_eq!(coerce_value(" -12 \n").unwrap(), -12.0);
        assert_eq!(coerce_value(&"1e3".to_string()).unwrap(), 1000.0);
        assert_eq!(coerce_value(b"8".as_slice()).unwrap(), 8.0);
        assert_eq!(coerce_value(&b"9.5".to_vec()).unwrap(), 9.5);

        assert_eq!(coerce_value("").unwrap_err(), NexusError::ErrMetricValueInvalid);
        assert_eq!(coerce_value("twelve").unwrap_err(), NexusError::ErrMetricValueInvalid);
        assert_eq!(coerce_value(&[0xffu8, 0xfe][..]).unwrap_err(), NexusError::ErrMetricValueInvalid);
    }

    #[test]
    fn test_metric_modify() {
        let metric = Metric::new("requests", "request count", 1.0);
        let mut observed = 0.0;
        let v = metric
            .modify(
                |v| v + 2.0,
                |v| {
                    observed = v;
                    Ok(())
                },
            )
            .unwrap();
        assert_eq!(v, 3.0);
        assert_eq!(observed, 3.0);
        assert_eq!(metric.get().unwrap(), 3.0);
        assert_eq!(metric.key(), "requests");
        assert_eq!(metric.description(), "request count");
    }
}
