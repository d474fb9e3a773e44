//! The `metric_nexus::metrics` module renders the live gauges in the Prometheus text exposition
//! format with `prometheus_client`.
//!
//! The 'manager' holds the Prometheus registry, the 'collector' bridges it to the metric registry.
pub mod collector;
pub mod manager;
