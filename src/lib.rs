//! This crate is the 'library' part of MetricNexus, a lightweight, authenticated metrics registry.
//! MetricNexus keeps a set of named numeric gauges in memory and works in two ways independently:
//!
//! 1. A standalone application (`mnexus server`) serving the gauges via an HTTPS API guarded by
//!    static API keys, with a Prometheus exposition endpoint at `/__metrics`;
//! 2. A Rust crate that provides the registry, the snapshot store and a remote client for other
//!    applications to integrate.
//!
//! The core of the crate is [`registry::MetricRegistry`]. Every mutation funnels through it and is
//! mirrored synchronously into a [`snapshot::Snapshot`], which the server writes to its state file
//! once per save interval and loads again at startup:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use metric_nexus::{registry::MetricRegistry, snapshot::Snapshot};
//!
//! let snapshot = Arc::new(Snapshot::load("/var/lib/mnexus/state.yaml").unwrap());
//! let registry = MetricRegistry::from_snapshot(Arc::clone(&snapshot)).unwrap();
//!
//! registry.create("uptime", "metric server uptime", &0).unwrap();
//! registry.increment("uptime").unwrap();
//! assert_eq!(registry.read("uptime").unwrap(), Some(1.0));
//!
//! snapshot.save("/var/lib/mnexus/state.yaml").unwrap();
//! ```

pub mod api;
pub mod cli;
pub mod errors;
pub mod http;
pub mod metric;
pub mod metrics;
pub mod registry;
pub mod snapshot;
pub mod utils;

#[cfg(test)]
pub mod test_utils;

/// Exit ok
pub const EXIT_CODE_OK: sysexits::ExitCode = sysexits::ExitCode::Ok;
/// Exit code when server exits unexpectedly
pub const EXIT_CODE_SERVER_EXIT_UNEXPECTEDLY: sysexits::ExitCode = sysexits::ExitCode::Software;
/// Exit code when loading configuration from file fails
pub const EXIT_CODE_LOAD_CONFIG_FAILURE: sysexits::ExitCode = sysexits::ExitCode::Config;
/// Exit code when insufficient params are passed via CLI
pub const EXIT_CODE_INSUFFICIENT_PARAMS: sysexits::ExitCode = sysexits::ExitCode::Usage;
/// Exit code when a client command is rejected or cannot reach the server
pub const EXIT_CODE_REQUEST_FAILURE: sysexits::ExitCode = sysexits::ExitCode::Unavailable;

/// metric_nexus version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
