//! Supporting pieces that are not specific to gauges: TLS credential handling and keyed locks.

pub mod cert;
pub mod locks;
