use std::io;
use std::sync::{MutexGuard, PoisonError, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NexusError {
    #[error("Config path is invalid.")]
    ErrConfigPathInvalid,
    #[error("Config load failed.")]
    ErrConfigLoadFailed,
    #[error("Config listener not found, exactly one tcp listener is required.")]
    ErrConfigListenerNotFound,
    #[error("State file does not exist and could not be created.")]
    ErrStateFileCreateFailed,
    #[error("Metric key is invalid.")]
    ErrMetricKeyInvalid,
    #[error("Metric value is invalid.")]
    ErrMetricValueInvalid,
    #[error("Metric not found.")]
    ErrMetricNotFound,
    #[error("Missing API key.")]
    ErrApiKeyMissing,
    #[error("Invalid API key.")]
    ErrApiKeyInvalid,
    #[error("{0} file already exists but {1} file is missing.")]
    ErrCertPairInconsistent(String, String),
    #[error("Certificate validity period is invalid.")]
    ErrCertValidityInvalid,
    #[error("Response status: {0}, {1}")]
    ErrResponseStatus(u16, String),
    #[error("Some IO error happened, {:?}", .source)]
    IO {
        #[from]
        source: io::Error,
    },
    #[error("Some serde error happened, {:?}", .source)]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("Some serde_yaml error happened, {:?}", .source)]
    SerdeYaml {
        #[from]
        source: serde_yaml::Error,
    },
    #[error("Some hcl error happened, {:?}", .source)]
    Hcl {
        #[from]
        source: hcl::Error,
    },
    #[error("Some openssl error happened, {:?}", .source)]
    OpenSSL {
        #[from]
        source: openssl::error::ErrorStack,
    },
    #[error("Some ureq error happened, {:?}", .source)]
    UreqError {
        #[from]
        source: ureq::Error,
    },
    #[error("Some rustls error happened, {:?}", .source)]
    RustlsError {
        #[from]
        source: rustls::Error,
    },
    #[error("RwLock was poisoned (reading)")]
    ErrRwLockReadPoison,
    #[error("RwLock was poisoned (writing)")]
    ErrRwLockWritePoison,
    #[error("Mutex was poisoned")]
    ErrMutexPoison,
    #[error(transparent)]
    ErrOther(#[from] anyhow::Error),
}

impl PartialEq for NexusError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NexusError::ErrConfigPathInvalid, NexusError::ErrConfigPathInvalid)
            | (NexusError::ErrConfigLoadFailed, NexusError::ErrConfigLoadFailed)
            | (NexusError::ErrConfigListenerNotFound, NexusError::ErrConfigListenerNotFound)
            | (NexusError::ErrStateFileCreateFailed, NexusError::ErrStateFileCreateFailed)
            | (NexusError::ErrMetricKeyInvalid, NexusError::ErrMetricKeyInvalid)
            | (NexusError::ErrMetricValueInvalid, NexusError::ErrMetricValueInvalid)
            | (NexusError::ErrMetricNotFound, NexusError::ErrMetricNotFound)
            | (NexusError::ErrApiKeyMissing, NexusError::ErrApiKeyMissing)
            | (NexusError::ErrApiKeyInvalid, NexusError::ErrApiKeyInvalid)
            | (NexusError::ErrCertValidityInvalid, NexusError::ErrCertValidityInvalid)
            | (NexusError::ErrRwLockReadPoison, NexusError::ErrRwLockReadPoison)
            | (NexusError::ErrRwLockWritePoison, NexusError::ErrRwLockWritePoison)
            | (NexusError::ErrMutexPoison, NexusError::ErrMutexPoison) => true,
            (NexusError::ErrCertPairInconsistent(a1, b1), NexusError::ErrCertPairInconsistent(a2, b2)) => {
                a1 == a2 && b1 == b2
            }
            (NexusError::ErrResponseStatus(s1, _), NexusError::ErrResponseStatus(s2, _)) => s1 == s2,
            _ => false,
        }
    }
}

impl<T> From<PoisonError<RwLockWriteGuard<'_, T>>> for NexusError {
    fn from(_: PoisonError<RwLockWriteGuard<'_, T>>) -> Self {
        NexusError::ErrRwLockWritePoison
    }
}

impl<T> From<PoisonError<RwLockReadGuard<'_, T>>> for NexusError {
    fn from(_: PoisonError<RwLockReadGuard<'_, T>>) -> Self {
        NexusError::ErrRwLockReadPoison
    }
}

impl<T> From<PoisonError<MutexGuard<'_, T>>> for NexusError {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        NexusError::ErrMutexPoison
    }
}
