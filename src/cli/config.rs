//! This module defines and handles the config file options for the metric nexus server, such as
//! the address to listen on, the TLS material, the state file and the accepted API keys.

use std::{collections::HashMap, fmt, fs, path::Path};

use openssl::ssl::SslVersion;
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::errors::NexusError;

/// A struct that contains the configurable options of the metric nexus server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(deserialize_with = "validate_listener")]
    pub listener: HashMap<String, Listener>,
    #[serde(default)]
    pub state_file: String,
    #[serde(default)]
    pub api_keys: Vec<String>,
    #[serde(default)]
    pub log_level: String,
    #[serde(default = "default_save_interval")]
    pub save_interval: u64,
    #[serde(default = "default_cert_common_name")]
    pub cert_common_name: String,
    #[serde(default = "default_cert_organization")]
    pub cert_organization: String,
}

/// A struct that contains the configurable options for networking stuffs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listener {
    #[serde(default)]
    pub ltype: String,
    pub address: String,
    #[serde(default)]
    pub tls_cert_file: String,
    #[serde(default)]
    pub tls_key_file: String,
    #[serde(
        default = "default_tls_min_version",
        serialize_with = "serialize_tls_version",
        deserialize_with = "deserialize_tls_version"
    )]
    pub tls_min_version: SslVersion,
    #[serde(
        default = "default_tls_max_version",
        serialize_with = "serialize_tls_version",
        deserialize_with = "deserialize_tls_version"
    )]
    pub tls_max_version: SslVersion,
    #[serde(default = "default_tls_cipher_suites")]
    pub tls_cipher_suites: String,
}

pub const SAVE_INTERVAL_DEFAULT: u64 = 60;
pub const LOG_LEVEL_DEFAULT: &str = "info";

fn default_save_interval() -> u64 {
    SAVE_INTERVAL_DEFAULT
}

fn default_cert_common_name() -> String {
    "local.nexus".to_string()
}

fn default_cert_organization() -> String {
    "metric-nexus".to_string()
}

fn default_tls_min_version() -> SslVersion {
    SslVersion::TLS1_2
}

fn default_tls_max_version() -> SslVersion {
    SslVersion::TLS1_3
}

fn default_tls_cipher_suites() -> String {
    "HIGH:!PSK:!SRP:!3DES".to_string()
}

fn serialize_tls_version<S>(version: &SslVersion, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match *version {
        SslVersion::TLS1_2 => serializer.serialize_str("tls12"),
        SslVersion::TLS1_3 => serializer.serialize_str("tls13"),
        _ => Err(serde::ser::Error::custom(format!("unexpected TLS version: {:?}", version))),
    }
}

fn deserialize_tls_version<'de, D>(deserializer: D) -> Result<SslVersion, D::Error>
where
    D: Deserializer<'de>,
{
    struct TlsVersionVisitor;

    impl Visitor<'_> for TlsVersionVisitor {
        type Value = SslVersion;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("\"tls12\" or \"tls13\"")
        }

        fn visit_str<E>(self, value: &str) -> Result<SslVersion, E>
        where
            E: de::Error,
        {
            match value {
                "tls12" => Ok(SslVersion::TLS1_2),
                "tls13" => Ok(SslVersion::TLS1_3),
                _ => Err(E::custom(format!("unsupported TLS version: {}", value))),
            }
        }
    }

    deserializer.deserialize_str(TlsVersionVisitor)
}

fn validate_listener<'de, D>(deserializer: D) -> Result<HashMap<String, Listener>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let listeners: HashMap<String, Listener> = Deserialize::deserialize(deserializer)?;

    for (key, listener) in &listeners {
        if key != "tcp" {
            return Err(serde::de::Error::custom("Invalid listener key"));
        }

        if listener.tls_cert_file.is_empty() != listener.tls_key_file.is_empty() {
            return Err(serde::de::Error::custom("tls_cert_file and tls_key_file must be configured together"));
        }
    }

    Ok(listeners)
}

impl Config {
    pub fn merge(&mut self, other: Config) {
        self.listener.extend(other.listener);

        if !other.state_file.is_empty() {
            self.state_file = other.state_file;
        }

        for key in other.api_keys {
            if !self.api_keys.contains(&key) {
                self.api_keys.push(key);
            }
        }

        if !other.log_level.is_empty() {
            self.log_level = other.log_level;
        }

        if other.save_interval != SAVE_INTERVAL_DEFAULT {
            self.save_interval = other.save_interval;
        }

        if other.cert_common_name != default_cert_common_name() {
            self.cert_common_name = other.cert_common_name;
        }

        if other.cert_organization != default_cert_organization() {
            self.cert_organization = other.cert_organization;
        }
    }

    pub fn listener(&self) -> Result<&Listener, NexusError> {
        self.listener.get("tcp").ok_or(NexusError::ErrConfigListenerNotFound)
    }

    pub fn log_level(&self) -> &str {
        if self.log_level.is_empty() {
            LOG_LEVEL_DEFAULT
        } else {
            self.log_level.as_str()
        }
    }
}

pub fn load_config(path: &str) -> Result<Config, NexusError> {
    let f = Path::new(path);
    let mut config = if f.is_dir() {
        load_config_dir(path)?
    } else if f.is_file() {
        load_config_file(path)?
    } else {
        return Err(NexusError::ErrConfigPathInvalid);
    };

    if config.state_file.is_empty() {
        config.state_file = default_state_file(f);
        log::debug!("state_file not set, using {}", config.state_file);
    }

    check_config(&config)?;
    Ok(config)
}

/// `<config path without its config extension>.state.yaml`, next to the config itself.
fn default_state_file(path: &Path) -> String {
    let stem = if is_config_file(path) { path.with_extension("") } else { path.to_path_buf() };
    format!("{}.state.yaml", stem.to_string_lossy().trim_end_matches('/'))
}

fn is_config_file(path: &Path) -> bool {
    matches!(path.extension().and_then(|ext| ext.to_str()), Some("hcl" | "json" | "yaml" | "yml"))
}

fn load_config_dir(dir: &str) -> Result<Config, NexusError> {
    log::debug!("load_config_dir: {}", dir);
    let mut paths: Vec<String> = Vec::new();

    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if path.is_file() && is_config_file(&path) {
            paths.push(path.to_string_lossy().into_owned());
        }
    }

    paths.sort();

    let mut result: Option<Config> = None;

    for path in paths {
        log::debug!("load_config_dir path: {}", path);
        let config = load_config_file(&path)?;
        match result.as_mut() {
            Some(merged) => merged.merge(config),
            None => result = Some(config),
        }
    }

    result.ok_or(NexusError::ErrConfigLoadFailed)
}

fn load_config_file(path: &str) -> Result<Config, NexusError> {
    log::debug!("load_config_file: {}", path);
    let file = fs::File::open(path)?;

    let mut config: Config = if path.ends_with(".hcl") {
        hcl::from_reader(file)?
    } else if path.ends_with(".json") {
        serde_json::from_reader(file)?
    } else if path.ends_with(".yaml") || path.ends_with(".yml") {
        serde_yaml::from_reader(file)?
    } else {
        return Err(NexusError::ErrConfigPathInvalid);
    };

    set_config_type_field(&mut config);
    Ok(config)
}

fn set_config_type_field(config: &mut Config) {
    config.listener.iter_mut().for_each(|(key, value)| value.ltype = key.clone());
}

fn check_config(config: &Config) -> Result<(), NexusError> {
    if config.listener.len() != 1 {
        return Err(NexusError::ErrConfigListenerNotFound);
    }

    Ok(())
}
