use std::{collections::HashMap, fs, io::BufReader, path::Path, sync::Arc, time::Duration};

use better_default::Default;
use rustls::{ClientConfig, RootCertStore, ALL_VERSIONS};
use ureq::AgentBuilder;
use webpki_roots::TLS_SERVER_ROOTS;

use super::HttpResponse;
use crate::{
    errors::NexusError,
    http::{auth::API_KEY_HEADER, idempotency::IDEMPOTENCY_KEY_HEADER},
    metric::normalize_key,
    utils::cert::DisabledVerifier,
};

#[derive(Clone)]
pub struct TLSConfig {
    client_config: ClientConfig,
}

#[derive(Default)]
pub struct TLSConfigBuilder {
    pub server_ca_pem: Option<Vec<u8>>,
    pub insecure: bool,
}

#[derive(Default)]
pub struct Client {
    #[default("https://127.0.0.1:8443".into())]
    pub address: String,
    pub api_key: String,
    #[default(HashMap::new())]
    pub headers: HashMap<String, String>,
    pub tls_config: Option<TLSConfig>,
    #[default(ureq::Agent::new())]
    pub http_client: ureq::Agent,
}

impl TLSConfigBuilder {
    pub fn new() -> Self {
        TLSConfigBuilder::default()
    }

    pub fn with_server_ca_path<P: AsRef<Path>>(mut self, server_ca_path: P) -> Result<Self, NexusError> {
        let cert_data = fs::read(server_ca_path)?;
        self.server_ca_pem = Some(cert_data);
        Ok(self)
    }

    pub fn with_server_ca_pem(mut self, server_ca_pem: &str) -> Self {
        self.server_ca_pem = Some(server_ca_pem.as_bytes().to_vec());
        self
    }

    /// Accepts any server certificate, the self-signed one the server provisions included.
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;

        self
    }

    pub fn build(self) -> Result<TLSConfig, NexusError> {
        let provider = rustls::crypto::CryptoProvider::get_default()
            .cloned()
            .unwrap_or(Arc::new(rustls::crypto::ring::default_provider()));

        let builder = ClientConfig::builder_with_provider(provider).with_protocol_versions(ALL_VERSIONS)?;

        let builder = if self.insecure {
            log::debug!("Certificate verification disabled");
            builder.dangerous().with_custom_certificate_verifier(Arc::new(DisabledVerifier))
        } else if let Some(server_ca) = &self.server_ca_pem {
            let mut cert_reader = BufReader::new(&server_ca[..]);
            let root_certs = rustls_pemfile::certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;

            let mut root_store = RootCertStore::empty();
            let (added, ignored) = root_store.add_parsable_certificates(root_certs);
            log::debug!("Added {} and ignored {} root certs", added, ignored);
            builder.with_root_certificates(root_store)
        } else {
            let root_store = RootCertStore { roots: TLS_SERVER_ROOTS.to_vec() };
            builder.with_root_certificates(root_store)
        };

        Ok(TLSConfig { client_config: builder.with_no_client_auth() })
    }
}

impl Client {
    pub fn new() -> Self {
        Client::default()
    }

    pub fn with_addr(mut self, addr: &str) -> Self {
        self.address = addr.trim_end_matches('/').into();
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_tls_config(mut self, tls_config: TLSConfig) -> Self {
        self.tls_config = Some(tls_config);
        self
    }

    pub fn add_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Makes retried mutations safe: the server applies a request carrying the same key, method and
    /// path only once.
    pub fn with_idempotency_key(self, key: &str) -> Self {
        self.add_header(IDEMPOTENCY_KEY_HEADER, key)
    }

    pub fn build(mut self) -> Self {
        let mut agent = AgentBuilder::new().timeout_connect(Duration::from_secs(10)).timeout(Duration::from_secs(30));

        if let Some(tls_config) = &self.tls_config {
            agent = agent.tls_config(Arc::new(tls_config.client_config.clone()));
        }

        self.http_client = agent.build();
        self
    }

    pub fn request(&self, method: &str, path: &str, body: Option<&str>) -> Result<HttpResponse, NexusError> {
        let url = if path.starts_with('/') {
            format!("{}{}", self.address, path)
        } else {
            format!("{}/{}", self.address, path)
        };
        log::debug!("request url: {}, method: {}", url, method);

        let mut req = self.http_client.request(&method.to_uppercase(), &url);

        for (key, value) in &self.headers {
            req = req.set(key, value);
        }
        if !self.api_key.is_empty() {
            req = req.set(API_KEY_HEADER, &self.api_key);
        }

        let mut ret = HttpResponse { method: method.to_string(), url, ..Default::default() };

        let response_result = match body {
            Some(body) => req.set("Content-Type", "text/plain").send_string(body),
            None => req.call(),
        };

        match response_result {
            Ok(response) => {
                ret.response_status = response.status();
                ret.response_data = response.into_string()?;
                Ok(ret)
            }
            Err(ureq::Error::Status(status, response)) => {
                ret.response_status = status;
                if let Ok(response_data) = response.into_string() {
                    ret.response_data = response_data;
                }
                Ok(ret)
            }
            Err(e) => {
                log::error!("Request failed: {}", e);
                Err(NexusError::UreqError { source: e })
            }
        }
    }

    /// Creates a gauge starting at zero. Returns `false` when it already existed.
    pub fn create(&self, key: &str, description: &str) -> Result<bool, NexusError> {
        let ret = self.request("POST", &metric_path(key, "")?, Some(description))?;
        match ret.response_status {
            201 => Ok(true),
            200 => Ok(false),
            _ => Err(response_error(ret)),
        }
    }

    pub fn read(&self, key: &str) -> Result<Option<f64>, NexusError> {
        let ret = self.request("GET", &metric_path(key, "")?, None)?;
        match ret.response_status {
            200 => {
                let value = ret.response_data.trim().parse::<f64>().map_err(|_| NexusError::ErrMetricValueInvalid)?;
                Ok(Some(value))
            }
            404 => Ok(None),
            _ => Err(response_error(ret)),
        }
    }

    /// Overwrites the value of an existing gauge. Returns `false` when the gauge does not exist.
    pub fn update(&self, key: &str, value: f64) -> Result<bool, NexusError> {
        let ret = self.request("PUT", &metric_path(key, "")?, Some(&value.to_string()))?;
        match ret.response_status {
            204 => Ok(true),
            404 => Ok(false),
            _ => Err(response_error(ret)),
        }
    }

    /// Creates the gauge when absent, then sets its value.
    pub fn create_update(&self, key: &str, description: &str, value: f64) -> Result<(), NexusError> {
        self.create(key, description)?;
        if self.update(key, value)? {
            return Ok(());
        }
        // deleted between the two requests
        Err(NexusError::ErrMetricNotFound)
    }

    pub fn add(&self, key: &str, delta: f64) -> Result<bool, NexusError> {
        self.adjust(key, "add", Some(&delta.to_string()))
    }

    pub fn subtract(&self, key: &str, delta: f64) -> Result<bool, NexusError> {
        self.adjust(key, "sub", Some(&delta.to_string()))
    }

    pub fn increment(&self, key: &str) -> Result<bool, NexusError> {
        self.adjust(key, "inc", None)
    }

    pub fn decrement(&self, key: &str) -> Result<bool, NexusError> {
        self.adjust(key, "dec", None)
    }

    /// Returns `false` when the gauge does not exist.
    pub fn delete(&self, key: &str) -> Result<bool, NexusError> {
        let ret = self.request("DELETE", &metric_path(key, "")?, None)?;
        match ret.response_status {
            204 => Ok(true),
            404 => Ok(false),
            _ => Err(response_error(ret)),
        }
    }

    // the arithmetic routes answer 200 rather than 404 for an unknown gauge
    fn adjust(&self, key: &str, op: &str, body: Option<&str>) -> Result<bool, NexusError> {
        let ret = self.request("PUT", &metric_path(key, op)?, Some(body.unwrap_or("")))?;
        match ret.response_status {
            204 => Ok(true),
            200 => Ok(false),
            _ => Err(response_error(ret)),
        }
    }
}

fn metric_path(key: &str, op: &str) -> Result<String, NexusError> {
    let key = normalize_key(key);
    if key.is_empty() {
        return Err(NexusError::ErrMetricKeyInvalid);
    }

    if op.is_empty() {
        Ok(format!("/{}", key))
    } else {
        Ok(format!("/{}/{}", key, op))
    }
}

fn response_error(ret: HttpResponse) -> NexusError {
    match ret.response_status {
        401 => NexusError::ErrApiKeyMissing,
        403 => NexusError::ErrApiKeyInvalid,
        status => NexusError::ErrResponseStatus(status, ret.response_data),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_metric_path() {
        assert_eq!(metric_path("Queue Depth", "").unwrap(), "/queue_depth");
        assert_eq!(metric_path("uptime", "inc").unwrap(), "/uptime/inc");
        assert_eq!(metric_path("a/b?c", "add").unwrap(), "/abc/add");
        assert_eq!(metric_path("!!", "").unwrap_err(), NexusError::ErrMetricKeyInvalid);
    }

    #[test]
    fn test_response_error() {
        let ret = HttpResponse { response_status: 401, ..Default::default() };
        assert_eq!(response_error(ret), NexusError::ErrApiKeyMissing);
        let ret = HttpResponse { response_status: 403, ..Default::default() };
        assert_eq!(response_error(ret), NexusError::ErrApiKeyInvalid);
        let ret = HttpResponse { response_status: 400, response_data: "{}".into(), ..Default::default() };
        assert_eq!(response_error(ret), NexusError::ErrResponseStatus(400, String::new()));
    }

    #[test]
    fn test_client_builder() {
        let client = Client::new().with_addr("https://127.0.0.1:9443/").with_api_key("Hello World");
        assert_eq!(client.address, "https://127.0.0.1:9443");
        assert_eq!(client.api_key, "Hello World");

        let tls_config = TLSConfigBuilder::new().with_insecure(true).build();
        assert!(tls_config.is_ok());
        let client = client.with_tls_config(tls_config.unwrap()).with_idempotency_key("retry-1").build();
        assert_eq!(client.headers.get(IDEMPOTENCY_KEY_HEADER).map(String::as_str), Some("retry-1"));
    }
}
