//! This module handles everything related to MetricNexus's HTTP(S) surface: routing of the metric
//! API, API key authorization, idempotent retries, the Prometheus exposition endpoint and the
//! translation of errors into responses. It utilizes the `actix_web` crate as the underlying
//! provider.

use std::sync::Arc;

use actix_web::{
    http::{header::ContentType, StatusCode},
    web, HttpResponse, ResponseError,
};
use serde_json::json;

use crate::{errors::NexusError, metrics::manager::MetricsManager, registry::MetricRegistry};

pub mod auth;
pub mod gauge;
pub mod idempotency;
pub mod metrics;

pub const METRICS_PATH: &str = "/__metrics";

/// Everything the request handlers and middlewares read from the application data. One instance is
/// shared by every worker.
#[derive(Clone)]
pub struct HttpState {
    pub registry: Arc<MetricRegistry>,
    pub metrics_manager: Arc<MetricsManager>,
    pub api_keys: web::Data<auth::ApiKeys>,
    pub idempotency: web::Data<idempotency::IdempotencyStore>,
}

impl HttpState {
    pub fn new(registry: Arc<MetricRegistry>, api_keys: auth::ApiKeys) -> Self {
        let metrics_manager = Arc::new(MetricsManager::new(Arc::clone(&registry)));
        HttpState {
            registry,
            metrics_manager,
            api_keys: web::Data::new(api_keys),
            idempotency: web::Data::new(idempotency::IdempotencyStore::default()),
        }
    }

    /// Installs the shared state and every route. The middlewares still have to be wrapped around
    /// the `App`, the API key gate outermost.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(Arc::clone(&self.registry)))
            .app_data(web::Data::new(Arc::clone(&self.metrics_manager)))
            .app_data(self.api_keys.clone())
            .app_data(self.idempotency.clone());
        init_service(cfg);
    }
}

/// Registers every route. The exposition resource comes first so that it wins over the
/// `/{metric}` pattern.
pub fn init_service(cfg: &mut web::ServiceConfig) {
    metrics::init_metrics_service(cfg);
    gauge::init_gauge_service(cfg);
}

impl ResponseError for NexusError {
    fn status_code(&self) -> StatusCode {
        match self {
            NexusError::ErrApiKeyMissing => StatusCode::UNAUTHORIZED,
            NexusError::ErrApiKeyInvalid => StatusCode::FORBIDDEN,
            NexusError::ErrMetricKeyInvalid | NexusError::ErrMetricValueInvalid => StatusCode::BAD_REQUEST,
            NexusError::ErrMetricNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // builds the actual response to send back when an error occurs
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let text = match self {
            NexusError::ErrApiKeyMissing => "missing API key".to_string(),
            NexusError::ErrApiKeyInvalid => "invalid API key".to_string(),
            _ => self.to_string(),
        };
        if status.is_server_error() {
            log::error!("request failed: {}", self);
        }
        HttpResponse::build(status).json(json!({ "error": text }))
    }
}

pub fn response_status(status: StatusCode) -> HttpResponse {
    HttpResponse::build(status).finish()
}

pub fn response_text(status: StatusCode, body: String) -> HttpResponse {
    HttpResponse::build(status).content_type(ContentType::plaintext()).body(body)
}
