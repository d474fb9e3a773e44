//! Safe retries of non-idempotent requests.
//!
//! A client that may retry an unsafe request (PUT `/{metric}/inc`, e.g.) sends an
//! `X-Idempotency-Key` header. The first response for a given key, method, path and body is cached
//! and replayed for every retry within the cache lifetime, so the mutation is applied once. Reusing
//! a key with a different body is a different request.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use actix_web::{
    body::{self, BoxBody, MessageBody},
    dev::{Payload, ServiceRequest, ServiceResponse},
    error::ErrorInternalServerError,
    http::{
        header::{HeaderValue, CONTENT_TYPE},
        Method, StatusCode,
    },
    middleware::Next,
    web::{Bytes, Data},
    Error, HttpResponse,
};

use openssl::sha::sha256;

use crate::{errors::NexusError, utils::locks::Locks};

pub const IDEMPOTENCY_KEY_HEADER: &str = "X-Idempotency-Key";
pub const IDEMPOTENCY_LIFETIME_DEFAULT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
    created: Instant,
}

impl CachedResponse {
    pub fn to_response(&self) -> HttpResponse {
        let mut resp = HttpResponse::build(self.status);
        if let Some(content_type) = &self.content_type {
            resp.insert_header((CONTENT_TYPE, content_type.clone()));
        }
        resp.body(self.body.clone())
    }
}

#[derive(Debug)]
pub struct IdempotencyStore {
    lifetime: Duration,
    responses: Mutex<HashMap<String, CachedResponse>>,
    locks: Locks,
}

impl Default for IdempotencyStore {
    fn default() -> Self {
        Self::new(IDEMPOTENCY_LIFETIME_DEFAULT)
    }
}

impl IdempotencyStore {
    pub fn new(lifetime: Duration) -> Self {
        Self { lifetime, responses: Mutex::new(HashMap::new()), locks: Locks::new() }
    }

    pub fn get(&self, fingerprint: &str) -> Result<Option<CachedResponse>, NexusError> {
        let mut responses = self.responses.lock()?;
        let lifetime = self.lifetime;
        responses.retain(|_, cached| cached.created.elapsed() < lifetime);
        Ok(responses.get(fingerprint).cloned())
    }

    pub fn insert(
        &self,
        fingerprint: String,
        status: StatusCode,
        content_type: Option<HeaderValue>,
        body: Bytes,
    ) -> Result<CachedResponse, NexusError> {
        let cached = CachedResponse { status, content_type, body, created: Instant::now() };
        self.responses.lock()?.insert(fingerprint, cached.clone());
        Ok(cached)
    }
}

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE)
}

fn fingerprint(idempotency_key: &str, method: &Method, path: &str, body: &[u8]) -> String {
    let digest: String = sha256(body).iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}\n{}\n{}\n{}", idempotency_key, method, path, digest)
}

pub async fn idempotency_middleware(
    mut req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let store = req.app_data::<Data<IdempotencyStore>>().cloned();
    let idempotency_key = req
        .headers()
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let (store, idempotency_key) = match (store, idempotency_key) {
        (Some(store), Some(key)) if !is_safe_method(req.method()) => (store, key),
        _ => return Ok(next.call(req).await?.map_into_boxed_body()),
    };

    // the body is buffered for the digest and handed back to the handler untouched
    let payload = req.extract::<Bytes>().await?;
    let fingerprint = fingerprint(&idempotency_key, req.method(), req.path(), &payload);
    req.set_payload(Payload::from(payload));

    let entry = store.locks.get_lock(&fingerprint);
    let _locked = entry.lock.lock().await;

    if let Some(cached) = store.get(&fingerprint)? {
        log::debug!("replaying cached response for idempotency key {}", idempotency_key);
        return Ok(req.into_response(cached.to_response()));
    }

    let (req, resp) = next.call(req).await?.into_parts();
    let status = resp.status();
    let content_type = resp.headers().get(CONTENT_TYPE).cloned();
    let body = body::to_bytes(resp.into_body()).await.map_err(|e| {
        let e: Box<dyn std::error::Error> = e.into();
        ErrorInternalServerError(e.to_string())
    })?;

    // server errors are not cached so the client can retry them
    let resp = if status.is_server_error() {
        let mut resp = HttpResponse::build(status);
        if let Some(content_type) = content_type {
            resp.insert_header((CONTENT_TYPE, content_type));
        }
        resp.body(body)
    } else {
        store.insert(fingerprint, status, content_type, body)?.to_response()
    };

    Ok(ServiceResponse::new(req, resp))
}
