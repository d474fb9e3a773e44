//! The metric API. Every handler is a thin translation between a request and one
//! [`MetricRegistry`] operation; the `metric` path segment is passed on unnormalized.

use std::sync::Arc;

use actix_web::{http::StatusCode, web, HttpResponse};

use super::{response_status, response_text};
use crate::{errors::NexusError, registry::MetricRegistry};

async fn create_request_handler(
    path: web::Path<String>,
    body: web::Bytes,
    registry: web::Data<Arc<MetricRegistry>>,
) -> Result<HttpResponse, NexusError> {
    let description = String::from_utf8_lossy(&body);
    if registry.create(&path, &description, &0)? {
        return Ok(response_status(StatusCode::CREATED));
    }
    // the metric already exists
    Ok(response_status(StatusCode::OK))
}

async fn read_request_handler(
    path: web::Path<String>,
    registry: web::Data<Arc<MetricRegistry>>,
) -> Result<HttpResponse, NexusError> {
    match registry.read(&path)? {
        Some(value) => Ok(response_text(StatusCode::OK, value.to_string())),
        None => Ok(response_status(StatusCode::NOT_FOUND)),
    }
}

async fn update_request_handler(
    path: web::Path<String>,
    body: web::Bytes,
    registry: web::Data<Arc<MetricRegistry>>,
) -> Result<HttpResponse, NexusError> {
    if registry.update(&path, &body[..])? {
        return Ok(response_status(StatusCode::NO_CONTENT));
    }
    Ok(response_status(StatusCode::NOT_FOUND))
}

async fn delete_request_handler(
    path: web::Path<String>,
    registry: web::Data<Arc<MetricRegistry>>,
) -> Result<HttpResponse, NexusError> {
    if registry.delete(&path)? {
        return Ok(response_status(StatusCode::NO_CONTENT));
    }
    Ok(response_status(StatusCode::NOT_FOUND))
}

async fn increment_request_handler(
    path: web::Path<String>,
    registry: web::Data<Arc<MetricRegistry>>,
) -> Result<HttpResponse, NexusError> {
    Ok(response_arithmetic(registry.increment(&path)?))
}

async fn decrement_request_handler(
    path: web::Path<String>,
    registry: web::Data<Arc<MetricRegistry>>,
) -> Result<HttpResponse, NexusError> {
    Ok(response_arithmetic(registry.decrement(&path)?))
}

async fn add_request_handler(
    path: web::Path<String>,
    body: web::Bytes,
    registry: web::Data<Arc<MetricRegistry>>,
) -> Result<HttpResponse, NexusError> {
    Ok(response_arithmetic(registry.add(&path, &body[..])?))
}

async fn sub_request_handler(
    path: web::Path<String>,
    body: web::Bytes,
    registry: web::Data<Arc<MetricRegistry>>,
) -> Result<HttpResponse, NexusError> {
    Ok(response_arithmetic(registry.subtract(&path, &body[..])?))
}

/// Arithmetic routes answer 204 when the metric existed and 200 when it did not.
fn response_arithmetic(result: Option<f64>) -> HttpResponse {
    match result {
        Some(_) => response_status(StatusCode::NO_CONTENT),
        None => response_status(StatusCode::OK),
    }
}

pub fn init_gauge_service(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/{metric}")
            .route(web::post().to(create_request_handler))
            .route(web::get().to(read_request_handler))
            .route(web::put().to(update_request_handler))
            .route(web::delete().to(delete_request_handler)),
    )
    .service(web::resource("/{metric}/inc").route(web::put().to(increment_request_handler)))
    .service(web::resource("/{metric}/dec").route(web::put().to(decrement_request_handler)))
    .service(web::resource("/{metric}/add").route(web::put().to(add_request_handler)))
    .service(web::resource("/{metric}/sub").route(web::put().to(sub_request_handler)));
}
