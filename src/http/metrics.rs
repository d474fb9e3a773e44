use std::sync::Arc;

use actix_web::{web, HttpResponse};

use super::METRICS_PATH;
use crate::{errors::NexusError, metrics::manager::MetricsManager};

pub async fn metrics_handler(metrics_manager: web::Data<Arc<MetricsManager>>) -> Result<HttpResponse, NexusError> {
    let buffer = metrics_manager.encode()?;

    Ok(HttpResponse::Ok().content_type("text/plain; version=0.0.4").body(buffer))
}

pub fn init_metrics_service(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource(METRICS_PATH).route(web::get().to(metrics_handler)));
}
