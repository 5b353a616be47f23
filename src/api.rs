use actix_web::{http::header::ContentType, web, HttpResponse, Responder};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::metrics;
use crate::model::Order;
use crate::service::{CaptureError, OrderCaptureService};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResponse {
    pub order_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

pub async fn capture_order(
    service: web::Data<Arc<OrderCaptureService>>,
    body: web::Json<Value>,
) -> impl Responder {
    let Value::Object(fields) = body.into_inner() else {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "order payload must be a JSON object".to_string(),
            stage: None,
            order_id: None,
        });
    };

    match service.capture(Order::from_payload(fields)).await {
        Ok(order_id) => HttpResponse::Created().json(CaptureResponse { order_id }),
        Err(e) => {
            let body = ErrorResponse {
                error: e.to_string(),
                stage: Some(e.stage().to_string()),
                order_id: e.stored_order_id().map(str::to_string),
            };
            match e {
                CaptureError::StoreFailed(_) => HttpResponse::ServiceUnavailable().json(body),
                CaptureError::AnnounceFailed { .. } => HttpResponse::BadGateway().json(body),
            }
        }
    }
}

pub async fn health_check(service: web::Data<Arc<OrderCaptureService>>) -> impl Responder {
    let record = service.health_check().await;
    if record.healthy() {
        HttpResponse::Ok().json(record)
    } else {
        HttpResponse::ServiceUnavailable().json(record)
    }
}

pub async fn get_metrics() -> impl Responder {
    HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body(metrics::render())
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/order").route(web::post().to(capture_order)))
        .service(web::resource("/health").route(web::get().to(health_check)))
        .service(web::resource("/metrics").route(web::get().to(get_metrics)));
}
