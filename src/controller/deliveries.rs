use actix_web::dev::HttpServiceFactory;
use actix_web::{get, post, web, HttpResponse, Responder};

use serde::Deserialize;

use crate::auth::Operator;
use crate::model::DeliveryStatus;
use crate::service::{Notifier, RetryCoordinator};

use super::RestResult;

#[derive(Debug, Deserialize)]
pub struct DeliveryLogQuery {
    status: Option<DeliveryStatus>,
}

/// Delivery log of a user, newest first, optionally filtered by status
#[tracing::instrument(name = "List delivery logs of a user", skip(notifier))]
#[get("/user/{user_id}")]
async fn by_user(
    notifier: web::Data<Notifier>,
    path: web::Path<(i64,)>,
    query: web::Query<DeliveryLogQuery>,
) -> RestResult<impl Responder> {
    let (user_id,) = path.into_inner();
    let logs = notifier.delivery_logs(user_id, query.status).await?;

    Ok(HttpResponse::Ok().json(logs))
}

/// Failed deliveries that can still be retried
#[tracing::instrument(name = "List retryable deliveries", skip(retries, _operator))]
#[get("/retryable")]
async fn retryable(
    retries: web::Data<RetryCoordinator>,
    _operator: Operator,
) -> RestResult<impl Responder> {
    let entries = retries.list_retryable().await?;

    Ok(HttpResponse::Ok().json(entries))
}

/// Retry one failed delivery
#[tracing::instrument(name = "Retry a delivery", skip(retries, _operator))]
#[post("/{log_id}/retry")]
async fn retry(
    retries: web::Data<RetryCoordinator>,
    _operator: Operator,
    path: web::Path<(i64,)>,
) -> RestResult<impl Responder> {
    let (log_id,) = path.into_inner();
    let retried = retries.retry(log_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "retried": retried })))
}

/// Retry every retryable delivery once
#[tracing::instrument(name = "Retry all deliveries", skip(retries, _operator))]
#[post("/retry")]
async fn retry_all(
    retries: web::Data<RetryCoordinator>,
    _operator: Operator,
) -> RestResult<impl Responder> {
    let sweep = retries.retry_all().await?;

    Ok(HttpResponse::Ok().json(sweep))
}

/// Delivery log API endpoints
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/deliveries")
        .service(by_user)
        .service(retryable)
        .service(retry_all)
        .service(retry)
}
