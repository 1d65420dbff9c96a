use actix_web::dev::HttpServiceFactory;
use actix_web::{put, web, HttpResponse, Responder};

use serde::Deserialize;

use crate::service::Notifier;

use super::RestResult;

#[derive(Debug, Deserialize)]
pub struct StockBody {
    stock: i32,
}

/// Replace a product's stock, notifying subscribers when it comes back
#[tracing::instrument(name = "Update product stock", skip(notifier))]
#[put("/{product_id}")]
async fn update_stock(
    notifier: web::Data<Notifier>,
    path: web::Path<(i64,)>,
    body: web::Json<StockBody>,
) -> RestResult<impl Responder> {
    let (product_id,) = path.into_inner();
    let report = notifier.trigger_restock(product_id, body.stock).await?;

    Ok(HttpResponse::Ok().json(report))
}

/// Inventory API endpoints
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/inventory").service(update_stock)
}
