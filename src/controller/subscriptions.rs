use actix_web::dev::HttpServiceFactory;
use actix_web::{delete, get, post, web, HttpResponse, Responder};

use serde::Deserialize;

use crate::crypto::{SigningKey, UnsubscribeToken};
use crate::service::Notifier;

use super::RestResult;

/// JSON body for new subscriptions
#[derive(Debug, Deserialize)]
pub struct NewSubscriptionBody {
    user_id: i64,
    product_id: i64,
}

/// Subscribe a user to restock notifications for a product
#[tracing::instrument(name = "Create a new subscription", skip(notifier))]
#[post("")]
async fn create(
    notifier: web::Data<Notifier>,
    body: web::Json<NewSubscriptionBody>,
) -> RestResult<impl Responder> {
    let subscription = notifier.subscribe(body.user_id, body.product_id).await?;

    Ok(HttpResponse::Created().json(subscription))
}

/// Remove a subscription by id
#[tracing::instrument(name = "Remove a subscription", skip(notifier))]
#[delete("/{subscription_id}")]
async fn remove(
    notifier: web::Data<Notifier>,
    path: web::Path<(i64,)>,
) -> RestResult<impl Responder> {
    let (subscription_id,) = path.into_inner();
    let removed = notifier.unsubscribe(subscription_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "removed": removed })))
}

/// Unsubscribe through the signed link sent in restock e-mails
#[tracing::instrument(name = "Unsubscribe by token", skip(notifier, signing_key, path))]
#[get("/unsubscribe/{token_str}")]
async fn unsubscribe(
    notifier: web::Data<Notifier>,
    signing_key: web::Data<SigningKey>,
    path: web::Path<(String,)>,
) -> RestResult<impl Responder> {
    let (token_str,) = path.into_inner();
    // Parse, verify, and extract the subscription id from the token
    let token = UnsubscribeToken::verify(signing_key.get_ref(), &token_str)?;

    let removed = notifier.unsubscribe(token.subscription_id()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "removed": removed })))
}

/// Subscriptions of a user, newest first
#[tracing::instrument(name = "List subscriptions of a user", skip(notifier))]
#[get("/user/{user_id}")]
async fn by_user(
    notifier: web::Data<Notifier>,
    path: web::Path<(i64,)>,
) -> RestResult<impl Responder> {
    let (user_id,) = path.into_inner();
    let subscriptions = notifier.user_subscriptions(user_id).await?;

    Ok(HttpResponse::Ok().json(subscriptions))
}

/// Subscribers of a product, newest first
#[tracing::instrument(name = "List subscribers of a product", skip(notifier))]
#[get("/product/{product_id}")]
async fn by_product(
    notifier: web::Data<Notifier>,
    path: web::Path<(i64,)>,
) -> RestResult<impl Responder> {
    let (product_id,) = path.into_inner();
    let subscriptions = notifier.product_subscribers(product_id).await?;

    Ok(HttpResponse::Ok().json(subscriptions))
}

/// Whether a user is subscribed to a product
#[tracing::instrument(name = "Check a subscription", skip(notifier))]
#[get("/user/{user_id}/product/{product_id}")]
async fn check(
    notifier: web::Data<Notifier>,
    path: web::Path<(i64, i64)>,
) -> RestResult<impl Responder> {
    let (user_id, product_id) = path.into_inner();
    let subscribed = notifier.is_subscribed(user_id, product_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "subscribed": subscribed })))
}

/// Subscriptions API endpoints
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/subscriptions")
        .service(create)
        .service(unsubscribe)
        .service(check)
        .service(by_user)
        .service(by_product)
        .service(remove)
}
