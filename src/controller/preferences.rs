use actix_web::dev::HttpServiceFactory;
use actix_web::{get, put, web, HttpResponse, Responder};

use crate::model::PreferenceFlags;
use crate::service::PreferenceStore;

use super::RestResult;

#[tracing::instrument(name = "Get notification preferences", skip(preferences))]
#[get("/{user_id}")]
async fn show(
    preferences: web::Data<PreferenceStore>,
    path: web::Path<(i64,)>,
) -> RestResult<impl Responder> {
    let (user_id,) = path.into_inner();
    let preference = preferences.get(user_id).await?;

    Ok(HttpResponse::Ok().json(preference))
}

/// Replace all four channel toggles of a user
#[tracing::instrument(name = "Update notification preferences", skip(preferences))]
#[put("/{user_id}")]
async fn update(
    preferences: web::Data<PreferenceStore>,
    path: web::Path<(i64,)>,
    body: web::Json<PreferenceFlags>,
) -> RestResult<impl Responder> {
    let (user_id,) = path.into_inner();
    let preference = preferences.update(user_id, body.into_inner()).await?;

    Ok(HttpResponse::Ok().json(preference))
}

/// Preferences API endpoints
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/preferences").service(show).service(update)
}
