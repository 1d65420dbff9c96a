use std::net::TcpListener;

use actix_web::dev::Server;
use actix_web::{get, HttpResponse, Responder};
use actix_web::{web, App, HttpServer};

use tracing_actix_web::TracingLogger;

use crate::auth::OperatorCredentials;
use crate::controller::{deliveries, inventory, preferences, subscriptions};
use crate::crypto::SigningKey;
use crate::service::Services;

/// Simple health-check endpoint
#[tracing::instrument(name = "Health check")]
#[get("/health_check")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("I am alive")
}

/// Run the application on a specified TCP listener
pub fn run(
    listener: TcpListener,
    services: Services,
    signing_key: SigningKey,
    operator: OperatorCredentials,
) -> anyhow::Result<Server> {
    // Wrap application data
    let notifier = web::Data::from(services.notifier);
    let retries = web::Data::from(services.retries);
    let preference_store = web::Data::from(services.preferences);
    let signing_key = web::Data::new(signing_key);
    let operator = web::Data::new(operator);

    // Start the server
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(notifier.clone())
            .app_data(retries.clone())
            .app_data(preference_store.clone())
            .app_data(signing_key.clone())
            .app_data(operator.clone())
            .service(health_check)
            .service(subscriptions::scope())
            .service(inventory::scope())
            .service(preferences::scope())
            .service(deliveries::scope())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
