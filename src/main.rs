use std::net::TcpListener;
use std::sync::Arc;

use anyhow::Context;

use sqlx::PgPool;

use restock_notify::app;
use restock_notify::auth::OperatorCredentials;
use restock_notify::client::EmailClient;
use restock_notify::crypto::SigningKey;
use restock_notify::repo::{PgStore, Repository};
use restock_notify::service::{RestockSender, Services};
use restock_notify::settings::Settings;
use restock_notify::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = telemetry::create_subscriber("info".into(), std::io::stdout);
    telemetry::set_subscriber(subscriber)?;

    let settings = Settings::load()?;

    let pool = PgPool::connect_with(settings.database.with_db())
        .await
        .context("Failed to connect to database")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    let repo: Arc<dyn Repository> = Arc::new(PgStore::new(pool));

    let signing_key = SigningKey::new(settings.app.secret_key())?;
    let email_client = EmailClient::new(
        settings.email.sender()?,
        settings.email.api_timeout(),
        settings.email.api_base_url()?,
        settings.email.api_auth_token(),
    )?;
    let sender = RestockSender::new(
        repo.clone(),
        email_client,
        signing_key.clone(),
        settings.app.base_url()?,
        settings.notifications.unsubscribe_link_ttl(),
    );
    let services = Services::new(
        repo,
        Arc::new(sender),
        settings.notifications.notifier_config()?,
    );

    let operator =
        OperatorCredentials::hash(&settings.operator.username, &settings.operator.password)?;

    let listener = TcpListener::bind(settings.app.addr())?;
    tracing::info!(addr = ?listener.local_addr()?, "Listening");

    app::run(listener, services, signing_key, operator)?
        .await
        .context("Failed to run app")
}
