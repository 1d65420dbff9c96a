use std::future::Future;
use std::pin::Pin;

use actix_web::{dev, web, FromRequest, HttpRequest};

use anyhow::Context;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use secrecy::Secret;

use crate::auth::Credentials;
use crate::controller::{RestError, RestResult};
use crate::telemetry::spawn_blocking_with_tracing;

/// The configured operator account, with its password kept only as an argon2 hash
#[derive(Debug)]
pub struct OperatorCredentials {
    username: String,
    password_hash: Secret<String>,
}

impl OperatorCredentials {
    /// Hash a plaintext operator password
    pub fn hash(username: &str, password: &Secret<String>) -> anyhow::Result<Self> {
        use secrecy::ExposeSecret;

        if username.is_empty() {
            anyhow::bail!("Operator username must not be empty");
        }

        let salt = SaltString::generate(&mut rand::thread_rng());
        let password_hash = Argon2::default()
            .hash_password(password.expose_secret().as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash operator password: {}", e))?
            .to_string();

        Ok(Self {
            username: username.into(),
            password_hash: Secret::new(password_hash),
        })
    }
}

/// Extractor that only succeeds for requests carrying the operator's Basic credentials
#[derive(Debug)]
pub struct Operator;

impl FromRequest for Operator {
    type Error = RestError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            // NOTE: Must be registered with the application at startup
            let operator = req
                .app_data::<web::Data<OperatorCredentials>>()
                .context("Operator credentials not registered for application")
                .map_err(RestError::InternalError)?
                .clone();
            // Pull the credentials from the headers
            let creds = Credentials::from_headers(req.headers())
                .map_err(RestError::FailedToAuthenticate)?;

            validate_credentials(operator, creds).await?;
            Ok(Operator)
        })
    }
}

#[tracing::instrument("Validate operator credentials", skip(operator, credentials))]
async fn validate_credentials(
    operator: web::Data<OperatorCredentials>,
    credentials: Credentials,
) -> RestResult<()> {
    let username_matches = credentials.username == operator.username;
    let password_hash = operator.password_hash.clone();

    // The hash is always checked so a wrong username costs as much as a wrong password
    spawn_blocking_with_tracing(move || verify_password_hash(credentials.password, password_hash))
        .await
        .context("Failed to spawn blocking task")
        .map_err(RestError::InternalError)??;

    if !username_matches {
        return Err(RestError::FailedToAuthenticate(anyhow::anyhow!(
            "Unknown operator username"
        )));
    }
    Ok(())
}

#[tracing::instrument("Verify password hash", skip(password, password_hash))]
fn verify_password_hash(password: Secret<String>, password_hash: Secret<String>) -> RestResult<()> {
    use secrecy::ExposeSecret;

    let password_hash = PasswordHash::new(password_hash.expose_secret())
        .map_err(|e| anyhow::anyhow!("Failed to parse stored password hash: {}", e))
        .map_err(RestError::InternalError)?;

    Argon2::default()
        .verify_password(password.expose_secret().as_bytes(), &password_hash)
        .map_err(|e| anyhow::anyhow!("Failed to verify password hash: {}", e))
        .map_err(RestError::FailedToAuthenticate)?;

    Ok(())
}
