use actix_web::http::header::{self, HeaderMap};

use anyhow::Context;

use secrecy::Secret;

const BASIC_SCHEME: &str = "basic";

/// Username and password presented with a request
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: Secret<String>,
}

impl Credentials {
    /// Extract HTTP Basic credentials from the `Authorization` header
    pub fn from_headers(headers: &HeaderMap) -> anyhow::Result<Self> {
        let header_value = headers
            .get(header::AUTHORIZATION)
            .context("Missing authorization in header")?
            .to_str()
            .context("Authorization header is not valid ASCII")?;

        Self::from_basic(header_value)
    }

    /// Parse a header value formatted as `Basic <base64 username:password>`
    pub fn from_basic(header_value: &str) -> anyhow::Result<Self> {
        use base64::Engine;

        // The scheme name is case-insensitive
        let (scheme, encoded) = header_value
            .trim()
            .split_once(' ')
            .context("Malformed authorization header")?;
        if !scheme.eq_ignore_ascii_case(BASIC_SCHEME) {
            anyhow::bail!("Authorization scheme {} is not basic", scheme);
        }

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .context("Failed to decode authorization header")?;
        let decoded = String::from_utf8(decoded).context("Credentials are not valid UTF-8")?;

        // Only the first colon separates; passwords may contain more
        let (username, password) = decoded
            .split_once(':')
            .context("Missing password in authorization")?;
        if username.is_empty() {
            anyhow::bail!("Missing username in authorization");
        }

        Ok(Self {
            username: username.into(),
            password: Secret::new(password.into()),
        })
    }
}
