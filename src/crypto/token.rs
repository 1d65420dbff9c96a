use std::str::FromStr;

use hmac::Mac;

use serde::{Deserialize, Serialize};

use chrono::{DateTime, Duration, TimeZone, Utc};

use base64::{
    alphabet,
    engine::{self, general_purpose},
    Engine as _,
};

lazy_static::lazy_static! {
    // URL-safe so tokens can sit in a path segment
    static ref BASE64_ENGINE: engine::GeneralPurpose =
        engine::GeneralPurpose::new(&alphabet::URL_SAFE, general_purpose::NO_PAD);
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token is malformed")]
    Malformed,
    #[error("Token signature does not match")]
    SignatureMismatch,
    #[error("Token is expired")]
    Expired,
    #[error("Failed to encode token")]
    Encode(#[source] serde_json::Error),
}

impl From<base64::DecodeError> for TokenError {
    fn from(_e: base64::DecodeError) -> Self {
        Self::Malformed
    }
}

impl From<std::str::Utf8Error> for TokenError {
    fn from(_e: std::str::Utf8Error) -> Self {
        Self::Malformed
    }
}

pub type TokenResult<T> = Result<T, TokenError>;

/// A serialized, signed token of the form `<base64 message>.<base64 signature>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn builder<T: Serialize>(payload: T) -> TokenBuilder<T> {
        TokenBuilder::new(payload)
    }

    /// Check the signature and expiry, then decode the payload
    pub fn verify<T, K>(self, key: &K) -> TokenResult<T>
    where
        T: for<'de> Deserialize<'de>,
        K: Mac + Clone,
    {
        let (msg, sig) = self.split();
        let msg = BASE64_ENGINE.decode(msg)?;
        let sig = BASE64_ENGINE.decode(sig)?;

        // Signature first; nothing unauthenticated gets deserialized
        key.clone()
            .chain_update(&msg)
            .verify_slice(&sig)
            .map_err(|_| TokenError::SignatureMismatch)?;

        let msg = std::str::from_utf8(&msg)?;
        let msg: TokenMessage<T> =
            serde_json::from_str(msg).map_err(|_| TokenError::Malformed)?;
        if msg.is_expired() {
            return Err(TokenError::Expired);
        }
        Ok(msg.data)
    }

    fn split(&self) -> (&str, &str) {
        // Format is checked on parse
        self.0.split_once('.').unwrap_or((&self.0, ""))
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Token {
    type Err = TokenError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token.split_once('.') {
            Some((msg, sig)) if !msg.is_empty() && !sig.is_empty() && !sig.contains('.') => {
                Ok(Self(token.to_string()))
            }
            _ => Err(TokenError::Malformed),
        }
    }
}

#[derive(Debug)]
pub struct TokenBuilder<T> {
    expiration: Option<DateTime<Utc>>,
    payload: T,
}

impl<T: Serialize> TokenBuilder<T> {
    pub fn new(payload: T) -> Self {
        Self {
            expiration: None,
            payload,
        }
    }
    /// Expire after `duration` from now
    pub fn expires_in(mut self, duration: Duration) -> Self {
        self.expiration = Some(Utc::now() + duration);
        self
    }
    pub fn expires_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.expiration = Some(timestamp);
        self
    }
    pub fn sign<K>(self, key: &K) -> TokenResult<Token>
    where
        K: Mac + Clone,
    {
        let msg = TokenMessage {
            exp: self.expiration.map(|date| date.timestamp()),
            data: self.payload,
        };
        let msg = serde_json::to_string(&msg).map_err(TokenError::Encode)?;
        let sig = key
            .clone()
            .chain_update(msg.as_bytes())
            .finalize()
            .into_bytes();

        Ok(Token(format!(
            "{}.{}",
            BASE64_ENGINE.encode(msg),
            BASE64_ENGINE.encode(sig)
        )))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenMessage<T> {
    exp: Option<i64>,
    data: T,
}

impl<T> TokenMessage<T> {
    fn is_expired(&self) -> bool {
        match self.exp {
            // An unrepresentable timestamp counts as expired
            Some(exp) => Utc
                .timestamp_opt(exp, 0)
                .earliest()
                .map_or(true, |exp| Utc::now() >= exp),
            None => false,
        }
    }
}
