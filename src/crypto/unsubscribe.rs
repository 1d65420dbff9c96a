use chrono::Duration;

use super::{SigningKey, Token, TokenResult};

/// Signed claim that lets the holder of a restock e-mail drop its subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsubscribeToken(i64);

impl UnsubscribeToken {
    pub fn new(subscription_id: i64) -> Self {
        Self(subscription_id)
    }

    pub fn subscription_id(&self) -> i64 {
        self.0
    }

    /// Sign the claim, valid for `ttl` from now
    pub fn sign(&self, key: &SigningKey, ttl: Duration) -> TokenResult<Token> {
        Token::builder(self.0).expires_in(ttl).sign(key.as_ref())
    }

    /// Verify a token string and recover the claim
    pub fn verify(key: &SigningKey, token: &str) -> TokenResult<Self> {
        let subscription_id: i64 = token.parse::<Token>()?.verify(key.as_ref())?;
        Ok(Self(subscription_id))
    }
}
