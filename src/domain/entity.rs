use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

/// Kinds of record that callers reference by id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    User,
    Product,
    Subscription,
    DeliveryLog,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Product => "product",
            Self::Subscription => "subscription",
            Self::DeliveryLog => "delivery log",
        }
    }

    /// Reject ids that can never reference a stored row
    pub fn validate_id(self, id: i64) -> Result<i64> {
        if id <= 0 {
            return Err(Error::InvalidArgument(format!(
                "{} id must be positive, got {}",
                self.as_str(),
                id
            )));
        }
        Ok(id)
    }

    /// Build the `NotFound` error for an id of this kind
    pub fn not_found(self, id: i64) -> Error {
        Error::NotFound(self, id)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Capitalized for error messages, e.g. "Product 7 not found"
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => write!(f, "{}{}", first.to_uppercase(), chars.as_str()),
            None => Ok(()),
        }
    }
}
