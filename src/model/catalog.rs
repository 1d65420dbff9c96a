use serde::Serialize;

/// Stored user record, read-only to the notification services
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    /// Raw address as stored; parsed into `EmailAddress` when an e-mail is sent
    pub email: String,
}

/// Stored product record, read-only to the notification services
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}
