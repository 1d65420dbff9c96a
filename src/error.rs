use crate::domain::Entity;
use crate::service::DeliveryError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Caller errors
    #[error("{0} {1} not found")]
    NotFound(Entity, i64),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    // Channel sender errors
    #[error(transparent)]
    DeliveryFailure(#[from] DeliveryError),
    // Storage errors
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    #[error(transparent)]
    DatabaseError(#[from] sqlx::Error),
}
