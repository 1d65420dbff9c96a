use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};

use thiserror::Error;

use crate::crypto::TokenError;
use crate::error::Error;

pub type RestResult<T> = Result<T, RestError>;

#[derive(Debug, Error)]
pub enum RestError {
    #[error("Parse Error: {0}")]
    ParseError(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Failed to authenticate")]
    FailedToAuthenticate(#[source] anyhow::Error),

    #[error("Failed to verify token")]
    InvalidToken(#[from] TokenError),

    #[error("Internal Server Error")]
    InternalError(#[source] anyhow::Error),
}

impl From<Error> for RestError {
    fn from(e: Error) -> Self {
        match e {
            Error::InvalidArgument(msg) => Self::ParseError(msg),
            Error::NotFound(..) => Self::NotFound(e.to_string()),
            Error::DeliveryFailure(_) | Error::Corrupt(_) | Error::DatabaseError(_) => {
                tracing::error!(error = %e, "Request failed");
                Self::InternalError(e.into())
            }
        }
    }
}

impl ResponseError for RestError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ParseError(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::FailedToAuthenticate(_) | Self::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut res = HttpResponse::build(self.status_code());
        if let Self::FailedToAuthenticate(_) = self {
            res.insert_header((header::WWW_AUTHENTICATE, r#"Basic realm="operator""#));
        }
        res.body(self.to_string())
    }
}
