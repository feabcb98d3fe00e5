use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{error, HttpResponse};
use derive_more::{Display, Error};

/// status-coded errors surfaced to the caller; every precondition failure
/// carries a stable kind plus a human readable message
#[derive(Debug, Display, Error)]
pub(crate) enum CustomError {
    #[display("{message}")]
    BadRequest { message: String },
    #[display("{message}")]
    Unauthorized { message: String },
    #[display("{message}")]
    Forbidden { message: String },
    #[display("{message}")]
    ResourceNotFound { message: String },
    #[display("{message}")]
    Conflict { message: String },
    #[display("server is busy")]
    ServerIsBusy,
    #[display("database error")]
    DbError,
    #[display("timeout occurred")]
    Timeout,
}

impl CustomError {
    pub fn bad(message: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into() }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden { message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::ResourceNotFound { message: message.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict { message: message.into() }
    }
}

impl error::ResponseError for CustomError {
    fn status_code(&self) -> StatusCode {
        match *self {
            CustomError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            CustomError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            CustomError::Forbidden { .. } => StatusCode::FORBIDDEN,
            CustomError::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
            CustomError::Conflict { .. } => StatusCode::CONFLICT,
            CustomError::ServerIsBusy | CustomError::DbError => StatusCode::INTERNAL_SERVER_ERROR,
            CustomError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::html())
            .body(self.to_string())
    }
}
