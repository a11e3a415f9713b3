use crate::{models::ErrorResponse, services::WalletError, validation::ValidationError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use uuid::Uuid;

/// Failure of a call to the external blockchain data provider, already classified.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Rate limited by blockchain data provider")]
    RateLimited { retry_after: Option<u64> },

    #[error("Blockchain data provider unavailable (HTTP {status})")]
    Service { status: u16 },

    #[error("Blockchain data provider request failed: {message}")]
    Request {
        status: Option<u16>,
        message: String,
    },

    #[error("Blockchain data provider unreachable: {0}")]
    Network(String),

    #[error("Unexpected blockchain data provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Rate limits, 5xx responses, timeouts, refused and dropped connections.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. }
                | ProviderError::Service { .. }
                | ProviderError::Network(_)
        )
    }

    /// Provider-supplied wait in seconds, if any.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || is_dropped_connection(&err) {
            ProviderError::Network(err.to_string())
        } else if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else {
            ProviderError::Request {
                status: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            }
        }
    }
}

/// The peer closed or reset the connection before a full response arrived.
fn is_dropped_connection(err: &reqwest::Error) -> bool {
    if err.status().is_some() {
        return false;
    }
    if err.is_request() || err.is_body() {
        return true;
    }

    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

/// Errors surfaced by the HTTP handlers.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid request body: {0}")]
    BadRequest(String),

    #[error("Rate limited by blockchain data provider")]
    RateLimited { retry_after: Option<u64> },

    #[error("{0}")]
    Provider(ProviderError),

    #[error("{0}")]
    Wallet(#[from] WalletError),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::RateLimited { retry_after } => AppError::RateLimited { retry_after },
            other => AppError::Provider(other),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Provider(_) | AppError::Wallet(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();
        let status = self.status_code();

        let retry_after = match &self {
            AppError::RateLimited { retry_after } => *retry_after,
            _ => None,
        };

        if status.is_server_error() {
            tracing::error!(error = ?self, %request_id, "Request failed");
        } else {
            tracing::warn!(error = %self, %request_id, status = status.as_u16(), "Request rejected");
        }

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            retry_after,
            request_id,
        };

        (status, Json(body)).into_response()
    }
}
