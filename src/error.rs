//! Error taxonomy for the HTTP layer.
//!
//! Library code returns `anyhow::Result`. Services that need a specific HTTP
//! status raise an [`AppError`] variant; anything else converts into
//! [`AppError::Internal`] and is masked unless error details are exposed
//! (development mode).

use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    Json,
    extract::OriginalUri,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

static EXPOSE_DETAILS: AtomicBool = AtomicBool::new(false);

/// Include the full error chain in responses for unknown errors.
///
/// Set once at startup from the configured environment.
pub fn expose_error_details(expose: bool) {
    EXPOSE_DETAILS.store(expose, Ordering::Relaxed);
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Sync already in progress")]
    SyncInProgress,

    #[error("Too many requests, please try again later")]
    RateLimited,

    #[error("External API error ({provider}): {message}")]
    ExternalApi { provider: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }

    pub fn external(provider: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::ExternalApi {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::SyncInProgress => StatusCode::CONFLICT,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::ExternalApi { .. } => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::SyncInProgress => "SYNC_IN_PROGRESS",
            AppError::RateLimited => "RATE_LIMIT_EXCEEDED",
            AppError::ExternalApi { .. } => "EXTERNAL_API_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Errors that did not originate from a deliberate domain decision.
    fn is_unexpected(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Internal(_))
    }

    fn body(&self) -> ErrorEnvelope {
        let expose = EXPOSE_DETAILS.load(Ordering::Relaxed);
        let unexpected = self.is_unexpected();

        let message = if unexpected && !expose {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let details = match self {
            AppError::Internal(e) if expose => Some(format!("{e:#}")),
            AppError::Database(e) if expose => Some(format!("{e:?}")),
            _ => None,
        };

        ErrorEnvelope {
            success: false,
            error: ErrorBody {
                message,
                code: self.code(),
                details,
            },
        }
    }
}

/// `{ success: false, error: { message, code } }`
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_unexpected() {
            error!(error = %self, code = self.code(), "Unhandled error");
        }
        (self.status(), Json(self.body())).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, AppError>;

/// Fallback handler for unknown routes.
pub async fn route_not_found(method: Method, OriginalUri(uri): OriginalUri) -> Response {
    let body = ErrorEnvelope {
        success: false,
        error: ErrorBody {
            message: format!("Route not found: {} {}", method, uri.path()),
            code: "NOT_FOUND",
            details: None,
        },
    };
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}
