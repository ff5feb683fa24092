use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::flash::Flash;
use crate::services::qr::IngestionError;
use crate::validation::form::FieldErrors;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A connection pool error.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// A pool construction error.
    #[error("Pool setup error: {0}")]
    PoolSetup(#[from] deadpool_postgres::CreatePoolError),

    /// A Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// An I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An image encoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// A QR encoding error.
    #[error("QR encoding error: {0}")]
    QrEncode(#[from] qrcode::types::QrError),

    /// A form failed validation.
    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    /// The username is already registered.
    #[error("Username already exists: {0}")]
    DuplicateUsername(String),

    /// An authentication error.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The session does not carry the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// An uploaded QR code could not be ingested.
    #[error("QR ingestion failed: {0}")]
    Ingestion(#[from] IngestionError),

    /// A CSRF token was missing or did not match.
    #[error("CSRF validation failed")]
    Csrf,

    /// A multipart error.
    #[error("Multipart error: {0}")]
    Multipart(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// The HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Ingestion(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DuplicateUsername(_) => StatusCode::CONFLICT,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::Csrf => StatusCode::FORBIDDEN,
            AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the user can fix this error by resubmitting the form.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_)
                | AppError::DuplicateUsername(_)
                | AppError::Authentication(_)
                | AppError::Forbidden(_)
                | AppError::Ingestion(_)
                | AppError::Csrf
                | AppError::Multipart(_)
        )
    }

    /// The message shown to the user as a flash.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(errors) => errors.to_string(),
            AppError::DuplicateUsername(_) => "Username already exists!".to_string(),
            AppError::Authentication(msg) => msg.clone(),
            AppError::Forbidden(msg) => msg.clone(),
            AppError::Ingestion(e) => e.user_message().to_string(),
            AppError::Csrf => "The form has expired. Please try again.".to_string(),
            AppError::Multipart(msg) => msg.clone(),
            _ => "Internal server error".to_string(),
        }
    }

    /// Re-renders a form after a user-correctable error.
    ///
    /// Field errors are shown next to their inputs and anything else becomes a
    /// flash. Server-side errors are passed through unchanged.
    pub fn render_form(
        self,
        flashes: &mut Vec<Flash>,
        render: impl FnOnce(&[Flash], &FieldErrors) -> String,
    ) -> Result<Response> {
        if !self.is_user_error() {
            return Err(self);
        }

        let status = self.status();
        let errors = match self {
            AppError::Validation(errors) => errors,
            other => {
                flashes.push(Flash::danger(other.user_message()));
                FieldErrors::default()
            }
        };

        Ok((status, Html(render(flashes, &errors))).into_response())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        match self {
            AppError::Database(ref e) => tracing::error!("Database error: {}", e),
            AppError::Pool(ref e) => tracing::error!("Pool error: {}", e),
            AppError::PoolSetup(ref e) => tracing::error!("Pool setup error: {}", e),
            AppError::Redis(ref e) => tracing::error!("Redis error: {}", e),
            AppError::Io(ref e) => tracing::error!("IO error: {}", e),
            AppError::Image(ref e) => tracing::error!("Image error: {}", e),
            AppError::QrEncode(ref e) => tracing::error!("QR encoding error: {}", e),
            AppError::Internal(ref msg) => tracing::error!("Internal error: {}", msg),
            AppError::Authentication(ref msg) => tracing::warn!("Authentication failed: {}", msg),
            AppError::Forbidden(ref msg) => tracing::warn!("Authorization failed: {}", msg),
            AppError::Csrf => tracing::warn!("CSRF validation failed"),
            ref other => tracing::debug!("{}", other),
        }

        let body = crate::views::error_page(status, &self.user_message());
        (status, Html(body)).into_response()
    }
}
