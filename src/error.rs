use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::utils::{templates, validation::FormErrors};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Login required for {next}")]
    LoginRequired { next: String },

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("CSRF verification failed: {0}")]
    Csrf(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("File upload error: {0}")]
    FileUpload(String),

    #[error("Template error: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid form submission")]
    Form(FormErrors),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, template, message) = match &self {
            AppError::LoginRequired { next } => {
                let location = format!("/auth/login/?next={}", urlencoding::encode(next));
                return Redirect::to(&location).into_response();
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "core/500", "Database error".to_string())
            }
            AppError::Migration(e) => {
                tracing::error!("Migration error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "core/500", "Database error".to_string())
            }
            AppError::Authentication(msg) => (StatusCode::UNAUTHORIZED, "core/403", msg.clone()),
            AppError::Authorization(msg) => (StatusCode::FORBIDDEN, "core/403", msg.clone()),
            AppError::Csrf(reason) => {
                tracing::warn!("CSRF check failed: {}", reason);
                (StatusCode::FORBIDDEN, "core/403csrf", reason.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "core/404", msg.clone()),
            AppError::BadRequest(msg) | AppError::FileUpload(msg) => (StatusCode::BAD_REQUEST, "core/400", msg.clone()),
            AppError::Form(errors) => {
                tracing::debug!("Unhandled form errors: {:?}", errors);
                (StatusCode::BAD_REQUEST, "core/400", "Invalid form submission".to_string())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "core/500", "Internal server error".to_string())
            }
            AppError::Template(e) => {
                tracing::error!("Template error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "core/500", "Internal server error".to_string())
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "core/500", "Internal server error".to_string())
            }
            AppError::Jwt(e) => {
                tracing::debug!("JWT error: {}", e);
                (StatusCode::UNAUTHORIZED, "core/403", "Invalid token".to_string())
            }
        };

        templates::render_status_page(
            status,
            template,
            &json!({
                "title": format!("Error {}", status.as_u16()),
                "status": status.as_u16(),
                "message": message,
            }),
        )
    }
}

// 便利函数，用于创建常见错误
impl AppError {
    pub fn not_found(resource: &str) -> Self {
        Self::NotFound(format!("{} not found", resource))
    }

    pub fn login_required(next: &str) -> Self {
        Self::LoginRequired { next: next.to_string() }
    }

    pub fn forbidden(msg: &str) -> Self {
        Self::Authorization(msg.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Form(FormErrors::from(&errors))
    }
}

impl From<FormErrors> for AppError {
    fn from(errors: FormErrors) -> Self {
        AppError::Form(errors)
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::FileUpload(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AppError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AppError::Internal(format!("Password hashing failed: {}", err))
    }
}
