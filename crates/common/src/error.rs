//! Error types for the polling service.

use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    /// Create a new field error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    #[error("Validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // === Vote state conflicts ===
    #[error("This poll is no longer accepting votes")]
    PollInactive,

    #[error("This poll has expired and is no longer accepting votes")]
    PollExpired,

    #[error("One or more selected options are invalid")]
    OptionNotFound,

    #[error("User ID is required for non-anonymous polls")]
    VoterRequired,

    #[error("This poll only allows voting for one option")]
    MultipleNotAllowed,

    #[error("You have already voted on this poll")]
    AlreadyVoted,

    // === Server Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a validation error on a single field.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::Validation(_)
            | Self::PollInactive
            | Self::PollExpired
            | Self::OptionNotFound
            | Self::MultipleNotAllowed
            | Self::AlreadyVoted => StatusCode::BAD_REQUEST,
            Self::Unauthorized | Self::VoterRequired => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,

            // 5xx Server Errors
            Self::Database(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "POLL_NOT_FOUND",
            Self::Unauthorized => "AUTH_REQUIRED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::PollInactive => "POLL_INACTIVE",
            Self::PollExpired => "POLL_EXPIRED",
            Self::OptionNotFound => "OPTION_NOT_FOUND",
            Self::VoterRequired => "USER_ID_REQUIRED",
            Self::MultipleNotAllowed => "MULTIPLE_NOT_ALLOWED",
            Self::AlreadyVoted => "ALREADY_VOTED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Short, human-readable summary used as the envelope's `error` field.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Invalid input",
            Self::NotFound(_) => "Not found",
            Self::Unauthorized | Self::VoterRequired => "Unauthorized",
            Self::Forbidden(_) => "Forbidden",
            Self::PollInactive => "Poll inactive",
            Self::PollExpired => "Poll expired",
            Self::OptionNotFound => "Invalid options",
            Self::MultipleNotAllowed => "Multiple votes not allowed",
            Self::AlreadyVoted => "Already voted",
            Self::Database(_) | Self::Config(_) | Self::Internal(_) => "Internal server error",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Server error details stay in the log
        let message = if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
            "An unexpected error occurred".to_string()
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
            self.to_string()
        };

        let mut body = json!({
            "success": false,
            "error": self.title(),
            "message": message,
            "code": code,
        });
        if let Self::Validation(details) = &self {
            body["details"] = json!(details);
        }

        (status, Json(body)).into_response()
    }
}

// === From implementations ===

/// `option_ids` -> `optionIds`, matching the JSON field names.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut details: Vec<FieldError> = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map_or_else(|| format!("is invalid ({})", e.code), ToString::to_string);
                    FieldError::new(camel_case(&field), message)
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));
        Self::Validation(details)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
