use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use std::fmt::Display;

pub type AppResult<T> = Result<T, AppError>;

/// JSON error returned by every handler.
///
/// The body is `{"error": message}`. `diagnostic` and `details` are added
/// when set, and `with_field` merges any extra keys the client branches on.
/// Errors carrying a `code` use the OAuth envelope instead:
/// `{"ok": false, "status", "code", "message", "diagnostic", "details"}`.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: Option<String>,
    diagnostic: Option<String>,
    details: Option<Value>,
    extra: Map<String, Value>,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
            diagnostic: None,
            details: None,
            extra: Map::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal<E: Display>(error: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }

    pub fn oauth(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.to_string()),
            ..Self::new(status, message)
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<Value>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(code) = self.code {
            let body = serde_json::json!({
                "ok": false,
                "status": self.status.as_u16(),
                "code": code,
                "message": self.message,
                "diagnostic": self.diagnostic,
                "details": self.details,
            });
            return (self.status, Json(body)).into_response();
        }

        let mut body = Map::new();
        body.insert("error".to_string(), Value::String(self.message));
        if let Some(diagnostic) = self.diagnostic {
            body.insert("diagnostic".to_string(), Value::String(diagnostic));
        }
        if let Some(details) = self.details {
            body.insert("details".to_string(), details);
        }
        for (key, value) in self.extra {
            body.entry(key).or_insert(value);
        }
        (self.status, Json(Value::Object(body))).into_response()
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => AppError::not_found("Resource not found"),
            _ => AppError::internal(value),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::internal(value)
    }
}
