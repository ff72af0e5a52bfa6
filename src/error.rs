//! Error taxonomy of the request pipeline.

use axum::http::StatusCode;
use thiserror::Error;

use crate::crypto::CipherError;

/// Errors produced while binding, checking or handling a request.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The request did not match the expected shape.
    #[error("{0}")]
    Bind(String),

    /// The request bound but broke one or more declared field rules.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// The request failed a business invariant of its own type.
    #[error("{0}")]
    Check(String),

    /// Handler-level failure, optionally overriding status and code.
    #[error(transparent)]
    Business(#[from] BusinessError),

    /// The handler produced no response on purpose; nothing is written.
    #[error("no response")]
    NoReturn,

    /// Transport encryption failed.
    #[error(transparent)]
    Cipher(#[from] CipherError),

    /// Any other handler failure.
    #[error("{0}")]
    Internal(String),
}

impl PipelineError {
    pub fn bind(message: impl Into<String>) -> Self {
        Self::Bind(message.into())
    }

    pub fn check(message: impl Into<String>) -> Self {
        Self::Check(message.into())
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    /// True for the response-suppressing sentinel.
    pub fn is_no_return(&self) -> bool {
        matches!(self, Self::NoReturn)
    }

    /// The business error carried by this error, if any.
    pub fn as_business(&self) -> Option<&BusinessError> {
        match self {
            Self::Business(err) => Some(err),
            _ => None,
        }
    }
}

/// A handler failure that can override the reply's HTTP status and the
/// envelope's application code.
///
/// Each override is independent: set one, both or neither.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BusinessError {
    message: String,
    http_status: Option<StatusCode>,
    code: Option<i64>,
}

impl BusinessError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            http_status: None,
            code: None,
        }
    }

    /// Override the envelope `code`. Non-positive codes are ignored.
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = (code > 0).then_some(code);
        self
    }

    /// Override the HTTP status of the reply.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_codes(self, status: StatusCode, code: i64) -> Self {
        self.with_status(status).with_code(code)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn http_status(&self) -> Option<StatusCode> {
        self.http_status
    }

    pub fn code(&self) -> Option<i64> {
        self.code
    }
}

/// Every failing validation rule of a bound request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Error)]
#[error("{}", .0.join(", "))]
pub struct ValidationErrors(pub Vec<String>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }
}
