//! Request binding, validation and business checks.
//!
//! # Responsibilities
//! - Populate a typed request from the query string, a JSON body or form
//!   fields, preferring a staged decrypted payload of the matching source
//! - Declarative field rules via [`Validate`] and [`Rules`]
//! - Optional per-type business invariants via [`Check`]
//!
//! # Design Decisions
//! - Binders are plain `fn` items so a pipeline can hold them without boxing
//! - A staged payload from the other source is ignored, never consumed
//! - Repeated query/form keys keep their first value
//! - An encrypted form body is decoded as JSON

use serde::de::DeserializeOwned;

use crate::error::{PipelineError, ValidationErrors};
use crate::http::context::RequestContext;
use crate::http::negotiation::{EncryptedPayload, PayloadSource};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Bind from the query string (or a staged decrypted query).
pub fn bind_query<T: DeserializeOwned>(ctx: &mut RequestContext) -> Result<T, PipelineError> {
    if let Some(EncryptedPayload::Query(pairs)) = ctx.take_encrypted(PayloadSource::Query) {
        return from_pairs(pairs);
    }
    from_pairs(parse_pairs(ctx.query().as_bytes())?)
}

/// Bind from a JSON body (or a staged decrypted body).
pub fn bind_json<T: DeserializeOwned>(ctx: &mut RequestContext) -> Result<T, PipelineError> {
    if let Some(EncryptedPayload::Body(bytes)) = ctx.take_encrypted(PayloadSource::Body) {
        return from_json(&bytes);
    }
    from_json(ctx.body())
}

/// Bind from form fields: URL-encoded body fields first, then query fields.
///
/// A staged decrypted body is decoded as JSON.
pub fn bind_form<T: DeserializeOwned>(ctx: &mut RequestContext) -> Result<T, PipelineError> {
    if let Some(EncryptedPayload::Body(bytes)) = ctx.take_encrypted(PayloadSource::Body) {
        return from_json(&bytes);
    }

    let mut pairs = Vec::new();
    if is_form(ctx.content_type()) {
        pairs.extend(parse_pairs(ctx.body())?);
    }
    pairs.extend(parse_pairs(ctx.query().as_bytes())?);
    from_pairs(pairs)
}

fn is_form(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
        .unwrap_or(false)
}

fn parse_pairs(input: &[u8]) -> Result<Vec<(String, String)>, PipelineError> {
    serde_urlencoded::from_bytes(input).map_err(|e| PipelineError::bind(e.to_string()))
}

fn from_pairs<T: DeserializeOwned>(pairs: Vec<(String, String)>) -> Result<T, PipelineError> {
    let mut seen: Vec<(String, String)> = Vec::with_capacity(pairs.len());
    for (name, value) in pairs {
        if !seen.iter().any(|(n, _)| *n == name) {
            seen.push((name, value));
        }
    }
    let encoded =
        serde_urlencoded::to_string(&seen).map_err(|e| PipelineError::bind(e.to_string()))?;
    serde_urlencoded::from_str(&encoded).map_err(|e| PipelineError::bind(e.to_string()))
}

fn from_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, PipelineError> {
    serde_json::from_slice(bytes).map_err(|e| PipelineError::bind(e.to_string()))
}

/// Declarative field rules of a request type.
pub trait Validate {
    /// Return every failing rule, not just the first.
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// A business invariant a request type may enforce on itself.
pub trait Check {
    fn check(&self) -> Result<(), PipelineError>;
}

/// Collects rule failures for a [`Validate`] implementation.
///
/// ```
/// use svc_pipeline::http::binding::Rules;
///
/// let name = "";
/// let age = 200;
/// let result = Rules::new()
///     .required("name", name)
///     .range("age", age, 1, 150)
///     .finish();
/// assert_eq!(
///     result.unwrap_err().to_string(),
///     "name is required, age must be between 1 and 150"
/// );
/// ```
#[derive(Debug, Default)]
pub struct Rules {
    failures: Vec<String>,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blank string.
    pub fn required(self, field: &str, value: &str) -> Self {
        let ok = !value.trim().is_empty();
        self.rule(ok, format!("{field} is required"))
    }

    /// `Some` value.
    pub fn present<T>(self, field: &str, value: &Option<T>) -> Self {
        let ok = value.is_some();
        self.rule(ok, format!("{field} is required"))
    }

    pub fn min_len(self, field: &str, value: &str, min: usize) -> Self {
        let ok = value.chars().count() >= min;
        self.rule(ok, format!("{field} must be at least {min} characters"))
    }

    pub fn max_len(self, field: &str, value: &str, max: usize) -> Self {
        let ok = value.chars().count() <= max;
        self.rule(ok, format!("{field} must be at most {max} characters"))
    }

    /// Inclusive range.
    pub fn range<T>(self, field: &str, value: T, min: T, max: T) -> Self
    where
        T: PartialOrd + std::fmt::Display,
    {
        let ok = value >= min && value <= max;
        self.rule(ok, format!("{field} must be between {min} and {max}"))
    }

    /// Arbitrary rule; `message` is recorded when `ok` is false.
    pub fn rule(mut self, ok: bool, message: impl Into<String>) -> Self {
        if !ok {
            self.failures.push(message.into());
        }
        self
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.failures))
        }
    }
}
