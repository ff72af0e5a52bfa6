//! Uniform response envelope.
//!
//! # Responsibilities
//! - Build the `{code, msg, data}` envelope
//! - Apply status/code overrides carried by a [`BusinessError`](crate::error::BusinessError)
//! - Encrypt the serialized envelope when the route opted in and the
//!   encryption feature is on
//!
//! # Design Decisions
//! - `code` and `msg` are always serialized; `data` is omitted when empty
//! - If encrypting the reply fails, the plaintext envelope is written and a
//!   warning logged

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PipelineError;
use crate::http::negotiation::{Transport, ENCRYPTION_HEADER, ENCRYPTION_YES};

/// The JSON body of every non-text reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Writes envelopes (and raw text) for one request.
#[derive(Debug, Clone)]
pub struct EnvelopeWriter {
    transport: Transport,
    encrypt: bool,
}

impl EnvelopeWriter {
    /// `encrypt` is the route's opt-in; it only takes effect when the
    /// encryption feature is enabled.
    pub fn new(transport: Transport, encrypt: bool) -> Self {
        Self { transport, encrypt }
    }

    pub fn encrypts(&self) -> bool {
        self.encrypt && self.transport.encryption_enabled()
    }

    /// Core write: `err` replaces the message and may override the code
    /// and status.
    pub fn write_json(
        &self,
        code: i64,
        status: StatusCode,
        msg: &str,
        err: Option<&PipelineError>,
        data: Option<Value>,
    ) -> Response {
        let mut envelope = Envelope {
            code,
            msg: msg.to_string(),
            data,
        };
        let mut status = status;

        if let Some(err) = err {
            envelope.msg = err.to_string();
            if let Some(business) = err.as_business() {
                if let Some(code) = business.code() {
                    envelope.code = code;
                }
                if let Some(override_status) = business.http_status() {
                    status = override_status;
                }
            }
        }

        if self.encrypts() {
            let encrypted = serde_json::to_vec(&envelope)
                .map_err(PipelineError::internal)
                .and_then(|bytes| Ok(self.transport.codec().encrypt(&bytes)?));
            match encrypted {
                Ok(text) => return encrypted_text(status, text),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to encrypt response, sending plaintext");
                }
            }
        }

        (status, Json(envelope)).into_response()
    }

    /// 200 with `data`.
    pub fn success(&self, data: Option<Value>) -> Response {
        self.write_json(200, StatusCode::OK, "", None, data)
    }

    /// 500 unless `err` overrides it.
    pub fn server_error(&self, err: &PipelineError) -> Response {
        self.write_json(500, StatusCode::INTERNAL_SERVER_ERROR, "error", Some(err), None)
    }

    /// 400 for binding, validation and check failures.
    pub fn bind_error(&self, err: &PipelineError) -> Response {
        self.write_json(400, StatusCode::BAD_REQUEST, "", Some(err), None)
    }

    /// Plain message with the given status as both status and code.
    pub fn message(&self, status: StatusCode, msg: &str) -> Response {
        self.write_json(i64::from(status.as_u16()), status, msg, None, None)
    }

    /// Bind error when `err` is set, empty success otherwise.
    pub fn success_or_error(&self, err: Option<&PipelineError>) -> Response {
        match err {
            Some(err) => self.bind_error(err),
            None => self.success(None),
        }
    }

    /// Raw text reply, bypassing the envelope.
    pub fn text(&self, body: String) -> Response {
        if self.encrypts() {
            match self.transport.codec().encrypt(body.as_bytes()) {
                Ok(text) => return encrypted_text(StatusCode::OK, text),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to encrypt response, sending plaintext");
                }
            }
        }
        (StatusCode::OK, body).into_response()
    }
}

fn encrypted_text(status: StatusCode, text: String) -> Response {
    (status, [(ENCRYPTION_HEADER, ENCRYPTION_YES)], text).into_response()
}
