//! Encryption negotiation middleware.
//!
//! # Responsibilities
//! - Detect `Encryption: Yes` on inbound requests
//! - Decrypt the `encryption_data` query parameter of retrieval requests
//! - Decrypt the body of every other request
//! - Stage the plaintext as a [`RequestEncryptionState`] request extension
//!
//! # Design Decisions
//! - Best effort: a payload that fails to decrypt is logged and the request
//!   continues as if it were plaintext
//! - The original body bytes are always handed on, so binders can fall back
//!   to the raw request
//! - Never rejects a request

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Method, Request, Uri},
    middleware::Next,
    response::Response,
};

use crate::config::{CipherConfig, EncryptionConfig};
use crate::crypto::{CipherCodec, CipherError};
use crate::observability::metrics;

/// Header that marks an encrypted request or response payload.
pub const ENCRYPTION_HEADER: &str = "encryption";

/// Affirmative value of [`ENCRYPTION_HEADER`].
pub const ENCRYPTION_YES: &str = "Yes";

/// Query parameter carrying an encrypted query string.
pub const ENCRYPTION_QUERY_PARAM: &str = "encryption_data";

/// Process-wide transport encryption settings, shared by the middleware,
/// the envelope writer and the outbound client.
#[derive(Clone, Debug)]
pub struct Transport {
    codec: Arc<CipherCodec>,
    enabled: bool,
}

impl Transport {
    pub fn new(cipher: &CipherConfig, encryption: &EncryptionConfig) -> Self {
        Self::from_codec(CipherCodec::new(cipher), encryption.enabled)
    }

    pub fn from_codec(codec: CipherCodec, enabled: bool) -> Self {
        Self {
            codec: Arc::new(codec),
            enabled,
        }
    }

    /// Negotiation and response encryption both off.
    pub fn plaintext() -> Self {
        Self::from_codec(CipherCodec::disabled(), false)
    }

    pub fn codec(&self) -> &CipherCodec {
        &self.codec
    }

    /// Whether the encryption feature is switched on.
    pub fn encryption_enabled(&self) -> bool {
        self.enabled
    }
}

/// Where a staged payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    Query,
    Body,
}

/// A decrypted payload, shaped by its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptedPayload {
    /// Decoded `name=value` pairs of the decrypted query string.
    Query(Vec<(String, String)>),
    /// The decrypted body bytes.
    Body(Bytes),
}

impl EncryptedPayload {
    pub fn source(&self) -> PayloadSource {
        match self {
            Self::Query(_) => PayloadSource::Query,
            Self::Body(_) => PayloadSource::Body,
        }
    }
}

/// Per-request decryption result, present only when decryption succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEncryptionState {
    payload: EncryptedPayload,
}

impl RequestEncryptionState {
    pub fn new(payload: EncryptedPayload) -> Self {
        Self { payload }
    }

    pub fn source(&self) -> PayloadSource {
        self.payload.source()
    }

    pub fn payload(&self) -> &EncryptedPayload {
        &self.payload
    }

    pub fn into_payload(self) -> EncryptedPayload {
        self.payload
    }
}

/// True when the request asks for encrypted handling.
pub fn wants_encryption(headers: &HeaderMap) -> bool {
    headers
        .get(ENCRYPTION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().eq_ignore_ascii_case(ENCRYPTION_YES))
        .unwrap_or(false)
}

/// Methods whose payload travels in the query string.
pub fn is_retrieval(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

/// Decrypt the `encryption_data` parameter of `uri`, if there is one.
pub fn decrypt_query(
    codec: &CipherCodec,
    uri: &Uri,
) -> Option<Result<RequestEncryptionState, CipherError>> {
    let query = uri.query()?;
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).ok()?;
    let (_, data) = pairs
        .into_iter()
        .find(|(name, _)| name == ENCRYPTION_QUERY_PARAM)?;

    Some(codec.decrypt(data.as_bytes()).and_then(|plain| {
        let params = serde_urlencoded::from_bytes::<Vec<(String, String)>>(&plain)
            .map_err(|e| CipherError::Decode(e.to_string()))?;
        Ok(RequestEncryptionState::new(EncryptedPayload::Query(params)))
    }))
}

/// Decrypt a whole request body.
pub fn decrypt_body(
    codec: &CipherCodec,
    body: &[u8],
) -> Result<RequestEncryptionState, CipherError> {
    let plain = codec.decrypt(body)?;
    Ok(RequestEncryptionState::new(EncryptedPayload::Body(plain.into())))
}

/// Middleware staging decrypted payloads for the binders.
pub async fn negotiate_encryption(
    State(transport): State<Transport>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !transport.encryption_enabled() || !wants_encryption(req.headers()) {
        metrics::record_negotiation("passthrough");
        return next.run(req).await;
    }

    let (mut parts, body) = req.into_parts();

    let body = if is_retrieval(&parts.method) {
        match decrypt_query(transport.codec(), &parts.uri) {
            Some(Ok(state)) => {
                metrics::record_negotiation("query");
                parts.extensions.insert(state);
            }
            Some(Err(e)) => {
                tracing::warn!(source = "query", error = %e, "Failed to decrypt request payload");
                metrics::record_negotiation("failed");
            }
            None => metrics::record_negotiation("passthrough"),
        }
        body
    } else {
        match axum::body::to_bytes(body, usize::MAX).await {
            Ok(bytes) => {
                match decrypt_body(transport.codec(), &bytes) {
                    Ok(state) => {
                        metrics::record_negotiation("body");
                        parts.extensions.insert(state);
                    }
                    Err(e) => {
                        tracing::warn!(
                            source = "body",
                            error = %e,
                            "Failed to decrypt request payload"
                        );
                        metrics::record_negotiation("failed");
                    }
                }
                Body::from(bytes)
            }
            Err(e) => {
                tracing::warn!(source = "body", error = %e, "Failed to read request body");
                metrics::record_negotiation("failed");
                Body::empty()
            }
        }
    };

    next.run(Request::from_parts(parts, body)).await
}
