//! Typed per-request context handed to the pipeline.

use axum::{
    body::{Body, Bytes},
    extract::{FromRef, FromRequest},
    http::{header, HeaderMap, Method, Request, Uri},
    response::Response,
};

use crate::error::PipelineError;
use crate::http::envelope::EnvelopeWriter;
use crate::http::negotiation::{
    EncryptedPayload, PayloadSource, RequestEncryptionState, Transport,
};

/// Everything the pipeline needs from one request: the raw request parts,
/// the buffered body, and whatever the negotiation layer staged.
///
/// Owned by a single pipeline run and never shared.
#[derive(Debug)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    encryption: Option<RequestEncryptionState>,
    transport: Transport,
}

impl RequestContext {
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
        transport: Transport,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
            encryption: None,
            transport,
        }
    }

    pub fn with_encryption(mut self, state: RequestEncryptionState) -> Self {
        self.encryption = Some(state);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The raw, undecrypted body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The raw query string, empty when absent.
    pub fn query(&self) -> &str {
        self.uri.query().unwrap_or("")
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Whether a decrypted payload is still staged.
    pub fn has_encrypted(&self) -> bool {
        self.encryption.is_some()
    }

    /// Take the staged payload if it came from `source`.
    ///
    /// A payload from the other source stays in place and is ignored.
    pub fn take_encrypted(&mut self, source: PayloadSource) -> Option<EncryptedPayload> {
        match &self.encryption {
            Some(state) if state.source() == source => {
                self.encryption.take().map(RequestEncryptionState::into_payload)
            }
            _ => None,
        }
    }

    /// Envelope writer for this request.
    pub fn writer(&self, encrypt: bool) -> EnvelopeWriter {
        EnvelopeWriter::new(self.transport.clone(), encrypt)
    }
}

impl<S> FromRequest<S> for RequestContext
where
    S: Send + Sync,
    Transport: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        let transport = Transport::from_ref(state);
        let (mut parts, body) = req.into_parts();
        let encryption = parts.extensions.remove::<RequestEncryptionState>();

        let body = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read request body");
                let err = PipelineError::bind(format!("failed to read request body: {e}"));
                return Err(EnvelopeWriter::new(transport, false).bind_error(&err));
            }
        };

        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            encryption,
            transport,
        })
    }
}
