//! Outbound client for services that speak the envelope protocol.
//!
//! Request bodies are encrypted (and marked with `Encryption: Yes`) when the
//! transport has encryption enabled. Replies marked the same way are
//! decrypted before the envelope is decoded.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::CipherError;
use crate::http::negotiation::{
    Transport, ENCRYPTION_HEADER, ENCRYPTION_QUERY_PARAM, ENCRYPTION_YES,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Decoded reply envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error("empty response body")]
    EmptyBody,

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("invalid header: {0}")]
    Header(String),
}

/// HTTP client sharing the service's transport encryption settings.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: Client,
    transport: Transport,
}

impl ServiceClient {
    /// Client with the default 10 second timeout.
    pub fn new(transport: Transport) -> Result<Self, ClientError> {
        Self::with_timeout(transport, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(transport: Transport, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, transport))
    }

    /// Wrap an existing `reqwest` client.
    pub fn with_client(client: Client, transport: Transport) -> Self {
        Self { client, transport }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Send one request and decode the envelope of the reply.
    ///
    /// `headers` are extra `(name, value)` pairs added to the request.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&[u8]>,
    ) -> Result<(StatusCode, ApiResponse<T>), ClientError> {
        let mut header_map = HeaderMap::new();
        header_map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClientError::Header(format!("{name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ClientError::Header(format!("{name}: {e}")))?;
            header_map.insert(name, value);
        }

        let mut builder = self.client.request(method, url);
        if let Some(body) = body {
            if self.transport.encryption_enabled() {
                let encrypted = self.transport.codec().encrypt(body)?;
                header_map.insert(ENCRYPTION_HEADER, HeaderValue::from_static(ENCRYPTION_YES));
                builder = builder.body(encrypted);
            } else {
                builder = builder.body(body.to_vec());
            }
        }

        let res = builder.headers(header_map).send().await?;
        let status = res.status();
        let encrypted = res
            .headers()
            .get(ENCRYPTION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case(ENCRYPTION_YES))
            .unwrap_or(false);
        let bytes = res.bytes().await?;

        if bytes.is_empty() {
            return Err(ClientError::EmptyBody);
        }

        let plain = if encrypted && self.transport.encryption_enabled() {
            self.transport.codec().decrypt(&bytes)?
        } else {
            bytes.to_vec()
        };

        let envelope =
            serde_json::from_slice(&plain).map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok((status, envelope))
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<(StatusCode, ApiResponse<T>), ClientError> {
        self.request(Method::GET, url, &[], None).await
    }

    /// GET with `params` as the query string, sent encrypted when the
    /// transport has encryption enabled.
    pub async fn get_query<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<(StatusCode, ApiResponse<T>), ClientError> {
        let target = self.encrypted_query(url, params)?;
        if self.transport.encryption_enabled() {
            self.request(Method::GET, &target, &[(ENCRYPTION_HEADER, ENCRYPTION_YES)], None)
                .await
        } else {
            self.request(Method::GET, &target, &[], None).await
        }
    }

    /// POST `body` serialized as JSON.
    pub async fn post_json<B, T>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<(StatusCode, ApiResponse<T>), ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let bytes = serde_json::to_vec(body).map_err(|e| ClientError::Decode(e.to_string()))?;
        self.request(Method::POST, url, &[], Some(&bytes)).await
    }

    /// Append `params` to `url`, folded into a single encrypted
    /// `encryption_data` parameter when encryption is enabled.
    pub fn encrypted_query(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<String, ClientError> {
        let plain = encode_pairs(params)?;
        let query = if self.transport.encryption_enabled() {
            let encrypted = self.transport.codec().encrypt(plain.as_bytes())?;
            encode_pairs(&[(ENCRYPTION_QUERY_PARAM, encrypted.as_str())])?
        } else {
            plain
        };

        if query.is_empty() {
            return Ok(url.to_string());
        }
        let sep = if url.contains('?') { '&' } else { '?' };
        Ok(format!("{url}{sep}{query}"))
    }
}

fn encode_pairs(params: &[(&str, &str)]) -> Result<String, ClientError> {
    serde_urlencoded::to_string(params).map_err(|e| ClientError::Decode(e.to_string()))
}
