//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Symmetric cipher used by the transport codec.
    pub cipher: CipherConfig,

    /// Header-driven payload encryption negotiation.
    pub encryption: EncryptionConfig,

    /// Cross-origin resource sharing.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Cipher configuration.
///
/// When `enabled` is false the codec is an identity transform. The key is
/// taken as the raw UTF-8 bytes of `key`; its length is checked per call,
/// not at load time.
#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CipherConfig {
    /// Run the stream cipher (otherwise passthrough).
    pub enabled: bool,

    /// Shared secret. Must be 16, 24 or 32 bytes long.
    pub key: String,
}

impl std::fmt::Debug for CipherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherConfig")
            .field("enabled", &self.enabled)
            .field("key_len", &self.key.len())
            .finish()
    }
}

/// Encryption negotiation configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Honour `Encryption: Yes` on requests and encrypt opted-in responses.
    pub enabled: bool,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Attach the CORS layer.
    pub enabled: bool,

    /// `Access-Control-Allow-Origin`; `*` allows any origin.
    pub allow_origin: String,

    /// Comma-separated allowed methods.
    pub allow_methods: String,

    /// Comma-separated allowed headers; `*` allows any header.
    pub allow_headers: String,

    /// Comma-separated exposed headers.
    pub expose_headers: String,

    /// `Access-Control-Allow-Credentials`.
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allow_origin: "*".to_string(),
            allow_methods: "POST, GET, OPTIONS, PUT, DELETE".to_string(),
            allow_headers: "*".to_string(),
            expose_headers: "Content-Length, Content-Type, Encryption".to_string(),
            allow_credentials: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
