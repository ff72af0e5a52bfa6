//! Request pipeline library: typed binding, validation, business checks,
//! `{code, msg, data}` envelopes and header-negotiated AES-CTR payload
//! encryption on top of Axum.

pub mod config;
pub mod crypto;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ServiceConfig;
pub use error::{BusinessError, PipelineError, ValidationErrors};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
