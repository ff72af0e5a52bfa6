//! HTTP layer: encryption negotiation, request pipeline, envelopes and the
//! server that ties them to Axum.

pub mod binding;
pub mod client;
pub mod context;
pub mod envelope;
pub mod negotiation;
pub mod pipeline;
pub mod server;

pub use binding::{Check, Rules, Validate};
pub use client::{ApiResponse, ClientError, ServiceClient};
pub use context::RequestContext;
pub use envelope::{Envelope, EnvelopeWriter};
pub use negotiation::{RequestEncryptionState, Transport};
pub use pipeline::{Pipeline, Reply};
pub use server::{AppState, HttpServer};
