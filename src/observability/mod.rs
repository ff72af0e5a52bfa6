//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Negotiation layer and pipeline produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (outcome counters)
//!
//! Consumers:
//!     → stdout (human-readable or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID (`x-request-id`) is attached by the HTTP layer and shows up
//!   in the access log spans
//! - Counters are recorded unconditionally; without an installed recorder
//!   they are no-ops

pub mod logging;
pub mod metrics;
