//! Transport encryption.
//!
//! A single symmetric codec turns opaque payloads into base64 text and back.
//! It is constructed once from [`CipherConfig`](crate::config::CipherConfig)
//! and shared read-only by every request.

pub mod cipher;

pub use cipher::{CipherCodec, CipherError};
