//! visim: a multimodal (image + text) embedding service.
//!
//! Serves two frozen embedding models behind a minimal HTTP API and answers
//! nearest-neighbour queries against a pre-built similarity index. All model
//! weights and the index are loaded once at startup and are read-only for
//! the process lifetime.

pub mod config;
pub mod context;
pub mod decoder;
pub mod embed;
pub mod error;
pub mod index;
pub mod logging;
pub mod preprocess;
pub mod server;
