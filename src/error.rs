//! Error types for the two failure tiers the service distinguishes.
//!
//! Artifact loading is startup-fatal: any [`LoadError`] aborts the process
//! from `main` before the listener is bound. Request-time failures are
//! translated into client responses by the server layer and never take the
//! process down.

use std::path::PathBuf;
use thiserror::Error;

/// A failure while loading one of the startup artifacts.
///
/// There is no partial-availability mode: the process either loads the
/// decoder, both models, the tokenizer, the projection head, and the
/// similarity index, or it does not start.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to load decoder from {path:?}: {reason}")]
    Decoder { path: PathBuf, reason: String },

    #[error("failed to load image model from {path:?}: {reason}")]
    ImageModel { path: PathBuf, reason: String },

    #[error("failed to load text encoder from {path:?}: {reason}")]
    TextEncoder { path: PathBuf, reason: String },

    #[error("failed to load tokenizer from {path:?}: {reason}")]
    Tokenizer { path: PathBuf, reason: String },

    #[error("failed to load text projection head from {path:?}: {reason}")]
    Projection { path: PathBuf, reason: String },

    #[error("failed to load similarity index from {path:?}: {reason}")]
    Index { path: PathBuf, reason: String },

    /// An extractor's probed output width does not match the configured
    /// embedding dimensionality.
    #[error("{extractor} produced {actual}-dim embeddings, expected {expected}")]
    EmbeddingWidth {
        extractor: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The index was built for a different combined-vector width.
    #[error("similarity index has dimension {actual}, expected {expected} (2x embedding dim)")]
    IndexWidth { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_diagnostics() {
        let err = LoadError::EmbeddingWidth {
            extractor: "image extractor",
            expected: 1000,
            actual: 512,
        };
        let msg = err.to_string();
        assert!(msg.contains("image extractor"));
        assert!(msg.contains("1000"));
        assert!(msg.contains("512"));

        let err = LoadError::Index {
            path: PathBuf::from("/tmp/index.bin"),
            reason: "truncated artifact".to_string(),
        };
        assert!(err.to_string().contains("index.bin"));
        assert!(err.to_string().contains("truncated"));
    }
}
