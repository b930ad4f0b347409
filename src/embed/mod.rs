//! Feature extraction models.
//!
//! Both extractors wrap a frozen ONNX Runtime session and emit embeddings of
//! the same configured width so image and text vectors can be concatenated
//! into a single combined query.

pub mod image;
pub mod text;

pub use image::ImageEncoder;
pub use text::{Projection, TextEncoder};

use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;

/// Build an inference session with the shared options.
///
/// With the `cuda` feature the CUDA execution provider is registered;
/// ONNX Runtime falls back to CPU when no device is available. Either way
/// the binding is fixed for the session's lifetime.
pub(crate) fn build_session(path: &Path, intra_threads: usize) -> Result<Session, ort::Error> {
    let mut builder = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?;

    #[cfg(feature = "cuda")]
    let builder = builder.with_execution_providers([
        ort::execution_providers::CUDAExecutionProvider::default().build(),
    ])?;

    builder.commit_from_file(path)
}

/// Concatenate an image embedding and a text embedding into the combined
/// query vector, image first.
pub fn combined_query(image: &[f32], text: &[f32]) -> Vec<f32> {
    let mut combined = Vec::with_capacity(image.len() + text.len());
    combined.extend_from_slice(image);
    combined.extend_from_slice(text);
    combined
}
