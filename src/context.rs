//! The immutable service context.
//!
//! All startup artifacts live here: the label decoder, both feature
//! extractors, and the similarity index. The context is constructed exactly
//! once in `main`, shared with every request handler behind an `Arc`, and
//! dropped at process exit. There is no reload path and no other shared
//! mutable state between requests.

use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::decoder::Decoder;
use crate::embed::{ImageEncoder, TextEncoder};
use crate::error::LoadError;
use crate::index::FlatIndex;

#[derive(Debug)]
pub struct ServiceContext {
    pub config: Config,
    pub image_encoder: ImageEncoder,
    pub text_encoder: TextEncoder,
    pub index: FlatIndex,
}

impl ServiceContext {
    /// Load every artifact and validate the embedding-width invariants.
    ///
    /// Any failure is returned as a typed [`LoadError`] so the process entry
    /// point can log the diagnostic and abort; there is no partial startup.
    pub fn load(config: Config) -> Result<Self, LoadError> {
        let decoder = Arc::new(Decoder::load(&config.models.decoder)?);
        info!(
            path = ?config.models.decoder,
            labels = decoder.len(),
            "Decoder loaded"
        );

        let image_encoder = ImageEncoder::load(&config.models, Arc::clone(&decoder))?;
        info!(path = ?config.models.image_model, "Image model loaded");

        let text_encoder = TextEncoder::load(&config.models, Arc::clone(&decoder))?;
        info!(path = ?config.models.text_encoder, "Text model loaded");

        let index = FlatIndex::load(&config.index.path)?;
        info!(
            path = ?config.index.path,
            rows = index.len(),
            dimension = index.dimension(),
            "Similarity index loaded"
        );

        let context = Self {
            config,
            image_encoder,
            text_encoder,
            index,
        };
        context.validate_dimensions()?;

        Ok(context)
    }

    /// Both extractors share the configured output width by convention, not
    /// by architecture, so it is probed once with a real forward pass and
    /// checked against the index before the server starts.
    fn validate_dimensions(&self) -> Result<(), LoadError> {
        let expected = self.config.models.embedding_dim;

        let image_dim = self
            .image_encoder
            .probe_dim(self.config.models.image_size)
            .map_err(|e| LoadError::ImageModel {
                path: self.config.models.image_model.clone(),
                reason: format!("probe inference failed: {}", e),
            })?;
        if image_dim != expected {
            return Err(LoadError::EmbeddingWidth {
                extractor: "image extractor",
                expected,
                actual: image_dim,
            });
        }

        let text_dim = self.text_encoder.probe_dim().map_err(|e| {
            LoadError::TextEncoder {
                path: self.config.models.text_encoder.clone(),
                reason: format!("probe inference failed: {}", e),
            }
        })?;
        if text_dim != expected {
            return Err(LoadError::EmbeddingWidth {
                extractor: "text extractor",
                expected,
                actual: text_dim,
            });
        }

        if self.index.dimension() != 2 * expected {
            return Err(LoadError::IndexWidth {
                expected: 2 * expected,
                actual: self.index.dimension(),
            });
        }

        info!(
            embedding_dim = expected,
            combined_dim = 2 * expected,
            "Embedding dimensions validated"
        );
        Ok(())
    }
}
