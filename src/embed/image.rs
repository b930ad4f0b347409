//! Image feature extraction using a frozen classification backbone.

use anyhow::{anyhow, Result};
use ndarray::Array4;
use ort::value::Tensor;
use std::sync::{Arc, Mutex};

use crate::config::ModelConfig;
use crate::decoder::Decoder;
use crate::error::LoadError;

use super::build_session;

/// Deterministic mapping from a preprocessed image tensor to a fixed-width
/// embedding: the raw logit vector of a 1000-way classification backbone.
/// No softmax, no top-k reduction.
pub struct ImageEncoder {
    session: Mutex<ort::session::Session>,
    #[allow(dead_code)]
    decoder: Arc<Decoder>,
}

impl ImageEncoder {
    /// Load the backbone graph. A missing or incompatible graph file is a
    /// startup-fatal error; the process cannot serve without it.
    pub fn load(config: &ModelConfig, decoder: Arc<Decoder>) -> Result<Self, LoadError> {
        let session = build_session(&config.image_model, config.intra_threads).map_err(|e| {
            LoadError::ImageModel {
                path: config.image_model.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            session: Mutex::new(session),
            decoder,
        })
    }

    /// Run the frozen forward pass and return the raw logits.
    pub fn embed(&self, tensor: Array4<f32>) -> Result<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("Failed to lock image model: {}", e))?;

        let (batch, channels, height, width) = tensor.dim();
        let (data, _) = tensor.into_raw_vec_and_offset();

        let input = Tensor::from_array(([batch, channels, height, width], data.into_boxed_slice()))?;

        let outputs = session.run(ort::inputs!["input" => input])?;

        let logits_output = outputs
            .iter()
            .next()
            .ok_or_else(|| anyhow!("Image model produced no outputs"))?;

        let (_shape, logits) = logits_output.1.try_extract_tensor::<f32>()?;

        Ok(logits.to_vec())
    }

    /// Probe the model's output width with an all-zero canvas. Used once at
    /// startup to validate the configured embedding dimensionality.
    pub fn probe_dim(&self, image_size: u32) -> Result<usize> {
        let size = image_size as usize;
        let tensor = Array4::<f32>::zeros((1, 3, size, size));
        Ok(self.embed(tensor)?.len())
    }
}

impl std::fmt::Debug for ImageEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageEncoder").finish_non_exhaustive()
    }
}
