//! Text feature extraction: cased subword tokenizer, frozen transformer
//! encoder, and the trained linear projection head that widens the pooled
//! representation to the image embedding's dimensionality.

use anyhow::{anyhow, Result};
use ndarray::{Array1, Array2, ArrayView1};
use ort::value::Tensor;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::Tokenizer;

use crate::config::ModelConfig;
use crate::decoder::Decoder;
use crate::error::LoadError;

use super::build_session;

/// Serialized form of the trained projection head.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionWeights {
    pub in_dim: u32,
    pub out_dim: u32,
    /// Row-major `out_dim x in_dim`.
    pub weight: Vec<f32>,
    pub bias: Vec<f32>,
}

/// The trained dropout+linear head. Dropout is identity at inference, so
/// only the linear map is applied here.
#[derive(Debug)]
pub struct Projection {
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl Projection {
    /// Load the head from its bincode artifact. Startup-fatal on a missing
    /// file, decode failure, or inconsistent stated dimensions.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path).map_err(|e| LoadError::Projection {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let (weights, _): (ProjectionWeights, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard()).map_err(
                |e| LoadError::Projection {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                },
            )?;

        Self::from_weights(weights).map_err(|reason| LoadError::Projection {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_weights(weights: ProjectionWeights) -> Result<Self, String> {
        let in_dim = weights.in_dim as usize;
        let out_dim = weights.out_dim as usize;

        if weights.weight.len() != in_dim * out_dim {
            return Err(format!(
                "weight matrix has {} values, expected {}x{}",
                weights.weight.len(),
                out_dim,
                in_dim
            ));
        }
        if weights.bias.len() != out_dim {
            return Err(format!(
                "bias has {} values, expected {}",
                weights.bias.len(),
                out_dim
            ));
        }

        let weight = Array2::from_shape_vec((out_dim, in_dim), weights.weight)
            .map_err(|e| e.to_string())?;
        let bias = Array1::from_vec(weights.bias);

        Ok(Self { weight, bias })
    }

    pub fn input_dim(&self) -> usize {
        self.weight.ncols()
    }

    pub fn output_dim(&self) -> usize {
        self.weight.nrows()
    }

    pub fn apply(&self, pooled: ArrayView1<'_, f32>) -> Array1<f32> {
        self.weight.dot(&pooled) + &self.bias
    }
}

/// Deterministic mapping from raw text to a fixed-width embedding.
///
/// The encoder's parameters are frozen; only the projection head was ever
/// trained.
pub struct TextEncoder {
    session: Mutex<ort::session::Session>,
    tokenizer: Tokenizer,
    projection: Projection,
    #[allow(dead_code)]
    decoder: Arc<Decoder>,
}

impl TextEncoder {
    /// Load the tokenizer, the frozen encoder graph, and the projection
    /// head. Any failure is startup-fatal.
    pub fn load(config: &ModelConfig, decoder: Arc<Decoder>) -> Result<Self, LoadError> {
        let tokenizer = Tokenizer::from_file(&config.tokenizer).map_err(|e| {
            LoadError::Tokenizer {
                path: config.tokenizer.clone(),
                reason: e.to_string(),
            }
        })?;

        let session = build_session(&config.text_encoder, config.intra_threads).map_err(|e| {
            LoadError::TextEncoder {
                path: config.text_encoder.clone(),
                reason: e.to_string(),
            }
        })?;

        let projection = Projection::load(&config.text_projection)?;

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            projection,
            decoder,
        })
    }

    /// Tokenize, run the frozen encoder, and project the pooled output.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let seq_len = input_ids.len();

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("Failed to lock text encoder: {}", e))?;

        let ids_tensor = Tensor::from_array(([1usize, seq_len], input_ids.into_boxed_slice()))?;
        let mask_tensor =
            Tensor::from_array(([1usize, seq_len], attention_mask.into_boxed_slice()))?;

        let outputs = session.run(ort::inputs![
            "input_ids" => ids_tensor,
            "attention_mask" => mask_tensor,
        ])?;

        let pooled_output = outputs
            .get("pooler_output")
            .ok_or_else(|| anyhow!("Text encoder produced no pooler_output"))?;

        let (_shape, pooled) = pooled_output.try_extract_tensor::<f32>()?;

        if pooled.len() != self.projection.input_dim() {
            return Err(anyhow!(
                "Pooled output has {} values, projection head expects {}",
                pooled.len(),
                self.projection.input_dim()
            ));
        }

        let embedding = self.projection.apply(ArrayView1::from(pooled));
        Ok(embedding.to_vec())
    }

    /// Probe the full pipeline's output width. Used once at startup to
    /// validate the configured embedding dimensionality.
    pub fn probe_dim(&self) -> Result<usize> {
        Ok(self.embed("probe")?.len())
    }
}

impl std::fmt::Debug for TextEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextEncoder")
            .field("projection_out", &self.projection.output_dim())
            .finish_non_exhaustive()
    }
}
