use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub models: ModelConfig,

    #[serde(default)]
    pub index: IndexConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// ONNX graph for the image classification backbone.
    #[serde(default = "default_image_model_path")]
    pub image_model: PathBuf,

    /// ONNX graph for the frozen text encoder.
    #[serde(default = "default_text_encoder_path")]
    pub text_encoder: PathBuf,

    /// Trained projection head (pooled 768 -> embedding_dim).
    #[serde(default = "default_projection_path")]
    pub text_projection: PathBuf,

    /// tokenizers JSON file (cased vocabulary).
    #[serde(default = "default_tokenizer_path")]
    pub tokenizer: PathBuf,

    /// Label decoder artifact, handed to both extractors.
    #[serde(default = "default_decoder_path")]
    pub decoder: PathBuf,

    /// Output width both extractors must produce.
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    /// Square canvas size for image preprocessing.
    #[serde(default = "default_image_size")]
    pub image_size: u32,

    /// Intra-op thread count for ONNX Runtime sessions.
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

fn models_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("visim")
        .join("models")
}

fn default_image_model_path() -> PathBuf {
    models_dir().join("resnet50-logits.onnx")
}

fn default_text_encoder_path() -> PathBuf {
    models_dir().join("bert-base-cased.onnx")
}

fn default_projection_path() -> PathBuf {
    models_dir().join("text-projection.bin")
}

fn default_tokenizer_path() -> PathBuf {
    models_dir().join("tokenizer.json")
}

fn default_decoder_path() -> PathBuf {
    models_dir().join("decoder.json")
}

fn default_embedding_dim() -> usize {
    1000
}

fn default_image_size() -> u32 {
    224
}

fn default_intra_threads() -> usize {
    4
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            image_model: default_image_model_path(),
            text_encoder: default_text_encoder_path(),
            text_projection: default_projection_path(),
            tokenizer: default_tokenizer_path(),
            decoder: default_decoder_path(),
            embedding_dim: default_embedding_dim(),
            image_size: default_image_size(),
            intra_threads: default_intra_threads(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Pre-built similarity index artifact.
    #[serde(default = "default_index_path")]
    pub path: PathBuf,

    /// Neighbours returned by the combined search endpoint.
    #[serde(default = "default_neighbors")]
    pub neighbors: usize,
}

fn default_index_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("visim")
        .join("index.bin")
}

fn default_neighbors() -> usize {
    3
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            neighbors: default_neighbors(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            models: ModelConfig::default(),
            index: IndexConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    pub fn load_from(path: PathBuf) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            tracing::warn!(path = ?path, "Config file not found, using defaults");
            Ok(Config::default())
        }
    }

    fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("VISIM_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("visim")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.models.embedding_dim, 1000);
        assert_eq!(config.models.image_size, 224);
        assert_eq!(config.index.neighbors, 3);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9000

            [index]
            neighbors = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.index.neighbors, 5);
        assert_eq!(config.models.embedding_dim, 1000);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.models.image_model, config.models.image_model);
        assert_eq!(parsed.index.path, config.index.path);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.server.port, 8080);
    }
}
