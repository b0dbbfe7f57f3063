use serde::Deserialize;

use crate::error::Result;

/// Configuration for the image transformer and its bundled encoder.
///
/// Mirrors the flat JSON dictionary the model is constructed from:
/// `hidden_size` and the encoder fields are required, everything else is
/// collected into `extra` and passed through untouched. A document missing
/// `hidden_size` fails here, at parse time, not at forward time.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageBertConfig {
    /// Dimensionality of the shared token embedding space.
    pub hidden_size: usize,
    pub num_attention_heads: usize,
    pub num_hidden_layers: usize,
    /// FFN inner dimension of each encoder block.
    pub intermediate_size: usize,
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_layer_norm_eps() -> f64 {
    1e-12
}

impl ImageBertConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}

impl Default for ImageBertConfig {
    fn default() -> Self {
        Self {
            hidden_size: 256,
            num_attention_heads: 4,
            num_hidden_layers: 4,
            intermediate_size: 1024,
            layer_norm_eps: 1e-12,
            extra: serde_json::Map::new(),
        }
    }
}
