use thiserror::Error;

/// Errors raised while loading or parsing a model configuration.
///
/// Model-layer code (layers, encoder, forward passes) returns
/// `candle_core::Result` directly; shape mismatches and precondition
/// violations surface as candle errors without extra wrapping.
#[derive(Error, Debug)]
pub enum ImageBertError {
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),
}

pub type Result<T> = std::result::Result<T, ImageBertError>;
