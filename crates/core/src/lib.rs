//! Image transformer over per-pixel tokens.
//!
//! An image is flattened into a sequence of pixel "tokens" (one token per
//! spatial position, projected from RGB into the hidden space), augmented
//! with a learned 2D positional embedding and a prepended classification
//! token, then run through a BERT-style bidirectional encoder. Two heads
//! read the encoder output:
//!
//! - **classifier**: position 0 (the cls token) → class logits
//! - **pixelizer**: positions 1.. → reconstructed RGB values per pixel
//!
//! Pixels hidden by an occlusion mask are replaced with a learned mask
//! embedding before encoding, so the model can be trained on inpainting-style
//! reconstruction jointly with classification.
//!
//! The encoder is a collaborator behind the [`SequenceEncoder`] trait; the
//! bundled [`BertStyleEncoder`] is the default, but any sequence-in /
//! sequence-out encoder can be injected instead.

pub mod config;
pub mod encoder;
pub mod error;
pub mod layers;
pub mod models;

pub use config::ImageBertConfig;
pub use encoder::{BertStyleEncoder, SequenceEncoder};
pub use error::ImageBertError;
pub use layers::{apply_pixel_mask, full_attention, PositionalEncoding2D};
pub use models::{ImageBertModel, MAX_WIDTH_HEIGHT};
