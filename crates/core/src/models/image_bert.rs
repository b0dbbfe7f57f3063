//! Image transformer: per-pixel tokens through a sequence encoder.
//!
//! Forward composition for one `(batch, 3, width, height)` image batch:
//!
//! 1. permute to channels-last and project RGB → hidden ("upscale")
//! 2. replace occluded pixels with the learned mask embedding (pure select)
//! 3. add the learned 2D positional encoding
//! 4. flatten row-major and prepend the learned cls token (seq = w·h + 1)
//! 5. run the encoder, final layer only
//! 6. classifier head on position 0, pixelizer head on positions 1..,
//!    reshaped back to channels-first
//!
//! Stateless across calls: the only state is the parameter set, read-only
//! during forward.

use candle_core::{bail, Module, Result, Tensor};
use candle_nn::{linear, Init, Linear, VarBuilder};
use tracing::debug;

use crate::config::ImageBertConfig;
use crate::encoder::{BertStyleEncoder, SequenceEncoder};
use crate::layers::{apply_pixel_mask, full_attention, PositionalEncoding2D};

/// Maximum spatial extent of the positional grid.
pub const MAX_WIDTH_HEIGHT: usize = 500;

const NUM_CHANNELS_IN: usize = 3;
const NUM_CHANNELS_OUT: usize = 3;

pub struct ImageBertModel {
    upscale: Linear,
    positional_encoding: PositionalEncoding2D,
    encoder: Box<dyn SequenceEncoder>,
    classifier: Linear,
    pixelizer: Linear,
    /// Learned vector substituted at occluded pixel positions.
    mask_embedding: Tensor,
    /// Learned vector prepended as the classification token.
    cls_embedding: Tensor,
    /// Degenerate "attend everywhere" buffer, scalar 1.0. Overridable per
    /// call through [`forward_with_attention`](Self::forward_with_attention).
    attention_mask: Tensor,
    hidden_size: usize,
}

impl ImageBertModel {
    /// Build the model with the bundled [`BertStyleEncoder`].
    pub fn new(cfg: &ImageBertConfig, num_classes: usize, vb: VarBuilder) -> Result<Self> {
        let encoder = Box::new(BertStyleEncoder::new(cfg, vb.pp("encoder"))?);
        Self::with_encoder(cfg, num_classes, encoder, vb)
    }

    /// Build the model around an injected encoder.
    pub fn with_encoder(
        cfg: &ImageBertConfig,
        num_classes: usize,
        encoder: Box<dyn SequenceEncoder>,
        vb: VarBuilder,
    ) -> Result<Self> {
        let hidden_size = cfg.hidden_size;
        debug!(hidden_size, num_classes, "building image transformer");

        let upscale = linear(NUM_CHANNELS_IN, hidden_size, vb.pp("upscale"))?;
        let positional_encoding = PositionalEncoding2D::new(
            hidden_size,
            MAX_WIDTH_HEIGHT,
            vb.pp("positional_encoding"),
        )?;
        let classifier = linear(hidden_size, num_classes, vb.pp("classifier"))?;
        let pixelizer = linear(hidden_size, NUM_CHANNELS_OUT, vb.pp("pixelizer"))?;

        let embedding_init = Init::Randn {
            mean: 0.0,
            stdev: 0.01,
        };
        let mask_embedding = vb.get_with_hints(hidden_size, "mask_embedding", embedding_init)?;
        let cls_embedding = vb.get_with_hints(hidden_size, "cls_embedding", embedding_init)?;
        let attention_mask = full_attention(vb.device())?;

        Ok(Self {
            upscale,
            positional_encoding,
            encoder,
            classifier,
            pixelizer,
            mask_embedding,
            cls_embedding,
            attention_mask,
            hidden_size,
        })
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn mask_embedding(&self) -> &Tensor {
        &self.mask_embedding
    }

    /// Classify and reconstruct one image batch.
    ///
    /// `images` is `(batch, 3, width, height)` f32; `pixel_mask`, when given,
    /// is `(batch, width, height)` u8 with nonzero marking observed pixels.
    /// Returns `(logits, reconstruction)` shaped `(batch, num_classes)` and
    /// `(batch, 3, width, height)`.
    pub fn forward(&self, images: &Tensor, pixel_mask: Option<&Tensor>) -> Result<(Tensor, Tensor)> {
        self.forward_with_attention(images, pixel_mask, None)
    }

    /// Same as [`forward`](Self::forward) but with the encoder attention mask
    /// overridden; `None` uses the constant attend-everywhere buffer.
    pub fn forward_with_attention(
        &self,
        images: &Tensor,
        pixel_mask: Option<&Tensor>,
        attention_mask: Option<&Tensor>,
    ) -> Result<(Tensor, Tensor)> {
        let (batch_size, _channels, width, height) = images.dims4()?;

        // Deliberately strict `<`: extent 500 is rejected even though the
        // grid has a valid row/col 499 (its own bound is inclusive).
        if width >= MAX_WIDTH_HEIGHT || height >= MAX_WIDTH_HEIGHT {
            bail!(
                "image extent ({width}, {height}) must be strictly below {MAX_WIDTH_HEIGHT}"
            );
        }

        // NCHW → NHWC, then project channels into the hidden space
        let hidden = images.permute((0, 2, 3, 1))?.contiguous()?;
        let hidden = self.upscale.forward(&hidden)?;

        let hidden = match pixel_mask {
            Some(mask) => apply_pixel_mask(&hidden, mask, &self.mask_embedding)?,
            None => hidden,
        };

        let hidden =
            hidden.broadcast_add(&self.positional_encoding.encode(width, height)?)?;

        // Flatten row-major and prepend the cls token: seq = w·h + 1
        let pixels = hidden.reshape((batch_size, width * height, self.hidden_size))?;
        let cls = self
            .cls_embedding
            .unsqueeze(0)?
            .unsqueeze(0)?
            .broadcast_as((batch_size, 1, self.hidden_size))?
            .contiguous()?;
        let sequence = Tensor::cat(&[&cls, &pixels], 1)?;

        let attention_mask = attention_mask.unwrap_or(&self.attention_mask);
        let mut encoded = self.encoder.encode(&sequence, attention_mask, false)?;
        let representations = match encoded.pop() {
            Some(t) => t,
            None => bail!("encoder returned no layer outputs"),
        };

        let cls_representation = representations.narrow(1, 0, 1)?.squeeze(1)?;
        let logits = self.classifier.forward(&cls_representation)?;

        let pixel_representations = representations.narrow(1, 1, width * height)?;
        let reconstruction = self
            .pixelizer
            .forward(&pixel_representations)?
            .reshape((batch_size, width, height, NUM_CHANNELS_OUT))?
            .permute((0, 3, 1, 2))?;

        Ok((logits, reconstruction))
    }
}
