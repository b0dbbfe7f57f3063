//! Sequence encoder seam and the bundled BERT-style implementation.
//!
//! The image model only needs a narrow contract from its encoder: hidden
//! states in, per-position representations out, with an optional request for
//! every intermediate layer. [`SequenceEncoder`] captures exactly that, so
//! the bundled [`BertStyleEncoder`] can be swapped for any other
//! implementation without touching the image plumbing.
//!
//! `BertStyleEncoder` is an encoder-only stack of post-norm blocks:
//! bidirectional self-attention (no causal mask), dense + LayerNorm +
//! residual after both the attention and the GELU FFN, all linear layers
//! with bias. The attention mask arrives as "1 = attend" values and is folded
//! into the scores as an additive `(1 - mask) * -10000` bias, so the scalar
//! `1.0` placeholder used for fully-populated pixel sequences is a no-op
//! while a real `(batch, 1, 1, seq)` padding mask is honored unchanged.

use candle_core::{DType, Module, Result, Tensor};
use candle_nn::{layer_norm, linear, LayerNorm, Linear, VarBuilder};

use crate::config::ImageBertConfig;

/// Narrow interface the image model requires from its encoder.
pub trait SequenceEncoder: Send + Sync {
    /// Encode a `(batch, seq, dim)` token sequence.
    ///
    /// When `output_all_layers` is false the returned vector holds exactly
    /// one tensor, the final layer's output; otherwise one `(batch, seq,
    /// dim)` tensor per layer, in depth order.
    fn encode(
        &self,
        hidden_states: &Tensor,
        attention_mask: &Tensor,
        output_all_layers: bool,
    ) -> Result<Vec<Tensor>>;
}

// ─── Self-attention ──────────────────────────────────────────────────────────

struct SelfAttention {
    query: Linear,
    key: Linear,
    value: Linear,
    num_heads: usize,
    head_dim: usize,
    scale: f64,
}

impl SelfAttention {
    fn new(hidden_size: usize, num_heads: usize, vb: VarBuilder) -> Result<Self> {
        let head_dim = hidden_size / num_heads;
        Ok(Self {
            query: linear(hidden_size, hidden_size, vb.pp("query"))?,
            key: linear(hidden_size, hidden_size, vb.pp("key"))?,
            value: linear(hidden_size, hidden_size, vb.pp("value"))?,
            num_heads,
            head_dim,
            scale: (head_dim as f64).powf(-0.5),
        })
    }

    /// `x`: `(batch, seq, dim)`; `bias` broadcasts onto the
    /// `(batch, heads, seq, seq)` score tensor.
    fn forward(&self, x: &Tensor, bias: &Tensor) -> Result<Tensor> {
        let (batch_size, seq_len, _dim) = x.dims3()?;
        let split = |t: Tensor| -> Result<Tensor> {
            t.reshape((batch_size, seq_len, self.num_heads, self.head_dim))?
                .transpose(1, 2)?
                .contiguous()
        };
        let q = split(self.query.forward(x)?)?;
        let k = split(self.key.forward(x)?)?;
        let v = split(self.value.forward(x)?)?;

        let scores = (q.matmul(&k.transpose(2, 3)?.contiguous()?)? * self.scale)?;
        let scores = scores.broadcast_add(bias)?;
        let weights = candle_nn::ops::softmax_last_dim(&scores)?;

        weights
            .matmul(&v)?
            .transpose(1, 2)?
            .reshape((batch_size, seq_len, self.num_heads * self.head_dim))
    }
}

// ─── Post-norm residual projection ───────────────────────────────────────────

/// dense → add residual → LayerNorm, shared by the attention output and the
/// FFN output halves of each block.
struct AddNorm {
    dense: Linear,
    norm: LayerNorm,
}

impl AddNorm {
    fn new(in_dim: usize, out_dim: usize, eps: f64, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            dense: linear(in_dim, out_dim, vb.pp("dense"))?,
            norm: layer_norm(out_dim, eps, vb.pp("norm"))?,
        })
    }

    fn forward(&self, x: &Tensor, residual: &Tensor) -> Result<Tensor> {
        self.norm.forward(&(self.dense.forward(x)? + residual)?)
    }
}

// ─── Encoder block ───────────────────────────────────────────────────────────

struct EncoderBlock {
    attention: SelfAttention,
    attention_out: AddNorm,
    intermediate: Linear,
    ffn_out: AddNorm,
}

impl EncoderBlock {
    fn new(cfg: &ImageBertConfig, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            attention: SelfAttention::new(
                cfg.hidden_size,
                cfg.num_attention_heads,
                vb.pp("attention"),
            )?,
            attention_out: AddNorm::new(
                cfg.hidden_size,
                cfg.hidden_size,
                cfg.layer_norm_eps,
                vb.pp("attention_output"),
            )?,
            intermediate: linear(cfg.hidden_size, cfg.intermediate_size, vb.pp("intermediate"))?,
            ffn_out: AddNorm::new(
                cfg.intermediate_size,
                cfg.hidden_size,
                cfg.layer_norm_eps,
                vb.pp("output"),
            )?,
        })
    }

    fn forward(&self, x: &Tensor, bias: &Tensor) -> Result<Tensor> {
        let attn = self.attention.forward(x, bias)?;
        let x = self.attention_out.forward(&attn, x)?;
        let inter = self.intermediate.forward(&x)?.gelu_erf()?;
        self.ffn_out.forward(&inter, &x)
    }
}

// ─── Encoder stack ───────────────────────────────────────────────────────────

pub struct BertStyleEncoder {
    blocks: Vec<EncoderBlock>,
}

impl BertStyleEncoder {
    pub fn new(cfg: &ImageBertConfig, vb: VarBuilder) -> Result<Self> {
        let mut blocks = Vec::with_capacity(cfg.num_hidden_layers);
        for i in 0..cfg.num_hidden_layers {
            blocks.push(EncoderBlock::new(cfg, vb.pp(format!("layer.{i}")))?);
        }
        Ok(Self { blocks })
    }

    pub fn num_layers(&self) -> usize {
        self.blocks.len()
    }
}

impl SequenceEncoder for BertStyleEncoder {
    fn encode(
        &self,
        hidden_states: &Tensor,
        attention_mask: &Tensor,
        output_all_layers: bool,
    ) -> Result<Vec<Tensor>> {
        // (1 - mask) * -10000 == mask * 10000 - 10000
        let bias = attention_mask
            .to_dtype(DType::F32)?
            .affine(10000.0, -10000.0)?;

        let mut x = hidden_states.clone();
        let mut layers = Vec::new();
        for block in &self.blocks {
            x = block.forward(&x, &bias)?;
            if output_all_layers {
                layers.push(x.clone());
            }
        }
        if !output_all_layers {
            layers.push(x);
        }
        Ok(layers)
    }
}
