//! Pixel-occlusion and attention-mask helpers.

use candle_core::{Device, Result, Tensor, D};

/// Replace occluded positions with the mask embedding.
///
/// `hidden` is `(batch, width, height, dim)`; `pixel_mask` is a
/// `(batch, width, height)` u8 tensor where nonzero marks an observed pixel.
/// Returns a tensor equal to `hidden` at observed positions and equal to the
/// broadcast `mask_embedding` (`(dim,)`) everywhere else.
///
/// This is a pure select, not a blend and not an in-place write: the masked
/// position's original projection contributes nothing to the result.
pub fn apply_pixel_mask(
    hidden: &Tensor,
    pixel_mask: &Tensor,
    mask_embedding: &Tensor,
) -> Result<Tensor> {
    let observed = pixel_mask
        .unsqueeze(D::Minus1)?
        .broadcast_as(hidden.shape())?;
    let fill = mask_embedding.broadcast_as(hidden.shape())?;
    observed.where_cond(hidden, &fill)
}

/// The degenerate "attend everywhere" attention mask: a scalar `1.0`.
///
/// Pixel sequences are always fully populated, so this constant stands in
/// where a per-position padding mask would go. Callers that do need padding
/// semantics can pass a real `(batch, 1, 1, seq)` mask instead (see
/// `ImageBertModel::forward_with_attention`).
pub fn full_attention(device: &Device) -> Result<Tensor> {
    Tensor::new(1.0f32, device)
}
