pub mod mask;
pub mod positional;

pub use mask::{apply_pixel_mask, full_attention};
pub use positional::PositionalEncoding2D;
