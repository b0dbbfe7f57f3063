pub mod image_bert;

pub use image_bert::{ImageBertModel, MAX_WIDTH_HEIGHT};
