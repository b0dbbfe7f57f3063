//! Learned 2D positional encoding.
//!
//! Owns a dense `(max, max, dim)` grid of embedding vectors, one per
//! (row, column) coordinate, trained jointly with the rest of the model.
//! Lookup is absolute and top-left anchored: the same coordinate always maps
//! to the same vector regardless of image content or extent, trading
//! generalization to unseen extents for simplicity (sinusoids would be the
//! alternative).

use candle_core::{bail, Result, Tensor};
use candle_nn::{Init, VarBuilder};

pub struct PositionalEncoding2D {
    /// `(max_width_height, max_width_height, dim)` parameter grid.
    embeddings: Tensor,
    dim: usize,
    max_width_height: usize,
}

impl PositionalEncoding2D {
    /// Allocate the grid, initialized from `Normal(0, 1/dim)`.
    pub fn new(dim: usize, max_width_height: usize, vb: VarBuilder) -> Result<Self> {
        let init = Init::Randn {
            mean: 0.0,
            stdev: 1.0 / dim as f64,
        };
        let embeddings = vb.get_with_hints(
            (max_width_height, max_width_height, dim),
            "embeddings",
            init,
        )?;
        Ok(Self {
            embeddings,
            dim,
            max_width_height,
        })
    }

    /// Slice the top-left `(width, height)` sub-grid.
    ///
    /// Returns shape `(1, width, height, dim)`; the leading unit axis lets
    /// the result broadcast-add over any batch size. Requires
    /// `width <= max_width_height` and `height <= max_width_height`.
    pub fn encode(&self, width: usize, height: usize) -> Result<Tensor> {
        if width > self.max_width_height || height > self.max_width_height {
            bail!(
                "positional encoding extent ({width}, {height}) exceeds grid maximum {}",
                self.max_width_height
            );
        }
        self.embeddings
            .narrow(0, 0, width)?
            .narrow(1, 0, height)?
            .unsqueeze(0)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn max_width_height(&self) -> usize {
        self.max_width_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn random_encoding(dim: usize, max: usize) -> PositionalEncoding2D {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        PositionalEncoding2D::new(dim, max, vb).expect("build encoding")
    }

    #[test]
    fn encode_shape() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let pe = PositionalEncoding2D::new(16, 32, vb).expect("build encoding");
        let grid = pe.encode(5, 7).expect("encode");
        assert_eq!(grid.dims(), &[1, 5, 7, 16]);
    }

    #[test]
    fn encode_accepts_full_extent() {
        // The grid itself is usable up to the maximum inclusive; the stricter
        // `<` bound lives in the model's forward precondition.
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let pe = PositionalEncoding2D::new(4, 8, vb).expect("build encoding");
        let grid = pe.encode(8, 8).expect("full-extent encode");
        assert_eq!(grid.dims(), &[1, 8, 8, 4]);
    }

    #[test]
    fn encode_rejects_out_of_range_extent() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let pe = PositionalEncoding2D::new(4, 8, vb).expect("build encoding");
        assert!(pe.encode(9, 4).is_err());
        assert!(pe.encode(4, 9).is_err());
    }

    #[test]
    fn encode_zero_extent() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let pe = PositionalEncoding2D::new(4, 8, vb).expect("build encoding");
        let grid = pe.encode(0, 0).expect("empty encode");
        assert_eq!(grid.dims(), &[1, 0, 0, 4]);
    }

    #[test]
    fn encode_is_deterministic() {
        let pe = random_encoding(8, 16);
        let a = pe.encode(3, 5).expect("first encode");
        let b = pe.encode(3, 5).expect("second encode");
        let a: Vec<f32> = a.flatten_all().unwrap().to_vec1().unwrap();
        let b: Vec<f32> = b.flatten_all().unwrap().to_vec1().unwrap();
        assert_eq!(a, b, "repeated encode must return identical values");
    }

    #[test]
    fn encode_slices_consistently_with_full_grid() {
        let pe = random_encoding(8, 16);
        let full = pe.encode(16, 16).expect("full grid");
        let sub = pe.encode(3, 5).expect("sub grid");
        let expected = full.narrow(1, 0, 3).unwrap().narrow(2, 0, 5).unwrap();
        let sub: Vec<f32> = sub.flatten_all().unwrap().to_vec1().unwrap();
        let expected: Vec<f32> = expected.flatten_all().unwrap().to_vec1().unwrap();
        assert_eq!(sub, expected, "encode(w, h) must be the top-left sub-block");
    }

    #[test]
    fn initialization_is_not_degenerate() {
        // Randn hints must take effect through a VarMap-backed builder.
        let pe = random_encoding(8, 16);
        let values: Vec<f32> = pe
            .encode(16, 16)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();
        assert!(values.iter().any(|v| v.abs() > 1e-8));
    }
}
