//! Criterion benchmarks for the image forward pass on CPU, across a few
//! spatial extents with and without a pixel mask.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use imagebert_core::{ImageBertConfig, ImageBertModel};

fn bench_model() -> ImageBertModel {
    let cfg = ImageBertConfig {
        hidden_size: 32,
        num_attention_heads: 2,
        num_hidden_layers: 2,
        intermediate_size: 64,
        ..Default::default()
    };
    let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
    ImageBertModel::new(&cfg, 10, vb).expect("build model")
}

fn bench_forward(c: &mut Criterion) {
    let model = bench_model();
    let mut group = c.benchmark_group("forward");

    for &extent in &[8usize, 16, 32] {
        let images = Tensor::randn(0f32, 1f32, (1, 3, extent, extent), &Device::Cpu)
            .expect("image batch");
        group.bench_with_input(BenchmarkId::new("extent", extent), &extent, |b, _| {
            b.iter(|| model.forward(black_box(&images), None).expect("forward"));
        });
    }
    group.finish();
}

fn bench_forward_masked(c: &mut Criterion) {
    let model = bench_model();
    let mut group = c.benchmark_group("forward_masked");

    for &extent in &[8usize, 16] {
        let images = Tensor::randn(0f32, 1f32, (1, 3, extent, extent), &Device::Cpu)
            .expect("image batch");
        let mask = Tensor::zeros((1, extent, extent), DType::U8, &Device::Cpu).expect("mask");
        group.bench_with_input(BenchmarkId::new("extent", extent), &extent, |b, _| {
            b.iter(|| {
                model
                    .forward(black_box(&images), Some(black_box(&mask)))
                    .expect("forward")
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_forward, bench_forward_masked);
criterion_main!(benches);
