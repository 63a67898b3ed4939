//! Benchmarks for the count and contrastive losses.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scloss::prelude::*;

fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize, hi: f32) -> Tensor {
    let data: Vec<f32> = (0..rows * cols).map(|_| rng.gen_range(0.0..hi)).collect();
    Tensor::new(&data, &[rows, cols])
}

fn bench_zinb_forward_backward(c: &mut Criterion) {
    let mut group = c.benchmark_group("zinb_forward_backward");
    let mut rng = StdRng::seed_from_u64(0);

    for genes in [64, 256, 1024].iter() {
        let counts = random_matrix(&mut rng, 32, *genes, 20.0);
        let mu = random_matrix(&mut rng, 32, *genes, 20.0).add_scalar(0.1);
        let theta = Tensor::full(&[*genes], 2.0);
        let pi = random_matrix(&mut rng, 32, *genes, 1.0).add_scalar(-0.5);

        group.bench_with_input(BenchmarkId::from_parameter(genes), genes, |b, _| {
            b.iter(|| {
                clear_graph();
                let mu = mu.clone().requires_grad();
                let loss = zinb(black_box(&counts), &mu, &theta, &pi, 1e-8).unwrap();
                loss.backward();
            });
        });
    }

    group.finish();
}

fn bench_ecs(c: &mut Criterion) {
    let mut group = c.benchmark_group("ecs");
    let mut rng = StdRng::seed_from_u64(1);

    for batch in [16, 64, 128].iter() {
        let emb = random_matrix(&mut rng, *batch, 256, 1.0);
        group.bench_with_input(BenchmarkId::from_parameter(batch), batch, |b, _| {
            b.iter(|| no_grad(|| ecs(black_box(&emb), 0.5).unwrap()));
        });
    }

    group.finish();
}

fn bench_masker(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(2);
    c.bench_function("masker_64x2000", |b| {
        b.iter(|| masker(black_box(2000), 64, 0.15, None, &mut rng).unwrap());
    });
}

criterion_group!(benches, bench_zinb_forward_backward, bench_ecs, bench_masker);
criterion_main!(benches);
