//! Property-based tests using proptest.
//!
//! These tests verify invariants of the losses and sampling utilities.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use scloss::prelude::*;

// Rows with a norm comfortably away from zero
fn embedding_strategy(rows: usize, cols: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-5.0f32..5.0, rows * cols).prop_filter(
        "rows must not be near zero",
        move |data| {
            data.chunks(cols)
                .all(|row| row.iter().map(|v| v * v).sum::<f32>() > 0.25)
        },
    )
}

fn counts_strategy(len: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(0u32..30, len).prop_map(|v| v.into_iter().map(|c| c as f32).collect())
}

/// Rotate every row by `angle` in the plane of the first two axes.
fn rotate(data: &[f32], cols: usize, angle: f32) -> Vec<f32> {
    let (s, c) = angle.sin_cos();
    data.chunks(cols)
        .flat_map(|row| {
            let mut out = row.to_vec();
            out[0] = c * row[0] - s * row[1];
            out[1] = s * row[0] + c * row[1];
            out
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn ecs_invariant_to_rotation_and_row_scaling(
        data in embedding_strategy(4, 3),
        angle in 0.0f32..std::f32::consts::TAU,
        scales in proptest::collection::vec(0.1f32..10.0, 4),
        threshold in 0.0f32..1.0,
    ) {
        let base = ecs(&Tensor::new(&data, &[4, 3]), threshold).unwrap().item();

        let mut moved = rotate(&data, 3, angle);
        for (row, s) in moved.chunks_mut(3).zip(&scales) {
            row.iter_mut().for_each(|v| *v *= s);
        }
        let transformed = ecs(&Tensor::new(&moved, &[4, 3]), threshold).unwrap().item();
        prop_assert!((base - transformed).abs() < 1e-4, "{} vs {}", base, transformed);
    }

    #[test]
    fn masked_mse_with_full_mask_is_plain_mse(
        x in proptest::collection::vec(-10.0f32..10.0, 12),
        y in proptest::collection::vec(-10.0f32..10.0, 12),
    ) {
        let loss = masked_mse(
            &Tensor::new(&x, &[3, 4]),
            &Tensor::new(&y, &[3, 4]),
            &Mask::full(&[3, 4], true),
        )
        .unwrap();
        let expected = x.iter().zip(&y).map(|(a, b)| (a - b).powi(2)).sum::<f32>() / 12.0;
        prop_assert!((loss.item() - expected).abs() < 1e-3 * expected.max(1.0));
    }

    #[test]
    fn zinb_without_inflation_matches_nb(
        counts in counts_strategy(6),
        mu in proptest::collection::vec(0.1f32..20.0, 6),
        theta in proptest::collection::vec(0.1f32..10.0, 6),
    ) {
        let x = Tensor::new(&counts, &[2, 3]);
        let mu = Tensor::new(&mu, &[2, 3]);
        let theta = Tensor::new(&theta, &[2, 3]);
        let pi = Tensor::full(&[2, 3], f32::NEG_INFINITY);

        let z = zinb(&x, &mu, &theta, &pi, 1e-8).unwrap().item();
        let n = nb(&x, &mu, &theta, 1e-8).unwrap().item();
        prop_assert!((z - n).abs() < 1e-4 * n.abs().max(1.0), "zinb {} vs nb {}", z, n);
    }

    #[test]
    fn nb_nll_is_non_negative(
        counts in counts_strategy(8),
        mu in proptest::collection::vec(0.1f32..20.0, 8),
        theta in 0.2f32..10.0,
    ) {
        let nll = nb_nll(
            &Tensor::new(&counts, &[2, 4]),
            &Tensor::new(&mu, &[2, 4]),
            &Tensor::full(&[4], theta),
            1e-8,
        )
        .unwrap();
        prop_assert!(nll.data().iter().all(|v| *v > -1e-4));
    }

    #[test]
    fn masker_marks_distinct_positions(
        length in 1usize..200,
        batch in 1usize..5,
        ratio in 0.0f32..1.0,
        seed in any::<u64>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mask = masker(length, batch, ratio, None, &mut rng).unwrap();
        let expected = (length as f32 * ratio).floor() as usize;
        for row in mask.data().chunks(length) {
            prop_assert_eq!(row.iter().filter(|&&m| m).count(), expected);
        }
    }

    #[test]
    fn grad_reverse_scales_gradient(
        data in proptest::collection::vec(-3.0f32..3.0, 5),
        upstream in proptest::collection::vec(-3.0f32..3.0, 5),
        lambd in 0.0f32..4.0,
    ) {
        clear_graph();
        let x = Tensor::from_slice(&data).requires_grad();
        let y = grad_reverse(&x, lambd);
        prop_assert_eq!(y.data(), x.data());

        y.mul(&Tensor::from_slice(&upstream)).sum().backward();
        let grad = get_grad(x.id()).expect("gradient");
        for (g, u) in grad.data().iter().zip(&upstream) {
            prop_assert!((g + lambd * u).abs() < 1e-5);
        }
    }

    #[test]
    fn downsample_never_adds_counts(
        counts in counts_strategy(20),
        renoise in 0.0f32..1.0,
        seed in any::<u64>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mat = Tensor::new(&counts, &[4, 5]);
        let out = downsample_profile(&mat, renoise, &mut rng).unwrap();
        for (o, i) in out.data().iter().zip(mat.data()) {
            prop_assert!(*o >= 0.0 && *o <= *i);
        }
    }
}
