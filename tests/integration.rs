//! Integration tests for scloss.
//!
//! These tests verify end-to-end workflows combining multiple components.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::SeedableRng;
use scloss::metrics::{hierarchical_accuracy, LabelDecoder};
use scloss::nn::{bce_with_logits, Linear};
use scloss::prelude::*;

#[test]
fn test_grad_reverse_doubles_and_negates() {
    clear_graph();
    let x = Tensor::from_slice(&[1.0, -2.0, 0.5]).requires_grad();
    let y = grad_reverse(&x, 2.0);
    assert_eq!(y.data(), x.data());

    // downstream gradient of sum(3 · y) is 3 everywhere
    y.mul_scalar(3.0).sum().backward();
    let grad = get_grad(x.id()).expect("gradient");
    assert_eq!(grad.data(), &[-6.0, -6.0, -6.0]);
}

#[test]
fn test_hierarchical_loss_matches_hand_built_bce() {
    let hierarchies = LabelHierarchies::from_iter([(
        "cell_type",
        LabelHierarchy::new(3, BTreeMap::from([(3, BTreeSet::from([0, 2]))])).unwrap(),
    )]);
    let logits = [0.4_f32, 1.2, -0.3, -0.8, 0.9, 0.1];
    let pred = Tensor::new(&logits, &[2, 3]);
    let loss = classification("cell_type", &pred, &[1, 3], 3, &hierarchies).unwrap();

    let lse0 = (logits[0].exp() + logits[1].exp() + logits[2].exp()).ln();
    let lse1 = (logits[3].exp() + logits[5].exp()).ln();
    let wide = Tensor::new(
        &[logits[0], logits[1], logits[2], lse0, logits[3], logits[4], logits[5], lse1],
        &[2, 4],
    );
    let target = Tensor::new(&[0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0], &[2, 4]);
    let weight = Tensor::new(&[1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0], &[2, 4]);
    let expected = bce_with_logits(&wide, &target, Some(&weight));

    assert!((loss.item() - expected.item()).abs() < 1e-5);
}

#[test]
fn test_nb_decreases_towards_row_mean() {
    let counts = Tensor::new(&[2.0, 4.0, 6.0, 8.0], &[1, 4]);
    let theta = Tensor::full(&[4], 3.0);
    let row_mean = 5.0;

    let losses: Vec<f32> = [0.5, 1.5, 3.0, 4.0, row_mean]
        .iter()
        .map(|&m| {
            nb(&counts, &Tensor::full(&[1, 4], m), &theta, 1e-8)
                .unwrap()
                .item()
        })
        .collect();
    assert!(losses.iter().all(|l| l.is_finite()));
    assert!(losses.windows(2).all(|w| w[1] < w[0]), "{losses:?}");
}

#[test]
fn test_precondition_errors() {
    let x = Tensor::ones(&[2, 3]);
    assert!(matches!(
        masked_mse(&x, &x, &Mask::full(&[3], false)),
        Err(LossError::EmptyMask { .. })
    ));
    assert!(matches!(
        classification("tissue", &x, &[0, 5], 3, &LabelHierarchies::new()),
        Err(LossError::MissingHierarchy { .. })
    ));
}

#[test]
fn test_encoder_training_step_with_all_embedding_losses() {
    clear_graph();
    let encoder = Linear::with_seed(5, 4, Some(3));
    let w_id = encoder.weight().id();
    let disc_reversed =
        AdversarialDiscriminator::new(DiscriminatorConfig::new(4, 2).with_seed(9)).unwrap();

    let cells = Tensor::new(
        &[
            1.0, 0.0, 2.0, 0.0, 1.0, //
            0.0, 3.0, 0.0, 1.0, 0.0, //
            2.0, 1.0, 0.0, 0.0, 4.0, //
        ],
        &[3, 5],
    );
    let emb = encoder.forward(&cells);
    let view = encoder.forward(&cells.mul_scalar(1.1));

    let loss = similarity(&emb, &view, 0.5)
        .unwrap()
        .add(&ecs(&emb, 0.5).unwrap())
        .add(&disc_reversed.forward(&emb, &[0, 1, 0]).unwrap());
    assert!(loss.item().is_finite());
    loss.backward();

    let grad = get_grad(w_id).expect("encoder weight gradient");
    assert!(grad.data().iter().all(|g| g.is_finite()));
    assert!(grad.data().iter().any(|g| g.abs() > 0.0));
}

#[test]
fn test_reversed_discriminator_opposes_plain_one() {
    let emb = [0.3, -0.2, 0.9, 0.1, -0.5, 0.4, 0.0, 0.7];
    let grad = |reverse: bool| {
        clear_graph();
        let disc = AdversarialDiscriminator::new(
            DiscriminatorConfig::new(4, 3)
                .with_seed(21)
                .with_reverse_grad(reverse),
        )
        .unwrap();
        let x = Tensor::new(&emb, &[2, 4]).requires_grad();
        disc.forward(&x, &[2, 1]).unwrap().backward();
        get_grad(x.id()).expect("gradient").data().to_vec()
    };
    for (r, p) in grad(true).iter().zip(grad(false)) {
        assert!((r + p).abs() < 1e-6);
    }
}

#[test]
fn test_pretraining_batch_pipeline() {
    let config = LossConfig::from_json_str(r#"{"mask_ratio": 0.25, "renoise": 0.5}"#).unwrap();
    let mut rng = StdRng::seed_from_u64(2024);

    let mu = Tensor::full(&[4, 8], 5.0);
    let theta = Tensor::full(&[4, 8], 2.0);
    let zi = Tensor::full(&[4, 8], 0.1);
    let counts = zinb_sample(&mu, &theta, &zi, &[], &mut rng).unwrap();
    assert_eq!(counts.shape(), &[4, 8]);

    let noisy = downsample_profile(&counts, config.renoise, &mut rng).unwrap();
    let mask = masker(8, 4, config.mask_ratio, None, &mut rng).unwrap();
    assert_eq!(mask.count(), 4 * 2);

    let pred = Tensor::new(noisy.data(), &[4, 8]).requires_grad();
    let loss = masked_mse(&pred, &counts, &mask).unwrap();
    assert!(loss.item() >= 0.0);
    loss.backward();
    assert!(get_grad(pred.id()).is_some());
}

#[test]
fn test_decoding_and_hierarchical_accuracy() {
    let decoder = LabelDecoder::from_names("cell_type", ["T cell", "B cell", "NK cell"]);
    let hierarchy =
        LabelHierarchy::new(3, BTreeMap::from([(3, BTreeSet::from([0, 2]))])).unwrap();

    let pred = [0, 1, 2, 1];
    let truth = [0, 2, 3, 3];
    assert_eq!(
        decoder.decode(&pred).unwrap(),
        ["T cell", "B cell", "NK cell", "B cell"]
    );
    let acc = hierarchical_accuracy("cell_type", &pred, &truth, 3, Some(&hierarchy)).unwrap();
    assert!((acc - 0.5).abs() < 1e-6);
}

#[test]
fn test_logging_init_is_idempotent() {
    scloss::logging::init_logging();
    assert!(!scloss::logging::init_logging());
}
