//! Stream behaviour of the feeder over in-memory tables.

mod common;

use std::collections::BTreeSet;

use ndarray::{Array1, ArrayD, IxDyn};
use scene_feeder::{FeatureTable, Feeder, FeederError, Scaler, Split};

use common::{clip_names, synthetic_table};

fn feeder(n: usize, batch_size: usize, seed: u64) -> Feeder {
    let names = clip_names(0..n);
    Feeder::from_table(
        synthetic_table(n, 3),
        &names,
        &names,
        3,
        Scaler::identity(3),
        batch_size,
        seed,
    )
    .unwrap()
}

fn clip_index(name: &str) -> usize {
    name.trim_start_matches("clip-").parse().unwrap()
}

#[test]
fn test_index_sets_count_matched_names_only() {
    common::init_logging();
    let train: Vec<String> = clip_names(0..5)
        .into_iter()
        .chain(["missing-1".to_string(), "missing-2".to_string()])
        .collect();
    let validate = clip_names(3..9);
    let feeder = Feeder::from_table(
        synthetic_table(5, 3),
        &train,
        &validate,
        3,
        Scaler::identity(3),
        2,
        0,
    )
    .unwrap();

    assert_eq!(feeder.train_indexes(), &[0, 1, 2, 3, 4]);
    assert!(feeder.train_indexes().len() <= train.len());
    assert_eq!(feeder.validate_indexes(), &[3, 4]);
}

#[test]
fn test_each_epoch_is_a_permutation() {
    let feeder = feeder(7, 3, 42);
    let mut stream = feeder.generate_train().unwrap();
    let all: BTreeSet<usize> = (0..7).collect();

    for _epoch in 0..4 {
        let mut seen = Vec::new();
        // 7 rows at batch size 3: batches of 3, 3 and 1.
        for expected_len in [3, 3, 1] {
            let batch = stream.next().unwrap();
            assert_eq!(batch.len(), expected_len);
            seen.extend(batch.audio_names.iter().map(|n| clip_index(n)));
        }
        assert_eq!(seen.len(), 7);
        assert_eq!(seen.into_iter().collect::<BTreeSet<_>>(), all);
    }
}

#[test]
fn test_training_stream_never_ends() {
    let feeder = feeder(5, 2, 7);
    let batches: Vec<usize> = feeder
        .generate_train()
        .unwrap()
        .take(10_000)
        .map(|b| b.len())
        .collect();
    assert_eq!(batches.len(), 10_000);
    assert!(batches.chunks(3).all(|epoch| epoch[0] == 2));
    assert_eq!(batches[2], 1);
}

#[test]
fn test_training_batches_are_normalized_and_one_hot() {
    let names = clip_names(0..6);
    let scaler = Scaler::new(Array1::from_elem(3, 1.0), Array1::from_elem(3, 2.0)).unwrap();
    let feeder =
        Feeder::from_table(synthetic_table(6, 3), &names, &names, 4, scaler, 4, 3).unwrap();

    let batch = feeder.generate_train().unwrap().next().unwrap();
    let target = batch.target.as_ref().unwrap();
    assert_eq!(batch.features.shape(), &[4, 3]);
    assert_eq!(target.shape(), &[4, 4]);

    for (row, name) in batch.audio_names.iter().enumerate() {
        let i = clip_index(name);
        let expected = (i as f32 - 1.0) / 2.0;
        assert!(batch.features.index_axis(ndarray::Axis(0), row).iter().all(|&v| v == expected));
        for class in 0..4 {
            let want = if class == i % 3 { 1.0 } else { 0.0 };
            assert_eq!(target[[row, class]], want);
        }
    }
}

#[test]
fn test_same_seed_gives_same_stream() {
    let first = |f: &Feeder| -> Vec<Vec<String>> {
        f.generate_train()
            .unwrap()
            .take(5)
            .map(|b| b.audio_names)
            .collect()
    };
    let a = feeder(20, 4, 99);
    let b = feeder(20, 4, 99);
    let a_first = first(&a);
    assert_eq!(a_first, first(&b));

    // A second stream from the same feeder draws a new permutation.
    assert_ne!(first(&a), a_first);
}

#[test]
fn test_empty_source_filter_yields_nothing() {
    let feeder = feeder(10, 2, 0);
    let none: [&str; 0] = [];
    let mut stream = feeder.generate_validate(Split::Validate, &none, None).unwrap();
    assert_eq!(stream.len(), 0);
    assert!(stream.next().is_none());
}

#[test]
fn test_max_iteration_caps_batches() {
    let feeder = feeder(20, 2, 0);
    let stream = feeder
        .generate_validate(Split::Validate, &["a", "b"], Some(3))
        .unwrap();
    assert_eq!(stream.len(), 3);
    assert_eq!(stream.count(), 3);

    let uncapped = feeder
        .generate_validate(Split::Validate, &["a", "b"], None)
        .unwrap();
    assert_eq!(uncapped.count(), 10);
}

#[test]
fn test_validate_filters_by_source_in_order() {
    let feeder = feeder(9, 2, 0);
    let names: Vec<String> = feeder
        .generate_validate(Split::Validate, &["a"], None)
        .unwrap()
        .flat_map(|b| b.audio_names)
        .collect();
    assert_eq!(names, vec!["clip-0", "clip-2", "clip-4", "clip-6", "clip-8"]);
}

#[test]
fn test_train_split_walks_train_set_in_order() {
    let feeder = feeder(5, 2, 0);
    let none: [&str; 0] = [];
    let lens: Vec<usize> = feeder
        .generate_validate(Split::Train, &none, None)
        .unwrap()
        .map(|b| b.len())
        .collect();
    assert_eq!(lens, vec![2, 2, 1]);

    let first = feeder
        .generate_validate(Split::Train, &none, Some(1))
        .unwrap()
        .next()
        .unwrap();
    assert_eq!(first.audio_names, vec!["clip-0", "clip-1"]);
}

#[test]
fn test_train_and_validate_streams_coexist() {
    let feeder = feeder(8, 3, 1);
    let mut train = feeder.generate_train().unwrap();
    for _ in 0..3 {
        train.next().unwrap();
        let evaluated: usize = feeder
            .generate_validate(Split::Validate, &["a", "b"], None)
            .unwrap()
            .map(|b| b.len())
            .sum();
        assert_eq!(evaluated, 8);
    }
}

#[test]
fn test_invalid_mode_is_rejected() {
    assert!(matches!(
        "test".parse::<Split>(),
        Err(FeederError::InvalidArgument(_))
    ));
}

#[test]
fn test_empty_train_set_cannot_stream() {
    let none: [&str; 0] = [];
    let feeder = Feeder::from_table(
        synthetic_table(4, 2),
        &none,
        &none,
        2,
        Scaler::identity(3),
        2,
        0,
    )
    .unwrap();
    assert!(matches!(
        feeder.generate_train(),
        Err(FeederError::EmptyIndexSet("train"))
    ));
}

#[test]
fn test_construction_rejects_bad_shapes() {
    let names = clip_names(0..4);
    let err = Feeder::from_table(
        synthetic_table(4, 2),
        &names,
        &names,
        2,
        Scaler::identity(5),
        2,
        0,
    )
    .unwrap_err();
    assert!(matches!(err, FeederError::ShapeMismatch(_)));

    // Class 2 exists in the table but only two classes are configured.
    let err = Feeder::from_table(
        synthetic_table(4, 3),
        &names,
        &names,
        2,
        Scaler::identity(3),
        2,
        0,
    )
    .unwrap_err();
    assert!(matches!(err, FeederError::ShapeMismatch(_)));

    let err = Feeder::from_table(
        synthetic_table(4, 2),
        &names,
        &names,
        2,
        Scaler::identity(3),
        0,
        0,
    )
    .unwrap_err();
    assert!(matches!(err, FeederError::Config(_)));
}

#[test]
fn test_unlabelled_table_and_missing_sources() {
    let names = clip_names(0..3);
    let table = FeatureTable::new(
        names.clone(),
        ArrayD::zeros(IxDyn(&[3, 2])),
        None,
        None,
        None,
    )
    .unwrap();
    let feeder =
        Feeder::from_table(table, &names, &names, 2, Scaler::identity(2), 2, 0).unwrap();

    let batch = feeder.generate_train().unwrap().next().unwrap();
    assert!(batch.target.is_none());
    assert!(matches!(
        feeder.generate_validate(Split::Validate, &["a"], None),
        Err(FeederError::MissingColumn(c)) if c == "source_label"
    ));
}

#[test]
fn test_frame_by_bin_rows_are_normalized_per_bin() {
    // Row i, frame t, bin d holds 10 * i + d; frames repeat.
    let names = clip_names(0..4);
    let features = ArrayD::from_shape_fn(IxDyn(&[4, 2, 3]), |idx| {
        (10 * idx[0] + idx[2]) as f32
    });
    let table = FeatureTable::new(names.clone(), features, Some(vec![0, 1, 0, 1]), None, None)
        .unwrap();
    let scaler = Scaler::new(
        Array1::from(vec![0.0, 1.0, 2.0]),
        Array1::from(vec![10.0, 10.0, 10.0]),
    )
    .unwrap();
    let feeder = Feeder::from_table(table, &names, &names, 2, scaler, 3, 5).unwrap();

    let batch = feeder.generate_train().unwrap().next().unwrap();
    assert_eq!(batch.features.shape(), &[3, 2, 3]);
    assert_eq!(batch.target.as_ref().unwrap().shape(), &[3, 2]);
    for (row, name) in batch.audio_names.iter().enumerate() {
        let i = clip_index(name) as f32;
        for t in 0..2 {
            for d in 0..3 {
                assert!((batch.features[[row, t, d]] - i).abs() < 1e-6);
            }
        }
    }

    let none: [&str; 0] = [];
    let ordered = feeder
        .generate_validate(Split::Train, &none, None)
        .unwrap()
        .last()
        .unwrap();
    assert_eq!(ordered.features.shape(), &[1, 2, 3]);
    assert_eq!(ordered.features[[0, 1, 2]], 3.0);
}
