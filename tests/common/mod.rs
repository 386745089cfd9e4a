//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, BinaryArray, Float32Builder, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use ndarray::{ArrayD, IxDyn};
use parquet::arrow::ArrowWriter;

use scene_feeder::{FeatureTable, FeederConfig};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Rows to write into a Parquet feature store.
pub struct StoreRows<'a> {
    pub audio_names: &'a [&'a str],
    pub features: &'a [Vec<f32>],
    pub scene_labels: Option<&'a [&'a str]>,
    pub source_labels: Option<&'a [&'a str]>,
}

/// Write a feature store. Audio names go in as bytes, the way h5py-era
/// stores kept them; labels go in as UTF-8.
pub fn write_store(path: &Path, rows: &StoreRows<'_>) {
    let mut fields = vec![
        Field::new("audio_name", DataType::Binary, false),
        Field::new(
            "feature",
            DataType::List(Arc::new(Field::new("item", DataType::Float32, true))),
            false,
        ),
    ];

    let names = BinaryArray::from_iter_values(rows.audio_names.iter().map(|n| n.as_bytes()));
    let mut feature_builder = ListBuilder::new(Float32Builder::new());
    for row in rows.features {
        feature_builder.values().append_slice(row);
        feature_builder.append(true);
    }
    let mut columns: Vec<ArrayRef> = vec![Arc::new(names), Arc::new(feature_builder.finish())];

    for (name, values) in [
        ("scene_label", rows.scene_labels),
        ("source_label", rows.source_labels),
    ] {
        if let Some(values) = values {
            fields.push(Field::new(name, DataType::Utf8, false));
            columns.push(Arc::new(StringArray::from(values.to_vec())));
        }
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();
    let file = std::fs::File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

/// Tab-separated metadata in the `filename` layout.
pub fn write_metadata(path: &Path, names: &[&str]) {
    let mut text = String::from("filename\tscene_label\tidentifier\tsource_label\n");
    for name in names {
        text.push_str(&format!("audio/{name}\tunused\tid\ta\n"));
    }
    std::fs::write(path, text).unwrap();
}

pub fn config(dir: &Path, labels: &[&str], batch_size: usize) -> FeederConfig {
    FeederConfig {
        feature_path: dir.join("features.parquet"),
        train_csv: dir.join("train.csv"),
        validate_csv: dir.join("validate.csv"),
        scalar_path: dir.join("scalar.json"),
        labels: labels.iter().map(|s| s.to_string()).collect(),
        classes_num: None,
        batch_size,
        seed: 1234,
    }
}

/// `n` rows named `clip-0 .. clip-{n-1}`, features `[i, i, i]`, class
/// `i % classes`, source label alternating `a` / `b`.
pub fn synthetic_table(n: usize, classes: usize) -> FeatureTable {
    let names = (0..n).map(|i| format!("clip-{i}")).collect();
    let features = ArrayD::from_shape_fn(IxDyn(&[n, 3]), |idx| idx[0] as f32);
    let targets = (0..n).map(|i| i % classes).collect();
    let sources = (0..n)
        .map(|i| if i % 2 == 0 { "a" } else { "b" }.to_string())
        .collect();
    FeatureTable::new(names, features, Some(targets), None, Some(sources)).unwrap()
}

pub fn clip_names(range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|i| format!("clip-{i}")).collect()
}
