use std::path::Path;
use std::time::Instant;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type};
use arrow::record_batch::RecordBatch;
use log::debug;
use ndarray::{ArrayD, IxDyn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::model::{FeatureTable, LabelVocabulary};
use crate::error::{FeederError, Result};

pub const AUDIO_NAME: &str = "audio_name";
pub const FEATURE: &str = "feature";
pub const SCENE_LABEL: &str = "scene_label";
pub const IDENTIFIER: &str = "identifier";
pub const SOURCE_LABEL: &str = "source_label";

// ---------------------------------------------------------------------------
// Feature store (Parquet)
// ---------------------------------------------------------------------------

/// Load the whole feature store at `path` into memory.
///
/// Expected schema:
/// - `audio_name`: text or binary – clip identifier (required)
/// - `feature`: List / LargeList / FixedSizeList of Float32 or Float64,
///   optionally one list deeper for frame × bin rows (required)
/// - `scene_label`, `identifier`, `source_label`: text or binary (optional)
///
/// Scene labels are mapped through `vocab`; a label it does not know fails
/// the load.
pub fn load_feature_store(path: &Path, vocab: &LabelVocabulary) -> Result<FeatureTable> {
    let start = Instant::now();
    let file = std::fs::File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    let schema = builder.schema().clone();
    for required in [AUDIO_NAME, FEATURE] {
        if schema.field_with_name(required).is_err() {
            return Err(FeederError::MissingColumn(required.to_string()));
        }
    }
    let has = |name: &str| schema.field_with_name(name).is_ok();
    let mut scene_labels: Option<Vec<String>> = has(SCENE_LABEL).then(Vec::new);
    let mut identifiers: Option<Vec<String>> = has(IDENTIFIER).then(Vec::new);
    let mut source_labels: Option<Vec<String>> = has(SOURCE_LABEL).then(Vec::new);

    let reader = builder.build()?;
    let mut audio_names: Vec<String> = Vec::new();
    let mut features = FeatureRows::default();

    for batch_result in reader {
        let batch = batch_result?;
        let offset = audio_names.len();

        audio_names.extend(text_column(column(&batch, AUDIO_NAME)?, AUDIO_NAME, offset)?);
        features.append(column(&batch, FEATURE)?, offset)?;

        for (name, dest) in [
            (SCENE_LABEL, &mut scene_labels),
            (IDENTIFIER, &mut identifiers),
            (SOURCE_LABEL, &mut source_labels),
        ] {
            if let Some(dest) = dest {
                dest.extend(text_column(column(&batch, name)?, name, offset)?);
            }
        }
    }

    let targets = scene_labels
        .map(|labels| {
            labels
                .iter()
                .map(|label| vocab.index_of(label))
                .collect::<Result<Vec<usize>>>()
        })
        .transpose()?;

    let table = FeatureTable::new(
        audio_names,
        features.into_array()?,
        targets,
        identifiers,
        source_labels,
    )?;
    debug!(
        "Read {} rows (row shape {:?}) from {} in {:.3} s",
        table.len(),
        table.row_shape(),
        path.display(),
        start.elapsed().as_secs_f64()
    );
    Ok(table)
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| FeederError::MissingColumn(name.to_string()))
}

fn bad_value(column: &str, row: usize, reason: impl Into<String>) -> FeederError {
    FeederError::BadValue {
        column: column.to_string(),
        row,
        reason: reason.into(),
    }
}

// -- Text columns --

/// Decode a text or byte column into owned strings. `offset` is the row
/// number of the first cell, for error messages.
fn text_column(col: &ArrayRef, name: &str, offset: usize) -> Result<Vec<String>> {
    let decode = |bytes: &[u8], row: usize| {
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| bad_value(name, offset + row, format!("invalid UTF-8: {e}")))
    };

    let cell: Box<dyn Fn(usize) -> Result<String> + '_> = match col.data_type() {
        DataType::Utf8 => {
            let arr = col.as_string::<i32>();
            Box::new(move |row| Ok(arr.value(row).to_string()))
        }
        DataType::LargeUtf8 => {
            let arr = col.as_string::<i64>();
            Box::new(move |row| Ok(arr.value(row).to_string()))
        }
        DataType::Utf8View => {
            let arr = col.as_string_view();
            Box::new(move |row| Ok(arr.value(row).to_string()))
        }
        DataType::Binary => {
            let arr = col.as_binary::<i32>();
            Box::new(move |row| decode(arr.value(row), row))
        }
        DataType::LargeBinary => {
            let arr = col.as_binary::<i64>();
            Box::new(move |row| decode(arr.value(row), row))
        }
        DataType::FixedSizeBinary(_) => {
            let arr = col.as_fixed_size_binary();
            Box::new(move |row| decode(arr.value(row), row))
        }
        other => {
            return Err(FeederError::UnsupportedColumn {
                column: name.to_string(),
                found: format!("{other:?}"),
            })
        }
    };

    (0..col.len())
        .map(|row| {
            if col.is_null(row) {
                Err(bad_value(name, offset + row, "null value"))
            } else {
                cell(row)
            }
        })
        .collect()
}

// -- Feature column --

/// Feature rows flattened into one buffer, with the shared row shape.
#[derive(Default)]
struct FeatureRows {
    flat: Vec<f32>,
    rows: usize,
    row_shape: Option<Vec<usize>>,
}

impl FeatureRows {
    fn append(&mut self, col: &ArrayRef, offset: usize) -> Result<()> {
        if !is_list(col.data_type()) {
            return Err(FeederError::UnsupportedColumn {
                column: FEATURE.to_string(),
                found: format!("{:?}", col.data_type()),
            });
        }

        for row in 0..col.len() {
            if col.is_null(row) {
                return Err(bad_value(FEATURE, offset + row, "null feature row"));
            }
            let value = list_child(col.as_ref(), row)
                .and_then(|child| flatten_floats(child.as_ref(), &mut self.flat))
                .map_err(|reason| bad_value(FEATURE, offset + row, reason))?;

            if let Some(shape) = &self.row_shape {
                if *shape != value {
                    return Err(bad_value(
                        FEATURE,
                        offset + row,
                        format!("row shape {value:?} differs from {shape:?}"),
                    ));
                }
            } else {
                self.row_shape = Some(value);
            }
            self.rows += 1;
        }
        Ok(())
    }

    fn into_array(self) -> Result<ArrayD<f32>> {
        let mut shape = vec![self.rows];
        shape.extend(self.row_shape.unwrap_or_else(|| vec![0]));
        ArrayD::from_shape_vec(IxDyn(&shape), self.flat)
            .map_err(|e| FeederError::ShapeMismatch(e.to_string()))
    }
}

fn is_list(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::List(_) | DataType::LargeList(_) | DataType::FixedSizeList(_, _)
    )
}

fn list_child(arr: &dyn Array, i: usize) -> std::result::Result<ArrayRef, String> {
    match arr.data_type() {
        DataType::List(_) => Ok(arr.as_list::<i32>().value(i)),
        DataType::LargeList(_) => Ok(arr.as_list::<i64>().value(i)),
        DataType::FixedSizeList(_, _) => Ok(arr.as_fixed_size_list().value(i)),
        other => Err(format!("expected a list, got {other:?}")),
    }
}

/// Append every float in `arr` to `out` and return its shape. Nested lists
/// must be rectangular. Null floats become NaN.
fn flatten_floats(arr: &dyn Array, out: &mut Vec<f32>) -> std::result::Result<Vec<usize>, String> {
    match arr.data_type() {
        DataType::Float32 => {
            let values = arr.as_primitive::<Float32Type>();
            out.extend(values.iter().map(|v| v.unwrap_or(f32::NAN)));
            Ok(vec![values.len()])
        }
        DataType::Float64 => {
            let values = arr.as_primitive::<Float64Type>();
            out.extend(values.iter().map(|v| v.map_or(f32::NAN, |v| v as f32)));
            Ok(vec![values.len()])
        }
        dt if is_list(dt) => {
            let mut inner: Option<Vec<usize>> = None;
            for i in 0..arr.len() {
                if arr.is_null(i) {
                    return Err("null inner list".to_string());
                }
                let shape = flatten_floats(list_child(arr, i)?.as_ref(), out)?;
                if let Some(first) = &inner {
                    if *first != shape {
                        return Err(format!("ragged inner lists: {first:?} vs {shape:?}"));
                    }
                } else {
                    inner = Some(shape);
                }
            }
            let mut shape = vec![arr.len()];
            shape.extend(inner.unwrap_or_default());
            Ok(shape)
        }
        other => Err(format!("expected Float32 or Float64 values, got {other:?}")),
    }
}

// ---------------------------------------------------------------------------
// Metadata (delimited text)
// ---------------------------------------------------------------------------

/// Read the audio names listed in a metadata file.
///
/// The header row decides the delimiter: tab if it contains one, comma
/// otherwise. Names come from an `audio_name` column, or from the basename
/// of a `filename` column (`audio/x.wav` → `x.wav`).
pub fn read_metadata(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    let delimiter = if text.lines().next().is_some_and(|h| h.contains('\t')) {
        b'\t'
    } else {
        b','
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let (idx, basename) = if let Some(i) = headers.iter().position(|h| h == AUDIO_NAME) {
        (i, false)
    } else if let Some(i) = headers.iter().position(|h| h == "filename") {
        (i, true)
    } else {
        return Err(FeederError::MissingColumn(AUDIO_NAME.to_string()));
    };

    let mut names = Vec::new();
    for result in reader.records() {
        let record = result?;
        let value = record.get(idx).unwrap_or("");
        let name = if basename {
            value.rsplit('/').next().unwrap_or(value)
        } else {
            value
        };
        names.push(name.to_string());
    }
    Ok(names)
}
