// src/exporter.rs
// Writes a batch of ColumnarRow values to a single Parquet shard. Nested
// per-move sequences stay JSON-encoded Utf8 columns so the schema never has
// to change shape as move counts vary between games. Writes go to a temp
// file in the same directory, then an atomic rename, so a reader never sees
// a partially-written shard.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{BooleanArray, Float64Array, Int32Array, Int64Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::PipelineError;
use crate::model::ColumnarRow;

pub fn schema() -> Schema {
    Schema::new(vec![
        Field::new("event", DataType::Utf8, true),
        Field::new("site", DataType::Utf8, true),
        Field::new("white", DataType::Utf8, true),
        Field::new("black", DataType::Utf8, true),
        Field::new("white_elo", DataType::UInt32, true),
        Field::new("black_elo", DataType::UInt32, true),
        Field::new("white_title", DataType::Utf8, true),
        Field::new("black_title", DataType::Utf8, true),
        Field::new("white_rating_diff", DataType::Int32, true),
        Field::new("black_rating_diff", DataType::Int32, true),
        Field::new("result", DataType::Utf8, false),
        Field::new("termination", DataType::Utf8, true),
        Field::new("eco", DataType::Utf8, true),
        Field::new("opening", DataType::Utf8, true),
        Field::new("time_control_raw", DataType::Utf8, false),
        Field::new("time_control_bucket", DataType::Utf8, false),
        Field::new("utc_date", DataType::Utf8, true),
        Field::new("year", DataType::Int32, true),
        Field::new("ts_ms", DataType::Int64, true),
        Field::new("has_eval", DataType::Boolean, false),
        Field::new("moves_json", DataType::Utf8, false),
        Field::new("white_cp_loss_json", DataType::Utf8, false),
        Field::new("black_cp_loss_json", DataType::Utf8, false),
        Field::new("average_accuracy_per_move_json", DataType::Utf8, false),
        Field::new("white_running_accuracy_json", DataType::Utf8, false),
        Field::new("black_running_accuracy_json", DataType::Utf8, false),
        Field::new("average_accuracy", DataType::Float64, true),
        Field::new("white_accuracy", DataType::Float64, true),
        Field::new("black_accuracy", DataType::Float64, true),
        Field::new("source_file", DataType::Utf8, false),
    ])
}

fn to_record_batch(rows: &[ColumnarRow]) -> Result<RecordBatch, arrow::error::ArrowError> {
    macro_rules! opt_str_col {
        ($f:ident) => {
            Arc::new(StringArray::from(
                rows.iter().map(|r| r.$f.as_deref()).collect::<Vec<_>>(),
            )) as _
        };
    }
    macro_rules! str_col {
        ($f:ident) => {
            Arc::new(StringArray::from(
                rows.iter().map(|r| r.$f.as_str()).collect::<Vec<_>>(),
            )) as _
        };
    }

    let event = opt_str_col!(event);
    let site = opt_str_col!(site);
    let white = opt_str_col!(white);
    let black = opt_str_col!(black);
    let white_elo: Arc<dyn arrow::array::Array> =
        Arc::new(UInt32Array::from(rows.iter().map(|r| r.white_elo).collect::<Vec<_>>()));
    let black_elo: Arc<dyn arrow::array::Array> =
        Arc::new(UInt32Array::from(rows.iter().map(|r| r.black_elo).collect::<Vec<_>>()));
    let white_title = opt_str_col!(white_title);
    let black_title = opt_str_col!(black_title);
    let white_rating_diff: Arc<dyn arrow::array::Array> = Arc::new(Int32Array::from(
        rows.iter().map(|r| r.white_rating_diff).collect::<Vec<_>>(),
    ));
    let black_rating_diff: Arc<dyn arrow::array::Array> = Arc::new(Int32Array::from(
        rows.iter().map(|r| r.black_rating_diff).collect::<Vec<_>>(),
    ));
    let result = str_col!(result);
    let termination = opt_str_col!(termination);
    let eco = opt_str_col!(eco);
    let opening = opt_str_col!(opening);
    let time_control_raw = str_col!(time_control_raw);
    let time_control_bucket = str_col!(time_control_bucket);
    let utc_date = opt_str_col!(utc_date);
    let year: Arc<dyn arrow::array::Array> =
        Arc::new(Int32Array::from(rows.iter().map(|r| r.year).collect::<Vec<_>>()));
    let ts_ms: Arc<dyn arrow::array::Array> =
        Arc::new(Int64Array::from(rows.iter().map(|r| r.ts_ms).collect::<Vec<_>>()));
    let has_eval: Arc<dyn arrow::array::Array> =
        Arc::new(BooleanArray::from(rows.iter().map(|r| r.has_eval).collect::<Vec<_>>()));
    let moves_json = str_col!(moves_json);
    let white_cp_loss_json = str_col!(white_cp_loss_json);
    let black_cp_loss_json = str_col!(black_cp_loss_json);
    let average_accuracy_per_move_json = str_col!(average_accuracy_per_move_json);
    let white_running_accuracy_json = str_col!(white_running_accuracy_json);
    let black_running_accuracy_json = str_col!(black_running_accuracy_json);
    let average_accuracy: Arc<dyn arrow::array::Array> = Arc::new(Float64Array::from(
        rows.iter().map(|r| r.average_accuracy).collect::<Vec<_>>(),
    ));
    let white_accuracy: Arc<dyn arrow::array::Array> = Arc::new(Float64Array::from(
        rows.iter().map(|r| r.white_accuracy).collect::<Vec<_>>(),
    ));
    let black_accuracy: Arc<dyn arrow::array::Array> = Arc::new(Float64Array::from(
        rows.iter().map(|r| r.black_accuracy).collect::<Vec<_>>(),
    ));
    let source_file = str_col!(source_file);

    RecordBatch::try_new(
        Arc::new(schema()),
        vec![
            event,
            site,
            white,
            black,
            white_elo,
            black_elo,
            white_title,
            black_title,
            white_rating_diff,
            black_rating_diff,
            result,
            termination,
            eco,
            opening,
            time_control_raw,
            time_control_bucket,
            utc_date,
            year,
            ts_ms,
            has_eval,
            moves_json,
            white_cp_loss_json,
            black_cp_loss_json,
            average_accuracy_per_move_json,
            white_running_accuracy_json,
            black_running_accuracy_json,
            average_accuracy,
            white_accuracy,
            black_accuracy,
            source_file,
        ],
    )
}

/// Writes `rows` as a single Parquet file at `output_path`, via a same-directory
/// temp file that's renamed into place on success.
pub fn write_shard(rows: &[ColumnarRow], output_path: &Path) -> Result<(), PipelineError> {
    let batch = to_record_batch(rows).map_err(|e| PipelineError::Io {
        path: output_path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::Other, e),
    })?;

    let tmp_path = tmp_path_for(output_path);
    {
        let file = File::create(&tmp_path).map_err(|e| PipelineError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;
        let props = WriterProperties::builder()
            .set_compression(Compression::ZSTD(Default::default()))
            .build();
        let mut writer = ArrowWriter::try_new(file, Arc::new(schema()), Some(props)).map_err(|e| {
            PipelineError::Io {
                path: tmp_path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e),
            }
        })?;
        writer.write(&batch).map_err(|e| PipelineError::Io {
            path: tmp_path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e),
        })?;
        writer.close().map_err(|e| PipelineError::Io {
            path: tmp_path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e),
        })?;
    }

    std::fs::rename(&tmp_path, output_path).map_err(|e| PipelineError::Io {
        path: output_path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

fn tmp_path_for(output_path: &Path) -> PathBuf {
    let file_name = output_path
        .file_name()
        .map(|n| format!(".{}.tmp", n.to_string_lossy()))
        .unwrap_or_else(|| ".shard.tmp".to_string());
    output_path.with_file_name(file_name)
}

/// Strips the archive's compression/format suffixes to derive the shard's
/// base filename, e.g. `games-2024-01.pgn.zst` -> `games-2024-01`.
pub fn output_basename(input_path: &Path) -> String {
    let name = input_path.file_name().and_then(|n| n.to_str()).unwrap_or("output");
    for suffix in [".pgn.zst", ".zst", ".pgn"] {
        if let Some(stripped) = name.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_known_suffixes() {
        assert_eq!(output_basename(Path::new("games-2024-01.pgn.zst")), "games-2024-01");
        assert_eq!(output_basename(Path::new("games.zst")), "games");
        assert_eq!(output_basename(Path::new("games.pgn")), "games");
    }
}
