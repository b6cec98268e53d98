//! Canonical row serialization and content hashing
//!
//! One compact JSON object per row, keys in schema order, rows joined by
//! `\n`. The digest is SHA-256 over exactly those bytes, so it only depends
//! on decoded values and survives any lossless re-encoding of the file.

use crate::{Error, Result};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type,
    UInt32Type, UInt64Type, UInt8Type,
};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::io::Write;

/// Per-column cell encoder.
///
/// Types without a native JSON mapping (dates, timestamps, decimals, ...)
/// go through Arrow's display formatter and are emitted as strings.
struct ColumnEncoder<'a> {
    array: &'a dyn Array,
    display: Option<ArrayFormatter<'a>>,
}

impl<'a> ColumnEncoder<'a> {
    fn new(array: &'a dyn Array, options: &FormatOptions<'a>) -> Result<Self> {
        let display = if has_native_encoding(array.data_type()) {
            None
        } else {
            Some(ArrayFormatter::try_new(array, options).map_err(|e| {
                Error::StorageError(format!(
                    "Column type {} has no canonical encoding: {e}",
                    array.data_type()
                ))
            })?)
        };
        Ok(Self { array, display })
    }

    fn value(&self, row: usize) -> Value {
        if self.array.is_null(row) {
            return Value::Null;
        }
        if let Some(display) = &self.display {
            return Value::String(display.value(row).to_string());
        }

        let array = self.array;
        match array.data_type() {
            DataType::Boolean => Value::Bool(array.as_boolean().value(row)),
            DataType::Int8 => Value::from(array.as_primitive::<Int8Type>().value(row)),
            DataType::Int16 => Value::from(array.as_primitive::<Int16Type>().value(row)),
            DataType::Int32 => Value::from(array.as_primitive::<Int32Type>().value(row)),
            DataType::Int64 => Value::from(array.as_primitive::<Int64Type>().value(row)),
            DataType::UInt8 => Value::from(array.as_primitive::<UInt8Type>().value(row)),
            DataType::UInt16 => Value::from(array.as_primitive::<UInt16Type>().value(row)),
            DataType::UInt32 => Value::from(array.as_primitive::<UInt32Type>().value(row)),
            DataType::UInt64 => Value::from(array.as_primitive::<UInt64Type>().value(row)),
            // NaN and infinities map to null
            DataType::Float32 => {
                Value::from(f64::from(array.as_primitive::<Float32Type>().value(row)))
            }
            DataType::Float64 => Value::from(array.as_primitive::<Float64Type>().value(row)),
            DataType::Utf8 => Value::from(array.as_string::<i32>().value(row)),
            DataType::LargeUtf8 => Value::from(array.as_string::<i64>().value(row)),
            _ => Value::Null,
        }
    }
}

const fn has_native_encoding(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Boolean
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
            | DataType::Utf8
            | DataType::LargeUtf8
    )
}

fn json_error(e: &serde_json::Error) -> Error {
    Error::StorageError(format!("Failed to encode canonical row: {e}"))
}

/// Stream the canonical serialization of `batch` into `out`.
///
/// # Errors
///
/// Returns error if a column type cannot be formatted or the writer fails.
pub fn write_canonical<W: Write>(batch: &RecordBatch, out: &mut W) -> Result<()> {
    let schema = batch.schema();
    let options = FormatOptions::default();

    let keys = schema
        .fields()
        .iter()
        .map(|field| serde_json::to_string(field.name()).map_err(|e| json_error(&e)))
        .collect::<Result<Vec<_>>>()?;
    let encoders = batch
        .columns()
        .iter()
        .map(|column| ColumnEncoder::new(column.as_ref(), &options))
        .collect::<Result<Vec<_>>>()?;

    for row in 0..batch.num_rows() {
        if row > 0 {
            out.write_all(b"\n")?;
        }
        out.write_all(b"{")?;
        for (idx, (key, encoder)) in keys.iter().zip(&encoders).enumerate() {
            if idx > 0 {
                out.write_all(b",")?;
            }
            out.write_all(key.as_bytes())?;
            out.write_all(b":")?;
            serde_json::to_writer(&mut *out, &encoder.value(row)).map_err(|e| json_error(&e))?;
        }
        out.write_all(b"}")?;
    }
    Ok(())
}

/// Canonical serialization as an owned string (newline-delimited JSON records).
///
/// # Errors
///
/// Returns error if a column type cannot be formatted.
pub fn canonical_rows(batch: &RecordBatch) -> Result<String> {
    let mut buf = Vec::new();
    write_canonical(batch, &mut buf)?;
    String::from_utf8(buf).map_err(|e| Error::Other(format!("Canonical rows not UTF-8: {e}")))
}

/// Hex SHA-256 of the canonical serialization.
///
/// # Errors
///
/// Returns error if a column type cannot be formatted.
pub fn content_hash(batch: &RecordBatch) -> Result<String> {
    let mut hasher = Sha256::new();
    write_canonical(batch, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}
