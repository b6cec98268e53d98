//! Version reader - reassemble a version's dataset from its artifacts
//!
//! Artifacts are loaded in attachment order and concatenated. Artifacts are
//! never inherited: a child version only returns the rows attached to it.

use crate::artifact::ArtifactStore;
use crate::registry::VersionRegistry;
use crate::{Error, Result};
use arrow::array::ArrayRef;
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use std::sync::Arc;
use tracing::{debug, warn};

/// Loads the logical dataset of a version.
#[derive(Debug, Clone, Copy)]
pub struct VersionReader<'a> {
    registry: &'a VersionRegistry,
    store: &'a ArtifactStore,
}

impl<'a> VersionReader<'a> {
    /// Create a reader over a registry and its artifact store.
    #[must_use]
    pub const fn new(registry: &'a VersionRegistry, store: &'a ArtifactStore) -> Self {
        Self { registry, store }
    }

    /// Load all artifacts of `version_id`, optionally only those of `data_kind`.
    ///
    /// Returns an empty batch (no columns, no rows) when nothing matches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionNotFound`] for an unknown version,
    /// [`Error::ArtifactMissing`] if a referenced file is gone and
    /// [`Error::SchemaMismatch`] if artifacts disagree on their columns.
    pub fn load(&self, version_id: &str, data_kind: Option<&str>) -> Result<RecordBatch> {
        let version = self.registry.get(version_id)?;
        let descriptors: Vec<_> = version
            .artifacts()
            .iter()
            .filter(|artifact| data_kind.map_or(true, |kind| artifact.data_kind() == kind))
            .collect();

        if descriptors.is_empty() {
            warn!(version_id, data_kind, "no artifacts found for version");
            return Ok(RecordBatch::new_empty(Arc::new(Schema::empty())));
        }

        let batches = descriptors
            .iter()
            .map(|artifact| self.store.read(version_id, artifact.filename()))
            .collect::<Result<Vec<_>>>()?;

        let combined = concat_same_columns(&batches)?;
        debug!(
            version_id,
            artifacts = batches.len(),
            rows = combined.num_rows(),
            "loaded version data"
        );
        Ok(combined)
    }
}

fn describe(schema: &Schema) -> Vec<String> {
    schema
        .fields()
        .iter()
        .map(|field| format!("{}: {}", field.name(), field.data_type()))
        .collect()
}

/// Concatenate batches whose columns agree on name and type.
///
/// Nullability is widened so a nullable column in any artifact stays
/// nullable in the result.
fn concat_same_columns(batches: &[RecordBatch]) -> Result<RecordBatch> {
    let Some(first) = batches.first() else {
        return Ok(RecordBatch::new_empty(Arc::new(Schema::empty())));
    };
    let expected = first.schema();

    for batch in &batches[1..] {
        let found = batch.schema();
        let same = expected.fields().len() == found.fields().len()
            && expected
                .fields()
                .iter()
                .zip(found.fields().iter())
                .all(|(a, b)| a.name() == b.name() && a.data_type() == b.data_type());
        if !same {
            return Err(Error::SchemaMismatch {
                expected: describe(&expected),
                found: describe(&found),
            });
        }
    }

    let schema: SchemaRef = Arc::new(Schema::new(
        expected
            .fields()
            .iter()
            .enumerate()
            .map(|(idx, field)| {
                let nullable = batches
                    .iter()
                    .any(|batch| batch.schema().field(idx).is_nullable());
                Field::new(field.name(), field.data_type().clone(), nullable)
            })
            .collect::<Vec<_>>(),
    ));

    let columns = (0..schema.fields().len())
        .map(|idx| {
            let parts: Vec<&dyn arrow::array::Array> =
                batches.iter().map(|batch| batch.column(idx).as_ref()).collect();
            arrow::compute::concat(&parts)
        })
        .collect::<std::result::Result<Vec<ArrayRef>, _>>()?;

    let rows = batches.iter().map(RecordBatch::num_rows).sum();
    let options = RecordBatchOptions::new().with_row_count(Some(rows));
    Ok(RecordBatch::try_new_with_options(schema, columns, &options)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array};
    use arrow::datatypes::DataType;

    fn batch(name: &str, nullable: bool, values: Vec<i64>) -> RecordBatch {
        let schema = Schema::new(vec![Field::new(name, DataType::Int64, nullable)]);
        RecordBatch::try_new(Arc::new(schema), vec![Arc::new(Int64Array::from(values))]).unwrap()
    }

    #[test]
    fn test_concat_keeps_order() {
        let out = concat_same_columns(&[batch("x", false, vec![1, 2]), batch("x", false, vec![3])])
            .unwrap();
        let values = out.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(values.values().to_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn test_concat_widens_nullability() {
        let out =
            concat_same_columns(&[batch("x", false, vec![1]), batch("x", true, vec![2])]).unwrap();
        assert!(out.schema().field(0).is_nullable());
    }

    #[test]
    fn test_concat_rejects_renamed_column() {
        let err = concat_same_columns(&[batch("x", false, vec![1]), batch("y", false, vec![2])])
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));
    }

    #[test]
    fn test_concat_rejects_type_change() {
        let float = RecordBatch::try_new(
            Arc::new(Schema::new(vec![Field::new("x", DataType::Float64, false)])),
            vec![Arc::new(Float64Array::from(vec![1.0]))],
        )
        .unwrap();
        let err = concat_same_columns(&[batch("x", false, vec![1]), float]).unwrap_err();
        match err {
            Error::SchemaMismatch { expected, found } => {
                assert_eq!(expected, ["x: Int64"]);
                assert_eq!(found, ["x: Float64"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
