//! End-to-end versioning pipeline
//!
//! Tests the complete flow a producer and its consumers go through:
//! 1. Create a version (chained to the previous one)
//! 2. Attach row batches of several data kinds
//! 3. Reload, verify and walk lineage using only the version id

use arrow::array::{Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use data_lineage::{
    Config, Error, NullMirror, Version, VersionMirror, VersionReader, VersionRegistry, Versioning,
};
use std::sync::{Arc, Mutex};

#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_precision_loss)]
fn processed_batch(num_rows: usize) -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("city", DataType::Utf8, false),
        Field::new("temp", DataType::Float64, true),
        Field::new("humidity", DataType::Int64, false),
    ]);
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(StringArray::from_iter_values(
                (0..num_rows).map(|i| format!("city_{i}")),
            )),
            Arc::new(Float64Array::from_iter(
                (0..num_rows).map(|i| (i % 4 != 0).then_some(i as f64 + 0.5)),
            )),
            Arc::new(Int64Array::from_iter_values((0..num_rows).map(|i| i as i64))),
        ],
    )
    .unwrap()
}

fn stats_batch() -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("city", DataType::Utf8, false),
        Field::new("temp_mean", DataType::Float64, false),
    ]);
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(StringArray::from(vec!["London", "Tokyo"])),
            Arc::new(Float64Array::from(vec![11.2, 18.9])),
        ],
    )
    .unwrap()
}

fn setup() -> (tempfile::TempDir, Versioning) {
    let dir = tempfile::tempdir().unwrap();
    let versioning = Versioning::builder().root_dir(dir.path()).build().unwrap();
    (dir, versioning)
}

#[test]
fn test_parent_child_scenario() {
    let (_dir, versioning) = setup();

    let a = versioning.create_version("A", None, None).unwrap();
    versioning.add_data(&a, "processed", &processed_batch(10)).unwrap();

    let b = versioning.create_version("B", None, Some(&a)).unwrap();
    versioning.add_data(&b, "processed", &processed_batch(5)).unwrap();

    // Artifacts are not inherited from parents
    assert_eq!(versioning.load(&b, Some("processed")).unwrap().num_rows(), 5);
    assert_eq!(versioning.load(&a, Some("processed")).unwrap().num_rows(), 10);

    assert_eq!(versioning.lineage().unwrap().ancestors(&b).unwrap(), [a.clone()]);

    assert!(versioning.check(&a).unwrap().valid);
    assert!(versioning.check(&b).unwrap().valid);
}

#[test]
fn test_round_trip_rows_equal() {
    let (_dir, versioning) = setup();
    let id = versioning.create_version("v", None, None).unwrap();
    let batch = processed_batch(37);

    let descriptor = versioning.add_data(&id, "processed", &batch).unwrap();
    let read = versioning.store().read(&id, descriptor.filename()).unwrap();

    assert_eq!(read, batch);
    assert_eq!(descriptor.rows(), 37);
    assert_eq!(descriptor.columns(), ["city", "temp", "humidity"]);
}

#[test]
fn test_load_concatenates_in_attachment_order() {
    let (_dir, versioning) = setup();
    let id = versioning.create_version("v", None, None).unwrap();
    versioning.add_data(&id, "processed", &processed_batch(3)).unwrap();
    versioning.add_data(&id, "daily_stats", &stats_batch()).unwrap();
    versioning.add_data(&id, "processed", &processed_batch(2)).unwrap();

    let processed = versioning.load(&id, Some("processed")).unwrap();
    assert_eq!(processed.num_rows(), 5);

    let humidity = processed
        .column(2)
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(humidity.values().to_vec(), vec![0, 1, 2, 0, 1]);

    let temp = processed.column(1);
    assert!(temp.is_null(0));
    assert!(temp.is_null(3));

    let stats = versioning.load(&id, Some("daily_stats")).unwrap();
    assert_eq!(stats.num_rows(), 2);
}

#[test]
fn test_load_all_kinds_with_divergent_columns_fails() {
    let (_dir, versioning) = setup();
    let id = versioning.create_version("v", None, None).unwrap();
    versioning.add_data(&id, "processed", &processed_batch(3)).unwrap();
    versioning.add_data(&id, "daily_stats", &stats_batch()).unwrap();

    let err = versioning.load(&id, None).unwrap_err();
    assert!(matches!(err, Error::SchemaMismatch { .. }));
}

#[test]
fn test_load_without_matching_artifacts_is_empty() {
    let (_dir, versioning) = setup();
    let id = versioning.create_version("v", None, None).unwrap();
    versioning.add_data(&id, "processed", &processed_batch(3)).unwrap();

    let none = versioning.load(&id, Some("daily_stats")).unwrap();
    assert_eq!(none.num_rows(), 0);
    assert_eq!(none.num_columns(), 0);

    let empty = versioning.create_version("empty", None, None).unwrap();
    assert_eq!(versioning.load(&empty, None).unwrap().num_rows(), 0);
}

#[test]
fn test_load_missing_file_is_error() {
    let (_dir, versioning) = setup();
    let id = versioning.create_version("v", None, None).unwrap();
    let descriptor = versioning.add_data(&id, "processed", &processed_batch(3)).unwrap();
    std::fs::remove_file(
        versioning
            .store()
            .artifact_path(&id, descriptor.filename())
            .unwrap(),
    )
    .unwrap();

    assert!(matches!(
        versioning.load(&id, None),
        Err(Error::ArtifactMissing { .. })
    ));
}

#[test]
fn test_load_unknown_version() {
    let (_dir, versioning) = setup();
    assert!(matches!(
        versioning.load("missing", None),
        Err(Error::VersionNotFound(_))
    ));
}

#[test]
fn test_deactivated_version_still_loads() {
    let (_dir, versioning) = setup();
    let a = versioning.create_version("a", None, None).unwrap();
    versioning.add_data(&a, "processed", &processed_batch(4)).unwrap();
    let b = versioning.create_version("b", None, None).unwrap();

    versioning.registry().deactivate(&a).unwrap();

    assert!(versioning.history().unwrap().iter().any(|v| v.id() == a));
    assert_eq!(versioning.load(&a, None).unwrap().num_rows(), 4);
    assert_eq!(versioning.latest().unwrap(), Some(b));
}

#[test]
fn test_add_data_to_unknown_version_writes_nothing() {
    let (dir, versioning) = setup();
    let err = versioning
        .add_data("missing", "processed", &processed_batch(1))
        .unwrap_err();

    assert!(matches!(err, Error::VersionNotFound(_)));
    assert!(!dir.path().join("missing").exists());
}

#[test]
fn test_version_info_tracks_attachments() {
    let (dir, versioning) = setup();
    let id = versioning.create_version("v", None, None).unwrap();
    versioning.add_data(&id, "processed", &processed_batch(2)).unwrap();

    let info = std::fs::read_to_string(dir.path().join(&id).join("version_info.json")).unwrap();
    let copy: Version = serde_json::from_str(&info).unwrap();
    assert_eq!(copy.artifacts().len(), 1);
}

#[test]
fn test_reader_over_separate_handles() {
    let (dir, versioning) = setup();
    let id = versioning.create_version("v", None, None).unwrap();
    versioning.add_data(&id, "processed", &processed_batch(6)).unwrap();

    // Consumers only need the root and the version id
    let registry = VersionRegistry::open(dir.path()).unwrap();
    let store = data_lineage::ArtifactStore::new(dir.path());
    let reader = VersionReader::new(&registry, &store);
    assert_eq!(reader.load(&id, Some("processed")).unwrap().num_rows(), 6);
}

#[test]
fn test_open_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_root(dir.path());

    let versioning = Versioning::open(&config).unwrap();
    versioning.create_version("v", None, None).unwrap();

    assert!(config.registry_path().exists());
}

// =============================================================================
// Mirror seam
// =============================================================================

#[derive(Clone, Default)]
struct RecordingMirror {
    versions: Arc<Mutex<Vec<String>>>,
    batches: Arc<Mutex<Vec<(String, String, usize)>>>,
}

impl VersionMirror for RecordingMirror {
    fn persist_version(&self, version: &Version) -> data_lineage::Result<()> {
        self.versions.lock().unwrap().push(version.name().to_string());
        Ok(())
    }

    fn persist_rows(
        &self,
        version_id: &str,
        data_kind: &str,
        rows: &RecordBatch,
    ) -> data_lineage::Result<()> {
        self.batches.lock().unwrap().push((
            version_id.to_string(),
            data_kind.to_string(),
            rows.num_rows(),
        ));
        Ok(())
    }
}

struct FailingMirror;

impl VersionMirror for FailingMirror {
    fn persist_version(&self, _version: &Version) -> data_lineage::Result<()> {
        Err(Error::Other("database offline".to_string()))
    }

    fn persist_rows(&self, _: &str, _: &str, _: &RecordBatch) -> data_lineage::Result<()> {
        Err(Error::Other("database offline".to_string()))
    }
}

#[test]
fn test_mirror_receives_versions_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mirror = RecordingMirror::default();
    let versioning = Versioning::builder()
        .root_dir(dir.path())
        .mirror(mirror.clone())
        .build()
        .unwrap();

    let id = versioning.create_version("mirrored", None, None).unwrap();
    versioning.add_data(&id, "processed", &processed_batch(7)).unwrap();

    assert_eq!(*mirror.versions.lock().unwrap(), ["mirrored"]);
    assert_eq!(
        *mirror.batches.lock().unwrap(),
        [(id, "processed".to_string(), 7)]
    );
}

#[test]
fn test_mirror_failure_does_not_roll_back() {
    let dir = tempfile::tempdir().unwrap();
    let versioning = Versioning::builder()
        .root_dir(dir.path())
        .mirror(FailingMirror)
        .build()
        .unwrap();

    let id = versioning.create_version("v", None, None).unwrap();
    versioning.add_data(&id, "processed", &processed_batch(1)).unwrap();

    assert!(versioning.check(&id).unwrap().valid);
}

#[test]
fn test_null_mirror_is_default() {
    let dir = tempfile::tempdir().unwrap();
    let versioning = Versioning::builder()
        .root_dir(dir.path())
        .mirror(NullMirror)
        .build()
        .unwrap();
    assert!(versioning.history().unwrap().is_empty());
}
