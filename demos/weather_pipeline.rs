//! Weather pipeline demo
//!
//! A producer stores cleaned readings and daily statistics under a new
//! version; a consumer reloads them by id, verifies the files and prints
//! the version's lineage.
//!
//! Run with: `cargo run --example weather_pipeline`
//! Log level: `RUST_LOG=debug cargo run --example weather_pipeline`

use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use data_lineage::{telemetry, Config, NewVersion, Versioning};
use std::sync::Arc;

const CITIES: [&str; 4] = ["London", "Tokyo", "Lagos", "Lima"];

#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_possible_wrap)]
fn processed_weather(hours: usize) -> anyhow::Result<RecordBatch> {
    let rows = hours * CITIES.len();
    let schema = Schema::new(vec![
        Field::new("city", DataType::Utf8, false),
        Field::new("hour", DataType::Int64, false),
        Field::new("temp", DataType::Float64, true),
    ]);
    Ok(RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(StringArray::from_iter_values(
                (0..rows).map(|i| CITIES[i % CITIES.len()]),
            )),
            Arc::new(Int64Array::from_iter_values(
                (0..rows).map(|i| (i / CITIES.len()) as i64),
            )),
            Arc::new(Float64Array::from_iter((0..rows).map(|i| {
                // One sensor dropout per day
                (i % 97 != 0).then(|| 10.0 + (i % 13) as f64 * 0.7)
            }))),
        ],
    )?)
}

fn daily_stats(processed: &RecordBatch) -> anyhow::Result<RecordBatch> {
    let temps = processed
        .column(2)
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| anyhow::anyhow!("temp column is not Float64"))?;

    let mut means = Vec::with_capacity(CITIES.len());
    for (slot, _) in CITIES.iter().enumerate() {
        let values: Vec<f64> = temps
            .iter()
            .enumerate()
            .filter(|(i, _)| i % CITIES.len() == slot)
            .filter_map(|(_, t)| t)
            .collect();
        #[allow(clippy::cast_precision_loss)]
        means.push(values.iter().sum::<f64>() / values.len().max(1) as f64);
    }

    let schema = Schema::new(vec![
        Field::new("city", DataType::Utf8, false),
        Field::new("temp_mean", DataType::Float64, false),
    ]);
    Ok(RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(StringArray::from(CITIES.to_vec())),
            Arc::new(Float64Array::from(means)),
        ],
    )?)
}

fn main() -> anyhow::Result<()> {
    telemetry::init("info");

    let scratch = tempfile_root()?;
    let config = Config::with_root(&scratch);
    let versioning = Versioning::open(&config)?;

    println!("=== Producer ===");
    let baseline = versioning.create_version("baseline", Some("initial backfill"), None)?;
    versioning.add_data(&baseline, "processed_weather", &processed_weather(12)?)?;

    let processed = processed_weather(24)?;
    let stats = daily_stats(&processed)?;
    let version = versioning.create(
        NewVersion::new("daily refresh")
            .description("24h of cleaned readings")
            .metadata("raw_files_count", 4_i64)
            .metadata("processed_files_count", 1_i64),
    )?;
    let id = version.id().to_string();
    versioning.add_data(&id, "processed_weather", &processed)?;
    versioning.add_data(&id, "daily_stats", &stats)?;
    println!("created version {id} (parent {:?})", version.parent_id());

    println!("\n=== Consumer ===");
    let latest = versioning
        .latest()?
        .ok_or_else(|| anyhow::anyhow!("registry is empty"))?;
    let rows = versioning.load(&latest, Some("processed_weather"))?;
    let stats = versioning.load(&latest, Some("daily_stats"))?;
    println!("latest {latest}: {} readings, {} stat rows", rows.num_rows(), stats.num_rows());

    println!("\n=== Integrity ===");
    for report in versioning.check_all_active()? {
        println!(
            "{} ({}): {}/{} valid",
            report.version_name, report.version_id, report.files_valid, report.files_checked
        );
    }

    println!("\n=== Lineage ===");
    let lineage = versioning.lineage()?;
    for ancestor in lineage.ancestors(&latest)? {
        let parent = versioning.registry().get(&ancestor)?;
        println!("  <- {} ({})", parent.name(), parent.id());
    }

    println!("\nRegistry document: {}", config.registry_path().display());
    Ok(())
}

/// Fresh directory under the system temp dir so repeated runs do not chain
fn tempfile_root() -> anyhow::Result<std::path::PathBuf> {
    let root = std::env::temp_dir().join(format!(
        "data-lineage-demo-{}",
        chrono::Utc::now().format("%Y%m%d%H%M%S%f")
    ));
    std::fs::create_dir_all(&root)?;
    Ok(root)
}
