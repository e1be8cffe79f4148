//! Write a synthetic city-day air-quality table (5 cities, 2 years) for
//! trying the dashboard without real data.
//!
//! Usage: `generate_sample [OUT.csv | OUT.parquet]`

use std::path::PathBuf;

use anyhow::Context;

use aqi_forecast::data::synthetic::{generate, SyntheticConfig};
use aqi_forecast::data::write_file;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let output_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("air_quality_sample.csv"));

    let config = SyntheticConfig::default();
    let dataset = generate(&config);
    write_file(&dataset, &output_path)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    println!(
        "Wrote {} rows ({} cities) to {}",
        dataset.len(),
        config.cities.len(),
        output_path.display()
    );
    Ok(())
}
