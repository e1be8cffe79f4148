//! Shared fixtures for the integration tests.

use std::io::Write;

use aqi_forecast::data::synthetic::{generate, SyntheticConfig};
use aqi_forecast::data::AirQualityDataset;
use aqi_forecast::model::{Trainer, TrainerConfig};

/// `days` dates × 5 cities of synthetic data.
pub fn synthetic(days: usize) -> AirQualityDataset {
    generate(&SyntheticConfig {
        days,
        ..Default::default()
    })
}

/// A trainer small enough for debug-mode tests.
pub fn quick_trainer(n_estimators: usize) -> Trainer {
    Trainer::new(TrainerConfig {
        n_estimators,
        ..Default::default()
    })
    .expect("valid config")
}

#[allow(dead_code)]
pub fn temp_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file.flush().expect("flush temp file");
    file
}
