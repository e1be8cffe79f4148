//! File round-trips: datasets, trained models and trainer configuration.

mod common;

use std::sync::Arc;

use aqi_forecast::cache::{DatasetCache, ModelCache};
use aqi_forecast::data::{load_file, write_csv, write_file, LoadOptions};
use aqi_forecast::model::{TrainedModel, TrainerConfig};
use aqi_forecast::Error;

use common::{quick_trainer, synthetic, temp_file};

#[test]
fn csv_round_trip_reproduces_the_dataset() {
    let ds = synthetic(30);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("air.csv");

    write_csv(&ds, &path).unwrap();
    assert_eq!(load_file(&path).unwrap(), ds);
}

#[test]
fn parquet_round_trip_reproduces_the_dataset() {
    let ds = synthetic(30);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("air.parquet");

    write_file(&ds, &path).unwrap();
    assert_eq!(load_file(&path).unwrap(), ds);
}

#[test]
fn unknown_output_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        write_file(&synthetic(2), &dir.path().join("air.xlsx")),
        Err(Error::UnsupportedFormat(_))
    ));
}

#[test]
fn saved_model_predicts_like_the_original() {
    let ds = synthetic(30);
    let eval = quick_trainer(8).fit_and_evaluate(&ds).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");

    eval.model.save(&path).unwrap();
    let loaded = TrainedModel::load(&path).unwrap();

    assert_eq!(loaded.target(), "AQI");
    assert_eq!(loaded.pipeline().feature_names(), eval.model.pipeline().feature_names());
    let original = eval.model.predict_many(&ds).unwrap();
    let restored = loaded.predict_many(&ds).unwrap();
    for (a, b) in original.iter().zip(&restored) {
        assert!((a - b).abs() < 1e-6, "{a} vs {b}");
    }
}

#[test]
fn loading_a_missing_model_is_data_not_found() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        TrainedModel::load(&dir.path().join("absent.json")),
        Err(Error::DataNotFound { .. })
    ));
}

#[test]
fn trainer_config_reads_partial_json() {
    let file = temp_file(".json", r#"{ "n_estimators": 25, "max_depth": null }"#);
    let config = TrainerConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.n_estimators, 25);
    assert_eq!(config.max_depth, None);
    assert_eq!(config.random_seed, 42);
    assert_eq!(config.features.target, "AQI");

    let bad = temp_file(".json", r#"{ "split_fraction": 1.5 }"#);
    assert!(matches!(
        TrainerConfig::from_json_file(bad.path()),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn caches_serve_repeated_requests() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("air.csv");
    write_csv(&synthetic(20), &path).unwrap();

    let mut datasets = DatasetCache::new(LoadOptions::default());
    let mut models = ModelCache::new();
    let trainer = quick_trainer(5);

    let ds = datasets.get_or_load(&path).unwrap();
    let first = models.get_or_train(&trainer, &ds).unwrap();

    let again = datasets.get_or_load(&path).unwrap();
    assert!(Arc::ptr_eq(&ds, &again));
    assert!(Arc::ptr_eq(&first, &models.get_or_train(&trainer, &again).unwrap()));

    // A rewritten file with different content misses both caches.
    write_csv(&synthetic(10), &path).unwrap();
    let changed = datasets.get_or_load(&path).unwrap();
    assert_eq!(changed.len(), 50);
    let retrained = models.get_or_train(&trainer, &changed).unwrap();
    assert!(!Arc::ptr_eq(&first, &retrained));
    assert_eq!(models.len(), 1);

    models.clear();
    datasets.clear();
    assert!(models.is_empty() && datasets.is_empty());
}
