//! End-to-end training and prediction through the public API.

mod common;

use chrono::NaiveDate;

use aqi_forecast::data::model::{CellValue, Column, ColumnType, Record};
use aqi_forecast::data::synthetic::{generate, SyntheticConfig};
use aqi_forecast::data::{load_file_with, AirQualityDataset, DateErrorPolicy, LoadOptions};
use aqi_forecast::model::{fit_and_evaluate, FeatureRow, RecordView, Trainer, TrainerConfig};
use aqi_forecast::Error;

use common::{quick_trainer, synthetic, temp_file};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn median_pollutants() -> Vec<(&'static str, f64)> {
    aqi_forecast::data::model::POLLUTANT_COLUMNS
        .iter()
        .map(|&p| (p, 25.0))
        .collect()
}

#[test]
fn thousand_row_scenario_learns_the_pm_signal() {
    let ds = generate(&SyntheticConfig::default());
    assert_eq!(ds.len(), 1000);

    let eval = fit_and_evaluate(&ds, 0.2, 42).unwrap();
    assert_eq!(eval.n_test(), 200);
    assert_eq!(eval.n_train(), 800);
    assert!(
        eval.accuracy_score > 0.8,
        "R² too low: {}",
        eval.accuracy_score
    );
    let top = &eval.feature_importances[0].feature;
    assert!(top == "PM2.5" || top == "PM10", "top feature was {top}");
}

#[test]
fn identical_inputs_give_identical_results() {
    let ds = synthetic(40);
    let a = quick_trainer(15).fit_and_evaluate(&ds).unwrap();
    let b = quick_trainer(15).fit_and_evaluate(&ds).unwrap();

    assert_eq!(a.accuracy_score.to_bits(), b.accuracy_score.to_bits());
    assert_eq!(a.rmse.to_bits(), b.rmse.to_bits());
    assert_eq!(a.feature_importances, b.feature_importances);
    assert_eq!(a.split, b.split);
}

#[test]
fn scaler_is_fitted_on_training_rows_only() {
    let ds = synthetic(60);
    let trainer = quick_trainer(5);
    let before = trainer.fit_and_evaluate(&ds).unwrap();

    // Corrupt every held-out row; the split depends only on row count and seed.
    let mut perturbed = ds.clone();
    for &r in &before.split.test {
        perturbed = perturbed
            .with_value(r, "PM2.5", CellValue::Float(10_000.0))
            .unwrap();
    }
    let after = trainer.fit_and_evaluate(&perturbed).unwrap();
    assert_eq!(before.split, after.split);

    let means_before = &before.model.pipeline().scaler().means;
    let means_after = &after.model.pipeline().scaler().means;
    assert_eq!(means_before, means_after);

    let pm25 = before
        .model
        .pipeline()
        .scaler()
        .columns
        .iter()
        .position(|c| c == "PM2.5")
        .unwrap();
    let all_rows: Vec<usize> = (0..perturbed.len()).collect();
    let full: Vec<f64> = perturbed
        .numeric_values("PM2.5", &all_rows)
        .unwrap()
        .into_iter()
        .flatten()
        .collect();
    let full_mean = full.iter().sum::<f64>() / full.len() as f64;
    assert!((full_mean - means_after[pm25]).abs() > 100.0);
}

#[test]
fn importances_are_ranked_and_sum_to_one() {
    let eval = quick_trainer(20).fit_and_evaluate(&synthetic(40)).unwrap();
    let sum: f64 = eval.feature_importances.iter().map(|f| f.importance).sum();
    assert!((sum - 1.0).abs() < 1e-6, "sum = {sum}");
    assert!(eval
        .feature_importances
        .windows(2)
        .all(|w| w[0].importance >= w[1].importance));
    assert_eq!(
        eval.feature_importances.len(),
        eval.model.pipeline().n_features()
    );
}

#[test]
fn unseen_city_still_predicts() {
    let eval = quick_trainer(10).fit_and_evaluate(&synthetic(40)).unwrap();
    let model = &eval.model;

    let row = FeatureRow::for_day("Atlantis", date(2020, 3, 1), median_pollutants());
    let aqi = model.predict(&row).unwrap();
    assert!(aqi.is_finite());

    // Any unseen city encodes the same way.
    let other = FeatureRow::for_day("Gotham", date(2020, 3, 1), median_pollutants());
    assert_eq!(model.predict(&other).unwrap(), aqi);
}

#[test]
fn prediction_reuses_the_fitted_pipeline() {
    let ds = synthetic(40);
    let eval = quick_trainer(10).fit_and_evaluate(&ds).unwrap();
    let model = &eval.model;

    let batch = model.predict_many(&ds).unwrap();
    assert_eq!(batch.len(), ds.len());
    for r in [0, 17, 199] {
        assert_eq!(model.predict(&RecordView::new(&ds, r)).unwrap(), batch[r]);
        assert_eq!(
            model.predict(&FeatureRow::from_record(&ds, r)).unwrap(),
            batch[r]
        );
    }
}

#[test]
fn missing_input_column_is_schema_mismatch() {
    let eval = quick_trainer(5).fit_and_evaluate(&synthetic(20)).unwrap();
    let row = FeatureRow::for_day("Delhi", date(2020, 3, 1), [("PM10", 80.0)]);
    assert!(matches!(
        eval.model.predict(&row),
        Err(Error::SchemaMismatch { .. })
    ));
}

#[test]
fn explicit_null_input_is_imputed() {
    let eval = quick_trainer(5).fit_and_evaluate(&synthetic(20)).unwrap();
    let mut row = FeatureRow::for_day("Delhi", date(2020, 3, 1), median_pollutants());
    row.set("PM2.5", CellValue::Null);
    assert!(eval.model.predict(&row).unwrap().is_finite());
}

#[test]
fn one_surviving_row_is_insufficient() {
    let file = temp_file(
        ".csv",
        "Date,City,PM2.5,AQI\n2020-01-01,Delhi,120,200\nyesterday,Delhi,80,150\n,Mumbai,60,90\n",
    );
    let options = LoadOptions {
        date_errors: DateErrorPolicy::Skip,
        ..Default::default()
    };
    let ds = load_file_with(file.path(), &options).unwrap();
    assert_eq!(ds.len(), 1);

    let err = quick_trainer(5).fit_and_evaluate(&ds).unwrap_err();
    assert!(matches!(err, Error::InsufficientData { rows: 1, .. }));
}

#[test]
fn two_rows_are_enough() {
    let file = temp_file(
        ".csv",
        "Date,City,PM2.5,AQI\n2020-01-01,Delhi,120,200\n2020-01-02,Mumbai,60,90\n",
    );
    let ds = aqi_forecast::data::load_file(file.path()).unwrap();
    let eval = quick_trainer(5).fit_and_evaluate(&ds).unwrap();
    assert_eq!((eval.n_train(), eval.n_test()), (1, 1));
}

#[test]
fn rows_without_target_are_ignored() {
    let ds = synthetic(20);
    let with_gap = ds.with_value(3, "AQI", CellValue::Null).unwrap();
    let eval = quick_trainer(5).fit_and_evaluate(&with_gap).unwrap();
    assert_eq!(eval.n_train() + eval.n_test(), ds.len() - 1);
    assert!(!eval.split.train.contains(&3) && !eval.split.test.contains(&3));
}

#[test]
fn unclassified_text_column_is_rejected() {
    let columns = vec![
        Column { name: "Date".into(), dtype: ColumnType::Date },
        Column { name: "City".into(), dtype: ColumnType::String },
        Column { name: "Station".into(), dtype: ColumnType::String },
        Column { name: "AQI".into(), dtype: ColumnType::Float },
    ];
    let records = (1..=5)
        .map(|d| Record {
            values: vec![
                CellValue::Date(date(2020, 1, d)),
                CellValue::String("Delhi".into()),
                CellValue::String("DL001".into()),
                CellValue::Float(100.0 + d as f64),
            ],
        })
        .collect();
    let ds = AirQualityDataset::new(columns, records).unwrap();

    let mut config = TrainerConfig {
        n_estimators: 5,
        ..Default::default()
    };
    config.features.categorical = vec!["City".into()];
    let err = Trainer::new(config).unwrap().fit_and_evaluate(&ds).unwrap_err();
    match err {
        Error::UnclassifiedColumn { column } => assert_eq!(column, "Station"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn overlapping_feature_lists_are_invalid() {
    let mut config = TrainerConfig::default();
    config.features.numerical = Some(vec!["City".into()]);
    assert!(matches!(
        Trainer::new(config),
        Err(Error::InvalidConfig(_))
    ));
}
