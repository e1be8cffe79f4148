//! Column transform applied before the forest: numeric standardisation and
//! categorical one-hot encoding, fitted on training rows only.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::config::FeatureSpec;
use crate::data::model::{
    temporal_fields, AirQualityDataset, CellValue, ColumnType, CITY_COLUMN, DATE_COLUMN,
};
use crate::{Error, Result};

// ---------------------------------------------------------------------------
// Feature sources
// ---------------------------------------------------------------------------

/// Anything that can supply a value per input column.
pub trait FeatureSource {
    fn feature(&self, column: &str) -> Option<&CellValue>;
}

/// A free-standing input row, e.g. built from the prediction form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    values: BTreeMap<String, CellValue>,
}

impl FeatureRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: impl Into<String>, value: CellValue) -> &mut Self {
        self.values.insert(column.into(), value);
        self
    }

    pub fn with(mut self, column: impl Into<String>, value: CellValue) -> Self {
        self.set(column, value);
        self
    }

    /// A city-day row: `Date`, `City`, the temporal fields derived from the
    /// date, and the given pollutant concentrations.
    pub fn for_day<S: Into<String>>(
        city: &str,
        date: NaiveDate,
        pollutants: impl IntoIterator<Item = (S, f64)>,
    ) -> Self {
        let mut row = Self::new()
            .with(DATE_COLUMN, CellValue::Date(date))
            .with(CITY_COLUMN, CellValue::String(city.to_string()));
        for (name, value) in temporal_fields(date) {
            row.set(name, value);
        }
        for (name, value) in pollutants {
            row.set(name, CellValue::Float(value));
        }
        row
    }

    /// Copy of one dataset record.
    pub fn from_record(dataset: &AirQualityDataset, row: usize) -> Self {
        let values = dataset
            .columns()
            .iter()
            .zip(&dataset.records()[row].values)
            .map(|(c, v)| (c.name.clone(), v.clone()))
            .collect();
        Self { values }
    }
}

impl FeatureSource for FeatureRow {
    fn feature(&self, column: &str) -> Option<&CellValue> {
        self.values.get(column)
    }
}

/// A borrowed record of a dataset.
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    dataset: &'a AirQualityDataset,
    row: usize,
}

impl<'a> RecordView<'a> {
    pub fn new(dataset: &'a AirQualityDataset, row: usize) -> Self {
        Self { dataset, row }
    }
}

impl FeatureSource for RecordView<'_> {
    fn feature(&self, column: &str) -> Option<&CellValue> {
        let idx = self.dataset.column_index(column)?;
        Some(self.dataset.value(self.row, idx))
    }
}

// ---------------------------------------------------------------------------
// Partition of input columns
// ---------------------------------------------------------------------------

/// Input columns split into standardised and one-hot encoded sets. Total
/// and disjoint over every non-target, non-excluded column of the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePartition {
    pub numerical: Vec<String>,
    pub categorical: Vec<String>,
}

impl FeaturePartition {
    pub fn resolve(spec: &FeatureSpec, dataset: &AirQualityDataset) -> Result<Self> {
        let target = dataset
            .column(&spec.target)
            .ok_or_else(|| Error::missing_column(&spec.target))?;
        if !target.dtype.is_numeric() {
            return Err(Error::SchemaMismatch {
                column: spec.target.clone(),
                reason: format!("target must be numeric, found {}", target.dtype),
            });
        }

        for col in &spec.categorical {
            if dataset.column_index(col).is_none() {
                return Err(Error::missing_column(col));
            }
        }
        if let Some(numerical) = &spec.numerical {
            for col in numerical {
                let column = dataset
                    .column(col)
                    .ok_or_else(|| Error::missing_column(col))?;
                if !column.dtype.is_numeric() {
                    return Err(Error::SchemaMismatch {
                        column: col.clone(),
                        reason: format!("numerical feature has dtype {}", column.dtype),
                    });
                }
            }
        }

        let mut numerical = spec.numerical.clone().unwrap_or_default();
        for column in dataset.columns() {
            let name = &column.name;
            if *name == spec.target
                || spec.excluded.contains(name)
                || spec.categorical.contains(name)
                || numerical.contains(name)
            {
                continue;
            }
            if spec.numerical.is_none() && column.dtype.is_numeric() {
                numerical.push(name.clone());
            } else {
                return Err(Error::UnclassifiedColumn {
                    column: name.clone(),
                });
            }
        }

        Ok(Self {
            numerical,
            categorical: spec.categorical.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// StandardScaler
// ---------------------------------------------------------------------------

/// Per-column `(x − mean) / scale`, with population standard deviation.
/// Missing values are imputed with the mean, i.e. transform to 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub columns: Vec<String>,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit<S: FeatureSource>(columns: &[String], rows: &[S]) -> Self {
        let (means, scales): (Vec<f64>, Vec<f64>) = columns
            .iter()
            .map(|col| {
                let values: Vec<f64> = rows
                    .iter()
                    .filter_map(|r| r.feature(col).and_then(CellValue::as_f64))
                    .collect();
                if values.is_empty() {
                    return (0.0, 1.0);
                }
                let n = values.len() as f64;
                let mean = values.iter().sum::<f64>() / n;
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                // Near-constant columns are only centred.
                let scale = if std <= 10.0 * f64::EPSILON * mean.abs().max(1.0) {
                    1.0
                } else {
                    std
                };
                (mean, scale)
            })
            .unzip();
        Self {
            columns: columns.to_vec(),
            means,
            scales,
        }
    }

    fn transform_into<S: FeatureSource + ?Sized>(&self, source: &S, out: &mut Vec<f64>) -> Result<()> {
        for ((col, mean), scale) in self.columns.iter().zip(&self.means).zip(&self.scales) {
            let value = source.feature(col).ok_or_else(|| Error::missing_column(col))?;
            out.push(value.as_f64().map_or(0.0, |x| (x - mean) / scale));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// OneHotEncoder
// ---------------------------------------------------------------------------

/// One indicator per category seen during fitting; unseen values encode as
/// all zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub columns: Vec<String>,
    /// Training dtype of each column; inputs are coerced to it first.
    pub dtypes: Vec<ColumnType>,
    /// Sorted categories per column.
    pub categories: Vec<Vec<CellValue>>,
}

impl OneHotEncoder {
    pub fn fit<S: FeatureSource>(columns: &[String], dtypes: &[ColumnType], rows: &[S]) -> Self {
        let categories = columns
            .iter()
            .map(|col| {
                let seen: BTreeSet<CellValue> =
                    rows.iter().filter_map(|r| r.feature(col).cloned()).collect();
                seen.into_iter().collect()
            })
            .collect();
        Self {
            columns: columns.to_vec(),
            dtypes: dtypes.to_vec(),
            categories,
        }
    }

    pub fn n_features(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    fn feature_names(&self) -> impl Iterator<Item = String> + '_ {
        self.columns
            .iter()
            .zip(&self.categories)
            .flat_map(|(col, cats)| cats.iter().map(move |c| format!("{col}_{c}")))
    }

    fn transform_into<S: FeatureSource + ?Sized>(&self, source: &S, out: &mut Vec<f64>) -> Result<()> {
        for ((col, dtype), cats) in self.columns.iter().zip(&self.dtypes).zip(&self.categories) {
            let value = source
                .feature(col)
                .ok_or_else(|| Error::missing_column(col))?
                .coerce_to(*dtype);
            let start = out.len();
            out.resize(start + cats.len(), 0.0);
            if let Ok(pos) = cats.binary_search(&value) {
                out[start + pos] = 1.0;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FeaturePipeline
// ---------------------------------------------------------------------------

/// Fitted scaler + encoder. Output layout: numeric columns, then one block
/// per categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePipeline {
    partition: FeaturePartition,
    scaler: StandardScaler,
    encoder: OneHotEncoder,
    feature_names: Vec<String>,
}

impl FeaturePipeline {
    /// Fit on the given dataset rows only.
    pub fn fit(
        partition: FeaturePartition,
        dataset: &AirQualityDataset,
        train_rows: &[usize],
    ) -> Result<Self> {
        let views: Vec<RecordView<'_>> = train_rows
            .iter()
            .map(|&r| RecordView::new(dataset, r))
            .collect();
        let dtypes = partition
            .categorical
            .iter()
            .map(|c| {
                dataset
                    .column(c)
                    .map(|col| col.dtype)
                    .ok_or_else(|| Error::missing_column(c))
            })
            .collect::<Result<Vec<_>>>()?;

        let scaler = StandardScaler::fit(&partition.numerical, &views);
        let encoder = OneHotEncoder::fit(&partition.categorical, &dtypes, &views);
        let feature_names = partition
            .numerical
            .iter()
            .cloned()
            .chain(encoder.feature_names())
            .collect();

        Ok(Self {
            partition,
            scaler,
            encoder,
            feature_names,
        })
    }

    pub fn transform<S: FeatureSource + ?Sized>(&self, source: &S) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(self.feature_names.len());
        self.scaler.transform_into(source, &mut out)?;
        self.encoder.transform_into(source, &mut out)?;
        Ok(out)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn partition(&self) -> &FeaturePartition {
        &self.partition
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Categories learned for a one-hot column.
    pub fn categories(&self, column: &str) -> Option<&[CellValue]> {
        let idx = self.encoder.columns.iter().position(|c| c == column)?;
        Some(&self.encoder.categories[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Column, Record};

    fn dataset() -> AirQualityDataset {
        let columns = vec![
            Column { name: "Date".into(), dtype: ColumnType::Date },
            Column { name: "City".into(), dtype: ColumnType::String },
            Column { name: "PM2.5".into(), dtype: ColumnType::Float },
            Column { name: "IsWeekend".into(), dtype: ColumnType::Integer },
            Column { name: "AQI".into(), dtype: ColumnType::Float },
            Column { name: "AQI_Bucket".into(), dtype: ColumnType::String },
        ];
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let rows = [
            ("Delhi", Some(10.0), 0, 50.0),
            ("Pune", Some(20.0), 1, 60.0),
            ("Delhi", None, 0, 70.0),
            ("Agra", Some(30.0), 1, 80.0),
        ];
        let records = rows
            .iter()
            .map(|(city, pm, weekend, aqi)| Record {
                values: vec![
                    CellValue::Date(date),
                    CellValue::String(city.to_string()),
                    pm.map(CellValue::Float).unwrap_or(CellValue::Null),
                    CellValue::Integer(*weekend),
                    CellValue::Float(*aqi),
                    CellValue::String("Good".into()),
                ],
            })
            .collect();
        AirQualityDataset::new(columns, records).unwrap()
    }

    fn spec() -> FeatureSpec {
        FeatureSpec {
            categorical: vec!["City".into(), "IsWeekend".into()],
            ..Default::default()
        }
    }

    #[test]
    fn partition_auto_detects_numeric_columns() {
        let partition = FeaturePartition::resolve(&spec(), &dataset()).unwrap();
        assert_eq!(partition.numerical, vec!["PM2.5"]);
        assert_eq!(partition.categorical, vec!["City", "IsWeekend"]);
    }

    #[test]
    fn missing_categorical_column_is_schema_mismatch() {
        let err = FeaturePartition::resolve(&FeatureSpec::default(), &dataset()).unwrap_err();
        match err {
            Error::SchemaMismatch { column, .. } => assert_eq!(column, "Year"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unclassified_string_column_is_rejected() {
        let spec = FeatureSpec {
            categorical: vec!["IsWeekend".into()],
            ..Default::default()
        };
        assert!(matches!(
            FeaturePartition::resolve(&spec, &dataset()),
            Err(Error::UnclassifiedColumn { column }) if column == "City"
        ));
    }

    #[test]
    fn pipeline_uses_training_rows_only() {
        let ds = dataset();
        let partition = FeaturePartition::resolve(&spec(), &ds).unwrap();
        let pipeline = FeaturePipeline::fit(partition, &ds, &[0, 1, 2]).unwrap();

        // Mean over present training values (10, 20), population std 5.
        assert_eq!(pipeline.scaler().means, vec![15.0]);
        assert_eq!(pipeline.scaler().scales, vec![5.0]);
        // "Agra" only occurs in row 3, outside the training rows.
        assert_eq!(
            pipeline.feature_names(),
            ["PM2.5", "City_Delhi", "City_Pune", "IsWeekend_0", "IsWeekend_1"]
        );

        let agra = pipeline.transform(&RecordView::new(&ds, 3)).unwrap();
        assert_eq!(agra, vec![3.0, 0.0, 0.0, 0.0, 1.0]);

        let imputed = pipeline.transform(&RecordView::new(&ds, 2)).unwrap();
        assert_eq!(imputed, vec![0.0, 1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn form_rows_are_coerced_to_training_dtypes() {
        let ds = dataset();
        let partition = FeaturePartition::resolve(&spec(), &ds).unwrap();
        let pipeline = FeaturePipeline::fit(partition, &ds, &[0, 1, 2, 3]).unwrap();

        // IsWeekend was an integer column; the form supplies a bool.
        let row = FeatureRow::new()
            .with("City", CellValue::String("Pune".into()))
            .with("PM2.5", CellValue::Float(20.0))
            .with("IsWeekend", CellValue::Bool(true));
        let x = pipeline.transform(&row).unwrap();
        assert_eq!(&x[1..], &[0.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn absent_input_column_is_an_error() {
        let ds = dataset();
        let partition = FeaturePartition::resolve(&spec(), &ds).unwrap();
        let pipeline = FeaturePipeline::fit(partition, &ds, &[0, 1]).unwrap();
        let row = FeatureRow::new().with("City", CellValue::String("Pune".into()));
        assert!(matches!(
            pipeline.transform(&row),
            Err(Error::SchemaMismatch { .. })
        ));
    }
}
