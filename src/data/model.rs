use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Well-known column names
// ---------------------------------------------------------------------------

pub const DATE_COLUMN: &str = "Date";
pub const CITY_COLUMN: &str = "City";
pub const TARGET_COLUMN: &str = "AQI";
pub const BUCKET_COLUMN: &str = "AQI_Bucket";

pub const YEAR_COLUMN: &str = "Year";
pub const MONTH_COLUMN: &str = "Month";
pub const DAY_OF_WEEK_COLUMN: &str = "DayOfWeek";
pub const IS_WEEKEND_COLUMN: &str = "IsWeekend";

/// Temporal fields derived from `Date`, in the order they are appended.
pub const TEMPORAL_COLUMNS: [&str; 4] = [
    YEAR_COLUMN,
    MONTH_COLUMN,
    DAY_OF_WEEK_COLUMN,
    IS_WEEKEND_COLUMN,
];

/// Pollutant concentration columns of the cleaned dataset.
pub const POLLUTANT_COLUMNS: [&str; 11] = [
    "PM2.5", "PM10", "NO", "NO2", "NH3", "CO", "SO2", "O3", "Benzene", "Toluene", "Xylene",
];

// ---------------------------------------------------------------------------
// CellValue – a single cell of the table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring the pandas dtypes of the dataset.
/// Category vocabularies and filters live in `BTreeSet`s, so `CellValue`
/// must be `Ord`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    Null,
}

// -- Manual Eq/Ord so we can put CellValue in BTreeSet --

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
                Date(_) => 5,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (Date(a), Date(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::String(s) => s.hash(state),
            CellValue::Date(d) => d.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => f.to_bits().hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::Null => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl CellValue {
    /// Interpret the value as an `f64`. Booleans count as 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) if !v.is_nan() => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Convert the value to the representation a column of `dtype` would
    /// hold, so that e.g. `Bool(true)` matches an integer `1` category.
    /// Values that cannot be represented are returned unchanged.
    pub fn coerce_to(&self, dtype: ColumnType) -> CellValue {
        match (self, dtype) {
            (CellValue::Null, _) => CellValue::Null,
            (CellValue::Bool(b), ColumnType::Integer) => CellValue::Integer(*b as i64),
            (CellValue::Bool(b), ColumnType::Float) => CellValue::Float(*b as i64 as f64),
            (CellValue::Integer(i), ColumnType::Float) => CellValue::Float(*i as f64),
            (CellValue::Integer(i), ColumnType::Bool) if *i == 0 || *i == 1 => {
                CellValue::Bool(*i == 1)
            }
            (CellValue::Float(v), ColumnType::Integer) if v.fract() == 0.0 => {
                CellValue::Integer(*v as i64)
            }
            (CellValue::String(s), ColumnType::Integer) => s
                .trim()
                .parse::<i64>()
                .map(CellValue::Integer)
                .unwrap_or_else(|_| self.clone()),
            (CellValue::String(s), ColumnType::Float) => s
                .trim()
                .parse::<f64>()
                .map(CellValue::Float)
                .unwrap_or_else(|_| self.clone()),
            (other, ColumnType::String) if !matches!(other, CellValue::String(_)) => {
                CellValue::String(other.to_string())
            }
            _ => self.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Integer,
    Float,
    Bool,
    Date,
    String,
}

impl ColumnType {
    /// Numeric in the pandas `select_dtypes(np.number)` sense: booleans are not.
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "int64",
            ColumnType::Float => "float64",
            ColumnType::Bool => "bool",
            ColumnType::Date => "datetime",
            ColumnType::String => "object",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    pub name: String,
    pub dtype: ColumnType,
}

// ---------------------------------------------------------------------------
// Record – one city-day row
// ---------------------------------------------------------------------------

/// One row of the table; `values[i]` belongs to `columns[i]`.
#[derive(Debug, Clone, PartialEq, Hash)]
pub struct Record {
    pub values: Vec<CellValue>,
}

// ---------------------------------------------------------------------------
// AirQualityDataset – the complete loaded table
// ---------------------------------------------------------------------------

/// The full parsed table. Built once by the loader and shared read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct AirQualityDataset {
    columns: Vec<Column>,
    records: Vec<Record>,
}

impl AirQualityDataset {
    /// Build a dataset, checking that every record is as wide as the header.
    pub fn new(columns: Vec<Column>, records: Vec<Record>) -> crate::Result<Self> {
        if let Some((row, rec)) = records
            .iter()
            .enumerate()
            .find(|(_, r)| r.values.len() != columns.len())
        {
            return Err(crate::Error::SchemaMismatch {
                column: format!("<row {row}>"),
                reason: format!(
                    "record has {} values but the header has {} columns",
                    rec.values.len(),
                    columns.len()
                ),
            });
        }
        Ok(Self { columns, records })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn value(&self, row: usize, column: usize) -> &CellValue {
        &self.records[row].values[column]
    }

    /// All values of a column in row order, or `None` if the column is absent.
    pub fn column_values(&self, name: &str) -> Option<impl Iterator<Item = &CellValue>> {
        let idx = self.column_index(name)?;
        Some(self.records.iter().map(move |r| &r.values[idx]))
    }

    /// Numeric view of a column for the given rows; nulls become `None`.
    pub fn numeric_values(&self, name: &str, rows: &[usize]) -> Option<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        Some(
            rows.iter()
                .map(|&r| self.records[r].values[idx].as_f64())
                .collect(),
        )
    }

    /// Sorted distinct values of a column.
    pub fn unique_values(&self, name: &str) -> BTreeSet<CellValue> {
        self.column_values(name)
            .map(|vals| vals.cloned().collect())
            .unwrap_or_default()
    }

    /// Names of the numeric (`Integer`/`Float`) columns, in schema order.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.dtype.is_numeric())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Earliest and latest `Date`.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let dates = self.column_values(DATE_COLUMN)?;
        dates.filter_map(CellValue::as_date).fold(None, |acc, d| match acc {
            None => Some((d, d)),
            Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
        })
    }

    /// A dataset with the same schema and only the given rows.
    pub fn subset(&self, rows: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            records: rows.iter().map(|&r| self.records[r].clone()).collect(),
        }
    }

    /// Replace one cell, returning a new dataset. The original is untouched.
    pub fn with_value(&self, row: usize, column: &str, value: CellValue) -> crate::Result<Self> {
        let idx = self
            .column_index(column)
            .ok_or_else(|| crate::Error::missing_column(column))?;
        let mut copy = self.clone();
        copy.records[row].values[idx] = value;
        Ok(copy)
    }
}

// ---------------------------------------------------------------------------
// Temporal features
// ---------------------------------------------------------------------------

/// `Year`, `Month`, `DayOfWeek` (Monday = 0) and `IsWeekend` for a date,
/// in [`TEMPORAL_COLUMNS`] order.
pub fn temporal_fields(date: NaiveDate) -> [(&'static str, CellValue); 4] {
    let weekday = date.weekday();
    [
        (YEAR_COLUMN, CellValue::Integer(date.year() as i64)),
        (MONTH_COLUMN, CellValue::Integer(date.month() as i64)),
        (
            DAY_OF_WEEK_COLUMN,
            CellValue::Integer(weekday.num_days_from_monday() as i64),
        ),
        (
            IS_WEEKEND_COLUMN,
            CellValue::Bool(matches!(weekday, Weekday::Sat | Weekday::Sun)),
        ),
    ]
}

pub(crate) fn temporal_dtype(column: &str) -> ColumnType {
    if column == IS_WEEKEND_COLUMN {
        ColumnType::Bool
    } else {
        ColumnType::Integer
    }
}

// ---------------------------------------------------------------------------
// AQI categories
// ---------------------------------------------------------------------------

/// The `AQI_Bucket` scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AqiCategory {
    Good,
    Satisfactory,
    Moderate,
    Poor,
    VeryPoor,
    Severe,
}

impl AqiCategory {
    pub fn from_aqi(aqi: f64) -> Self {
        match aqi {
            a if a <= 50.0 => AqiCategory::Good,
            a if a <= 100.0 => AqiCategory::Satisfactory,
            a if a <= 200.0 => AqiCategory::Moderate,
            a if a <= 300.0 => AqiCategory::Poor,
            a if a <= 400.0 => AqiCategory::VeryPoor,
            _ => AqiCategory::Severe,
        }
    }

    /// Label as written in the `AQI_Bucket` column.
    pub fn label(self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Satisfactory => "Satisfactory",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::Poor => "Poor",
            AqiCategory::VeryPoor => "Very Poor",
            AqiCategory::Severe => "Severe",
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporal_fields_use_monday_zero() {
        // 2020-01-04 was a Saturday.
        let date = NaiveDate::from_ymd_opt(2020, 1, 4).unwrap();
        let fields = temporal_fields(date);
        assert_eq!(fields[0].1, CellValue::Integer(2020));
        assert_eq!(fields[1].1, CellValue::Integer(1));
        assert_eq!(fields[2].1, CellValue::Integer(5));
        assert_eq!(fields[3].1, CellValue::Bool(true));
    }

    #[test]
    fn coerce_bridges_bool_and_integer_categories() {
        assert_eq!(
            CellValue::Bool(true).coerce_to(ColumnType::Integer),
            CellValue::Integer(1)
        );
        assert_eq!(
            CellValue::Integer(0).coerce_to(ColumnType::Bool),
            CellValue::Bool(false)
        );
        assert_eq!(
            CellValue::Integer(7).coerce_to(ColumnType::Bool),
            CellValue::Integer(7)
        );
        assert_eq!(
            CellValue::String("2019".into()).coerce_to(ColumnType::Integer),
            CellValue::Integer(2019)
        );
    }

    #[test]
    fn aqi_categories_follow_bucket_boundaries() {
        assert_eq!(AqiCategory::from_aqi(50.0), AqiCategory::Good);
        assert_eq!(AqiCategory::from_aqi(50.5), AqiCategory::Satisfactory);
        assert_eq!(AqiCategory::from_aqi(155.0), AqiCategory::Moderate);
        assert_eq!(AqiCategory::from_aqi(301.0), AqiCategory::VeryPoor);
        assert_eq!(AqiCategory::from_aqi(950.0), AqiCategory::Severe);
        assert_eq!(AqiCategory::VeryPoor.label(), "Very Poor");
    }

    #[test]
    fn equality_agrees_with_ordering() {
        use std::collections::BTreeSet;

        let nan = CellValue::Float(f64::NAN);
        assert_eq!(nan, nan.clone());
        assert_eq!(nan.cmp(&nan.clone()), std::cmp::Ordering::Equal);

        let zero = CellValue::Float(0.0);
        let neg_zero = CellValue::Float(-0.0);
        assert_ne!(zero, neg_zero);
        assert_ne!(zero.cmp(&neg_zero), std::cmp::Ordering::Equal);

        let set: BTreeSet<CellValue> = [nan.clone(), zero.clone(), neg_zero.clone()].into();
        assert_eq!(set.len(), 3);
        let sorted: Vec<CellValue> = set.into_iter().collect();
        assert!(sorted.binary_search(&nan).is_ok());
        assert!(sorted.binary_search(&neg_zero).is_ok());
    }

    #[test]
    fn ragged_records_are_rejected() {
        let columns = vec![
            Column { name: "a".into(), dtype: ColumnType::Integer },
            Column { name: "b".into(), dtype: ColumnType::Integer },
        ];
        let records = vec![Record { values: vec![CellValue::Integer(1)] }];
        assert!(AirQualityDataset::new(columns, records).is_err());
    }
}
