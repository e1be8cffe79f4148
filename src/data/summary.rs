//! Descriptive statistics over a subset of rows: column overview, `describe`,
//! grouped aggregates, distributions and correlations.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use super::model::{AirQualityDataset, CellValue, ColumnType, DATE_COLUMN, TARGET_COLUMN};

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnOverview {
    pub name: String,
    pub dtype: ColumnType,
    pub missing: usize,
    pub missing_pct: f64,
}

/// Name, dtype and missing-value share of every column.
pub fn column_overview(dataset: &AirQualityDataset, rows: &[usize]) -> Vec<ColumnOverview> {
    dataset
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let missing = rows
                .iter()
                .filter(|&&r| dataset.value(r, idx).is_null())
                .count();
            let missing_pct = if rows.is_empty() {
                0.0
            } else {
                missing as f64 * 100.0 / rows.len() as f64
            };
            ColumnOverview {
                name: col.name.clone(),
                dtype: col.dtype,
                missing,
                missing_pct,
            }
        })
        .collect()
}

/// One line of a pandas-style `describe()`.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n − 1).
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

pub fn describe(dataset: &AirQualityDataset, rows: &[usize]) -> Vec<NumericSummary> {
    dataset
        .numeric_columns()
        .into_iter()
        .filter_map(|name| {
            let mut values = present_values(dataset, name, rows)?;
            values.sort_by(f64::total_cmp);
            let count = values.len();
            let mean = mean(&values);
            let std = if count > 1 {
                (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64)
                    .sqrt()
            } else {
                f64::NAN
            };
            Some(NumericSummary {
                column: name.to_string(),
                count,
                mean,
                std,
                min: values.first().copied().unwrap_or(f64::NAN),
                q25: quantile(&values, 0.25),
                median: quantile(&values, 0.5),
                q75: quantile(&values, 0.75),
                max: values.last().copied().unwrap_or(f64::NAN),
            })
        })
        .collect()
}

/// Linear-interpolated quantile of an ascending slice; NaN when empty.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn present_values(dataset: &AirQualityDataset, column: &str, rows: &[usize]) -> Option<Vec<f64>> {
    Some(
        dataset
            .numeric_values(column, rows)?
            .into_iter()
            .flatten()
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Grouped aggregates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Mean,
    Median,
}

/// Aggregate `value` per distinct `key`, ordered by key. Null keys and null
/// values are ignored; groups with no values are omitted.
pub fn group_by(
    dataset: &AirQualityDataset,
    rows: &[usize],
    key: &str,
    value: &str,
    aggregate: Aggregate,
) -> Vec<(CellValue, f64)> {
    let (Some(key_idx), Some(value_idx)) = (dataset.column_index(key), dataset.column_index(value))
    else {
        return Vec::new();
    };

    let mut groups: BTreeMap<&CellValue, Vec<f64>> = BTreeMap::new();
    for &r in rows {
        let k = dataset.value(r, key_idx);
        if k.is_null() {
            continue;
        }
        if let Some(v) = dataset.value(r, value_idx).as_f64() {
            groups.entry(k).or_default().push(v);
        }
    }

    groups
        .into_iter()
        .map(|(k, mut vals)| {
            let agg = match aggregate {
                Aggregate::Mean => mean(&vals),
                Aggregate::Median => {
                    vals.sort_by(f64::total_cmp);
                    quantile(&vals, 0.5)
                }
            };
            (k.clone(), agg)
        })
        .collect()
}

/// The `n` groups with the largest aggregate, largest first.
pub fn top_n(mut groups: Vec<(CellValue, f64)>, n: usize) -> Vec<(CellValue, f64)> {
    groups.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    groups.truncate(n);
    groups
}

/// Median of each listed column over the given rows (columns that are
/// absent or entirely null are left out).
pub fn medians(dataset: &AirQualityDataset, rows: &[usize], columns: &[&str]) -> BTreeMap<String, f64> {
    columns
        .iter()
        .filter_map(|&col| {
            let mut values = present_values(dataset, col, rows)?;
            if values.is_empty() {
                return None;
            }
            values.sort_by(f64::total_cmp);
            Some((col.to_string(), quantile(&values, 0.5)))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Trend and distributions
// ---------------------------------------------------------------------------

/// AQI per calendar month, keyed by the first day of the month. Each date's
/// AQI is averaged over its rows first, then each month averages its dates.
/// Months without a value are omitted.
pub fn monthly_trend(dataset: &AirQualityDataset, rows: &[usize]) -> Vec<(NaiveDate, f64)> {
    let (Some(date_idx), Some(aqi_idx)) = (
        dataset.column_index(DATE_COLUMN),
        dataset.column_index(TARGET_COLUMN),
    ) else {
        return Vec::new();
    };

    let mut daily: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for &r in rows {
        let date = dataset.value(r, date_idx).as_date();
        let aqi = dataset.value(r, aqi_idx).as_f64();
        if let (Some(date), Some(aqi)) = (date, aqi) {
            daily.entry(date).or_default().push(aqi);
        }
    }

    let mut monthly: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for (date, values) in daily {
        if let Some(first) = date.with_day(1) {
            monthly.entry(first).or_default().push(mean(&values));
        }
    }
    monthly
        .into_iter()
        .map(|(month, means)| (month, mean(&means)))
        .collect()
}

/// Box-plot figures for one group.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub group: CellValue,
    /// Rows with this key, including those with a null value.
    pub count: usize,
    pub lower_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub upper_whisker: f64,
    /// Values more than 1.5 × IQR outside the quartiles, ascending.
    pub outliers: Vec<f64>,
}

/// Distribution of `value` for the `top_n_by_count` keys with the most rows,
/// most frequent first (ties by key). Whiskers reach the furthest values
/// within 1.5 × IQR. Keys whose values are all null are dropped.
pub fn box_stats(
    dataset: &AirQualityDataset,
    rows: &[usize],
    key: &str,
    value: &str,
    top_n_by_count: usize,
) -> Vec<BoxStats> {
    let (Some(key_idx), Some(value_idx)) = (dataset.column_index(key), dataset.column_index(value))
    else {
        return Vec::new();
    };

    let mut groups: BTreeMap<&CellValue, (usize, Vec<f64>)> = BTreeMap::new();
    for &r in rows {
        let k = dataset.value(r, key_idx);
        if k.is_null() {
            continue;
        }
        let (count, values) = groups.entry(k).or_default();
        *count += 1;
        if let Some(v) = dataset.value(r, value_idx).as_f64() {
            values.push(v);
        }
    }

    let mut ranked: Vec<_> = groups.into_iter().collect();
    ranked.sort_by_key(|(_, (count, _))| Reverse(*count));

    ranked
        .into_iter()
        .take(top_n_by_count)
        .filter(|(_, (_, values))| !values.is_empty())
        .map(|(group, (count, mut values))| {
            values.sort_by(f64::total_cmp);
            let q1 = quantile(&values, 0.25);
            let q3 = quantile(&values, 0.75);
            let fence = 1.5 * (q3 - q1);
            let (lo, hi) = (q1 - fence, q3 + fence);
            BoxStats {
                group: group.clone(),
                count,
                lower_whisker: values.iter().copied().find(|&v| v >= lo).unwrap_or(q1),
                q1,
                median: quantile(&values, 0.5),
                q3,
                upper_whisker: values.iter().rev().copied().find(|&v| v <= hi).unwrap_or(q3),
                outliers: values.iter().copied().filter(|&v| v < lo || v > hi).collect(),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Correlation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// `values[i][j]` = Pearson r between `columns[i]` and `columns[j]`.
    pub values: Vec<Vec<f64>>,
}

/// Pairwise Pearson correlation using, for each pair, the rows where both
/// values are present. Absent columns are skipped.
pub fn correlation_matrix(
    dataset: &AirQualityDataset,
    rows: &[usize],
    columns: &[&str],
) -> CorrelationMatrix {
    let series: Vec<(String, Vec<Option<f64>>)> = columns
        .iter()
        .filter_map(|&c| Some((c.to_string(), dataset.numeric_values(c, rows)?)))
        .collect();

    let values = series
        .iter()
        .map(|(_, a)| series.iter().map(|(_, b)| pearson(a, b)).collect())
        .collect();

    CorrelationMatrix {
        columns: series.into_iter().map(|(name, _)| name).collect(),
        values,
    }
}

fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    sxy / (sxx * syy).sqrt()
}
