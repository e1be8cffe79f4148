use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Date32Type, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use super::model::{
    temporal_dtype, temporal_fields, AirQualityDataset, CellValue, Column, ColumnType, Record,
    DATE_COLUMN, TEMPORAL_COLUMNS,
};
use crate::{Error, Result};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// What to do with a row whose `Date` does not parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateErrorPolicy {
    /// Abort the whole load with [`Error::MalformedRecord`].
    #[default]
    Fail,
    /// Drop the row and log a warning.
    Skip,
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub date_errors: DateErrorPolicy,
    /// Append `Year`, `Month`, `DayOfWeek`, `IsWeekend` when the file lacks them.
    pub derive_temporal: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            date_errors: DateErrorPolicy::Fail,
            derive_temporal: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load an air-quality table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.txt` – header row, one record per line
/// * `.parquet` / `.pq` – e.g. written by pandas `df.to_parquet()`
pub fn load_file(path: &Path) -> Result<AirQualityDataset> {
    load_file_with(path, &LoadOptions::default())
}

pub fn load_file_with(path: &Path, options: &LoadOptions) -> Result<AirQualityDataset> {
    if !path.is_file() {
        return Err(Error::DataNotFound {
            path: path.to_path_buf(),
        });
    }

    let raw = match extension(path).as_str() {
        "csv" | "txt" => read_csv(path)?,
        "parquet" | "pq" => read_parquet(path)?,
        other => return Err(Error::UnsupportedFormat(format!(".{other}"))),
    };

    let dataset = raw.into_dataset(options)?;
    log::info!(
        "Loaded {} records with {} columns from {}",
        dataset.len(),
        dataset.columns().len(),
        path.display()
    );
    Ok(dataset)
}

/// Write a dataset in the format named by the extension (`.csv`/`.txt` or
/// `.parquet`/`.pq`).
pub fn write_file(dataset: &AirQualityDataset, path: &Path) -> Result<()> {
    match extension(path).as_str() {
        "csv" | "txt" => write_csv(dataset, path),
        "parquet" | "pq" => write_parquet(dataset, path),
        other => Err(Error::UnsupportedFormat(format!(".{other}"))),
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::DataNotFound {
            path: path.to_path_buf(),
        },
        _ => Error::Io(e),
    })
}

// ---------------------------------------------------------------------------
// Raw, untyped table shared by both readers
// ---------------------------------------------------------------------------

struct RawColumn {
    name: String,
    /// Storage type known from the file schema (Parquet); `None` = infer.
    hint: Option<ColumnType>,
    cells: Vec<Option<String>>,
}

struct RawTable {
    columns: Vec<RawColumn>,
    n_rows: usize,
}

impl RawTable {
    fn into_dataset(self, options: &LoadOptions) -> Result<AirQualityDataset> {
        let date_idx = self
            .columns
            .iter()
            .position(|c| c.name == DATE_COLUMN)
            .ok_or_else(|| Error::missing_column(DATE_COLUMN))?;

        // Dates first: they decide which rows survive.
        let mut dates: Vec<Option<NaiveDate>> = Vec::with_capacity(self.n_rows);
        for (row, cell) in self.columns[date_idx].cells.iter().enumerate() {
            let text = cell.as_deref().unwrap_or("");
            match parse_date(text) {
                Some(d) => dates.push(Some(d)),
                None => match options.date_errors {
                    DateErrorPolicy::Fail => {
                        return Err(Error::MalformedRecord {
                            row,
                            value: text.to_string(),
                        })
                    }
                    DateErrorPolicy::Skip => {
                        log::warn!("Skipping row {row}: unparseable date '{text}'");
                        dates.push(None);
                    }
                },
            }
        }

        let kept: Vec<usize> = (0..self.n_rows).filter(|&r| dates[r].is_some()).collect();
        let mut columns = Vec::with_capacity(self.columns.len() + TEMPORAL_COLUMNS.len());
        let mut records: Vec<Record> = kept
            .iter()
            .map(|_| Record {
                values: Vec::with_capacity(self.columns.len() + TEMPORAL_COLUMNS.len()),
            })
            .collect();

        for (col_idx, raw) in self.columns.iter().enumerate() {
            if col_idx == date_idx {
                columns.push(Column {
                    name: raw.name.clone(),
                    dtype: ColumnType::Date,
                });
                for (rec, &r) in records.iter_mut().zip(&kept) {
                    // `kept` only holds rows with a parsed date.
                    let value = dates[r].map(CellValue::Date).unwrap_or(CellValue::Null);
                    rec.values.push(value);
                }
                continue;
            }

            let dtype = raw
                .hint
                .unwrap_or_else(|| infer_dtype(kept.iter().map(|&r| raw.cells[r].as_deref())));
            columns.push(Column {
                name: raw.name.clone(),
                dtype,
            });
            for (rec, &r) in records.iter_mut().zip(&kept) {
                rec.values.push(parse_cell(raw.cells[r].as_deref(), dtype));
            }
        }

        if options.derive_temporal {
            derive_temporal_columns(&mut columns, &mut records, date_idx);
        }

        AirQualityDataset::new(columns, records)
    }
}

fn derive_temporal_columns(columns: &mut Vec<Column>, records: &mut [Record], date_idx: usize) {
    let missing: Vec<&str> = TEMPORAL_COLUMNS
        .iter()
        .copied()
        .filter(|name| !columns.iter().any(|c| c.name == *name))
        .collect();
    if missing.is_empty() {
        return;
    }
    log::debug!("Deriving temporal columns {missing:?} from '{DATE_COLUMN}'");

    for name in &missing {
        columns.push(Column {
            name: name.to_string(),
            dtype: temporal_dtype(name),
        });
    }
    for rec in records.iter_mut() {
        let fields = rec.values[date_idx].as_date().map(temporal_fields);
        for name in &missing {
            let value = fields
                .as_ref()
                .and_then(|f| f.iter().find(|(n, _)| n == name))
                .map(|(_, v)| v.clone())
                .unwrap_or(CellValue::Null);
            rec.values.push(value);
        }
    }
}

// ---------------------------------------------------------------------------
// CSV reader / writer
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one city-day per line.
fn read_csv(path: &Path) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(open(path)?);

    let mut columns: Vec<RawColumn> = reader
        .headers()?
        .iter()
        .map(|h| RawColumn {
            name: h.to_string(),
            hint: None,
            cells: Vec::new(),
        })
        .collect();

    let mut n_rows = 0;
    for result in reader.records() {
        let record = result?;
        for (col, value) in columns.iter_mut().zip(record.iter()) {
            col.cells
                .push(if is_na(value) { None } else { Some(value.to_string()) });
        }
        n_rows += 1;
    }

    Ok(RawTable { columns, n_rows })
}

/// Write a dataset as CSV. [`load_file`] reads back an equal table unless a
/// string cell looks like a missing marker (`"NA"`, `"None"`, `"null"`, ...),
/// which reloads as `Null`, or a string column holds only `true`/`false`,
/// which reloads as `Bool`.
pub fn write_csv(dataset: &AirQualityDataset, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(dataset.column_names())?;
    for rec in dataset.records() {
        writer.write_record(rec.values.iter().map(format_cell))?;
    }
    writer.flush()?;
    log::info!("Wrote {} records to {}", dataset.len(), path.display());
    Ok(())
}

fn format_cell(value: &CellValue) -> String {
    match value {
        CellValue::Null => String::new(),
        // Debug keeps the decimal point (`3.0`), so floats stay floats on reload.
        CellValue::Float(v) if v.is_finite() => format!("{v:?}"),
        CellValue::Float(_) => String::new(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Parquet reader
// ---------------------------------------------------------------------------

/// Load a Parquet file. Column types come from the Arrow schema; every
/// column is rendered to text through Arrow's cast kernel and then parsed
/// like CSV, so both readers share the same date and null handling.
fn read_parquet(path: &Path) -> Result<RawTable> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(open(path)?)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut columns: Vec<RawColumn> = schema
        .fields()
        .iter()
        .map(|f| RawColumn {
            name: f.name().clone(),
            hint: arrow_hint(f.data_type()),
            cells: Vec::new(),
        })
        .collect();

    let mut n_rows = 0;
    for batch in reader {
        let batch = batch?;
        for (col, array) in columns.iter_mut().zip(batch.columns()) {
            let text = cast(array, &DataType::Utf8)?;
            let text = text.as_string::<i32>();
            for row in 0..text.len() {
                col.cells.push(if text.is_null(row) {
                    None
                } else {
                    Some(text.value(row).to_string())
                });
            }
        }
        n_rows += batch.num_rows();
    }

    Ok(RawTable { columns, n_rows })
}

/// Write a dataset as a single-row-group Parquet file with one typed Arrow
/// column per dataset column.
pub fn write_parquet(dataset: &AirQualityDataset, path: &Path) -> Result<()> {
    let fields: Vec<Field> = dataset
        .columns()
        .iter()
        .map(|c| Field::new(&c.name, arrow_type(c.dtype), true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let arrays: Vec<ArrayRef> = dataset
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let cells = dataset.records().iter().map(move |r| &r.values[idx]);
            let array: ArrayRef = match col.dtype {
                ColumnType::Integer => Arc::new(Int64Array::from(
                    cells
                        .map(|v| match v {
                            CellValue::Integer(i) => Some(*i),
                            _ => None,
                        })
                        .collect::<Vec<_>>(),
                )),
                ColumnType::Float => Arc::new(Float64Array::from(
                    cells.map(CellValue::as_f64).collect::<Vec<_>>(),
                )),
                ColumnType::Bool => Arc::new(BooleanArray::from(
                    cells
                        .map(|v| match v {
                            CellValue::Bool(b) => Some(*b),
                            _ => None,
                        })
                        .collect::<Vec<_>>(),
                )),
                ColumnType::Date => Arc::new(Date32Array::from(
                    cells
                        .map(|v| v.as_date().map(Date32Type::from_naive_date))
                        .collect::<Vec<_>>(),
                )),
                ColumnType::String => Arc::new(StringArray::from(
                    cells
                        .map(|v| (!v.is_null()).then(|| v.to_string()))
                        .collect::<Vec<_>>(),
                )),
            };
            array
        })
        .collect();

    let batch = RecordBatch::try_new(schema.clone(), arrays)?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    log::info!("Wrote {} records to {}", dataset.len(), path.display());
    Ok(())
}

fn arrow_type(dtype: ColumnType) -> DataType {
    match dtype {
        ColumnType::Integer => DataType::Int64,
        ColumnType::Float => DataType::Float64,
        ColumnType::Bool => DataType::Boolean,
        ColumnType::Date => DataType::Date32,
        ColumnType::String => DataType::Utf8,
    }
}

fn arrow_hint(dtype: &DataType) -> Option<ColumnType> {
    match dtype {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => Some(ColumnType::Integer),
        DataType::Float16 | DataType::Float32 | DataType::Float64 => Some(ColumnType::Float),
        DataType::Boolean => Some(ColumnType::Bool),
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => Some(ColumnType::Date),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Dictionary(_, _) => {
            Some(ColumnType::String)
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Cell parsing
// ---------------------------------------------------------------------------

/// Markers pandas reads as NaN by default.
fn is_na(s: &str) -> bool {
    matches!(
        s.trim(),
        "" | "NA" | "N/A" | "n/a" | "NaN" | "nan" | "-NaN" | "-nan" | "null" | "NULL" | "None"
            | "#N/A" | "<NA>"
    )
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn infer_dtype<'a>(cells: impl Iterator<Item = Option<&'a str>>) -> ColumnType {
    let (mut all_int, mut all_float, mut all_bool) = (true, true, true);
    let mut seen = false;
    for s in cells.flatten() {
        seen = true;
        all_int &= s.parse::<i64>().is_ok();
        all_float &= s.parse::<f64>().is_ok();
        all_bool &= parse_bool(s).is_some();
        if !(all_int || all_float || all_bool) {
            return ColumnType::String;
        }
    }
    if !seen {
        ColumnType::Float
    } else if all_int {
        ColumnType::Integer
    } else if all_float {
        ColumnType::Float
    } else if all_bool {
        ColumnType::Bool
    } else {
        ColumnType::String
    }
}

fn parse_cell(raw: Option<&str>, dtype: ColumnType) -> CellValue {
    let Some(s) = raw.filter(|s| !is_na(s)) else {
        return CellValue::Null;
    };
    let parsed = match dtype {
        ColumnType::Integer => s.parse::<i64>().ok().map(CellValue::Integer),
        ColumnType::Float => s
            .parse::<f64>()
            .ok()
            .filter(|v| !v.is_nan())
            .map(CellValue::Float),
        ColumnType::Bool => parse_bool(s).map(CellValue::Bool),
        ColumnType::Date => parse_date(s).map(CellValue::Date),
        ColumnType::String => None,
    };
    parsed.unwrap_or_else(|| CellValue::String(s.to_string()))
}

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%d/%m/%Y"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parse the calendar date of a `Date` cell.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}
