/// Data layer: core types, loading, filtering and summaries.
///
/// Architecture:
/// ```text
///  .csv / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → AirQualityDataset
///   └──────────┘
///        │
///        ▼
///   ┌───────────────────┐
///   │ AirQualityDataset │  typed columns, Vec<Record>
///   └───────────────────┘
///        │
///        ├──────────────┐
///        ▼              ▼
///   ┌──────────┐   ┌──────────┐
///   │  filter   │   │ summary  │  describe, group-by, correlation
///   └──────────┘   └──────────┘
/// ```
pub mod filter;
pub mod loader;
pub mod model;
pub mod summary;
pub mod synthetic;

pub use loader::{
    load_file, load_file_with, write_csv, write_file, write_parquet, DateErrorPolicy, LoadOptions,
};
pub use model::{AirQualityDataset, AqiCategory, CellValue, Column, ColumnType, Record};
