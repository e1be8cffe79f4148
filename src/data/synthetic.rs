//! Synthetic city-day tables with a known AQI relationship, for demos and
//! tests: `AQI = 1.2 · PM2.5 + 0.5 · PM10 + noise`.

use chrono::{Duration, NaiveDate};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::model::{
    temporal_dtype, temporal_fields, AirQualityDataset, AqiCategory, CellValue, Column,
    ColumnType, Record, BUCKET_COLUMN, CITY_COLUMN, DATE_COLUMN, POLLUTANT_COLUMNS,
    TARGET_COLUMN, TEMPORAL_COLUMNS,
};

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub cities: Vec<String>,
    pub start: NaiveDate,
    /// Number of dates; each date gets one record per city.
    pub days: usize,
    pub step_days: i64,
    /// Standard deviation of the Gaussian noise added to AQI.
    pub noise: f64,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    /// 5 cities × 200 dates every 3 days from 2019-01-01: 1000 rows over 2 years.
    fn default() -> Self {
        Self {
            cities: ["Delhi", "Mumbai", "Kolkata", "Chennai", "Bengaluru"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            start: NaiveDate::from_ymd_opt(2019, 1, 1).expect("valid literal date"),
            days: 200,
            step_days: 3,
            noise: 10.0,
            seed: 42,
        }
    }
}

/// Box-Muller transform for a normal sample.
fn gauss(rng: &mut ChaCha8Rng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-15);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

pub fn generate(config: &SyntheticConfig) -> AirQualityDataset {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    let mut columns = vec![
        Column {
            name: DATE_COLUMN.to_string(),
            dtype: ColumnType::Date,
        },
        Column {
            name: CITY_COLUMN.to_string(),
            dtype: ColumnType::String,
        },
    ];
    columns.extend(POLLUTANT_COLUMNS.iter().map(|p| Column {
        name: p.to_string(),
        dtype: ColumnType::Float,
    }));
    columns.push(Column {
        name: TARGET_COLUMN.to_string(),
        dtype: ColumnType::Float,
    });
    columns.push(Column {
        name: BUCKET_COLUMN.to_string(),
        dtype: ColumnType::String,
    });
    columns.extend(TEMPORAL_COLUMNS.iter().map(|t| Column {
        name: t.to_string(),
        dtype: temporal_dtype(t),
    }));

    // Per-city pollution level so cities differ in their AQI distribution.
    let city_scale: Vec<f64> = (0..config.cities.len())
        .map(|i| 0.6 + 0.2 * i as f64)
        .collect();

    let mut records = Vec::with_capacity(config.days * config.cities.len());
    for day in 0..config.days {
        let date = config.start + Duration::days(day as i64 * config.step_days);
        for (city, &scale) in config.cities.iter().zip(&city_scale) {
            let pm25 = rng.gen_range(10.0..200.0) * scale;
            let pm10 = rng.gen_range(20.0..300.0) * scale;
            let aqi = (1.2 * pm25 + 0.5 * pm10 + gauss(&mut rng, 0.0, config.noise)).max(0.0);

            let mut values = vec![CellValue::Date(date), CellValue::String(city.clone())];
            values.push(CellValue::Float(pm25));
            values.push(CellValue::Float(pm10));
            // Remaining pollutants carry no signal.
            for _ in 2..POLLUTANT_COLUMNS.len() {
                values.push(CellValue::Float(rng.gen_range(0.0..50.0)));
            }
            values.push(CellValue::Float(aqi));
            values.push(CellValue::String(
                AqiCategory::from_aqi(aqi).label().to_string(),
            ));
            values.extend(temporal_fields(date).into_iter().map(|(_, v)| v));
            records.push(Record { values });
        }
    }

    AirQualityDataset::new(columns, records).expect("generated records match the header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_spans_five_cities_and_two_years() {
        let ds = generate(&SyntheticConfig::default());
        assert_eq!(ds.len(), 1000);
        assert_eq!(ds.unique_values(CITY_COLUMN).len(), 5);
        assert_eq!(
            ds.unique_values("Year"),
            [CellValue::Integer(2019), CellValue::Integer(2020)]
                .into_iter()
                .collect()
        );
    }

    #[test]
    fn same_seed_same_table() {
        let config = SyntheticConfig {
            days: 10,
            ..Default::default()
        };
        assert_eq!(generate(&config), generate(&config));
    }
}
