use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use chrono::NaiveDate;

use aqi_forecast::cache::{DatasetCache, ModelCache};
use aqi_forecast::data::filter::{filtered_indices, init_filter_state, FilterState};
use aqi_forecast::data::model::{
    AirQualityDataset, AqiCategory, CellValue, CITY_COLUMN, MONTH_COLUMN, POLLUTANT_COLUMNS,
    TARGET_COLUMN, TEMPORAL_COLUMNS, YEAR_COLUMN,
};
use aqi_forecast::data::summary::{
    box_stats, column_overview, correlation_matrix, describe, group_by, medians, monthly_trend,
    top_n, Aggregate, BoxStats, ColumnOverview, CorrelationMatrix, NumericSummary,
};
use aqi_forecast::data::LoadOptions;
use aqi_forecast::model::{Evaluation, FeatureRow, Trainer, TrainerConfig};

/// Columns offered as filters in the side panel.
pub const FILTER_COLUMNS: [&str; 2] = [CITY_COLUMN, YEAR_COLUMN];

/// Rows shown in the overview preview table.
pub const PREVIEW_ROWS: usize = 50;

/// Cities ranked in the exploration charts.
pub const TOP_CITIES: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Page {
    #[default]
    Overview,
    Exploration,
    Modeling,
    Prediction,
}

impl Page {
    pub const ALL: [Page; 4] = [
        Page::Overview,
        Page::Exploration,
        Page::Modeling,
        Page::Prediction,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Page::Overview => "Overview",
            Page::Exploration => "Exploration",
            Page::Modeling => "Modeling",
            Page::Prediction => "Prediction",
        }
    }
}

// ---------------------------------------------------------------------------
// Derived tables
// ---------------------------------------------------------------------------

/// Whole-dataset tables for the overview page; computed once per load.
#[derive(Debug, Clone, Default)]
pub struct OverviewTables {
    pub columns: Vec<ColumnOverview>,
    pub describe: Vec<NumericSummary>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

impl OverviewTables {
    fn compute(dataset: &AirQualityDataset) -> Self {
        let all: Vec<usize> = (0..dataset.len()).collect();
        Self {
            columns: column_overview(dataset, &all),
            describe: describe(dataset, &all),
            date_range: dataset.date_range(),
        }
    }
}

/// Aggregates over the filtered rows; recomputed when the filters change.
#[derive(Debug, Clone, Default)]
pub struct ExplorationTables {
    /// Mean AQI per calendar month of the whole span.
    pub aqi_trend: Vec<(NaiveDate, f64)>,
    /// Seasonal profile: mean AQI per month of the year.
    pub monthly_aqi: Vec<(CellValue, f64)>,
    pub yearly_aqi: Vec<(CellValue, f64)>,
    pub top_cities: Vec<(CellValue, f64)>,
    /// AQI spread of the cities with the most records.
    pub city_distributions: Vec<BoxStats>,
    pub correlation: Option<CorrelationMatrix>,
}

impl ExplorationTables {
    fn compute(dataset: &AirQualityDataset, rows: &[usize]) -> Self {
        let mut columns: Vec<&str> = POLLUTANT_COLUMNS.to_vec();
        columns.push(TARGET_COLUMN);
        let correlation = correlation_matrix(dataset, rows, &columns);
        Self {
            aqi_trend: monthly_trend(dataset, rows),
            monthly_aqi: group_by(dataset, rows, MONTH_COLUMN, TARGET_COLUMN, Aggregate::Mean),
            yearly_aqi: group_by(dataset, rows, YEAR_COLUMN, TARGET_COLUMN, Aggregate::Mean),
            top_cities: top_n(
                group_by(dataset, rows, CITY_COLUMN, TARGET_COLUMN, Aggregate::Median),
                TOP_CITIES,
            ),
            city_distributions: box_stats(dataset, rows, CITY_COLUMN, TARGET_COLUMN, TOP_CITIES),
            correlation: (!correlation.columns.is_empty()).then_some(correlation),
        }
    }
}

// ---------------------------------------------------------------------------
// Prediction form
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PredictionForm {
    pub city: String,
    pub date: NaiveDate,
    /// Numeric inputs in model order, pre-filled with dataset medians.
    pub inputs: Vec<(String, f64)>,
    pub result: Option<(f64, AqiCategory)>,
}

impl Default for PredictionForm {
    fn default() -> Self {
        Self {
            city: String::new(),
            date: chrono::Local::now().date_naive(),
            inputs: Vec::new(),
            result: None,
        }
    }
}

impl PredictionForm {
    /// Inputs for every numeric model column except the date-derived ones,
    /// which come from `date`.
    fn for_model(dataset: &AirQualityDataset, evaluation: &Evaluation, city: String) -> Self {
        let numerical = &evaluation.model.pipeline().partition().numerical;
        let editable: Vec<&str> = numerical
            .iter()
            .map(String::as_str)
            .filter(|c| !TEMPORAL_COLUMNS.contains(c))
            .collect();
        let all: Vec<usize> = (0..dataset.len()).collect();
        let defaults = medians(dataset, &all, &editable);
        let inputs = editable
            .iter()
            .map(|&c| (c.to_string(), defaults.get(c).copied().unwrap_or(0.0)))
            .collect();
        let date = dataset
            .date_range()
            .map(|(_, last)| last)
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        Self {
            city,
            date,
            inputs,
            result: None,
        }
    }

    pub fn feature_row(&self) -> FeatureRow {
        FeatureRow::for_day(&self.city, self.date, self.inputs.iter().cloned())
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
#[derive(Default)]
pub struct AppState {
    pub dataset: Option<Arc<AirQualityDataset>>,
    pub dataset_path: Option<PathBuf>,

    pub page: Page,

    /// Per-column filter selections.
    pub filters: FilterState,

    /// Every value each filter column can take.
    pub filter_options: FilterState,

    /// Indices of rows passing the current filters (cached).
    pub visible_indices: Vec<usize>,

    pub overview: OverviewTables,
    pub exploration: ExplorationTables,

    pub trainer_config: TrainerConfig,
    pub evaluation: Option<Arc<Evaluation>>,
    pub form: PredictionForm,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    datasets: DatasetCache,
    models: ModelCache,
}

impl AppState {
    pub fn new(trainer_config: TrainerConfig) -> Self {
        Self {
            trainer_config,
            datasets: DatasetCache::new(LoadOptions::default()),
            ..Default::default()
        }
    }

    /// Load (or reuse) a dataset from disk and make it current.
    pub fn open_path(&mut self, path: &Path) -> anyhow::Result<()> {
        let dataset = self
            .datasets
            .get_or_load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        log::info!(
            "Loaded {} rows × {} columns from {}",
            dataset.len(),
            dataset.columns().len(),
            path.display()
        );
        self.set_dataset(dataset);
        self.dataset_path = Some(path.to_path_buf());
        Ok(())
    }

    /// Ingest a dataset: reset filters, derived tables and the model.
    pub fn set_dataset(&mut self, dataset: Arc<AirQualityDataset>) {
        self.filter_options = init_filter_state(&dataset, &FILTER_COLUMNS);
        self.filters = self.filter_options.clone();
        self.visible_indices = (0..dataset.len()).collect();
        self.overview = OverviewTables::compute(&dataset);
        self.exploration = ExplorationTables::compute(&dataset, &self.visible_indices);
        self.evaluation = None;
        self.models.clear();
        self.form = PredictionForm::default();
        self.dataset = Some(dataset);
        self.dataset_path = None;
        self.status_message = None;
    }

    /// Fit (or fetch from the model cache) on the whole dataset.
    pub fn train(&mut self) -> anyhow::Result<()> {
        let dataset = self
            .dataset
            .clone()
            .ok_or_else(|| anyhow!("No dataset loaded"))?;
        let trainer =
            Trainer::new(self.trainer_config.clone()).context("Invalid trainer configuration")?;
        let evaluation = self
            .models
            .get_or_train(&trainer, &dataset)
            .context("Training failed")?;

        let city = dataset
            .unique_values(CITY_COLUMN)
            .into_iter()
            .find_map(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        self.form = PredictionForm::for_model(&dataset, &evaluation, city);
        self.evaluation = Some(evaluation);
        self.status_message = None;
        Ok(())
    }

    /// Run the current model on the form inputs.
    pub fn predict(&mut self) -> anyhow::Result<f64> {
        let evaluation = self
            .evaluation
            .as_ref()
            .ok_or_else(|| anyhow!("Train a model first"))?;
        let aqi = evaluation
            .model
            .predict(&self.form.feature_row())
            .context("Prediction failed")?;
        self.form.result = Some((aqi, AqiCategory::from_aqi(aqi)));
        Ok(aqi)
    }

    /// Show an error in the status line.
    pub fn report(&mut self, result: anyhow::Result<()>) {
        if let Err(e) = result {
            log::error!("{e:#}");
            self.status_message = Some(format!("Error: {e:#}"));
        }
    }

    /// Recompute `visible_indices` and the exploration tables after a filter change.
    pub fn refilter(&mut self) {
        if let Some(ds) = &self.dataset {
            self.visible_indices = filtered_indices(ds, &self.filters);
            self.exploration = ExplorationTables::compute(ds, &self.visible_indices);
        }
    }

    /// Toggle a single value in a column's filter.
    pub fn toggle_filter_value(&mut self, column: &str, value: &CellValue) {
        let selected = self.filters.entry(column.to_string()).or_default();
        if !selected.remove(value) {
            selected.insert(value.clone());
        }
        self.refilter();
    }

    /// Select all values in a column.
    pub fn select_all(&mut self, column: &str) {
        if let Some(all_vals) = self.filter_options.get(column) {
            self.filters.insert(column.to_string(), all_vals.clone());
            self.refilter();
        }
    }

    /// Deselect all values in a column.
    pub fn select_none(&mut self, column: &str) {
        self.filters.insert(column.to_string(), Default::default());
        self.refilter();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqi_forecast::data::synthetic::{generate, SyntheticConfig};

    fn state() -> AppState {
        let mut state = AppState::new(TrainerConfig {
            n_estimators: 10,
            ..Default::default()
        });
        state.set_dataset(Arc::new(generate(&SyntheticConfig {
            days: 40,
            ..Default::default()
        })));
        state
    }

    #[test]
    fn city_filter_narrows_visible_rows() {
        let mut state = state();
        assert_eq!(state.visible_indices.len(), 200);

        let delhi = CellValue::String("Delhi".into());
        state.select_none(CITY_COLUMN);
        assert!(state.visible_indices.is_empty());
        assert!(state.exploration.top_cities.is_empty());

        state.toggle_filter_value(CITY_COLUMN, &delhi);
        assert_eq!(state.visible_indices.len(), 40);
        assert_eq!(state.exploration.top_cities.len(), 1);
        assert_eq!(state.exploration.top_cities[0].0, delhi);

        state.select_all(CITY_COLUMN);
        assert_eq!(state.visible_indices.len(), 200);
    }

    #[test]
    fn prediction_requires_a_model() {
        let mut state = state();
        assert!(state.predict().is_err());

        state.train().unwrap();
        let names: Vec<&str> = state.form.inputs.iter().map(|(n, _)| n.as_str()).collect();
        assert!(names.contains(&"PM2.5"));
        assert!(!names.contains(&YEAR_COLUMN));

        let aqi = state.predict().unwrap();
        assert!(aqi.is_finite());
        assert_eq!(state.form.result, Some((aqi, AqiCategory::from_aqi(aqi))));
    }

    #[test]
    fn retraining_the_same_data_reuses_the_model() {
        let mut state = state();
        state.train().unwrap();
        let first = state.evaluation.clone().unwrap();
        state.train().unwrap();
        assert!(Arc::ptr_eq(&first, state.evaluation.as_ref().unwrap()));
    }

    #[test]
    fn loading_a_new_dataset_drops_the_previous_model() {
        let mut state = state();
        state.train().unwrap();
        assert_eq!(state.models.len(), 1);

        state.set_dataset(Arc::new(generate(&SyntheticConfig {
            days: 30,
            ..Default::default()
        })));
        assert!(state.evaluation.is_none());
        assert!(state.models.is_empty());
        assert!(state.predict().is_err());
    }

    #[test]
    fn exploration_tables_follow_the_filters() {
        let mut state = state();
        assert!(!state.exploration.aqi_trend.is_empty());
        assert_eq!(state.exploration.city_distributions.len(), 5);

        state.select_none(CITY_COLUMN);
        state.toggle_filter_value(CITY_COLUMN, &CellValue::String("Delhi".into()));
        let boxes = &state.exploration.city_distributions;
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].count, 40);
    }

    #[test]
    fn errors_land_in_the_status_line() {
        let mut state = AppState::default();
        let result = state.train();
        state.report(result);
        assert!(state.status_message.unwrap().contains("No dataset loaded"));
    }
}
