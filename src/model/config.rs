use std::path::Path;

use serde::{Deserialize, Serialize};

use super::forest::ForestConfig;
use super::tree::TreeConfig;
use crate::data::model::{
    BUCKET_COLUMN, CITY_COLUMN, DATE_COLUMN, DAY_OF_WEEK_COLUMN, IS_WEEKEND_COLUMN,
    MONTH_COLUMN, TARGET_COLUMN, YEAR_COLUMN,
};
use crate::{Error, Result};

/// Environment variable naming a JSON trainer configuration file.
pub const CONFIG_ENV_VAR: &str = "AQI_TRAINER_CONFIG";

/// How dataset columns map onto model inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSpec {
    /// Regression target.
    pub target: String,
    /// Never used as inputs (labels derived from the target, the raw date).
    pub excluded: Vec<String>,
    /// One-hot encoded columns.
    pub categorical: Vec<String>,
    /// Standardised columns; `None` = every remaining numeric column.
    pub numerical: Option<Vec<String>>,
}

impl Default for FeatureSpec {
    fn default() -> Self {
        Self {
            target: TARGET_COLUMN.to_string(),
            excluded: vec![BUCKET_COLUMN.to_string(), DATE_COLUMN.to_string()],
            categorical: [
                CITY_COLUMN,
                YEAR_COLUMN,
                MONTH_COLUMN,
                DAY_OF_WEEK_COLUMN,
                IS_WEEKEND_COLUMN,
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            numerical: None,
        }
    }
}

/// Random-forest hyperparameters plus the split settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Number of trees.
    pub n_estimators: usize,
    /// Maximum depth per tree (`None` = grow until pure or too small).
    pub max_depth: Option<usize>,
    /// Minimum node size to attempt a split.
    pub min_samples_split: usize,
    /// Minimum samples on each side of a split.
    pub min_samples_leaf: usize,
    /// Features examined per split (`None` = all).
    pub max_features: Option<usize>,
    /// Fit each tree on a bootstrap sample of the training rows.
    pub bootstrap: bool,
    /// Seeds both the train/test shuffle and the forest.
    pub random_seed: u64,
    /// Share of rows held out for evaluation.
    pub split_fraction: f64,
    pub features: FeatureSpec,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: Some(20),
            min_samples_split: 5,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            random_seed: 42,
            split_fraction: 0.2,
            features: FeatureSpec::default(),
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.split_fraction > 0.0 && self.split_fraction < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "split_fraction must be in (0, 1), got {}",
                self.split_fraction
            )));
        }
        if self.n_estimators == 0 {
            return Err(Error::InvalidConfig("n_estimators must be at least 1".into()));
        }
        if self.min_samples_split < 2 {
            return Err(Error::InvalidConfig(
                "min_samples_split must be at least 2".into(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(Error::InvalidConfig(
                "min_samples_leaf must be at least 1".into(),
            ));
        }
        if self.max_features == Some(0) {
            return Err(Error::InvalidConfig("max_features must be at least 1".into()));
        }
        if let Some(col) = self
            .features
            .categorical
            .iter()
            .find(|c| self.features.numerical.as_ref().is_some_and(|n| n.contains(c)))
        {
            return Err(Error::InvalidConfig(format!(
                "column '{col}' is both numerical and categorical"
            )));
        }
        Ok(())
    }

    /// Read a JSON configuration; absent fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration from the file named by [`CONFIG_ENV_VAR`], or defaults.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => {
                log::info!("Reading trainer configuration from {path:?}");
                Self::from_json_file(Path::new(&path))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn forest_config(&self) -> ForestConfig {
        ForestConfig {
            n_trees: self.n_estimators,
            tree: TreeConfig {
                max_depth: self.max_depth,
                min_samples_split: self.min_samples_split,
                min_samples_leaf: self.min_samples_leaf,
                max_features: self.max_features,
            },
            bootstrap: self.bootstrap,
            seed: self.random_seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_reference_hyperparameters() {
        let config = TrainerConfig::default();
        assert_eq!(config.n_estimators, 200);
        assert_eq!(config.max_depth, Some(20));
        assert_eq!(config.min_samples_split, 5);
        assert_eq!(config.random_seed, 42);
        assert_eq!(config.split_fraction, 0.2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{ "n_estimators": 50, "features": {{ "excluded": ["AQI_Bucket", "Date", "NOx"] }} }}"#)
            .unwrap();
        let config = TrainerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.n_estimators, 50);
        assert_eq!(config.max_depth, Some(20));
        assert_eq!(config.features.target, "AQI");
        assert_eq!(config.features.excluded.len(), 3);
        assert_eq!(config.features.categorical.len(), 5);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let bad_split = TrainerConfig {
            split_fraction: 1.0,
            ..Default::default()
        };
        assert!(matches!(bad_split.validate(), Err(Error::InvalidConfig(_))));

        let overlapping = TrainerConfig {
            features: FeatureSpec {
                numerical: Some(vec!["City".into()]),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(overlapping.validate(), Err(Error::InvalidConfig(_))));
    }
}
