use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::config::TrainerConfig;
use super::features::{FeaturePartition, FeaturePipeline, FeatureSource, RecordView};
use super::forest::RandomForest;
use super::metrics::{r2_score, rmse};
use crate::data::model::AirQualityDataset;
use crate::{Error, Result};

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    /// Transformed feature name (`PM2.5`, `City_Delhi`, …).
    pub feature: String,
    pub importance: f64,
}

/// Dataset row indices of each partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Fitted pipeline and forest. Immutable; a refit produces a new model.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainedModel {
    target: String,
    pipeline: FeaturePipeline,
    forest: RandomForest,
    /// Descending by importance.
    feature_importances: Vec<FeatureImportance>,
}

impl TrainedModel {
    /// AQI estimate for one input row. Pure inference: the fitted scaler and
    /// encoder are reused as-is, unseen categories encode as zeros.
    pub fn predict<S: FeatureSource + ?Sized>(&self, row: &S) -> Result<f64> {
        let x = self.pipeline.transform(row)?;
        Ok(self.forest.predict_one(&x))
    }

    /// Predictions for every record of a dataset, in row order.
    pub fn predict_many(&self, dataset: &AirQualityDataset) -> Result<Vec<f64>> {
        let rows = (0..dataset.len())
            .map(|r| self.pipeline.transform(&RecordView::new(dataset, r)))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.forest.predict(&rows))
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn feature_importances(&self) -> &[FeatureImportance] {
        &self.feature_importances
    }

    pub fn pipeline(&self) -> &FeaturePipeline {
        &self.pipeline
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = std::io::BufWriter::new(std::fs::File::create(path)?);
        serde_json::to_writer(file, self)?;
        log::info!("Saved model to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::DataNotFound {
                path: path.to_path_buf(),
            },
            _ => Error::Io(e),
        })?;
        let model = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(model)
    }
}

/// Result of one training run.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// R² on the held-out partition.
    pub accuracy_score: f64,
    pub rmse: f64,
    /// Descending by importance; sums to 1 unless no tree split.
    pub feature_importances: Vec<FeatureImportance>,
    pub model: Arc<TrainedModel>,
    pub split: TrainTestSplit,
}

impl Evaluation {
    pub fn n_train(&self) -> usize {
        self.split.train.len()
    }

    pub fn n_test(&self) -> usize {
        self.split.test.len()
    }
}

// ---------------------------------------------------------------------------
// Split
// ---------------------------------------------------------------------------

/// Shuffle `0..n_rows` with a seeded ChaCha8 RNG and hold out the first
/// `ceil(split_fraction · n_rows)` positions as the test partition.
pub fn train_test_split(n_rows: usize, split_fraction: f64, seed: u64) -> Result<TrainTestSplit> {
    if n_rows < 2 {
        return Err(Error::InsufficientData {
            rows: n_rows,
            reason: "at least 2 rows are needed to hold out a test partition".into(),
        });
    }
    let n_test = (split_fraction * n_rows as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_rows {
        return Err(Error::InsufficientData {
            rows: n_rows,
            reason: format!(
                "a test fraction of {split_fraction} leaves {n_test} test and {} train rows",
                n_rows.saturating_sub(n_test)
            ),
        });
    }

    let mut order: Vec<usize> = (0..n_rows).collect();
    order.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
    let train = order.split_off(n_test);
    Ok(TrainTestSplit { train, test: order })
}

// ---------------------------------------------------------------------------
// Trainer
// ---------------------------------------------------------------------------

/// Builds the feature pipeline and forest described by a [`TrainerConfig`].
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Split, fit on the training partition, score on the test partition.
    pub fn fit_and_evaluate(&self, dataset: &AirQualityDataset) -> Result<Evaluation> {
        let started = Instant::now();
        let spec = &self.config.features;

        let partition = FeaturePartition::resolve(spec, dataset)?;
        log::debug!(
            "Numerical features {:?}, categorical features {:?}",
            partition.numerical,
            partition.categorical
        );

        let target_idx = dataset
            .column_index(&spec.target)
            .ok_or_else(|| Error::missing_column(&spec.target))?;
        let target = |r: usize| dataset.value(r, target_idx).as_f64();
        let usable: Vec<usize> = (0..dataset.len()).filter(|&r| target(r).is_some()).collect();
        if usable.len() < dataset.len() {
            log::warn!(
                "Ignoring {} rows without a '{}' value",
                dataset.len() - usable.len(),
                spec.target
            );
        }

        let positions =
            train_test_split(usable.len(), self.config.split_fraction, self.config.random_seed)?;
        let split = TrainTestSplit {
            train: positions.train.iter().map(|&p| usable[p]).collect(),
            test: positions.test.iter().map(|&p| usable[p]).collect(),
        };
        log::debug!(
            "Split {} rows into {} train / {} test",
            usable.len(),
            split.train.len(),
            split.test.len()
        );

        let pipeline = FeaturePipeline::fit(partition, dataset, &split.train)?;
        let encode = |rows: &[usize]| -> Result<(Vec<Vec<f64>>, Vec<f64>)> {
            let x = rows
                .par_iter()
                .map(|&r| pipeline.transform(&RecordView::new(dataset, r)))
                .collect::<Result<Vec<_>>>()?;
            let y = rows.iter().filter_map(|&r| target(r)).collect();
            Ok((x, y))
        };
        let (x_train, y_train) = encode(&split.train)?;
        let (x_test, y_test) = encode(&split.test)?;

        let forest = RandomForest::fit(&self.config.forest_config(), &x_train, &y_train)?;
        let predictions = forest.predict(&x_test);
        let accuracy_score = r2_score(&y_test, &predictions);
        let rmse = rmse(&y_test, &predictions);

        let mut feature_importances: Vec<FeatureImportance> = pipeline
            .feature_names()
            .iter()
            .zip(forest.feature_importances())
            .map(|(name, &importance)| FeatureImportance {
                feature: name.clone(),
                importance,
            })
            .collect();
        // Stable: equal importances keep feature order.
        feature_importances.sort_by(|a, b| b.importance.total_cmp(&a.importance));

        log::info!(
            "Trained {} trees on {} rows ({} features) in {:.2?}: R² = {:.4}, RMSE = {:.2}",
            forest.n_trees(),
            split.train.len(),
            pipeline.n_features(),
            started.elapsed(),
            accuracy_score,
            rmse
        );

        let model = Arc::new(TrainedModel {
            target: spec.target.clone(),
            pipeline,
            forest,
            feature_importances: feature_importances.clone(),
        });

        Ok(Evaluation {
            accuracy_score,
            rmse,
            feature_importances,
            model,
            split,
        })
    }
}

/// Train with the default hyperparameters and the given split settings.
pub fn fit_and_evaluate(
    dataset: &AirQualityDataset,
    split_fraction: f64,
    random_seed: u64,
) -> Result<Evaluation> {
    Trainer::new(TrainerConfig {
        split_fraction,
        random_seed,
        ..Default::default()
    })?
    .fit_and_evaluate(dataset)
}
