//! Random forest regressor: bootstrap-sampled regression trees whose
//! predictions are averaged.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeConfig};
use crate::{Error, Result};

/// Random Forest configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub n_trees: usize,
    pub tree: TreeConfig,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Random seed
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 200,
            tree: TreeConfig::default(),
            bootstrap: true,
            seed: 42,
        }
    }
}

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Train the random forest on a row-major feature matrix.
    ///
    /// Every tree gets its own seed drawn from `config.seed`, so building
    /// the trees in parallel does not change the result.
    pub fn fit(config: &ForestConfig, features: &[Vec<f64>], targets: &[f64]) -> Result<Self> {
        let n_samples = targets.len();
        if n_samples == 0 || features.len() != n_samples {
            return Err(Error::InsufficientData {
                rows: n_samples,
                reason: format!(
                    "cannot fit a forest on {} feature rows and {} targets",
                    features.len(),
                    n_samples
                ),
            });
        }
        let n_features = features[0].len();

        let mut master = ChaCha8Rng::seed_from_u64(config.seed);
        let seeds: Vec<u64> = (0..config.n_trees).map(|_| master.gen()).collect();

        // Build trees in parallel
        let trees: Vec<RegressionTree> = seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let samples: Vec<usize> = if config.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                RegressionTree::fit(&config.tree, features, targets, &samples, &mut rng)
            })
            .collect();

        // Mean over trees that split at least once, then normalise.
        let mut feature_importances = vec![0.0; n_features];
        let splitting: Vec<&RegressionTree> = trees.iter().filter(|t| t.has_splits()).collect();
        for tree in &splitting {
            for (acc, imp) in feature_importances.iter_mut().zip(tree.feature_importances()) {
                *acc += imp;
            }
        }
        let sum: f64 = feature_importances.iter().sum();
        if sum > 0.0 {
            for imp in &mut feature_importances {
                *imp /= sum;
            }
        }

        Ok(Self {
            trees,
            n_features,
            feature_importances,
        })
    }

    /// Predict for a single sample
    pub fn predict_one(&self, features: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let total: f64 = self.trees.iter().map(|t| t.predict_one(features)).sum();
        total / self.trees.len() as f64
    }

    /// Predict for multiple samples, preserving order.
    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.par_iter().map(|r| self.predict_one(r)).collect()
    }

    /// Impurity-based importances in feature order, summing to 1 unless no
    /// tree ever split.
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_data(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let features: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                let x = i as f64 / n as f64;
                vec![x, ((i * 7) % 11) as f64]
            })
            .collect();
        let targets = features.iter().map(|f| 3.0 * f[0] + 1.0).collect();
        (features, targets)
    }

    fn small() -> ForestConfig {
        ForestConfig {
            n_trees: 20,
            ..Default::default()
        }
    }

    #[test]
    fn fits_a_linear_signal() {
        let (features, targets) = linear_data(200);
        let forest = RandomForest::fit(&small(), &features, &targets).unwrap();
        assert_eq!(forest.n_trees(), 20);

        let pred = forest.predict(&features);
        let max_err = pred
            .iter()
            .zip(&targets)
            .map(|(p, t)| (p - t).abs())
            .fold(0.0, f64::max);
        assert!(max_err < 0.2, "max error {max_err}");
        assert!(forest.feature_importances()[0] > 0.9);
    }

    #[test]
    fn same_seed_same_forest() {
        let (features, targets) = linear_data(120);
        let a = RandomForest::fit(&small(), &features, &targets).unwrap();
        let b = RandomForest::fit(&small(), &features, &targets).unwrap();
        assert_eq!(a.predict(&features), b.predict(&features));
        assert_eq!(a.feature_importances(), b.feature_importances());
    }

    #[test]
    fn importances_sum_to_one() {
        let (features, targets) = linear_data(100);
        let forest = RandomForest::fit(&small(), &features, &targets).unwrap();
        let sum: f64 = forest.feature_importances().iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_input_is_insufficient() {
        assert!(matches!(
            RandomForest::fit(&small(), &[], &[]),
            Err(Error::InsufficientData { .. })
        ));
    }
}
