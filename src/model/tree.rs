//! CART regression tree minimising squared error.

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum depth of tree (`None` = unlimited)
    pub max_depth: Option<usize>,
    /// Minimum samples required to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf node
    pub min_samples_leaf: usize,
    /// Maximum features to consider for split (None = all)
    pub max_features: Option<usize>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: Some(20),
            min_samples_split: 5,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

/// Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        n_samples: usize,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    pub fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// A fitted regression tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    root: TreeNode,
    /// Weighted impurity decrease per feature, normalised to sum 1
    /// (all zero when the tree never splits).
    feature_importances: Vec<f64>,
}

impl RegressionTree {
    /// Fit on `samples`, row indices into `features`/`targets`. Indices may
    /// repeat (bootstrap draws), which weights those rows accordingly.
    pub fn fit(
        config: &TreeConfig,
        features: &[Vec<f64>],
        targets: &[f64],
        samples: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let n_features = features.first().map_or(0, Vec::len);
        let mut builder = Builder {
            config,
            features,
            targets,
            importances: vec![0.0; n_features],
            feature_order: (0..n_features).collect(),
            rng,
        };
        let root = builder.build(samples.to_vec(), 0);

        let mut feature_importances = builder.importances;
        let total: f64 = feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut feature_importances {
                *imp /= total;
            }
        }

        Self {
            root,
            feature_importances,
        }
    }

    pub fn predict_one(&self, x: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if x[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Whether the root was split at least once.
    pub fn has_splits(&self) -> bool {
        !self.root.is_leaf()
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

struct Builder<'a> {
    config: &'a TreeConfig,
    features: &'a [Vec<f64>],
    targets: &'a [f64],
    importances: Vec<f64>,
    feature_order: Vec<usize>,
    rng: &'a mut ChaCha8Rng,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    /// `n·var(parent) − n_l·var(left) − n_r·var(right)`
    decrease: f64,
}

impl Builder<'_> {
    fn build(&mut self, samples: Vec<usize>, depth: usize) -> TreeNode {
        let n = samples.len();
        let mean = samples.iter().map(|&i| self.targets[i]).sum::<f64>() / n as f64;
        let variance = samples
            .iter()
            .map(|&i| (self.targets[i] - mean).powi(2))
            .sum::<f64>()
            / n as f64;

        let leaf = TreeNode::Leaf {
            value: mean,
            n_samples: n,
        };
        if self.config.max_depth.is_some_and(|max| depth >= max)
            || n < self.config.min_samples_split
            || n < 2 * self.config.min_samples_leaf
            || variance <= 1e-12
        {
            return leaf;
        }

        let Some(best) = self.find_best_split(&samples) else {
            return leaf;
        };
        self.importances[best.feature] += best.decrease;

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| self.features[i][best.feature] <= best.threshold);

        TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            n_samples: n,
            left: Box::new(self.build(left, depth + 1)),
            right: Box::new(self.build(right, depth + 1)),
        }
    }

    /// Sorted sweep per feature; thresholds are midpoints between distinct
    /// consecutive values.
    fn find_best_split(&mut self, samples: &[usize]) -> Option<BestSplit> {
        let n = samples.len();
        let n_features = self.feature_order.len();
        let max_features = self
            .config
            .max_features
            .map_or(n_features, |m| m.min(n_features));
        if max_features < n_features {
            self.feature_order.shuffle(&mut *self.rng);
        }

        let total_sum: f64 = samples.iter().map(|&i| self.targets[i]).sum();
        let parent_score = total_sum * total_sum / n as f64;
        let min_leaf = self.config.min_samples_leaf;

        let mut best: Option<(usize, f64, f64)> = None;
        let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);

        for &feature in &self.feature_order[..max_features] {
            pairs.clear();
            pairs.extend(
                samples
                    .iter()
                    .map(|&i| (self.features[i][feature], self.targets[i])),
            );
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
            if pairs[0].0 == pairs[n - 1].0 {
                continue;
            }

            let mut left_sum = 0.0;
            for i in 0..n - 1 {
                left_sum += pairs[i].1;
                if pairs[i].0 == pairs[i + 1].0 {
                    continue;
                }
                let n_left = i + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let right_sum = total_sum - left_sum;
                let score =
                    left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64;
                if best.map_or(true, |(_, _, s)| score > s) {
                    let (lo, hi) = (pairs[i].0, pairs[i + 1].0);
                    let mut threshold = lo + (hi - lo) / 2.0;
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some((feature, threshold, score));
                }
            }
        }

        best.and_then(|(feature, threshold, score)| {
            let decrease = score - parent_score;
            (decrease > 0.0).then_some(BestSplit {
                feature,
                threshold,
                decrease,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn fit(features: &[Vec<f64>], targets: &[f64], config: TreeConfig) -> RegressionTree {
        let samples: Vec<usize> = (0..targets.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        RegressionTree::fit(&config, features, targets, &samples, &mut rng)
    }

    #[test]
    fn step_function_is_learned_exactly() {
        let features: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, 0.0]).collect();
        let targets: Vec<f64> = (0..20).map(|i| if i < 10 { 1.0 } else { 5.0 }).collect();
        let tree = fit(&features, &targets, TreeConfig::default());

        assert_eq!(tree.root().depth(), 1);
        assert_eq!(tree.predict_one(&[3.0, 0.0]), 1.0);
        assert_eq!(tree.predict_one(&[9.6, 0.0]), 5.0);
        assert_eq!(tree.feature_importances(), &[1.0, 0.0]);
    }

    #[test]
    fn constant_target_never_splits() {
        let features: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let targets = vec![3.0; 10];
        let tree = fit(&features, &targets, TreeConfig::default());
        assert!(!tree.has_splits());
        assert_eq!(tree.feature_importances(), &[0.0]);
        assert_eq!(tree.predict_one(&[100.0]), 3.0);
    }

    #[test]
    fn depth_and_leaf_size_limits_hold() {
        let features: Vec<Vec<f64>> = (0..64).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..64).map(|i| (i * i) as f64).collect();

        let shallow = fit(
            &features,
            &targets,
            TreeConfig {
                max_depth: Some(3),
                ..Default::default()
            },
        );
        assert_eq!(shallow.root().depth(), 3);
        assert!(shallow.root().n_leaves() <= 8);

        let coarse = fit(
            &features,
            &targets,
            TreeConfig {
                max_depth: None,
                min_samples_split: 2,
                min_samples_leaf: 16,
                max_features: None,
            },
        );
        assert!(coarse.root().n_leaves() <= 4);
    }
}
