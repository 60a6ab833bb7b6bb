//! Random forest regression
//!
//! Bagged CART regression trees split on squared-error reduction. Every
//! tree draws a bootstrap sample from its own seeded RNG, so a fit is
//! reproducible regardless of how rayon schedules the trees.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{PredictorError, Result};

/// Hyperparameters for a forest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    /// None grows trees until the leaf-size limits stop them
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl ForestParams {
    /// Finishing-position stage
    pub fn position_default() -> Self {
        ForestParams {
            n_estimators: 200,
            max_depth: Some(15),
            min_samples_split: 5,
            min_samples_leaf: 2,
            seed: 42,
        }
    }

    /// Win-probability stage
    pub fn win_default() -> Self {
        ForestParams {
            n_estimators: 150,
            max_depth: Some(10),
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict(&self, row: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Fitted random forest regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    n_features: usize,
    trees: Vec<TreeNode>,
}

impl RandomForestRegressor {
    /// Fit a forest on `features` (one row per sample) against `targets`
    pub fn fit(params: &ForestParams, features: &[Vec<f64>], targets: &[f64]) -> Result<Self> {
        if features.is_empty() {
            return Err(PredictorError::InsufficientData(
                "cannot fit a forest on zero samples".to_string(),
            ));
        }
        if features.len() != targets.len() {
            return Err(PredictorError::Training(format!(
                "{} feature rows but {} targets",
                features.len(),
                targets.len()
            )));
        }
        if params.n_estimators == 0 {
            return Err(PredictorError::Config("n_estimators must be positive".to_string()));
        }

        let n_features = features[0].len();
        if let Some(row) = features.iter().find(|r| r.len() != n_features) {
            return Err(PredictorError::Training(format!(
                "ragged feature rows: expected width {}, found {}",
                n_features,
                row.len()
            )));
        }
        if features.iter().flatten().chain(targets).any(|v| !v.is_finite()) {
            return Err(PredictorError::Training("non-finite training value".to_string()));
        }

        let n_samples = features.len();
        let builder = TreeBuilder {
            features,
            targets,
            params,
        };

        let trees: Vec<TreeNode> = (0..params.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(t as u64));
                let bootstrap: Vec<usize> =
                    (0..n_samples).map(|_| rng.random_range(0..n_samples)).collect();
                builder.build(bootstrap, 0)
            })
            .collect();

        log::debug!(
            "Fitted forest: {} trees on {} samples x {} features (max depth {})",
            trees.len(),
            n_samples,
            n_features,
            trees.iter().map(TreeNode::depth).max().unwrap_or(0)
        );

        Ok(RandomForestRegressor {
            params: params.clone(),
            n_features,
            trees,
        })
    }

    /// Mean of the tree outputs for one row
    pub fn predict_one(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.n_features {
            return Err(PredictorError::Inference(format!(
                "feature length mismatch: got {}, expected {}",
                row.len(),
                self.n_features
            )));
        }
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(row)).sum();
        Ok(sum / self.trees.len().max(1) as f64)
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter().map(|row| self.predict_one(row)).collect()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }
}

struct TreeBuilder<'a> {
    features: &'a [Vec<f64>],
    targets: &'a [f64],
    params: &'a ForestParams,
}

struct BestSplit {
    feature_idx: usize,
    threshold: f64,
    sse: f64,
}

impl TreeBuilder<'_> {
    fn build(&self, indices: Vec<usize>, depth: usize) -> TreeNode {
        let n = indices.len();
        let (sum, sum_sq) = indices.iter().fold((0.0, 0.0), |(s, sq), &i| {
            let y = self.targets[i];
            (s + y, sq + y * y)
        });
        let mean = sum / n.max(1) as f64;
        let node_sse = sum_sq - sum * sum / n.max(1) as f64;

        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        let min_leaf = self.params.min_samples_leaf.max(1);
        if depth_reached
            || n < self.params.min_samples_split.max(2)
            || n < 2 * min_leaf
            || node_sse <= 1e-12
        {
            return TreeNode::Leaf { value: mean };
        }

        let best = match self.best_split(&indices, min_leaf) {
            Some(best) if best.sse < node_sse - 1e-12 => best,
            _ => return TreeNode::Leaf { value: mean },
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.features[i][best.feature_idx] <= best.threshold);

        if left.is_empty() || right.is_empty() {
            return TreeNode::Leaf { value: mean };
        }

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left: Box::new(self.build(left, depth + 1)),
            right: Box::new(self.build(right, depth + 1)),
        }
    }

    /// Exhaustive search over midpoints between distinct sorted values
    fn best_split(&self, indices: &[usize], min_leaf: usize) -> Option<BestSplit> {
        let n = indices.len();
        let total_sum: f64 = indices.iter().map(|&i| self.targets[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| self.targets[i].powi(2)).sum();
        let n_features = self.features[indices[0]].len();

        let mut best: Option<BestSplit> = None;
        let mut order = indices.to_vec();

        for feature_idx in 0..n_features {
            order.sort_by(|&a, &b| {
                self.features[a][feature_idx].total_cmp(&self.features[b][feature_idx])
            });

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for pos in 0..n - 1 {
                let y = self.targets[order[pos]];
                left_sum += y;
                left_sq += y * y;

                let n_left = pos + 1;
                let n_right = n - n_left;
                if n_left < min_leaf {
                    continue;
                }
                if n_right < min_leaf {
                    break;
                }

                let x = self.features[order[pos]][feature_idx];
                let x_next = self.features[order[pos + 1]][feature_idx];
                if x_next <= x {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / n_left as f64)
                    + (right_sq - right_sum * right_sum / n_right as f64);

                if best.as_ref().map_or(true, |b| sse < b.sse - 1e-12) {
                    let mut threshold = x + (x_next - x) / 2.0;
                    if threshold >= x_next {
                        threshold = x;
                    }
                    best = Some(BestSplit {
                        feature_idx,
                        threshold,
                        sse,
                    });
                }
            }
        }

        best
    }
}
