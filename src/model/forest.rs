//! Bagged ensemble of regression trees (random forest)

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::model::tree::{RegressionTree, TreeParams};
use crate::{ForestConfig, Result, TrafficError};

/// Trained random forest regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
    /// Seed the ensemble was grown from
    seed: u64,
}

impl RandomForest {
    /// Train `config.n_trees` trees on bootstrap resamples of `x`/`y`.
    ///
    /// Per-tree seeds are drawn up front from an RNG seeded with `seed`, so a
    /// fixed seed gives the same forest whatever order rayon builds the trees
    /// in, and neighbouring seeds share no trees.
    pub fn train(x: &[Vec<f64>], y: &[f64], config: &ForestConfig) -> Result<Self> {
        if x.is_empty() {
            return Err(TrafficError::EmptyDataset(
                "cannot train a forest on zero rows".to_string(),
            ));
        }
        if x.len() != y.len() {
            return Err(TrafficError::InvalidInput(format!(
                "{} feature rows but {} targets",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        if n_features == 0 {
            return Err(TrafficError::InvalidInput(
                "feature rows are empty".to_string(),
            ));
        }
        if let Some(row) = x.iter().position(|r| r.len() != n_features) {
            return Err(TrafficError::InvalidInput(format!(
                "row {} has {} features, expected {}",
                row,
                x[row].len(),
                n_features
            )));
        }
        if let Some(row) = y.iter().position(|v| !v.is_finite()) {
            return Err(TrafficError::InvalidInput(format!(
                "target at row {} is not finite",
                row
            )));
        }
        if config.n_trees == 0 {
            return Err(TrafficError::Config("n_trees must be at least 1".to_string()));
        }

        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let params = TreeParams {
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split.max(2),
            min_samples_leaf: config.min_samples_leaf.max(1),
            max_features: config.max_features.resolve(n_features),
        };
        let n_rows = x.len();

        log::info!(
            "Training {} trees on {} rows x {} features (max_features={}, seed={})",
            config.n_trees,
            n_rows,
            n_features,
            params.max_features,
            seed
        );

        let mut master = StdRng::seed_from_u64(seed);
        let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| master.random()).collect();

        let trees: Vec<RegressionTree> = tree_seeds
            .into_par_iter()
            .enumerate()
            .map(|(i, tree_seed)| {
                let mut rng = StdRng::seed_from_u64(tree_seed);
                let rows: Vec<usize> = if config.bootstrap {
                    (0..n_rows).map(|_| rng.random_range(0..n_rows)).collect()
                } else {
                    (0..n_rows).collect()
                };
                let tree = RegressionTree::fit(x, y, &rows, &params, &mut rng);
                log::debug!(
                    "Tree {}: depth={}, leaves={}",
                    i,
                    tree.depth(),
                    tree.n_leaves()
                );
                tree
            })
            .collect();

        Ok(RandomForest {
            trees,
            n_features,
            seed,
        })
    }

    /// Mean of the per-tree predictions
    pub fn predict(&self, sample: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict(sample)).sum();
        total / self.trees.len() as f64
    }

    /// Share of the total squared-error reduction attributable to each
    /// feature, summed over every split in every tree. Sums to 1; uniform
    /// when no split ever reduced the error.
    pub fn feature_importance(&self) -> Vec<f64> {
        let totals = self
            .trees
            .iter()
            .fold(vec![0.0; self.n_features], |mut acc, tree| {
                tree.accumulate_gain(&mut acc);
                acc
            });

        let sum: f64 = totals.iter().sum();
        if sum > 0.0 && sum.is_finite() {
            totals.iter().map(|g| g / sum).collect()
        } else {
            vec![1.0 / self.n_features as f64; self.n_features]
        }
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Input dimensionality the forest was trained on
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}
