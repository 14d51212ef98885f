use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{Dataset, MlError, RegressionTree, Regressor, Result, TreeParams};

/// Hyperparameters for a `RandomForestRegressor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub tree: TreeParams,
    /// Whether each tree is fit on a bootstrap sample instead of the full set.
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            tree: TreeParams::default(),
            bootstrap: true,
            seed: 0,
        }
    }
}

impl ForestParams {
    pub fn with_n_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }
}

/// An ensemble of regression trees whose prediction is the mean of its trees'.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForestRegressor {
    /// Fits a forest on the whole dataset.
    ///
    /// One seed per tree is drawn up front from a `StdRng` seeded with
    /// `params.seed`, then trees are fit in parallel. Each tree only sees its
    /// own seed, so the fitted forest doesn't depend on thread scheduling.
    ///
    /// # Args
    /// * `dataset` - The training data.
    /// * `params` - The forest hyperparameters.
    ///
    /// # Returns
    /// A fitted `RandomForestRegressor`.
    ///
    /// # Errors
    /// `MlError::InvalidInput` if `params` are invalid for this dataset.
    pub fn fit(dataset: &Dataset, params: &ForestParams) -> Result<Self> {
        if params.n_trees == 0 {
            return Err(MlError::InvalidInput("a forest needs at least one tree"));
        }

        let x = dataset.features();
        let y = dataset.targets();
        let n = dataset.len();

        let mut master = StdRng::seed_from_u64(params.seed);
        let seeds: Vec<u64> = (0..params.n_trees).map(|_| master.random()).collect();

        let trees = seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let samples = if params.bootstrap {
                    (0..n).map(|_| rng.random_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                RegressionTree::fit(x, y, samples, &params.tree, &mut rng)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            trees,
            n_features: dataset.n_features(),
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Checks that the forest can be evaluated: it has trees, and every tree
    /// is well formed and agrees with the forest on the feature count.
    ///
    /// Fitted forests always pass, this guards forests decoded from disk.
    ///
    /// # Errors
    /// `MlError::MalformedModel` naming the first broken invariant.
    pub fn check(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(MlError::MalformedModel("the forest has no trees"));
        }

        for tree in &self.trees {
            if tree.n_features() != self.n_features {
                return Err(MlError::MalformedModel(
                    "a tree disagrees with the forest on the feature count",
                ));
            }
            tree.check()?;
        }

        Ok(())
    }
}

impl Regressor for RandomForestRegressor {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        let mut sum = 0.0;
        for tree in &self.trees {
            sum += tree.predict_row(row)?;
        }

        Ok(sum / self.trees.len() as f64)
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(MlError::ShapeMismatch {
                what: "columns",
                got: x.ncols(),
                expected: self.n_features,
            });
        }

        let predictions = x
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| self.predict_row(row))
            .collect::<Result<Vec<f64>>>()?;

        Ok(Array1::from_vec(predictions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::root_mean_squared_error;
    use ndarray::array;

    /// y = 3 * x0 - 2 * x1 + a small deterministic wiggle.
    fn linear(n: usize) -> Dataset {
        let rows = (0..n)
            .flat_map(|i| [(i % 17) as f64, (i % 5) as f64 * 0.5])
            .collect::<Vec<_>>();
        let targets = rows
            .chunks(2)
            .enumerate()
            .map(|(i, r)| 3.0 * r[0] - 2.0 * r[1] + (i % 3) as f64 * 0.01)
            .collect();
        Dataset::from_rows(rows, targets, ["x0", "x1"]).unwrap()
    }

    #[test]
    fn fit_builds_the_requested_amount_of_trees() {
        let ds = linear(60);
        let params = ForestParams::default().with_n_trees(7).with_seed(1);
        let forest = RandomForestRegressor::fit(&ds, &params).unwrap();
        assert_eq!(forest.n_trees(), 7);
        assert_eq!(forest.n_features(), 2);
    }

    #[test]
    fn same_seed_same_forest() {
        let ds = linear(80);
        let params = ForestParams::default().with_n_trees(10).with_seed(42);
        let a = RandomForestRegressor::fit(&ds, &params).unwrap();
        let b = RandomForestRegressor::fit(&ds, &params).unwrap();
        assert_eq!(a, b);

        let c = RandomForestRegressor::fit(&ds, &params.with_seed(43)).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn forest_generalizes_on_a_smooth_target() {
        let ds = linear(400);
        let (train, test) = ds.train_test_split(0.2, 42).unwrap();
        let params = ForestParams::default().with_n_trees(20).with_seed(42);
        let forest = RandomForestRegressor::fit(&train, &params).unwrap();

        let pred = forest.predict(test.features()).unwrap();
        let rmse = root_mean_squared_error(test.targets(), pred.view()).unwrap();
        assert!(rmse < 1.0, "rmse too high: {rmse}");
    }

    #[test]
    fn prediction_is_the_mean_of_the_trees() {
        let ds = linear(50);
        let params = ForestParams::default().with_n_trees(5).with_seed(3);
        let forest = RandomForestRegressor::fit(&ds, &params).unwrap();

        let row = array![4.0, 1.0];
        let mean = forest
            .trees()
            .iter()
            .map(|t| t.predict_row(row.view()).unwrap())
            .sum::<f64>()
            / 5.0;
        let got = forest.predict_row(row.view()).unwrap();
        assert!((got - mean).abs() < 1e-12);
    }

    #[test]
    fn without_bootstrap_every_tree_memorizes() {
        let ds = linear(30);
        let params = ForestParams::default()
            .with_n_trees(3)
            .with_bootstrap(false);
        let forest = RandomForestRegressor::fit(&ds, &params).unwrap();

        let pred = forest.predict(ds.features()).unwrap();
        for (p, t) in pred.iter().zip(ds.targets().iter()) {
            assert!((p - t).abs() < 1e-9, "{p} != {t}");
        }
    }

    #[test]
    fn rejects_zero_trees_and_bad_rows() {
        let ds = linear(10);
        assert!(matches!(
            RandomForestRegressor::fit(&ds, &ForestParams::default().with_n_trees(0)),
            Err(MlError::InvalidInput(_))
        ));

        let forest =
            RandomForestRegressor::fit(&ds, &ForestParams::default().with_n_trees(2)).unwrap();
        assert!(forest.predict(array![[1.0, 2.0, 3.0]].view()).is_err());
        assert!(forest.predict_row(array![1.0].view()).is_err());
    }

    #[test]
    fn check_accepts_fitted_and_rejects_hollow_forests() {
        let ds = linear(30);
        let params = ForestParams::default().with_n_trees(3).with_seed(9);
        let forest = RandomForestRegressor::fit(&ds, &params).unwrap();
        forest.check().unwrap();

        let hollow = RandomForestRegressor {
            trees: Vec::new(),
            n_features: 2,
        };
        assert!(matches!(hollow.check(), Err(MlError::MalformedModel(_))));

        let widened = RandomForestRegressor {
            trees: forest.trees.clone(),
            n_features: 3,
        };
        assert!(matches!(widened.check(), Err(MlError::MalformedModel(_))));
    }
}
