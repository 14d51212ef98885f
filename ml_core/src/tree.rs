use ndarray::{ArrayView1, ArrayView2};
use rand::{Rng, seq::index};
use serde::{Deserialize, Serialize};

use crate::{MlError, Regressor, Result};

/// Growth limits for a single regression tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    /// Maximum depth of the tree, `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    /// Minimum number of samples a node needs to be considered for splitting.
    pub min_samples_split: usize,
    /// Minimum number of samples each child of a split must keep.
    pub min_samples_leaf: usize,
    /// Number of features drawn at each node, `None` considers all of them.
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// The best split found for a node.
struct Candidate {
    feature: usize,
    threshold: f64,
    score: f64,
}

/// A CART regression tree using the squared-error criterion.
///
/// Nodes live in a flat vector; the root is always at index 0. A sample goes
/// to the left child when `row[feature] <= threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    n_features: usize,
}

impl RegressionTree {
    /// Fits a tree on a subset of the rows of `x`.
    ///
    /// # Args
    /// * `x` - The full feature matrix.
    /// * `y` - The full target vector.
    /// * `samples` - Row indices to fit on. Repeated indices weigh a row more,
    ///   which is how bootstrap samples are expressed.
    /// * `params` - Growth limits.
    /// * `rng` - Source for per-node feature subsampling.
    ///
    /// # Returns
    /// A fitted `RegressionTree`.
    ///
    /// # Errors
    /// - `MlError::EmptyDataset` if `samples` is empty.
    /// - `MlError::ShapeMismatch` if `x` and `y` disagree on the row count.
    /// - `MlError::InvalidInput` if `params` can't be honored.
    pub fn fit<R: Rng>(
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        mut samples: Vec<usize>,
        params: &TreeParams,
        rng: &mut R,
    ) -> Result<Self> {
        if y.len() != x.nrows() {
            return Err(MlError::ShapeMismatch {
                what: "targets",
                got: y.len(),
                expected: x.nrows(),
            });
        }

        if samples.is_empty() {
            return Err(MlError::EmptyDataset);
        }

        validate(params, x.ncols())?;

        let mut grower = Grower {
            x,
            y,
            params,
            nodes: Vec::new(),
            scratch: Vec::with_capacity(samples.len()),
        };
        grower.grow(&mut samples, 0, rng);

        Ok(Self {
            nodes: grower.nodes,
            n_features: x.ncols(),
        })
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf { .. }))
            .count()
    }

    /// Returns the length of the longest root-to-leaf path, a lone root is depth 0.
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(0, 0)];

        while let Some((id, depth)) = stack.pop() {
            match self.nodes[id] {
                Node::Leaf { .. } => max = max.max(depth),
                Node::Split { left, right, .. } => {
                    stack.push((left, depth + 1));
                    stack.push((right, depth + 1));
                }
            }
        }

        max
    }

    /// Checks the node table so that `predict_row` always terminates in
    /// bounds: children come strictly after their parent and exist, split
    /// features exist, and thresholds and leaf values are finite.
    ///
    /// # Errors
    /// `MlError::MalformedModel` naming the first broken invariant.
    pub fn check(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(MlError::MalformedModel("a tree has no nodes"));
        }

        for (id, node) in self.nodes.iter().enumerate() {
            match *node {
                Node::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(MlError::MalformedModel("a leaf value is not finite"));
                    }
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= self.n_features {
                        return Err(MlError::MalformedModel("a split uses an unknown feature"));
                    }
                    if !threshold.is_finite() {
                        return Err(MlError::MalformedModel("a split threshold is not finite"));
                    }
                    let in_range = |child: usize| child > id && child < self.nodes.len();
                    if !in_range(left) || !in_range(right) {
                        return Err(MlError::MalformedModel("a split points at an invalid child"));
                    }
                }
            }
        }

        Ok(())
    }
}

impl Regressor for RegressionTree {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        if row.len() != self.n_features {
            return Err(MlError::ShapeMismatch {
                what: "row",
                got: row.len(),
                expected: self.n_features,
            });
        }

        let mut id = 0;
        loop {
            match self.nodes[id] {
                Node::Leaf { value } => return Ok(value),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => id = if row[feature] <= threshold { left } else { right },
            }
        }
    }
}

fn validate(params: &TreeParams, n_features: usize) -> Result<()> {
    if params.min_samples_split < 2 {
        return Err(MlError::InvalidInput("min_samples_split must be at least 2"));
    }

    if params.min_samples_leaf == 0 {
        return Err(MlError::InvalidInput("min_samples_leaf must be at least 1"));
    }

    if let Some(k) = params.max_features {
        if k == 0 || k > n_features {
            return Err(MlError::InvalidInput(
                "max_features must be between 1 and the number of features",
            ));
        }
    }

    Ok(())
}

struct Grower<'a> {
    x: ArrayView2<'a, f64>,
    y: ArrayView1<'a, f64>,
    params: &'a TreeParams,
    nodes: Vec<Node>,
    scratch: Vec<(f64, f64)>,
}

impl Grower<'_> {
    /// Grows the subtree for `samples` and returns the id of its root.
    fn grow<R: Rng>(&mut self, samples: &mut [usize], depth: usize, rng: &mut R) -> usize {
        let id = self.nodes.len();
        let mean = samples.iter().map(|&i| self.y[i]).sum::<f64>() / samples.len() as f64;
        self.nodes.push(Node::Leaf { value: mean });

        let too_deep = self.params.max_depth.is_some_and(|max| depth >= max);
        if too_deep || samples.len() < self.params.min_samples_split || self.is_pure(samples) {
            return id;
        }

        let Some(best) = self.best_split(samples, rng) else {
            return id;
        };

        let mid = partition(samples, |i| self.x[[i, best.feature]] <= best.threshold);
        let (left_samples, right_samples) = samples.split_at_mut(mid);
        let left = self.grow(left_samples, depth + 1, rng);
        let right = self.grow(right_samples, depth + 1, rng);

        self.nodes[id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };

        id
    }

    fn is_pure(&self, samples: &[usize]) -> bool {
        let first = self.y[samples[0]];
        samples.iter().all(|&i| self.y[i] == first)
    }

    /// Finds the split maximizing `sum_l^2 / n_l + sum_r^2 / n_r`, which is
    /// equivalent to minimizing the children's summed squared error.
    fn best_split<R: Rng>(&mut self, samples: &[usize], rng: &mut R) -> Option<Candidate> {
        let n = samples.len();
        let n_features = self.x.ncols();
        let min_leaf = self.params.min_samples_leaf;

        let features: Vec<usize> = match self.params.max_features {
            Some(k) if k < n_features => index::sample(rng, n_features, k).into_vec(),
            _ => (0..n_features).collect(),
        };

        let total: f64 = samples.iter().map(|&i| self.y[i]).sum();
        let parent_score = total * total / n as f64;
        let mut best: Option<Candidate> = None;

        for feature in features {
            self.scratch.clear();
            self.scratch
                .extend(samples.iter().map(|&i| (self.x[[i, feature]], self.y[i])));
            self.scratch.sort_by(|a, b| a.0.total_cmp(&b.0));

            if self.scratch[0].0 == self.scratch[n - 1].0 {
                continue;
            }

            let mut left_sum = 0.0;
            for pos in 1..n {
                left_sum += self.scratch[pos - 1].1;

                let (prev, curr) = (self.scratch[pos - 1].0, self.scratch[pos].0);
                if curr <= prev || pos < min_leaf || n - pos < min_leaf {
                    continue;
                }

                let right_sum = total - left_sum;
                let score = left_sum * left_sum / pos as f64
                    + right_sum * right_sum / (n - pos) as f64;

                if best.as_ref().is_none_or(|b| score > b.score) {
                    let mut threshold = prev + (curr - prev) / 2.0;
                    if threshold >= curr {
                        threshold = prev;
                    }

                    best = Some(Candidate {
                        feature,
                        threshold,
                        score,
                    });
                }
            }
        }

        best.filter(|b| b.score > parent_score + parent_score.abs() * 1e-12)
    }
}

/// Moves every element matching `pred` to the front and returns how many did.
fn partition<F: Fn(usize) -> bool>(samples: &mut [usize], pred: F) -> usize {
    let mut mid = 0;
    for i in 0..samples.len() {
        if pred(samples[i]) {
            samples.swap(mid, i);
            mid += 1;
        }
    }
    mid
}
