use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use crate::{MlError, Result};

/// A labeled table: one row per sample, one column per named feature, and a
/// scalar target per row.
///
/// Row `i` of `features` is always paired with `targets[i]`, and column `j`
/// of `features` is always the feature named `feature_names[j]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Array2<f64>,
    targets: Array1<f64>,
    feature_names: Vec<String>,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Args
    /// * `features` - An `n x m` matrix, one row per sample.
    /// * `targets` - The `n` target values.
    /// * `feature_names` - The `m` column names, in column order.
    ///
    /// # Returns
    /// A new `Dataset` instance.
    ///
    /// # Errors
    /// - `MlError::ShapeMismatch` if the rows, targets and names disagree.
    /// - `MlError::EmptyDataset` if there are no rows.
    pub fn new<S: Into<String>>(
        features: Array2<f64>,
        targets: Array1<f64>,
        feature_names: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        let feature_names: Vec<String> = feature_names.into_iter().map(Into::into).collect();

        if targets.len() != features.nrows() {
            return Err(MlError::ShapeMismatch {
                what: "targets",
                got: targets.len(),
                expected: features.nrows(),
            });
        }

        if feature_names.len() != features.ncols() {
            return Err(MlError::ShapeMismatch {
                what: "feature names",
                got: feature_names.len(),
                expected: features.ncols(),
            });
        }

        if features.nrows() == 0 {
            return Err(MlError::EmptyDataset);
        }

        Ok(Self {
            features,
            targets,
            feature_names,
        })
    }

    /// Builds a `Dataset` from row-major buffers.
    ///
    /// # Args
    /// * `rows` - The flattened feature rows, `targets.len() * feature_names.len()` values.
    /// * `targets` - One target per row.
    /// * `feature_names` - The column names, in column order.
    ///
    /// # Errors
    /// Same as `Dataset::new`, plus a `ShapeMismatch` if `rows` can't be reshaped.
    pub fn from_rows<S: Into<String>>(
        rows: Vec<f64>,
        targets: Vec<f64>,
        feature_names: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        let feature_names: Vec<String> = feature_names.into_iter().map(Into::into).collect();
        let cols = feature_names.len();
        let expected = targets.len() * cols;

        if rows.len() != expected {
            return Err(MlError::ShapeMismatch {
                what: "feature rows",
                got: rows.len(),
                expected,
            });
        }

        let features =
            Array2::from_shape_vec((targets.len(), cols), rows).map_err(|_| MlError::ShapeMismatch {
                what: "feature rows",
                got: expected,
                expected,
            })?;

        Self::new(features, Array1::from_vec(targets), feature_names)
    }

    /// Returns the number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    #[inline]
    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    #[inline]
    pub fn targets(&self) -> ArrayView1<'_, f64> {
        self.targets.view()
    }

    #[inline]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Returns a new dataset holding only the given rows, in the given order.
    ///
    /// # Panics
    /// If any index is out of bounds.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), indices),
            targets: self.targets.select(Axis(0), indices),
            feature_names: self.feature_names.clone(),
        }
    }

    /// Splits the dataset into a training and a held-out partition.
    ///
    /// Row indices are shuffled with a `StdRng` seeded from `seed`; the first
    /// `ceil(len * test_fraction)` shuffled rows become the held-out set and the
    /// remaining rows the training set. The same seed always yields the same split.
    ///
    /// # Args
    /// * `test_fraction` - Share of rows to hold out, strictly between 0 and 1.
    /// * `seed` - Seed for the shuffle.
    ///
    /// # Returns
    /// `(train, test)`.
    ///
    /// # Errors
    /// `MlError::InvalidInput` if the fraction is out of range or would leave a
    /// partition empty.
    pub fn train_test_split(&self, test_fraction: f64, seed: u64) -> Result<(Self, Self)> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(MlError::InvalidInput(
                "test fraction must be strictly between 0 and 1",
            ));
        }

        let n = self.len();
        let n_test = (n as f64 * test_fraction).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(MlError::InvalidInput(
                "the split would leave an empty partition",
            ));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let (test, train) = indices.split_at(n_test);
        Ok((self.select(train), self.select(test)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy(n: usize) -> Dataset {
        let rows = (0..n).flat_map(|i| [i as f64, (i * 2) as f64]).collect();
        let targets = (0..n).map(|i| i as f64).collect();
        Dataset::from_rows(rows, targets, ["a", "b"]).unwrap()
    }

    #[test]
    fn new_rejects_mismatched_targets() {
        let err = Dataset::new(array![[1.0, 2.0], [3.0, 4.0]], array![1.0], ["a", "b"]).unwrap_err();
        assert_eq!(
            err,
            MlError::ShapeMismatch {
                what: "targets",
                got: 1,
                expected: 2
            }
        );
    }

    #[test]
    fn new_rejects_mismatched_names() {
        let err = Dataset::new(array![[1.0, 2.0]], array![1.0], ["a"]).unwrap_err();
        assert!(matches!(err, MlError::ShapeMismatch { what: "feature names", .. }));
    }

    #[test]
    fn new_rejects_empty() {
        let err = Dataset::from_rows(vec![], vec![], ["a"]).unwrap_err();
        assert_eq!(err, MlError::EmptyDataset);
    }

    #[test]
    fn select_keeps_rows_paired_with_targets() {
        let ds = toy(5);
        let sub = ds.select(&[4, 1]);
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.features(), array![[4.0, 8.0], [1.0, 2.0]]);
        assert_eq!(sub.targets(), array![4.0, 1.0]);
        assert_eq!(sub.feature_names(), ds.feature_names());
    }

    #[test]
    fn split_sizes_round_test_share_up() {
        let ds = toy(11);
        let (train, test) = ds.train_test_split(0.2, 42).unwrap();
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 8);
    }

    #[test]
    fn split_is_a_partition_of_the_rows() {
        let ds = toy(50);
        let (train, test) = ds.train_test_split(0.2, 7).unwrap();

        let mut seen: Vec<f64> = train.targets().iter().chain(test.targets().iter()).copied().collect();
        seen.sort_by(f64::total_cmp);
        let expected: Vec<f64> = (0..50).map(|i| i as f64).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn split_is_reproducible_for_a_seed() {
        let ds = toy(100);
        let a = ds.train_test_split(0.2, 42).unwrap();
        let b = ds.train_test_split(0.2, 42).unwrap();
        let c = ds.train_test_split(0.2, 43).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.1.targets(), c.1.targets());
    }

    #[test]
    fn split_rejects_bad_fractions() {
        let ds = toy(10);
        assert!(ds.train_test_split(0.0, 1).is_err());
        assert!(ds.train_test_split(1.0, 1).is_err());
        assert!(ds.train_test_split(f64::NAN, 1).is_err());
        assert!(toy(1).train_test_split(0.5, 1).is_err());
    }
}
