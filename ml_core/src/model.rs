use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::{MlError, Result};

/// A fitted model mapping a row of features to a scalar.
///
/// A `Regressor` is immutable once fitted. It does not:
/// - own datasets,
/// - know the names of its features,
/// - retrain itself.
pub trait Regressor: Send + Sync {
    /// Returns the number of features expected in every row.
    fn n_features(&self) -> usize;

    /// Predicts the target of a single row.
    ///
    /// # Errors
    /// Returns `MlError::ShapeMismatch` if `row.len() != self.n_features()`.
    fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64>;

    /// Predicts the target of every row of `x`.
    ///
    /// # Errors
    /// Returns `MlError::ShapeMismatch` if `x` has the wrong amount of columns.
    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features() {
            return Err(MlError::ShapeMismatch {
                what: "columns",
                got: x.ncols(),
                expected: self.n_features(),
            });
        }

        x.outer_iter().map(|row| self.predict_row(row)).collect()
    }
}
