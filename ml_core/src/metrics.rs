use ndarray::ArrayView1;

use crate::{MlError, Result};

fn check_lengths(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<()> {
    if y_pred.len() != y_true.len() {
        return Err(MlError::ShapeMismatch {
            what: "predictions",
            got: y_pred.len(),
            expected: y_true.len(),
        });
    }

    if y_true.is_empty() {
        return Err(MlError::EmptyDataset);
    }

    Ok(())
}

/// Mean of the squared differences between targets and predictions.
pub fn mean_squared_error(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;

    let sum: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    Ok(sum / y_true.len() as f64)
}

/// Square root of `mean_squared_error`, in the same units as the target.
pub fn root_mean_squared_error(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<f64> {
    mean_squared_error(y_true, y_pred).map(f64::sqrt)
}

/// Coefficient of determination. A constant `y_true` scores 1.0 on a perfect
/// fit and 0.0 otherwise.
pub fn r2_score(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;

    let mean = y_true.sum() / y_true.len() as f64;
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }

    Ok(1.0 - ss_res / ss_tot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, array};

    #[test]
    fn mse_and_rmse() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        let p = array![1.0, 2.0, 3.0, 8.0];
        assert_eq!(mean_squared_error(y.view(), p.view()).unwrap(), 4.0);
        assert_eq!(root_mean_squared_error(y.view(), p.view()).unwrap(), 2.0);
    }

    #[test]
    fn r2_of_perfect_and_mean_predictions() {
        let y = array![1.0, 2.0, 3.0];
        assert_eq!(r2_score(y.view(), y.view()).unwrap(), 1.0);

        let mean = array![2.0, 2.0, 2.0];
        assert_eq!(r2_score(y.view(), mean.view()).unwrap(), 0.0);
    }

    #[test]
    fn metrics_reject_mismatched_or_empty_inputs() {
        let y = array![1.0, 2.0];
        let p = array![1.0];
        assert!(matches!(
            mean_squared_error(y.view(), p.view()),
            Err(MlError::ShapeMismatch { got: 1, expected: 2, .. })
        ));

        let empty: Array1<f64> = Array1::zeros(0);
        assert_eq!(
            root_mean_squared_error(empty.view(), empty.view()),
            Err(MlError::EmptyDataset)
        );
    }
}
