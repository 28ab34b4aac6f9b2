//! Feature matrix construction and standardization

use crate::error::{AnalysisError, Result};
use linfa::traits::{Fit, Transformer};
use linfa::Dataset;
use linfa_preprocessing::linear_scaling::LinearScaler;
use ndarray::{Array1, Array2};

/// Build a feature matrix from row-major values
///
/// Every row must have the same, non-zero number of columns and every
/// value must be finite.
pub fn feature_matrix(rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    let n_rows = rows.len();
    if n_rows == 0 {
        return Err(AnalysisError::InvalidInput(
            "feature matrix has no rows".to_string(),
        ));
    }

    let n_cols = rows[0].len();
    if n_cols == 0 {
        return Err(AnalysisError::InvalidInput(
            "feature matrix has no columns".to_string(),
        ));
    }

    let mut values = Vec::with_capacity(n_rows * n_cols);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != n_cols {
            return Err(AnalysisError::InvalidInput(format!(
                "row {} has {} columns, expected {}",
                i,
                row.len(),
                n_cols
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::InvalidInput(format!(
                "row {} contains a non-finite value",
                i
            )));
        }
        values.extend_from_slice(row);
    }

    Array2::from_shape_vec((n_rows, n_cols), values)
        .map_err(|e| AnalysisError::InvalidInput(e.to_string()))
}

/// Rescale every column to zero mean and unit (population) variance
///
/// A fresh scaler is fitted on every call, so no statistics are shared
/// between matrices. Constant columns map to all zeros.
///
/// # Arguments
/// * `features` - Raw feature matrix, one row per entity
///
/// # Returns
/// Standardized matrix with the same shape as `features`
pub fn standardize(features: &Array2<f64>) -> Result<Array2<f64>> {
    if features.nrows() == 0 || features.ncols() == 0 {
        return Err(AnalysisError::InvalidInput(format!(
            "cannot standardize a {}x{} matrix",
            features.nrows(),
            features.ncols()
        )));
    }

    let dataset = Dataset::new(features.clone(), Array1::<f64>::zeros(features.nrows()));
    let scaler = LinearScaler::standard()
        .fit(&dataset)
        .map_err(|e| AnalysisError::InvalidInput(format!("failed to fit scaler: {}", e)))?;

    Ok(scaler.transform(features.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Axis};

    #[test]
    fn test_standardized_columns_have_zero_mean_unit_std() {
        let raw = array![
            [1.0, 200.0, -3.0],
            [2.0, 150.0, 4.5],
            [3.0, 900.0, 0.25],
            [10.0, 10.0, 7.0],
            [4.0, 55.0, -1.0],
        ];

        let scaled = standardize(&raw).unwrap();
        assert_eq!(scaled.shape(), raw.shape());

        let means = scaled.mean_axis(Axis(0)).unwrap();
        let stds = scaled.std_axis(Axis(0), 0.0);
        for j in 0..scaled.ncols() {
            assert!(means[j].abs() < 1e-9, "column {} mean {}", j, means[j]);
            assert!((stds[j] - 1.0).abs() < 1e-9, "column {} std {}", j, stds[j]);
        }
    }

    #[test]
    fn test_constant_column_becomes_zero() {
        let raw = array![[5.0, 1.0], [5.0, 2.0], [5.0, 3.0], [5.0, 10.0]];

        let scaled = standardize(&raw).unwrap();
        assert!(scaled.column(0).iter().all(|&v| v == 0.0));
        assert!(scaled.column(1).iter().all(|v| v.is_finite()));
        assert!((scaled.std_axis(Axis(0), 0.0)[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_row_is_all_zero() {
        let raw = array![[3.0, 4.0, 5.0]];
        let scaled = standardize(&raw).unwrap();
        assert!(scaled.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_standardize_rejects_empty_matrix() {
        let empty = Array2::<f64>::zeros((0, 3));
        assert!(matches!(
            standardize(&empty),
            Err(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_feature_matrix_validation() {
        let matrix = feature_matrix(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(matrix.shape(), &[2, 2]);
        assert_eq!(matrix[[1, 0]], 3.0);

        assert!(matches!(
            feature_matrix(&[]),
            Err(AnalysisError::InvalidInput(_))
        ));
        assert!(matches!(
            feature_matrix(&[vec![1.0, 2.0], vec![3.0]]),
            Err(AnalysisError::InvalidInput(_))
        ));
        assert!(matches!(
            feature_matrix(&[vec![1.0, f64::NAN]]),
            Err(AnalysisError::InvalidInput(_))
        ));
        assert!(matches!(
            feature_matrix(&[vec![]]),
            Err(AnalysisError::InvalidInput(_))
        ));
    }
}
