use ndarray::prelude::*;

use crate::decomposition::RawDecomposition;
use crate::{AppError, AppResult};

/// Principal components of a (frames, features) matrix.
///
/// Eigenvectors of the sample covariance (n - 1 normalisation) become the
/// columns of `vecs`. The result is unsorted and unfiltered, ready to be
/// saved and loaded back through [`crate::Decomposition::load`].
#[tracing::instrument(name = "Performing PCA", level = "info", skip(features))]
pub fn covariance_decomposition(features: ArrayView2<f64>) -> AppResult<RawDecomposition> {
    let (n_frames, n_features) = features.dim();
    if n_frames < 2 {
        return Err(AppError::Shape(format!(
            "need at least two frames to estimate a covariance, got {}",
            n_frames
        )));
    }
    if n_features == 0 {
        return Err(AppError::Shape("frames have no features".to_string()));
    }
    if features.iter().any(|v| !v.is_finite()) {
        return Err(AppError::Decomposition(
            "features contain NaN or infinite values".to_string(),
        ));
    }

    let mean: Array1<f64> = features
        .mean_axis(Axis(0))
        .ok_or_else(|| AppError::Shape("empty feature matrix".to_string()))?;
    let centered: Array2<f64> = &features - &mean;
    let cov: Array2<f64> = centered.t().dot(&centered) / (n_frames as f64 - 1.0);

    let (vals, vecs) = symmetric_eigen(cov)?;
    Ok(RawDecomposition::new(vecs, vals))
}

#[cfg(not(feature = "lapack"))]
fn symmetric_eigen(cov: Array2<f64>) -> AppResult<(Array1<f64>, Array2<f64>)> {
    use nalgebra::{DMatrix, SymmetricEigen};

    let d = cov.nrows();
    let matrix = DMatrix::from_fn(d, d, |i, j| cov[(i, j)]);
    let eigen = SymmetricEigen::new(matrix);
    let vals = Array1::from_iter(eigen.eigenvalues.iter().copied());
    let vecs = Array2::from_shape_fn((d, d), |(i, j)| eigen.eigenvectors[(i, j)]);
    Ok((vals, vecs))
}

#[cfg(feature = "lapack")]
fn symmetric_eigen(cov: Array2<f64>) -> AppResult<(Array1<f64>, Array2<f64>)> {
    use ndarray_linalg::{Eigh, UPLO};

    Ok(cov.eigh(UPLO::Lower)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decomposition::{Decomposition, FilterOptions};

    #[test]
    fn points_on_a_line_have_one_component() {
        let features = array![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]];
        let raw = covariance_decomposition(features.view()).unwrap();
        let dec = Decomposition::from_raw(
            raw,
            &FilterOptions {
                max_eigenvalue: None,
            },
        )
        .unwrap();

        // cov = [[1, 1], [1, 1]]
        assert!((dec.vals()[0] - 2.0).abs() < 1e-10);
        assert!(dec.vals()[1].abs() < 1e-10);
        let lead = dec.vecs().column(0).to_owned();
        let expected = 1.0 / 2.0_f64.sqrt();
        assert!((lead[0].abs() - expected).abs() < 1e-10);
        assert!((lead[0] - lead[1]).abs() < 1e-10);
    }

    #[test]
    fn eigenvectors_are_orthonormal() {
        let features = array![
            [0.1, 0.4, -0.2],
            [0.3, -0.1, 0.0],
            [-0.2, 0.2, 0.5],
            [0.0, 0.3, 0.1],
            [0.4, -0.3, -0.1]
        ];
        let raw = covariance_decomposition(features.view()).unwrap();
        let gram = raw.vecs.t().dot(&raw.vecs);
        for i in 0..3 {
            for j in 0..3 {
                let target = if i == j { 1.0 } else { 0.0 };
                assert!((gram[(i, j)] - target).abs() < 1e-10);
            }
        }
        // total variance is preserved
        let centered = &features - &features.mean_axis(Axis(0)).unwrap();
        let trace = centered.mapv(|v| v * v).sum() / 4.0;
        assert!((raw.vals.sum() - trace).abs() < 1e-10);
    }

    #[test]
    fn too_few_frames_is_an_error() {
        let features = array![[1.0, 2.0]];
        assert!(matches!(
            covariance_decomposition(features.view()),
            Err(AppError::Shape(_))
        ));
    }
}
