use std::path::Path;

use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};
use tracing_indicatif::span_ext::IndicatifSpanExt;
use tracing_indicatif::style::ProgressStyle;

use crate::io_utils;
use crate::{AppError, AppResult};

/// Trajectories longer than this are projected in chunks behind a progress bar.
const PROGRESS_CHUNK: usize = 4096;

/// A truncated eigenbasis ready to map features into the reduced space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducedBasis {
    vecs: Array2<f64>,
    vals: Array1<f64>,
    total: usize,
}

impl ReducedBasis {
    /// `total` is how many components the full decomposition had.
    pub fn new(vecs: Array2<f64>, vals: Array1<f64>, total: usize) -> AppResult<Self> {
        if vecs.ncols() != vals.len() {
            return Err(AppError::Shape(format!(
                "{} projection vectors but {} eigenvalues",
                vecs.ncols(),
                vals.len()
            )));
        }
        if vals.is_empty() {
            return Err(AppError::EmptyBasis("building the reduced basis".to_string()));
        }
        let total = total.max(vals.len());
        Ok(Self { vecs, vals, total })
    }

    /// Load a basis saved by [`ReducedBasis::save`]; no filtering or truncation is applied.
    #[tracing::instrument(name = "Loading reduced basis", level = "info")]
    pub fn load<P: AsRef<Path> + std::fmt::Debug>(path: P) -> AppResult<Self> {
        let basis: ReducedBasis = io_utils::read_file(path)?;
        // re-check invariants the file could have broken
        Self::new(basis.vecs, basis.vals, basis.total)
    }

    pub fn save<P: AsRef<Path> + std::fmt::Debug>(&self, path: P) -> AppResult<()> {
        io_utils::write_file(path, self)
    }

    pub fn vecs(&self) -> ArrayView2<'_, f64> {
        self.vecs.view()
    }

    pub fn vals(&self) -> ArrayView1<'_, f64> {
        self.vals.view()
    }

    pub fn n_components(&self) -> usize {
        self.vals.len()
    }

    pub fn n_features(&self) -> usize {
        self.vecs.nrows()
    }

    pub fn n_total(&self) -> usize {
        self.total
    }

    /// Project frames (rows of `features`) onto the retained vectors.
    #[tracing::instrument(name = "Projecting frames", level = "debug", skip_all)]
    pub fn execute(&self, features: ArrayView2<f64>) -> AppResult<Array2<f64>> {
        let (n_frames, n_features) = features.dim();
        if n_features != self.n_features() {
            return Err(AppError::Shape(format!(
                "frames have {} features but the projection expects {}",
                n_features,
                self.n_features()
            )));
        }
        if n_frames <= PROGRESS_CHUNK {
            return Ok(features.dot(&self.vecs));
        }

        debug!(
            "Projecting {} frames in chunks of {}",
            n_frames, PROGRESS_CHUNK
        );
        let span = info_span!("Projecting trajectory");
        span.pb_set_message("Projecting...");
        span.pb_set_finish_message("Projection complete");
        span.pb_set_length(n_frames as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            span.pb_set_style(&style);
        }
        let _enter = span.enter();

        let mut projected = Array2::<f64>::zeros((n_frames, self.n_components()));
        for (chunk, mut out) in features
            .axis_chunks_iter(Axis(0), PROGRESS_CHUNK)
            .zip(projected.axis_chunks_iter_mut(Axis(0), PROGRESS_CHUNK))
        {
            out.assign(&chunk.dot(&self.vecs));
            span.pb_inc(chunk.nrows() as u64);
        }
        Ok(projected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basis() -> ReducedBasis {
        ReducedBasis::new(
            array![[1.0, 0.0], [0.0, 2.0], [1.0, 1.0]],
            array![0.7, 0.2],
            3,
        )
        .unwrap()
    }

    #[test]
    fn execute_is_a_matrix_product() {
        let features = array![[1.0, 2.0, 3.0], [0.0, -1.0, 0.5]];
        let projected = basis().execute(features.view()).unwrap();
        assert_eq!(projected, array![[4.0, 7.0], [0.5, -1.5]]);
    }

    #[test]
    fn execute_rejects_wrong_feature_count() {
        let features = array![[1.0, 2.0]];
        assert!(matches!(
            basis().execute(features.view()),
            Err(AppError::Shape(_))
        ));
    }

    #[test]
    fn chunked_projection_matches_direct_product() {
        let n = PROGRESS_CHUNK * 2 + 17;
        let features = Array2::from_shape_fn((n, 3), |(i, j)| ((i * 3 + j) % 11) as f64 - 5.0);
        let basis = basis();
        let projected = basis.execute(features.view()).unwrap();
        assert_eq!(projected, features.dot(&basis.vecs));
    }

    #[test]
    fn empty_basis_is_rejected() {
        assert!(matches!(
            ReducedBasis::new(Array2::zeros((3, 0)), Array1::zeros(0), 3),
            Err(AppError::EmptyBasis(_))
        ));
    }

    #[test]
    fn saved_basis_loads_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("basis.json");
        let basis = basis();
        basis.save(&path).unwrap();
        assert_eq!(ReducedBasis::load(&path).unwrap(), basis);
    }
}
