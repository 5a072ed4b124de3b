pub mod pca;
pub mod reduction;

use std::cmp::Ordering;
use std::path::Path;

use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::io_utils;
use crate::projection::ReducedBasis;
use crate::{AppError, AppResult};

pub use reduction::Reduction;

/// Eigenvalues at or above this are dropped unless the caller lifts the cap.
pub const DEFAULT_MAX_EIGENVALUE: f64 = 1.0;

/// Projection vectors and eigenvalues as they are stored on disk.
///
/// Columns of `vecs` are components, rows are input features. Solvers for
/// non-symmetric problems can hand back complex pairs, so the imaginary parts
/// travel alongside when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDecomposition {
    pub vecs: Array2<f64>,
    #[serde(default)]
    pub vecs_imag: Option<Array2<f64>>,
    pub vals: Array1<f64>,
    #[serde(default)]
    pub vals_imag: Option<Array1<f64>>,
}

impl RawDecomposition {
    pub fn new(vecs: Array2<f64>, vals: Array1<f64>) -> Self {
        Self {
            vecs,
            vecs_imag: None,
            vals,
            vals_imag: None,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.vecs.ncols() != self.vals.len() {
            return Err(AppError::Shape(format!(
                "{} projection vectors but {} eigenvalues",
                self.vecs.ncols(),
                self.vals.len()
            )));
        }
        if let Some(imag) = self
            .vecs_imag
            .as_ref()
            .filter(|im| im.dim() != self.vecs.dim())
        {
            return Err(AppError::Shape(format!(
                "imaginary vectors are {:?} but real vectors are {:?}",
                imag.dim(),
                self.vecs.dim()
            )));
        }
        if let Some(imag) = self
            .vals_imag
            .as_ref()
            .filter(|im| im.len() != self.vals.len())
        {
            return Err(AppError::Shape(format!(
                "{} imaginary eigenvalue parts for {} eigenvalues",
                imag.len(),
                self.vals.len()
            )));
        }
        Ok(())
    }

    /// Whether component `j` passes the filter in `opts`.
    fn keeps(&self, j: usize, opts: &FilterOptions) -> bool {
        let val = self.vals[j];
        let real_val = self.vals_imag.as_ref().is_none_or(|im| im[j] == 0.0);
        let real_vec = self
            .vecs_imag
            .as_ref()
            .is_none_or(|im| im.column(j).iter().all(|v| *v == 0.0));
        let under_cap = opts.max_eigenvalue.is_none_or(|cap| val < cap);
        val.is_finite() && real_val && real_vec && under_cap
    }
}

/// Which components survive loading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterOptions {
    /// Exclusive upper bound on eigenvalues. `None` disables the cap.
    pub max_eigenvalue: Option<f64>,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            max_eigenvalue: Some(DEFAULT_MAX_EIGENVALUE),
        }
    }
}

/// Real-valued eigenbasis sorted by decreasing eigenvalue.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    vecs: Array2<f64>,
    vals: Array1<f64>,
    n_loaded: usize,
}

impl Decomposition {
    #[tracing::instrument(name = "Loading projection object", level = "info", skip(opts))]
    pub fn load<P: AsRef<Path> + std::fmt::Debug>(path: P, opts: &FilterOptions) -> AppResult<Self> {
        let raw: RawDecomposition = io_utils::read_file(path)?;
        Self::from_raw(raw, opts)
    }

    /// Drop complex and out-of-range components, then sort the rest.
    pub fn from_raw(raw: RawDecomposition, opts: &FilterOptions) -> AppResult<Self> {
        raw.validate()?;
        let n_loaded = raw.vals.len();

        let mut keep: Vec<usize> = (0..n_loaded).filter(|&j| raw.keeps(j, opts)).collect();
        if keep.len() < n_loaded {
            warn!(
                "Dropped {} of {} components that were complex, non-finite or above the eigenvalue cap",
                n_loaded - keep.len(),
                n_loaded
            );
        }
        if keep.is_empty() {
            return Err(AppError::EmptyBasis(
                "dropping complex and out-of-range components".to_string(),
            ));
        }

        // stable, so ties stay in file order
        keep.sort_by(|&a, &b| {
            raw.vals[b]
                .partial_cmp(&raw.vals[a])
                .unwrap_or(Ordering::Equal)
        });

        let vecs = raw.vecs.select(Axis(1), &keep);
        let vals = raw.vals.select(Axis(0), &keep);
        debug!("Loaded eigenvalues: {}", vals);

        Ok(Self {
            vecs,
            vals,
            n_loaded,
        })
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

    /// Components present in the file before filtering.
    pub fn n_loaded(&self) -> usize {
        self.n_loaded
    }

    pub fn total_variance(&self) -> f64 {
        self.vals.sum()
    }

    /// Each eigenvalue as a share of the total. All zeros when the total is not positive.
    pub fn explained_variance_ratio(&self) -> Array1<f64> {
        let total = self.total_variance();
        if total > 0.0 {
            &self.vals / total
        } else {
            Array1::zeros(self.vals.len())
        }
    }

    /// Truncate the basis. The full decomposition is left untouched.
    #[tracing::instrument(name = "Reducing projection", level = "info", skip(self))]
    pub fn reduce(&self, reduction: &Reduction) -> AppResult<ReducedBasis> {
        let keep = reduction.retained(self.vals.view())?;
        if keep == 0 {
            return Err(AppError::EmptyBasis(format!("applying {}", reduction)));
        }
        let basis = ReducedBasis::new(
            self.vecs.slice(s![.., ..keep]).to_owned(),
            self.vals.slice(s![..keep]).to_owned(),
            self.n_components(),
        )?;
        info!(
            "Kept {} out of {} total vectors",
            basis.n_components(),
            self.n_components()
        );
        debug!("Retained eigenvalues: {}", basis.vals());
        Ok(basis)
    }
}
