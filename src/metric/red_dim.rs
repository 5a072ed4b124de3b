use std::path::PathBuf;

use ndarray::prelude::*;
use tracing::{info, warn};

use crate::decomposition::{Decomposition, FilterOptions, Reduction};
use crate::metric::{DistanceMetric, Vectorized};
use crate::prepare::TrajectoryPreparer;
use crate::projection::ReducedBasis;
use crate::AppResult;

/// Where the projection comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionSource {
    /// A full decomposition that still needs filtering and reduction.
    Decomposition(PathBuf),
    /// A basis saved after reduction, used exactly as stored.
    Reduced(PathBuf),
}

/// Distance between frames after projecting their features onto a reduced eigenbasis.
///
/// Features come from the wrapped preparer (dihedrals, contacts, ...), are
/// flattened to one row per frame, multiplied into the retained eigenvectors
/// and then compared with a [`Vectorized`] norm.
#[derive(Debug, Clone)]
pub struct RedDimPNorm<P> {
    basis: ReducedBasis,
    prep_with: P,
    vectorized: Vectorized,
}

impl<P: TrajectoryPreparer> RedDimPNorm<P> {
    #[tracing::instrument(
        name = "Building reduced-dimension metric",
        level = "info",
        skip(prep_with, filter, vectorized)
    )]
    pub fn new(
        source: &ProjectionSource,
        prep_with: P,
        reduction: &Reduction,
        filter: &FilterOptions,
        vectorized: Vectorized,
    ) -> AppResult<Self> {
        let basis = match source {
            ProjectionSource::Decomposition(path) => {
                Decomposition::load(path, filter)?.reduce(reduction)?
            }
            ProjectionSource::Reduced(path) => {
                if *reduction != Reduction::All {
                    warn!(
                        "Ignoring reduction by {} for an already reduced basis",
                        reduction
                    );
                }
                let basis = ReducedBasis::load(path)?;
                info!(
                    "Using {} of {} total vectors",
                    basis.n_components(),
                    basis.n_total()
                );
                basis
            }
        };
        Ok(Self::from_basis(basis, prep_with, vectorized))
    }

    pub fn from_basis(basis: ReducedBasis, prep_with: P, vectorized: Vectorized) -> Self {
        Self {
            basis,
            prep_with,
            vectorized,
        }
    }

    pub fn basis(&self) -> &ReducedBasis {
        &self.basis
    }

    pub fn vectorized(&self) -> &Vectorized {
        &self.vectorized
    }
}

impl<P: TrajectoryPreparer> DistanceMetric for RedDimPNorm<P> {
    type Trajectory = P::Trajectory;

    fn prepare_trajectory(&self, trajectory: &P::Trajectory) -> AppResult<Array2<f64>> {
        let rows = self.prep_with.prepare_trajectory(trajectory)?.into_rows()?;
        self.basis.execute(rows.view())
    }

    fn frame_distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        self.vectorized.distance(a, b)
    }
}
