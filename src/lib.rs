//! Reduced-dimensionality distance metric for trajectory frames.
//!
//! A precomputed eigen-decomposition is loaded, stripped of complex and
//! out-of-range components, truncated, and used to project prepared frame
//! features before a vectorized norm compares them.

pub mod config;
pub mod decomposition;
mod error;
pub mod io_utils;
pub mod metric;
pub mod prepare;
pub mod projection;

pub use config::MetricSettings;
pub use decomposition::pca::covariance_decomposition;
pub use decomposition::{Decomposition, FilterOptions, RawDecomposition, Reduction};
pub use error::{AppError, AppResult};
pub use metric::{DistanceMetric, Norm, ProjectionSource, RedDimPNorm, Vectorized};
pub use prepare::{FeaturePreparer, PreparedFeatures, TrajectoryPreparer};
pub use projection::ReducedBasis;
