use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::AppResult;

/// Per-frame features produced by a preparer.
///
/// Frames are always the first axis. Preparers that emit a matrix per frame
/// (atom positions, contact maps) use `Framed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreparedFeatures {
    Flat(Array2<f64>),
    Framed(Array3<f64>),
}

impl PreparedFeatures {
    pub fn n_frames(&self) -> usize {
        match self {
            PreparedFeatures::Flat(a) => a.nrows(),
            PreparedFeatures::Framed(a) => a.len_of(Axis(0)),
        }
    }

    /// Flatten each frame into one row, row-major within the frame.
    pub fn into_rows(self) -> AppResult<Array2<f64>> {
        match self {
            PreparedFeatures::Flat(a) => Ok(a),
            PreparedFeatures::Framed(a) => {
                let (n0, n1, n2) = a.dim();
                Ok(a.to_shape((n0, n1 * n2))?.into_owned())
            }
        }
    }
}

impl From<Array2<f64>> for PreparedFeatures {
    fn from(value: Array2<f64>) -> Self {
        PreparedFeatures::Flat(value)
    }
}

impl From<Array3<f64>> for PreparedFeatures {
    fn from(value: Array3<f64>) -> Self {
        PreparedFeatures::Framed(value)
    }
}

/// Turns a trajectory into per-frame features, e.g. dihedral angles or contacts.
pub trait TrajectoryPreparer: Send + Sync {
    type Trajectory: ?Sized;

    fn prepare_trajectory(&self, trajectory: &Self::Trajectory) -> AppResult<PreparedFeatures>;
}

/// Passes through features that were computed ahead of time.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeaturePreparer;

impl TrajectoryPreparer for FeaturePreparer {
    type Trajectory = PreparedFeatures;

    fn prepare_trajectory(&self, trajectory: &PreparedFeatures) -> AppResult<PreparedFeatures> {
        Ok(trajectory.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framed_features_flatten_per_frame() {
        let framed = Array3::from_shape_fn((2, 2, 3), |(f, i, j)| (f * 100 + i * 10 + j) as f64);
        let rows = PreparedFeatures::from(framed).into_rows().unwrap();
        assert_eq!(
            rows,
            array![
                [0.0, 1.0, 2.0, 10.0, 11.0, 12.0],
                [100.0, 101.0, 102.0, 110.0, 111.0, 112.0]
            ]
        );
    }

    #[test]
    fn non_standard_layout_flattens_in_logical_order() {
        let mut framed = Array3::from_shape_fn((2, 3, 2), |(f, i, j)| (f * 100 + j * 10 + i) as f64);
        framed.swap_axes(1, 2); // now (2, 2, 3) with value f*100 + i*10 + j
        let rows = PreparedFeatures::Framed(framed).into_rows().unwrap();
        assert_eq!(rows.row(1), array![100.0, 101.0, 102.0, 110.0, 111.0, 112.0]);
    }

    #[test]
    fn frame_counts() {
        assert_eq!(PreparedFeatures::from(Array2::<f64>::zeros((4, 2))).n_frames(), 4);
        assert_eq!(PreparedFeatures::from(Array3::<f64>::zeros((5, 2, 3))).n_frames(), 5);
    }
}
