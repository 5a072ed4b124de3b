use ndarray::prelude::*;
use rayon::prelude::*;

use crate::{AppError, AppResult};

/// A distance between trajectory frames.
///
/// Implementors turn a trajectory into one row per frame and define the
/// distance between two rows; the batch queries are built on top of that.
pub trait DistanceMetric: Send + Sync {
    type Trajectory: ?Sized;

    /// One row per frame, in the space the metric measures in.
    fn prepare_trajectory(&self, trajectory: &Self::Trajectory) -> AppResult<Array2<f64>>;

    fn frame_distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64;

    /// Distance between frame `index1` of `ptraj1` and frame `index2` of `ptraj2`.
    fn one_to_one(
        &self,
        ptraj1: ArrayView2<f64>,
        ptraj2: ArrayView2<f64>,
        index1: usize,
        index2: usize,
    ) -> AppResult<f64> {
        check_widths(ptraj1, ptraj2)?;
        let a = frame(ptraj1, index1)?;
        let b = frame(ptraj2, index2)?;
        Ok(self.frame_distance(a, b))
    }

    /// Distances from frame `index1` of `ptraj1` to the listed frames of `ptraj2`.
    fn one_to_many(
        &self,
        ptraj1: ArrayView2<f64>,
        ptraj2: ArrayView2<f64>,
        index1: usize,
        indices2: &[usize],
    ) -> AppResult<Array1<f64>> {
        check_widths(ptraj1, ptraj2)?;
        let a = frame(ptraj1, index1)?;
        indices2
            .iter()
            .map(|&j| frame(ptraj2, j).map(|b| self.frame_distance(a, b)))
            .collect::<AppResult<Vec<f64>>>()
            .map(Array1::from_vec)
    }

    /// Distances from frame `index1` of `ptraj1` to every frame of `ptraj2`.
    fn one_to_all(
        &self,
        ptraj1: ArrayView2<f64>,
        ptraj2: ArrayView2<f64>,
        index1: usize,
    ) -> AppResult<Array1<f64>> {
        check_widths(ptraj1, ptraj2)?;
        let a = frame(ptraj1, index1)?;
        let dists: Vec<f64> = (0..ptraj2.nrows())
            .into_par_iter()
            .map(|j| self.frame_distance(a, ptraj2.row(j)))
            .collect();
        Ok(Array1::from_vec(dists))
    }

    /// Full (n1, n2) distance matrix between two trajectories.
    fn all_to_all(&self, ptraj1: ArrayView2<f64>, ptraj2: ArrayView2<f64>) -> AppResult<Array2<f64>> {
        check_widths(ptraj1, ptraj2)?;
        let (n1, n2) = (ptraj1.nrows(), ptraj2.nrows());
        let dists: Vec<f64> = (0..n1)
            .into_par_iter()
            .flat_map_iter(|i| (0..n2).map(move |j| self.frame_distance(ptraj1.row(i), ptraj2.row(j))))
            .collect();
        Ok(Array2::from_shape_vec((n1, n2), dists)?)
    }

    /// Condensed upper triangle of the self-distance matrix: (0,1), (0,2), ..., (1,2), ...
    fn all_pairwise(&self, ptraj: ArrayView2<f64>) -> AppResult<Array1<f64>> {
        let n = ptraj.nrows();
        let dists: Vec<f64> = (0..n)
            .into_par_iter()
            .flat_map_iter(|i| {
                (i + 1..n).map(move |j| self.frame_distance(ptraj.row(i), ptraj.row(j)))
            })
            .collect();
        Ok(Array1::from_vec(dists))
    }
}

fn frame(ptraj: ArrayView2<'_, f64>, index: usize) -> AppResult<ArrayView1<'_, f64>> {
    if index >= ptraj.nrows() {
        return Err(AppError::IndexOutOfBounds {
            index,
            len: ptraj.nrows(),
        });
    }
    Ok(ptraj.index_axis_move(Axis(0), index))
}

fn check_widths(ptraj1: ArrayView2<f64>, ptraj2: ArrayView2<f64>) -> AppResult<()> {
    if ptraj1.ncols() != ptraj2.ncols() {
        return Err(AppError::Shape(format!(
            "prepared trajectories have {} and {} columns",
            ptraj1.ncols(),
            ptraj2.ncols()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{Norm, Vectorized};

    fn line() -> Array2<f64> {
        array![[0.0], [1.0], [3.0], [6.0]]
    }

    #[test]
    fn one_to_all_and_one_to_many_agree() {
        let metric = Vectorized::default();
        let traj = line();
        let all = metric.one_to_all(traj.view(), traj.view(), 1).unwrap();
        assert_eq!(all, array![1.0, 0.0, 2.0, 5.0]);
        let some = metric
            .one_to_many(traj.view(), traj.view(), 1, &[3, 0])
            .unwrap();
        assert_eq!(some, array![5.0, 1.0]);
        assert_eq!(
            metric.one_to_one(traj.view(), traj.view(), 0, 3).unwrap(),
            6.0
        );
    }

    #[test]
    fn all_pairwise_is_condensed_row_major() {
        let metric = Vectorized::new(Norm::Cityblock, 1.0).unwrap();
        let traj = line();
        let condensed = metric.all_pairwise(traj.view()).unwrap();
        assert_eq!(condensed, array![1.0, 3.0, 6.0, 2.0, 5.0, 3.0]);

        let square = metric.all_to_all(traj.view(), traj.view()).unwrap();
        assert_eq!(square.dim(), (4, 4));
        assert_eq!(square[(1, 3)], 5.0);
        assert_eq!(square[(3, 1)], 5.0);
        assert_eq!(square.diag(), array![0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn single_frame_has_no_pairs() {
        let metric = Vectorized::default();
        let traj = array![[1.0, 2.0]];
        assert_eq!(metric.all_pairwise(traj.view()).unwrap().len(), 0);
    }

    #[test]
    fn out_of_range_frames_are_errors() {
        let metric = Vectorized::default();
        let traj = line();
        assert!(matches!(
            metric.one_to_all(traj.view(), traj.view(), 4),
            Err(AppError::IndexOutOfBounds { index: 4, len: 4 })
        ));
        assert!(matches!(
            metric.one_to_many(traj.view(), traj.view(), 0, &[1, 9]),
            Err(AppError::IndexOutOfBounds { index: 9, len: 4 })
        ));
    }

    #[test]
    fn mismatched_widths_are_errors() {
        let metric = Vectorized::default();
        let a = array![[0.0, 1.0]];
        let b = array![[0.0]];
        assert!(matches!(
            metric.one_to_one(a.view(), b.view(), 0, 0),
            Err(AppError::Shape(_))
        ));
    }
}
