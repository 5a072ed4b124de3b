mod red_dim;
pub mod traits;

use std::fmt::Display;

use clap::ValueEnum;
use ndarray::prelude::*;
use ndarray::Zip;
use serde::{Deserialize, Serialize};

use crate::prepare::PreparedFeatures;
use crate::{AppError, AppResult};

pub use red_dim::{ProjectionSource, RedDimPNorm};
pub use traits::DistanceMetric;

/// Row-wise distances supported by [`Vectorized`].
#[derive(ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    /// L2 norm of the difference
    #[default]
    Euclidean,
    /// Squared L2 norm of the difference
    #[value(name = "sqeuclidean")]
    SqEuclidean,
    /// L1 norm of the difference
    Cityblock,
    /// L-infinity norm of the difference
    Chebyshev,
    /// Lp norm of the difference, using `p`
    Minkowski,
    /// One minus the cosine of the angle between frames
    Cosine,
    /// Sum of |a - b| / (|a| + |b|)
    Canberra,
    /// Sum of |a - b| over sum of |a + b|
    #[value(name = "braycurtis")]
    BrayCurtis,
}

impl Display for Norm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Norm::Euclidean => "euclidean",
            Norm::SqEuclidean => "sqeuclidean",
            Norm::Cityblock => "cityblock",
            Norm::Chebyshev => "chebyshev",
            Norm::Minkowski => "minkowski",
            Norm::Cosine => "cosine",
            Norm::Canberra => "canberra",
            Norm::BrayCurtis => "braycurtis",
        };
        write!(f, "{}", s)
    }
}

/// Distance between frames that are already vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vectorized {
    norm: Norm,
    p: f64,
}

impl Default for Vectorized {
    fn default() -> Self {
        Self {
            norm: Norm::Euclidean,
            p: 2.0,
        }
    }
}

impl Vectorized {
    /// `p` is only read by [`Norm::Minkowski`], where it must be at least 1.
    pub fn new(norm: Norm, p: f64) -> AppResult<Self> {
        if norm == Norm::Minkowski && (p.is_nan() || p < 1.0) {
            return Err(AppError::InvalidMetric(format!(
                "minkowski needs p >= 1, got {}",
                p
            )));
        }
        Ok(Self { norm, p })
    }

    pub fn norm(&self) -> Norm {
        self.norm
    }

    pub fn p(&self) -> f64 {
        self.p
    }

    pub fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self.norm {
            Norm::Euclidean => sq_euclidean(a, b).sqrt(),
            Norm::SqEuclidean => sq_euclidean(a, b),
            Norm::Cityblock => fold_pairs(a, b, |acc, x, y| acc + (x - y).abs()),
            Norm::Chebyshev => fold_pairs(a, b, |acc, x, y| acc.max((x - y).abs())),
            Norm::Minkowski => minkowski(a, b, self.p),
            Norm::Cosine => cosine(a, b),
            Norm::Canberra => fold_pairs(a, b, |acc, x, y| {
                let denom = x.abs() + y.abs();
                if denom > 0.0 {
                    acc + (x - y).abs() / denom
                } else {
                    acc
                }
            }),
            Norm::BrayCurtis => {
                let num = fold_pairs(a, b, |acc, x, y| acc + (x - y).abs());
                let denom = fold_pairs(a, b, |acc, x, y| acc + (x + y).abs());
                if denom > 0.0 { num / denom } else { 0.0 }
            }
        }
    }
}

impl DistanceMetric for Vectorized {
    type Trajectory = PreparedFeatures;

    fn prepare_trajectory(&self, trajectory: &PreparedFeatures) -> AppResult<Array2<f64>> {
        trajectory.clone().into_rows()
    }

    fn frame_distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        self.distance(a, b)
    }
}

fn fold_pairs<F>(a: ArrayView1<f64>, b: ArrayView1<f64>, f: F) -> f64
where
    F: Fn(f64, f64, f64) -> f64,
{
    Zip::from(&a).and(&b).fold(0.0, |acc, &x, &y| f(acc, x, y))
}

fn sq_euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    fold_pairs(a, b, |acc, x, y| {
        let d = x - y;
        acc + d * d
    })
}

fn minkowski(a: ArrayView1<f64>, b: ArrayView1<f64>, p: f64) -> f64 {
    if p == 1.0 {
        fold_pairs(a, b, |acc, x, y| acc + (x - y).abs())
    } else if p == 2.0 {
        sq_euclidean(a, b).sqrt()
    } else if p.is_infinite() {
        fold_pairs(a, b, |acc, x, y| acc.max((x - y).abs()))
    } else {
        fold_pairs(a, b, |acc, x, y| acc + (x - y).abs().powf(p)).powf(1.0 / p)
    }
}

fn cosine(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    match (norm_a > 0.0, norm_b > 0.0) {
        (true, true) => 1.0 - a.dot(&b) / (norm_a * norm_b),
        // two zero vectors are the same frame
        (false, false) => 0.0,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist(norm: Norm, p: f64, a: &Array1<f64>, b: &Array1<f64>) -> f64 {
        Vectorized::new(norm, p).unwrap().distance(a.view(), b.view())
    }

    #[test]
    fn norms_match_hand_computed_values() {
        let a = array![0.0, 3.0, -1.0];
        let b = array![4.0, 0.0, -1.0];
        assert!((dist(Norm::Euclidean, 2.0, &a, &b) - 5.0).abs() < 1e-12);
        assert!((dist(Norm::SqEuclidean, 2.0, &a, &b) - 25.0).abs() < 1e-12);
        assert!((dist(Norm::Cityblock, 2.0, &a, &b) - 7.0).abs() < 1e-12);
        assert!((dist(Norm::Chebyshev, 2.0, &a, &b) - 4.0).abs() < 1e-12);
        let expected = (64.0_f64 + 27.0).powf(1.0 / 3.0);
        assert!((dist(Norm::Minkowski, 3.0, &a, &b) - expected).abs() < 1e-12);
        // canberra: 4/4 + 3/3 + 0/2
        assert!((dist(Norm::Canberra, 2.0, &a, &b) - 2.0).abs() < 1e-12);
        // braycurtis: 7 / (4 + 3 + 2)
        assert!((dist(Norm::BrayCurtis, 2.0, &a, &b) - 7.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn minkowski_special_cases_agree_with_named_norms() {
        let a = array![1.0, -2.0, 0.5];
        let b = array![-1.0, 2.0, 3.0];
        assert_eq!(
            dist(Norm::Minkowski, 1.0, &a, &b),
            dist(Norm::Cityblock, 1.0, &a, &b)
        );
        assert_eq!(
            dist(Norm::Minkowski, 2.0, &a, &b),
            dist(Norm::Euclidean, 2.0, &a, &b)
        );
        assert_eq!(
            dist(Norm::Minkowski, f64::INFINITY, &a, &b),
            dist(Norm::Chebyshev, 1.0, &a, &b)
        );
    }

    #[test]
    fn euclidean_ignores_p() {
        let a = array![0.0, 3.0];
        let b = array![4.0, 0.0];
        assert_eq!(dist(Norm::Euclidean, 7.0, &a, &b), 5.0);
    }

    #[test]
    fn cosine_handles_zero_vectors() {
        let zero = array![0.0, 0.0];
        let x = array![1.0, 0.0];
        let y = array![0.0, 2.0];
        assert_eq!(dist(Norm::Cosine, 2.0, &zero, &zero), 0.0);
        assert_eq!(dist(Norm::Cosine, 2.0, &zero, &x), 1.0);
        assert!((dist(Norm::Cosine, 2.0, &x, &y) - 1.0).abs() < 1e-12);
        assert!(dist(Norm::Cosine, 2.0, &x, &x).abs() < 1e-12);
    }

    #[test]
    fn minkowski_rejects_small_p() {
        assert!(matches!(
            Vectorized::new(Norm::Minkowski, 0.5),
            Err(AppError::InvalidMetric(_))
        ));
        assert!(Vectorized::new(Norm::Minkowski, f64::NAN).is_err());
        assert!(Vectorized::new(Norm::Euclidean, 0.5).is_ok());
    }

    #[test]
    fn names_round_trip_through_serde() {
        let parsed: Norm = serde_json::from_str("\"braycurtis\"").unwrap();
        assert_eq!(parsed, Norm::BrayCurtis);
        assert_eq!(serde_json::to_string(&Norm::SqEuclidean).unwrap(), "\"sqeuclidean\"");
        assert_eq!(Norm::SqEuclidean.to_string(), "sqeuclidean");
    }
}
