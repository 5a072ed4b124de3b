use std::fmt::Display;

use ndarray::ArrayView1;
use tracing::warn;

use crate::{AppError, AppResult};

/// How much of a sorted eigenbasis to retain.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Reduction {
    /// Keep every component.
    #[default]
    All,
    /// Keep the leading `n` components.
    NumVecs(usize),
    /// Keep the shortest prefix explaining at least this fraction of the total variance.
    ExplainedVariance(f64),
    /// Keep components whose eigenvalue is at least this value.
    AbsMin(f64),
}

impl Display for Reduction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reduction::All => write!(f, "no reduction"),
            Reduction::NumVecs(n) => write!(f, "the leading {} vectors", n),
            Reduction::ExplainedVariance(frac) => {
                write!(f, "{:.1}% explained variance", frac * 100.0)
            }
            Reduction::AbsMin(min) => write!(f, "eigenvalues >= {}", min),
        }
    }
}

impl Reduction {
    /// Pick one criterion. A count beats a variance fraction, which beats an eigenvalue floor.
    pub fn from_criteria(
        num_vecs: Option<usize>,
        expl_var: Option<f64>,
        abs_min: Option<f64>,
    ) -> Self {
        let given = [num_vecs.is_some(), expl_var.is_some(), abs_min.is_some()]
            .iter()
            .filter(|g| **g)
            .count();
        let reduction = if let Some(n) = num_vecs {
            Reduction::NumVecs(n)
        } else if let Some(frac) = expl_var {
            Reduction::ExplainedVariance(frac)
        } else if let Some(min) = abs_min {
            Reduction::AbsMin(min)
        } else {
            Reduction::All
        };
        if given > 1 {
            warn!(
                "Multiple reduction criteria were given, reducing by {}",
                reduction
            );
        }
        reduction
    }

    pub fn validate(&self) -> AppResult<()> {
        match *self {
            Reduction::All => Ok(()),
            Reduction::NumVecs(0) => Err(AppError::InvalidReduction(
                "the number of vectors must be positive".to_string(),
            )),
            Reduction::NumVecs(_) => Ok(()),
            Reduction::ExplainedVariance(frac) if frac > 0.0 && frac <= 1.0 => Ok(()),
            Reduction::ExplainedVariance(frac) => Err(AppError::InvalidReduction(format!(
                "explained variance must be in (0, 1], got {}",
                frac
            ))),
            Reduction::AbsMin(min) if min.is_finite() => Ok(()),
            Reduction::AbsMin(min) => Err(AppError::InvalidReduction(format!(
                "minimum eigenvalue must be finite, got {}",
                min
            ))),
        }
    }

    /// Length of the prefix of `vals` to keep. `vals` must be sorted in decreasing order.
    pub fn retained(&self, vals: ArrayView1<f64>) -> AppResult<usize> {
        self.validate()?;
        let n = vals.len();
        match *self {
            Reduction::All => Ok(n),
            Reduction::NumVecs(k) => {
                if k > n {
                    warn!(
                        "Asked for {} vectors but only {} are available, keeping all of them",
                        k, n
                    );
                }
                Ok(k.min(n))
            }
            Reduction::ExplainedVariance(frac) => {
                let total = vals.sum();
                if total <= 0.0 {
                    return Err(AppError::InvalidReduction(format!(
                        "total variance is {}, cannot take a fraction of it",
                        total
                    )));
                }
                // keep everything before the component that pushes the
                // running sum past the threshold
                let threshold = frac * total;
                let mut cumulative = 0.0;
                for (i, val) in vals.iter().enumerate() {
                    cumulative += val;
                    if cumulative > threshold {
                        return Ok(i);
                    }
                }
                Ok(n)
            }
            Reduction::AbsMin(min) => Ok(vals.iter().take_while(|v| **v >= min).count()),
        }
    }
}
