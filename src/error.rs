use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for loading, reducing and applying projections.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Errored while handling a file. {0}")]
    Io(#[from] std::io::Error),
    #[error("Error serializing json. {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Error decoding binary data. {0}")]
    BincodeDecode(#[from] bincode::error::DecodeError),
    #[error("Error encoding binary data. {0}")]
    BincodeEncode(#[from] bincode::error::EncodeError),
    #[error("Array has an incompatible shape. {0}")]
    ArrayShape(#[from] ndarray::ShapeError),
    #[error("Error formatting output. {0}")]
    Fmt(#[from] std::fmt::Error),
    #[error("{0}")]
    Dir(#[from] reddim_dirs::DirError),
    #[error("Shape mismatch. {0}")]
    Shape(String),
    #[error("No projection vectors left after {0}")]
    EmptyBasis(String),
    #[error("Invalid reduction. {0}")]
    InvalidReduction(String),
    #[error("Invalid metric. {0}")]
    InvalidMetric(String),
    #[error("Unsupported file format for {0:?}. Expected .json, .bin or .zst")]
    UnknownFormat(PathBuf),
    #[error("Frame index {index} is out of bounds for a trajectory with {len} frames")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("Error reading settings. {0}")]
    Config(String),
    #[error("Eigen-decomposition failed. {0}")]
    Decomposition(String),
    #[cfg(feature = "lapack")]
    #[error("Error from LAPACK. {0}")]
    Linalg(#[from] ndarray_linalg::error::LinalgError),
}

/// Convenience alias for results that bubble `AppError`.
pub type AppResult<T> = Result<T, AppError>;
