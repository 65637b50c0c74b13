use thiserror::Error;

/// Errors that abort a tube construction or a query at the call site. Numerical trouble
/// inside the EM iteration never shows up here: it is absorbed by the estimator and
/// reported through fit::EmReport instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TubeError {

    #[error("Invalid settings: {0}")]
    Configuration(String),

    #[error("Invalid trajectory data: {0}")]
    InvalidTrajectory(String),

    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected : usize, found : usize },

    #[error("Grid axes disagree in shape: {0}")]
    GridShape(String),

    #[error("Cell index {index} not in [0, {ngaus})")]
    CellIndex { index : usize, ngaus : usize },

    #[error("Ellipsoids are only defined for 2 or 3 dimensions (got {0})")]
    UnsupportedDimension(usize),

    #[error("Numerical failure: {0}")]
    Numerical(String)

}

impl TubeError {

    pub(crate) fn config(msg : impl Into<String>) -> Self {
        TubeError::Configuration(msg.into())
    }

}
