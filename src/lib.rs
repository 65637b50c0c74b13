//! Probabilistic tubes over ensembles of trajectories.
//!
//! A set of trajectories (ragged-length, possibly noisy or irregularly sampled series
//! of 2D or 3D observations) is reduced to a joint gaussian over a fixed number of
//! control points along the normalized trajectory parameter. Its marginals give an
//! ordered sequence of gaussian cells (the tube), over which containment and
//! log-density queries are answered.
//!
//! ```ignore
//! use trajtube::*;
//!
//! let ens = Ensemble::new(trajectories)?;
//! let tube = Tube::construct(&ens, Settings::expectation_maximization(100, BasisKind::Bernstein, 5))?;
//! let grid = Grid::mgrid(&[(-60.0, 60.0, 20), (-10.0, 240.0, 20)]);
//! let inside = tube.is_inside_grid(1.0, &grid)?;
//! let logp = tube.evaluate_log_density(&grid)?;
//! ```

/// Error type shared by every fallible operation of the crate.
pub mod error;

/// Trajectory and trajectory ensemble data structures.
pub mod sample;

/// Scalar and vector helpers: interpolation, population moments, the flattening
/// convention of joint gaussians and ensemble normalization.
pub mod calc;

/// Basis functions over the normalized trajectory parameter and the block design
/// matrices built from them.
pub mod basis;

/// Joint and per-cell gaussians, symmetric positive-definite repair and log-densities.
pub mod prob;

/// Estimators from a normalized ensemble to a joint gaussian over the control points:
/// resampling, maximum likelihood and expectation-maximization.
pub mod fit;

/// Convex hull membership.
pub mod region;

/// Executors for per-point query work.
pub mod exec;

/// The tube itself, its construction settings and its geometric and statistical queries.
pub mod tube;

pub use error::TubeError;

pub use sample::{Trajectory, Ensemble};

pub use basis::BasisKind;

pub use prob::{Cell, JointGaussian};

pub use fit::{ModelType, EmReport, EmOutcome};

pub use exec::{Executor, WorkerPool, Sequential};

pub use tube::{Tube, Settings, Grid, GridValues, EllipsoidCloud};
