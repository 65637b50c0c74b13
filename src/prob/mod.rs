use nalgebra::*;
use serde::{Serialize, Deserialize};
use std::fmt::{self, Display};
use crate::calc::layout::{gather_point, gather_block};
use crate::error::TubeError;

/// Multivariate normal utilities: symmetric positive-definite repair, square-root
/// factors for sampling and a pre-factored log-density kernel.
mod multinormal;

pub use multinormal::*;

/// Joint Gaussian over the flattened (npoints*ndim) vector of a whole trajectory,
/// where npoints is the number of control points (or of basis weights, while still
/// in estimation space). The flattening follows calc::layout: all npoints values of
/// dimension 0, then all values of dimension 1, and so on.
///
/// The covariance is symmetric, but is not guaranteed to be positive-definite: it
/// usually is rank-deficient (an ensemble of 3 trajectories gives a covariance of
/// rank at most 2 whatever its size).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointGaussian {

    pub mean : DVector<f64>,

    pub cov : DMatrix<f64>,

    npoints : usize,

    ndim : usize

}

impl JointGaussian {

    pub fn new(
        mean : DVector<f64>,
        cov : DMatrix<f64>,
        npoints : usize,
        ndim : usize
    ) -> Result<Self, TubeError> {
        if mean.nrows() != npoints * ndim {
            return Err(TubeError::DimensionMismatch { expected : npoints * ndim, found : mean.nrows() });
        }
        check_square(&cov, mean.nrows())?;
        Ok(Self { mean, cov, npoints, ndim })
    }

    pub fn npoints(&self) -> usize {
        self.npoints
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    /// Mean of the m-th point as an ndim vector.
    pub fn point_mean(&self, m : usize) -> DVector<f64> {
        gather_point(&self.mean, m, self.npoints, self.ndim)
    }

    /// Marginal (ndim x ndim) covariance of the m-th point.
    pub fn point_cov(&self, m : usize) -> DMatrix<f64> {
        gather_block(&self.cov, m, self.npoints, self.ndim)
    }

}

impl Display for JointGaussian {

    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JointGaussian({} x {})", self.npoints, self.ndim)
    }

}

/// Gaussian at a single control point of the tube: mean (ndim) and covariance (ndim x ndim).
/// Cells built by the tube always carry a symmetric positive-definite covariance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {

    pub mean : DVector<f64>,

    pub cov : DMatrix<f64>

}

impl Cell {

    pub fn new(mean : DVector<f64>, cov : DMatrix<f64>) -> Result<Self, TubeError> {
        check_square(&cov, mean.nrows())?;
        Ok(Self { mean, cov })
    }

    pub fn ndim(&self) -> usize {
        self.mean.nrows()
    }

    /// Log-density kernel of this cell, if its covariance admits a Cholesky factor.
    pub fn kernel(&self) -> Option<DensityKernel> {
        DensityKernel::new(self.mean.clone(), self.cov.clone())
    }

}

impl Display for Cell {

    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cell(mean = {:?})", self.mean.as_slice())
    }

}

fn check_square(cov : &DMatrix<f64>, n : usize) -> Result<(), TubeError> {
    if cov.nrows() != n {
        return Err(TubeError::DimensionMismatch { expected : n, found : cov.nrows() });
    }
    if cov.ncols() != n {
        return Err(TubeError::DimensionMismatch { expected : n, found : cov.ncols() });
    }
    Ok(())
}
