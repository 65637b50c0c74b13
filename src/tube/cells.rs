use nalgebra::*;
use crate::calc::layout::flat_index;
use crate::error::TubeError;
use crate::prob::{Cell, JointGaussian, nearest_spd};

/// Extracts the marginal gaussian of the m-th control point from the joint.
pub fn cell(joint : &JointGaussian, m : usize) -> Result<Cell, TubeError> {
    if m >= joint.npoints() {
        return Err(TubeError::CellIndex { index : m, ngaus : joint.npoints() });
    }
    Cell::new(joint.point_mean(m), joint.point_cov(m))
}

/// Splits the joint gaussian into its ngaus per-control-point cells, replacing every cell
/// covariance by the nearest symmetric positive-definite matrix. Covariances at control
/// points where all trajectories agree (or where the joint is rank-deficient) would
/// otherwise be singular.
pub fn decompose(joint : &JointGaussian) -> Result<Vec<Cell>, TubeError> {
    (0..joint.npoints()).map(|m| {
        let mut c = cell(joint, m)?;
        c.cov = nearest_spd(&c.cov);
        Ok(c)
    }).collect()
}

/// Assembles cells back into the flattened (ngaus*ndim) mean and block covariance.
/// Covariances between different control points are zero.
pub fn compose(cells : &[Cell]) -> Result<(DVector<f64>, DMatrix<f64>), TubeError> {
    let ngaus = cells.len();
    let ndim = cells.first().map(|c| c.ndim() ).unwrap_or(0);
    let mut mu = DVector::zeros(ngaus * ndim);
    let mut sigma = DMatrix::zeros(ngaus * ndim, ngaus * ndim);
    for (m, c) in cells.iter().enumerate() {
        if c.ndim() != ndim {
            return Err(TubeError::DimensionMismatch { expected : ndim, found : c.ndim() });
        }
        for d1 in 0..ndim {
            mu[flat_index(m, d1, ngaus)] = c.mean[d1];
            for d2 in 0..ndim {
                sigma[(flat_index(m, d1, ngaus), flat_index(m, d2, ngaus))] = c.cov[(d1, d2)];
            }
        }
    }
    Ok((mu, sigma))
}
