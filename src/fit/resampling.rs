use nalgebra::*;
use tracing::debug;
use super::{Estimator, Estimate, check_ngaus};
use crate::calc::{linspace, interp, population_mean, population_cov, flat_index};
use crate::error::TubeError;
use crate::prob::JointGaussian;
use crate::sample::{Ensemble, Trajectory};

/// Moment-matching estimator. Every trajectory is interpolated at ngaus evenly spaced
/// positions of the normalized parameter; the joint gaussian is the population mean and
/// covariance (normalized by the number of trajectories) of the interpolated vectors.
/// Outside the parameter range of a trajectory the interpolation is clamped to its end
/// observations.
#[derive(Debug, Clone, Copy, Default)]
pub struct Resampling;

/// Interpolates a (normalized) trajectory at the informed positions, returning the
/// flattened (positions*ndim) vector.
pub fn resample(traj : &Trajectory, at : &[f64]) -> DVector<f64> {
    let npoints = at.len();
    let ndim = traj.ndim();
    let xs = traj.x().as_slice();
    let mut v = DVector::zeros(npoints * ndim);
    for (d, col) in traj.y().column_iter().enumerate() {
        let ys : Vec<f64> = col.iter().cloned().collect();
        for (m, x) in at.iter().enumerate() {
            v[flat_index(m, d, npoints)] = interp(*x, xs, &ys[..]);
        }
    }
    v
}

impl Estimator for Resampling {

    fn estimate(&self, ens : &Ensemble, ngaus : usize) -> Result<Estimate, TubeError> {
        check_ngaus(ngaus)?;
        let at = linspace(0.0, 1.0, ngaus);
        let vs : Vec<_> = ens.iter().map(|t| resample(t, &at[..]) ).collect();
        let mu = population_mean(&vs[..]);
        let sigma = population_cov(&vs[..], &mu);
        debug!(ntraj = vs.len(), ngaus, "resampled ensemble");
        Ok(Estimate { joint : JointGaussian::new(mu, sigma, ngaus, ens.ndim())?, em_report : None })
    }

}
