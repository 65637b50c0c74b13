use nalgebra::*;
use tracing::debug;
use super::{Estimator, Estimate, check_ngaus, check_nbasis, predict};
use crate::basis::{BasisKind, Design};
use crate::calc::{flatten, population_mean, population_cov};
use crate::error::TubeError;
use crate::sample::{Ensemble, Trajectory};

/// Singular values below this threshold are discarded by the pseudo-inverse.
const PINV_EPS : f64 = 1e-12;

/// Least-squares weights of a single trajectory over the design: w = pinv(H) y, where
/// y is the observation matrix flattened per dimension. The pseudo-inverse gives the
/// minimum-norm solution when H is rank-deficient (trajectories with fewer samples
/// than basis functions).
pub fn least_squares_weights(design : &Design, traj : &Trajectory) -> Result<DVector<f64>, TubeError> {
    let h = design.matrix(traj.x().as_slice());
    let y = flatten(traj.y());
    let h_pinv = h.pseudo_inverse(PINV_EPS)
        .map_err(|e| TubeError::Numerical(format!("pseudo-inverse of design matrix: {}", e)) )?;
    Ok(h_pinv * y)
}

/// Maximum likelihood regression. The weights are estimated by least squares for each
/// trajectory independently, and the weight population moments (mu_w, sigma_w) are
/// propagated to the control points: mu = Hp mu_w; sigma = Hp sigma_w Hp^T. No observation
/// noise is added to the propagated covariance.
#[derive(Debug, Clone, Copy)]
pub struct MaximumLikelihood {

    basis : BasisKind,

    nbasis : usize

}

impl MaximumLikelihood {

    pub fn new(basis : BasisKind, nbasis : usize) -> Self {
        Self { basis, nbasis }
    }

    /// Population moments of the least-squares weights of every trajectory.
    pub fn weight_moments(&self, design : &Design, ens : &Ensemble) -> Result<(DVector<f64>, DMatrix<f64>), TubeError> {
        let ws = ens.iter()
            .map(|t| least_squares_weights(design, t) )
            .collect::<Result<Vec<_>, _>>()?;
        let mu_w = population_mean(&ws[..]);
        let sigma_w = population_cov(&ws[..], &mu_w);
        Ok((mu_w, sigma_w))
    }

}

impl Estimator for MaximumLikelihood {

    fn estimate(&self, ens : &Ensemble, ngaus : usize) -> Result<Estimate, TubeError> {
        check_ngaus(ngaus)?;
        check_nbasis(self.nbasis)?;
        let design = Design::new(self.basis, self.nbasis, ens.ndim());
        let (mu_w, sigma_w) = self.weight_moments(&design, ens)?;
        debug!(ntraj = ens.len(), nweights = design.nweights(), "least-squares weights estimated");
        Ok(Estimate { joint : predict(&design, &mu_w, &sigma_w, ngaus)?, em_report : None })
    }

}
