use nalgebra::*;
use serde::{Serialize, Deserialize};
use std::fmt::Debug;
use crate::basis::{BasisKind, Design};
use crate::calc::linspace;
use crate::error::TubeError;
use crate::prob::JointGaussian;
use crate::sample::Ensemble;

/// Moment matching over trajectories resampled at the control points.
pub mod resampling;

/// Maximum likelihood basis regression (per-trajectory least squares).
pub mod linear;

/// Empirical-Bayes basis regression, where the weights of every trajectory are
/// latent variables under a shared gaussian prior.
pub mod em;

pub use resampling::*;

pub use linear::*;

pub use em::*;

/// Default iteration budget of the expectation-maximization estimator.
pub const DEFAULT_MAX_ITERATIONS : usize = 2001;

/// Trait shared by the strategies that reduce an ensemble of trajectories to a joint
/// gaussian over ngaus control points. Estimators receive an ensemble that has already
/// been normalized (parameter over [0, 1], observations over the unit box) and return
/// statistics in the same normalized units.
pub trait Estimator
    where Self : Debug + Send + Sync
{

    fn estimate(&self, ens : &Ensemble, ngaus : usize) -> Result<Estimate, TubeError>;

}

/// Output of an estimator: the joint gaussian over the ngaus*ndim flattened control
/// points, plus the convergence record when the estimator is iterative.
#[derive(Debug, Clone)]
pub struct Estimate {

    pub joint : JointGaussian,

    pub em_report : Option<EmReport>

}

/// Which estimation strategy a tube is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "model_type")]
pub enum ModelType {

    /// Trajectories are linearly interpolated at the control points; the joint is
    /// given by the moments of the interpolated vectors.
    Resampling,

    /// Least-squares weights per trajectory; the joint is propagated from the moments of
    /// the weights.
    MaximumLikelihood { basis : BasisKind, nbasis : usize },

    /// Weights are latent; the prior over them and the observation precision are
    /// estimated jointly by expectation-maximization.
    ExpectationMaximization { basis : BasisKind, nbasis : usize, max_iterations : usize }

}

impl ModelType {

    pub fn estimator(&self) -> Box<dyn Estimator> {
        match *self {
            ModelType::Resampling => Box::new(Resampling),
            ModelType::MaximumLikelihood { basis, nbasis } => {
                Box::new(MaximumLikelihood::new(basis, nbasis))
            },
            ModelType::ExpectationMaximization { basis, nbasis, max_iterations } => {
                Box::new(ExpectationMaximization::new(basis, nbasis).max_iterations(max_iterations))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelType::Resampling => "resampling",
            ModelType::MaximumLikelihood { .. } => "ML",
            ModelType::ExpectationMaximization { .. } => "EM"
        }
    }

}

pub(crate) fn check_ngaus(ngaus : usize) -> Result<(), TubeError> {
    if ngaus < 2 {
        return Err(TubeError::config(format!("ngaus should be at least 2 (got {})", ngaus)));
    }
    Ok(())
}

pub(crate) fn check_nbasis(nbasis : usize) -> Result<(), TubeError> {
    if nbasis < 2 {
        return Err(TubeError::config(format!("nbasis should be at least 2 (got {})", nbasis)));
    }
    Ok(())
}

/// Propagates a gaussian over basis weights to the ngaus evenly spaced control points
/// of [0, 1]: mu = Hp mu_w; sigma = Hp sigma_w Hp^T.
pub(crate) fn predict(
    design : &Design,
    mu_w : &DVector<f64>,
    sigma_w : &DMatrix<f64>,
    ngaus : usize
) -> Result<JointGaussian, TubeError> {
    let hp = design.matrix(&linspace(0.0, 1.0, ngaus)[..]);
    let mu = &hp * mu_w;
    let sigma = &hp * sigma_w * hp.transpose();
    JointGaussian::new(mu, crate::prob::build_symmetric(&sigma), ngaus, design.ndim())
}
