use nalgebra::*;
use rayon::prelude::*;
use serde::{Serialize, Deserialize};
use std::f64::consts::PI;
use tracing::{debug, info, warn};
use super::{Estimator, Estimate, DEFAULT_MAX_ITERATIONS, check_ngaus, check_nbasis, predict};
use crate::basis::{BasisKind, Design};
use crate::calc::flatten;
use crate::error::TubeError;
use crate::sample::Ensemble;

/// Largest ratio between the extreme eigenvalues of the weight covariance for which the
/// prior term of the log-likelihood is evaluated.
pub const MAX_CONDITION : f64 = 1e12;

/// Value taken by the prior term of the log-likelihood when the weight covariance is
/// ill-conditioned.
pub const SENTINEL_PENALTY : f64 = 1e4;

/// How the iteration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmOutcome {

    /// Absolute log-likelihood change fell below the tolerance.
    Converged,

    /// Iteration budget exhausted; the last state is kept.
    MaxIterations,

    /// The log-likelihood (or the state) became non-finite; the last finite state is kept.
    Diverged

}

/// Record of an expectation-maximization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmReport {

    /// Number of completed (accepted) iterations.
    pub iterations : usize,

    /// Log-likelihood after each accepted iteration.
    pub log_likelihood : Vec<f64>,

    /// Final observation precision.
    pub beta : f64,

    pub outcome : EmOutcome,

    /// Iterations at which the weight covariance was ill-conditioned and the prior term
    /// was replaced by SENTINEL_PENALTY.
    pub sentinel_penalties : usize

}

/// Empirical-Bayes regression of the trajectory ensemble over a basis. The weight vector
/// w(n) of each trajectory is latent, with observations y(n) = H(n) w(n) + e, where e
/// has precision beta, and a prior w(n) ~ N(mu_w, sigma_w) shared by all trajectories.
/// The state (mu_w, sigma_w, beta) starts at (0, I, 1000) and is updated by alternating
/// the posterior moments of every w(n) (E-step) with the closed-form maximizers of the
/// expected complete-data log-likelihood (M-step).
///
/// Iteration stops when the absolute change of the log-likelihood falls below the
/// tolerance, when the budget is exhausted, or when the log-likelihood or the state stops
/// being finite. In the last case the previous state is kept. Neither case is an error:
/// the outcome is recorded in the EmReport carried by the estimate.
///
/// # References
///
/// Bishop, C. M. (2006). Pattern recognition and machine learning. Springer (Ch. 9.4).
#[derive(Debug, Clone, Copy)]
pub struct ExpectationMaximization {

    basis : BasisKind,

    nbasis : usize,

    max_iterations : usize,

    tolerance : f64

}

/// Per-trajectory quantities that do not change across iterations.
#[derive(Debug, Clone)]
struct Regressor {

    h : DMatrix<f64>,

    y : DVector<f64>,

    // H^T H
    hth : DMatrix<f64>,

    // H^T y
    hty : DVector<f64>

}

impl Regressor {

    fn new(design : &Design, x : &[f64], y : DVector<f64>) -> Self {
        let h = design.matrix(x);
        let hth = h.transpose() * &h;
        let hty = h.transpose() * &y;
        Self { h, y, hth, hty }
    }

    /// Expected squared residual under the weight posterior:
    /// |y - H E[w]|^2 + tr(H^T H S), which equals y^T y - 2 y^T H E[w] + tr(H^T H E[ww^T]).
    fn expected_residual(&self, post : &Posterior) -> f64 {
        let res = &self.y - &self.h * &post.mean;
        res.norm_squared() + (&self.hth * &post.cov).trace()
    }

}

/// Posterior moments of the weights of a single trajectory.
#[derive(Debug, Clone)]
struct Posterior {

    mean : DVector<f64>,

    cov : DMatrix<f64>

}

#[derive(Debug, Clone)]
struct State {

    mu_w : DVector<f64>,

    sigma_w : DMatrix<f64>,

    beta : f64

}

impl State {

    fn initial(nweights : usize) -> Self {
        Self { mu_w : DVector::zeros(nweights), sigma_w : DMatrix::identity(nweights, nweights), beta : 1000. }
    }

    fn is_finite(&self) -> bool {
        self.beta.is_finite() && self.beta > 0.0 &&
            self.mu_w.iter().all(|v| v.is_finite() ) &&
            self.sigma_w.iter().all(|v| v.is_finite() )
    }

}

/// Whether the matrix admits a Cholesky factor and the ratio of its extreme eigenvalues
/// does not exceed MAX_CONDITION.
pub fn well_conditioned(sigma : &DMatrix<f64>) -> bool {
    if sigma.clone().cholesky().is_none() {
        return false;
    }
    let eigs = SymmetricEigen::new(sigma.clone()).eigenvalues;
    let (min, max) = (eigs.min(), eigs.max());
    min > 0.0 && (max / min).is_finite() && max / min <= MAX_CONDITION
}

/// Posterior precision S^-1 = sigma_w^-1 + beta H^T H; posterior mean
/// S (beta H^T y + sigma_w^-1 mu_w). None when the precision is not positive-definite.
fn expectation(reg : &Regressor, mu_w : &DVector<f64>, sigma_w_inv : &DMatrix<f64>, beta : f64) -> Option<Posterior> {
    let prec = sigma_w_inv + reg.hth.scale(beta);
    let chol = prec.cholesky()?;
    let mean = chol.solve(&(reg.hty.scale(beta) + sigma_w_inv * mu_w));
    let cov = chol.inverse();
    Some(Posterior { mean, cov })
}

fn maximization(regs : &[Regressor], posts : &[Posterior], nobs : usize) -> State {
    let n = posts.len() as f64;
    let p = posts[0].mean.nrows();
    let mut mu_w = DVector::zeros(p);
    for post in posts.iter() {
        mu_w += &post.mean;
    }
    mu_w.unscale_mut(n);

    // mean(S) + mean((E[w] - mu_w)(E[w] - mu_w)^T)
    let mut sigma_w = DMatrix::zeros(p, p);
    for post in posts.iter() {
        let err = &post.mean - &mu_w;
        sigma_w += &post.cov;
        sigma_w.ger(1.0, &err, &err, 1.0);
    }
    sigma_w.unscale_mut(n);
    let sigma_w = crate::prob::build_symmetric(&sigma_w);

    let residual : f64 = regs.iter().zip(posts.iter()).map(|(r, p)| r.expected_residual(p) ).sum();
    let beta = nobs as f64 / residual;
    State { mu_w, sigma_w, beta }
}

impl ExpectationMaximization {

    pub fn new(basis : BasisKind, nbasis : usize) -> Self {
        Self { basis, nbasis, max_iterations : DEFAULT_MAX_ITERATIONS, tolerance : 1e-3 }
    }

    pub fn max_iterations(mut self, max_iterations : usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn tolerance(mut self, tolerance : f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Runs the iteration over the informed design, returning the final weight moments
    /// (mu_w, sigma_w) and the run record.
    pub fn fit_weights(&self, design : &Design, ens : &Ensemble) -> Result<(DVector<f64>, DMatrix<f64>, EmReport), TubeError> {
        let regs : Vec<Regressor> = ens.iter()
            .map(|t| Regressor::new(design, t.x().as_slice(), flatten(t.y())) )
            .collect();
        let ntraj = regs.len() as f64;

        // Scalar observations over all trajectories (ndim times the sample count).
        let nobs = ens.total_observations() * ens.ndim();
        let nweights = design.nweights();

        let mut state = State::initial(nweights);
        let mut sigma_w_inv = DMatrix::identity(nweights, nweights);
        let mut lls = Vec::new();
        let mut prev_ll = f64::INFINITY;
        let mut outcome = EmOutcome::MaxIterations;
        let mut sentinel_penalties = 0;

        for iter in 0..self.max_iterations {

            let posts = regs.par_iter()
                .map(|r| expectation(r, &state.mu_w, &sigma_w_inv, state.beta) )
                .collect::<Option<Vec<_>>>();
            let posts = match posts {
                Some(posts) => posts,
                None => {
                    warn!(iter, "weight posterior precision is not positive-definite; keeping last state");
                    outcome = EmOutcome::Diverged;
                    break;
                }
            };

            let next = maximization(&regs[..], &posts[..], nobs);
            let chol = match next.sigma_w.clone().cholesky() {
                Some(chol) if next.is_finite() => chol,
                _ => {
                    warn!(iter, "non-finite EM state; keeping last state");
                    outcome = EmOutcome::Diverged;
                    break;
                }
            };
            let next_inv = chol.inverse();

            let residual : f64 = regs.iter().zip(posts.iter()).map(|(r, p)| r.expected_residual(p) ).sum();
            let ll_data = -0.5 * nobs as f64 * (2. * PI / next.beta).ln() - 0.5 * next.beta * residual;

            let ll_prior = if well_conditioned(&next.sigma_w) {
                let log_det = 2.0 * chol.l_dirty().diagonal().iter().map(|d| d.ln() ).sum::<f64>();
                let quad : f64 = posts.iter().map(|p| {
                    let err = &p.mean - &next.mu_w;
                    (&next_inv * (&p.cov + &err * err.transpose())).trace()
                }).sum();
                -0.5 * ntraj * nweights as f64 * (2. * PI).ln() - 0.5 * ntraj * log_det - 0.5 * quad
            } else {
                debug!(iter, "ill-conditioned weight covariance");
                sentinel_penalties += 1;
                -SENTINEL_PENALTY
            };

            let ll = ll_data + ll_prior;
            if !ll.is_finite() {
                warn!(iter, "non-finite log-likelihood; keeping last state");
                outcome = EmOutcome::Diverged;
                break;
            }

            state = next;
            sigma_w_inv = next_inv;
            lls.push(ll);

            if iter % 100 == 0 {
                debug!(iter, ll, beta = state.beta, "EM iteration");
            }

            if (ll - prev_ll).abs() < self.tolerance {
                outcome = EmOutcome::Converged;
                break;
            }
            prev_ll = ll;
        }

        if outcome == EmOutcome::MaxIterations {
            warn!(max_iterations = self.max_iterations, "EM did not converge");
        }
        let report = EmReport {
            iterations : lls.len(),
            log_likelihood : lls,
            beta : state.beta,
            outcome,
            sentinel_penalties
        };
        info!(iterations = report.iterations, outcome = ?report.outcome, beta = report.beta, "EM finished");
        Ok((state.mu_w, state.sigma_w, report))
    }

}

impl Estimator for ExpectationMaximization {

    fn estimate(&self, ens : &Ensemble, ngaus : usize) -> Result<Estimate, TubeError> {
        check_ngaus(ngaus)?;
        check_nbasis(self.nbasis)?;
        let design = Design::new(self.basis, self.nbasis, ens.ndim());
        let (mu_w, sigma_w, report) = self.fit_weights(&design, ens)?;
        Ok(Estimate { joint : predict(&design, &mu_w, &sigma_w, ngaus)?, em_report : Some(report) })
    }

}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::calc::linspace;
    use crate::fit::MaximumLikelihood;
    use crate::sample::Trajectory;
    use approx::assert_abs_diff_eq;

    fn noisy_pair() -> Ensemble {
        let xs = linspace(0.0, 1.0, 20);
        let a : Vec<_> = xs.iter().enumerate()
            .map(|(i, x)| vec![0.2 + 0.5 * x + 0.01 * (7.0 * i as f64).sin()] )
            .collect();
        let b : Vec<_> = xs.iter().enumerate()
            .map(|(i, x)| vec![0.4 + 0.3 * x + 0.01 * (5.0 * i as f64).cos()] )
            .collect();
        Ensemble::new(vec![
            Trajectory::from_rows(&xs[..], &a[..]).unwrap(),
            Trajectory::from_rows(&xs[..], &b[..]).unwrap()
        ]).unwrap()
    }

    #[test]
    fn conditioning_check() {
        assert!(well_conditioned(&DMatrix::identity(3, 3)));
        assert!(!well_conditioned(&DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 1e-13]))));
        assert!(!well_conditioned(&DMatrix::zeros(2, 2)));
    }

    #[test]
    fn log_likelihood_changes_decay() {
        let em = ExpectationMaximization::new(BasisKind::Bernstein, 2);
        let design = Design::new(BasisKind::Bernstein, 2, 1);
        let (_, _, report) = em.fit_weights(&design, &noisy_pair()).unwrap();
        assert_eq!(report.outcome, EmOutcome::Converged);
        assert_eq!(report.sentinel_penalties, 0);
        assert_eq!(report.iterations, report.log_likelihood.len());
        assert!(report.iterations > 12);
        let tail = &report.log_likelihood[report.iterations-12..];
        let diffs : Vec<f64> = tail.windows(2).map(|w| (w[1] - w[0]).abs() ).collect();
        for d in diffs.windows(2) {
            assert!(d[1] <= d[0] * (1.0 + 1e-6) + 1e-12, "{:?}", diffs);
        }

        // Noise amplitude 0.01 gives a precision on the order of 1e4.
        assert!(report.beta > 1e3 && report.beta < 1e6);
    }

    #[test]
    fn loose_tolerance_stops_early() {
        let design = Design::new(BasisKind::Bernstein, 2, 1);
        let (_, _, strict) = ExpectationMaximization::new(BasisKind::Bernstein, 2)
            .fit_weights(&design, &noisy_pair())
            .unwrap();
        let (_, _, loose) = ExpectationMaximization::new(BasisKind::Bernstein, 2)
            .tolerance(1.0)
            .fit_weights(&design, &noisy_pair())
            .unwrap();
        assert_eq!(loose.outcome, EmOutcome::Converged);
        assert!(loose.iterations < 50 && loose.iterations < strict.iterations);
        let n = loose.iterations;
        assert!((loose.log_likelihood[n-1] - loose.log_likelihood[n-2]).abs() < 1.0);
    }

    #[test]
    fn overflowing_spread_keeps_initial_state() {
        // Weight spread of order 1e400 is not representable.
        let xs = linspace(0.0, 1.0, 5);
        let up : Vec<_> = xs.iter().map(|_| vec![1e200] ).collect();
        let down : Vec<_> = xs.iter().map(|_| vec![-1e200] ).collect();
        let ens = Ensemble::new(vec![
            Trajectory::from_rows(&xs[..], &up[..]).unwrap(),
            Trajectory::from_rows(&xs[..], &down[..]).unwrap()
        ]).unwrap();
        let design = Design::new(BasisKind::Bernstein, 2, 1);
        let (mu_w, sigma_w, report) = ExpectationMaximization::new(BasisKind::Bernstein, 2)
            .fit_weights(&design, &ens)
            .unwrap();
        assert_eq!(report.outcome, EmOutcome::Diverged);
        assert_eq!(report.iterations, 0);
        assert!(report.log_likelihood.is_empty());
        assert_eq!(report.beta, 1000.);
        assert_eq!(mu_w, DVector::<f64>::zeros(2));
        assert_eq!(sigma_w, DMatrix::<f64>::identity(2, 2));
    }

    #[test]
    fn identical_trajectories_match_least_squares() {
        let xs = linspace(0.0, 1.0, 10);
        let rows : Vec<_> = xs.iter().map(|x| vec![x * x, 1.0 - x] ).collect();
        let t = Trajectory::from_rows(&xs[..], &rows[..]).unwrap();
        let ens = Ensemble::new(vec![t.clone(), t.clone(), t]).unwrap();
        let ml = MaximumLikelihood::new(BasisKind::Bernstein, 3).estimate(&ens, 5).unwrap();
        let em = ExpectationMaximization::new(BasisKind::Bernstein, 3)
            .max_iterations(300)
            .estimate(&ens, 5)
            .unwrap();
        assert_abs_diff_eq!(ml.joint.mean, em.joint.mean, epsilon = 1e-8);
        assert_abs_diff_eq!(ml.joint.cov, em.joint.cov, epsilon = 1e-8);
        let report = em.em_report.unwrap();
        assert!(report.beta > 1e8);
    }

}
