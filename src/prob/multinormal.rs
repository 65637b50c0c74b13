use nalgebra::*;
use rand::Rng;
use rand_distr::StandardNormal;
use std::f64::consts::PI;

/// Builds a symmetric matrix from M as (1/2)*(M + M^T)
pub fn build_symmetric(m : &DMatrix<f64>) -> DMatrix<f64> {
    assert!(m.nrows() == m.ncols(), "build_symmetric: Informed non-square matrix");
    (m + m.transpose()).scale(0.5)
}

/// Verifies if the informed matrix is symmetric positive-definite, i.e. admits a
/// Cholesky factorization (and can be used as a covariance matrix).
pub fn is_pd(m : &DMatrix<f64>) -> bool {
    m.iter().all(|v| v.is_finite() ) && m.clone().cholesky().is_some()
}

/// Transforms a potentially non-positive definite square matrix m into the nearest
/// symmetric positive definite matrix (in the Frobenius norm sense). If m is SPD already,
/// the output is no different than its symmetric part.
///
/// The symmetric part B is averaged with its polar factor H = V S V^T (taken from the SVD
/// of B), which gives the nearest positive semi-definite matrix. Since semi-definite
/// matrices are not usable as covariances, a multiple of the identity is added (growing
/// quadratically) until a Cholesky factorization succeeds.
///
/// # References
///
/// Higham, N. J. ([1988](https://www.sciencedirect.com/science/article/pii/0024379588902236)).
/// Computing a nearest symmetric positive semidefinite matrix.
/// Linear Algebra Appl., 103, 103–118. doi: 10.1016/0024-3795(88)90223-6 (Theorem 2.1).
pub fn nearest_spd(m : &DMatrix<f64>) -> DMatrix<f64> {
    let b = build_symmetric(m);
    if is_pd(&b) {
        return b;
    }
    let svd = b.clone().svd(false, true);
    let h = match svd.v_t {
        Some(ref v_t) => v_t.transpose() * DMatrix::from_diagonal(&svd.singular_values) * v_t,
        None => DMatrix::zeros(b.nrows(), b.ncols())
    };
    let mut a = build_symmetric(&((b + h) * 0.5));
    let n = a.nrows();
    let spacing = f64::EPSILON * m.norm().max(1.0);
    let mut k = 1.0;
    while !is_pd(&a) {
        let min_eig = SymmetricEigen::new(a.clone()).eigenvalues.min();
        let shift = -min_eig * k * k + spacing;
        for i in 0..n {
            a[(i, i)] += shift;
        }
        k += 1.0;
        if k > 100.0 {
            break;
        }
    }
    a
}

/// Square root factor L of a symmetric positive semi-definite covariance (L L^T = sigma),
/// taken from the SVD so that singular covariances are also accepted.
pub fn sqrt_factor(sigma : &DMatrix<f64>) -> DMatrix<f64> {
    let svd = sigma.clone().svd(true, false);
    let sqrt_s = svd.singular_values.map(|s| s.max(0.0).sqrt() );
    match svd.u {
        Some(u) => u * DMatrix::from_diagonal(&sqrt_s),
        None => DMatrix::zeros(sigma.nrows(), sigma.ncols())
    }
}

/// Draws one realization of N(mu, L L^T) given the square root factor L.
pub fn draw<R : Rng>(mu : &DVector<f64>, sqrt_sigma : &DMatrix<f64>, rng : &mut R) -> DVector<f64> {
    let z = DVector::from_fn(mu.nrows(), |_, _| rng.sample::<f64, _>(StandardNormal) );
    mu + sqrt_sigma * z
}

/// Pre-factored multivariate normal density, evaluated many times over query
/// points. Holds the Cholesky factor of the covariance and the log-partition
/// -0.5 * (p ln(2 pi) + ln det sigma).
#[derive(Debug, Clone)]
pub struct DensityKernel {

    mu : DVector<f64>,

    chol : Cholesky<f64, Dynamic>,

    log_part : f64

}

impl DensityKernel {

    pub fn new(mu : DVector<f64>, sigma : DMatrix<f64>) -> Option<Self> {
        let p = mu.nrows();
        let chol = sigma.cholesky()?;
        let log_det = 2.0 * chol.l_dirty().diagonal().iter().map(|d| d.ln() ).sum::<f64>();
        let log_part = -0.5 * (p as f64 * (2.0 * PI).ln() + log_det);
        Some(Self { mu, chol, log_part })
    }

    /// ln N(y; mu, sigma)
    pub fn log_prob(&self, y : &[f64]) -> f64 {
        let xc = DVector::from_fn(self.mu.nrows(), |i, _| y[i] - self.mu[i] );

        // x^T S^-1 x
        let mahalanobis = xc.dot(&self.chol.solve(&xc));

        self.log_part - 0.5 * mahalanobis
    }

}
