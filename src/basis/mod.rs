use nalgebra::*;
use serde::{Serialize, Deserialize};
use std::fmt::Debug;
use std::str::FromStr;
use crate::error::TubeError;

/// Radial (gaussian) basis functions with evenly spaced centers.
pub mod gaussian;

/// Bernstein polynomials on the unit interval.
pub mod bernstein;

pub use gaussian::*;

pub use bernstein::*;

/// A fixed family of scalar functions over the normalized domain [0, 1]. Trajectories are
/// represented as linear combinations of these functions, so the weights of the
/// combination can be treated as the random quantity instead of the raw observations
/// (which have a different count for each trajectory).
pub trait Basis
    where Self : Debug + Send + Sync
{

    /// Number of functions in the family.
    fn nbasis(&self) -> usize;

    /// Writes the value of every function at x into row (of length nbasis).
    fn eval_into(&self, x : f64, row : &mut [f64]);

    /// Evaluates the family at the informed points, returning the (n x nbasis) matrix
    /// with one point per row.
    fn evaluate(&self, xs : &[f64]) -> DMatrix<f64> {
        let nb = self.nbasis();
        let mut row = vec![0.0; nb];
        let mut m = DMatrix::zeros(xs.len(), nb);
        for (i, x) in xs.iter().enumerate() {
            self.eval_into(*x, &mut row[..]);
            for k in 0..nb {
                m[(i, k)] = row[k];
            }
        }
        m
    }

}

/// Which basis family a regression estimator uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasisKind {

    Gaussian,

    Bernstein

}

impl BasisKind {

    pub fn build(&self, nbasis : usize) -> Box<dyn Basis> {
        match self {
            BasisKind::Gaussian => Box::new(Gaussian::new(nbasis)),
            BasisKind::Bernstein => Box::new(Bernstein::new(nbasis))
        }
    }

}

impl FromStr for BasisKind {

    type Err = TubeError;

    fn from_str(s : &str) -> Result<Self, TubeError> {
        match s {
            "gaussian" => Ok(BasisKind::Gaussian),
            "bernstein" => Ok(BasisKind::Bernstein),
            other => Err(TubeError::config(format!("unknown basis_type '{}'", other)))
        }
    }

}

/// Design matrix builder for ndim-dimensional trajectories. Each dimension is expanded
/// independently over the same basis, giving the block-diagonal matrix I(ndim) ⊗ Φ(x).
/// Rows and columns are grouped by dimension, which matches the flattening convention
/// of calc::layout for both the observations (rows) and the weights (columns).
#[derive(Debug)]
pub struct Design {

    basis : Box<dyn Basis>,

    ndim : usize

}

impl Design {

    pub fn new(kind : BasisKind, nbasis : usize, ndim : usize) -> Self {
        Self::from_basis(kind.build(nbasis), ndim)
    }

    pub fn from_basis(basis : Box<dyn Basis>, ndim : usize) -> Self {
        Self { basis, ndim }
    }

    pub fn nbasis(&self) -> usize {
        self.basis.nbasis()
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    /// Size of the flattened weight vector (nbasis*ndim).
    pub fn nweights(&self) -> usize {
        self.basis.nbasis() * self.ndim
    }

    /// The (n*ndim x nbasis*ndim) design matrix at the informed points.
    pub fn matrix(&self, xs : &[f64]) -> DMatrix<f64> {
        let phi = self.basis.evaluate(xs);
        let (n, nb) = phi.shape();
        let mut h = DMatrix::zeros(n * self.ndim, nb * self.ndim);
        for d in 0..self.ndim {
            h.slice_mut((d * n, d * nb), (n, nb)).copy_from(&phi);
        }
        h
    }

}
