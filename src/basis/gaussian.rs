use super::Basis;
use crate::calc::linspace;

/// Gaussian radial basis: nbasis bumps centered at evenly spaced points of [0, 1], all
/// with a standard deviation equal to the spacing between neighbouring centers, so
/// adjacent bumps overlap enough to represent smooth curves.
#[derive(Debug, Clone)]
pub struct Gaussian {

    centers : Vec<f64>,

    width : f64

}

impl Gaussian {

    pub fn new(nbasis : usize) -> Self {
        assert!(nbasis >= 2, "Gaussian basis requires at least two functions");
        let centers = linspace(0.0, 1.0, nbasis);
        let width = 1.0 / (nbasis - 1) as f64;
        Self { centers, width }
    }

    pub fn centers(&self) -> &[f64] {
        &self.centers[..]
    }

    pub fn width(&self) -> f64 {
        self.width
    }

}

impl Basis for Gaussian {

    fn nbasis(&self) -> usize {
        self.centers.len()
    }

    fn eval_into(&self, x : f64, row : &mut [f64]) {
        let two_var = 2.0 * self.width.powi(2);
        for (r, c) in row.iter_mut().zip(self.centers.iter()) {
            *r = (-(x - c).powi(2) / two_var).exp();
        }
    }

}
