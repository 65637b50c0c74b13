use nalgebra::*;
use serde::{Serialize, Deserialize};
use crate::sample::{Ensemble, Trajectory};
use super::layout::repeat_per_dim;

/// Ensemble-wide range of the trajectory parameter (time, progress). Trajectories
/// are mapped onto [0, 1] before any estimation so that basis functions and
/// control points are defined over a fixed domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain {

    pub min : f64,

    pub max : f64

}

impl Domain {

    pub fn of(ens : &Ensemble) -> Self {
        let (min, max) = ens.x_range();
        Self { min, max }
    }

    pub fn normalize(&self, x : f64) -> f64 {
        (x - self.min) / (self.max - self.min)
    }

    /// Rescales the parameter sequence of every trajectory; observations are untouched.
    pub fn apply(&self, ens : &Ensemble) -> Ensemble {
        ens.map_trajectories(|t| {
            Trajectory::with_parts(t.x().map(|x| self.normalize(x) ), t.y().clone())
        })
    }

}

/// Per-dimension (lower, upper) bounds of every observation in the ensemble. Estimation
/// happens on observations rescaled to the unit box; the resulting statistics are
/// mapped back to physical units through to_physical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outline {

    pub lower : Vec<f64>,

    pub upper : Vec<f64>

}

impl Outline {

    pub fn of(ens : &Ensemble) -> Self {
        let ndim = ens.ndim();
        let mut lower = vec![f64::INFINITY; ndim];
        let mut upper = vec![f64::NEG_INFINITY; ndim];
        for t in ens.iter() {
            for (d, col) in t.y().column_iter().enumerate() {
                lower[d] = lower[d].min(col.min());
                upper[d] = upper[d].max(col.max());
            }
        }
        Self { lower, upper }
    }

    pub fn ndim(&self) -> usize {
        self.lower.len()
    }

    /// Extent of each dimension. Constant dimensions have unit span, so they are shifted
    /// onto zero instead of divided by zero.
    pub fn span(&self) -> Vec<f64> {
        self.lower.iter().zip(self.upper.iter())
            .map(|(lo, hi)| if hi - lo > 0.0 { hi - lo } else { 1.0 } )
            .collect()
    }

    /// Maps observations of every trajectory onto the unit box.
    pub fn apply(&self, ens : &Ensemble) -> Ensemble {
        let span = self.span();
        ens.map_trajectories(|t| {
            let mut y = t.y().clone();
            for (d, mut col) in y.column_iter_mut().enumerate() {
                col.apply(|v| *v = (*v - self.lower[d]) / span[d] );
            }
            Trajectory::with_parts(t.x().clone(), y)
        })
    }

    /// Maps a flattened (npoints*ndim) mean and covariance from the unit box back
    /// to physical units: mu -> D mu + lower, sigma -> D sigma D.
    pub fn to_physical(&self, mu : &DVector<f64>, sigma : &DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
        let npoints = mu.nrows() / self.ndim();
        let scale = repeat_per_dim(&self.span(), npoints);
        let shift = repeat_per_dim(&self.lower, npoints);
        let mu_phys = mu.component_mul(&scale) + shift;
        let sigma_phys = DMatrix::from_fn(sigma.nrows(), sigma.ncols(), |i, j| {
            scale[i] * sigma[(i, j)] * scale[j]
        });
        (mu_phys, sigma_phys)
    }

    /// Inverse of to_physical.
    pub fn to_normalized(&self, mu : &DVector<f64>, sigma : &DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
        let npoints = mu.nrows() / self.ndim();
        let scale = repeat_per_dim(&self.span(), npoints);
        let shift = repeat_per_dim(&self.lower, npoints);
        let mu_norm = (mu - shift).component_div(&scale);
        let sigma_norm = DMatrix::from_fn(sigma.nrows(), sigma.ncols(), |i, j| {
            sigma[(i, j)] / (scale[i] * scale[j])
        });
        (mu_norm, sigma_norm)
    }

}
