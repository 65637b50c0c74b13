use nalgebra::*;
use serde::{Serialize, Deserialize};
use crate::error::TubeError;

/// A single realization of the process: a strictly increasing parameter sequence x
/// (time, arc length or any other progress variable) and the nx(ndim) matrix of
/// observations taken at those parameter values. Rows of y are observations; columns
/// are spatial dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {

    x : DVector<f64>,

    y : DMatrix<f64>

}

impl Trajectory {

    pub fn new(x : DVector<f64>, y : DMatrix<f64>) -> Result<Self, TubeError> {
        if x.nrows() == 0 {
            return Err(TubeError::InvalidTrajectory(String::from("trajectory has no samples")));
        }
        if x.nrows() != y.nrows() {
            return Err(TubeError::InvalidTrajectory(format!(
                "{} parameter values for {} observation rows", x.nrows(), y.nrows()
            )));
        }
        if y.ncols() == 0 {
            return Err(TubeError::InvalidTrajectory(String::from("observations have no dimensions")));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite() ) {
            return Err(TubeError::InvalidTrajectory(String::from("non-finite value in trajectory")));
        }
        if x.as_slice().windows(2).any(|w| w[1] <= w[0] ) {
            return Err(TubeError::InvalidTrajectory(String::from("parameter sequence is not strictly increasing")));
        }
        Ok(Self { x, y })
    }

    /// Builds a trajectory from rows of observations, e.g. vec![vec![0.0, 1.0], vec![1.0, 2.0]].
    pub fn from_rows(x : &[f64], rows : &[Vec<f64>]) -> Result<Self, TubeError> {
        let ndim = rows.first().map(|r| r.len() ).unwrap_or(0);
        if rows.iter().any(|r| r.len() != ndim ) {
            return Err(TubeError::InvalidTrajectory(String::from("rows of unequal length")));
        }
        let y = DMatrix::from_fn(rows.len(), ndim, |i, j| rows[i][j] );
        Self::new(DVector::from_column_slice(x), y)
    }

    pub fn x(&self) -> &DVector<f64> {
        &self.x
    }

    pub fn y(&self) -> &DMatrix<f64> {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn ndim(&self) -> usize {
        self.y.ncols()
    }

    // Only called by the normalization layer, which preserves ordering and finiteness.
    pub(crate) fn with_parts(x : DVector<f64>, y : DMatrix<f64>) -> Self {
        Self { x, y }
    }

}

/// Collection of trajectories sharing the same dimensionality, which are modelled jointly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ensemble {

    trajs : Vec<Trajectory>,

    ndim : usize

}

impl Ensemble {

    pub fn new(trajs : Vec<Trajectory>) -> Result<Self, TubeError> {
        let ndim = trajs.first()
            .map(|t| t.ndim() )
            .ok_or_else(|| TubeError::InvalidTrajectory(String::from("empty ensemble")) )?;
        if let Some(t) = trajs.iter().find(|t| t.ndim() != ndim ) {
            return Err(TubeError::DimensionMismatch { expected : ndim, found : t.ndim() });
        }
        let (xmin, xmax) = x_range(&trajs);
        if !(xmax > xmin) {
            return Err(TubeError::InvalidTrajectory(String::from("ensemble parameter range is empty")));
        }
        Ok(Self { trajs, ndim })
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    pub fn len(&self) -> usize {
        self.trajs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajs.is_empty()
    }

    pub fn trajectories(&self) -> &[Trajectory] {
        &self.trajs[..]
    }

    pub fn iter(&self) -> impl Iterator<Item=&Trajectory> {
        self.trajs.iter()
    }

    /// Sum of per-trajectory sample counts.
    pub fn total_observations(&self) -> usize {
        self.trajs.iter().map(|t| t.len() ).sum()
    }

    /// Ensemble-wide (min, max) of the parameter sequences.
    pub fn x_range(&self) -> (f64, f64) {
        x_range(&self.trajs)
    }

    pub(crate) fn map_trajectories(&self, f : impl Fn(&Trajectory) -> Trajectory) -> Self {
        Self { trajs : self.trajs.iter().map(f).collect(), ndim : self.ndim }
    }

}

fn x_range(trajs : &[Trajectory]) -> (f64, f64) {
    trajs.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| {
        (lo.min(t.x.min()), hi.max(t.x.max()))
    })
}
