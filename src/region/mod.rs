use nalgebra::*;
use crate::error::TubeError;

/// Convex hulls of 2D and 3D point clouds.
mod hull;

pub use hull::*;

/// Tests every row of query against the convex hull of the rows of cloud.
pub fn in_hull(query : &DMatrix<f64>, cloud : &DMatrix<f64>) -> Result<Vec<bool>, TubeError> {
    if query.ncols() != cloud.ncols() {
        return Err(TubeError::DimensionMismatch { expected : cloud.ncols(), found : query.ncols() });
    }
    let hull = ConvexHull::new(cloud)?;
    Ok(query.row_iter()
        .map(|r| hull.contains(&r.iter().cloned().collect::<Vec<_>>()[..]) )
        .collect())
}
