use nalgebra::*;
use std::f64::consts::PI;
use crate::calc::{linspace, unique_rows};
use crate::error::TubeError;
use crate::prob::Cell;
use crate::region::ConvexHull;

/// Finite set of points (one per row) approximating an iso-probability surface, or the
/// union of such surfaces.
#[derive(Debug, Clone, PartialEq)]
pub struct EllipsoidCloud {

    points : DMatrix<f64>

}

impl EllipsoidCloud {

    pub fn new(points : DMatrix<f64>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &DMatrix<f64> {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.points.nrows() == 0
    }

    pub fn ndim(&self) -> usize {
        self.points.ncols()
    }

    /// Per-dimension (min, max) of the points.
    pub fn bounds(&self) -> Vec<(f64, f64)> {
        self.points.column_iter()
            .map(|c| (c.min(), c.max()) )
            .collect()
    }

    pub fn hull(&self) -> Result<ConvexHull, TubeError> {
        ConvexHull::new(&self.points)
    }

    /// Stacks the points of every cloud, in order.
    pub fn stack(clouds : &[EllipsoidCloud]) -> Self {
        let ndim = clouds.first().map(|c| c.ndim() ).unwrap_or(0);
        let n = clouds.iter().map(|c| c.len() ).sum();
        let mut points = DMatrix::zeros(n, ndim);
        let mut offset = 0;
        for c in clouds.iter() {
            points.rows_mut(offset, c.len()).copy_from(&c.points);
            offset += c.len();
        }
        Self { points }
    }

    /// Union of both clouds, with exactly repeated points removed.
    pub fn merge(&self, other : &EllipsoidCloud) -> Self {
        let stacked = Self::stack(&[self.clone(), other.clone()]);
        Self { points : unique_rows(&stacked.points) }
    }

}

/// Points over the unit circle (2D) or unit sphere (3D) before scaling. In 3D, u (the
/// azimuth, over [0, 2pi]) varies fastest and v (the polar angle, over [0, pi]) slowest.
fn unit_samples(ndim : usize, n : usize) -> Result<DMatrix<f64>, TubeError> {
    let u = linspace(0.0, 2.0 * PI, n);
    match ndim {
        2 => Ok(DMatrix::from_fn(n, 2, |i, j| if j == 0 { u[i].cos() } else { u[i].sin() } )),
        3 => {
            let v = linspace(0.0, PI, n);
            Ok(DMatrix::from_fn(n * n, 3, |k, j| {
                let (iu, iv) = (k % n, k / n);
                match j {
                    0 => u[iu].cos() * v[iv].sin(),
                    1 => u[iu].sin() * v[iv].sin(),
                    _ => v[iv].cos()
                }
            }))
        },
        other => Err(TubeError::UnsupportedDimension(other))
    }
}

/// Surface of the ellipsoid of the cell at width standard deviations, sampled with
/// nsamples angles (2D) or an nsamples x nsamples polar grid (3D). The principal
/// axes and radii are given by the singular vectors and width*sqrt(singular values)
/// of the cell covariance.
pub fn ellipsoid(cell : &Cell, width : f64, nsamples : usize) -> Result<EllipsoidCloud, TubeError> {
    let ndim = cell.ndim();
    let local = unit_samples(ndim, nsamples)?;
    let svd = cell.cov.clone().svd(true, false);
    let rotation = svd.u.ok_or_else(|| TubeError::Numerical(String::from("SVD of cell covariance")) )?;
    let radii = svd.singular_values.map(|s| width * s.max(0.0).sqrt() );

    // Row-wise: x = mean + R diag(r) p
    let transform = rotation * DMatrix::from_diagonal(&radii);
    let mut points = local * transform.transpose();
    for mut row in points.row_iter_mut() {
        row += cell.mean.transpose();
    }
    Ok(EllipsoidCloud::new(points))
}

/// The clouds of every cell.
pub fn cell_clouds(cells : &[Cell], width : f64, nsamples : usize) -> Result<Vec<EllipsoidCloud>, TubeError> {
    cells.iter().map(|c| ellipsoid(c, width, nsamples) ).collect()
}

/// For each pair of consecutive cells, the union of both ellipsoid clouds (with repeated
/// points removed). The convex hull of each of these ngaus-1 slabs approximates the tube
/// between the two control points.
pub fn transition_clouds(cells : &[Cell], width : f64, nsamples : usize) -> Result<Vec<EllipsoidCloud>, TubeError> {
    let clouds = cell_clouds(cells, width, nsamples)?;
    Ok(clouds.windows(2).map(|w| w[0].merge(&w[1]) ).collect())
}
