use nalgebra::*;
use crate::calc::linspace;
use crate::error::TubeError;

/// Structured grid over 2D or 3D space, stored as one dense coordinate array per axis
/// (as returned by a meshgrid), all with the same shape. Arrays are laid out in
/// row-major order: the last index varies fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {

    shape : Vec<usize>,

    axes : Vec<Vec<f64>>

}

/// Values computed over the points of a grid, reassembled with the grid shape.
#[derive(Debug, Clone, PartialEq)]
pub struct GridValues<T> {

    pub shape : Vec<usize>,

    /// Row-major values.
    pub values : Vec<T>

}

fn flat_offset(shape : &[usize], index : &[usize]) -> Option<usize> {
    if index.len() != shape.len() {
        return None;
    }
    let mut off = 0;
    for (i, n) in index.iter().zip(shape.iter()) {
        if i >= n {
            return None;
        }
        off = off * n + i;
    }
    Some(off)
}

fn multi_index(shape : &[usize], mut flat : usize) -> Vec<usize> {
    let mut ix = vec![0; shape.len()];
    for (d, n) in shape.iter().enumerate().rev() {
        ix[d] = flat % n;
        flat /= n;
    }
    ix
}

impl Grid {

    /// Dense grid over the cartesian product of evenly spaced axes, each informed as
    /// (start, end, count), including both ends.
    pub fn mgrid(ranges : &[(f64, f64, usize)]) -> Self {
        let shape : Vec<usize> = ranges.iter().map(|r| r.2 ).collect();
        let ticks : Vec<Vec<f64>> = ranges.iter().map(|(lo, hi, n)| linspace(*lo, *hi, *n) ).collect();
        let total = shape.iter().product();
        let axes = (0..ranges.len()).map(|d| {
            (0..total).map(|k| ticks[d][multi_index(&shape[..], k)[d]] ).collect()
        }).collect();
        Self { shape, axes }
    }

    /// Grid from caller-built coordinate arrays, informed as (shape, row-major values),
    /// one per axis.
    pub fn from_axes(axes : Vec<(Vec<usize>, Vec<f64>)>) -> Result<Self, TubeError> {
        let shape = axes.first()
            .map(|a| a.0.clone() )
            .ok_or_else(|| TubeError::GridShape(String::from("grid without axes")) )?;
        for (d, (s, v)) in axes.iter().enumerate() {
            if *s != shape {
                return Err(TubeError::GridShape(format!("axis {} has shape {:?}, axis 0 has shape {:?}", d, s, shape)));
            }
            if v.len() != s.iter().product::<usize>() {
                return Err(TubeError::GridShape(format!("axis {} has {} values for shape {:?}", d, v.len(), s)));
            }
        }
        Ok(Self { shape, axes : axes.into_iter().map(|a| a.1 ).collect() })
    }

    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape[..]
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn axes(&self) -> &[Vec<f64>] {
        &self.axes[..]
    }

    /// Every grid point as a row of the returned matrix, with the grid index of each row.
    pub fn to_points(&self) -> (DMatrix<f64>, Vec<Vec<usize>>) {
        let n = self.len();
        let points = DMatrix::from_fn(n, self.ndim(), |k, d| self.axes[d][k] );
        let idx = (0..n).map(|k| multi_index(&self.shape[..], k) ).collect();
        (points, idx)
    }

}

/// See Grid::to_points.
pub fn grid_to_points(grid : &Grid) -> (DMatrix<f64>, Vec<Vec<usize>>) {
    grid.to_points()
}

/// Places the values back at their grid indices. The shape is one past the largest
/// index along each axis; positions without a value keep T::default().
pub fn points_to_grid<T : Clone + Default>(values : &[T], idx : &[Vec<usize>]) -> Result<GridValues<T>, TubeError> {
    if values.len() != idx.len() {
        return Err(TubeError::GridShape(format!("{} values for {} indices", values.len(), idx.len())));
    }
    let ndim = idx.first().map(|i| i.len() ).unwrap_or(0);
    if idx.iter().any(|i| i.len() != ndim ) {
        return Err(TubeError::GridShape(String::from("indices of unequal length")));
    }
    let shape : Vec<usize> = (0..ndim)
        .map(|d| idx.iter().map(|i| i[d] + 1 ).max().unwrap_or(0) )
        .collect();
    let mut out = vec![T::default(); shape.iter().product()];
    for (v, i) in values.iter().zip(idx.iter()) {
        if let Some(off) = flat_offset(&shape[..], &i[..]) {
            out[off] = v.clone();
        }
    }
    Ok(GridValues { shape, values : out })
}

impl<T> GridValues<T> {

    pub fn get(&self, index : &[usize]) -> Option<&T> {
        flat_offset(&self.shape[..], index).map(|off| &self.values[off] )
    }

    pub fn iter(&self) -> impl Iterator<Item=&T> {
        self.values.iter()
    }

}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn mgrid_layout() {
        let g = Grid::mgrid(&[(0.0, 1.0, 3), (10.0, 20.0, 2)]);
        assert_eq!(g.shape(), &[3, 2]);
        assert_eq!(g.axes()[0], vec![0.0, 0.0, 0.5, 0.5, 1.0, 1.0]);
        assert_eq!(g.axes()[1], vec![10.0, 20.0, 10.0, 20.0, 10.0, 20.0]);
        let (pts, idx) = g.to_points();
        assert_eq!(pts.nrows(), 6);
        assert_eq!(pts.row(3).iter().cloned().collect::<Vec<_>>(), vec![0.5, 20.0]);
        assert_eq!(idx[3], vec![1, 1]);
    }

    #[test]
    fn points_round_trip() {
        let g = Grid::mgrid(&[(0.0, 1.0, 2), (0.0, 1.0, 3), (0.0, 1.0, 4)]);
        let (pts, idx) = grid_to_points(&g);
        let sums : Vec<f64> = pts.row_iter().map(|r| r.sum() ).collect();
        let back = points_to_grid(&sums[..], &idx[..]).unwrap();
        assert_eq!(back.shape, vec![2, 3, 4]);
        assert_eq!(back.get(&[1, 2, 3]), Some(&3.0));
        assert_eq!(back.get(&[0, 1, 0]), Some(&0.5));
        assert_eq!(back.get(&[2, 0, 0]), None);
    }

    #[test]
    fn axes_must_agree() {
        let ok = Grid::from_axes(vec![(vec![1, 2], vec![0., 0.]), (vec![1, 2], vec![0., 1.])]);
        assert!(ok.is_ok());
        let bad = Grid::from_axes(vec![(vec![1, 2], vec![0., 0.]), (vec![2, 1], vec![0., 1.])]);
        assert!(matches!(bad, Err(TubeError::GridShape(_))));
        let short = Grid::from_axes(vec![(vec![2, 2], vec![0., 0.])]);
        assert!(matches!(short, Err(TubeError::GridShape(_))));
    }

}
