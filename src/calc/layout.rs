use nalgebra::*;

/*
Every (npoints x ndim) block handled by the estimators is stored as a single
column grouped by dimension: all npoints values of dimension 0, then all
values of dimension 1, and so on. Since nalgebra stores matrices in column-major
order, this is exactly the storage order of the (npoints x ndim) matrix, and
the flat index of (point m, dimension d) is m + d*npoints.
*/

/// Flat index of point m, dimension d in a block of npoints points.
pub fn flat_index(m : usize, d : usize, npoints : usize) -> usize {
    m + d * npoints
}

/// Stacks the columns of an (npoints x ndim) matrix into a single vector.
pub fn flatten(m : &DMatrix<f64>) -> DVector<f64> {
    DVector::from_column_slice(m.as_slice())
}

/// Inverse of flatten: rebuilds the (npoints x ndim) matrix.
pub fn unflatten(v : &DVector<f64>, npoints : usize, ndim : usize) -> DMatrix<f64> {
    assert!(v.nrows() == npoints * ndim, "unflatten: {} != {} x {}", v.nrows(), npoints, ndim);
    DMatrix::from_column_slice(npoints, ndim, v.as_slice())
}

/// Gathers the ndim entries belonging to point m.
pub fn gather_point(v : &DVector<f64>, m : usize, npoints : usize, ndim : usize) -> DVector<f64> {
    DVector::from_fn(ndim, |d, _| v[flat_index(m, d, npoints)] )
}

/// Gathers the (ndim x ndim) covariance block of point m from a flattened covariance.
pub fn gather_block(sigma : &DMatrix<f64>, m : usize, npoints : usize, ndim : usize) -> DMatrix<f64> {
    DMatrix::from_fn(ndim, ndim, |d1, d2| {
        sigma[(flat_index(m, d1, npoints), flat_index(m, d2, npoints))]
    })
}

/// Expands a per-dimension vector (length ndim) into the flattened layout, repeating
/// each entry npoints times.
pub fn repeat_per_dim(per_dim : &[f64], npoints : usize) -> DVector<f64> {
    DVector::from_fn(per_dim.len() * npoints, |i, _| per_dim[i / npoints] )
}
