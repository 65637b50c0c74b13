use nalgebra::*;
use num_traits::Float;
use std::collections::HashSet;

/// Flattening convention shared by the estimators and the cell decomposer.
pub mod layout;

/// Domain and outline normalization (forward on data, inverse on statistics).
pub mod normalize;

pub use layout::*;

pub use normalize::*;

/// n evenly spaced values over the closed interval [start, end]. A single value
/// returns the start.
pub fn linspace<F>(start : F, end : F, n : usize) -> Vec<F>
where
    F : Float
{
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / F::from(n - 1).unwrap_or_else(F::one);
            (0..n).map(|i| {
                if i == n - 1 {
                    end
                } else {
                    start + step * F::from(i).unwrap_or_else(F::zero)
                }
            }).collect()
        }
    }
}

/// Piecewise-linear interpolation of (xs, ys) at x. The xs are assumed strictly
/// increasing. Values outside [xs[0], xs[n-1]] are clamped to the end values.
pub fn interp(x : f64, xs : &[f64], ys : &[f64]) -> f64 {
    assert!(xs.len() == ys.len() && !xs.is_empty());
    let n = xs.len();
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n-1] {
        return ys[n-1];
    }

    // First index with xs[i] > x; guaranteed in 1..n by the checks above.
    let hi = xs.partition_point(|v| *v <= x );
    let lo = hi - 1;
    let t = (x - xs[lo]) / (xs[hi] - xs[lo]);
    ys[lo] + t * (ys[hi] - ys[lo])
}

/// Population mean of a set of column vectors.
pub fn population_mean(vs : &[DVector<f64>]) -> DVector<f64> {
    assert!(!vs.is_empty());
    let mut acc = DVector::zeros(vs[0].nrows());
    for v in vs.iter() {
        acc += v;
    }
    acc.unscale_mut(vs.len() as f64);
    acc
}

/// Population covariance (normalized by n, not n-1) of a set of column vectors
/// around the informed mean.
pub fn population_cov(vs : &[DVector<f64>], mean : &DVector<f64>) -> DMatrix<f64> {
    assert!(!vs.is_empty());
    let p = mean.nrows();
    let mut acc = DMatrix::zeros(p, p);
    for v in vs.iter() {
        let err = v - mean;
        acc.ger(1.0, &err, &err, 1.0);
    }
    acc.unscale_mut(vs.len() as f64);
    acc
}

/// ln(sum(exp(v))), shifted by the maximum so that large magnitudes neither
/// overflow nor underflow to zero.
pub fn log_sum_exp<F>(vals : &[F]) -> F
where
    F : Float
{
    let max = vals.iter().copied().fold(F::neg_infinity(), F::max);
    if !max.is_finite() {
        return max;
    }
    let sum = vals.iter().fold(F::zero(), |acc, v| acc + (*v - max).exp() );
    max + sum.ln()
}

/// Removes exact duplicate rows (bitwise equal), keeping the first occurrence of each
/// and the input row order.
pub fn unique_rows(m : &DMatrix<f64>) -> DMatrix<f64> {
    let mut seen : HashSet<Vec<u64>> = HashSet::with_capacity(m.nrows());
    let mut keep = Vec::with_capacity(m.nrows());
    for (i, row) in m.row_iter().enumerate() {
        let key : Vec<u64> = row.iter().map(|v| canonical_bits(*v) ).collect();
        if seen.insert(key) {
            keep.push(i);
        }
    }
    m.select_rows(keep.iter())
}

/// Bit pattern used for exact comparisons, with -0.0 folded into 0.0.
pub(crate) fn canonical_bits(v : f64) -> u64 {
    if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() }
}
