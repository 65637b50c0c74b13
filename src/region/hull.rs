use nalgebra::*;
use std::collections::HashSet;
use crate::error::TubeError;

/// Relative tolerance of every membership test, scaled by the extent of the cloud.
const REL_TOL : f64 = 1e-10;

#[derive(Debug, Clone, Copy)]
struct Face {

    v : [usize; 3],

    // Outward unit normal.
    normal : Vector3<f64>,

    // normal . x = offset on the face plane.
    offset : f64

}

impl Face {

    fn dist(&self, p : &Vector3<f64>) -> f64 {
        self.normal.dot(p) - self.offset
    }

}

#[derive(Debug, Clone)]
enum Shape {

    Empty,

    Point(Vector3<f64>),

    Segment { origin : Vector3<f64>, dir : Vector3<f64>, tmin : f64, tmax : f64 },

    // Counter-clockwise polygon in the (e1, e2) basis of the plane through origin.
    Planar { origin : Vector3<f64>, normal : Vector3<f64>, e1 : Vector3<f64>, e2 : Vector3<f64>, polygon : Vec<Vector2<f64>> },

    Solid { faces : Vec<Face> }

}

/// Convex hull of a 2D or 3D point cloud, used for membership tests. Two-dimensional
/// clouds are lifted to the z = 0 plane; clouds that do not span their space (a single
/// repeated point, collinear or coplanar points) are kept as the lower-dimensional
/// hull, so membership requires the query to lie on it (up to the tolerance).
#[derive(Debug, Clone)]
pub struct ConvexHull {

    shape : Shape,

    ndim : usize,

    tol : f64

}

fn lift(row : &[f64]) -> Vector3<f64> {
    Vector3::new(row[0], row[1], if row.len() > 2 { row[2] } else { 0.0 })
}

fn argmax_by(pts : &[Vector3<f64>], f : impl Fn(&Vector3<f64>) -> f64) -> (usize, f64) {
    pts.iter().enumerate()
        .map(|(i, p)| (i, f(p)) )
        .fold((0, f64::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best } )
}

fn cross2(o : &Vector2<f64>, a : &Vector2<f64>, b : &Vector2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Andrew's monotone chain. Returns the hull vertices in counter-clockwise order,
/// without collinear points.
fn monotone_chain(mut pts : Vec<Vector2<f64>>) -> Vec<Vector2<f64>> {
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)) );
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }
    let mut hull : Vec<Vector2<f64>> = Vec::with_capacity(2 * pts.len());
    for p in pts.iter() {
        while hull.len() >= 2 && cross2(&hull[hull.len()-2], &hull[hull.len()-1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(*p);
    }
    let lower_len = hull.len() + 1;
    for p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross2(&hull[hull.len()-2], &hull[hull.len()-1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(*p);
    }
    hull.pop();
    hull
}

/// Builds a face through points a, b, c with the normal pointing away from the interior point.
fn oriented_face(pts : &[Vector3<f64>], a : usize, b : usize, c : usize, interior : &Vector3<f64>) -> Face {
    let n = (pts[b] - pts[a]).cross(&(pts[c] - pts[a]));
    let (v, n) = if n.dot(&(interior - pts[a])) > 0.0 {
        ([a, c, b], -n)
    } else {
        ([a, b, c], n)
    };
    let norm = n.norm();
    let normal = if norm > 0.0 { n / norm } else { n };
    Face { v, normal, offset : normal.dot(&pts[a]) }
}

/// Incremental (beneath-beyond) construction over an initial non-degenerate tetrahedron.
fn solid_hull(pts : &[Vector3<f64>], simplex : [usize; 4], tol : f64) -> Vec<Face> {
    let interior = simplex.iter().fold(Vector3::zeros(), |acc, i| acc + pts[*i] ) / 4.0;
    let [i0, i1, i2, i3] = simplex;
    let mut faces = vec![
        oriented_face(pts, i0, i1, i2, &interior),
        oriented_face(pts, i0, i1, i3, &interior),
        oriented_face(pts, i0, i2, i3, &interior),
        oriented_face(pts, i1, i2, i3, &interior)
    ];
    for (ix, p) in pts.iter().enumerate() {
        if simplex.contains(&ix) {
            continue;
        }
        let (visible, kept) : (Vec<Face>, Vec<Face>) = std::mem::take(&mut faces)
            .into_iter()
            .partition(|f| f.dist(p) > tol );
        faces = kept;
        if visible.is_empty() {
            continue;
        }
        let edges : HashSet<(usize, usize)> = visible.iter()
            .flat_map(|f| [(f.v[0], f.v[1]), (f.v[1], f.v[2]), (f.v[2], f.v[0])] )
            .collect();
        for &(a, b) in edges.iter() {
            if !edges.contains(&(b, a)) {
                faces.push(oriented_face(pts, a, b, ix, &interior));
            }
        }
    }
    faces
}

impl ConvexHull {

    /// Builds the hull of the rows of points (n x 2 or n x 3).
    pub fn new(points : &DMatrix<f64>) -> Result<Self, TubeError> {
        let ndim = points.ncols();
        if ndim != 2 && ndim != 3 {
            return Err(TubeError::UnsupportedDimension(ndim));
        }
        let pts : Vec<Vector3<f64>> = points.row_iter()
            .map(|r| lift(&r.iter().cloned().collect::<Vec<_>>()[..]) )
            .collect();
        if pts.is_empty() {
            return Ok(Self { shape : Shape::Empty, ndim, tol : 0.0 });
        }

        let (lo, hi) = pts.iter().fold((pts[0], pts[0]), |(lo, hi), p| (lo.inf(p), hi.sup(p)) );
        let extent = (hi - lo).norm();
        let tol = REL_TOL * extent.max(f64::MIN_POSITIVE);

        let p0 = pts[0];
        let (i1, d1) = argmax_by(&pts[..], |p| (p - p0).norm() );
        if d1 <= tol {
            return Ok(Self { shape : Shape::Point(p0), ndim, tol });
        }

        let dir = (pts[i1] - p0) / d1;
        let off_line = |p : &Vector3<f64>| {
            let v = p - p0;
            (v - dir * v.dot(&dir)).norm()
        };
        let (i2, d2) = argmax_by(&pts[..], off_line);
        if d2 <= tol {
            let ts : Vec<f64> = pts.iter().map(|p| (p - p0).dot(&dir) ).collect();
            let tmin = ts.iter().cloned().fold(f64::INFINITY, f64::min);
            let tmax = ts.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            return Ok(Self { shape : Shape::Segment { origin : p0, dir, tmin, tmax }, ndim, tol });
        }

        let normal = dir.cross(&(pts[i2] - p0)).normalize();
        let (i3, d3) = argmax_by(&pts[..], |p| (p - p0).dot(&normal).abs() );
        if d3 <= tol {
            let e1 = dir;
            let e2 = normal.cross(&e1);
            let flat : Vec<Vector2<f64>> = pts.iter()
                .map(|p| Vector2::new((p - p0).dot(&e1), (p - p0).dot(&e2)) )
                .collect();
            let polygon = monotone_chain(flat);
            return Ok(Self { shape : Shape::Planar { origin : p0, normal, e1, e2, polygon }, ndim, tol });
        }

        let faces = solid_hull(&pts[..], [0, i1, i2, i3], tol);
        Ok(Self { shape : Shape::Solid { faces }, ndim, tol })
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    /// Whether q (of length ndim) lies inside or on the boundary of the hull.
    pub fn contains(&self, q : &[f64]) -> bool {
        let q = lift(q);
        let tol = self.tol;
        match &self.shape {
            Shape::Empty => false,
            Shape::Point(p) => (q - p).norm() <= tol,
            Shape::Segment { origin, dir, tmin, tmax } => {
                let v = q - origin;
                let t = v.dot(dir);
                (v - dir * t).norm() <= tol && t >= tmin - tol && t <= tmax + tol
            },
            Shape::Planar { origin, normal, e1, e2, polygon } => {
                let v = q - origin;
                if v.dot(normal).abs() > tol {
                    return false;
                }
                let q2 = Vector2::new(v.dot(e1), v.dot(e2));
                in_polygon(&polygon[..], &q2, tol)
            },
            Shape::Solid { faces } => faces.iter().all(|f| f.dist(&q) <= tol )
        }
    }

}

fn in_polygon(polygon : &[Vector2<f64>], q : &Vector2<f64>, tol : f64) -> bool {
    match polygon.len() {
        0 => false,
        1 => (q - polygon[0]).norm() <= tol,
        2 => {
            let (a, b) = (polygon[0], polygon[1]);
            let ab = b - a;
            let t = (q - a).dot(&ab) / ab.norm_squared();
            let closest = a + ab * t.clamp(0.0, 1.0);
            (q - closest).norm() <= tol
        },
        n => (0..n).all(|i| {
            let a = &polygon[i];
            let b = &polygon[(i + 1) % n];
            cross2(a, b, q) >= -tol * (b - a).norm()
        })
    }
}
