use nalgebra::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use crate::calc::{Domain, Outline, linspace, log_sum_exp, unflatten};
use crate::error::TubeError;
use crate::exec::{Executor, WorkerPool};
use crate::fit::EmReport;
use crate::prob::{Cell, JointGaussian, DensityKernel, sqrt_factor, draw};
use crate::region::ConvexHull;
use crate::sample::{Ensemble, Trajectory};

/// Construction settings (number of control points and estimator).
pub mod settings;

/// Splitting of the joint gaussian into per-control-point cells.
pub mod cells;

/// Ellipse/ellipsoid point clouds around cells, and the slabs between consecutive cells.
pub mod geometry;

/// Structured grids and their conversion to and from point lists.
pub mod grid;

/// Content-keyed memoization of grid queries.
pub mod cache;

pub use settings::*;

pub use geometry::EllipsoidCloud;

pub use grid::{Grid, GridValues, grid_to_points, points_to_grid};

use cache::{GridKey, QueryCache};

/// Seed of the generator used by Tube::sample, so that repeated calls give the same draws.
pub const SAMPLE_SEED : u64 = 10;

/// Number of samples per ellipse (or per sphere axis) used by Tube::is_inside_grid.
pub const GRID_NSAMPLES : usize = 12;

/// Probabilistic tube summarizing an ensemble of trajectories: a sequence of ngaus gaussian
/// cells at evenly spaced positions of the (normalized) trajectory parameter, in physical
/// units. The cells are the marginals of a joint gaussian over the whole path, estimated
/// with one of the strategies of ModelType.
///
/// The tube is immutable after construction, except for the memoized results of the grid
/// queries, which are kept behind a lock so that queries only need a shared reference.
/// Per-point query work is dispatched to the executor E.
#[derive(Debug)]
pub struct Tube<E : Executor = WorkerPool> {

    settings : Settings,

    domain : Domain,

    outline : Outline,

    joint : JointGaussian,

    cells : Vec<Cell>,

    em_report : Option<EmReport>,

    cache : Mutex<QueryCache>,

    executor : E

}

impl Tube<WorkerPool> {

    /// Builds the tube: the ensemble parameter is normalized to [0, 1], observations are
    /// normalized to the unit box, the estimator runs over the normalized ensemble, and the
    /// resulting joint gaussian is mapped back to physical units and split into cells.
    pub fn construct(ens : &Ensemble, settings : Settings) -> Result<Self, TubeError> {
        settings.validate()?;
        let ngaus = settings.ngaus;
        let ndim = ens.ndim();

        let domain = Domain::of(ens);
        let ens_norm = domain.apply(ens);
        let outline = Outline::of(&ens_norm);
        let ens_norm = outline.apply(&ens_norm);

        let estimate = settings.model.estimator().estimate(&ens_norm, ngaus)?;
        let (mu, sigma) = outline.to_physical(&estimate.joint.mean, &estimate.joint.cov);
        let joint = JointGaussian::new(mu, sigma, ngaus, ndim)?;
        let cells = cells::decompose(&joint)?;

        info!(
            ntraj = ens.len(),
            ndim,
            ngaus,
            model = settings.model.name(),
            "tube constructed"
        );
        Ok(Self {
            settings,
            domain,
            outline,
            joint,
            cells,
            em_report : estimate.em_report,
            cache : Mutex::new(QueryCache::default()),
            executor : WorkerPool
        })
    }

}

impl<E : Executor> Tube<E> {

    /// Moves the tube to another executor. Cached results are kept.
    pub fn with_executor<F : Executor>(self, executor : F) -> Tube<F> {
        Tube {
            settings : self.settings,
            domain : self.domain,
            outline : self.outline,
            joint : self.joint,
            cells : self.cells,
            em_report : self.em_report,
            cache : self.cache,
            executor
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn ndim(&self) -> usize {
        self.joint.ndim()
    }

    pub fn ngaus(&self) -> usize {
        self.joint.npoints()
    }

    /// Parameter range of the ensemble the tube was built from.
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Joint gaussian over the flattened (ngaus*ndim) control points, in physical units.
    pub fn joint(&self) -> &JointGaussian {
        &self.joint
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells[..]
    }

    pub fn cell(&self, i : usize) -> Result<&Cell, TubeError> {
        self.cells.get(i).ok_or(TubeError::CellIndex { index : i, ngaus : self.cells.len() })
    }

    /// Convergence record, for tubes estimated by expectation-maximization.
    pub fn em_report(&self) -> Option<&EmReport> {
        self.em_report.as_ref()
    }

    /// Mean path: the (ngaus x ndim) matrix of the cell means.
    pub fn mean(&self) -> DMatrix<f64> {
        unflatten(&self.joint.mean, self.ngaus(), self.ndim())
    }

    /// Draws n trajectories from the joint gaussian, each sampled at ngaus evenly spaced
    /// positions of [0, 1]. The generator is always seeded with SAMPLE_SEED.
    pub fn sample(&self, n : usize) -> Vec<Trajectory> {
        let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
        let sqrt_sigma = sqrt_factor(&self.joint.cov);
        let x = DVector::from_vec(linspace(0.0, 1.0, self.ngaus()));
        (0..n).map(|_| {
            let y = draw(&self.joint.mean, &sqrt_sigma, &mut rng);
            Trajectory::with_parts(x.clone(), unflatten(&y, self.ngaus(), self.ndim()))
        }).collect()
    }

    /// Ellipse (ellipsoid) point cloud of every cell.
    pub fn cell_clouds(&self, width : f64, nsamples : usize) -> Result<Vec<EllipsoidCloud>, TubeError> {
        geometry::cell_clouds(&self.cells[..], width, nsamples)
    }

    /// The ngaus-1 point clouds spanning consecutive cells.
    pub fn transition_clouds(&self, width : f64, nsamples : usize) -> Result<Vec<EllipsoidCloud>, TubeError> {
        geometry::transition_clouds(&self.cells[..], width, nsamples)
    }

    /// Per-dimension (min, max) bounds of the tube at width standard deviations. The
    /// clouds are built slightly wider (width + 0.1) so that the bounds include the edges.
    pub fn outline(&self, width : f64) -> Result<Vec<(f64, f64)>, TubeError> {
        let clouds = self.transition_clouds(width + 0.1, 10)?;
        let mut bounds = vec![(f64::INFINITY, f64::NEG_INFINITY); self.ndim()];
        for cloud in clouds.iter() {
            for (b, (lo, hi)) in bounds.iter_mut().zip(cloud.bounds()) {
                b.0 = b.0.min(lo);
                b.1 = b.1.max(hi);
            }
        }
        Ok(bounds)
    }

    /// Tests whether each row of points lies within the tube at width standard deviations,
    /// i.e. inside the convex hull of at least one of the transition clouds (sampled with
    /// nsamples points per ellipse, or nsamples x nsamples per ellipsoid).
    pub fn is_inside_tube(&self, points : &DMatrix<f64>, width : f64, nsamples : usize) -> Result<Vec<bool>, TubeError> {
        if points.ncols() != self.ndim() {
            return Err(TubeError::DimensionMismatch { expected : self.ndim(), found : points.ncols() });
        }
        let hulls = self.transition_clouds(width, nsamples)?
            .iter()
            .map(|c| c.hull() )
            .collect::<Result<Vec<ConvexHull>, _>>()?;
        let inside = self.executor.map(points.nrows(), |i| {
            let q : Vec<f64> = points.row(i).iter().cloned().collect();
            hulls.iter().any(|h| h.contains(&q[..]) )
        });
        Ok(inside)
    }

    /// Containment over every point of the grid, memoized by grid content and width.
    pub fn is_inside_grid(&self, width : f64, grid : &Grid) -> Result<GridValues<bool>, TubeError> {
        self.check_grid(grid)?;
        let key = GridKey::new(grid, Some(width), Some(GRID_NSAMPLES));
        if let Some(vals) = self.lock_cache().inside(&key) {
            debug!("containment grid served from cache");
            return Ok(vals.clone());
        }
        let (points, idx) = grid_to_points(grid);
        let inside = self.is_inside_tube(&points, width, GRID_NSAMPLES)?;
        let vals = points_to_grid(&inside[..], &idx[..])?;
        self.lock_cache().insert_inside(key, vals.clone());
        Ok(vals)
    }

    /// Log of the sum of the cell densities at every point of the grid. Points where the
    /// value is not finite receive the smallest finite value over the grid. Results are
    /// memoized by grid content.
    pub fn evaluate_log_density(&self, grid : &Grid) -> Result<GridValues<f64>, TubeError> {
        self.check_grid(grid)?;
        let key = GridKey::new(grid, None, None);
        if let Some(vals) = self.lock_cache().log_density(&key) {
            debug!("log-density grid served from cache");
            return Ok(vals.clone());
        }
        let (points, idx) = grid_to_points(grid);
        let mut logp = self.log_density(&points)?;
        let min_finite = logp.iter()
            .cloned()
            .filter(|v| v.is_finite() )
            .fold(f64::INFINITY, f64::min);
        if min_finite.is_finite() {
            logp.iter_mut().filter(|v| !v.is_finite() ).for_each(|v| *v = min_finite );
        }
        let vals = points_to_grid(&logp[..], &idx[..])?;
        self.lock_cache().insert_log_density(key, vals.clone());
        Ok(vals)
    }

    /// Log of the sum of the cell densities at each row of points.
    pub fn log_density(&self, points : &DMatrix<f64>) -> Result<Vec<f64>, TubeError> {
        if points.ncols() != self.ndim() {
            return Err(TubeError::DimensionMismatch { expected : self.ndim(), found : points.ncols() });
        }
        let kernels = self.cells.iter()
            .enumerate()
            .map(|(i, c)| c.kernel().ok_or_else(|| TubeError::Numerical(format!("covariance of cell {} is not positive-definite", i)) ) )
            .collect::<Result<Vec<DensityKernel>, _>>()?;
        Ok(self.executor.map(points.nrows(), |i| {
            let q : Vec<f64> = points.row(i).iter().cloned().collect();
            let lp : Vec<f64> = kernels.iter().map(|k| k.log_prob(&q[..]) ).collect();
            log_sum_exp(&lp[..])
        }))
    }

    /// Drops every memoized grid result.
    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    /// Number of memoized grid results.
    pub fn cached_queries(&self) -> usize {
        self.lock_cache().len()
    }

    fn check_grid(&self, grid : &Grid) -> Result<(), TubeError> {
        if grid.ndim() != self.ndim() {
            return Err(TubeError::DimensionMismatch { expected : self.ndim(), found : grid.ndim() });
        }
        Ok(())
    }

    fn lock_cache(&self) -> MutexGuard<'_, QueryCache> {
        // Entries are only written whole, so a poisoned lock still holds consistent data.
        self.cache.lock().unwrap_or_else(|e| e.into_inner() )
    }

}
