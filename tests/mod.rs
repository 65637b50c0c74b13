use nalgebra::*;
use trajtube::*;
use trajtube::calc::linspace;
use trajtube::tube::cells::{compose, decompose};
use approx::{assert_abs_diff_eq, assert_relative_eq};

const EPS : f64 = 10E-8;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn straight_lines() -> anyhow::Result<Ensemble> {
    let trajs = [5, 7, 10].iter().map(|n| {
        let xs = linspace(0.0, 1.0, *n);
        let rows : Vec<_> = xs.iter().map(|x| vec![10.0 * x, 0.0] ).collect();
        Trajectory::from_rows(&xs[..], &rows[..])
    }).collect::<Result<Vec<_>, _>>()?;
    Ok(Ensemble::new(trajs)?)
}

// Curved paths with spread along both dimensions at every parameter value.
fn wavy(ntraj : usize) -> anyhow::Result<Ensemble> {
    let trajs = (0..ntraj).map(|k| {
        let k = k as f64;
        let xs = linspace(0.0, 1.0, 15 + 2 * k as usize);
        let rows : Vec<_> = xs.iter().map(|x| vec![
            10.0 * x + 0.3 * (1.7 * k).sin(),
            2.0 * x + 0.5 * (2.3 * k).cos() + 0.1 * k * x
        ]).collect();
        Trajectory::from_rows(&xs[..], &rows[..])
    }).collect::<Result<Vec<_>, _>>()?;
    Ok(Ensemble::new(trajs)?)
}

fn helices() -> anyhow::Result<Ensemble> {
    let trajs = (0..6).map(|k| {
        let k = k as f64;
        let xs = linspace(0.0, 2.0, 12);
        let rows : Vec<_> = xs.iter().map(|x| vec![
            5.0 * x + 0.2 * k.sin(),
            2.5 * x + 0.3 * (1.3 * k).cos(),
            0.75 * x * x + 0.25 * (0.7 * k + 1.0).sin()
        ]).collect();
        Trajectory::from_rows(&xs[..], &rows[..])
    }).collect::<Result<Vec<_>, _>>()?;
    Ok(Ensemble::new(trajs)?)
}

#[test]
fn straight_lines_resampled() -> anyhow::Result<()> {
    init_tracing();
    let tube = Tube::construct(&straight_lines()?, Settings::resampling(5))?;
    let mean = tube.mean();
    for m in 0..5 {
        assert_abs_diff_eq!(mean[(m, 0)], 2.5 * m as f64, epsilon = EPS);
        assert_abs_diff_eq!(mean[(m, 1)], 0.0, epsilon = EPS);
    }
    assert_abs_diff_eq!(tube.joint().cov, DMatrix::zeros(10, 10), epsilon = EPS);
    Ok(())
}

#[test]
fn constant_curve_has_zero_covariance() -> anyhow::Result<()> {
    let trajs = [4, 9].iter().map(|n| {
        let xs = linspace(-1.0, 3.0, *n);
        let rows = vec![vec![3.0, -1.0]; *n];
        Trajectory::from_rows(&xs[..], &rows[..])
    }).collect::<Result<Vec<_>, _>>()?;
    let tube = Tube::construct(&Ensemble::new(trajs)?, Settings::resampling(4))?;
    assert!(tube.joint().cov.iter().all(|v| *v == 0.0 ));
    for row in tube.mean().row_iter() {
        assert_eq!(row[0], 3.0);
        assert_eq!(row[1], -1.0);
    }

    // Cells are repaired into (barely) positive-definite covariances.
    for c in tube.cells() {
        assert!(c.kernel().is_some());
        assert!(c.cov.iter().all(|v| v.abs() < 1e-6 ));
    }
    Ok(())
}

#[test]
fn em_agrees_with_ml_on_identical_trajectories() -> anyhow::Result<()> {
    init_tracing();
    let xs = linspace(0.0, 1.0, 10);
    let rows : Vec<_> = xs.iter().map(|x| vec![4.0 * x * x, 2.0 * (1.0 - x)] ).collect();
    let t = Trajectory::from_rows(&xs[..], &rows[..])?;
    let ens = Ensemble::new(vec![t.clone(), t.clone(), t])?;
    let ml = Tube::construct(&ens, Settings::maximum_likelihood(5, BasisKind::Bernstein, 3))?;
    let em = Tube::construct(
        &ens,
        Settings::expectation_maximization(5, BasisKind::Bernstein, 3).max_iterations(300)
    )?;
    assert_abs_diff_eq!(ml.mean(), em.mean(), epsilon = 1e-6);
    assert_abs_diff_eq!(ml.joint().cov, em.joint().cov, epsilon = 1e-6);
    assert!(ml.em_report().is_none());
    assert!(em.em_report().is_some());
    Ok(())
}

#[test]
fn em_log_likelihood_settles() -> anyhow::Result<()> {
    init_tracing();
    let xs = linspace(0.0, 1.0, 20);
    let a : Vec<_> = xs.iter().enumerate().map(|(i, x)| {
        let i = i as f64;
        vec![10.0 * x + 0.1 * (3.0 * i).sin(), 2.0 + 5.0 * x + 0.1 * (7.0 * i).sin()]
    }).collect();
    let b : Vec<_> = xs.iter().enumerate().map(|(i, x)| {
        let i = i as f64;
        vec![10.0 * x + 0.5 + 0.1 * (2.0 * i).cos(), 4.0 + 3.0 * x + 0.1 * (5.0 * i).cos()]
    }).collect();
    let ens = Ensemble::new(vec![
        Trajectory::from_rows(&xs[..], &a[..])?,
        Trajectory::from_rows(&xs[..], &b[..])?
    ])?;
    let tube = Tube::construct(
        &ens,
        Settings::expectation_maximization(6, BasisKind::Bernstein, 2).max_iterations(300)
    )?;
    let report = tube.em_report().ok_or_else(|| anyhow::anyhow!("missing EM report") )?;
    assert_eq!(report.outcome, EmOutcome::MaxIterations);
    assert_eq!(report.iterations, 300);
    assert_eq!(report.sentinel_penalties, 0);
    let tail = &report.log_likelihood[report.iterations-12..];
    let diffs : Vec<f64> = tail.windows(2).map(|w| (w[1] - w[0]).abs() ).collect();
    for d in diffs.windows(2) {
        assert!(d[1] <= d[0] * (1.0 + 1e-6) + 1e-12, "{:?}", diffs);
    }
    Ok(())
}

// Noise-free lines are fit exactly by a degree 1 basis, so the noise precision grows
// without bound and the weight covariance collapses onto the spread of the 3 lines.
#[test]
fn em_exact_fit_keeps_last_finite_state() -> anyhow::Result<()> {
    init_tracing();
    let xs = linspace(0.0, 1.0, 20);
    let trajs = (0..3).map(|k| {
        let k = k as f64;
        let rows : Vec<_> = xs.iter().map(|x| vec![x + 0.3 * k * k, (1.0 + k) * x - k] ).collect();
        Trajectory::from_rows(&xs[..], &rows[..])
    }).collect::<Result<Vec<_>, _>>()?;
    let tube = Tube::construct(
        &Ensemble::new(trajs)?,
        Settings::expectation_maximization(6, BasisKind::Bernstein, 2)
    )?;
    let report = tube.em_report().ok_or_else(|| anyhow::anyhow!("missing EM report") )?;
    assert_eq!(report.outcome, EmOutcome::Diverged);
    assert!(report.sentinel_penalties > 0);
    assert!(report.iterations < 100);
    assert!(report.beta > 1e12 && report.beta.is_finite());
    assert!(report.log_likelihood.iter().all(|ll| ll.is_finite() ));

    let mean = tube.mean();
    assert!(mean.iter().all(|v| v.is_finite() ));
    for m in 0..6 {
        let x = m as f64 / 5.0;
        assert_abs_diff_eq!(mean[(m, 0)], x + 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(mean[(m, 1)], 2.0 * x - 1.0, epsilon = 1e-6);
    }
    assert!(tube.cells().iter().all(|c| c.kernel().is_some() ));
    assert!(tube.is_inside_tube(&mean, 1.0, 20)?.iter().all(|i| *i ));

    let grid = Grid::mgrid(&[(-0.5, 3.0, 7), (-3.0, 2.0, 6)]);
    assert!(tube.evaluate_log_density(&grid)?.iter().all(|v| v.is_finite() ));
    Ok(())
}

// More basis functions than samples in every trajectory.
#[test]
fn em_underdetermined_design_stays_usable() -> anyhow::Result<()> {
    init_tracing();
    let trajs = [4, 5, 6].iter().enumerate().map(|(k, n)| {
        let off = 0.1 * k as f64 - 0.1;
        let xs = linspace(0.0, 1.0, *n);
        let rows : Vec<_> = xs.iter().map(|x| vec![*x, (3.0 * x).sin() + off] ).collect();
        Trajectory::from_rows(&xs[..], &rows[..])
    }).collect::<Result<Vec<_>, _>>()?;
    let tube = Tube::construct(
        &Ensemble::new(trajs)?,
        Settings::expectation_maximization(8, BasisKind::Gaussian, 20).max_iterations(300)
    )?;
    let report = tube.em_report().ok_or_else(|| anyhow::anyhow!("missing EM report") )?;
    assert!(report.iterations > 0 && report.iterations <= 300);
    assert!(report.beta.is_finite());

    let mean = tube.mean();
    assert!(mean.iter().all(|v| v.is_finite() ));
    assert!(tube.joint().cov.iter().all(|v| v.is_finite() ));
    assert!(tube.is_inside_tube(&mean, 1.0, 20)?.iter().all(|i| *i ));
    let grid = Grid::mgrid(&[(-0.5, 1.5, 5), (-0.5, 1.5, 5)]);
    assert!(tube.evaluate_log_density(&grid)?.iter().all(|v| v.is_finite() ));
    Ok(())
}

#[test]
fn cells_compose_back_to_block_diagonal() -> anyhow::Result<()> {
    let tube = Tube::construct(&wavy(8)?, Settings::resampling(6))?;
    let (mu, sigma) = compose(tube.cells())?;
    assert_relative_eq!(mu, tube.joint().mean, epsilon = 1e-12);
    let joint = JointGaussian::new(mu, sigma, 6, 2)?;
    let again = decompose(&joint)?;
    for (a, b) in again.iter().zip(tube.cells().iter()) {
        assert_relative_eq!(a.mean, b.mean, epsilon = 1e-12);
        assert_relative_eq!(a.cov, b.cov, epsilon = 1e-9);
    }
    Ok(())
}

#[test]
fn means_lie_inside_the_tube() -> anyhow::Result<()> {
    init_tracing();
    let tube = Tube::construct(&wavy(8)?, Settings::resampling(10))?;
    let inside = tube.is_inside_tube(&tube.mean(), 1.0, 20)?;
    assert!(inside.iter().all(|i| *i ));
    let far = DMatrix::from_row_slice(2, 2, &[1000.0, 1000.0, -50.0, 3.0]);
    assert_eq!(tube.is_inside_tube(&far, 1.0, 20)?, vec![false, false]);

    let tube = Tube::construct(&helices()?, Settings::maximum_likelihood(4, BasisKind::Bernstein, 3))?;
    assert_eq!(tube.ndim(), 3);
    let inside = tube.is_inside_tube(&tube.mean(), 1.0, 8)?;
    assert!(inside.iter().all(|i| *i ));
    let far = DMatrix::from_row_slice(1, 3, &[100.0, -100.0, 100.0]);
    assert_eq!(tube.is_inside_tube(&far, 1.0, 8)?, vec![false]);
    Ok(())
}

#[test]
fn grid_queries_are_cached_per_grid() -> anyhow::Result<()> {
    init_tracing();
    let tube = Tube::construct(&wavy(6)?, Settings::resampling(5))?;
    let g1 = Grid::mgrid(&[(-2.0, 12.0, 8), (-2.0, 5.0, 6)]);
    let g2 = Grid::mgrid(&[(-2.0, 12.0, 8), (-2.0, 5.5, 6)]);

    let a = tube.is_inside_grid(1.0, &g1)?;
    assert_eq!(a.shape, vec![8, 6]);
    let b = tube.is_inside_grid(1.0, &g2)?;
    let p = tube.evaluate_log_density(&g1)?;
    assert_eq!(tube.cached_queries(), 3);

    // The second grid answers with its own points, not the first grid's entry.
    let (pts, _) = g2.to_points();
    assert_eq!(b.values, tube.is_inside_tube(&pts, 1.0, trajtube::tube::GRID_NSAMPLES)?);

    assert_eq!(tube.is_inside_grid(1.0, &g1)?, a);
    assert_eq!(tube.evaluate_log_density(&g1)?, p);
    assert_eq!(tube.cached_queries(), 3);

    tube.is_inside_grid(2.0, &g1)?;
    assert_eq!(tube.cached_queries(), 4);

    tube.clear_cache();
    assert_eq!(tube.cached_queries(), 0);
    assert_eq!(tube.evaluate_log_density(&g1)?, p);
    Ok(())
}

#[test]
fn outline_bounds_the_slabs() -> anyhow::Result<()> {
    let tube = Tube::construct(&wavy(8)?, Settings::resampling(7))?;
    let width = 2.0;
    let bounds = tube.outline(width)?;
    assert_eq!(bounds.len(), 2);
    for cloud in tube.transition_clouds(width, 10)? {
        for row in cloud.points().row_iter() {
            for (v, (lo, hi)) in row.iter().zip(bounds.iter()) {
                assert!(v >= lo && v <= hi);
            }
        }
    }
    Ok(())
}

#[test]
fn malformed_settings_are_rejected() -> anyhow::Result<()> {
    let ens = wavy(4)?;
    let res = Tube::construct(&ens, Settings::maximum_likelihood(5, BasisKind::Bernstein, 1));
    assert!(matches!(res, Err(TubeError::Configuration(_))));
    let res = Tube::construct(&ens, Settings::resampling(1));
    assert!(matches!(res, Err(TubeError::Configuration(_))));
    let res = Tube::construct(&ens, Settings::expectation_maximization(5, BasisKind::Gaussian, 4).max_iterations(0));
    assert!(matches!(res, Err(TubeError::Configuration(_))));
    Ok(())
}

#[test]
fn sequential_executor_gives_the_same_answers() -> anyhow::Result<()> {
    let ens = wavy(8)?;
    let settings = Settings::expectation_maximization(6, BasisKind::Gaussian, 4).max_iterations(50);
    let pooled = Tube::construct(&ens, settings)?;
    let seq = Tube::construct(&ens, settings)?.with_executor(Sequential);
    assert_eq!(pooled.joint(), seq.joint());

    let grid = Grid::mgrid(&[(-2.0, 12.0, 9), (-2.0, 5.0, 7)]);
    assert_eq!(pooled.is_inside_grid(1.5, &grid)?, seq.is_inside_grid(1.5, &grid)?);
    assert_eq!(pooled.evaluate_log_density(&grid)?, seq.evaluate_log_density(&grid)?);
    Ok(())
}

#[test]
fn log_density_grid_has_no_infinities() -> anyhow::Result<()> {
    let tube = Tube::construct(&wavy(6)?, Settings::resampling(5))?;
    let grid = Grid::from_axes(vec![
        (vec![3, 1], vec![0.0, 5.0, 1e200]),
        (vec![3, 1], vec![0.0, 0.0, 0.0])
    ])?;
    let logp = tube.evaluate_log_density(&grid)?;
    assert!(logp.iter().all(|v| v.is_finite() ));
    let lo = logp.values[0].min(logp.values[1]);
    assert_eq!(logp.get(&[2, 0]), Some(&lo));

    // Density is highest near the mean path.
    let mean = tube.mean();
    let near = DMatrix::from_row_slice(1, 2, &[mean[(2, 0)], mean[(2, 1)]]);
    let off = DMatrix::from_row_slice(1, 2, &[mean[(2, 0)], mean[(2, 1)] + 3.0]);
    assert!(tube.log_density(&near)?[0] > tube.log_density(&off)?[0]);
    Ok(())
}

#[test]
fn settings_from_json() -> anyhow::Result<()> {
    let val : serde_json::Value = serde_json::from_str(
        r#"{ "ngaus" : 8, "model_type" : "EM", "basis_type" : "bernstein", "nbasis" : 5 }"#
    )?;
    let settings = Settings::from_json(&val)?;
    assert_eq!(settings, Settings::expectation_maximization(8, BasisKind::Bernstein, 5));
    Ok(())
}
