//! Folia debug harness: projects a quarter circle onto the unit-circle
//! manifold and traces every subdivision decision.
//!
//! Usage:
//! ```text
//! cargo run --example debug                     # summary + debug events
//! RUST_LOG=folia=trace cargo run --example debug
//! ```

use std::sync::Arc;

use folia::constraint::{
    Comparison, ConstraintSet, DifferentiableFunction, ImplicitConstraint, SolverParams,
};
use folia::math::{Configuration, Interval, Matrix, Vector};
use folia::metric::{Distance, WeightedDistance};
use folia::path::Path;
use folia::projection::{PathProjector, RecursiveHermite, SubdivisionParams};
use folia::space::ConfigSpace;
use folia::steering::HermiteSteering;

/// Unit circle in the plane, the smallest interesting constraint manifold.
#[derive(Debug)]
struct UnitCircle;

impl DifferentiableFunction for UnitCircle {
    fn name(&self) -> &str {
        "unit-circle"
    }

    fn output_size(&self) -> usize {
        1
    }

    fn value(&self, q: &Configuration) -> Vector {
        Vector::from_vec(vec![q[0] * q[0] + q[1] * q[1] - 1.0])
    }

    fn jacobian(&self, q: &Configuration) -> Matrix {
        Matrix::from_fn(1, 2, |_, c| 2.0 * q[c])
    }
}

fn main() -> Result<(), folia::FoliaError> {
    // Default: WARN for everything, DEBUG for folia.
    // Override with RUST_LOG env var (e.g. RUST_LOG=folia=trace).
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into())
        .add_directive("folia=debug".parse().unwrap_or_default());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let space = Arc::new(ConfigSpace::euclidean(2));
    let mut set = ConstraintSet::with_params(
        Arc::clone(&space),
        SolverParams {
            error_threshold: 0.02,
            ..SolverParams::default()
        },
    );
    set.add(ImplicitConstraint::new(
        Arc::new(UnitCircle),
        Comparison::EqualToZero,
    ))?;

    let path = Path::hermite(
        Arc::clone(&space),
        Configuration::from_vec(vec![1.0, 0.0]),
        Configuration::from_vec(vec![0.0, 1.0]),
        Interval::new(0.0, 1.0),
        Some(set),
    );

    let projector = RecursiveHermite::new(
        Arc::clone(&space),
        Box::new(WeightedDistance::uniform(Arc::clone(&space))),
        Box::new(HermiteSteering::new(Arc::clone(&space), None)),
        SubdivisionParams::default(),
    )?;

    let projected = projector.apply(&path)?;
    let complete = projected.is_complete();
    let out = projected.into_path();
    println!(
        "projection {} over {:?}",
        if complete { "complete" } else { "truncated" },
        out.time_range(),
    );

    if let Some(sequence) = out.as_sequence() {
        let metric = WeightedDistance::uniform(Arc::clone(&space));
        for (rank, piece) in sequence.pieces().iter().enumerate() {
            println!(
                "  piece {rank:2}: {:?}  d = {:.4}",
                piece.time_range(),
                metric.distance(piece.initial(), piece.end()),
            );
        }
    }

    let range = out.time_range();
    for step in 0..=8 {
        let t = range.start + range.length() * f64::from(step) / 8.0;
        let q = out.eval(t)?;
        println!("  t = {t:.3}  |q| - 1 = {:+.2e}", q.norm() - 1.0);
    }
    Ok(())
}
