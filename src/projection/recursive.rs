use std::sync::Arc;

use tracing::debug;

use crate::error::{FoliaError, ProjectionError, Result, SubdivisionError};
use crate::math::{Interval, TOLERANCE};
use crate::metric::Distance;
use crate::path::Path;
use crate::space::ConfigSpace;
use crate::steering::SteeringMethod;

use super::{PathProjector, Projected};

/// Tuning knobs of the recursive subdivision.
#[derive(Debug, Clone, Copy)]
pub struct SubdivisionParams {
    /// Growth bound `M`; pieces are accepted below
    /// `2 * error_threshold / M`.
    pub growth_bound: f64,
    /// Contraction ratio of the stopping rule, after "Fast Interpolation
    /// and Time-Optimization on Implicit Contact Submanifolds"
    /// (K. Hauser, RSS 2013). Must lie in `[0.5, 1]`.
    pub beta: f64,
    /// Ceiling on subdivision nodes processed per projection run.
    pub node_budget: usize,
}

impl Default for SubdivisionParams {
    fn default() -> Self {
        Self {
            growth_bound: 2.0,
            beta: 0.9,
            node_budget: 4096,
        }
    }
}

enum WorkItem {
    Piece(Path),
    /// Marks a right sibling whose length broke the contraction bound;
    /// popping it fails the branch after the left subtree has been
    /// emitted.
    Stop,
}

/// Projects paths on their constraint manifold by recursive bisection of
/// cubic Hermite pieces: a piece whose control-polygon length falls below
/// the acceptance threshold is provably within the error bound, anything
/// longer is split at its midpoint until the lengths stop contracting.
#[derive(Debug)]
pub struct RecursiveHermite {
    space: Arc<ConfigSpace>,
    distance: Box<dyn Distance>,
    steering: Box<dyn SteeringMethod>,
    params: SubdivisionParams,
}

impl RecursiveHermite {
    /// Creates a projector around a Hermite-producing steering method.
    /// The method is stored with its constraints cleared; every run
    /// rebinds the input path's own set.
    ///
    /// # Errors
    ///
    /// Fails when `beta` is outside `[0.5, 1]` or the steering method
    /// does not produce Hermite paths.
    pub fn new(
        space: Arc<ConfigSpace>,
        distance: Box<dyn Distance>,
        steering: Box<dyn SteeringMethod>,
        params: SubdivisionParams,
    ) -> Result<Self> {
        if !(0.5..=1.0).contains(&params.beta) {
            return Err(SubdivisionError::BetaOutOfRange { beta: params.beta }.into());
        }
        if !steering.produces_hermite() {
            return Err(SubdivisionError::NotHermiteSteering.into());
        }
        Ok(Self {
            space,
            distance,
            steering: steering.with_constraints(None),
            params,
        })
    }

    #[must_use]
    pub fn params(&self) -> SubdivisionParams {
        self.params
    }

    fn apply_impl(&self, path: &Path) -> Result<Projected> {
        if let Some(sequence) = path.as_sequence() {
            return self.apply_sequence(sequence.pieces());
        }
        match path.constraints() {
            Some(set) if set.dimension() > 0 => self.project(path),
            _ => Ok(Projected::Complete(path.clone())),
        }
    }

    fn apply_sequence(&self, pieces: &[Path]) -> Result<Projected> {
        let mut prefix = Vec::with_capacity(pieces.len());
        for (rank, piece) in pieces.iter().enumerate() {
            match self.apply_impl(piece) {
                Ok(Projected::Complete(projected)) => prefix.push(projected),
                Ok(Projected::Truncated(partial)) => {
                    // A degenerate partial is only worth keeping when
                    // nothing was produced before it.
                    if partial.length() > 0.0 || rank == 0 {
                        prefix.push(partial);
                    }
                    return Ok(Projected::Truncated(Path::from_sequence(prefix)?));
                }
                Err(err) => {
                    if prefix.is_empty() || is_budget_error(&err) {
                        return Err(err);
                    }
                    return Ok(Projected::Truncated(Path::from_sequence(prefix)?));
                }
            }
        }
        Ok(Projected::Complete(Path::from_sequence(prefix)?))
    }

    fn project(&self, path: &Path) -> Result<Projected> {
        let Some(set) = path.constraints() else {
            return Ok(Projected::Complete(path.clone()));
        };
        if set.dimension() == 0 {
            return Ok(Projected::Complete(path.clone()));
        }
        // No subdivision can repair an end configuration off its leaf.
        let end = path.end();
        if !set.is_satisfied(end) {
            let residual = set.residual(end);
            let residual_norm = residual.norm();
            return Err(ProjectionError::EndpointViolation {
                endpoint: "end",
                configuration: end.clone(),
                residual,
                residual_norm,
            }
            .into());
        }
        let bound = self.steering.with_constraints(Some(set.clone()));
        let threshold = 2.0 * set.error_threshold() / self.params.growth_bound;

        let mut pieces: Vec<Path> = Vec::new();
        let mut nodes = 0usize;
        let mut complete = true;
        for mut candidate in self.candidates(path, &*bound)? {
            let length = match candidate.as_hermite_mut() {
                Some(hermite) => hermite.hermite_length(),
                None => unreachable!("steering method declared Hermite output"),
            };
            if length < threshold {
                pieces.push(candidate);
                continue;
            }
            if !self.subdivide(&*bound, candidate, threshold, &mut pieces, &mut nodes)? {
                complete = false;
                break;
            }
        }
        self.log_statistics(&pieces);
        if complete {
            return Ok(Projected::Complete(Path::from_sequence(pieces)?));
        }
        let tmin = path.time_range().start;
        let partial = match pieces.len() {
            0 => path.extract(Interval::new(tmin, tmin))?,
            1 => pieces.remove(0),
            _ => Path::from_sequence(pieces)?,
        };
        Ok(Projected::Truncated(partial))
    }

    /// Hermite pieces to subdivide: the path itself when it already is
    /// one, or a steered piece per waypoint pair for interpolated input.
    /// Anything else becomes a single steered piece between the endpoints.
    fn candidates(&self, path: &Path, bound: &dyn SteeringMethod) -> Result<Vec<Path>> {
        if path.time_param().is_none() {
            if path.as_hermite().is_some() {
                return Ok(vec![path.clone()]);
            }
            if let Some(interpolated) = path.as_interpolated() {
                let waypoints = interpolated.waypoints();
                let mut out = Vec::with_capacity(waypoints.len().saturating_sub(1));
                for pair in waypoints.windows(2) {
                    let (t0, q0) = &pair[0];
                    let (t1, q1) = &pair[1];
                    out.push(bound.steer_over(q0, q1, Interval::new(*t0, *t1))?);
                }
                return Ok(out);
            }
        }
        Ok(vec![bound.steer_over(
            path.initial(),
            path.end(),
            path.time_range(),
        )?])
    }

    /// Depth-first bisection over an explicit work stack. Returns whether
    /// the whole piece was reduced to accepted leaves; leaves are appended
    /// to `out` in increasing time order.
    fn subdivide(
        &self,
        bound: &dyn SteeringMethod,
        root: Path,
        accept_thr: f64,
        out: &mut Vec<Path>,
        nodes: &mut usize,
    ) -> Result<bool> {
        let mut stack = vec![WorkItem::Piece(root)];
        while let Some(item) = stack.pop() {
            let WorkItem::Piece(mut piece) = item else {
                return Ok(false);
            };
            *nodes += 1;
            if *nodes > self.params.node_budget {
                return Err(SubdivisionError::NodeBudgetExceeded {
                    budget: self.params.node_budget,
                }
                .into());
            }
            let parent_length = match piece.as_hermite_mut() {
                Some(hermite) => hermite.hermite_length(),
                None => unreachable!("steering method declared Hermite output"),
            };
            if parent_length < accept_thr {
                out.push(piece);
                continue;
            }

            let range = piece.time_range();
            let half = range.start + piece.length() / 2.0;
            let q_half = match piece.eval(half) {
                Ok(q) => q,
                Err(FoliaError::Projection(ProjectionError::NotConverged {
                    iterations,
                    residual_norm,
                })) => {
                    debug!(
                        iterations,
                        residual_norm, "stopped: midpoint does not project"
                    );
                    return Ok(false);
                }
                Err(other) => return Err(other),
            };
            let Some(parent) = piece.as_hermite() else {
                unreachable!("kind checked above")
            };
            let v_half = parent.velocity(half);
            let v0 = parent.v0();
            let v1 = parent.v1();
            let q0 = parent.init().clone();
            let q2 = parent.end().clone();

            let mut left = bound.steer_over(&q0, &q_half, Interval::new(range.start, half))?;
            let left_length = match left.as_hermite_mut() {
                Some(hermite) => {
                    hermite.set_v0(&v0);
                    hermite.set_v1(&v_half);
                    hermite.hermite_length()
                }
                None => unreachable!("steering method declared Hermite output"),
            };
            let mut right = bound.steer_over(&q_half, &q2, Interval::new(half, range.end))?;
            let right_length = match right.as_hermite_mut() {
                Some(hermite) => {
                    hermite.set_v0(&v_half);
                    hermite.set_v1(&v1);
                    hermite.hermite_length()
                }
                None => unreachable!("steering method declared Hermite output"),
            };

            let stop_thr = self.params.beta * parent_length;
            // This is the inverse of the condition in the RSS paper. Is
            // there a typo in the paper?
            let left_stop = left_length > stop_thr;
            let right_stop = right_length > stop_thr;
            if left_stop || right_stop {
                debug!(
                    parent = parent_length,
                    beta = self.params.beta,
                    left = left_length,
                    right = right_length,
                    "contraction bound broken"
                );
            }
            if left_stop {
                return Ok(false);
            }
            if right_stop {
                stack.push(WorkItem::Stop);
            } else {
                stack.push(WorkItem::Piece(right));
            }
            stack.push(WorkItem::Piece(left));
        }
        Ok(true)
    }

    #[allow(clippy::cast_precision_loss)]
    fn log_statistics(&self, pieces: &[Path]) {
        if pieces.is_empty() {
            return;
        }
        let mut min = f64::INFINITY;
        let mut max: f64 = 0.0;
        let mut total = 0.0;
        for piece in pieces {
            let length = self.distance.distance(piece.initial(), piece.end());
            min = min.min(length);
            max = max.max(length);
            total += length;
        }
        debug!(
            pieces = pieces.len(),
            min,
            mean = total / pieces.len() as f64,
            max,
            "assembled Hermite pieces"
        );
    }
}

fn is_budget_error(err: &FoliaError) -> bool {
    matches!(
        err,
        FoliaError::Subdivision(SubdivisionError::NodeBudgetExceeded { .. })
    )
}

impl PathProjector for RecursiveHermite {
    fn apply(&self, path: &Path) -> Result<Projected> {
        debug_assert_eq!(
            path.space().nq(),
            self.space.nq(),
            "path space does not match the projector space"
        );
        let projected = self.apply_impl(path)?;
        debug_assert!(
            self.space
                .difference(projected.path().initial(), path.initial())
                .norm()
                < TOLERANCE,
            "projection must preserve the initial configuration"
        );
        debug_assert!(
            !projected.is_complete()
                || self
                    .space
                    .difference(projected.path().end(), path.end())
                    .norm()
                    < TOLERANCE,
            "a complete projection must preserve the end configuration"
        );
        Ok(projected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::constraint::{
        Comparison, ConstraintSet, DifferentiableFunction, ImplicitConstraint, SolverParams,
    };
    use crate::math::{Configuration, Matrix, Vector};
    use crate::metric::WeightedDistance;
    use crate::steering::{HermiteSteering, StraightSteering};

    const TOL: f64 = 1e-9;

    fn space2() -> Arc<ConfigSpace> {
        Arc::new(ConfigSpace::euclidean(2))
    }

    #[derive(Debug)]
    struct UnitCircleFn;

    impl DifferentiableFunction for UnitCircleFn {
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

    fn circle_set(params: SolverParams) -> ConstraintSet {
        let mut set = ConstraintSet::with_params(space2(), params);
        set.add(ImplicitConstraint::new(
            Arc::new(UnitCircleFn),
            Comparison::EqualToZero,
        ))
        .unwrap();
        set
    }

    fn on_circle(theta: f64) -> Configuration {
        Configuration::from_vec(vec![theta.cos(), theta.sin()])
    }

    fn projector(params: SubdivisionParams) -> Result<RecursiveHermite> {
        RecursiveHermite::new(
            space2(),
            Box::new(WeightedDistance::uniform(space2())),
            Box::new(HermiteSteering::new(space2(), None)),
            params,
        )
    }

    #[test]
    fn beta_bounds_are_enforced() {
        for beta in [0.3, 1.2] {
            let err = projector(SubdivisionParams {
                beta,
                ..SubdivisionParams::default()
            })
            .unwrap_err();
            assert!(
                matches!(
                    err,
                    FoliaError::Subdivision(SubdivisionError::BetaOutOfRange { .. })
                ),
                "beta={beta}"
            );
        }
        for beta in [0.5, 1.0] {
            assert!(
                projector(SubdivisionParams {
                    beta,
                    ..SubdivisionParams::default()
                })
                .is_ok(),
                "beta={beta}"
            );
        }
    }

    #[test]
    fn straight_steering_is_rejected() {
        let err = RecursiveHermite::new(
            space2(),
            Box::new(WeightedDistance::uniform(space2())),
            Box::new(StraightSteering::new(space2(), None)),
            SubdivisionParams::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FoliaError::Subdivision(SubdivisionError::NotHermiteSteering)
        ));
    }

    #[test]
    fn unconstrained_path_passes_through() {
        let rh = projector(SubdivisionParams::default()).unwrap();
        let path = Path::straight(
            space2(),
            Configuration::from_vec(vec![0.0, 0.0]),
            Configuration::from_vec(vec![2.0, 0.0]),
            Interval::new(0.0, 2.0),
            None,
        )
        .unwrap();
        let projected = rh.apply(&path).unwrap();
        assert!(projected.is_complete());
        let out = projected.into_path();
        assert!(out.time_range().approx_eq(&path.time_range()));
        assert!((out.end() - path.end()).norm() < TOL);
    }

    #[test]
    fn quarter_circle_subdivides_into_short_pieces() {
        let rh = projector(SubdivisionParams::default()).unwrap();
        let set = circle_set(SolverParams {
            error_threshold: 0.05,
            ..SolverParams::default()
        });
        let path = Path::hermite(
            space2(),
            on_circle(0.0),
            on_circle(std::f64::consts::FRAC_PI_2),
            Interval::new(0.0, 1.0),
            Some(set),
        );
        let projected = rh.apply(&path).unwrap();
        assert!(projected.is_complete());
        let out = projected.into_path();
        let pieces = out.as_sequence().unwrap().pieces();
        assert!(pieces.len() > 1, "expected a real subdivision");
        for pair in pieces.windows(2) {
            let gap = (pair[1].initial() - pair[0].end()).norm();
            assert!(gap < TOL, "gap={gap}");
        }
        for piece in pieces {
            let length = piece.as_hermite().unwrap().cached_hermite_length();
            assert!(length.unwrap() < 0.05, "length={length:?}");
        }
        assert!((out.initial() - path.initial()).norm() < TOL);
        assert!((out.end() - path.end()).norm() < TOL);
    }

    #[test]
    fn non_projectable_midpoint_truncates_to_a_point() {
        let rh = projector(SubdivisionParams::default()).unwrap();
        // Zero iterations allowed: any interior correction fails.
        let set = circle_set(SolverParams {
            error_threshold: 1e-9,
            max_iterations: 0,
            ..SolverParams::default()
        });
        let path = Path::hermite(
            space2(),
            on_circle(0.0),
            on_circle(std::f64::consts::FRAC_PI_2),
            Interval::new(0.0, 1.0),
            Some(set),
        );
        let projected = rh.apply(&path).unwrap();
        assert!(!projected.is_complete());
        let out = projected.into_path();
        assert!(out.length() < TOL, "partial must be degenerate");
        assert!((out.initial() - path.initial()).norm() < TOL);
    }

    #[test]
    fn violating_end_is_rejected_before_subdividing() {
        let rh = projector(SubdivisionParams::default()).unwrap();
        let set = circle_set(SolverParams::default());
        let path = Path::hermite(
            space2(),
            on_circle(0.0),
            Configuration::from_vec(vec![3.0, 0.0]),
            Interval::new(0.0, 1.0),
            Some(set),
        );
        let err = rh.apply(&path).unwrap_err();
        match err {
            FoliaError::Projection(ProjectionError::EndpointViolation {
                endpoint,
                residual_norm,
                ..
            }) => {
                assert_eq!(endpoint, "end");
                assert!(residual_norm > 1.0);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn node_budget_is_a_hard_error() {
        let rh = projector(SubdivisionParams {
            node_budget: 2,
            ..SubdivisionParams::default()
        })
        .unwrap();
        let set = circle_set(SolverParams {
            error_threshold: 0.05,
            ..SolverParams::default()
        });
        let path = Path::hermite(
            space2(),
            on_circle(0.0),
            on_circle(std::f64::consts::FRAC_PI_2),
            Interval::new(0.0, 1.0),
            Some(set),
        );
        let err = rh.apply(&path).unwrap_err();
        assert!(matches!(
            err,
            FoliaError::Subdivision(SubdivisionError::NodeBudgetExceeded { budget: 2 })
        ));
    }

    #[test]
    fn sequence_keeps_the_projected_prefix() {
        let rh = projector(SubdivisionParams::default()).unwrap();
        let good = Path::hermite(
            space2(),
            on_circle(0.0),
            on_circle(0.2),
            Interval::new(0.0, 1.0),
            Some(circle_set(SolverParams {
                error_threshold: 0.3,
                ..SolverParams::default()
            })),
        );
        let bad = Path::hermite(
            space2(),
            on_circle(0.2),
            Configuration::from_vec(vec![-2.0, 0.0]),
            Interval::new(0.0, 1.0),
            Some(circle_set(SolverParams {
                error_threshold: 0.3,
                ..SolverParams::default()
            })),
        );
        let sequence = Path::from_sequence(vec![good.clone(), bad]).unwrap();
        let projected = rh.apply(&sequence).unwrap();
        assert!(!projected.is_complete());
        let out = projected.into_path();
        assert!((out.initial() - sequence.initial()).norm() < TOL);
        assert!((out.end() - good.end()).norm() < TOL);
        assert!((out.length() - 1.0).abs() < TOL);
    }

    #[test]
    fn interpolated_input_steers_one_piece_per_waypoint_pair() {
        let rh = projector(SubdivisionParams::default()).unwrap();
        let set = circle_set(SolverParams {
            error_threshold: 0.3,
            ..SolverParams::default()
        });
        let path = Path::interpolated(
            space2(),
            vec![
                (0.0, on_circle(0.0)),
                (0.5, on_circle(0.2)),
                (1.0, on_circle(0.4)),
            ],
            Some(set),
        )
        .unwrap();
        let projected = rh.apply(&path).unwrap();
        assert!(projected.is_complete());
        let out = projected.into_path();
        let pieces = out.as_sequence().unwrap().pieces();
        assert_eq!(pieces.len(), 2);
        assert!(pieces[0].time_range().approx_eq(&Interval::new(0.0, 0.5)));
        assert!(pieces[1].time_range().approx_eq(&Interval::new(0.5, 1.0)));
        assert!((out.end() - path.end()).norm() < TOL);
    }
}
