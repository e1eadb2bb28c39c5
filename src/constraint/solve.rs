use tracing::debug;

use crate::math::{Configuration, Vector};

use super::{ConstraintSet, LineSearch};

/// Threshold under which singular values are treated as zero when solving
/// the (possibly rank-deficient) Newton system.
const SVD_EPS: f64 = 1e-10;

const BACKTRACK_TRIALS: usize = 6;

const FIXED_ALPHA_INIT: f64 = 0.2;
const FIXED_ALPHA_MAX: f64 = 0.95;
const FIXED_K: f64 = 0.8;

const ENB_ALPHA_MIN: f64 = 0.2;
const ENB_C: f64 = 0.5 * (1.0 + ENB_ALPHA_MIN);
const ENB_K: f64 = 0.5 * (1.0 - ENB_ALPHA_MIN);
const ENB_A: f64 = 4.0;
const ENB_B: f64 = -2.0;

/// Outcome of a Newton projection.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionResult {
    /// Whether the residual satisfied the error threshold.
    pub converged: bool,
    /// Newton iterations taken.
    pub iterations: usize,
    /// Final stacked residual norm.
    pub residual_norm: f64,
}

struct LineSearchState {
    policy: LineSearch,
    alpha: f64,
    previous_norm: Option<f64>,
}

impl LineSearchState {
    fn new(policy: LineSearch) -> Self {
        Self {
            policy,
            alpha: FIXED_ALPHA_INIT,
            previous_norm: None,
        }
    }

    /// Next scale of the predetermined growing sequence.
    fn next_fixed(&mut self) -> f64 {
        let alpha = self.alpha;
        self.alpha = FIXED_ALPHA_MAX - FIXED_K * (FIXED_ALPHA_MAX - self.alpha);
        alpha
    }

    /// Scale derived from the residual-norm ratio between consecutive
    /// iterates: close to a full step while converging fast, close to
    /// `ENB_ALPHA_MIN` when stalled.
    fn error_norm_alpha(&mut self, current_norm: f64) -> f64 {
        let ratio = match self.previous_norm {
            Some(prev) if prev > 0.0 => current_norm / prev,
            Some(_) => 1.0,
            None => 0.0,
        };
        self.previous_norm = Some(current_norm);
        ENB_C - ENB_K * (ENB_A * ratio + ENB_B).tanh()
    }
}

impl ConstraintSet {
    /// Projects `q` onto the constraint manifold by Newton-Raphson.
    ///
    /// Locked values are written first; the iteration then solves the
    /// reduced system through an SVD pseudo-inverse and integrates scaled
    /// steps on the configuration space. Non-convergence is reported in the
    /// result, not as an error.
    pub fn solve(&self, q: &mut Configuration) -> ProjectionResult {
        self.solve_impl(q, None)
    }

    /// Like [`solve`](Self::solve), with time-varying right-hand sides
    /// resolved at parameter `s`. Stored right-hand sides are not mutated.
    pub fn solve_at(&self, q: &mut Configuration, s: f64) -> ProjectionResult {
        self.solve_impl(q, Some(s))
    }

    fn solve_impl(&self, q: &mut Configuration, s: Option<f64>) -> ProjectionResult {
        self.apply_locked(q);
        if self.dimension() == 0 {
            return ProjectionResult {
                converged: true,
                iterations: 0,
                residual_norm: 0.0,
            };
        }
        let threshold = self.params().error_threshold;
        let (mut residual, mut jacobian) = self.compute_value_and_jacobian(q, s);
        let mut norm = residual.norm();
        if norm < threshold {
            return ProjectionResult {
                converged: true,
                iterations: 0,
                residual_norm: norm,
            };
        }

        let mut search = LineSearchState::new(self.params().line_search);
        for iteration in 1..=self.params().max_iterations {
            let svd = jacobian.clone().svd(true, true);
            let mut negated = residual.clone();
            negated.neg_mut();
            let step = match svd.solve(&negated, SVD_EPS) {
                Ok(step) => step,
                Err(_) => unreachable!("SVD factors were requested"),
            };
            let alpha = match search.policy {
                LineSearch::Constant => 1.0,
                LineSearch::FixedSequence => search.next_fixed(),
                LineSearch::ErrorNormBased => search.error_norm_alpha(norm),
                LineSearch::Backtracking => self.backtrack(q, &step, norm, s),
            };
            let dq = self.uncompress_vector(&step.scale(alpha));
            *q = self.space().integrate(q, &dq);

            let (r, j) = self.compute_value_and_jacobian(q, s);
            residual = r;
            jacobian = j;
            norm = residual.norm();
            if norm < threshold {
                return ProjectionResult {
                    converged: true,
                    iterations: iteration,
                    residual_norm: norm,
                };
            }
        }
        debug!(
            iterations = self.params().max_iterations,
            residual_norm = norm,
            "projection did not converge"
        );
        ProjectionResult {
            converged: false,
            iterations: self.params().max_iterations,
            residual_norm: norm,
        }
    }

    /// Halves the step until the post-step residual norm decreases,
    /// keeping the last candidate when every trial fails.
    fn backtrack(&self, q: &Configuration, step: &Vector, current_norm: f64, s: Option<f64>) -> f64 {
        let mut alpha = 1.0;
        for _ in 0..BACKTRACK_TRIALS {
            let dq = self.uncompress_vector(&step.scale(alpha));
            let trial = self.space().integrate(q, &dq);
            if self.residual_at(&trial, s).norm() < current_norm {
                return alpha;
            }
            alpha *= 0.5;
        }
        alpha
    }

    /// Removes from `velocity` its component in the row space of the
    /// reduced Jacobian at `from` (the map `v - J^+ J v`). The result lies
    /// in the tangent space of the constraint manifold, with zeros at
    /// locked coordinates.
    #[must_use]
    pub fn project_vector_on_kernel(&self, from: &Configuration, velocity: &Vector) -> Vector {
        if self.dimension() == 0 {
            return velocity.clone();
        }
        let (_, jacobian) = self.compute_value_and_jacobian(from, None);
        let reduced = self.compress_vector(velocity);
        let image = &jacobian * &reduced;
        let svd = jacobian.svd(true, true);
        let correction = match svd.solve(&image, SVD_EPS) {
            Ok(correction) => correction,
            Err(_) => unreachable!("SVD factors were requested"),
        };
        self.uncompress_vector(&(reduced - correction))
    }

    /// Projects `to` onto the tangent plane of the constraint manifold at
    /// `from`.
    #[must_use]
    pub fn project_on_kernel(&self, from: &Configuration, to: &Configuration) -> Configuration {
        let v = self.space().difference(to, from);
        let kernel = self.project_vector_on_kernel(from, &v);
        self.space().integrate(from, &kernel)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::constraint::{
        Comparison, DifferentiableFunction, ImplicitConstraint, LockedDof, RhsFunction,
        SolverParams,
    };
    use crate::math::Matrix;
    use crate::space::ConfigSpace;

    /// f(q) = x^2 + y^2 - 1, the unit circle in the plane.
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

    /// Constant nonzero residual with a zero gradient: Newton cannot make
    /// progress on it.
    #[derive(Debug)]
    struct StuckFn;

    impl DifferentiableFunction for StuckFn {
        fn name(&self) -> &str {
            "stuck"
        }

        fn output_size(&self) -> usize {
            1
        }

        fn value(&self, _q: &Configuration) -> Vector {
            Vector::from_vec(vec![1.0])
        }

        fn jacobian(&self, _q: &Configuration) -> Matrix {
            Matrix::zeros(1, 2)
        }
    }

    #[derive(Debug)]
    struct PlaneFn {
        normal: Vector,
        offset: f64,
    }

    impl DifferentiableFunction for PlaneFn {
        fn name(&self) -> &str {
            "plane"
        }

        fn output_size(&self) -> usize {
            1
        }

        fn value(&self, q: &Configuration) -> Vector {
            Vector::from_vec(vec![self.normal.dot(q) - self.offset])
        }

        fn jacobian(&self, _q: &Configuration) -> Matrix {
            Matrix::from_fn(1, self.normal.len(), |_, c| self.normal[c])
        }
    }

    #[derive(Debug)]
    struct IdentityRhs;

    impl RhsFunction for IdentityRhs {
        fn rhs_at(&self, s: f64) -> Vector {
            Vector::from_vec(vec![s])
        }
    }

    fn circle_set(line_search: LineSearch) -> ConstraintSet {
        let mut set = ConstraintSet::with_params(
            Arc::new(ConfigSpace::euclidean(2)),
            SolverParams {
                line_search,
                ..SolverParams::default()
            },
        );
        set.add(ImplicitConstraint::new(
            Arc::new(UnitCircleFn),
            Comparison::EqualToZero,
        ))
        .unwrap();
        set
    }

    #[test]
    fn every_line_search_converges_on_the_circle() {
        for policy in [
            LineSearch::Backtracking,
            LineSearch::ErrorNormBased,
            LineSearch::FixedSequence,
            LineSearch::Constant,
        ] {
            let set = circle_set(policy);
            let mut q = Configuration::from_vec(vec![2.0, 0.0]);
            let result = set.solve(&mut q);
            assert!(result.converged, "{policy:?} did not converge");
            assert!(result.residual_norm < set.error_threshold());
            assert!((q[0] - 1.0).abs() < 1e-2, "{policy:?}: q={q}");
        }
    }

    #[test]
    fn configuration_near_manifold_needs_zero_iterations() {
        let mut set = circle_set(LineSearch::FixedSequence);
        set.set_params(SolverParams {
            error_threshold: 1e-6,
            ..set.params()
        });
        let mut q = Configuration::from_vec(vec![1.0 + 1e-8, 0.0]);
        let result = set.solve(&mut q);
        assert!(result.converged);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn locked_dof_is_pinned_through_the_solve() {
        let mut set = circle_set(LineSearch::FixedSequence);
        set.lock_dof(LockedDof {
            index: 1,
            value: 0.5,
        })
        .unwrap();
        let mut q = Configuration::from_vec(vec![2.0, 0.3]);
        let result = set.solve(&mut q);
        assert!(result.converged);
        assert!((q[1] - 0.5).abs() < 1e-12, "locked coordinate moved");
        assert!((q[0] - 0.75_f64.sqrt()).abs() < 1e-3, "q={q}");
    }

    #[test]
    fn stuck_function_exhausts_iterations() {
        let mut set = ConstraintSet::new(Arc::new(ConfigSpace::euclidean(2)));
        set.add(ImplicitConstraint::new(
            Arc::new(StuckFn),
            Comparison::EqualToZero,
        ))
        .unwrap();
        let mut q = Configuration::from_vec(vec![0.0, 0.0]);
        let result = set.solve(&mut q);
        assert!(!result.converged);
        assert_eq!(result.iterations, set.params().max_iterations);
        assert!((result.residual_norm - 1.0).abs() < 1e-12);
    }

    #[test]
    fn solve_at_resolves_rhs_without_mutating_it() {
        let mut set = ConstraintSet::new(Arc::new(ConfigSpace::euclidean(2)));
        let id = set
            .add(
                ImplicitConstraint::new(
                    Arc::new(PlaneFn {
                        normal: Vector::from_vec(vec![1.0, 0.0]),
                        offset: 0.0,
                    }),
                    Comparison::Equality,
                )
                .with_rhs_source(Arc::new(IdentityRhs)),
            )
            .unwrap();
        let mut q = Configuration::from_vec(vec![0.0, 0.7]);
        let result = set.solve_at(&mut q, 3.0);
        assert!(result.converged);
        assert!((q[0] - 3.0).abs() < 1e-3, "q={q}");
        assert!(
            set.constraint(id).unwrap().rhs()[0].abs() < 1e-12,
            "stored right-hand side must stay untouched"
        );
    }

    #[test]
    fn kernel_projection_removes_normal_component() {
        let mut set = ConstraintSet::new(Arc::new(ConfigSpace::euclidean(2)));
        set.add(ImplicitConstraint::new(
            Arc::new(PlaneFn {
                normal: Vector::from_vec(vec![1.0, 1.0]),
                offset: 0.0,
            }),
            Comparison::EqualToZero,
        ))
        .unwrap();
        let from = Configuration::from_vec(vec![0.0, 0.0]);
        let v = Vector::from_vec(vec![1.0, 0.0]);
        let projected = set.project_vector_on_kernel(&from, &v);
        assert!((projected[0] - 0.5).abs() < 1e-9);
        assert!((projected[1] + 0.5).abs() < 1e-9);

        let to = Configuration::from_vec(vec![2.0, 0.0]);
        let on_tangent = set.project_on_kernel(&from, &to);
        assert!((on_tangent[0] - 1.0).abs() < 1e-9);
        assert!((on_tangent[1] + 1.0).abs() < 1e-9);
    }
}
