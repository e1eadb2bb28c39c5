mod set;
mod solve;

pub use set::ConstraintSet;
pub use solve::ProjectionResult;

use std::fmt;
use std::sync::Arc;

use crate::error::{ConstraintError, Result};
use crate::math::{Configuration, Matrix, Vector};

slotmap::new_key_type! {
    /// Unique identifier for a constraint within a [`ConstraintSet`].
    pub struct ConstraintId;
}

/// A differentiable map from configuration space to `R^m`.
///
/// Implementations provide the residual function and its Jacobian with
/// respect to the tangent space (columns = `nv` of the space the constraint
/// is used on).
pub trait DifferentiableFunction: fmt::Debug {
    /// Human-readable name, used in logs and error messages.
    fn name(&self) -> &str;

    /// Number of output rows `m`.
    fn output_size(&self) -> usize;

    /// Evaluates the function at `q`.
    fn value(&self, q: &Configuration) -> Vector;

    /// Evaluates the Jacobian at `q` (`output_size` rows, `nv` columns).
    fn jacobian(&self, q: &Configuration) -> Matrix;
}

/// A time-varying right-hand side for a parameterizable constraint.
pub trait RhsFunction: fmt::Debug {
    /// Right-hand side at evaluation parameter `s`.
    fn rhs_at(&self, s: f64) -> Vector;
}

/// How a function's value is compared against its right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `f(q) = 0`; the right-hand side is fixed at zero.
    EqualToZero,
    /// `f(q) = rhs` for a mutable `rhs`; selects the active leaf of the
    /// foliation the function defines.
    Equality,
    /// `f(q) <= rhs`; contributes error only when violated.
    Inferior,
    /// `f(q) >= rhs`; contributes error only when violated.
    Superior,
}

impl Comparison {
    /// Whether this comparison carries a mutable right-hand side.
    #[must_use]
    pub fn is_parametric(self) -> bool {
        matches!(self, Comparison::Equality)
    }
}

/// An implicit numerical constraint: a differentiable function, a comparison
/// kind and the active right-hand side.
#[derive(Debug, Clone)]
pub struct ImplicitConstraint {
    function: Arc<dyn DifferentiableFunction>,
    comparison: Comparison,
    rhs: Vector,
    rhs_source: Option<Arc<dyn RhsFunction>>,
    passive_dofs: Vec<usize>,
}

impl ImplicitConstraint {
    /// Creates a constraint with a zero right-hand side.
    #[must_use]
    pub fn new(function: Arc<dyn DifferentiableFunction>, comparison: Comparison) -> Self {
        let rhs = Vector::zeros(function.output_size());
        Self {
            function,
            comparison,
            rhs,
            rhs_source: None,
            passive_dofs: Vec::new(),
        }
    }

    /// Declares tangent coordinates the constraint does not act on. Their
    /// Jacobian columns are zeroed in the reduced system.
    #[must_use]
    pub fn with_passive_dofs(mut self, dofs: Vec<usize>) -> Self {
        self.passive_dofs = dofs;
        self
    }

    /// Attaches a time-varying right-hand side source.
    #[must_use]
    pub fn with_rhs_source(mut self, source: Arc<dyn RhsFunction>) -> Self {
        self.rhs_source = Some(source);
        self
    }

    /// Sets the stored right-hand side.
    ///
    /// # Errors
    ///
    /// Returns an error if the constraint is not an equality (only equality
    /// constraints carry a mutable leaf parameter) or if the dimension does
    /// not match the function output.
    pub fn set_rhs(&mut self, rhs: Vector) -> Result<()> {
        if !self.comparison.is_parametric() {
            return Err(ConstraintError::RhsNotParametric {
                name: self.function.name().to_owned(),
            }
            .into());
        }
        if rhs.len() != self.function.output_size() {
            return Err(ConstraintError::RhsDimensionMismatch {
                name: self.function.name().to_owned(),
                expected: self.function.output_size(),
                got: rhs.len(),
            }
            .into());
        }
        self.rhs = rhs;
        Ok(())
    }

    /// The wrapped function.
    #[must_use]
    pub fn function(&self) -> &Arc<dyn DifferentiableFunction> {
        &self.function
    }

    /// The comparison kind.
    #[must_use]
    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    /// The stored right-hand side.
    #[must_use]
    pub fn rhs(&self) -> &Vector {
        &self.rhs
    }

    /// Passive tangent coordinates.
    #[must_use]
    pub fn passive_dofs(&self) -> &[usize] {
        &self.passive_dofs
    }

    /// Resolves the right-hand side for evaluation parameter `s`.
    ///
    /// Falls back to the stored value when no source is attached or no
    /// parameter is supplied. Stored state is never mutated.
    fn resolved_rhs(&self, s: Option<f64>) -> Vector {
        match (s, &self.rhs_source) {
            (Some(s), Some(source)) if self.comparison.is_parametric() => source.rhs_at(s),
            _ => self.rhs.clone(),
        }
    }

    /// Records the foliation leaf passing through `q`: sets the right-hand
    /// side so that `q` satisfies the constraint exactly. A no-op for
    /// non-parametric comparisons.
    pub(crate) fn record_leaf(&mut self, q: &Configuration) {
        if self.comparison.is_parametric() {
            self.rhs = self.function.value(q);
        }
    }

    /// Comparison-adjusted residual at `q`, with the right-hand side
    /// resolved at `s` when available.
    pub(crate) fn residual_at(&self, q: &Configuration, s: Option<f64>) -> Vector {
        let value = self.function.value(q);
        match self.comparison {
            Comparison::EqualToZero => value,
            Comparison::Equality => value - self.resolved_rhs(s),
            Comparison::Inferior => (value - self.resolved_rhs(s)).map(|x| x.max(0.0)),
            Comparison::Superior => (value - self.resolved_rhs(s)).map(|x| x.min(0.0)),
        }
    }
}

/// A degree of freedom pinned to a fixed value by an explicit constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockedDof {
    /// Tangent-space index of the locked coordinate.
    pub index: usize,
    /// Locked value: the configuration coordinate itself for Euclidean
    /// segments, the angle for circle segments.
    pub value: f64,
}

/// Step-scaling policy for the Newton iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineSearch {
    /// Halve the step until the residual norm decreases.
    Backtracking,
    /// Scale from the ratio of consecutive residual norms.
    ErrorNormBased,
    /// Predetermined growing sequence of step scales.
    #[default]
    FixedSequence,
    /// Always take the full Newton step.
    Constant,
}

/// Parameters of the Newton-Raphson projector.
#[derive(Debug, Clone, Copy)]
pub struct SolverParams {
    /// Residual norm below which the constraint stack counts as satisfied.
    pub error_threshold: f64,
    /// Maximum Newton iterations per solve.
    pub max_iterations: usize,
    /// Step-scaling policy.
    pub line_search: LineSearch,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            error_threshold: 1e-4,
            max_iterations: 40,
            line_search: LineSearch::default(),
        }
    }
}
