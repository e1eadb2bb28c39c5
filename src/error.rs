use thiserror::Error;

use crate::math::{Configuration, Vector};

/// Top-level error type for the folia motion planning kernel.
#[derive(Debug, Error)]
pub enum FoliaError {
    #[error(transparent)]
    Space(#[from] SpaceError),

    #[error(transparent)]
    Constraint(#[from] ConstraintError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Subdivision(#[from] SubdivisionError),
}

/// Errors related to configuration-space data.
#[derive(Debug, Error)]
pub enum SpaceError {
    #[error("{context}: expected dimension {expected}, got {got}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Errors related to building a constraint stack.
#[derive(Debug, Error)]
pub enum ConstraintError {
    #[error("constraint not found in set")]
    ConstraintNotFound,

    #[error("degree of freedom {index} is out of range for a tangent space of dimension {nv}")]
    DofOutOfRange { index: usize, nv: usize },

    #[error("right-hand side for `{name}` has {got} rows, expected {expected}")]
    RhsDimensionMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("constraint `{name}` does not carry a mutable right-hand side")]
    RhsNotParametric { name: String },
}

/// Errors related to path evaluation and manipulation.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("derivative order {order} is not supported, only orders 1 and 2 are")]
    UnsupportedDerivativeOrder { order: usize },

    #[error("a path sequence must contain at least one piece")]
    EmptySequence,

    #[error("waypoint times must be strictly increasing")]
    UnorderedWaypoints,

    #[error("an interpolated path needs at least two waypoints, got {count}")]
    TooFewWaypoints { count: usize },
}

/// Errors raised when a configuration cannot be reconciled with constraints.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("{endpoint} configuration of path violates its constraints, residual norm {residual_norm:.3e}")]
    EndpointViolation {
        endpoint: &'static str,
        configuration: Configuration,
        residual: Vector,
        residual_norm: f64,
    },

    #[error("projection did not converge after {iterations} iterations, residual norm {residual_norm:.3e}")]
    NotConverged { iterations: usize, residual_norm: f64 },
}

/// Errors related to the recursive subdivision projector.
#[derive(Debug, Error)]
pub enum SubdivisionError {
    #[error("contraction ratio beta = {beta} is outside [0.5, 1]")]
    BetaOutOfRange { beta: f64 },

    #[error("the subdivision projector requires a Hermite-producing steering method")]
    NotHermiteSteering,

    #[error("subdivision exceeded its node budget of {budget} work items")]
    NodeBudgetExceeded { budget: usize },
}

/// Convenience type alias for results using [`FoliaError`].
pub type Result<T> = std::result::Result<T, FoliaError>;
