use std::fmt;

use crate::constraint::ConstraintSet;
use crate::error::Result;
use crate::math::{Configuration, Interval};
use crate::path::Path;

mod hermite;
mod straight;

pub use hermite::HermiteSteering;
pub use straight::StraightSteering;

/// Produces candidate paths between two configurations.
///
/// A method may hold a constraint set; produced paths carry their own deep
/// copy of it. Rebinding through [`with_constraints`](Self::with_constraints)
/// returns a fresh method, so one instance can serve several projection runs
/// without shared mutable state.
pub trait SteeringMethod: fmt::Debug {
    /// Path from `q1` to `q2` over the method's canonical time interval.
    ///
    /// # Errors
    ///
    /// Fails when an endpoint violates the bound constraints, for path
    /// kinds that validate endpoints at construction.
    fn steer(&self, q1: &Configuration, q2: &Configuration) -> Result<Path>;

    /// Path from `q1` to `q2` over the given time interval.
    ///
    /// # Errors
    ///
    /// See [`steer`](Self::steer).
    fn steer_over(
        &self,
        q1: &Configuration,
        q2: &Configuration,
        interval: Interval,
    ) -> Result<Path>;

    /// Whether produced paths are cubic Hermite curves.
    fn produces_hermite(&self) -> bool {
        false
    }

    /// The same method bound to another constraint set.
    fn with_constraints(&self, constraints: Option<ConstraintSet>) -> Box<dyn SteeringMethod>;
}
