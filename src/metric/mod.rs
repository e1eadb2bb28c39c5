use std::fmt;
use std::sync::Arc;

use crate::error::{Result, SpaceError};
use crate::math::{Configuration, Vector};
use crate::space::ConfigSpace;

/// A distance measure between configurations.
pub trait Distance: fmt::Debug {
    /// Returns the distance between `q1` and `q2`.
    fn distance(&self, q1: &Configuration, q2: &Configuration) -> f64;
}

/// Weighted norm of the tangent-space difference between configurations.
#[derive(Debug, Clone)]
pub struct WeightedDistance {
    space: Arc<ConfigSpace>,
    weights: Vector,
}

impl WeightedDistance {
    /// Creates a distance with per-coordinate weights.
    ///
    /// # Errors
    ///
    /// Returns an error if the weight vector does not match the tangent
    /// dimension of the space.
    pub fn new(space: Arc<ConfigSpace>, weights: Vector) -> Result<Self> {
        if weights.len() != space.nv() {
            return Err(SpaceError::DimensionMismatch {
                context: "distance weights",
                expected: space.nv(),
                got: weights.len(),
            }
            .into());
        }
        Ok(Self { space, weights })
    }

    /// Creates a distance with all weights equal to one.
    #[must_use]
    pub fn uniform(space: Arc<ConfigSpace>) -> Self {
        let weights = Vector::from_element(space.nv(), 1.0);
        Self { space, weights }
    }
}

impl Distance for WeightedDistance {
    fn distance(&self, q1: &Configuration, q2: &Configuration) -> f64 {
        let diff = self.space.difference(q1, q2);
        diff.component_mul(&self.weights).norm()
    }
}
