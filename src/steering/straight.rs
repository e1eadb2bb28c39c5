use std::sync::Arc;

use crate::constraint::ConstraintSet;
use crate::error::Result;
use crate::math::{Configuration, Interval};
use crate::metric::{Distance, WeightedDistance};
use crate::path::Path;
use crate::space::ConfigSpace;

use super::SteeringMethod;

/// Steers with geodesic segments; the canonical interval length is the
/// metric distance between the endpoints.
#[derive(Debug)]
pub struct StraightSteering {
    space: Arc<ConfigSpace>,
    metric: WeightedDistance,
    constraints: Option<ConstraintSet>,
}

impl StraightSteering {
    #[must_use]
    pub fn new(space: Arc<ConfigSpace>, constraints: Option<ConstraintSet>) -> Self {
        let metric = WeightedDistance::uniform(Arc::clone(&space));
        Self {
            space,
            metric,
            constraints,
        }
    }

    /// Replaces the uniform metric with a weighted one.
    #[must_use]
    pub fn with_metric(mut self, metric: WeightedDistance) -> Self {
        self.metric = metric;
        self
    }
}

impl SteeringMethod for StraightSteering {
    fn steer(&self, q1: &Configuration, q2: &Configuration) -> Result<Path> {
        let length = self.metric.distance(q1, q2);
        self.steer_over(q1, q2, Interval::new(0.0, length))
    }

    fn steer_over(
        &self,
        q1: &Configuration,
        q2: &Configuration,
        interval: Interval,
    ) -> Result<Path> {
        Path::straight(
            Arc::clone(&self.space),
            q1.clone(),
            q2.clone(),
            interval,
            self.constraints.clone(),
        )
    }

    fn with_constraints(&self, constraints: Option<ConstraintSet>) -> Box<dyn SteeringMethod> {
        Box::new(Self {
            space: Arc::clone(&self.space),
            metric: self.metric.clone(),
            constraints,
        })
    }
}
