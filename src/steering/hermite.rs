use std::sync::Arc;

use crate::constraint::ConstraintSet;
use crate::error::Result;
use crate::math::{Configuration, Interval};
use crate::path::Path;
use crate::space::ConfigSpace;

use super::SteeringMethod;

/// Steers with cubic Hermite curves over the unit interval, boundary
/// velocities projected on the constraint tangent space.
#[derive(Debug)]
pub struct HermiteSteering {
    space: Arc<ConfigSpace>,
    constraints: Option<ConstraintSet>,
}

impl HermiteSteering {
    #[must_use]
    pub fn new(space: Arc<ConfigSpace>, constraints: Option<ConstraintSet>) -> Self {
        Self { space, constraints }
    }
}

impl SteeringMethod for HermiteSteering {
    fn steer(&self, q1: &Configuration, q2: &Configuration) -> Result<Path> {
        self.steer_over(q1, q2, Interval::new(0.0, 1.0))
    }

    fn steer_over(
        &self,
        q1: &Configuration,
        q2: &Configuration,
        interval: Interval,
    ) -> Result<Path> {
        let mut path = Path::hermite(
            Arc::clone(&self.space),
            q1.clone(),
            q2.clone(),
            interval,
            self.constraints.clone(),
        );
        // Fill the length cache while the control points are hot.
        if let Some(hermite) = path.as_hermite_mut() {
            hermite.hermite_length();
        }
        Ok(path)
    }

    fn produces_hermite(&self) -> bool {
        true
    }

    fn with_constraints(&self, constraints: Option<ConstraintSet>) -> Box<dyn SteeringMethod> {
        Box::new(Self {
            space: Arc::clone(&self.space),
            constraints,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::constraint::{Comparison, DifferentiableFunction, ImplicitConstraint};
    use crate::math::{Matrix, Vector};

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

    #[test]
    fn steers_a_unit_range_hermite() {
        let sm = HermiteSteering::new(space2(), None);
        let path = sm
            .steer(
                &Configuration::from_vec(vec![0.0, 0.0]),
                &Configuration::from_vec(vec![3.0, 0.0]),
            )
            .unwrap();
        assert!(path.time_range().approx_eq(&Interval::new(0.0, 1.0)));
        let hermite = path.as_hermite().unwrap();
        let v0 = hermite.v0();
        assert!((v0[0] - 3.0).abs() < TOL, "v0={v0}");
        assert!(
            hermite.cached_hermite_length().is_some(),
            "length must be precomputed"
        );
        assert!(sm.produces_hermite());
    }

    #[test]
    fn steer_over_keeps_the_interval() {
        let sm = HermiteSteering::new(space2(), None);
        let path = sm
            .steer_over(
                &Configuration::from_vec(vec![0.0, 0.0]),
                &Configuration::from_vec(vec![3.0, 0.0]),
                Interval::new(2.0, 4.0),
            )
            .unwrap();
        assert!(path.time_range().approx_eq(&Interval::new(2.0, 4.0)));
        let v0 = path.as_hermite().unwrap().v0();
        assert!((v0[0] - 1.5).abs() < TOL, "v0={v0}");
    }

    #[test]
    fn rebinding_projects_boundary_velocities() {
        let mut set = ConstraintSet::new(space2());
        set.add(ImplicitConstraint::new(
            Arc::new(UnitCircleFn),
            Comparison::EqualToZero,
        ))
        .unwrap();
        let sm = HermiteSteering::new(space2(), None);
        let bound = sm.with_constraints(Some(set));
        let path = bound
            .steer(
                &Configuration::from_vec(vec![1.0, 0.0]),
                &Configuration::from_vec(vec![0.0, 1.0]),
            )
            .unwrap();
        // At (1, 0) the tangent space of the circle is vertical.
        let v0 = path.as_hermite().unwrap().v0();
        assert!(v0[0].abs() < TOL, "v0={v0}");
        assert!((v0[1] - 1.0).abs() < TOL, "v0={v0}");
    }
}
