use std::sync::Arc;

use crate::constraint::ConstraintSet;
use crate::math::{Configuration, Interval, Matrix, Vector, TOLERANCE};
use crate::space::ConfigSpace;

/// Cubic in Bernstein form over four control points expressed in the
/// tangent space based at `init` (`p0 = 0`, `p3 = difference(end, init)`).
#[derive(Debug, Clone)]
pub struct HermiteData {
    space: Arc<ConfigSpace>,
    init: Configuration,
    end: Configuration,
    control: Matrix,
    interval: Interval,
    hermite_length: Option<f64>,
}

impl HermiteData {
    /// Default boundary velocities are the straight-line velocity,
    /// projected on the constraint tangent space at each endpoint when a
    /// constraint set is given.
    pub(crate) fn new(
        space: Arc<ConfigSpace>,
        init: Configuration,
        end: Configuration,
        constraints: Option<&ConstraintSet>,
        interval: Interval,
    ) -> Self {
        let to_end = space.difference(&end, &init);
        let t = interval.length();
        let straight = if t < TOLERANCE {
            Vector::zeros(space.nv())
        } else {
            to_end.unscale(t)
        };
        let (v0, v1) = match constraints {
            Some(set) => (
                set.project_vector_on_kernel(&init, &straight),
                set.project_vector_on_kernel(&end, &straight),
            ),
            None => (straight.clone(), straight),
        };
        Self::from_boundary(space, init, end, &v0, &v1, interval)
    }

    /// Cubic through `init` and `end` with prescribed boundary velocities.
    pub(crate) fn from_boundary(
        space: Arc<ConfigSpace>,
        init: Configuration,
        end: Configuration,
        v0: &Vector,
        v1: &Vector,
        interval: Interval,
    ) -> Self {
        let mut control = Matrix::zeros(4, space.nv());
        let to_end = space.difference(&end, &init);
        control.row_mut(3).copy_from(&to_end.transpose());
        let mut data = Self {
            space,
            init,
            end,
            control,
            interval,
            hermite_length: None,
        };
        data.set_v0(v0);
        data.set_v1(v1);
        data
    }

    #[must_use]
    pub fn init(&self) -> &Configuration {
        &self.init
    }

    #[must_use]
    pub fn end(&self) -> &Configuration {
        &self.end
    }

    pub(crate) fn interval(&self) -> Interval {
        self.interval
    }

    /// Start velocity in global time, `3 (p1 - p0) / T`.
    #[must_use]
    pub fn v0(&self) -> Vector {
        let t = self.interval.length();
        if t < TOLERANCE {
            return Vector::zeros(self.space.nv());
        }
        (self.control.row(1) - self.control.row(0))
            .transpose()
            .scale(3.0 / t)
    }

    /// End velocity in global time, `3 (p3 - p2) / T`.
    #[must_use]
    pub fn v1(&self) -> Vector {
        let t = self.interval.length();
        if t < TOLERANCE {
            return Vector::zeros(self.space.nv());
        }
        (self.control.row(3) - self.control.row(2))
            .transpose()
            .scale(3.0 / t)
    }

    /// Overwrites the start velocity (`p1 = p0 + v T / 3`) and drops the
    /// cached length. The rescaling by the interval length means a parent's
    /// mid-curve velocity passed to a half-interval child is halved
    /// automatically.
    pub fn set_v0(&mut self, v: &Vector) {
        let t = self.interval.length();
        let p1 = v.transpose().scale(t / 3.0);
        self.control.row_mut(1).copy_from(&p1);
        self.hermite_length = None;
    }

    /// Overwrites the end velocity (`p2 = p3 - v T / 3`) and drops the
    /// cached length.
    pub fn set_v1(&mut self, v: &Vector) {
        let t = self.interval.length();
        let p2 = self.control.row(3) - v.transpose().scale(t / 3.0);
        self.control.row_mut(2).copy_from(&p2);
        self.hermite_length = None;
    }

    /// Upper bound on the arc length: the control polygon length
    /// `Σ ‖p_{i+1} - p_i‖`. Computed on demand, cached until a boundary
    /// velocity changes.
    pub fn hermite_length(&mut self) -> f64 {
        if let Some(length) = self.hermite_length {
            return length;
        }
        let mut length = 0.0;
        for i in 0..3 {
            length += (self.control.row(i + 1) - self.control.row(i)).norm();
        }
        self.hermite_length = Some(length);
        length
    }

    #[must_use]
    pub fn cached_hermite_length(&self) -> Option<f64> {
        self.hermite_length
    }

    fn fraction(&self, s: f64) -> f64 {
        let t = self.interval.length();
        if t < TOLERANCE {
            return 0.0;
        }
        (s - self.interval.start) / t
    }

    pub(crate) fn config_at(&self, s: f64) -> Configuration {
        let u = self.fraction(s);
        let b1 = 3.0 * u * (1.0 - u) * (1.0 - u);
        let b2 = 3.0 * u * u * (1.0 - u);
        let b3 = u * u * u;
        // p0 is zero, the basis sum starts at p1.
        let v = (self.control.row(1).scale(b1)
            + self.control.row(2).scale(b2)
            + self.control.row(3).scale(b3))
        .transpose();
        self.space.integrate(&self.init, &v)
    }

    /// Velocity of the cubic at parameter `s`,
    /// `3 [(p1-p0)(1-u)² + 2 (p2-p1) u (1-u) + (p3-p2) u²] / T`.
    #[must_use]
    pub fn velocity(&self, s: f64) -> Vector {
        let t = self.interval.length();
        if t < TOLERANCE {
            return Vector::zeros(self.space.nv());
        }
        let u = (s - self.interval.start) / t;
        let d0 = (self.control.row(1) - self.control.row(0)).scale((1.0 - u) * (1.0 - u));
        let d1 = (self.control.row(2) - self.control.row(1)).scale(2.0 * u * (1.0 - u));
        let d2 = (self.control.row(3) - self.control.row(2)).scale(u * u);
        (d0 + d1 + d2).transpose().scale(3.0 / t)
    }

    pub(crate) fn acceleration(&self, s: f64) -> Vector {
        let t = self.interval.length();
        if t < TOLERANCE {
            return Vector::zeros(self.space.nv());
        }
        let u = (s - self.interval.start) / t;
        let c0 = (self.control.row(2) - self.control.row(1).scale(2.0) + self.control.row(0))
            .scale(1.0 - u);
        let c1 = (self.control.row(3) - self.control.row(2).scale(2.0) + self.control.row(1))
            .scale(u);
        (c0 + c1).transpose().scale(6.0 / (t * t))
    }

    /// Restriction of the cubic to `sub`, possibly reversed: boundary
    /// configurations and velocities are evaluated at the cut parameters
    /// and a fresh cubic is fitted through them, with velocities negated
    /// when the direction flips.
    pub(crate) fn restricted(&self, sub: Interval) -> Self {
        let c_start = self.config_at(sub.start);
        let c_end = self.config_at(sub.end);
        let sigma = if sub.is_reversed() { -1.0 } else { 1.0 };
        let v_start = self.velocity(sub.start).scale(sigma);
        let v_end = self.velocity(sub.end).scale(sigma);
        Self::from_boundary(
            Arc::clone(&self.space),
            c_start,
            c_end,
            &v_start,
            &v_end,
            sub.ordered(),
        )
    }
}
