use crate::math::{Configuration, Vector, TOLERANCE};

/// One factor of a product configuration space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// A flat block of `n` translational degrees of freedom.
    Euclidean(usize),
    /// A planar rotation, stored as `(cos t, sin t)`. One tangent
    /// coordinate, two configuration coordinates.
    Circle,
}

impl Segment {
    fn nq(self) -> usize {
        match self {
            Segment::Euclidean(n) => n,
            Segment::Circle => 2,
        }
    }

    fn nv(self) -> usize {
        match self {
            Segment::Euclidean(n) => n,
            Segment::Circle => 1,
        }
    }
}

/// A product configuration space.
///
/// Configurations live in `R^nq`, velocities in the tangent space `R^nv`.
/// The two dimensions differ when the space carries rotational segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSpace {
    segments: Vec<Segment>,
    nq: usize,
    nv: usize,
}

impl ConfigSpace {
    /// Creates a space as the product of the given segments.
    #[must_use]
    pub fn new(segments: Vec<Segment>) -> Self {
        let nq = segments.iter().map(|s| s.nq()).sum();
        let nv = segments.iter().map(|s| s.nv()).sum();
        Self { segments, nq, nv }
    }

    /// Creates a flat space of `dim` translational degrees of freedom.
    #[must_use]
    pub fn euclidean(dim: usize) -> Self {
        Self::new(vec![Segment::Euclidean(dim)])
    }

    /// Configuration dimension.
    #[must_use]
    pub fn nq(&self) -> usize {
        self.nq
    }

    /// Tangent-space dimension.
    #[must_use]
    pub fn nv(&self) -> usize {
        self.nv
    }

    /// Returns the tangent vector `v` such that `integrate(b, v)` reaches `a`.
    ///
    /// Circle segments contribute the principal angle of the relative
    /// rotation, in `(-pi, pi]`.
    #[must_use]
    pub fn difference(&self, a: &Configuration, b: &Configuration) -> Vector {
        debug_assert_eq!(a.len(), self.nq);
        debug_assert_eq!(b.len(), self.nq);
        let mut v = Vector::zeros(self.nv);
        let (mut iq, mut iv) = (0, 0);
        for segment in &self.segments {
            match segment {
                Segment::Euclidean(n) => {
                    for k in 0..*n {
                        v[iv + k] = a[iq + k] - b[iq + k];
                    }
                }
                Segment::Circle => {
                    let (ca, sa) = (a[iq], a[iq + 1]);
                    let (cb, sb) = (b[iq], b[iq + 1]);
                    // Relative rotation b^-1 a, as an angle.
                    v[iv] = (cb * sa - sb * ca).atan2(cb * ca + sb * sa);
                }
            }
            iq += segment.nq();
            iv += segment.nv();
        }
        v
    }

    /// Moves `q` along the tangent vector `v`.
    #[must_use]
    pub fn integrate(&self, q: &Configuration, v: &Vector) -> Configuration {
        debug_assert_eq!(q.len(), self.nq);
        debug_assert_eq!(v.len(), self.nv);
        let mut out = Configuration::zeros(self.nq);
        let (mut iq, mut iv) = (0, 0);
        for segment in &self.segments {
            match segment {
                Segment::Euclidean(n) => {
                    for k in 0..*n {
                        out[iq + k] = q[iq + k] + v[iv + k];
                    }
                }
                Segment::Circle => {
                    let (c, s) = (q[iq], q[iq + 1]);
                    let (dc, ds) = (v[iv].cos(), v[iv].sin());
                    let mut nc = c * dc - s * ds;
                    let mut ns = s * dc + c * ds;
                    let norm = (nc * nc + ns * ns).sqrt();
                    if norm > TOLERANCE {
                        nc /= norm;
                        ns /= norm;
                    }
                    out[iq] = nc;
                    out[iq + 1] = ns;
                }
            }
            iq += segment.nq();
            iv += segment.nv();
        }
        out
    }

    /// Geodesic interpolation from `from` to `to` at ratio `u` in `[0, 1]`.
    #[must_use]
    pub fn interpolate(&self, from: &Configuration, to: &Configuration, u: f64) -> Configuration {
        let v = self.difference(to, from);
        self.integrate(from, &v.scale(u))
    }

    /// Returns `(offset, len)`: the configuration-coordinate span driven by
    /// velocity coordinate `iv`.
    ///
    /// Euclidean coordinates map one to one; a circle's single tangent
    /// coordinate drives its two configuration coordinates.
    #[must_use]
    pub fn config_span_of_velocity(&self, index: usize) -> (usize, usize) {
        debug_assert!(index < self.nv);
        let (mut iq, mut iv) = (0, 0);
        for segment in &self.segments {
            let nv = segment.nv();
            if index < iv + nv {
                return match segment {
                    Segment::Euclidean(_) => (iq + (index - iv), 1),
                    Segment::Circle => (iq, 2),
                };
            }
            iq += segment.nq();
            iv += nv;
        }
        (self.nq, 0)
    }

    /// Writes the configuration coordinates pinned by velocity coordinate
    /// `index` to the given value.
    ///
    /// For Euclidean coordinates the value is the coordinate itself; for a
    /// circle segment it is the angle.
    pub fn write_locked_value(&self, q: &mut Configuration, index: usize, value: f64) {
        let (offset, len) = self.config_span_of_velocity(index);
        if len == 1 {
            q[offset] = value;
        } else if len == 2 {
            q[offset] = value.cos();
            q[offset + 1] = value.sin();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle_config(theta: f64) -> Configuration {
        Configuration::from_vec(vec![theta.cos(), theta.sin()])
    }

    #[test]
    fn euclidean_difference_integrate_round_trip() {
        let space = ConfigSpace::euclidean(3);
        let a = Configuration::from_vec(vec![1.0, 2.0, 3.0]);
        let b = Configuration::from_vec(vec![0.5, -1.0, 4.0]);
        let v = space.difference(&a, &b);
        let back = space.integrate(&b, &v);
        assert!((back - a).norm() < TOLERANCE);
    }

    #[test]
    fn circle_difference_takes_principal_angle() {
        let space = ConfigSpace::new(vec![Segment::Circle]);
        // 170 and -170 degrees are 20 degrees apart through the cut.
        let a = circle_config(170.0_f64.to_radians());
        let b = circle_config(-170.0_f64.to_radians());
        let v = space.difference(&a, &b);
        assert!((v[0] - (-20.0_f64).to_radians()).abs() < 1e-9, "v={}", v[0]);
    }

    #[test]
    fn circle_integrate_wraps_and_stays_unit() {
        let space = ConfigSpace::new(vec![Segment::Circle]);
        let q = circle_config(3.0);
        let v = Vector::from_vec(vec![1.0]);
        let out = space.integrate(&q, &v);
        let expected = circle_config(4.0);
        assert!((out.clone() - expected).norm() < 1e-9);
        assert!((out[0] * out[0] + out[1] * out[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn interpolate_mixed_space() {
        let space = ConfigSpace::new(vec![Segment::Euclidean(1), Segment::Circle]);
        let mut from = Configuration::zeros(3);
        from[0] = 0.0;
        from[1] = 1.0;
        from[2] = 0.0;
        let mut to = Configuration::zeros(3);
        to[0] = 2.0;
        to[1] = 0.5_f64.cos();
        to[2] = 0.5_f64.sin();
        let mid = space.interpolate(&from, &to, 0.5);
        assert!((mid[0] - 1.0).abs() < 1e-9);
        assert!((mid[1] - 0.25_f64.cos()).abs() < 1e-9);
        assert!((mid[2] - 0.25_f64.sin()).abs() < 1e-9);
    }

    #[test]
    fn config_span_accounts_for_circle_width() {
        let space = ConfigSpace::new(vec![Segment::Euclidean(2), Segment::Circle, Segment::Euclidean(1)]);
        assert_eq!(space.nq(), 5);
        assert_eq!(space.nv(), 4);
        assert_eq!(space.config_span_of_velocity(0), (0, 1));
        assert_eq!(space.config_span_of_velocity(1), (1, 1));
        assert_eq!(space.config_span_of_velocity(2), (2, 2));
        assert_eq!(space.config_span_of_velocity(3), (4, 1));
    }

    #[test]
    fn write_locked_value_on_circle() {
        let space = ConfigSpace::new(vec![Segment::Circle]);
        let mut q = circle_config(0.0);
        space.write_locked_value(&mut q, 0, 1.2);
        assert!((q[0] - 1.2_f64.cos()).abs() < TOLERANCE);
        assert!((q[1] - 1.2_f64.sin()).abs() < TOLERANCE);
    }
}
