use crate::error::{PathError, Result};
use crate::math::{Configuration, Interval, Vector, TOLERANCE};
use crate::space::ConfigSpace;

/// Piecewise-geodesic curve through ordered `(time, configuration)`
/// waypoints.
#[derive(Debug, Clone)]
pub struct InterpolatedData {
    waypoints: Vec<(f64, Configuration)>,
}

impl InterpolatedData {
    /// # Errors
    ///
    /// Fails when fewer than two waypoints are given or their times are
    /// not strictly increasing.
    pub(crate) fn new(waypoints: Vec<(f64, Configuration)>) -> Result<Self> {
        if waypoints.len() < 2 {
            return Err(PathError::TooFewWaypoints {
                count: waypoints.len(),
            }
            .into());
        }
        if !waypoints.windows(2).all(|pair| pair[0].0 < pair[1].0) {
            return Err(PathError::UnorderedWaypoints.into());
        }
        Ok(Self { waypoints })
    }

    #[must_use]
    pub fn waypoints(&self) -> &[(f64, Configuration)] {
        &self.waypoints
    }

    pub(crate) fn span(&self) -> Interval {
        Interval::new(self.waypoints[0].0, self.waypoints[self.waypoints.len() - 1].0)
    }

    pub(crate) fn first_config(&self) -> &Configuration {
        &self.waypoints[0].1
    }

    pub(crate) fn last_config(&self) -> &Configuration {
        &self.waypoints[self.waypoints.len() - 1].1
    }

    /// Adds a waypoint, keeping times ordered. A waypoint within
    /// [`TOLERANCE`] of an existing time replaces its configuration.
    pub fn insert(&mut self, time: f64, config: Configuration) {
        if let Some(entry) = self
            .waypoints
            .iter_mut()
            .find(|(t, _)| (*t - time).abs() < TOLERANCE)
        {
            entry.1 = config;
            return;
        }
        let at = self.waypoints.partition_point(|(t, _)| *t < time);
        self.waypoints.insert(at, (time, config));
    }

    /// Index of the segment bracketing `s` (clamped to the first or last
    /// segment outside the span).
    fn segment(&self, s: f64) -> usize {
        let upper = self.waypoints.partition_point(|(t, _)| *t <= s);
        upper.clamp(1, self.waypoints.len() - 1) - 1
    }

    pub(crate) fn config_at(&self, space: &ConfigSpace, s: f64) -> Configuration {
        if s <= self.waypoints[0].0 {
            return self.waypoints[0].1.clone();
        }
        if s >= self.waypoints[self.waypoints.len() - 1].0 {
            return self.waypoints[self.waypoints.len() - 1].1.clone();
        }
        let i = self.segment(s);
        let (t0, ref c0) = self.waypoints[i];
        let (t1, ref c1) = self.waypoints[i + 1];
        let u = (s - t0) / (t1 - t0);
        space.interpolate(c0, c1, u)
    }

    /// Piecewise-constant first derivative; the second is zero.
    pub(crate) fn derivative(&self, space: &ConfigSpace, s: f64, order: usize) -> Result<Vector> {
        match order {
            1 => {
                let i = self.segment(s);
                let (t0, ref c0) = self.waypoints[i];
                let (t1, ref c1) = self.waypoints[i + 1];
                Ok(space.difference(c1, c0).unscale(t1 - t0))
            }
            2 => Ok(Vector::zeros(space.nv())),
            _ => Err(PathError::UnsupportedDerivativeOrder { order }.into()),
        }
    }

    /// Waypoint list restricted to `sub`, mirrored when `sub` is reversed.
    /// Cut configurations are evaluated geometrically; waypoints within
    /// [`TOLERANCE`] of a cut are dropped to keep times strictly ordered.
    pub(crate) fn restricted(&self, space: &ConfigSpace, sub: Interval) -> Self {
        let ordered = sub.ordered();
        let inner = self
            .waypoints
            .iter()
            .filter(|(t, _)| *t > ordered.start + TOLERANCE && *t < ordered.end - TOLERANCE);
        let mut points = Vec::new();
        if sub.is_reversed() {
            points.push((ordered.start, self.config_at(space, sub.start)));
            let mut mirrored: Vec<_> = inner
                .map(|(t, c)| (sub.start + sub.end - *t, c.clone()))
                .collect();
            mirrored.reverse();
            points.extend(mirrored);
            points.push((ordered.end, self.config_at(space, sub.end)));
        } else {
            points.push((sub.start, self.config_at(space, sub.start)));
            points.extend(inner.map(|(t, c)| (*t, c.clone())));
            points.push((sub.end, self.config_at(space, sub.end)));
        }
        Self { waypoints: points }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-10;

    fn config(values: &[f64]) -> Configuration {
        Configuration::from_row_slice(values)
    }

    fn three_points() -> InterpolatedData {
        InterpolatedData::new(vec![
            (0.0, config(&[0.0, 0.0])),
            (1.0, config(&[1.0, 0.0])),
            (3.0, config(&[1.0, 2.0])),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_bad_waypoint_lists() {
        assert!(InterpolatedData::new(vec![(0.0, config(&[0.0]))]).is_err());
        assert!(
            InterpolatedData::new(vec![(1.0, config(&[0.0])), (0.5, config(&[1.0]))]).is_err()
        );
    }

    #[test]
    fn evaluates_within_the_bracketing_segment() {
        let space = ConfigSpace::euclidean(2);
        let data = three_points();
        let q = data.config_at(&space, 2.0);
        assert!((q[0] - 1.0).abs() < TOL && (q[1] - 1.0).abs() < TOL, "q={q}");
        let v = data.derivative(&space, 2.0, 1).unwrap();
        assert!(v[0].abs() < TOL && (v[1] - 1.0).abs() < TOL, "v={v}");
    }

    #[test]
    fn insert_keeps_times_ordered() {
        let space = ConfigSpace::euclidean(2);
        let mut data = three_points();
        data.insert(0.5, config(&[0.5, 0.5]));
        assert_eq!(data.waypoints().len(), 4);
        let q = data.config_at(&space, 0.5);
        assert!((q[1] - 0.5).abs() < TOL);
        // Same time again replaces instead of duplicating.
        data.insert(0.5, config(&[0.5, 0.25]));
        assert_eq!(data.waypoints().len(), 4);
    }

    #[test]
    fn restriction_keeps_interior_waypoints() {
        let space = ConfigSpace::euclidean(2);
        let data = three_points();
        let sub = data.restricted(&space, Interval::new(0.5, 2.0));
        assert_eq!(sub.waypoints().len(), 3);
        let q = sub.config_at(&space, 1.0);
        assert!((q - data.config_at(&space, 1.0)).norm() < TOL);
    }

    #[test]
    fn reversed_restriction_mirrors_the_time_axis() {
        let space = ConfigSpace::euclidean(2);
        let data = three_points();
        let sub = data.restricted(&space, Interval::new(2.0, 0.5));
        // Domain is [0.5, 2.0]; early times map to late parent times.
        assert!((sub.config_at(&space, 0.5) - data.config_at(&space, 2.0)).norm() < TOL);
        assert!((sub.config_at(&space, 2.0) - data.config_at(&space, 0.5)).norm() < TOL);
        assert!((sub.config_at(&space, 1.5) - data.config_at(&space, 1.0)).norm() < TOL);
    }
}
