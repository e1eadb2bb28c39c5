use crate::error::{PathError, Result};
use crate::math::{Configuration, Interval, Vector, TOLERANCE};
use crate::space::ConfigSpace;

/// Geodesic interpolation between two configurations.
#[derive(Debug, Clone)]
pub struct StraightData {
    init: Configuration,
    end: Configuration,
}

impl StraightData {
    pub(crate) fn new(init: Configuration, end: Configuration) -> Self {
        Self { init, end }
    }

    #[must_use]
    pub fn init(&self) -> &Configuration {
        &self.init
    }

    #[must_use]
    pub fn end(&self) -> &Configuration {
        &self.end
    }

    pub(crate) fn config_at(&self, space: &ConfigSpace, interval: Interval, s: f64) -> Configuration {
        let t = interval.length();
        if t < TOLERANCE {
            return self.init.clone();
        }
        let u = (s - interval.start) / t;
        space.interpolate(&self.init, &self.end, u)
    }

    /// Constant first derivative along the geodesic; the second is zero.
    pub(crate) fn derivative(
        &self,
        space: &ConfigSpace,
        interval: Interval,
        order: usize,
    ) -> Result<Vector> {
        match order {
            1 => {
                let t = interval.length();
                if t < TOLERANCE {
                    return Ok(Vector::zeros(space.nv()));
                }
                Ok(space.difference(&self.end, &self.init).unscale(t))
            }
            2 => Ok(Vector::zeros(space.nv())),
            _ => Err(PathError::UnsupportedDerivativeOrder { order }.into()),
        }
    }
}
