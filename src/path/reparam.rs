use std::fmt;
use std::sync::Arc;

/// Scalar mapping from path-local time to the parameter the underlying
/// geometry (and any attached constraints) are evaluated at.
pub trait TimeParameterization: fmt::Debug {
    fn value(&self, t: f64) -> f64;

    /// Derivative of order 1 or 2 at `t`. Higher orders are rejected
    /// before this is called.
    fn derivative(&self, t: f64, order: usize) -> f64;
}

/// `s = offset + slope * t`.
#[derive(Debug, Clone, Copy)]
pub struct AffineScaling {
    pub offset: f64,
    pub slope: f64,
}

impl AffineScaling {
    #[must_use]
    pub fn new(offset: f64, slope: f64) -> Self {
        Self { offset, slope }
    }
}

impl TimeParameterization for AffineScaling {
    fn value(&self, t: f64) -> f64 {
        self.offset + self.slope * t
    }

    fn derivative(&self, _t: f64, order: usize) -> f64 {
        if order == 1 {
            self.slope
        } else {
            0.0
        }
    }
}

/// A reparameterization together with the accumulated shift it is read
/// through. Extracting a sub-path shifts time and parameter coordinates;
/// shifting a shift folds into one `(time_offset, value_offset)` pair, so
/// however many extraction layers pile up, evaluation stays a single
/// indirection.
#[derive(Debug, Clone)]
pub struct TimeParam {
    inner: Arc<dyn TimeParameterization>,
    time_offset: f64,
    value_offset: f64,
}

impl TimeParam {
    #[must_use]
    pub fn new(inner: Arc<dyn TimeParameterization>) -> Self {
        Self {
            inner,
            time_offset: 0.0,
            value_offset: 0.0,
        }
    }

    /// Same mapping read through an additional shift of the time axis and
    /// of the produced parameter.
    #[must_use]
    pub fn shifted(&self, time_offset: f64, value_offset: f64) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            time_offset: self.time_offset + time_offset,
            value_offset: self.value_offset + value_offset,
        }
    }

    #[must_use]
    pub fn time_offset(&self) -> f64 {
        self.time_offset
    }

    #[must_use]
    pub fn value_offset(&self) -> f64 {
        self.value_offset
    }

    #[must_use]
    pub fn value(&self, t: f64) -> f64 {
        self.inner.value(t + self.time_offset) + self.value_offset
    }

    /// Offsets vanish under differentiation, so this is the inner
    /// derivative at the shifted abscissa.
    #[must_use]
    pub fn derivative(&self, t: f64, order: usize) -> f64 {
        self.inner.derivative(t + self.time_offset, order)
    }
}
