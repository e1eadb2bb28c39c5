use super::TOLERANCE;

/// A closed time or parameter interval.
///
/// An interval may be given "reversed" (`start > end`): path operations treat
/// this as a request to traverse in the opposite direction, not as an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    /// Start of the interval.
    pub start: f64,
    /// End of the interval.
    pub end: f64,
}

impl Interval {
    /// Creates a new interval. `start > end` is allowed and marks a
    /// reversed traversal.
    #[must_use]
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Returns the absolute length `|end - start|`.
    #[must_use]
    pub fn length(&self) -> f64 {
        (self.end - self.start).abs()
    }

    /// Returns whether the interval is given in reversed order.
    #[must_use]
    pub fn is_reversed(&self) -> bool {
        self.start > self.end
    }

    /// Returns the interval with its endpoints swapped.
    #[must_use]
    pub fn swapped(&self) -> Self {
        Self {
            start: self.end,
            end: self.start,
        }
    }

    /// Returns the interval in ascending order.
    #[must_use]
    pub fn ordered(&self) -> Self {
        if self.is_reversed() {
            self.swapped()
        } else {
            *self
        }
    }

    /// Returns the arithmetic midpoint.
    #[must_use]
    pub fn midpoint(&self) -> f64 {
        0.5 * (self.start + self.end)
    }

    /// Returns whether `t` lies inside the interval, up to [`TOLERANCE`].
    #[must_use]
    pub fn contains(&self, t: f64) -> bool {
        let o = self.ordered();
        o.start - TOLERANCE <= t && t <= o.end + TOLERANCE
    }

    /// Clamps `t` into the interval bounds.
    #[must_use]
    pub fn clamp(&self, t: f64) -> f64 {
        let o = self.ordered();
        t.clamp(o.start, o.end)
    }

    /// Returns whether both endpoints match `other` up to [`TOLERANCE`].
    #[must_use]
    pub fn approx_eq(&self, other: &Self) -> bool {
        (self.start - other.start).abs() < TOLERANCE && (self.end - other.end).abs() < TOLERANCE
    }
}
