mod interval;

pub use interval::Interval;

/// A point in configuration space.
pub type Configuration = nalgebra::DVector<f64>;

/// A tangent-space vector (velocity, constraint residual).
pub type Vector = nalgebra::DVector<f64>;

/// A dynamically sized matrix (Jacobians, control points).
pub type Matrix = nalgebra::DMatrix<f64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-10;
