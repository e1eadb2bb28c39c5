use std::sync::Arc;

use crate::constraint::ConstraintSet;
use crate::error::{PathError, ProjectionError, Result};
use crate::math::{Configuration, Interval, Vector, TOLERANCE};
use crate::space::ConfigSpace;

mod hermite;
mod interpolated;
mod reparam;
mod sequence;
mod straight;

pub use hermite::HermiteData;
pub use interpolated::InterpolatedData;
pub use reparam::{AffineScaling, TimeParam, TimeParameterization};
pub use sequence::SequenceData;
pub use straight::StraightData;

/// The geometric shape of a [`Path`].
#[derive(Debug, Clone)]
pub enum PathKind {
    Straight(StraightData),
    Hermite(HermiteData),
    Interpolated(InterpolatedData),
    Sequence(SequenceData),
}

/// A curve in configuration space over a closed time interval, optionally
/// subject to a constraint set and read through a time reparameterization.
///
/// The geometry is defined on the parameter axis (`param_range`); without a
/// reparameterization the time and parameter axes coincide. Cloning deep
/// copies the constraint set, so right-hand-side mutation on one path never
/// leaks into another.
#[derive(Debug, Clone)]
pub struct Path {
    space: Arc<ConfigSpace>,
    kind: PathKind,
    time_range: Interval,
    param_range: Interval,
    constraints: Option<ConstraintSet>,
    time_param: Option<TimeParam>,
}

impl Path {
    /// Straight geodesic between `init` and `end` over `interval`.
    ///
    /// # Errors
    ///
    /// Fails when an endpoint violates the attached constraints.
    pub fn straight(
        space: Arc<ConfigSpace>,
        init: Configuration,
        end: Configuration,
        interval: Interval,
        constraints: Option<ConstraintSet>,
    ) -> Result<Self> {
        let range = interval.ordered();
        let path = Self {
            space,
            kind: PathKind::Straight(StraightData::new(init, end)),
            time_range: range,
            param_range: range,
            constraints,
            time_param: None,
        };
        path.check_path()?;
        Ok(path)
    }

    /// Cubic Hermite between `init` and `end`. Default boundary velocities
    /// are the straight-line velocity, projected on the constraint tangent
    /// space at each endpoint when constraints are given.
    #[must_use]
    pub fn hermite(
        space: Arc<ConfigSpace>,
        init: Configuration,
        end: Configuration,
        interval: Interval,
        constraints: Option<ConstraintSet>,
    ) -> Self {
        let range = interval.ordered();
        let data = HermiteData::new(Arc::clone(&space), init, end, constraints.as_ref(), range);
        Self {
            space,
            kind: PathKind::Hermite(data),
            time_range: range,
            param_range: range,
            constraints,
            time_param: None,
        }
    }

    /// Piecewise-geodesic path through `waypoints`; the time axis is given
    /// by the waypoint times themselves.
    ///
    /// # Errors
    ///
    /// Fails on an ill-formed waypoint list or when an endpoint violates
    /// the attached constraints.
    pub fn interpolated(
        space: Arc<ConfigSpace>,
        waypoints: Vec<(f64, Configuration)>,
        constraints: Option<ConstraintSet>,
    ) -> Result<Self> {
        let data = InterpolatedData::new(waypoints)?;
        let range = data.span();
        let path = Self {
            space,
            kind: PathKind::Interpolated(data),
            time_range: range,
            param_range: range,
            constraints,
            time_param: None,
        };
        path.check_path()?;
        Ok(path)
    }

    /// Concatenation of `pieces` over a cumulative time axis starting at
    /// zero. Plain nested sequences (no constraints, no
    /// reparameterization) are flattened.
    ///
    /// # Errors
    ///
    /// Fails with [`PathError::EmptySequence`] when no piece is given.
    pub fn from_sequence(pieces: Vec<Path>) -> Result<Self> {
        let mut flat = Vec::with_capacity(pieces.len());
        for piece in pieces {
            flat.extend(piece.into_plain_pieces());
        }
        let space = match flat.first() {
            Some(piece) => Arc::clone(piece.space()),
            None => return Err(PathError::EmptySequence.into()),
        };
        let data = SequenceData::new(flat)?;
        let range = Interval::new(0.0, data.total_length());
        Ok(Self {
            space,
            kind: PathKind::Sequence(data),
            time_range: range,
            param_range: range,
            constraints: None,
            time_param: None,
        })
    }

    fn into_plain_pieces(self) -> Vec<Path> {
        match self {
            Self {
                kind: PathKind::Sequence(data),
                constraints: None,
                time_param: None,
                ..
            } => data.into_pieces(),
            other => vec![other],
        }
    }

    #[must_use]
    pub fn space(&self) -> &Arc<ConfigSpace> {
        &self.space
    }

    #[must_use]
    pub fn time_range(&self) -> Interval {
        self.time_range
    }

    /// Interval the geometry (and constraint evaluation) is parameterized
    /// over; the image of `time_range` under the reparameterization,
    /// or `time_range` itself when none is attached.
    #[must_use]
    pub fn param_range(&self) -> Interval {
        self.param_range
    }

    #[must_use]
    pub fn length(&self) -> f64 {
        self.time_range.length()
    }

    #[must_use]
    pub fn output_size(&self) -> usize {
        self.space.nq()
    }

    #[must_use]
    pub fn output_derivative_size(&self) -> usize {
        self.space.nv()
    }

    #[must_use]
    pub fn constraints(&self) -> Option<&ConstraintSet> {
        self.constraints.as_ref()
    }

    pub fn constraints_mut(&mut self) -> Option<&mut ConstraintSet> {
        self.constraints.as_mut()
    }

    #[must_use]
    pub fn time_param(&self) -> Option<&TimeParam> {
        self.time_param.as_ref()
    }

    #[must_use]
    pub fn initial(&self) -> &Configuration {
        match &self.kind {
            PathKind::Straight(data) => data.init(),
            PathKind::Hermite(data) => data.init(),
            PathKind::Interpolated(data) => data.first_config(),
            PathKind::Sequence(data) => data.first().initial(),
        }
    }

    #[must_use]
    pub fn end(&self) -> &Configuration {
        match &self.kind {
            PathKind::Straight(data) => data.end(),
            PathKind::Hermite(data) => data.end(),
            PathKind::Interpolated(data) => data.last_config(),
            PathKind::Sequence(data) => data.last().end(),
        }
    }

    #[must_use]
    pub fn as_straight(&self) -> Option<&StraightData> {
        match &self.kind {
            PathKind::Straight(data) => Some(data),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_hermite(&self) -> Option<&HermiteData> {
        match &self.kind {
            PathKind::Hermite(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_hermite_mut(&mut self) -> Option<&mut HermiteData> {
        match &mut self.kind {
            PathKind::Hermite(data) => Some(data),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_interpolated(&self) -> Option<&InterpolatedData> {
        match &self.kind {
            PathKind::Interpolated(data) => Some(data),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_sequence(&self) -> Option<&SequenceData> {
        match &self.kind {
            PathKind::Sequence(data) => Some(data),
            _ => None,
        }
    }

    /// Maps a time to the parameter the geometry is evaluated at.
    #[must_use]
    pub fn param_at(&self, t: f64) -> f64 {
        self.time_param.as_ref().map_or(t, |tp| tp.value(t))
    }

    /// Configuration at time `t`, projected on the constraint manifold
    /// when a constraint set is attached (right-hand sides resolved at the
    /// evaluation parameter).
    ///
    /// # Errors
    ///
    /// Fails with [`ProjectionError::NotConverged`] when the projection
    /// exhausts its iterations.
    pub fn eval(&self, t: f64) -> Result<Configuration> {
        debug_assert!(self.time_range.contains(t), "time {t} outside path range");
        self.eval_at_param(self.param_at(t))
    }

    fn eval_at_param(&self, s: f64) -> Result<Configuration> {
        let q = match &self.kind {
            PathKind::Straight(data) => data.config_at(&self.space, self.param_range, s),
            PathKind::Hermite(data) => data.config_at(s),
            PathKind::Interpolated(data) => data.config_at(&self.space, s),
            PathKind::Sequence(data) => data.eval(s)?,
        };
        self.apply_constraints(q, s)
    }

    fn apply_constraints(&self, mut q: Configuration, s: f64) -> Result<Configuration> {
        if let Some(set) = &self.constraints {
            let outcome = set.solve_at(&mut q, s);
            if !outcome.converged {
                return Err(ProjectionError::NotConverged {
                    iterations: outcome.iterations,
                    residual_norm: outcome.residual_norm,
                }
                .into());
            }
        }
        Ok(q)
    }

    /// Derivative of order 1 or 2 at time `t`, with the chain rule applied
    /// through the reparameterization when one is attached.
    ///
    /// # Errors
    ///
    /// Fails with [`PathError::UnsupportedDerivativeOrder`] for any other
    /// order.
    pub fn derivative(&self, t: f64, order: usize) -> Result<Vector> {
        let Some(tp) = &self.time_param else {
            return self.geometric_derivative(t, order);
        };
        let s = tp.value(t);
        match order {
            1 => Ok(self.geometric_derivative(s, 1)?.scale(tp.derivative(t, 1))),
            2 => {
                let g1 = tp.derivative(t, 1);
                let mut result = self.geometric_derivative(s, 2)?.scale(g1 * g1);
                result += self.geometric_derivative(s, 1)?.scale(tp.derivative(t, 2));
                Ok(result)
            }
            _ => Err(PathError::UnsupportedDerivativeOrder { order }.into()),
        }
    }

    fn geometric_derivative(&self, s: f64, order: usize) -> Result<Vector> {
        match &self.kind {
            PathKind::Straight(data) => data.derivative(&self.space, self.param_range, order),
            PathKind::Hermite(data) => match order {
                1 => Ok(data.velocity(s)),
                2 => Ok(data.acceleration(s)),
                _ => Err(PathError::UnsupportedDerivativeOrder { order }.into()),
            },
            PathKind::Interpolated(data) => data.derivative(&self.space, s, order),
            PathKind::Sequence(data) => data.derivative(s, order),
        }
    }

    /// Sub-path over `sub` of the time axis; a reversed `sub` flips the
    /// traversal direction. Extraction preserves parameter coordinates:
    /// constraints keep resolving on the parent's parameter axis, however
    /// many extraction layers accumulate.
    ///
    /// # Errors
    ///
    /// Fails when a cut configuration cannot be projected on the
    /// constraint manifold.
    pub fn extract(&self, sub: Interval) -> Result<Self> {
        debug_assert!(
            self.time_range.contains(sub.start) && self.time_range.contains(sub.end),
            "extraction interval outside path range"
        );
        let Some(tp) = &self.time_param else {
            return self.extract_params(sub);
        };
        let param_sub = Interval::new(tp.value(sub.start), tp.value(sub.end));
        let res = self.extract_params(param_sub)?;
        // Kind-specific extraction may have renormalized its parameter
        // axis; compensate by shifting the reparameterization.
        let anchor = if sub.is_reversed() {
            param_sub.end
        } else {
            param_sub.start
        };
        let shift_s = res.param_range.start - anchor;
        if shift_s.abs() < TOLERANCE {
            Ok(res.with_time_param(tp.clone(), sub.ordered()))
        } else {
            let shifted = tp.shifted(sub.ordered().start, shift_s);
            Ok(res.with_time_param(shifted, Interval::new(0.0, sub.length())))
        }
    }

    /// Extraction on the parameter axis; the result carries no
    /// reparameterization.
    fn extract_params(&self, sub: Interval) -> Result<Self> {
        if sub.approx_eq(&self.param_range) {
            let mut copy = self.clone();
            copy.time_param = None;
            copy.time_range = copy.param_range;
            return Ok(copy);
        }
        if sub.length() < TOLERANCE {
            // A single constrained configuration.
            let q = self.eval_at_param(sub.start)?;
            let range = Interval::new(sub.start, sub.start);
            return Ok(Self {
                space: Arc::clone(&self.space),
                kind: PathKind::Straight(StraightData::new(q.clone(), q)),
                time_range: range,
                param_range: range,
                constraints: self.constraints.clone(),
                time_param: None,
            });
        }
        let range = sub.ordered();
        match &self.kind {
            PathKind::Straight(_) => {
                let q_start = self.eval_at_param(sub.start)?;
                let q_end = self.eval_at_param(sub.end)?;
                Ok(Self {
                    space: Arc::clone(&self.space),
                    kind: PathKind::Straight(StraightData::new(q_start, q_end)),
                    time_range: range,
                    param_range: range,
                    constraints: self.constraints.clone(),
                    time_param: None,
                })
            }
            PathKind::Hermite(data) => Ok(Self {
                space: Arc::clone(&self.space),
                kind: PathKind::Hermite(data.restricted(sub)),
                time_range: range,
                param_range: range,
                constraints: self.constraints.clone(),
                time_param: None,
            }),
            PathKind::Interpolated(data) => Ok(Self {
                space: Arc::clone(&self.space),
                kind: PathKind::Interpolated(data.restricted(&self.space, sub)),
                time_range: range,
                param_range: range,
                constraints: self.constraints.clone(),
                time_param: None,
            }),
            PathKind::Sequence(data) => {
                let mut path = Self::from_sequence(data.restricted(sub)?)?;
                path.constraints = self.constraints.clone();
                Ok(path)
            }
        }
    }

    /// The path traversed in the opposite direction.
    ///
    /// # Errors
    ///
    /// See [`extract`](Self::extract).
    pub fn reverse(&self) -> Result<Self> {
        self.extract(self.time_range.swapped())
    }

    /// Attaches a reparameterization: the visible time axis becomes
    /// `range` while the geometry keeps its parameter domain. `g` must map
    /// `range` onto the parameter range.
    #[must_use]
    pub fn with_time_param(mut self, g: TimeParam, range: Interval) -> Self {
        debug_assert!(
            Interval::new(g.value(range.start), g.value(range.end))
                .ordered()
                .approx_eq(&self.param_range),
            "reparameterization must map the time range onto the parameter range"
        );
        self.time_range = range.ordered();
        self.time_param = Some(g);
        self
    }

    /// Validates both endpoints against the attached constraints, with
    /// right-hand sides resolved at the corresponding parameter.
    ///
    /// # Errors
    ///
    /// Fails with [`ProjectionError::EndpointViolation`] carrying the
    /// offending configuration and residual.
    pub fn check_path(&self) -> Result<()> {
        let Some(set) = &self.constraints else {
            return Ok(());
        };
        let checks = [
            ("initial", self.param_range.start, self.initial()),
            ("end", self.param_range.end, self.end()),
        ];
        for (endpoint, s, q) in checks {
            let residual = set.residual_at(q, Some(s));
            let residual_norm = residual.norm();
            if residual_norm >= set.error_threshold() {
                return Err(ProjectionError::EndpointViolation {
                    endpoint,
                    configuration: q.clone(),
                    residual,
                    residual_norm,
                }
                .into());
            }
        }
        Ok(())
    }
}
