use std::sync::Arc;

use slotmap::SlotMap;

use crate::error::{ConstraintError, Result};
use crate::math::{Configuration, Matrix, Vector};
use crate::space::ConfigSpace;

use super::{Comparison, ConstraintId, ImplicitConstraint, LockedDof, SolverParams};

/// A stack of implicit numerical constraints over a configuration space,
/// together with explicitly locked degrees of freedom and the Newton solver
/// parameters.
///
/// Cloning a set duplicates all mutable state (right-hand sides, locks), so
/// two paths holding clones never observe each other's updates.
#[derive(Debug, Clone)]
pub struct ConstraintSet {
    space: Arc<ConfigSpace>,
    constraints: SlotMap<ConstraintId, ImplicitConstraint>,
    order: Vec<ConstraintId>,
    locked: Vec<LockedDof>,
    params: SolverParams,
}

impl ConstraintSet {
    /// Creates an empty set with default solver parameters.
    #[must_use]
    pub fn new(space: Arc<ConfigSpace>) -> Self {
        Self::with_params(space, SolverParams::default())
    }

    /// Creates an empty set with the given solver parameters.
    #[must_use]
    pub fn with_params(space: Arc<ConfigSpace>, params: SolverParams) -> Self {
        Self {
            space,
            constraints: SlotMap::with_key(),
            order: Vec::new(),
            locked: Vec::new(),
            params,
        }
    }

    /// The configuration space the set operates on.
    #[must_use]
    pub fn space(&self) -> &Arc<ConfigSpace> {
        &self.space
    }

    /// Solver parameters.
    #[must_use]
    pub fn params(&self) -> SolverParams {
        self.params
    }

    /// Replaces the solver parameters.
    pub fn set_params(&mut self, params: SolverParams) {
        self.params = params;
    }

    /// Residual norm below which the stack counts as satisfied.
    #[must_use]
    pub fn error_threshold(&self) -> f64 {
        self.params.error_threshold
    }

    /// Appends a constraint to the stack and returns its identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if a passive degree of freedom is out of range for
    /// the space.
    pub fn add(&mut self, constraint: ImplicitConstraint) -> Result<ConstraintId> {
        let nv = self.space.nv();
        if let Some(&index) = constraint.passive_dofs().iter().find(|&&d| d >= nv) {
            return Err(ConstraintError::DofOutOfRange { index, nv }.into());
        }
        let id = self.constraints.insert(constraint);
        self.order.push(id);
        Ok(id)
    }

    /// Returns the constraint with the given identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is not in this set.
    pub fn constraint(&self, id: ConstraintId) -> Result<&ImplicitConstraint> {
        self.constraints
            .get(id)
            .ok_or_else(|| ConstraintError::ConstraintNotFound.into())
    }

    /// Returns the constraint with the given identifier, mutably.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is not in this set.
    pub fn constraint_mut(&mut self, id: ConstraintId) -> Result<&mut ImplicitConstraint> {
        self.constraints
            .get_mut(id)
            .ok_or_else(|| ConstraintError::ConstraintNotFound.into())
    }

    /// Pins a degree of freedom to a fixed value. Locking an already locked
    /// coordinate replaces its value.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of range for the space.
    pub fn lock_dof(&mut self, dof: LockedDof) -> Result<()> {
        let nv = self.space.nv();
        if dof.index >= nv {
            return Err(ConstraintError::DofOutOfRange {
                index: dof.index,
                nv,
            }
            .into());
        }
        match self.locked.binary_search_by(|l| l.index.cmp(&dof.index)) {
            Ok(pos) => self.locked[pos] = dof,
            Err(pos) => self.locked.insert(pos, dof),
        }
        Ok(())
    }

    /// Locked degrees of freedom, sorted by index.
    #[must_use]
    pub fn locked_dofs(&self) -> &[LockedDof] {
        &self.locked
    }

    /// Total number of stacked residual rows.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.order
            .iter()
            .filter_map(|id| self.constraints.get(*id))
            .map(|c| c.function().output_size())
            .sum()
    }

    /// Number of free (not locked) tangent coordinates.
    #[must_use]
    pub fn n_free(&self) -> usize {
        self.space.nv() - self.locked.len()
    }

    fn is_locked(&self, index: usize) -> bool {
        self.locked
            .binary_search_by(|l| l.index.cmp(&index))
            .is_ok()
    }

    /// Writes all locked values into `q`.
    pub fn apply_locked(&self, q: &mut Configuration) {
        for dof in &self.locked {
            self.space.write_locked_value(q, dof.index, dof.value);
        }
    }

    /// Stacked comparison-adjusted residual at `q`.
    #[must_use]
    pub fn residual(&self, q: &Configuration) -> Vector {
        self.residual_at(q, None)
    }

    /// Stacked residual at `q`, right-hand sides resolved at parameter `s`.
    #[must_use]
    pub fn residual_at(&self, q: &Configuration, s: Option<f64>) -> Vector {
        let mut out = Vector::zeros(self.dimension());
        let mut row = 0;
        for id in &self.order {
            if let Some(c) = self.constraints.get(*id) {
                let block = c.residual_at(q, s);
                out.rows_mut(row, block.len()).copy_from(&block);
                row += block.len();
            }
        }
        out
    }

    /// Stacked residual and reduced Jacobian at `q`.
    ///
    /// The Jacobian has locked columns dropped and passive columns zeroed.
    /// Rows of satisfied inequality constraints are inactive: their residual
    /// is zero and their Jacobian rows are zeroed so they do not steer the
    /// Newton step.
    #[must_use]
    pub fn compute_value_and_jacobian(
        &self,
        q: &Configuration,
        s: Option<f64>,
    ) -> (Vector, Matrix) {
        let nv = self.space.nv();
        let free: Vec<usize> = (0..nv).filter(|i| !self.is_locked(*i)).collect();
        let mut residual = Vector::zeros(self.dimension());
        let mut jacobian = Matrix::zeros(self.dimension(), free.len());

        let mut row = 0;
        for id in &self.order {
            let Some(c) = self.constraints.get(*id) else {
                continue;
            };
            let block = c.residual_at(q, s);
            let mut full = c.function().jacobian(q);
            debug_assert_eq!(full.nrows(), block.len());
            debug_assert_eq!(full.ncols(), nv);
            for &dof in c.passive_dofs() {
                full.column_mut(dof).fill(0.0);
            }
            let inequality = matches!(c.comparison(), Comparison::Inferior | Comparison::Superior);
            for (r, value) in block.iter().enumerate() {
                if inequality && *value == 0.0 {
                    full.row_mut(r).fill(0.0);
                }
            }
            residual.rows_mut(row, block.len()).copy_from(&block);
            for (col, &dof) in free.iter().enumerate() {
                jacobian
                    .view_mut((row, col), (block.len(), 1))
                    .copy_from(&full.column(dof));
            }
            row += block.len();
        }
        (residual, jacobian)
    }

    /// Drops locked entries from a full tangent vector.
    #[must_use]
    pub fn compress_vector(&self, full: &Vector) -> Vector {
        debug_assert_eq!(full.len(), self.space.nv());
        let values: Vec<f64> = (0..self.space.nv())
            .filter(|i| !self.is_locked(*i))
            .map(|i| full[i])
            .collect();
        Vector::from_vec(values)
    }

    /// Expands a reduced tangent vector, inserting zeros at locked entries.
    #[must_use]
    pub fn uncompress_vector(&self, small: &Vector) -> Vector {
        debug_assert_eq!(small.len(), self.n_free());
        let mut full = Vector::zeros(self.space.nv());
        let mut k = 0;
        for i in 0..self.space.nv() {
            if !self.is_locked(i) {
                full[i] = small[k];
                k += 1;
            }
        }
        full
    }

    /// Whether `q` satisfies every constraint within the error threshold.
    #[must_use]
    pub fn is_satisfied(&self, q: &Configuration) -> bool {
        self.is_satisfied_with_threshold(q, self.params.error_threshold)
    }

    /// Whether `q` satisfies every constraint within the given threshold.
    #[must_use]
    pub fn is_satisfied_with_threshold(&self, q: &Configuration, threshold: f64) -> bool {
        self.residual(q).norm() < threshold
    }

    /// Whether `q` satisfies every constraint at evaluation parameter `s`.
    #[must_use]
    pub fn is_satisfied_at(&self, q: &Configuration, s: f64) -> bool {
        self.residual_at(q, Some(s)).norm() < self.params.error_threshold
    }

    /// Stacked right-hand side over the equality constraints, in insertion
    /// order.
    #[must_use]
    pub fn right_hand_side(&self) -> Vector {
        let rows: usize = self.parametric().map(|c| c.rhs().len()).sum();
        let mut out = Vector::zeros(rows);
        let mut row = 0;
        for c in self.parametric() {
            out.rows_mut(row, c.rhs().len()).copy_from(c.rhs());
            row += c.rhs().len();
        }
        out
    }

    /// Distributes a stacked right-hand side over the equality constraints.
    ///
    /// # Errors
    ///
    /// Returns an error if the stacked dimension does not match.
    pub fn set_right_hand_side(&mut self, rhs: &Vector) -> Result<()> {
        let expected: usize = self.parametric().map(|c| c.rhs().len()).sum();
        if rhs.len() != expected {
            return Err(ConstraintError::RhsDimensionMismatch {
                name: "stacked right-hand side".to_owned(),
                expected,
                got: rhs.len(),
            }
            .into());
        }
        let order = self.order.clone();
        let mut row = 0;
        for id in order {
            let Some(c) = self.constraints.get_mut(id) else {
                continue;
            };
            if c.comparison().is_parametric() {
                let len = c.rhs().len();
                c.set_rhs(rhs.rows(row, len).into_owned())?;
                row += len;
            }
        }
        Ok(())
    }

    /// Records the foliation leaf passing through `config`: for every
    /// equality constraint, sets the right-hand side so `config` satisfies
    /// it exactly. Other comparison kinds are left untouched.
    pub fn right_hand_side_from_config(&mut self, config: &Configuration) {
        for c in self.constraints.values_mut() {
            c.record_leaf(config);
        }
    }

    fn parametric(&self) -> impl Iterator<Item = &ImplicitConstraint> {
        self.order
            .iter()
            .filter_map(|id| self.constraints.get(*id))
            .filter(|c| c.comparison().is_parametric())
    }
}
