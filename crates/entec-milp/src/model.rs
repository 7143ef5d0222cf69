//! The shared, append-only constraint store and the construction context.
//!
//! All technology builders append variables and constraints to one
//! [`ModelStore`]; nothing is ever edited in place, so the model evolves
//! monotonically. The store also carries the single model-wide flag that
//! records whether any big-M relaxation was emitted — the external
//! solver-configuration layer reads it to pick tolerances.
//!
//! Construction-time selections that the original system kept in process
//! globals (which time set to index, the averaging factor) are explicit
//! fields of [`FormulationContext`], passed into every builder call.

use entec_core::{EntecResult, TimeHorizon, TimeSet};

use crate::expr::{LinearConstraint, VarId, VarKind, VariableDef};

/// Append-only store of variables and constraints for one model.
#[derive(Debug, Default)]
pub struct ModelStore {
    vars: Vec<VariableDef>,
    constraints: Vec<LinearConstraint>,
    big_m_used: bool,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_var(&mut self, def: VariableDef) -> VarId {
        let id = VarId(self.vars.len());
        self.vars.push(def);
        id
    }

    /// Add a continuous variable with the given bounds.
    pub fn continuous(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> VarId {
        self.add_var(VariableDef {
            name: name.into(),
            lower,
            upper,
            kind: VarKind::Continuous,
        })
    }

    /// Add an integer variable with the given bounds.
    pub fn integer(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> VarId {
        self.add_var(VariableDef {
            name: name.into(),
            lower,
            upper,
            kind: VarKind::Integer,
        })
    }

    /// Add a binary activation variable.
    pub fn binary(&mut self, name: impl Into<String>) -> VarId {
        self.add_var(VariableDef {
            name: name.into(),
            lower: 0.0,
            upper: 1.0,
            kind: VarKind::Binary,
        })
    }

    pub fn add_constraint(&mut self, constraint: LinearConstraint) {
        self.constraints.push(constraint);
    }

    pub fn add_constraints(&mut self, constraints: impl IntoIterator<Item = LinearConstraint>) {
        self.constraints.extend(constraints);
    }

    pub fn var(&self, id: VarId) -> &VariableDef {
        &self.vars[id.index()]
    }

    pub fn vars(&self) -> &[VariableDef] {
        &self.vars
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Whether any big-M relaxation was emitted into this model.
    pub fn big_m_used(&self) -> bool {
        self.big_m_used
    }

    /// Record that a big-M relaxation was emitted. Never cleared.
    pub fn mark_big_m_used(&mut self) {
        self.big_m_used = true;
    }

    /// Whether any binary or integer variable exists in the store.
    pub fn has_discrete_vars(&self) -> bool {
        self.vars
            .iter()
            .any(|v| !matches!(v.kind, VarKind::Continuous))
    }

    /// All constraints satisfied at `point` within `tol`.
    ///
    /// Test/diagnostic helper; returns the first violated constraint name.
    pub fn check_point(&self, point: &[f64], tol: f64) -> Result<(), &str> {
        for c in &self.constraints {
            if !c.satisfied(point, tol) {
                return Err(&c.name);
            }
        }
        Ok(())
    }
}

/// Construction context passed into every technology builder.
#[derive(Debug, Clone, Copy)]
pub struct FormulationContext {
    /// Time index sets of the enclosing model.
    pub horizon: TimeHorizon,
    /// Which set conversion-type builders index over. Storage recurrences
    /// always run over the full horizon.
    pub time_set: TimeSet,
}

impl FormulationContext {
    pub fn new(horizon: TimeHorizon) -> Self {
        Self {
            horizon,
            time_set: TimeSet::Full,
        }
    }

    pub fn with_time_set(mut self, set: TimeSet) -> Self {
        self.time_set = set;
        self
    }

    /// Number of timesteps in the selected set.
    pub fn steps(&self) -> EntecResult<usize> {
        self.horizon.steps(self.time_set)
    }

    /// Number of timesteps in the full horizon.
    pub fn full_steps(&self) -> usize {
        self.horizon.full_steps
    }

    /// Time-averaging factor Δ.
    pub fn timesteps_averaged(&self) -> usize {
        self.horizon.timesteps_averaged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::LinearExpr;
    use entec_core::TimeHorizon;

    #[test]
    fn test_store_is_append_only() {
        let mut store = ModelStore::new();
        let x = store.continuous("x", 0.0, 5.0);
        let y = store.continuous("y", 0.0, 5.0);
        store.add_constraint(LinearConstraint::eq(
            "link",
            LinearExpr::from(x) - LinearExpr::from(y),
        ));
        assert_eq!(store.num_vars(), 2);
        assert_eq!(store.num_constraints(), 1);
        assert!(store.check_point(&[2.0, 2.0], 1e-9).is_ok());
        assert_eq!(store.check_point(&[2.0, 3.0], 1e-9), Err("link"));
    }

    #[test]
    fn test_big_m_flag_latches() {
        let mut store = ModelStore::new();
        assert!(!store.big_m_used());
        store.mark_big_m_used();
        store.mark_big_m_used();
        assert!(store.big_m_used());
    }

    #[test]
    fn test_context_selects_time_set() {
        let ctx = FormulationContext::new(TimeHorizon::full(100).with_clustered(10))
            .with_time_set(TimeSet::Clustered);
        assert_eq!(ctx.steps().unwrap(), 10);
        assert_eq!(ctx.full_steps(), 100);
    }
}
