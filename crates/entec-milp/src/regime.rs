//! Operating regimes of a disjunctive technology formulation.
//!
//! A regime is one branch of an "exactly one of N" disjunction: the off
//! state, a linear operating line, or one segment of a piecewise curve. Each
//! regime carries the linear constraints that hold while it is active, as
//! plain data; the assembler in [`crate::disjunction`] turns a regime list
//! into activation binaries plus a hull or big-M relaxation.

use crate::expr::{LinearConstraint, LinearExpr, VarId};

/// Which branch of a disjunction a regime represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegimeKind {
    /// Technology off: flows forced to zero.
    Off,
    /// Single operating line through the origin.
    LinearThroughOrigin,
    /// Single operating line with a non-zero intercept (min part load).
    LinearWithOffset,
    /// Segment `k` of a piecewise performance curve, 0-based.
    PiecewiseSegment(usize),
}

impl RegimeKind {
    /// Short label used in variable and constraint names.
    pub fn label(&self) -> String {
        match self {
            RegimeKind::Off => "off".into(),
            RegimeKind::LinearThroughOrigin => "on".into(),
            RegimeKind::LinearWithOffset => "on".into(),
            RegimeKind::PiecewiseSegment(k) => format!("seg{k}"),
        }
    }
}

/// One branch of a disjunction: a kind plus the constraints active in it.
#[derive(Debug, Clone)]
pub struct Regime {
    pub kind: RegimeKind,
    constraints: Vec<LinearConstraint>,
}

impl Regime {
    pub fn new(kind: RegimeKind) -> Self {
        Self {
            kind,
            constraints: Vec::new(),
        }
    }

    /// An off regime forcing every listed flow variable to zero.
    pub fn off(vars: impl IntoIterator<Item = (String, VarId)>) -> Self {
        let mut regime = Self::new(RegimeKind::Off);
        for (name, var) in vars {
            regime.push_eq(name, LinearExpr::from(var));
        }
        regime
    }

    pub fn push_eq(&mut self, name: impl Into<String>, expr: LinearExpr) {
        self.constraints.push(LinearConstraint::eq(name, expr));
    }

    pub fn push_le(&mut self, name: impl Into<String>, expr: LinearExpr) {
        self.constraints.push(LinearConstraint::le(name, expr));
    }

    pub fn push_ge(&mut self, name: impl Into<String>, expr: LinearExpr) {
        self.constraints.push(LinearConstraint::ge(name, expr));
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    /// Distinct variables referenced by this regime's constraints, in order
    /// of first appearance.
    pub fn referenced_vars(&self) -> Vec<VarId> {
        let mut seen = Vec::new();
        for c in &self.constraints {
            for v in c.expr.variables() {
                if !seen.contains(&v) {
                    seen.push(v);
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_off_regime_forces_zero() {
        let regime = Regime::off([("in_zero".to_string(), VarId(0)), ("out_zero".to_string(), VarId(1))]);
        assert_eq!(regime.kind, RegimeKind::Off);
        assert_eq!(regime.constraints().len(), 2);
        for c in regime.constraints() {
            assert!(c.satisfied(&[0.0, 0.0], 1e-12));
            assert!(!c.satisfied(&[1.0, 0.0], 1e-12) || !c.satisfied(&[0.0, 1.0], 1e-12));
        }
    }

    #[test]
    fn test_referenced_vars_deduplicated() {
        let mut regime = Regime::new(RegimeKind::LinearWithOffset);
        regime.push_eq(
            "perf",
            LinearExpr::term(VarId(3), 1.0) - LinearExpr::term(VarId(1), 0.8) + 0.2,
        );
        regime.push_ge("floor", LinearExpr::term(VarId(1), 1.0) - 0.5);
        assert_eq!(regime.referenced_vars(), vec![VarId(3), VarId(1)]);
    }

    #[test]
    fn test_segment_labels() {
        assert_eq!(RegimeKind::PiecewiseSegment(2).label(), "seg2");
        assert_eq!(RegimeKind::Off.label(), "off");
    }
}
