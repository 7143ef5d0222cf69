//! Lowering the model store to a `good_lp` problem.
//!
//! The constraint store is solver-agnostic; this adapter hands it to the
//! Clarabel backend as a continuous LP. Binary and integer variables are
//! relaxed to their interval bounds — Clarabel is an interior-point conic
//! solver with no branching, so the result is the LP relaxation of the MILP.
//! Scenarios without discrete decisions (or where the relaxation is known to
//! be tight) solve exactly; [`LpSolution::is_integral`] reports whether the
//! relaxation happened to land on integral activations.

use good_lp::solvers::clarabel::clarabel;
use good_lp::{variable, variables, Expression, Solution, SolverModel, Variable};
use tracing::debug;

use entec_core::{EntecError, EntecResult};

use crate::expr::{LinearExpr, Sense, VarKind};
use crate::model::ModelStore;

/// A solved LP relaxation, indexed by [`crate::expr::VarId`].
#[derive(Debug, Clone)]
pub struct LpSolution {
    values: Vec<f64>,
    objective: f64,
    relaxed: bool,
}

impl LpSolution {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn value(&self, var: crate::expr::VarId) -> f64 {
        self.values[var.index()]
    }

    pub fn objective(&self) -> f64 {
        self.objective
    }

    /// Whether any discrete variable was relaxed for this solve.
    pub fn relaxed(&self) -> bool {
        self.relaxed
    }

    /// Whether every relaxed discrete variable landed within `tol` of an
    /// integer anyway.
    pub fn is_integral(&self, store: &ModelStore, tol: f64) -> bool {
        store
            .vars()
            .iter()
            .zip(&self.values)
            .filter(|(def, _)| !matches!(def.kind, VarKind::Continuous))
            .all(|(_, v)| (v - v.round()).abs() <= tol)
    }
}

/// Minimize `objective` over the store's constraints with Clarabel.
pub fn solve_lp(store: &ModelStore, objective: &LinearExpr) -> EntecResult<LpSolution> {
    let mut vars = variables!();
    let handles: Vec<Variable> = store
        .vars()
        .iter()
        .map(|def| {
            let mut spec = variable();
            if def.lower.is_finite() {
                spec = spec.min(def.lower);
            }
            if def.upper.is_finite() {
                spec = spec.max(def.upper);
            }
            vars.add(spec)
        })
        .collect();

    let to_expr = |e: &LinearExpr| -> Expression {
        e.terms
            .iter()
            .fold(Expression::from(e.constant), |acc, (v, c)| {
                acc + *c * handles[v.index()]
            })
    };

    let mut problem = vars.minimise(to_expr(objective)).using(clarabel);
    for c in store.constraints() {
        let lhs = to_expr(&c.expr);
        problem = problem.with(match c.sense {
            Sense::Eq => lhs.eq(0.0),
            Sense::Le => lhs.leq(0.0),
            Sense::Ge => lhs.geq(0.0),
        });
    }

    debug!(
        vars = store.num_vars(),
        constraints = store.num_constraints(),
        big_m = store.big_m_used(),
        "solving LP relaxation"
    );
    let solution = problem
        .solve()
        .map_err(|e| EntecError::Other(format!("LP solve failed: {e:?}")))?;

    let values: Vec<f64> = handles.iter().map(|h| solution.value(*h)).collect();
    let objective = objective.eval(&values);
    Ok(LpSolution {
        values,
        objective,
        relaxed: store.has_discrete_vars(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::LinearConstraint;

    #[test]
    fn test_solves_small_lp() {
        let mut store = ModelStore::new();
        let x = store.continuous("x", 0.0, 10.0);
        let y = store.continuous("y", 0.0, 10.0);
        // x + y >= 4, minimize 2x + y -> x = 0, y = 4
        store.add_constraint(LinearConstraint::ge(
            "demand",
            LinearExpr::from(x) + y - 4.0,
        ));
        let objective = LinearExpr::term(x, 2.0) + LinearExpr::term(y, 1.0);
        let sol = solve_lp(&store, &objective).unwrap();
        assert!((sol.value(x) - 0.0).abs() < 1e-6);
        assert!((sol.value(y) - 4.0).abs() < 1e-6);
        assert!((sol.objective() - 4.0).abs() < 1e-6);
        assert!(!sol.relaxed());
    }

    #[test]
    fn test_infeasible_reports_error() {
        let mut store = ModelStore::new();
        let x = store.continuous("x", 0.0, 1.0);
        store.add_constraint(LinearConstraint::ge("too_much", LinearExpr::from(x) - 5.0));
        assert!(solve_lp(&store, &LinearExpr::from(x)).is_err());
    }

    #[test]
    fn test_relaxation_is_reported() {
        let mut store = ModelStore::new();
        let y = store.binary("y");
        store.add_constraint(LinearConstraint::ge("on", LinearExpr::from(y) - 1.0));
        let sol = solve_lp(&store, &LinearExpr::from(y)).unwrap();
        assert!(sol.relaxed());
        assert!(sol.is_integral(&store, 1e-6));
    }
}
