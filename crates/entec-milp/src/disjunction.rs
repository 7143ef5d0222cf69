//! Relaxation of "exactly one of N regimes" disjunctions.
//!
//! [`assemble`] creates one binary activation variable per regime, emits the
//! exactly-one constraint, and relaxes each regime's constraints so they bind
//! only while their activation is 1:
//!
//! - [`Relaxation::ConvexHull`] disaggregates every continuous variable a
//!   regime references into a per-regime copy gated by the activation
//!   (`lb·y ≤ v_r ≤ ub·y`), rewrites the regime constraints over the copies
//!   with constants scaled by the activation, and ties the copies back with
//!   `Σ_r v_r = v`. Tightest relaxation, more variables.
//! - [`Relaxation::BigM`] keeps the original variables and slackens each
//!   constraint by a constant derived from the interval bounds of its
//!   expression. Setting any big-M constraint latches the model-wide
//!   [`crate::model::ModelStore::big_m_used`] flag so the solver layer can
//!   loosen tolerances.
//!
//! Both encodings need finite bounds on every gated variable; an unbounded
//! variable is a validation error naming it.

use entec_core::{EntecError, EntecResult};

use crate::expr::{LinearConstraint, LinearExpr, Sense, VarId, VarKind};
use crate::model::ModelStore;
use crate::regime::Regime;

/// How a disjunction is relaxed into linear constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relaxation {
    ConvexHull,
    BigM,
}

/// The variables created for one assembled disjunction.
#[derive(Debug, Clone)]
pub struct AssembledDisjunction {
    /// One binary per regime, in regime order.
    pub activations: Vec<VarId>,
}

/// Relax `regimes` into `store` under `namespace` (e.g. `"chp.t3"`).
pub fn assemble(
    store: &mut ModelStore,
    namespace: &str,
    regimes: &[Regime],
    relaxation: Relaxation,
) -> EntecResult<AssembledDisjunction> {
    if regimes.len() < 2 {
        return Err(EntecError::Config(format!(
            "disjunction '{namespace}' needs at least two regimes, got {}",
            regimes.len()
        )));
    }

    let activations: Vec<VarId> = regimes
        .iter()
        .map(|r| store.binary(format!("{namespace}.{}.active", r.kind.label())))
        .collect();
    store.add_constraint(LinearConstraint::eq(
        format!("{namespace}.exactly_one"),
        LinearExpr::sum(activations.iter().copied()) - 1.0,
    ));

    match relaxation {
        Relaxation::ConvexHull => hull(store, namespace, regimes, &activations)?,
        Relaxation::BigM => {
            big_m(store, namespace, regimes, &activations)?;
            store.mark_big_m_used();
        }
    }

    Ok(AssembledDisjunction { activations })
}

fn finite_bounds(store: &ModelStore, namespace: &str, var: VarId) -> EntecResult<(f64, f64)> {
    let def = store.var(var);
    if !def.lower.is_finite() || !def.upper.is_finite() {
        return Err(EntecError::Validation(format!(
            "disjunction '{namespace}': variable '{}' must have finite bounds",
            def.name
        )));
    }
    Ok((def.lower, def.upper))
}

fn hull(
    store: &mut ModelStore,
    namespace: &str,
    regimes: &[Regime],
    activations: &[VarId],
) -> EntecResult<()> {
    // Disaggregate every variable referenced by any regime once.
    let mut gated: Vec<VarId> = Vec::new();
    for regime in regimes {
        for v in regime.referenced_vars() {
            if !gated.contains(&v) {
                gated.push(v);
            }
        }
    }
    for &v in &gated {
        if store.var(v).kind != VarKind::Continuous {
            return Err(EntecError::Validation(format!(
                "disjunction '{namespace}': hull encoding gates continuous \
                 variables only, '{}' is discrete",
                store.var(v).name
            )));
        }
    }

    // copies[g][r]: disaggregated copy of gated[g] in regime r
    let mut copies: Vec<Vec<VarId>> = Vec::with_capacity(gated.len());
    for &v in &gated {
        let (lb, ub) = finite_bounds(store, namespace, v)?;
        let base = store.var(v).name.clone();
        let mut per_regime = Vec::with_capacity(regimes.len());
        for (r, (regime, &y)) in regimes.iter().zip(activations).enumerate() {
            let copy = store.continuous(
                format!("{base}.{}", regime.kind.label()),
                lb.min(0.0),
                ub.max(0.0),
            );
            store.add_constraint(LinearConstraint::le(
                format!("{namespace}.r{r}.ub[{base}]"),
                LinearExpr::from(copy) - LinearExpr::term(y, ub),
            ));
            store.add_constraint(LinearConstraint::ge(
                format!("{namespace}.r{r}.lb[{base}]"),
                LinearExpr::from(copy) - LinearExpr::term(y, lb),
            ));
            per_regime.push(copy);
        }
        store.add_constraint(LinearConstraint::eq(
            format!("{namespace}.agg[{base}]"),
            LinearExpr::sum(per_regime.iter().copied()) - v,
        ));
        copies.push(per_regime);
    }

    // Regime constraints over the copies, constants scaled by the activation.
    let to_copy = |r: usize, v: VarId| -> VarId {
        match gated.iter().position(|g| *g == v) {
            Some(g) => copies[g][r],
            None => v,
        }
    };
    for (r, (regime, &y)) in regimes.iter().zip(activations).enumerate() {
        for c in regime.constraints() {
            let mut expr = c.expr.substituted(|v| to_copy(r, v));
            let constant = expr.constant;
            expr.constant = 0.0;
            let expr = expr + LinearExpr::term(y, constant);
            let name = format!("{namespace}.r{r}.{}", c.name);
            store.add_constraint(match c.sense {
                Sense::Eq => LinearConstraint::eq(name, expr),
                Sense::Le => LinearConstraint::le(name, expr),
                Sense::Ge => LinearConstraint::ge(name, expr),
            });
        }
    }
    Ok(())
}

fn big_m(
    store: &mut ModelStore,
    namespace: &str,
    regimes: &[Regime],
    activations: &[VarId],
) -> EntecResult<()> {
    for (r, (regime, &y)) in regimes.iter().zip(activations).enumerate() {
        for v in regime.referenced_vars() {
            finite_bounds(store, namespace, v)?;
        }
        let mut relaxed = Vec::new();
        for c in regime.constraints() {
            let (lo, hi) = c.expr.bounds(store.vars());
            let name = format!("{namespace}.r{r}.{}", c.name);
            // expr ≤ M·(1 − y) with M the interval upper bound; likewise
            // expr ≥ m·(1 − y) below. Active regime (y = 1) recovers the
            // original constraint, inactive regimes are slack by exactly
            // the expression's reachable range.
            if matches!(c.sense, Sense::Le | Sense::Eq) {
                let m = hi.max(0.0);
                relaxed.push(LinearConstraint::le(
                    format!("{name}.ub"),
                    c.expr.clone() + LinearExpr::term(y, m) - m,
                ));
            }
            if matches!(c.sense, Sense::Ge | Sense::Eq) {
                let m = lo.min(0.0);
                relaxed.push(LinearConstraint::ge(
                    format!("{name}.lb"),
                    c.expr.clone() + LinearExpr::term(y, m) - m,
                ));
            }
        }
        store.add_constraints(relaxed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regime::RegimeKind;

    /// Off/on disjunction over one flow variable: off forces x = 0, on pins
    /// x = 0.8·u − 0.1 for a driver u.
    fn two_regimes(store: &mut ModelStore) -> (VarId, VarId, Vec<Regime>) {
        let u = store.continuous("u", 0.0, 2.0);
        let x = store.continuous("x", 0.0, 2.0);
        let off = Regime::off([("x_zero".to_string(), x)]);
        let mut on = Regime::new(RegimeKind::LinearWithOffset);
        on.push_eq(
            "perf",
            LinearExpr::from(x) - LinearExpr::term(u, 0.8) + 0.1,
        );
        on.push_ge("floor", LinearExpr::from(u) - 0.5);
        (u, x, vec![off, on])
    }

    #[test]
    fn test_big_m_sets_flag_and_gates() {
        let mut store = ModelStore::new();
        let (_, _, regimes) = two_regimes(&mut store);
        let d = assemble(&mut store, "tec.t0", &regimes, Relaxation::BigM).unwrap();
        assert!(store.big_m_used());
        assert_eq!(d.activations.len(), 2);

        // point layout: [u, x, y_off, y_on]
        // off active: everything at rest
        assert!(store.check_point(&[0.0, 0.0, 1.0, 0.0], 1e-9).is_ok());
        // on active at u = 1: x = 0.7
        assert!(store.check_point(&[1.0, 0.7, 0.0, 1.0], 1e-9).is_ok());
        // on active below min part load: floor violated
        assert!(store.check_point(&[0.2, 0.06, 0.0, 1.0], 1e-9).is_err());
        // off active but flow non-zero: off regime violated
        assert!(store.check_point(&[0.0, 1.0, 1.0, 0.0], 1e-9).is_err());
        // no regime active
        assert!(store.check_point(&[1.0, 0.7, 0.0, 0.0], 1e-9).is_err());
    }

    #[test]
    fn test_hull_disaggregates_and_reaggregates() {
        let mut store = ModelStore::new();
        let (_, _, regimes) = two_regimes(&mut store);
        let d = assemble(&mut store, "tec.t0", &regimes, Relaxation::ConvexHull).unwrap();
        assert!(!store.big_m_used());

        // layout: [u, x, y_off, y_on, x.off, x.on, u.off, u.on]
        // (x is referenced first, by the off regime)
        let n = store.num_vars();
        assert_eq!(n, 8);
        assert_eq!(d.activations, vec![VarId(2), VarId(3)]);

        // on active at u = 1, x = 0.7: copies carry the full value
        let point = [1.0, 0.7, 0.0, 1.0, 0.0, 0.7, 0.0, 1.0];
        assert!(store.check_point(&point, 1e-9).is_ok());
        // off active, all rest
        let point = [0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        assert!(store.check_point(&point, 1e-9).is_ok());
        // copies not summing to the aggregate
        let point = [1.0, 0.7, 0.0, 1.0, 0.2, 0.7, 0.0, 1.0];
        assert!(store.check_point(&point, 1e-9).is_err());
    }

    #[test]
    fn test_unbounded_variable_rejected() {
        let mut store = ModelStore::new();
        let x = store.continuous("x", 0.0, f64::INFINITY);
        let mut on = Regime::new(RegimeKind::LinearThroughOrigin);
        on.push_le("cap", LinearExpr::from(x) - 1.0);
        let regimes = vec![Regime::off([("x_zero".to_string(), x)]), on];
        for relaxation in [Relaxation::BigM, Relaxation::ConvexHull] {
            let err = assemble(&mut store, "tec", &regimes, relaxation);
            assert!(matches!(err, Err(EntecError::Validation(_))));
        }
    }

    #[test]
    fn test_single_regime_rejected() {
        let mut store = ModelStore::new();
        let x = store.continuous("x", 0.0, 1.0);
        let regimes = vec![Regime::off([("x_zero".to_string(), x)])];
        assert!(matches!(
            assemble(&mut store, "tec", &regimes, Relaxation::BigM),
            Err(EntecError::Config(_))
        ));
    }
}
