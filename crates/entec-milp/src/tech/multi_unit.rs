//! Banks of interchangeable pump/turbine units around a shared reservoir.
//!
//! A bank has a fixed number of slots. All units in a bank share one design
//! (a design flow and a design power, tied together by a piecewise design
//! curve), but each slot decides independently whether a unit is installed
//! and, per timestep, whether it runs. The disjunctions are relaxed with the
//! convex hull; the hierarchy of the formulation is flattened into three
//! linked flat disjunctions:
//!
//! - design: exactly one design-curve segment holds for the shared design
//!   variables;
//! - install, per slot: not installed fixes the slot's capex to zero,
//!   installed prices it linearly in the design flow;
//! - on/off, per slot and timestep: off fixes flow and power to zero, each
//!   on segment windows the flow against the design flow and relates power
//!   to design power and flow.
//!
//! A linking constraint keeps a slot that is not installed permanently off,
//! which is what nesting the on/off disjunction inside the install disjunct
//! achieved in the hierarchical form.
//!
//! [`build_multi_unit_storage`] wires two banks (pumps charging, turbines
//! discharging) to a reservoir level recurrence over the summed flows.

use entec_core::{EntecError, EntecResult, TechnologyDescriptor};

use crate::disjunction::{assemble, Relaxation};
use crate::expr::{LinearConstraint, LinearExpr, VarId};
use crate::model::{FormulationContext, ModelStore};
use crate::performance::FittedPerformance;
use crate::regime::{Regime, RegimeKind};
use crate::tech::size_variable;
use crate::tech::storage::{recurrence_coeffs, StorageLossVariant};

/// Fitted behavior of one unit type (all slots of a bank share it).
#[derive(Debug, Clone)]
pub struct UnitPerformance {
    /// Capex per unit of design flow for an installed slot.
    pub capex_per_designflow: f64,
    /// Design curve segments: `designpower = a1·designflow + a2`.
    pub design_alpha1: Vec<f64>,
    pub design_alpha2: Vec<f64>,
    /// Absolute design-flow breakpoints, `design segments + 1` entries.
    pub design_bp: Vec<f64>,
    /// Operating segments: `power = b1·designpower + b2·flow`.
    pub on_beta1: Vec<f64>,
    pub on_beta2: Vec<f64>,
    /// Flow windows as fractions of the design flow, `on segments + 1`.
    pub on_bp: Vec<f64>,
    /// Upper bounds for the shared design variables.
    pub flow_ub: f64,
    pub power_ub: f64,
    /// Upper bound for one slot's capex variable.
    pub capex_ub: f64,
}

impl UnitPerformance {
    fn validate(&self, bank: &str) -> EntecResult<()> {
        let d = self.design_alpha1.len();
        if self.design_alpha2.len() != d || self.design_bp.len() != d + 1 {
            return Err(EntecError::Config(format!(
                "bank '{bank}': design curve segments and breakpoints disagree"
            )));
        }
        let s = self.on_beta1.len();
        if self.on_beta2.len() != s || self.on_bp.len() != s + 1 {
            return Err(EntecError::Config(format!(
                "bank '{bank}': operating segments and breakpoints disagree"
            )));
        }
        if d == 0 || s == 0 {
            return Err(EntecError::Config(format!(
                "bank '{bank}': needs at least one design and one operating segment"
            )));
        }
        Ok(())
    }
}

/// One bank of identical unit slots.
#[derive(Debug, Clone)]
pub struct UnitBank {
    /// Bank name used in variable namespaces, e.g. `"pump"`.
    pub name: String,
    pub slots: usize,
    pub perf: UnitPerformance,
}

/// Variables created for one unit bank.
#[derive(Debug, Clone)]
pub struct UnitBankVars {
    /// Shared design flow and design power.
    pub designflow: VarId,
    pub designpower: VarId,
    /// Per-slot capex.
    pub capex: Vec<VarId>,
    /// Water flow per slot and timestep.
    pub flow: Vec<Vec<VarId>>,
    /// Electric power per slot and timestep.
    pub power: Vec<Vec<VarId>>,
    /// Install activation per slot.
    pub installed: Vec<VarId>,
    /// Summed flow and power per timestep.
    pub total_flow: Vec<VarId>,
    pub total_power: Vec<VarId>,
}

/// Append one bank's design, install and scheduling constraints to `store`.
pub fn build_unit_bank(
    store: &mut ModelStore,
    ctx: &FormulationContext,
    tec: &str,
    bank: &UnitBank,
) -> EntecResult<UnitBankVars> {
    bank.perf.validate(&bank.name)?;
    if bank.slots == 0 {
        return Err(EntecError::Config(format!(
            "bank '{}': needs at least one slot",
            bank.name
        )));
    }
    let steps = ctx.full_steps();
    let p = &bank.perf;
    let ns = format!("{tec}.{}", bank.name);

    let designflow = store.continuous(format!("{ns}.designflow"), 0.0, p.flow_ub);
    let designpower = store.continuous(format!("{ns}.designpower"), 0.0, p.power_ub);

    // Shared design curve: exactly one segment binds the design variables.
    let design_segments = p.design_alpha1.len();
    if design_segments == 1 {
        store.add_constraint(LinearConstraint::eq(
            format!("{ns}.design_curve"),
            LinearExpr::from(designpower)
                - LinearExpr::term(designflow, p.design_alpha1[0])
                - p.design_alpha2[0],
        ));
    } else {
        let mut regimes = Vec::with_capacity(design_segments);
        for k in 0..design_segments {
            let mut seg = Regime::new(RegimeKind::PiecewiseSegment(k));
            seg.push_eq(
                "design_curve",
                LinearExpr::from(designpower)
                    - LinearExpr::term(designflow, p.design_alpha1[k])
                    - p.design_alpha2[k],
            );
            seg.push_ge("flow_lo", LinearExpr::from(designflow) - p.design_bp[k]);
            seg.push_le("flow_hi", LinearExpr::from(designflow) - p.design_bp[k + 1]);
            regimes.push(seg);
        }
        assemble(store, &format!("{ns}.design"), &regimes, Relaxation::ConvexHull)?;
    }

    let mut capex = Vec::with_capacity(bank.slots);
    let mut flow = Vec::with_capacity(bank.slots);
    let mut power = Vec::with_capacity(bank.slots);
    let mut installed = Vec::with_capacity(bank.slots);
    for slot in 0..bank.slots {
        let cx = store.continuous(format!("{ns}{slot}.capex"), 0.0, p.capex_ub);
        let fl: Vec<VarId> = (0..steps)
            .map(|t| store.continuous(format!("{ns}{slot}.flow[{t}]"), 0.0, p.flow_ub))
            .collect();
        let pw: Vec<VarId> = (0..steps)
            .map(|t| store.continuous(format!("{ns}{slot}.power[{t}]"), 0.0, p.power_ub))
            .collect();

        // install: capex is zero or linear in the shared design flow
        let not_installed = Regime::off([("capex_zero".to_string(), cx)]);
        let mut install = Regime::new(RegimeKind::LinearThroughOrigin);
        install.push_eq(
            "capex",
            LinearExpr::from(cx) - LinearExpr::term(designflow, p.capex_per_designflow),
        );
        let d = assemble(
            store,
            &format!("{ns}{slot}.install"),
            &[not_installed, install],
            Relaxation::ConvexHull,
        )?;
        let y_installed = d.activations[1];

        // on/off scheduling per timestep
        for t in 0..steps {
            let mut regimes = vec![Regime::off([
                ("flow_zero".to_string(), fl[t]),
                ("power_zero".to_string(), pw[t]),
            ])];
            for s in 0..p.on_beta1.len() {
                let mut on = Regime::new(RegimeKind::PiecewiseSegment(s));
                on.push_ge(
                    "flow_lo",
                    LinearExpr::from(fl[t]) - LinearExpr::term(designflow, p.on_bp[s]),
                );
                on.push_le(
                    "flow_hi",
                    LinearExpr::from(fl[t]) - LinearExpr::term(designflow, p.on_bp[s + 1]),
                );
                on.push_eq(
                    "power",
                    LinearExpr::from(pw[t])
                        - LinearExpr::term(designpower, p.on_beta1[s])
                        - LinearExpr::term(fl[t], p.on_beta2[s]),
                );
                regimes.push(on);
            }
            let d = assemble(
                store,
                &format!("{ns}{slot}.t{t}"),
                &regimes,
                Relaxation::ConvexHull,
            )?;
            // a slot without a unit can never be on
            store.add_constraint(LinearConstraint::le(
                format!("{ns}{slot}.t{t}.needs_install"),
                LinearExpr::sum(d.activations[1..].iter().copied()) - y_installed,
            ));
        }

        capex.push(cx);
        flow.push(fl);
        power.push(pw);
        installed.push(y_installed);
    }

    // bank totals
    let mut total_flow = Vec::with_capacity(steps);
    let mut total_power = Vec::with_capacity(steps);
    for t in 0..steps {
        let tf = store.continuous(
            format!("{ns}.total_flow[{t}]"),
            0.0,
            p.flow_ub * bank.slots as f64,
        );
        let tp = store.continuous(
            format!("{ns}.total_power[{t}]"),
            0.0,
            p.power_ub * bank.slots as f64,
        );
        store.add_constraint(LinearConstraint::eq(
            format!("{ns}.total_flow[{t}]"),
            LinearExpr::sum(flow.iter().map(|f| f[t])) - tf,
        ));
        store.add_constraint(LinearConstraint::eq(
            format!("{ns}.total_power[{t}]"),
            LinearExpr::sum(power.iter().map(|p| p[t])) - tp,
        ));
        total_flow.push(tf);
        total_power.push(tp);
    }

    Ok(UnitBankVars {
        designflow,
        designpower,
        capex,
        flow,
        power,
        installed,
        total_flow,
        total_power,
    })
}

/// Variables created for a multi-unit storage technology.
#[derive(Debug, Clone)]
pub struct MultiUnitStorageVars {
    pub size: VarId,
    /// Reservoir level per timestep.
    pub level: Vec<VarId>,
    pub pumps: UnitBankVars,
    pub turbines: UnitBankVars,
    /// Aggregate capex: reservoir plus every slot.
    pub capex: VarId,
}

/// A reservoir with pump and turbine banks: pumps fill it, turbines drain it.
///
/// The reservoir level follows the storage ring recurrence over the summed
/// pump inflow and turbine outflow; `reservoir_capex` prices the reservoir
/// size into the aggregate capex.
pub fn build_multi_unit_storage(
    store: &mut ModelStore,
    ctx: &FormulationContext,
    desc: &TechnologyDescriptor,
    perf: &FittedPerformance,
    pumps: &UnitBank,
    turbines: &UnitBank,
    reservoir_capex: f64,
) -> EntecResult<MultiUnitStorageVars> {
    desc.validate()?;
    let steps = ctx.full_steps();
    if steps == 0 {
        return Err(EntecError::Config(format!(
            "technology '{}': storage needs a non-empty horizon",
            desc.name
        )));
    }
    let delta = ctx.timesteps_averaged();
    let tec = desc.name.as_str();

    let size = size_variable(store, desc);
    let level: Vec<VarId> = (0..steps)
        .map(|t| store.continuous(format!("{tec}.level[{t}]"), 0.0, desc.size_max))
        .collect();

    let pumps = build_unit_bank(store, ctx, tec, pumps)?;
    let turbines = build_unit_bank(store, ctx, tec, turbines)?;

    for t in 0..steps {
        store.add_constraint(LinearConstraint::le(
            format!("{tec}.fill_hi[{t}]"),
            LinearExpr::from(level[t]) - size,
        ));
        if perf.min_fill > 0.0 {
            store.add_constraint(LinearConstraint::ge(
                format!("{tec}.fill_lo[{t}]"),
                LinearExpr::from(level[t]) - LinearExpr::term(size, perf.min_fill),
            ));
        }

        let prev = if t == 0 { steps - 1 } else { t - 1 };
        let c = recurrence_coeffs(perf, StorageLossVariant::SimpleSelfDischarge, delta, t, prev);
        store.add_constraint(LinearConstraint::eq(
            format!("{tec}.level[{t}]"),
            LinearExpr::from(level[t])
                - LinearExpr::term(level[prev], c.carry)
                - LinearExpr::term(pumps.total_flow[t], c.weight)
                + LinearExpr::term(turbines.total_flow[t], c.weight),
        ));
    }

    let capex_ub = reservoir_capex * desc.size_max
        + pumps.capex.len() as f64 * store.var(pumps.capex[0]).upper
        + turbines.capex.len() as f64 * store.var(turbines.capex[0]).upper;
    let capex = store.continuous(format!("{tec}.capex"), 0.0, capex_ub);
    store.add_constraint(LinearConstraint::eq(
        format!("{tec}.capex"),
        LinearExpr::term(size, reservoir_capex)
            + LinearExpr::sum(pumps.capex.iter().copied())
            + LinearExpr::sum(turbines.capex.iter().copied())
            - capex,
    ));

    Ok(MultiUnitStorageVars {
        size,
        level,
        pumps,
        turbines,
        capex,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use entec_core::TimeHorizon;

    fn bank(name: &str, slots: usize) -> UnitBank {
        UnitBank {
            name: name.to_string(),
            slots,
            perf: UnitPerformance {
                capex_per_designflow: 100.0,
                design_alpha1: vec![2.0],
                design_alpha2: vec![0.0],
                design_bp: vec![0.0, 10.0],
                on_beta1: vec![1.8],
                on_beta2: vec![0.0],
                on_bp: vec![0.1, 1.0],
                flow_ub: 10.0,
                power_ub: 20.0,
                capex_ub: 1000.0,
            },
        }
    }

    #[test]
    fn test_uninstalled_slot_cannot_run() {
        let mut store = ModelStore::new();
        let ctx = FormulationContext::new(TimeHorizon::full(1));
        let vars = build_unit_bank(&mut store, &ctx, "ob", &bank("pump", 1)).unwrap();

        // off activation + on activations of the single slot at t 0
        let on = vars.installed[0];
        let needs_install = store
            .constraints()
            .iter()
            .find(|c| c.name == "ob.pump0.t0.needs_install")
            .unwrap();
        // the link references the install activation
        assert!(needs_install.expr.variables().any(|v| v == on));
    }

    #[test]
    fn test_capex_prices_design_flow() {
        let mut store = ModelStore::new();
        let ctx = FormulationContext::new(TimeHorizon::full(1));
        let vars = build_unit_bank(&mut store, &ctx, "ob", &bank("turbine", 2)).unwrap();
        // two slots, one shared design
        assert_eq!(vars.capex.len(), 2);
        assert_eq!(vars.flow.len(), 2);
        let installed_capex = store
            .constraints()
            .iter()
            .filter(|c| c.name.contains("install") && c.name.ends_with("capex"))
            .count();
        assert_eq!(installed_capex, 2);
    }

    #[test]
    fn test_reservoir_recurrence_over_totals() {
        let mut store = ModelStore::new();
        let ctx = FormulationContext::new(TimeHorizon::full(2));
        let desc: TechnologyDescriptor = serde_json::from_str(
            r#"{
                "name": "ob",
                "size_min": 0.0,
                "size_max": 1000.0,
                "input_carrier": ["electricity"],
                "output_carrier": ["electricity"]
            }"#,
        )
        .unwrap();
        let perf = FittedPerformance {
            min_fill: 0.1,
            ..FittedPerformance::default()
        };
        let vars = build_multi_unit_storage(
            &mut store,
            &ctx,
            &desc,
            &perf,
            &bank("pump", 2),
            &bank("turbine", 1),
            5.0,
        )
        .unwrap();
        assert_eq!(vars.level.len(), 2);
        assert_eq!(vars.pumps.capex.len(), 2);
        assert_eq!(vars.turbines.capex.len(), 1);

        let recurrences: Vec<_> = store
            .constraints()
            .iter()
            .filter(|c| c.name.starts_with("ob.level["))
            .collect();
        assert_eq!(recurrences.len(), 2);
        // the t=0 recurrence couples to the last level (the ring)
        assert!(recurrences[0].expr.variables().any(|v| v == vars.level[1]));
        // and to the pump inflow total
        assert!(recurrences[0]
            .expr
            .variables()
            .any(|v| v == vars.pumps.total_flow[0]));
    }
}
