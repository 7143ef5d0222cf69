//! Renewable technologies: output follows a capacity factor series.
//!
//! Production available at `t` is `capacity_factor[t] × size × rated_power`.
//! The curtailment policy decides how much of it must be taken:
//!
//! - [`Curtailment::Disallowed`]: output equals the available production.
//! - [`Curtailment::Continuous`]: output may fall anywhere below it.
//! - [`Curtailment::Discrete`]: an integer number of units is on per
//!   timestep, bounded by the (integer) size; output follows the on-units.
//!
//! No activation binaries are needed; the discrete mode introduces one
//! integer variable per timestep instead.

use std::collections::BTreeMap;

use entec_core::{Carrier, Curtailment, EntecResult, TechnologyDescriptor};

use crate::expr::{LinearConstraint, LinearExpr, VarId};
use crate::model::{FormulationContext, ModelStore};
use crate::performance::FittedPerformance;
use crate::tech::{rated_power, size_variable};

/// Variables created for one renewable technology.
#[derive(Debug, Clone)]
pub struct ResVars {
    pub size: VarId,
    /// Output flow per (carrier, timestep).
    pub output: BTreeMap<Carrier, Vec<VarId>>,
    /// Units on per timestep; discrete curtailment only.
    pub units_on: Option<Vec<VarId>>,
}

/// Append the constraints of a renewable technology to `store`.
///
/// Renewable production is tied to the full horizon regardless of the
/// context's selected time set.
pub fn build_res(
    store: &mut ModelStore,
    ctx: &FormulationContext,
    desc: &TechnologyDescriptor,
    perf: &FittedPerformance,
) -> EntecResult<ResVars> {
    desc.validate()?;
    let steps = ctx.full_steps();
    let rp = rated_power(desc, perf.rated_power);
    let capfactor = perf.capacity_factor_or_err(&desc.name, steps)?.to_vec();

    let size = size_variable(store, desc);

    let mut output: BTreeMap<Carrier, Vec<VarId>> = BTreeMap::new();
    for car in &desc.output_carrier {
        let vars: Vec<VarId> = (0..steps)
            .map(|t| {
                let fallback = (0.0, capfactor[t] * desc.size_max * rp);
                let (lo, hi) = perf.bounds.output_at(car, t, fallback);
                store.continuous(format!("{}.output[{t},{car}]", desc.name), lo, hi)
            })
            .collect();
        output.insert(car.clone(), vars);
    }

    let units_on = match desc.curtailment {
        Curtailment::Disallowed | Curtailment::Continuous => None,
        Curtailment::Discrete => {
            let vars: Vec<VarId> = (0..steps)
                .map(|t| store.integer(format!("{}.units_on[{t}]", desc.name), 0.0, desc.size_max))
                .collect();
            for (t, &on) in vars.iter().enumerate() {
                store.add_constraint(LinearConstraint::le(
                    format!("{}.curtailed_units[{t}]", desc.name),
                    LinearExpr::from(on) - size,
                ));
            }
            Some(vars)
        }
    };

    for (car, vars) in &output {
        for (t, &out) in vars.iter().enumerate() {
            let name = format!("{}.gen[{t},{car}]", desc.name);
            let available = match &units_on {
                Some(on) => LinearExpr::term(on[t], capfactor[t] * rp),
                None => LinearExpr::term(size, capfactor[t] * rp),
            };
            let expr = LinearExpr::from(out) - available;
            store.add_constraint(match desc.curtailment {
                Curtailment::Continuous => LinearConstraint::le(name, expr),
                _ => LinearConstraint::eq(name, expr),
            });
        }
    }

    Ok(ResVars {
        size,
        output,
        units_on,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use entec_core::TimeHorizon;

    fn descriptor(curtailment: u8) -> TechnologyDescriptor {
        serde_json::from_str(&format!(
            r#"{{
                "name": "pv_1",
                "curtailment": {curtailment},
                "size_min": 0.0,
                "size_max": 10.0,
                "size_is_int": {},
                "output_carrier": ["electricity"]
            }}"#,
            curtailment == 2
        ))
        .unwrap()
    }

    fn perf(cf: &[f64]) -> FittedPerformance {
        FittedPerformance {
            capacity_factor: cf.to_vec(),
            ..FittedPerformance::default()
        }
    }

    #[test]
    fn test_no_curtailment_pins_output() {
        let mut store = ModelStore::new();
        let ctx = FormulationContext::new(TimeHorizon::full(2));
        let vars = build_res(&mut store, &ctx, &descriptor(0), &perf(&[0.5, 0.8])).unwrap();
        assert!(vars.units_on.is_none());
        assert!(!store.has_discrete_vars());

        // [size, out0, out1]: size 10 gives exactly [5, 8]
        assert!(store.check_point(&[10.0, 5.0, 8.0], 1e-9).is_ok());
        assert!(store.check_point(&[10.0, 4.0, 8.0], 1e-9).is_err());
    }

    #[test]
    fn test_continuous_curtailment_allows_less() {
        let mut store = ModelStore::new();
        let ctx = FormulationContext::new(TimeHorizon::full(2));
        build_res(&mut store, &ctx, &descriptor(1), &perf(&[0.5, 0.8])).unwrap();
        assert!(store.check_point(&[10.0, 4.0, 0.0], 1e-9).is_ok());
        assert!(store.check_point(&[10.0, 6.0, 8.0], 1e-9).is_err());
    }

    #[test]
    fn test_discrete_curtailment_follows_units_on() {
        let mut store = ModelStore::new();
        let ctx = FormulationContext::new(TimeHorizon::full(1));
        let mut perf = perf(&[0.5]);
        perf.rated_power = 2.0;
        let vars = build_res(&mut store, &ctx, &descriptor(2), &perf).unwrap();
        assert!(vars.units_on.is_some());

        // [size, out0, on0]: 3 of 4 units on, each rated 2.0
        assert!(store.check_point(&[4.0, 3.0, 3.0], 1e-9).is_ok());
        // more units on than installed
        assert!(store.check_point(&[4.0, 5.0, 5.0], 1e-9).is_err());
    }

    #[test]
    fn test_capacity_factor_length_checked() {
        let mut store = ModelStore::new();
        let ctx = FormulationContext::new(TimeHorizon::full(3));
        assert!(build_res(&mut store, &ctx, &descriptor(0), &perf(&[0.5])).is_err());
    }
}
