//! Storage technologies: level recurrence over a cyclic horizon.
//!
//! The level in each timestep follows from the previous level, decayed by
//! self-discharge, plus the efficiency-weighted net flow. The horizon is a
//! ring: the first timestep couples to the last, so the level series is
//! conserved over a full cycle. With time-averaged data (Δ > 1) one model
//! step stands for Δ real steps, so the decay compounds and the net flow is
//! weighted by the decay-geometric sum.
//!
//! Ambient losses come in two fitted flavors, selected per technology by
//! [`StorageLossVariant`].

use entec_core::{Carrier, EntecError, EntecResult, TechnologyDescriptor};

use crate::disjunction::{assemble, Relaxation};
use crate::expr::{LinearConstraint, LinearExpr, VarId};
use crate::model::{FormulationContext, ModelStore};
use crate::performance::FittedPerformance;
use crate::regime::Regime;
use crate::tech::size_variable;

/// How the fitted ambient loss series enters the level recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageLossVariant {
    /// The ambient series is an absolute loss per size unit, decayed like
    /// the carried-over level:
    /// `level[t-1]·(1-λ)^Δ − ambient[t]·(1-λ)^Δ·size + net flow`.
    #[default]
    SimpleSelfDischarge,
    /// The ambient series modulates the carried-over level:
    /// `level[t-1]·((1-λ)^Δ − ambient[t-1]^Δ) + net flow`.
    AmbientModulatedSelfDischarge,
}

/// Variables created for one storage technology.
#[derive(Debug, Clone)]
pub struct StorageVars {
    pub size: VarId,
    /// Storage level per (carrier, timestep).
    pub level: Vec<(Carrier, Vec<VarId>)>,
    /// Charging flow per (carrier, timestep), in carrier order.
    pub input: Vec<(Carrier, Vec<VarId>)>,
    /// Discharging flow per (carrier, timestep), in carrier order.
    pub output: Vec<(Carrier, Vec<VarId>)>,
    /// Direction-exclusion activations per timestep, when enabled.
    pub direction: Vec<Vec<VarId>>,
}

/// Decay-geometric weight of the net flow: `Σ_{i<Δ} (1-λ)^i`.
fn flow_weight(lambda: f64, delta: usize) -> f64 {
    (0..delta).map(|i| (1.0 - lambda).powi(i as i32)).sum()
}

/// Coefficients of the level recurrence at one timestep.
///
/// `level[t] = carry·level[prev] − ambient_size·size + weight·(η_in·in − out/η_out)`
pub(crate) struct RecurrenceCoeffs {
    pub carry: f64,
    pub ambient_size: f64,
    pub weight: f64,
}

pub(crate) fn recurrence_coeffs(
    perf: &FittedPerformance,
    variant: StorageLossVariant,
    delta: usize,
    t: usize,
    prev: usize,
) -> RecurrenceCoeffs {
    let decay = (1.0 - perf.lambda).powi(delta as i32);
    let ambient = |i: usize| perf.ambient_loss_factor.get(i).copied().unwrap_or(0.0);
    let (carry, ambient_size) = match variant {
        StorageLossVariant::SimpleSelfDischarge => (decay, ambient(t) * decay),
        StorageLossVariant::AmbientModulatedSelfDischarge => {
            (decay - ambient(prev).powi(delta as i32), 0.0)
        }
    };
    RecurrenceCoeffs {
        carry,
        ambient_size,
        weight: flow_weight(perf.lambda, delta),
    }
}

/// Append the constraints of a storage technology to `store`.
///
/// Storage always runs over the full horizon; clustered time sets do not
/// apply to level recurrences.
pub fn build_storage(
    store: &mut ModelStore,
    ctx: &FormulationContext,
    desc: &TechnologyDescriptor,
    perf: &FittedPerformance,
    variant: StorageLossVariant,
) -> EntecResult<StorageVars> {
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

    if !(perf.eta_in > 0.0 && perf.eta_out > 0.0) {
        return Err(EntecError::Config(format!(
            "technology '{tec}': charge/discharge efficiencies must be positive"
        )));
    }
    if !(0.0..=1.0).contains(&perf.lambda) {
        return Err(EntecError::Config(format!(
            "technology '{tec}': self-discharge coefficient {} outside [0, 1]",
            perf.lambda
        )));
    }

    let size = size_variable(store, desc);

    let mut level = Vec::new();
    let mut input = Vec::new();
    let mut output = Vec::new();
    for car in &desc.input_carrier {
        let flow_ub = |rate: f64| rate * desc.size_max;
        let lv: Vec<VarId> = (0..steps)
            .map(|t| store.continuous(format!("{tec}.level[{t},{car}]"), 0.0, desc.size_max))
            .collect();
        let inp: Vec<VarId> = (0..steps)
            .map(|t| {
                let (lo, hi) = perf.bounds.input_at(car, t, (0.0, flow_ub(perf.charge_max)));
                store.continuous(format!("{tec}.input[{t},{car}]"), lo, hi)
            })
            .collect();
        let out: Vec<VarId> = (0..steps)
            .map(|t| {
                let (lo, hi) = perf
                    .bounds
                    .output_at(car, t, (0.0, flow_ub(perf.discharge_max)));
                store.continuous(format!("{tec}.output[{t},{car}]"), lo, hi)
            })
            .collect();
        level.push((car.clone(), lv));
        input.push((car.clone(), inp));
        output.push((car.clone(), out));
    }

    for ((car, lv), (inp, out)) in level
        .iter()
        .zip(input.iter().map(|(_, v)| v).zip(output.iter().map(|(_, v)| v)))
    {
        for t in 0..steps {
            // fill window: min_fill·size ≤ level ≤ size
            store.add_constraint(LinearConstraint::le(
                format!("{tec}.fill_hi[{t},{car}]"),
                LinearExpr::from(lv[t]) - size,
            ));
            if perf.min_fill > 0.0 {
                store.add_constraint(LinearConstraint::ge(
                    format!("{tec}.fill_lo[{t},{car}]"),
                    LinearExpr::from(lv[t]) - LinearExpr::term(size, perf.min_fill),
                ));
            }

            // ring recurrence: t = 0 couples to the last timestep
            let prev = if t == 0 { steps - 1 } else { t - 1 };
            let c = recurrence_coeffs(perf, variant, delta, t, prev);
            let mut expr = LinearExpr::from(lv[t])
                - LinearExpr::term(lv[prev], c.carry)
                - LinearExpr::term(inp[t], c.weight * perf.eta_in)
                + LinearExpr::term(out[t], c.weight / perf.eta_out);
            if c.ambient_size != 0.0 {
                expr = expr + LinearExpr::term(size, c.ambient_size);
            }
            store.add_constraint(LinearConstraint::eq(format!("{tec}.level[{t},{car}]"), expr));

            // rate caps
            store.add_constraint(LinearConstraint::le(
                format!("{tec}.charge_cap[{t},{car}]"),
                LinearExpr::from(inp[t]) - LinearExpr::term(size, perf.charge_max),
            ));
            store.add_constraint(LinearConstraint::le(
                format!("{tec}.discharge_cap[{t},{car}]"),
                LinearExpr::from(out[t]) - LinearExpr::term(size, perf.discharge_max),
            ));
        }
    }

    // simultaneous charge and discharge wastes energy; exclude it on request
    let mut direction = Vec::new();
    if desc.one_direction_only() {
        for t in 0..steps {
            let charging = Regime::off(
                output
                    .iter()
                    .map(|(car, v)| (format!("output_zero[{car}]"), v[t])),
            );
            let discharging = Regime::off(
                input
                    .iter()
                    .map(|(car, v)| (format!("input_zero[{car}]"), v[t])),
            );
            let d = assemble(
                store,
                &format!("{tec}.dir{t}"),
                &[charging, discharging],
                Relaxation::BigM,
            )?;
            direction.push(d.activations);
        }
    }

    Ok(StorageVars {
        size,
        level,
        input,
        output,
        direction,
    })
}
