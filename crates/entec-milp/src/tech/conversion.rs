//! Conversion technologies: three archetypes, three performance types.
//!
//! Archetypes differ in what drives the performance curve and how outputs
//! are tied to it:
//!
//! - [`ConversionArchetype::FullSubstitution`]: inputs substitute freely;
//!   one curve relates the output sum to the input sum.
//! - [`ConversionArchetype::PerCarrierCurves`]: inputs substitute freely;
//!   each output carrier has its own curve against the input sum.
//! - [`ConversionArchetype::FixedRatio`]: curves run against the main input
//!   carrier; every other input is tied to it by a fixed ratio, in every
//!   regime including off.
//!
//! The performance type selects the regime structure. Through-origin needs no
//! binaries. Min-part-load and piecewise add an off regime and are relaxed
//! with big-M, which latches the model-wide flag. Cross-cutting constraints
//! (size cap on the driving input, per-carrier input share caps, fixed
//! ratios) sit outside the disjunction.

use std::collections::BTreeMap;

use entec_core::{
    Carrier, EntecError, EntecResult, PerformanceFunctionType, TechnologyDescriptor,
};
use tracing::warn;

use crate::disjunction::{assemble, Relaxation};
use crate::expr::{LinearConstraint, LinearExpr, VarId};
use crate::model::{FormulationContext, ModelStore};
use crate::performance::{FittedPerformance, SegmentCoefficients};
use crate::regime::{Regime, RegimeKind};
use crate::tech::{rated_power, size_variable};

/// How a conversion technology's inputs drive its outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionArchetype {
    /// `Σ output = f(Σ input)`.
    FullSubstitution,
    /// `output[car] = f_car(Σ input)`.
    PerCarrierCurves,
    /// `output[car] = f_car(input[main])`, other inputs at fixed ratios.
    FixedRatio,
}

/// Variables created for one conversion technology.
#[derive(Debug, Clone)]
pub struct ConversionVars {
    pub size: VarId,
    pub input: BTreeMap<Carrier, Vec<VarId>>,
    pub output: BTreeMap<Carrier, Vec<VarId>>,
    /// Regime activations per timestep; empty for through-origin curves.
    pub activations: Vec<Vec<VarId>>,
}

/// Append the constraints of a conversion technology to `store`.
pub fn build_conversion(
    store: &mut ModelStore,
    ctx: &FormulationContext,
    desc: &TechnologyDescriptor,
    perf: &FittedPerformance,
    archetype: ConversionArchetype,
) -> EntecResult<ConversionVars> {
    desc.validate()?;
    let steps = ctx.steps()?;
    let rp = rated_power(desc, perf.rated_power);
    let pft = desc.performance_function_type;
    let tec = desc.name.as_str();

    if pft.has_off_state() && desc.min_part_load == 0.0 {
        warn!(
            technology = tec,
            "an on/off performance function without a minimum part load \
             usually makes no sense"
        );
    }

    // Curves and the flow ceiling they imply, for variable fallback bounds.
    let drive_max = desc.size_max * rp;
    let curves = archetype_curves(desc, perf, archetype)?;
    let out_ceiling = |coeffs: &SegmentCoefficients| -> f64 {
        coeffs
            .alpha1
            .iter()
            .zip(&coeffs.alpha2)
            .map(|(a1, a2)| a1 * drive_max + a2 * desc.size_max * rp)
            .fold(0.0f64, f64::max)
    };

    let main = match archetype {
        ConversionArchetype::FixedRatio => {
            Some(desc.carrier_set()?.main_input_or_err(tec)?.clone())
        }
        _ => None,
    };

    let size = size_variable(store, desc);

    let mut input: BTreeMap<Carrier, Vec<VarId>> = BTreeMap::new();
    for car in &desc.input_carrier {
        let vars: Vec<VarId> = (0..steps)
            .map(|t| {
                let (lo, hi) = perf.bounds.input_at(car, t, (0.0, drive_max));
                store.continuous(format!("{tec}.input[{t},{car}]"), lo, hi)
            })
            .collect();
        input.insert(car.clone(), vars);
    }
    let mut output: BTreeMap<Carrier, Vec<VarId>> = BTreeMap::new();
    for car in &desc.output_carrier {
        let ceiling = match &curves {
            Curves::Aggregate(coeffs) => out_ceiling(coeffs),
            Curves::PerCarrier(map) => out_ceiling(&map[car]),
        };
        let vars: Vec<VarId> = (0..steps)
            .map(|t| {
                let (lo, hi) = perf.bounds.output_at(car, t, (0.0, ceiling));
                store.continuous(format!("{tec}.output[{t},{car}]"), lo, hi)
            })
            .collect();
        output.insert(car.clone(), vars);
    }

    // Driving input: the main carrier for fixed-ratio, the input sum otherwise.
    let drive = |t: usize, input: &BTreeMap<Carrier, Vec<VarId>>| -> LinearExpr {
        match &main {
            Some(main) => LinearExpr::from(input[main][t]),
            None => LinearExpr::sum(desc.input_carrier.iter().map(|c| input[c][t])),
        }
    };
    // Curve constraints of one regime: the output side minus the curve.
    let curve_eqs = |regime: &mut Regime, t: usize, seg: usize| {
        match &curves {
            Curves::Aggregate(coeffs) => {
                let out_sum = LinearExpr::sum(desc.output_carrier.iter().map(|c| output[c][t]));
                regime.push_eq(
                    "curve",
                    out_sum
                        - drive(t, &input) * coeffs.alpha1[seg]
                        - LinearExpr::term(size, coeffs.alpha2[seg] * rp),
                );
            }
            Curves::PerCarrier(map) => {
                for car in &desc.output_carrier {
                    let coeffs = &map[car];
                    regime.push_eq(
                        format!("curve[{car}]"),
                        LinearExpr::from(output[car][t])
                            - drive(t, &input) * coeffs.alpha1[seg]
                            - LinearExpr::term(size, coeffs.alpha2[seg] * rp),
                    );
                }
            }
        };
    };
    let off_regime = |t: usize| {
        Regime::off(
            desc.input_carrier
                .iter()
                .map(|c| (format!("input_zero[{c}]"), input[c][t]))
                .chain(
                    desc.output_carrier
                        .iter()
                        .map(|c| (format!("output_zero[{c}]"), output[c][t])),
                ),
        )
    };
    let min_part_load = |regime: &mut Regime, t: usize| {
        regime.push_ge(
            "min_part_load",
            drive(t, &input) - LinearExpr::term(size, desc.min_part_load * rp),
        );
    };

    let mut activations: Vec<Vec<VarId>> = Vec::new();
    match pft {
        PerformanceFunctionType::ThroughOrigin => {
            for t in 0..steps {
                let mut on = Regime::new(RegimeKind::LinearThroughOrigin);
                curve_eqs(&mut on, t, 0);
                store.add_constraints(on.constraints().iter().cloned().map(|mut c| {
                    c.name = format!("{tec}.t{t}.{}", c.name);
                    c
                }));
            }
        }
        PerformanceFunctionType::MinPartLoad => {
            for t in 0..steps {
                let mut on = Regime::new(RegimeKind::LinearWithOffset);
                curve_eqs(&mut on, t, 0);
                min_part_load(&mut on, t);
                let regimes = vec![off_regime(t), on];
                let d = assemble(store, &format!("{tec}.t{t}"), &regimes, Relaxation::BigM)?;
                activations.push(d.activations);
            }
        }
        PerformanceFunctionType::Piecewise => {
            let num_segments = match &curves {
                Curves::Aggregate(coeffs) => coeffs.num_segments(),
                Curves::PerCarrier(map) => map.values().next().map_or(0, |c| c.num_segments()),
            };
            if let Curves::PerCarrier(map) = &curves {
                for (car, coeffs) in map {
                    if coeffs.num_segments() != num_segments {
                        return Err(EntecError::Config(format!(
                            "technology '{tec}': carrier '{car}' fitted with {} segments, \
                             expected {num_segments}",
                            coeffs.num_segments()
                        )));
                    }
                }
            }
            let bp_x = match &curves {
                Curves::Aggregate(coeffs) => perf.breakpoints_or_err(tec, coeffs)?.to_vec(),
                Curves::PerCarrier(map) => {
                    let first = map.values().next().ok_or_else(|| {
                        EntecError::Config(format!("technology '{tec}': no fitted curves"))
                    })?;
                    perf.breakpoints_or_err(tec, first)?.to_vec()
                }
            };
            for t in 0..steps {
                let mut regimes = vec![off_regime(t)];
                for seg in 0..num_segments {
                    let mut on = Regime::new(RegimeKind::PiecewiseSegment(seg));
                    on.push_ge(
                        "window_lo",
                        drive(t, &input) - LinearExpr::term(size, bp_x[seg] * rp),
                    );
                    on.push_le(
                        "window_hi",
                        drive(t, &input) - LinearExpr::term(size, bp_x[seg + 1] * rp),
                    );
                    curve_eqs(&mut on, t, seg);
                    min_part_load(&mut on, t);
                    regimes.push(on);
                }
                let d = assemble(store, &format!("{tec}.t{t}"), &regimes, Relaxation::BigM)?;
                activations.push(d.activations);
            }
        }
    }

    // Fixed input ratios hold unconditionally, off regime included.
    if let Some(main) = &main {
        for car in &desc.input_carrier {
            if car == main {
                continue;
            }
            let phi = *desc.input_ratios.get(car).ok_or_else(|| {
                EntecError::Config(format!(
                    "technology '{tec}': no input ratio for carrier '{car}'"
                ))
            })?;
            for t in 0..steps {
                store.add_constraint(LinearConstraint::eq(
                    format!("{tec}.ratio[{t},{car}]"),
                    LinearExpr::from(input[car][t]) - LinearExpr::term(input[main][t], phi),
                ));
            }
        }
    }

    // Size caps the driving input.
    for t in 0..steps {
        store.add_constraint(LinearConstraint::le(
            format!("{tec}.size_cap[{t}]"),
            drive(t, &input) - LinearExpr::term(size, rp),
        ));
    }

    // Per-carrier share caps on the aggregate input.
    if main.is_none() {
        for (car, share) in &desc.max_input {
            for t in 0..steps {
                let total = LinearExpr::sum(desc.input_carrier.iter().map(|c| input[c][t]));
                store.add_constraint(LinearConstraint::le(
                    format!("{tec}.max_input[{t},{car}]"),
                    LinearExpr::from(input[car][t]) - total * *share,
                ));
            }
        }
    }

    Ok(ConversionVars {
        size,
        input,
        output,
        activations,
    })
}

enum Curves {
    Aggregate(SegmentCoefficients),
    PerCarrier(BTreeMap<Carrier, SegmentCoefficients>),
}

fn archetype_curves(
    desc: &TechnologyDescriptor,
    perf: &FittedPerformance,
    archetype: ConversionArchetype,
) -> EntecResult<Curves> {
    match archetype {
        ConversionArchetype::FullSubstitution => Ok(Curves::Aggregate(
            perf.aggregate_or_err(&desc.name)?.clone(),
        )),
        ConversionArchetype::PerCarrierCurves | ConversionArchetype::FixedRatio => {
            let mut map = BTreeMap::new();
            for car in &desc.output_carrier {
                map.insert(car.clone(), perf.carrier_or_err(&desc.name, car)?.clone());
            }
            if map.is_empty() {
                return Err(EntecError::Config(format!(
                    "technology '{}': no output carriers declared",
                    desc.name
                )));
            }
            Ok(Curves::PerCarrier(map))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entec_core::TimeHorizon;

    fn descriptor(pft: u8, extra: &str) -> TechnologyDescriptor {
        serde_json::from_str(&format!(
            r#"{{
                "name": "plant",
                "performance_function_type": {pft},
                "min_part_load": 0.2,
                "size_min": 0.0,
                "size_max": 5.0,
                "input_carrier": ["gas", "hydrogen"],
                "output_carrier": ["heat"]
                {extra}
            }}"#
        ))
        .unwrap()
    }

    fn ctx(steps: usize) -> FormulationContext {
        FormulationContext::new(TimeHorizon::full(steps))
    }

    #[test]
    fn test_through_origin_has_no_binaries() {
        let mut desc = descriptor(1, "");
        desc.min_part_load = 0.0;
        let perf = FittedPerformance {
            aggregate: Some(SegmentCoefficients::linear(0.9)),
            ..FittedPerformance::default()
        };
        let mut store = ModelStore::new();
        let vars =
            build_conversion(&mut store, &ctx(1), &desc, &perf, ConversionArchetype::FullSubstitution)
                .unwrap();
        assert!(vars.activations.is_empty());
        assert!(!store.has_discrete_vars());
        assert!(!store.big_m_used());

        // [size, in_gas, in_h2, out_heat]: 0.9 × (1 + 1) = 1.8
        assert!(store.check_point(&[5.0, 1.0, 1.0, 1.8], 1e-9).is_ok());
        assert!(store.check_point(&[5.0, 1.0, 1.0, 2.0], 1e-9).is_err());
        // size cap: inputs above size
        assert!(store.check_point(&[1.0, 1.0, 1.0, 1.8], 1e-9).is_err());
    }

    #[test]
    fn test_min_part_load_windows() {
        let desc = descriptor(2, "");
        let perf = FittedPerformance {
            aggregate: Some(SegmentCoefficients::affine(1.2, -0.1)),
            ..FittedPerformance::default()
        };
        let mut store = ModelStore::new();
        let vars =
            build_conversion(&mut store, &ctx(1), &desc, &perf, ConversionArchetype::FullSubstitution)
                .unwrap();
        assert!(store.big_m_used());
        let [y_off, y_on] = vars.activations[0][..] else {
            panic!("two regimes expected")
        };
        assert_eq!((y_off, y_on), (VarId(4), VarId(5)));

        // [size, in_gas, in_h2, out_heat, y_off, y_on]
        // on at Σin = 2: Σout = 1.2·2 − 0.1·5 = 1.9
        assert!(store.check_point(&[5.0, 2.0, 0.0, 1.9, 0.0, 1.0], 1e-9).is_ok());
        // below min part load (0.2·5 = 1) while on
        assert!(store.check_point(&[5.0, 0.5, 0.0, 0.1, 0.0, 1.0], 1e-9).is_err());
        // off with zero flows
        assert!(store.check_point(&[5.0, 0.0, 0.0, 0.0, 1.0, 0.0], 1e-9).is_ok());
        // off with non-zero flow
        assert!(store.check_point(&[5.0, 0.5, 0.0, 0.0, 1.0, 0.0], 1e-9).is_err());
    }

    #[test]
    fn test_piecewise_segment_windows() {
        let mut desc = descriptor(3, "");
        desc.min_part_load = 0.2;
        let perf = FittedPerformance {
            aggregate: Some(SegmentCoefficients {
                alpha1: vec![1.5, 0.8],
                alpha2: vec![-0.1, 0.25],
            }),
            bp_x: vec![0.2, 0.5, 1.0],
            ..FittedPerformance::default()
        };
        let mut store = ModelStore::new();
        let vars =
            build_conversion(&mut store, &ctx(1), &desc, &perf, ConversionArchetype::FullSubstitution)
                .unwrap();
        assert_eq!(vars.activations[0].len(), 3);

        // [size, in_gas, in_h2, out_heat, y_off, y_s0, y_s1], size 5
        // segment 0 window is [1.0, 2.5]: at Σin = 2, out = 1.5·2 − 0.1·5 = 2.5
        assert!(store
            .check_point(&[5.0, 2.0, 0.0, 2.5, 0.0, 1.0, 0.0], 1e-9)
            .is_ok());
        // segment 1 window is [2.5, 5.0]: at Σin = 4, out = 0.8·4 + 0.25·5 = 4.45
        assert!(store
            .check_point(&[5.0, 4.0, 0.0, 4.45, 0.0, 0.0, 1.0], 1e-9)
            .is_ok());
        // segment 0 active outside its window
        assert!(store
            .check_point(&[5.0, 4.0, 0.0, 5.9, 0.0, 1.0, 0.0], 1e-9)
            .is_err());
    }

    #[test]
    fn test_fixed_ratio_holds_when_off() {
        let extra = r#",
            "main_input_carrier": "gas",
            "input_ratios": {"hydrogen": 0.5}"#;
        let desc = descriptor(2, extra);
        let mut per_carrier = BTreeMap::new();
        per_carrier.insert(Carrier::new("heat"), SegmentCoefficients::affine(0.9, 0.0));
        let perf = FittedPerformance {
            per_carrier,
            ..FittedPerformance::default()
        };
        let mut store = ModelStore::new();
        build_conversion(&mut store, &ctx(1), &desc, &perf, ConversionArchetype::FixedRatio)
            .unwrap();

        // [size, in_gas, in_h2, out_heat, y_off, y_on]
        // on: heat = 0.9·gas, hydrogen = 0.5·gas
        assert!(store.check_point(&[5.0, 2.0, 1.0, 1.8, 0.0, 1.0], 1e-9).is_ok());
        // ratio violated
        assert!(store.check_point(&[5.0, 2.0, 0.4, 1.8, 0.0, 1.0], 1e-9).is_err());
        // off: all zero satisfies the ratio too
        assert!(store.check_point(&[5.0, 0.0, 0.0, 0.0, 1.0, 0.0], 1e-9).is_ok());
    }

    #[test]
    fn test_fixed_ratio_missing_phi_is_fatal() {
        let extra = r#",
            "main_input_carrier": "gas""#;
        let desc = descriptor(1, extra);
        let mut per_carrier = BTreeMap::new();
        per_carrier.insert(Carrier::new("heat"), SegmentCoefficients::linear(0.9));
        let perf = FittedPerformance {
            per_carrier,
            ..FittedPerformance::default()
        };
        let mut store = ModelStore::new();
        let err =
            build_conversion(&mut store, &ctx(1), &desc, &perf, ConversionArchetype::FixedRatio)
                .unwrap_err();
        assert!(matches!(err, EntecError::Config(_)));
        assert!(err.to_string().contains("hydrogen"));
    }

    #[test]
    fn test_max_input_share() {
        let extra = r#",
            "max_input": {"hydrogen": 0.25}"#;
        let mut desc = descriptor(1, extra);
        desc.min_part_load = 0.0;
        let perf = FittedPerformance {
            aggregate: Some(SegmentCoefficients::linear(1.0)),
            ..FittedPerformance::default()
        };
        let mut store = ModelStore::new();
        build_conversion(&mut store, &ctx(1), &desc, &perf, ConversionArchetype::FullSubstitution)
            .unwrap();

        // [size, in_gas, in_h2, out_heat]
        assert!(store.check_point(&[5.0, 3.0, 1.0, 4.0], 1e-9).is_ok());
        assert!(store.check_point(&[5.0, 2.0, 2.0, 4.0], 1e-9).is_err());
    }
}
