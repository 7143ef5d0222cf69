//! Technology performance descriptors.
//!
//! A [`TechnologyDescriptor`] is the recognized subset of a technology's JSON
//! configuration that drives constraint construction. Field names follow the
//! on-disk format: `performance_function_type`, `min_part_load`,
//! `curtailment`, `max_input`, `input_ratios`, `main_input_carrier`,
//! `allow_only_one_direction`, `size_min`, `size_max`, `input_carrier`,
//! `output_carrier`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::carrier::{Carrier, CarrierSet};
use crate::error::{EntecError, EntecResult};

/// How input maps to output for a conversion technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PerformanceFunctionType {
    /// Linear through the origin; no on/off state.
    ThroughOrigin,
    /// Linear with an offset and a minimum part load; adds an off state.
    MinPartLoad,
    /// Piecewise linear over fitted segments; adds an off state.
    Piecewise,
}

impl TryFrom<u8> for PerformanceFunctionType {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Self::ThroughOrigin),
            2 => Ok(Self::MinPartLoad),
            3 => Ok(Self::Piecewise),
            other => Err(format!("performance_function_type must be 1, 2 or 3, got {other}")),
        }
    }
}

impl From<PerformanceFunctionType> for u8 {
    fn from(v: PerformanceFunctionType) -> u8 {
        match v {
            PerformanceFunctionType::ThroughOrigin => 1,
            PerformanceFunctionType::MinPartLoad => 2,
            PerformanceFunctionType::Piecewise => 3,
        }
    }
}

impl PerformanceFunctionType {
    /// Whether this type introduces an off regime (and therefore a
    /// disjunction that must be relaxed with big-M).
    pub fn has_off_state(&self) -> bool {
        !matches!(self, Self::ThroughOrigin)
    }
}

/// Curtailment policy for renewable technologies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Curtailment {
    /// Output equals the available production exactly.
    Disallowed,
    /// Output may be continuously reduced below the available production.
    Continuous,
    /// Whole units are switched off; requires an integer size.
    Discrete,
}

impl TryFrom<u8> for Curtailment {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Disallowed),
            1 => Ok(Self::Continuous),
            2 => Ok(Self::Discrete),
            other => Err(format!("curtailment must be 0, 1 or 2, got {other}")),
        }
    }
}

impl From<Curtailment> for u8 {
    fn from(v: Curtailment) -> u8 {
        match v {
            Curtailment::Disallowed => 0,
            Curtailment::Continuous => 1,
            Curtailment::Discrete => 2,
        }
    }
}

fn default_pft() -> PerformanceFunctionType {
    PerformanceFunctionType::ThroughOrigin
}

fn default_curtailment() -> Curtailment {
    Curtailment::Disallowed
}

/// Recognized configuration fields of a technology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnologyDescriptor {
    /// Technology name, used in error messages and variable namespaces.
    pub name: String,

    #[serde(default = "default_pft")]
    pub performance_function_type: PerformanceFunctionType,

    /// Minimum part load as a fraction of size × rated power.
    #[serde(default)]
    pub min_part_load: f64,

    /// Curtailment policy (renewable technologies only).
    #[serde(default = "default_curtailment")]
    pub curtailment: Curtailment,

    /// Per-carrier cap on the share of aggregate input.
    #[serde(default)]
    pub max_input: BTreeMap<Carrier, f64>,

    /// Fixed input ratios relative to the main input carrier.
    #[serde(default)]
    pub input_ratios: BTreeMap<Carrier, f64>,

    /// Main input carrier (fixed-ratio archetype only).
    #[serde(default)]
    pub main_input_carrier: Option<Carrier>,

    /// Storage only: forbid simultaneous charging and discharging (0 or 1).
    #[serde(default)]
    pub allow_only_one_direction: u8,

    pub size_min: f64,
    pub size_max: f64,

    /// Whether size is a unit count (integer variable) rather than continuous.
    #[serde(default)]
    pub size_is_int: bool,

    #[serde(default)]
    pub input_carrier: Vec<Carrier>,
    #[serde(default)]
    pub output_carrier: Vec<Carrier>,
}

impl TechnologyDescriptor {
    /// Storage direction exclusivity as a bool.
    pub fn one_direction_only(&self) -> bool {
        self.allow_only_one_direction != 0
    }

    /// The declared carriers as a [`CarrierSet`].
    pub fn carrier_set(&self) -> EntecResult<CarrierSet> {
        let set = CarrierSet::new(self.input_carrier.clone(), self.output_carrier.clone());
        match &self.main_input_carrier {
            Some(main) => set.with_main_input(main.clone()),
            None => Ok(set),
        }
    }

    /// Check internal consistency. Fatal on contradiction.
    pub fn validate(&self) -> EntecResult<()> {
        if !(self.size_min >= 0.0 && self.size_min.is_finite()) || !self.size_max.is_finite() {
            return Err(EntecError::Config(format!(
                "technology '{}': size bounds must be finite and non-negative",
                self.name
            )));
        }
        if self.size_min > self.size_max {
            return Err(EntecError::Config(format!(
                "technology '{}': size_min {} exceeds size_max {}",
                self.name, self.size_min, self.size_max
            )));
        }
        if !(0.0..=1.0).contains(&self.min_part_load) {
            return Err(EntecError::Config(format!(
                "technology '{}': min_part_load {} outside [0, 1]",
                self.name, self.min_part_load
            )));
        }
        if self.curtailment == Curtailment::Discrete && !self.size_is_int {
            return Err(EntecError::Config(format!(
                "technology '{}': discrete curtailment requires an integer size",
                self.name
            )));
        }
        for (car, share) in &self.max_input {
            if !(0.0..=1.0).contains(share) {
                return Err(EntecError::Config(format!(
                    "technology '{}': max_input share for '{}' outside [0, 1]",
                    self.name, car
                )));
            }
            if !self.input_carrier.contains(car) {
                return Err(EntecError::Config(format!(
                    "technology '{}': max_input names undeclared carrier '{}'",
                    self.name, car
                )));
            }
        }
        if !self.input_ratios.is_empty() && self.main_input_carrier.is_none() {
            return Err(EntecError::Config(format!(
                "technology '{}': input_ratios given without main_input_carrier",
                self.name
            )));
        }
        if let Some(main) = &self.main_input_carrier {
            if !self.input_carrier.contains(main) {
                return Err(EntecError::Config(format!(
                    "technology '{}': main input carrier '{}' is not declared",
                    self.name, main
                )));
            }
            for car in self.input_ratios.keys() {
                if car != main && !self.input_carrier.contains(car) {
                    return Err(EntecError::Config(format!(
                        "technology '{}': input_ratios names undeclared carrier '{}'",
                        self.name, car
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor_json() -> &'static str {
        r#"{
            "name": "gas_boiler",
            "performance_function_type": 2,
            "min_part_load": 0.2,
            "size_min": 0.0,
            "size_max": 10.0,
            "input_carrier": ["gas"],
            "output_carrier": ["heat"]
        }"#
    }

    #[test]
    fn test_deserialize_from_json() {
        let desc: TechnologyDescriptor = serde_json::from_str(descriptor_json()).unwrap();
        assert_eq!(
            desc.performance_function_type,
            PerformanceFunctionType::MinPartLoad
        );
        assert_eq!(desc.curtailment, Curtailment::Disallowed);
        assert_eq!(desc.min_part_load, 0.2);
        desc.validate().unwrap();
    }

    #[test]
    fn test_bad_performance_function_type() {
        let json = descriptor_json().replace("\"performance_function_type\": 2", "\"performance_function_type\": 7");
        let res: Result<TechnologyDescriptor, _> = serde_json::from_str(&json);
        assert!(res.is_err());
    }

    #[test]
    fn test_size_bounds_checked() {
        let mut desc: TechnologyDescriptor = serde_json::from_str(descriptor_json()).unwrap();
        desc.size_min = 20.0;
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_discrete_curtailment_needs_integer_size() {
        let mut desc: TechnologyDescriptor = serde_json::from_str(descriptor_json()).unwrap();
        desc.curtailment = Curtailment::Discrete;
        assert!(desc.validate().is_err());
        desc.size_is_int = true;
        desc.validate().unwrap();
    }

    #[test]
    fn test_input_ratios_require_main_carrier() {
        let mut desc: TechnologyDescriptor = serde_json::from_str(descriptor_json()).unwrap();
        desc.input_ratios.insert(Carrier::new("electricity"), 0.1);
        assert!(desc.validate().is_err());
    }
}
