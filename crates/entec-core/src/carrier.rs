//! Energy and material carriers.
//!
//! A carrier is a named flow a technology consumes or produces (electricity,
//! heat, hydrogen, CO2, water, ...). Technologies declare their carriers up
//! front; constraint builders index variables by carrier name.

use serde::{Deserialize, Serialize};

use crate::error::{EntecError, EntecResult};

/// A named energy or material flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Carrier(pub String);

impl Carrier {
    pub fn new(name: impl Into<String>) -> Self {
        Carrier(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Carrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Carrier {
    fn from(s: &str) -> Self {
        Carrier(s.to_string())
    }
}

/// The carriers a technology consumes and produces.
///
/// Fixed-ratio technologies additionally declare a main input carrier; all
/// other inputs are tied to it by fixed ratios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierSet {
    /// Input carriers, in declaration order.
    pub inputs: Vec<Carrier>,
    /// Output carriers, in declaration order.
    pub outputs: Vec<Carrier>,
    /// Main input carrier, if the archetype requires one.
    pub main_input: Option<Carrier>,
}

impl CarrierSet {
    /// Create a carrier set without a main input carrier.
    pub fn new(inputs: Vec<Carrier>, outputs: Vec<Carrier>) -> Self {
        Self {
            inputs,
            outputs,
            main_input: None,
        }
    }

    /// Declare the main input carrier. Fails if it is not a declared input.
    pub fn with_main_input(mut self, carrier: Carrier) -> EntecResult<Self> {
        if !self.inputs.contains(&carrier) {
            return Err(EntecError::Config(format!(
                "main input carrier '{}' is not a declared input carrier",
                carrier
            )));
        }
        self.main_input = Some(carrier);
        Ok(self)
    }

    /// The main input carrier, or a configuration error naming the technology.
    pub fn main_input_or_err(&self, tec_name: &str) -> EntecResult<&Carrier> {
        self.main_input.as_ref().ok_or_else(|| {
            EntecError::Config(format!(
                "technology '{}' requires a main input carrier",
                tec_name
            ))
        })
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_input_must_be_declared() {
        let set = CarrierSet::new(
            vec![Carrier::new("electricity"), Carrier::new("heat")],
            vec![Carrier::new("hydrogen")],
        );
        assert!(set.clone().with_main_input(Carrier::new("gas")).is_err());
        let set = set.with_main_input(Carrier::new("electricity")).unwrap();
        assert_eq!(set.main_input.unwrap().as_str(), "electricity");
    }

    #[test]
    fn test_missing_main_input_names_technology() {
        let set = CarrierSet::new(vec![Carrier::new("gas")], vec![Carrier::new("heat")]);
        let err = set.main_input_or_err("boiler_1").unwrap_err();
        assert!(err.to_string().contains("boiler_1"));
    }
}
