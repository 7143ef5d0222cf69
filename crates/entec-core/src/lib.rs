//! # entec-core: Shared types for the entec formulation engine
//!
//! This crate holds the data model shared by all entec crates: the unified
//! error taxonomy, carrier declarations, time index sets and the technology
//! descriptor read from configuration. It deliberately knows nothing about
//! optimization modelling; constraint construction lives in `entec-milp`.

pub mod carrier;
pub mod descriptor;
pub mod error;
pub mod time;

pub use carrier::{Carrier, CarrierSet};
pub use descriptor::{Curtailment, PerformanceFunctionType, TechnologyDescriptor};
pub use error::{EntecError, EntecResult};
pub use time::{TimeHorizon, TimeSet};
