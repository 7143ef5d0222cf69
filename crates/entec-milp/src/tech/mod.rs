//! Per-archetype constraint builders.
//!
//! Each submodule turns a [`entec_core::TechnologyDescriptor`] plus a
//! [`crate::performance::FittedPerformance`] into variables and constraints
//! appended to a shared [`crate::model::ModelStore`], namespaced by the
//! technology name.

pub mod capture;
pub mod conversion;
pub mod multi_unit;
pub mod res;
pub mod storage;

use entec_core::TechnologyDescriptor;

use crate::expr::VarId;
use crate::model::ModelStore;

/// Declare the size variable of a technology: integer for unit-counted
/// technologies, continuous otherwise, bounded by the descriptor.
pub(crate) fn size_variable(store: &mut ModelStore, desc: &TechnologyDescriptor) -> VarId {
    let name = format!("{}.size", desc.name);
    if desc.size_is_int {
        store.integer(name, desc.size_min, desc.size_max)
    } else {
        store.continuous(name, desc.size_min, desc.size_max)
    }
}

/// The power rating one size unit stands for. Continuous sizes are already
/// expressed in power units.
pub(crate) fn rated_power(desc: &TechnologyDescriptor, fitted_rated_power: f64) -> f64 {
    if desc.size_is_int {
        fitted_rated_power
    } else {
        1.0
    }
}
