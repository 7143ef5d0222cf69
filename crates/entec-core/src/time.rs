//! Time index sets for model construction.
//!
//! The optimization horizon is a sequence of modelled timesteps. When input
//! time series have been clustered into representative periods by an external
//! preprocessing step, a reduced index set exists alongside the full one; a
//! builder picks one of the two through [`TimeHorizon::steps`]. Each modelled
//! timestep may stand for several real timesteps (time averaging), captured
//! by `timesteps_averaged`.

use serde::{Deserialize, Serialize};

use crate::error::{EntecError, EntecResult};

/// Which time index set a constraint is built over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSet {
    /// The full horizon.
    Full,
    /// The reduced (clustered) horizon, if one exists.
    Clustered,
}

/// The time index sets of the enclosing model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeHorizon {
    /// Number of timesteps in the full horizon.
    pub full_steps: usize,
    /// Number of timesteps in the clustered horizon, if clustering was applied.
    pub clustered_steps: Option<usize>,
    /// Number of real timesteps each modelled timestep represents (Δ ≥ 1).
    pub timesteps_averaged: usize,
}

impl TimeHorizon {
    /// A full horizon of `steps` timesteps without clustering or averaging.
    pub fn full(steps: usize) -> Self {
        Self {
            full_steps: steps,
            clustered_steps: None,
            timesteps_averaged: 1,
        }
    }

    /// Attach a clustered index set of `steps` timesteps.
    pub fn with_clustered(mut self, steps: usize) -> Self {
        self.clustered_steps = Some(steps);
        self
    }

    /// Set the time-averaging factor Δ.
    pub fn with_timesteps_averaged(mut self, delta: usize) -> Self {
        self.timesteps_averaged = delta.max(1);
        self
    }

    /// Number of timesteps in the selected index set.
    pub fn steps(&self, set: TimeSet) -> EntecResult<usize> {
        match set {
            TimeSet::Full => Ok(self.full_steps),
            TimeSet::Clustered => self.clustered_steps.ok_or_else(|| {
                EntecError::Config("clustered time set requested but no clustering applied".into())
            }),
        }
    }

    /// Index of the last timestep of the full horizon.
    ///
    /// Used by the cyclic storage recurrence, which couples the first and
    /// last timesteps into a ring.
    pub fn last_step(&self) -> usize {
        self.full_steps.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clustered_requires_clustering() {
        let horizon = TimeHorizon::full(8760);
        assert_eq!(horizon.steps(TimeSet::Full).unwrap(), 8760);
        assert!(horizon.steps(TimeSet::Clustered).is_err());

        let horizon = horizon.with_clustered(240);
        assert_eq!(horizon.steps(TimeSet::Clustered).unwrap(), 240);
    }

    #[test]
    fn test_averaging_factor_floor() {
        let horizon = TimeHorizon::full(10).with_timesteps_averaged(0);
        assert_eq!(horizon.timesteps_averaged, 1);
    }
}
