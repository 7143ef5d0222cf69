//! Fitted performance record.
//!
//! [`FittedPerformance`] is the read-only product of the fitting step for one
//! technology: scalar coefficients (per-carrier, per-segment `alpha1`/`alpha2`
//! and the shared `bp_x` load breakpoints), time series (`capacity_factor`,
//! `ambient_loss_factor`) and per-carrier operating bounds. The constraint
//! builders read what their archetype needs and fail with a configuration
//! error when a required coefficient is missing.

use std::collections::BTreeMap;

use entec_core::{Carrier, EntecError, EntecResult};

use crate::bounds::OperatingBounds;
use crate::fit::PiecewiseFit;

/// Per-segment slope/intercept pairs of one performance curve.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentCoefficients {
    /// Slope per segment.
    pub alpha1: Vec<f64>,
    /// Intercept per segment, in units of size × rated power.
    pub alpha2: Vec<f64>,
}

impl SegmentCoefficients {
    /// Single linear segment through the origin.
    pub fn linear(alpha1: f64) -> Self {
        Self {
            alpha1: vec![alpha1],
            alpha2: vec![0.0],
        }
    }

    /// Single linear segment with an offset.
    pub fn affine(alpha1: f64, alpha2: f64) -> Self {
        Self {
            alpha1: vec![alpha1],
            alpha2: vec![alpha2],
        }
    }

    /// Coefficients of a piecewise fit, one pair per segment.
    pub fn from_fit(fit: &PiecewiseFit) -> Self {
        Self {
            alpha1: fit.slopes(),
            alpha2: fit.intercepts(),
        }
    }

    pub fn num_segments(&self) -> usize {
        self.alpha1.len()
    }
}

/// Fitted coefficients, time series and bounds for one technology.
///
/// Owned exclusively by the technology instance that produced it; builders
/// only read it.
#[derive(Debug, Clone)]
pub struct FittedPerformance {
    /// Power per size unit. 1.0 for continuously sized technologies; for
    /// integer-sized technologies the fitted per-unit rating.
    pub rated_power: f64,

    /// Load-fraction breakpoints of the piecewise regimes, ascending,
    /// starting at the minimum load fraction. Empty unless piecewise.
    pub bp_x: Vec<f64>,

    /// Aggregate-output curve (full-substitution, single curve).
    pub aggregate: Option<SegmentCoefficients>,

    /// Per-output-carrier curves.
    pub per_carrier: BTreeMap<Carrier, SegmentCoefficients>,

    // Storage coefficients
    pub eta_in: f64,
    pub eta_out: f64,
    pub lambda: f64,
    pub charge_max: f64,
    pub discharge_max: f64,
    pub min_fill: f64,

    /// Capacity factor per timestep (renewables); length = full horizon.
    pub capacity_factor: Vec<f64>,
    /// Ambient loss factor per timestep (storage); length = full horizon.
    pub ambient_loss_factor: Vec<f64>,

    pub bounds: OperatingBounds,
}

impl Default for FittedPerformance {
    fn default() -> Self {
        Self {
            rated_power: 1.0,
            bp_x: Vec::new(),
            aggregate: None,
            per_carrier: BTreeMap::new(),
            eta_in: 1.0,
            eta_out: 1.0,
            lambda: 0.0,
            charge_max: 1.0,
            discharge_max: 1.0,
            min_fill: 0.0,
            capacity_factor: Vec::new(),
            ambient_loss_factor: Vec::new(),
            bounds: OperatingBounds::new(),
        }
    }
}

impl FittedPerformance {
    /// The aggregate-output curve, or a configuration error naming `tec`.
    pub fn aggregate_or_err(&self, tec: &str) -> EntecResult<&SegmentCoefficients> {
        self.aggregate.as_ref().ok_or_else(|| {
            EntecError::Config(format!(
                "technology '{tec}': no aggregate performance curve fitted"
            ))
        })
    }

    /// The curve for an output carrier, or a configuration error naming `tec`.
    pub fn carrier_or_err(&self, tec: &str, car: &Carrier) -> EntecResult<&SegmentCoefficients> {
        self.per_carrier.get(car).ok_or_else(|| {
            EntecError::Config(format!(
                "technology '{tec}': no performance curve fitted for output carrier '{car}'"
            ))
        })
    }

    /// The capacity factor series, checked against the horizon length.
    pub fn capacity_factor_or_err(&self, tec: &str, steps: usize) -> EntecResult<&[f64]> {
        if self.capacity_factor.len() != steps {
            return Err(EntecError::Config(format!(
                "technology '{tec}': capacity factor series has {} entries, horizon has {steps}",
                self.capacity_factor.len()
            )));
        }
        Ok(&self.capacity_factor)
    }

    /// Piecewise breakpoints, checked against the segment count of `coeffs`.
    pub fn breakpoints_or_err(
        &self,
        tec: &str,
        coeffs: &SegmentCoefficients,
    ) -> EntecResult<&[f64]> {
        if self.bp_x.len() != coeffs.num_segments() + 1 {
            return Err(EntecError::Config(format!(
                "technology '{tec}': {} breakpoints do not delimit {} segments",
                self.bp_x.len(),
                coeffs.num_segments()
            )));
        }
        Ok(&self.bp_x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::{fit_piecewise, PerformanceSample};

    #[test]
    fn test_coefficients_from_fit() {
        let sample = PerformanceSample::new([
            (0.0, 0.0),
            (0.5, 0.25),
            (1.0, 0.5),
            (1.5, 1.5),
            (2.0, 2.5),
        ])
        .unwrap();
        let fit = fit_piecewise(&sample, 2).unwrap();
        let coeffs = SegmentCoefficients::from_fit(&fit);
        assert_eq!(coeffs.num_segments(), 2);
        assert!((coeffs.alpha1[0] - 0.5).abs() < 1e-9);
        assert!((coeffs.alpha1[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_curve_is_config_error() {
        let perf = FittedPerformance::default();
        let err = perf.aggregate_or_err("chp_plant").unwrap_err();
        assert!(matches!(err, EntecError::Config(_)));
        assert!(err.to_string().contains("chp_plant"));
    }

    #[test]
    fn test_breakpoint_count_checked() {
        let mut perf = FittedPerformance::default();
        perf.bp_x = vec![0.2, 1.0];
        let coeffs = SegmentCoefficients::affine(1.1, -0.05);
        assert!(perf.breakpoints_or_err("plant", &coeffs).is_ok());
        perf.bp_x = vec![0.2, 0.6, 1.0];
        assert!(perf.breakpoints_or_err("plant", &coeffs).is_err());
    }
}
