//! Per-timestep operating bounds for declared carriers.
//!
//! Bounds are derived from fitted coefficients and size limits by the
//! technology fitting step, and consumed by the constraint builders when
//! declaring flow variables. An external scale factor (e.g. a CO2
//! concentration for capture technologies) rescales bounds multiplicatively;
//! the rescaling is tracked so it can only be applied once.

use std::collections::BTreeMap;

use entec_core::{Carrier, EntecError, EntecResult};

/// Lower/upper operating bounds per (carrier, timestep).
#[derive(Debug, Clone, Default)]
pub struct OperatingBounds {
    input: BTreeMap<Carrier, Vec<(f64, f64)>>,
    output: BTreeMap<Carrier, Vec<(f64, f64)>>,
    scale_applied: Option<f64>,
}

impl OperatingBounds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constant bounds broadcast over the horizon for an input carrier.
    pub fn set_input_constant(&mut self, car: Carrier, steps: usize, lower: f64, upper: f64) {
        self.input.insert(car, vec![(lower, upper); steps]);
    }

    /// Constant bounds broadcast over the horizon for an output carrier.
    pub fn set_output_constant(&mut self, car: Carrier, steps: usize, lower: f64, upper: f64) {
        self.output.insert(car, vec![(lower, upper); steps]);
    }

    /// Time-dependent bounds for an input carrier.
    pub fn set_input_series(&mut self, car: Carrier, series: Vec<(f64, f64)>) {
        self.input.insert(car, series);
    }

    /// Time-dependent bounds for an output carrier.
    pub fn set_output_series(&mut self, car: Carrier, series: Vec<(f64, f64)>) {
        self.output.insert(car, series);
    }

    pub fn input(&self, car: &Carrier) -> Option<&[(f64, f64)]> {
        self.input.get(car).map(|v| v.as_slice())
    }

    pub fn output(&self, car: &Carrier) -> Option<&[(f64, f64)]> {
        self.output.get(car).map(|v| v.as_slice())
    }

    /// Bounds of an input carrier at a timestep, defaulting to `fallback`.
    pub fn input_at(&self, car: &Carrier, t: usize, fallback: (f64, f64)) -> (f64, f64) {
        self.input
            .get(car)
            .and_then(|v| v.get(t))
            .copied()
            .unwrap_or(fallback)
    }

    /// Bounds of an output carrier at a timestep, defaulting to `fallback`.
    pub fn output_at(&self, car: &Carrier, t: usize, fallback: (f64, f64)) -> (f64, f64) {
        self.output
            .get(car)
            .and_then(|v| v.get(t))
            .copied()
            .unwrap_or(fallback)
    }

    /// All bounds non-negative and ordered lower ≤ upper.
    pub fn validate(&self) -> EntecResult<()> {
        for (car, series) in self.input.iter().chain(self.output.iter()) {
            for (t, (lo, hi)) in series.iter().enumerate() {
                if *lo < 0.0 || !lo.is_finite() || !hi.is_finite() {
                    return Err(EntecError::Validation(format!(
                        "carrier '{}' timestep {}: bounds must be finite and non-negative",
                        car, t
                    )));
                }
                if lo > hi {
                    return Err(EntecError::Validation(format!(
                        "carrier '{}' timestep {}: lower bound {} exceeds upper {}",
                        car, t, lo, hi
                    )));
                }
            }
        }
        Ok(())
    }

    /// Multiplicatively rescale every bound by `factor`.
    ///
    /// The identity factor is a no-op. A non-identity factor may be applied
    /// at most once; the shape of the underlying fit is untouched — only the
    /// bound magnitudes change.
    pub fn rescaled(mut self, factor: f64) -> EntecResult<Self> {
        if !(factor > 0.0 && factor.is_finite()) {
            return Err(EntecError::Validation(format!(
                "bound scale factor must be positive and finite, got {factor}"
            )));
        }
        if factor == 1.0 {
            return Ok(self);
        }
        if let Some(previous) = self.scale_applied {
            return Err(EntecError::Validation(format!(
                "bounds already rescaled by {previous}; rescaling must be applied exactly once"
            )));
        }
        for series in self.input.values_mut().chain(self.output.values_mut()) {
            for (lo, hi) in series.iter_mut() {
                *lo *= factor;
                *hi *= factor;
            }
        }
        self.scale_applied = Some(factor);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> OperatingBounds {
        let mut b = OperatingBounds::new();
        b.set_input_constant(Carrier::new("electricity"), 3, 0.0, 2.0);
        b.set_output_constant(Carrier::new("co2"), 3, 0.0, 0.9);
        b
    }

    #[test]
    fn test_identity_rescale_is_idempotent() {
        let car = Carrier::new("electricity");
        let b = bounds().rescaled(1.0).unwrap().rescaled(1.0).unwrap();
        assert_eq!(b.input(&car).unwrap()[0], (0.0, 2.0));
        // identity never consumes the one allowed rescaling
        let b = b.rescaled(0.3).unwrap();
        assert_eq!(b.input(&car).unwrap()[0], (0.0, 0.6));
    }

    #[test]
    fn test_rescale_applied_exactly_once() {
        let b = bounds().rescaled(0.5).unwrap();
        assert!(b.rescaled(0.5).is_err());
    }

    #[test]
    fn test_rescale_monotonic_in_factor() {
        let car = Carrier::new("co2");
        let small = bounds().rescaled(0.4).unwrap();
        let large = bounds().rescaled(0.8).unwrap();
        let (_, hi_small) = small.output(&car).unwrap()[0];
        let (_, hi_large) = large.output(&car).unwrap()[0];
        assert!(hi_small < hi_large);
    }

    #[test]
    fn test_rejects_non_positive_factor() {
        assert!(bounds().rescaled(0.0).is_err());
        assert!(bounds().rescaled(-2.0).is_err());
    }

    #[test]
    fn test_validate_rejects_negative_bounds() {
        let mut b = OperatingBounds::new();
        b.set_input_series(Carrier::new("gas"), vec![(-1.0, 1.0)]);
        assert!(b.validate().is_err());
    }
}
