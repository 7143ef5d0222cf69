//! Carbon capture preprocessing.
//!
//! Capture units are sized in units of CO2 entering the absorber, so their
//! descriptor and bounds must be rescaled by the CO2 concentration of the
//! flue gas before constraint construction. Input requirements per unit of
//! CO2 follow the thermodynamic MEA model (Weimann et al. 2023, eq. 7):
//!
//! `ratio[car] = (eta[car] + omega[car]·conc) / (conc · 44.01 · 3.6)`
//!
//! Only post-combustion MEA is modelled; any other capture type is an
//! unsupported variant and fails without a fallback.

use std::collections::BTreeMap;

use entec_core::{Carrier, EntecError, EntecResult, TechnologyDescriptor};

use crate::bounds::OperatingBounds;

const MOLAR_MASS_CO2: f64 = 44.01;

/// Descriptor and bounds of a capture unit after concentration rescaling.
#[derive(Debug, Clone)]
pub struct CaptureFit {
    /// The descriptor with size bounds and input ratios rewritten.
    pub descriptor: TechnologyDescriptor,
    pub bounds: OperatingBounds,
}

/// Per-carrier thermodynamic coefficients of the capture model.
#[derive(Debug, Clone)]
pub struct CaptureCoefficients {
    /// Specific demand per unit of captured CO2.
    pub eta: BTreeMap<Carrier, f64>,
    /// Concentration-proportional demand per unit of captured CO2.
    pub omega: BTreeMap<Carrier, f64>,
    /// Fraction of entering CO2 that is captured.
    pub capture_rate: f64,
}

/// Rescale a capture technology for a flue gas CO2 concentration.
///
/// Fails with [`EntecError::UnsupportedVariant`] unless `ccs_type` names an
/// MEA process.
pub fn fit_capture(
    ccs_type: &str,
    desc: &TechnologyDescriptor,
    coeffs: &CaptureCoefficients,
    co2_concentration: f64,
    steps: usize,
) -> EntecResult<CaptureFit> {
    if !ccs_type.contains("MEA") {
        return Err(EntecError::UnsupportedVariant(format!(
            "capture type '{ccs_type}' is not modelled; only MEA processes are supported"
        )));
    }
    if !(co2_concentration > 0.0 && co2_concentration.is_finite()) {
        return Err(EntecError::Config(format!(
            "technology '{}': CO2 concentration must be positive, got {co2_concentration}",
            desc.name
        )));
    }
    if !(0.0..=1.0).contains(&coeffs.capture_rate) {
        return Err(EntecError::Config(format!(
            "technology '{}': capture rate {} outside [0, 1]",
            desc.name, coeffs.capture_rate
        )));
    }

    let mut descriptor = desc.clone();
    descriptor.size_min *= co2_concentration;
    descriptor.size_max *= co2_concentration;

    descriptor.input_ratios.clear();
    for car in &desc.input_carrier {
        let eta = coeffs.eta.get(car).ok_or_else(|| {
            EntecError::Config(format!(
                "technology '{}': no eta coefficient for input carrier '{car}'",
                desc.name
            ))
        })?;
        let omega = coeffs.omega.get(car).ok_or_else(|| {
            EntecError::Config(format!(
                "technology '{}': no omega coefficient for input carrier '{car}'",
                desc.name
            ))
        })?;
        let ratio =
            (eta + omega * co2_concentration) / (co2_concentration * MOLAR_MASS_CO2 * 3.6);
        descriptor.input_ratios.insert(car.clone(), ratio);
    }
    descriptor.validate()?;

    // Bounds per unit of entering CO2: inputs capped by their ratio, outputs
    // by the capture rate.
    let mut bounds = OperatingBounds::new();
    for (car, ratio) in &descriptor.input_ratios {
        bounds.set_input_constant(car.clone(), steps, 0.0, *ratio);
    }
    for car in &desc.output_carrier {
        bounds.set_output_constant(car.clone(), steps, 0.0, coeffs.capture_rate);
    }
    bounds.validate()?;

    Ok(CaptureFit { descriptor, bounds })
}
