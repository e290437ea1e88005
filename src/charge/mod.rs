//! # Charge
//!
//! Maps a dimensionless local potential to the dimensionless volumetric
//! charge density and its derivative with respect to the potential. The
//! density is evaluated pointwise inside the semiconductor region; the
//! backend applies it nowhere else.
//!
//! Every exponential-bearing argument is clamped before evaluation, and the
//! identical clamps enter the derivative so the Newton linearization stays
//! consistent with the residual under overshoot.

use crate::fermi::{
    clamp_with_derivative, fermi_half, fermi_half_derivative, safe_exp_with_derivative,
};
use crate::parameters::{
    DimensionlessScale, PhysicalParameters, ACCEPTOR_DEGENERACY, DONOR_DEGENERACY,
};

/// Symmetric clamp applied to the potential before it enters any
/// exponential-bearing expression.
pub const POTENTIAL_CLAMP: f64 = 120.0;

/// Pointwise charge density in dimensionless form, the contract the assembly
/// backend consumes.
pub trait ChargeSource {
    /// Dimensionless charge density at local potential `phi`.
    fn density(&self, phi: f64) -> f64;
    /// Derivative of [`density`](ChargeSource::density) with respect to `phi`,
    /// evaluated with the identical clamping.
    fn density_derivative(&self, phi: f64) -> f64;
}

/// A configured donor level folded into dimensionless form.
#[derive(Clone, Copy, Debug)]
struct DonorTerm {
    /// (Ef - (Eg - Ed)) / kT; the local potential adds directly onto this
    offset: f64,
    /// Weighted concentration Nd * w in m^-3
    concentration: f64,
}

/// Fermi-Dirac charge density model for the semiconductor region.
///
/// Electron and hole densities follow the Fermi integral of order 1/2,
/// ionized dopant concentrations follow single-level occupation functions
/// with fixed degeneracy factors, and the net density is scaled into the
/// dimensionless Poisson source.
#[derive(Clone, Debug)]
pub struct ChargeDensityModel {
    conduction_dos: f64,
    valence_dos: f64,
    /// (Ef - Eg) / kT
    electron_offset: f64,
    /// -Ef / kT
    hole_offset: f64,
    donors: Vec<DonorTerm>,
    /// (Ea - Ef) / kT; the local potential subtracts from this
    acceptor_offset: f64,
    acceptor_concentration: f64,
    charge_scale: f64,
}

impl ChargeDensityModel {
    /// Folds the physical parameters into dimensionless evaluation constants.
    pub fn new(parameters: &PhysicalParameters, scale: &DimensionlessScale) -> Self {
        let kt = parameters.thermal_energy;
        let donors = parameters
            .donor_levels
            .iter()
            .map(|level| DonorTerm {
                offset: (parameters.fermi_level - (parameters.band_gap - level.energy)) / kt,
                concentration: parameters.donor_concentration * level.weight,
            })
            .collect();
        Self {
            conduction_dos: parameters.conduction_dos,
            valence_dos: parameters.valence_dos,
            electron_offset: (parameters.fermi_level - parameters.band_gap) / kt,
            hole_offset: -parameters.fermi_level / kt,
            donors,
            acceptor_offset: (parameters.acceptor_energy - parameters.fermi_level) / kt,
            acceptor_concentration: parameters.acceptor_concentration,
            charge_scale: scale.charge_scale,
        }
    }
}

impl ChargeSource for ChargeDensityModel {
    fn density(&self, phi: f64) -> f64 {
        let (phi, _) = clamp_with_derivative(phi, POTENTIAL_CLAMP);

        let electrons = self.conduction_dos * fermi_half(self.electron_offset + phi);
        let holes = self.valence_dos * fermi_half(self.hole_offset - phi);

        let ionized_donors: f64 = self
            .donors
            .iter()
            .map(|term| {
                let (exponential, _) = safe_exp_with_derivative(term.offset + phi);
                term.concentration / (1.0 + DONOR_DEGENERACY * exponential)
            })
            .sum();

        let ionized_acceptors = if self.acceptor_concentration == 0.0 {
            0.0
        } else {
            let (exponential, _) = safe_exp_with_derivative(self.acceptor_offset - phi);
            self.acceptor_concentration / (1.0 + ACCEPTOR_DEGENERACY * exponential)
        };

        self.charge_scale * (holes - electrons + ionized_donors - ionized_acceptors)
    }

    fn density_derivative(&self, phi: f64) -> f64 {
        let (phi, chain) = clamp_with_derivative(phi, POTENTIAL_CLAMP);

        let d_electrons = self.conduction_dos * fermi_half_derivative(self.electron_offset + phi);
        let d_holes = -self.valence_dos * fermi_half_derivative(self.hole_offset - phi);

        let d_ionized_donors: f64 = self
            .donors
            .iter()
            .map(|term| {
                let (exponential, d_exponential) = safe_exp_with_derivative(term.offset + phi);
                let occupied = 1.0 + DONOR_DEGENERACY * exponential;
                -term.concentration * DONOR_DEGENERACY * d_exponential / (occupied * occupied)
            })
            .sum();

        let d_ionized_acceptors = if self.acceptor_concentration == 0.0 {
            0.0
        } else {
            let (exponential, d_exponential) =
                safe_exp_with_derivative(self.acceptor_offset - phi);
            let occupied = 1.0 + ACCEPTOR_DEGENERACY * exponential;
            self.acceptor_concentration * ACCEPTOR_DEGENERACY * d_exponential
                / (occupied * occupied)
        };

        self.charge_scale
            * (d_holes - d_electrons + d_ionized_donors - d_ionized_acceptors)
            * chain
    }
}

/// Wraps a [`ChargeSource`] and multiplies it by the homotopy continuation
/// parameter lambda.
pub struct ScaledCharge<'a> {
    /// The underlying charge model
    pub source: &'a dyn ChargeSource,
    /// Continuation parameter on the unit interval
    pub scaling: f64,
}

impl ChargeSource for ScaledCharge<'_> {
    fn density(&self, phi: f64) -> f64 {
        self.scaling * self.source.density(phi)
    }

    fn density_derivative(&self, phi: f64) -> f64 {
        self.scaling * self.source.density_derivative(phi)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::app::PhysicalConfiguration;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn model() -> ChargeDensityModel {
        let parameters =
            PhysicalParameters::from_configuration(&PhysicalConfiguration::default()).unwrap();
        let scale = DimensionlessScale::from_parameters(&parameters);
        ChargeDensityModel::new(&parameters, &scale)
    }

    #[test]
    fn density_vanishes_at_equilibrium() {
        // The Fermi level solves charge neutrality, so flat bands are neutral
        let model = model();
        let characteristic = model.charge_scale * model.conduction_dos;
        assert!(model.density(0.0).abs() < 1e-8 * characteristic);
    }

    #[test]
    fn positive_potential_accumulates_electrons() {
        let model = model();
        assert!(model.density(5.0) < 0.0);
        assert!(model.density(-5.0) > 0.0);
    }

    #[test]
    fn density_is_monotonically_decreasing_in_potential() {
        let model = model();
        let mut previous = f64::INFINITY;
        for step in -240..=240 {
            let density = model.density(step as f64 * 0.5);
            assert!(density <= previous);
            previous = density;
        }
    }

    #[test]
    fn density_is_finite_beyond_the_clamp_range() {
        let model = model();
        for phi in [-1e6, -121.0, 121.0, 1e6] {
            assert!(model.density(phi).is_finite());
            assert!(model.density_derivative(phi).is_finite());
        }
        // Clamped tails are flat
        assert_relative_eq!(model.density(130.0), model.density(1e9));
        assert_eq!(model.density_derivative(130.0), 0.0);
    }

    proptest! {
        #[test]
        fn derivative_matches_central_difference(phi in -110.0..110.0f64) {
            let model = model();
            let h = 1e-6 * phi.abs().max(1.0);
            let numeric = (model.density(phi + h) - model.density(phi - h)) / (2.0 * h);
            let analytic = model.density_derivative(phi);
            let scale = numeric.abs().max(analytic.abs());
            prop_assert!((numeric - analytic).abs() <= 1e-5 * scale + 1e-10);
        }
    }

    #[test]
    fn scaled_charge_interpolates_between_zero_and_the_full_model() {
        let model = model();
        let zero = ScaledCharge {
            source: &model,
            scaling: 0.0,
        };
        let full = ScaledCharge {
            source: &model,
            scaling: 1.0,
        };
        let half = ScaledCharge {
            source: &model,
            scaling: 0.5,
        };
        assert_eq!(zero.density(3.0), 0.0);
        assert_relative_eq!(full.density(3.0), model.density(3.0));
        assert_relative_eq!(half.density(3.0), 0.5 * model.density(3.0));
        assert_relative_eq!(
            half.density_derivative(3.0),
            0.5 * model.density_derivative(3.0)
        );
    }
}
