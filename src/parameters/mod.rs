//! # Parameters
//!
//! Converts the raw physical configuration into the validated, immutable
//! parameter bundle consumed by every other component, and derives the
//! dimensionless scale in which all solver-internal quantities are expressed.
//!
//! Construction is pure and deterministic: any invalid input fails fast with
//! a [`ConfigurationError`] before a single solve begins.

use crate::app::PhysicalConfiguration;
use crate::constants::{BOLTZMANN, ELECTRON_CHARGE, ELECTRON_MASS, EPSILON_0, PLANCK};
use crate::error::ConfigurationError;
use crate::fermi::{fermi_half, safe_exp};

/// Tolerance on the donor-weight sum invariant.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Donor degeneracy factor of the occupation function.
pub const DONOR_DEGENERACY: f64 = 2.0;
/// Acceptor degeneracy factor of the occupation function.
pub const ACCEPTOR_DEGENERACY: f64 = 4.0;

/// A single donor level: its depth below the conduction band edge and the
/// fraction of the donor population sitting on it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DonorLevel {
    /// Ionization energy below the conduction band edge in eV
    pub energy: f64,
    /// Population weight; the weights across all levels sum to one
    pub weight: f64,
}

/// The immutable physical parameter record, derived once at startup.
///
/// Energies are measured from the valence band edge, so the Fermi level lies
/// in `(0, band_gap)` and the conduction band edge sits at `band_gap`.
#[derive(Clone, Debug)]
pub struct PhysicalParameters {
    /// Lattice temperature in K
    pub temperature: f64,
    /// Donor concentration in m^-3
    pub donor_concentration: f64,
    /// Acceptor concentration in m^-3
    pub acceptor_concentration: f64,
    /// Sheet charge density at the oxide/semiconductor interface in m^-2
    pub interface_charge: f64,
    /// Relative permittivity of the semiconductor
    pub epsilon_semiconductor: f64,
    /// Relative permittivity of the oxide
    pub epsilon_oxide: f64,
    /// Relative permittivity of the vacuum region
    pub epsilon_vacuum: f64,
    /// Band gap in eV
    pub band_gap: f64,
    /// Donor levels with normalized population weights
    pub donor_levels: Vec<DonorLevel>,
    /// Acceptor level above the valence band edge in eV
    pub acceptor_energy: f64,
    /// Thermal energy kT in eV
    pub thermal_energy: f64,
    /// Effective density of states of the conduction band in m^-3
    pub conduction_dos: f64,
    /// Effective density of states of the valence band in m^-3
    pub valence_dos: f64,
    /// Equilibrium Fermi level above the valence band edge in eV
    pub fermi_level: f64,
}

impl PhysicalParameters {
    /// Validates the configuration and derives the thermal energy, the
    /// effective densities of states and the equilibrium Fermi level.
    pub fn from_configuration(
        configuration: &PhysicalConfiguration,
    ) -> Result<Self, ConfigurationError> {
        if configuration.temperature <= 0.0 {
            return Err(ConfigurationError::NonPositiveTemperature(
                configuration.temperature,
            ));
        }
        for (name, value) in [
            ("band_gap", configuration.band_gap),
            ("electron_mass_ratio", configuration.electron_mass_ratio),
            ("hole_mass_ratio", configuration.hole_mass_ratio),
            (
                "epsilon_semiconductor",
                configuration.epsilon_semiconductor,
            ),
            ("epsilon_oxide", configuration.epsilon_oxide),
            ("epsilon_vacuum", configuration.epsilon_vacuum),
        ] {
            if value <= 0.0 {
                return Err(ConfigurationError::NonPositiveParameter(name, value));
            }
        }
        if configuration.donor_concentration < 0.0 {
            return Err(ConfigurationError::NonPositiveParameter(
                "donor_concentration",
                configuration.donor_concentration,
            ));
        }
        if configuration.acceptor_concentration < 0.0 {
            return Err(ConfigurationError::NonPositiveParameter(
                "acceptor_concentration",
                configuration.acceptor_concentration,
            ));
        }

        let donor_levels = normalize_donor_levels(
            &configuration.donor_energies,
            &configuration.donor_ratios,
            configuration.band_gap,
        )?;

        let thermal_energy = BOLTZMANN * configuration.temperature / ELECTRON_CHARGE;
        let conduction_dos = effective_density_of_states(
            configuration.conduction_degeneracy,
            configuration.electron_mass_ratio,
            configuration.temperature,
        );
        let valence_dos = effective_density_of_states(
            configuration.valence_degeneracy,
            configuration.hole_mass_ratio,
            configuration.temperature,
        );

        let mut parameters = Self {
            temperature: configuration.temperature,
            donor_concentration: configuration.donor_concentration,
            acceptor_concentration: configuration.acceptor_concentration,
            interface_charge: configuration.interface_charge,
            epsilon_semiconductor: configuration.epsilon_semiconductor,
            epsilon_oxide: configuration.epsilon_oxide,
            epsilon_vacuum: configuration.epsilon_vacuum,
            band_gap: configuration.band_gap,
            donor_levels,
            acceptor_energy: configuration.acceptor_energy,
            thermal_energy,
            conduction_dos,
            valence_dos,
            fermi_level: 0.0,
        };
        parameters.fermi_level = parameters.solve_fermi_level()?;

        tracing::info!(
            "Derived parameters: kT = {:.5} eV, Nc = {:.4e} m^-3, Nv = {:.4e} m^-3, Ef = {:.4} eV",
            parameters.thermal_energy,
            parameters.conduction_dos,
            parameters.valence_dos,
            parameters.fermi_level
        );
        Ok(parameters)
    }

    /// Electron density at Fermi level `fermi_level` and zero local potential.
    fn electron_density(&self, fermi_level: f64) -> f64 {
        self.conduction_dos * fermi_half((fermi_level - self.band_gap) / self.thermal_energy)
    }

    /// Hole density at Fermi level `fermi_level` and zero local potential.
    fn hole_density(&self, fermi_level: f64) -> f64 {
        self.valence_dos * fermi_half(-fermi_level / self.thermal_energy)
    }

    /// Ionized donor concentration at zero local potential.
    fn ionized_donors(&self, fermi_level: f64) -> f64 {
        self.donor_levels
            .iter()
            .map(|level| {
                let argument =
                    (fermi_level - (self.band_gap - level.energy)) / self.thermal_energy;
                self.donor_concentration * level.weight
                    / (1.0 + DONOR_DEGENERACY * safe_exp(argument))
            })
            .sum()
    }

    /// Ionized acceptor concentration at zero local potential.
    fn ionized_acceptors(&self, fermi_level: f64) -> f64 {
        if self.acceptor_concentration == 0.0 {
            return 0.0;
        }
        let argument = (self.acceptor_energy - fermi_level) / self.thermal_energy;
        self.acceptor_concentration / (1.0 + ACCEPTOR_DEGENERACY * safe_exp(argument))
    }

    /// Bisects the charge-neutrality equation `ln(p + Nd+) = ln(n + Na-)` for
    /// the equilibrium Fermi level, bracketed one thermal energy inside the
    /// band gap on either side.
    fn solve_fermi_level(&self) -> Result<f64, ConfigurationError> {
        // Logarithmic form for numerical stability across the gap
        let neutrality = |fermi_level: f64| {
            (self.hole_density(fermi_level) + self.ionized_donors(fermi_level)).ln()
                - (self.electron_density(fermi_level) + self.ionized_acceptors(fermi_level)).ln()
        };

        let mut lower = self.thermal_energy;
        let mut upper = self.band_gap - self.thermal_energy;
        let mut residual_lower = neutrality(lower);
        if residual_lower * neutrality(upper) > 0.0 {
            return Err(ConfigurationError::FermiLevelBracket);
        }

        for _ in 0..200 {
            let midpoint = 0.5 * (lower + upper);
            let residual_midpoint = neutrality(midpoint);
            if residual_lower * residual_midpoint <= 0.0 {
                upper = midpoint;
            } else {
                lower = midpoint;
                residual_lower = residual_midpoint;
            }
            if upper - lower < 1e-14 * self.band_gap {
                break;
            }
        }
        Ok(0.5 * (lower + upper))
    }
}

/// Effective density of states `g * 2 (2 pi m kT / h^2)^{3/2}`.
fn effective_density_of_states(degeneracy: usize, mass_ratio: f64, temperature: f64) -> f64 {
    let mass = mass_ratio * ELECTRON_MASS;
    degeneracy as f64
        * 2.0
        * (2.0 * std::f64::consts::PI * mass * BOLTZMANN * temperature / (PLANCK * PLANCK))
            .powf(1.5)
}

/// Normalizes the configured population ratios into weights summing to one
/// and checks each level lies inside the gap.
fn normalize_donor_levels(
    energies: &[f64],
    ratios: &[f64],
    band_gap: f64,
) -> Result<Vec<DonorLevel>, ConfigurationError> {
    if energies.is_empty() {
        return Err(ConfigurationError::EmptyDonorLevels);
    }
    if energies.len() != ratios.len() {
        return Err(ConfigurationError::MismatchedDonorLevels {
            energies: energies.len(),
            ratios: ratios.len(),
        });
    }
    for &ratio in ratios {
        if ratio <= 0.0 {
            return Err(ConfigurationError::NonPositiveRatio(ratio));
        }
    }
    for &energy in energies {
        if energy <= 0.0 || energy >= band_gap {
            return Err(ConfigurationError::LevelOutsideGap(energy, band_gap));
        }
    }
    let ratio_sum: f64 = ratios.iter().sum();
    let levels = energies
        .iter()
        .zip(ratios)
        .map(|(&energy, &ratio)| DonorLevel {
            energy,
            weight: ratio / ratio_sum,
        })
        .collect::<Vec<_>>();

    let weight_sum: f64 = levels.iter().map(|level| level.weight).sum();
    if (weight_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(ConfigurationError::WeightSum(weight_sum));
    }
    Ok(levels)
}

/// Scaling constants mapping the physical problem onto a unit-order
/// dimensionless system. All solver-internal quantities are expressed in
/// this scale; conversion back to physical units happens only at output.
#[derive(Clone, Copy, Debug)]
pub struct DimensionlessScale {
    /// Reference length in m (1 nm)
    pub reference_length: f64,
    /// Thermal voltage kT/q in V
    pub thermal_voltage: f64,
    /// Multiplies a net number density in m^-3 into the dimensionless
    /// Poisson source: q Lc^2 / (eps_0 V_T)
    pub charge_scale: f64,
    /// Multiplies a sheet density in m^-2 into the dimensionless interface
    /// source: q Lc / (eps_0 V_T)
    pub surface_charge_scale: f64,
}

impl DimensionlessScale {
    /// Reference length of 1 nm.
    pub const REFERENCE_LENGTH: f64 = 1e-9;

    /// Derives the scale from the validated parameters.
    pub fn from_parameters(parameters: &PhysicalParameters) -> Self {
        let thermal_voltage = BOLTZMANN * parameters.temperature / ELECTRON_CHARGE;
        let charge_scale = ELECTRON_CHARGE * Self::REFERENCE_LENGTH * Self::REFERENCE_LENGTH
            / (EPSILON_0 * thermal_voltage);
        Self {
            reference_length: Self::REFERENCE_LENGTH,
            thermal_voltage,
            charge_scale,
            surface_charge_scale: charge_scale / Self::REFERENCE_LENGTH,
        }
    }

    /// Converts a physical potential in V to its dimensionless counterpart.
    pub fn potential_to_dimensionless(&self, volts: f64) -> f64 {
        volts / self.thermal_voltage
    }

    /// Converts a dimensionless potential back to V.
    pub fn potential_to_volts(&self, phi: f64) -> f64 {
        phi * self.thermal_voltage
    }

    /// Converts a physical length in m to reference-length units.
    pub fn length_to_dimensionless(&self, metres: f64) -> f64 {
        metres / self.reference_length
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::app::PhysicalConfiguration;
    use approx::assert_relative_eq;

    #[test]
    fn default_configuration_builds() {
        let parameters =
            PhysicalParameters::from_configuration(&PhysicalConfiguration::default()).unwrap();
        assert_relative_eq!(parameters.thermal_energy, 0.025852, max_relative = 1e-3);
        // 4H-SiC effective densities of states at 300 K
        assert_relative_eq!(parameters.conduction_dos, 2.05e25, max_relative = 2e-2);
        assert_relative_eq!(parameters.valence_dos, 2.51e25, max_relative = 2e-2);
    }

    #[test]
    fn fermi_level_lies_inside_the_bracket() {
        let parameters =
            PhysicalParameters::from_configuration(&PhysicalConfiguration::default()).unwrap();
        assert!(parameters.fermi_level > parameters.thermal_energy);
        assert!(parameters.fermi_level < parameters.band_gap - parameters.thermal_energy);
        // n-type material: Fermi level in the upper half of the gap
        assert!(parameters.fermi_level > 0.5 * parameters.band_gap);
    }

    #[test]
    fn fermi_level_satisfies_charge_neutrality() {
        let parameters =
            PhysicalParameters::from_configuration(&PhysicalConfiguration::default()).unwrap();
        let lhs = parameters.hole_density(parameters.fermi_level)
            + parameters.ionized_donors(parameters.fermi_level);
        let rhs = parameters.electron_density(parameters.fermi_level)
            + parameters.ionized_acceptors(parameters.fermi_level);
        assert_relative_eq!(lhs, rhs, max_relative = 1e-8);
    }

    #[test]
    fn donor_weights_are_normalized() {
        let parameters =
            PhysicalParameters::from_configuration(&PhysicalConfiguration::default()).unwrap();
        let sum: f64 = parameters
            .donor_levels
            .iter()
            .map(|level| level.weight)
            .sum();
        assert_relative_eq!(sum, 1.0, max_relative = 1e-12);
    }

    #[test]
    fn negative_temperature_is_rejected() {
        let configuration = PhysicalConfiguration {
            temperature: -10.0,
            ..Default::default()
        };
        assert!(matches!(
            PhysicalParameters::from_configuration(&configuration),
            Err(ConfigurationError::NonPositiveTemperature(_))
        ));
    }

    #[test]
    fn empty_donor_levels_are_rejected() {
        let configuration = PhysicalConfiguration {
            donor_energies: vec![],
            donor_ratios: vec![],
            ..Default::default()
        };
        assert!(matches!(
            PhysicalParameters::from_configuration(&configuration),
            Err(ConfigurationError::EmptyDonorLevels)
        ));
    }

    #[test]
    fn mismatched_level_lists_are_rejected() {
        let configuration = PhysicalConfiguration {
            donor_energies: vec![0.124, 0.066],
            donor_ratios: vec![1.0],
            ..Default::default()
        };
        assert!(matches!(
            PhysicalParameters::from_configuration(&configuration),
            Err(ConfigurationError::MismatchedDonorLevels { .. })
        ));
    }

    #[test]
    fn non_positive_ratios_are_rejected() {
        let configuration = PhysicalConfiguration {
            donor_ratios: vec![1.0, -1.88],
            ..Default::default()
        };
        assert!(matches!(
            PhysicalParameters::from_configuration(&configuration),
            Err(ConfigurationError::NonPositiveRatio(_))
        ));
    }

    #[test]
    fn scale_round_trips_potentials() {
        let parameters =
            PhysicalParameters::from_configuration(&PhysicalConfiguration::default()).unwrap();
        let scale = DimensionlessScale::from_parameters(&parameters);
        let phi = scale.potential_to_dimensionless(1.0);
        assert_relative_eq!(phi, 38.68, max_relative = 1e-2);
        assert_relative_eq!(scale.potential_to_volts(phi), 1.0, max_relative = 1e-12);
    }
}
