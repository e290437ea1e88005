//! Run configuration, deserialized from a TOML file with the [`config`]
//! crate. Every field carries a default so a partial file, or no file at
//! all, yields the reference 4H-SiC column.

use crate::newton::ConvergenceMetric;
use color_eyre::eyre::eyre;
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Configuration {
    pub(crate) physical: PhysicalConfiguration,
    pub(crate) geometry: GeometryConfiguration,
    pub(crate) simulation: SimulationConfiguration,
}

/// Material and doping inputs, prior to validation.
///
/// Energies are in eV: donor levels are measured down from the conduction
/// band edge and the acceptor level up from the valence band edge. The
/// defaults describe nitrogen-doped 4H-SiC at room temperature.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PhysicalConfiguration {
    /// Lattice temperature in K
    pub temperature: f64,
    /// Donor concentration in m^-3
    pub donor_concentration: f64,
    /// Acceptor concentration in m^-3
    pub acceptor_concentration: f64,
    /// Sheet charge at the oxide/semiconductor interface in m^-2
    pub interface_charge: f64,
    /// Electron effective mass over the free electron mass
    pub electron_mass_ratio: f64,
    /// Hole effective mass over the free electron mass
    pub hole_mass_ratio: f64,
    /// Number of equivalent conduction band minima
    pub conduction_degeneracy: usize,
    /// Number of equivalent valence band maxima
    pub valence_degeneracy: usize,
    /// Relative permittivity of the semiconductor
    pub epsilon_semiconductor: f64,
    /// Relative permittivity of the oxide
    pub epsilon_oxide: f64,
    /// Relative permittivity of the vacuum gap
    pub epsilon_vacuum: f64,
    /// Band gap in eV
    pub band_gap: f64,
    /// Donor ionization energies below the conduction band edge in eV
    pub donor_energies: Vec<f64>,
    /// Relative donor populations per level; normalized internally
    pub donor_ratios: Vec<f64>,
    /// Acceptor level above the valence band edge in eV
    pub acceptor_energy: f64,
}

impl Default for PhysicalConfiguration {
    fn default() -> Self {
        Self {
            temperature: 300.0,
            donor_concentration: 1e22,
            acceptor_concentration: 0.0,
            interface_charge: 1e15,
            electron_mass_ratio: 0.42,
            hole_mass_ratio: 1.0,
            conduction_degeneracy: 3,
            valence_degeneracy: 1,
            epsilon_semiconductor: 9.7,
            epsilon_oxide: 3.9,
            epsilon_vacuum: 1.0,
            band_gap: 3.26,
            // Hexagonal and cubic nitrogen sites in 4H-SiC
            donor_energies: vec![0.124, 0.066],
            donor_ratios: vec![1.0, 1.88],
            acceptor_energy: 0.2,
        }
    }
}

/// Layer thicknesses of the column beneath the tip apex, in m.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GeometryConfiguration {
    /// Semiconductor thickness above the grounded base
    pub semiconductor_thickness: f64,
    /// Oxide thickness on top of the semiconductor
    pub oxide_thickness: f64,
    /// Vacuum gap between the oxide and the tip surface
    pub tip_sample_distance: f64,
    /// Radius of the far-field boundary entering the Robin coefficient
    pub farfield_radius: f64,
    /// Target element size of the discretization
    pub mesh_spacing: f64,
}

impl Default for GeometryConfiguration {
    fn default() -> Self {
        Self {
            semiconductor_thickness: 195e-9,
            oxide_thickness: 1e-9,
            tip_sample_distance: 5e-9,
            farfield_radius: 500e-9,
            mesh_spacing: 1e-9,
        }
    }
}

/// Solver controls and the requested voltage sweep.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SimulationConfiguration {
    /// Tip voltages to report, in V and in any order
    pub tip_voltages: Vec<f64>,
    /// Newton iteration budget per attempt
    pub maximum_iterations: usize,
    /// Convergence tolerance on the configured metric
    pub tolerance: f64,
    /// Newton update damping; 1 is undamped
    pub damping: f64,
    /// Number of equal continuation steps when the direct solve diverges
    pub continuation_steps: usize,
    /// Norm the convergence test uses
    pub convergence_metric: ConvergenceMetric,
}

impl Default for SimulationConfiguration {
    fn default() -> Self {
        Self {
            tip_voltages: vec![-2.0, -1.0, 0.0, 1.0, 2.0],
            maximum_iterations: 100,
            tolerance: 1e-10,
            damping: 1.0,
            continuation_steps: crate::homotopy::DEFAULT_CONTINUATION_STEPS,
            convergence_metric: ConvergenceMetric::Residual,
        }
    }
}

impl Configuration {
    pub(crate) fn build(path: &Path) -> color_eyre::Result<Self> {
        let s = Config::builder()
            .add_source(File::from(path))
            .build()?;
        s.try_deserialize()
            .map_err(|e| eyre!(format!("Failed to deserialize the config file: {:?}", e)))
    }
}
