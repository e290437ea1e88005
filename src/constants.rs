//! # Constants
//!
//! Defines physical constants used in the simulation

pub const BOLTZMANN: f64 = 1.38064852e-23; // The Boltzmann constant in m^2 kg / s^2 K
pub const ELECTRON_CHARGE: f64 = 1.60217662e-19; // Single electron charge in C
pub const ELECTRON_MASS: f64 = 9.10938356e-31; // Single electron mass
pub const EPSILON_0: f64 = 8.85418782e-12; // Permitivitty of free space in F / m
pub const PLANCK: f64 = 6.62607004e-34; // Planck constant in J s
