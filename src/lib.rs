//! Tip-poisson is a nonlinear electrostatics solver for scanning-probe
//! tip/sample systems written in Rust
//!
//! # Overview
//! Tip-poisson computes the self-consistent electrostatic potential in a
//! layered semiconductor/oxide/vacuum structure beneath a biased probe tip by
//! solving the nonlinear Poisson equation. The volumetric charge density in
//! the semiconductor follows Fermi-Dirac statistics, so the discretized
//! problem is solved by a damped Newton-Raphson iteration with an exact
//! analytic Jacobian. When the direct iteration diverges a homotopy
//! continuation stages the charge term in from zero, and a voltage sweep
//! scheduler orders the requested tip biases so that each solve is seeded by
//! the converged potential of the nearest previously solved bias.
//!
//! # Usage
//! Tip-poisson is distributed as a binary crate driven by a `.toml`
//! configuration file:
//!
//! ```toml
//! [physical]
//! temperature = 300.0
//! donor_concentration = 1e22
//!
//! [geometry]
//! tip_sample_distance = 5e-9
//!
//! [simulation]
//! tip_voltages = [-1.0, -0.5, 0.5, 1.0]
//! ```
//!
//! where omitted physical parameters default to 4H-SiC values.

#![warn(missing_docs)]
#![allow(clippy::type_complexity)]

/// The command line application, configuration and tracing primitives
pub mod app;

/// Residual and Jacobian assembly backends
pub mod backend;

/// The Fermi-Dirac charge density model
pub mod charge;

/// Physical constants
mod constants;

/// Error handling
pub mod error;

/// Fermi integrals and the shared numerical stabilization helpers
pub mod fermi;

/// Homotopy continuation over the charge-density scaling
pub mod homotopy;

/// The Newton-Raphson iteration for a fixed problem instance
pub mod newton;

/// Physical parameters and the dimensionless scale
pub mod parameters;

/// The voltage sweep scheduler
pub mod sweep;
