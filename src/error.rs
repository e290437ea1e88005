//! # Error
//!
//! The error taxonomy for the solver. Configuration problems abort the run
//! before any numerical work begins, backend failures and continuation
//! exhaustion are recorded per voltage point, and ordinary Newton divergence
//! never appears here at all: it is a [`NewtonOutcome`](crate::newton::NewtonOutcome)
//! value consumed by the homotopy controller.

use miette::Diagnostic;

/// Invalid physical, geometric or simulation parameters. Fatal before any
/// solve starts.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum ConfigurationError {
    /// Temperature at or below absolute zero
    #[error("temperature must be positive, got {0} K")]
    NonPositiveTemperature(f64),
    /// An empty donor level list
    #[error("at least one donor level must be configured")]
    EmptyDonorLevels,
    /// Donor energy and ratio lists of different lengths
    #[error("{energies} donor energies configured against {ratios} population ratios")]
    MismatchedDonorLevels {
        /// Number of configured donor energies
        energies: usize,
        /// Number of configured population ratios
        ratios: usize,
    },
    /// A zero or negative donor population ratio
    #[error("donor population ratios must be positive, got {0}")]
    NonPositiveRatio(f64),
    /// Normalized donor weights failed the unit-sum invariant
    #[error("donor level weights must sum to 1, got {0}")]
    WeightSum(f64),
    /// A dopant level outside the band gap
    #[error("donor level at {0} eV lies outside the band gap of {1} eV")]
    LevelOutsideGap(f64, f64),
    /// A parameter which must be positive was not
    #[error("{0} must be positive, got {1}")]
    NonPositiveParameter(&'static str, f64),
    /// The charge-neutrality equation changed no sign across the gap
    #[error("charge neutrality has no root in [kT, Eg - kT]: the doping configuration is unphysical")]
    FermiLevelBracket,
    /// A NaN or infinite requested tip voltage
    #[error("tip voltage {0} is not finite")]
    NonFiniteVoltage(f64),
    /// A non-positive or non-finite layer dimension
    #[error("{0}")]
    InvalidGeometry(String),
}

/// A numerical failure reported by the assembly / linear-solve backend, such
/// as a singular Jacobian. Fatal for the voltage point it occurred in.
#[derive(thiserror::Error, Debug, Diagnostic, Clone)]
pub enum BackendError {
    /// The sparse Cholesky factorization of the Jacobian failed
    #[error("Jacobian factorization failed: {0}")]
    Factorization(String),
    /// A trial potential of the wrong length
    #[error("backend expected {expected} degrees of freedom, got {found}")]
    Dimension {
        /// Number of degrees of freedom the backend was built for
        expected: usize,
        /// Length of the supplied trial potential
        found: usize,
    },
}

/// Failure of a single voltage solve after all recovery strategies are
/// exhausted. The sweep records it and proceeds to the next voltage.
#[derive(thiserror::Error, Debug, Diagnostic, Clone)]
pub enum SolveError {
    /// An intermediate continuation step diverged
    #[error("homotopy continuation diverged at lambda = {lambda} after {iterations} iterations (residual norm {residual_norm:.3e})")]
    Continuation {
        /// Continuation parameter of the diverging step
        lambda: f64,
        /// Newton iterations spent in the diverging step
        iterations: usize,
        /// Residual norm at abandonment
        residual_norm: f64,
    },
    /// A backend failure during assembly or the linear solve
    #[error(transparent)]
    Backend(#[from] BackendError),
}
