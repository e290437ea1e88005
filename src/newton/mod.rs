//! # Newton
//!
//! Damped Newton-Raphson iteration for a fixed problem instance. Divergence
//! is an ordinary, expected outcome consumed by the homotopy controller,
//! never an error: only a backend failure propagates as `Err`.

use crate::backend::{BoundaryValues, PoissonBackend};
use crate::charge::ChargeSource;
use crate::error::BackendError;
use nalgebra::DVector;
use serde::Deserialize;

/// Convergence test applied after each iteration.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConvergenceMetric {
    /// Converged when the residual norm falls below the tolerance
    Residual,
    /// Converged when the damped update norm falls below the tolerance
    Update,
}

/// Settings of a single Newton attempt.
#[derive(Clone, Copy, Debug)]
pub struct NewtonSettings {
    /// Iteration budget before the attempt is declared diverged
    pub maximum_iterations: usize,
    /// Convergence tolerance on the configured metric
    pub tolerance: f64,
    /// Scaling applied to every update; 1 is undamped
    pub damping: f64,
    /// Which norm the convergence test uses
    pub metric: ConvergenceMetric,
}

/// Progress of a Newton attempt through its state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NewtonPhase {
    /// No residual assembled yet
    Initialized,
    /// At least one residual assembled, neither terminal state reached
    Iterating,
    /// Terminal: the convergence test passed
    Converged,
    /// Terminal: the iteration budget was exhausted or the residual left the
    /// representable range
    Diverged,
}

/// Terminal result of one Newton attempt.
#[derive(Clone, Copy, Debug)]
pub enum NewtonOutcome {
    /// The attempt satisfied the convergence test
    Converged {
        /// Iterations consumed
        iterations: usize,
        /// Final residual norm
        residual_norm: f64,
    },
    /// The attempt exhausted its budget; recoverable by continuation
    Diverged {
        /// Iterations consumed
        iterations: usize,
        /// Final residual norm
        residual_norm: f64,
    },
}

/// Mutable per-voltage solver state. Created at the start of a voltage
/// solve and either archived as the seed of the next voltage or discarded.
#[derive(Clone, Debug)]
pub struct SolverState {
    /// Current trial potential
    pub potential: DVector<f64>,
    /// Iterations consumed by the current attempt
    pub iteration: usize,
    /// Residual norms across all attempts of this voltage solve
    pub residual_history: Vec<f64>,
    /// Continuation parameter of the current attempt; 1 is the full
    /// nonlinearity
    pub continuation_parameter: f64,
    /// Position in the Newton state machine
    pub phase: NewtonPhase,
}

impl SolverState {
    /// Fresh state around an initial guess.
    pub fn new(potential: DVector<f64>) -> Self {
        Self {
            potential,
            iteration: 0,
            residual_history: Vec::new(),
            continuation_parameter: 1.0,
            phase: NewtonPhase::Initialized,
        }
    }

    /// Rewinds the iteration counter for a new attempt at `lambda`, keeping
    /// the potential and the accumulated residual history.
    pub fn begin_attempt(&mut self, lambda: f64) {
        self.iteration = 0;
        self.continuation_parameter = lambda;
        self.phase = NewtonPhase::Initialized;
    }
}

/// Newton-Raphson driver over an assembly backend.
#[derive(Clone, Copy, Debug)]
pub struct NewtonSolver {
    settings: NewtonSettings,
}

impl NewtonSolver {
    /// A solver with the supplied settings.
    pub fn new(settings: NewtonSettings) -> Self {
        Self { settings }
    }

    /// Runs the iteration until the convergence test passes or the budget is
    /// exhausted. The trial potential in `state` is clamped onto the
    /// Dirichlet data first, so seeds from neighbouring voltages are valid
    /// starting points.
    pub fn solve<B: PoissonBackend + ?Sized>(
        &self,
        backend: &B,
        charge: &dyn ChargeSource,
        boundary: &BoundaryValues,
        state: &mut SolverState,
    ) -> Result<NewtonOutcome, BackendError> {
        backend.apply_boundary_values(&mut state.potential, boundary);

        loop {
            let system = backend.assemble(&state.potential, charge, boundary)?;
            let residual_norm = system.residual.norm();
            state.residual_history.push(residual_norm);

            if !residual_norm.is_finite() {
                state.phase = NewtonPhase::Diverged;
                return Ok(NewtonOutcome::Diverged {
                    iterations: state.iteration,
                    residual_norm,
                });
            }
            if self.settings.metric == ConvergenceMetric::Residual
                && residual_norm < self.settings.tolerance
            {
                state.phase = NewtonPhase::Converged;
                return Ok(NewtonOutcome::Converged {
                    iterations: state.iteration,
                    residual_norm,
                });
            }
            if state.iteration >= self.settings.maximum_iterations {
                state.phase = NewtonPhase::Diverged;
                return Ok(NewtonOutcome::Diverged {
                    iterations: state.iteration,
                    residual_norm,
                });
            }
            state.phase = NewtonPhase::Iterating;

            let update = backend.solve_linear(&system.jacobian, &(-&system.residual))?;
            state.potential.axpy(self.settings.damping, &update, 1.0);
            state.iteration += 1;

            let update_norm = self.settings.damping * update.norm();
            tracing::trace!(
                "iteration {}: residual {:.3e}, update {:.3e}, lambda {}",
                state.iteration,
                residual_norm,
                update_norm,
                state.continuation_parameter
            );
            if self.settings.metric == ConvergenceMetric::Update
                && update_norm < self.settings.tolerance
            {
                state.phase = NewtonPhase::Converged;
                return Ok(NewtonOutcome::Converged {
                    iterations: state.iteration,
                    residual_norm,
                });
            }
        }
    }
}
