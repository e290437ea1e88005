//! # Sweep
//!
//! Orders the requested tip voltages for maximal continuation quality and
//! threads each converged potential forward as the next initial guess.
//!
//! The plan always solves 0 V first, walks the positive voltages in
//! ascending order, re-seeds from the 0 V solution, and then walks the
//! negative voltages from least- to most-negative. Proximity in voltage
//! dominates initial-guess quality, so this ordering is a design invariant
//! rather than an implementation detail. A failed voltage point is recorded
//! and the sweep carries on from the last known-good potential.

use crate::backend::{BoundaryValues, PoissonBackend};
use crate::charge::ChargeSource;
use crate::error::{ConfigurationError, SolveError};
use crate::homotopy::{HomotopyController, VoltageSolution};
use crate::newton::NewtonSolver;
use crate::parameters::DimensionlessScale;
use nalgebra::DVector;

/// Ordered solve schedule derived from the user-supplied voltage list.
///
/// 0 V is always visited first as the seed even when absent from the
/// requested list; it only appears in the reported results when requested.
#[derive(Clone, Debug, PartialEq)]
pub struct SweepPlan {
    requested: Vec<f64>,
    order: Vec<f64>,
}

impl SweepPlan {
    /// Builds the schedule from a possibly unordered, possibly duplicated
    /// voltage list.
    pub fn new(voltages: &[f64]) -> Result<Self, ConfigurationError> {
        for &voltage in voltages {
            if !voltage.is_finite() {
                return Err(ConfigurationError::NonFiniteVoltage(voltage));
            }
        }

        let mut sorted = voltages.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).expect("voltages are finite"));
        sorted.dedup();

        let positives: Vec<f64> = sorted.iter().copied().filter(|&v| v > 0.0).collect();
        let mut negatives: Vec<f64> = sorted.iter().copied().filter(|&v| v < 0.0).collect();
        negatives.reverse(); // least-negative first

        let mut order = vec![0.0];
        order.extend_from_slice(&positives);
        if !negatives.is_empty() {
            order.push(0.0); // re-seed the descending branch
            order.extend_from_slice(&negatives);
        }

        Ok(Self {
            requested: sorted,
            order,
        })
    }

    /// The voltages in solve order; 0 V appears twice when a negative branch
    /// exists, and the second visit reuses the cached 0 V solution.
    pub fn visit_order(&self) -> &[f64] {
        &self.order
    }

    /// The deduplicated requested voltages.
    pub fn requested(&self) -> &[f64] {
        &self.requested
    }
}

/// The reported outcome of one requested voltage.
#[derive(Clone, Debug)]
pub struct SweepRecord {
    /// Requested tip voltage in V
    pub voltage: f64,
    /// Converged solution or the failure that exhausted recovery
    pub outcome: Result<VoltageSolution, SolveError>,
}

/// Executes a [`SweepPlan`] against a backend.
pub struct VoltageSweep<'a, B: PoissonBackend + ?Sized> {
    backend: &'a B,
    newton: NewtonSolver,
    continuation_steps: usize,
    scale: DimensionlessScale,
    farfield_coefficient: f64,
}

impl<'a, B: PoissonBackend + ?Sized> VoltageSweep<'a, B> {
    /// A sweep executor over `backend`.
    pub fn new(
        backend: &'a B,
        newton: NewtonSolver,
        continuation_steps: usize,
        scale: DimensionlessScale,
        farfield_coefficient: f64,
    ) -> Self {
        Self {
            backend,
            newton,
            continuation_steps,
            scale,
            farfield_coefficient,
        }
    }

    fn boundary(&self, voltage: f64) -> BoundaryValues {
        BoundaryValues {
            tip: self.scale.potential_to_dimensionless(voltage),
            ground: 0.0,
            farfield_coefficient: self.farfield_coefficient,
        }
    }

    /// Solves every scheduled voltage, threading the last converged
    /// potential forward as the next seed. One failed voltage never aborts
    /// the sweep.
    #[tracing::instrument(name = "Voltage sweep", skip_all)]
    pub fn run(&self, plan: &SweepPlan, charge: &dyn ChargeSource) -> Vec<SweepRecord> {
        let controller =
            HomotopyController::new(self.backend, self.newton, self.continuation_steps);
        let zero_guess: DVector<f64> = DVector::zeros(self.backend.num_dofs());

        let mut records = Vec::with_capacity(plan.requested().len());
        let mut zero_cache: Option<Result<VoltageSolution, SolveError>> = None;
        let mut seed = zero_guess.clone();

        for &voltage in plan.visit_order() {
            if voltage == 0.0 {
                if let Some(cached) = &zero_cache {
                    // Re-seed the descending branch from the 0 V solution
                    seed = match cached {
                        Ok(solution) => solution.potential.clone(),
                        Err(_) => zero_guess.clone(),
                    };
                    continue;
                }
            }

            tracing::info!("Solving for tip voltage {voltage} V");
            let outcome = controller.solve(charge, &self.boundary(voltage), seed.clone());
            match &outcome {
                Ok(solution) => {
                    tracing::info!(
                        "Tip voltage {voltage} V converged in {} iterations (residual {:.3e})",
                        solution.iterations,
                        solution.residual_norm
                    );
                    seed = solution.potential.clone();
                }
                Err(error) => {
                    // Fall back to the last known-good potential for the
                    // next voltage point
                    tracing::warn!("Tip voltage {voltage} V failed: {error}");
                }
            }

            if voltage == 0.0 {
                zero_cache = Some(outcome.clone());
            }
            if plan.requested().contains(&voltage) {
                records.push(SweepRecord { voltage, outcome });
            }
        }

        records
    }
}
