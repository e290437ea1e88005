//! # Homotopy
//!
//! Recovers convergence when the direct Newton attempt diverges by scaling
//! the charge-density term with a continuation parameter lambda. The purely
//! linear lambda = 0 problem always converges; the controller then walks a
//! fixed number of equal lambda steps up to 1, seeding each Newton attempt
//! with the previous step's converged potential. A diverging intermediate
//! step fails the whole voltage solve: the controller deliberately does not
//! subdivide steps, which keeps the failure semantics bounded.

use crate::backend::{BoundaryValues, PoissonBackend};
use crate::charge::{ChargeSource, ScaledCharge};
use crate::error::SolveError;
use crate::newton::{NewtonOutcome, NewtonSolver, SolverState};
use nalgebra::DVector;

/// Default number of equal lambda steps from 0 to 1.
pub const DEFAULT_CONTINUATION_STEPS: usize = 10;

/// Converged result of a single voltage solve.
#[derive(Clone, Debug)]
pub struct VoltageSolution {
    /// The converged potential at lambda = 1
    pub potential: DVector<f64>,
    /// Residual norm of the final Newton attempt
    pub residual_norm: f64,
    /// Newton iterations accumulated across all attempts
    pub iterations: usize,
}

/// Drives a Newton solver to lambda = 1, through continuation when needed.
pub struct HomotopyController<'a, B: PoissonBackend + ?Sized> {
    backend: &'a B,
    newton: NewtonSolver,
    steps: usize,
}

impl<'a, B: PoissonBackend + ?Sized> HomotopyController<'a, B> {
    /// A controller over `backend` with `steps` equal lambda increments.
    pub fn new(backend: &'a B, newton: NewtonSolver, steps: usize) -> Self {
        Self {
            backend,
            newton,
            steps: steps.max(1),
        }
    }

    /// Solves one voltage point, first directly at lambda = 1 and then by
    /// staged continuation if the direct attempt diverges.
    #[tracing::instrument(name = "Voltage solve", level = "debug", skip(self, charge, initial))]
    pub fn solve(
        &self,
        charge: &dyn ChargeSource,
        boundary: &BoundaryValues,
        initial: DVector<f64>,
    ) -> Result<VoltageSolution, SolveError> {
        let mut state = SolverState::new(initial.clone());
        match self
            .newton
            .solve(self.backend, charge, boundary, &mut state)?
        {
            NewtonOutcome::Converged {
                iterations,
                residual_norm,
            } => {
                return Ok(VoltageSolution {
                    potential: state.potential,
                    residual_norm,
                    iterations,
                })
            }
            NewtonOutcome::Diverged {
                iterations,
                residual_norm,
            } => {
                tracing::debug!(
                    "direct Newton diverged after {iterations} iterations (residual {residual_norm:.3e}), staging the charge term"
                );
            }
        }

        let mut state = SolverState::new(initial);
        let mut total_iterations = 0;
        let mut final_residual = f64::NAN;
        for step in 0..=self.steps {
            let lambda = step as f64 / self.steps as f64;
            state.begin_attempt(lambda);
            let scaled = ScaledCharge {
                source: charge,
                scaling: lambda,
            };
            match self
                .newton
                .solve(self.backend, &scaled, boundary, &mut state)?
            {
                NewtonOutcome::Converged {
                    iterations,
                    residual_norm,
                } => {
                    total_iterations += iterations;
                    final_residual = residual_norm;
                    tracing::trace!(
                        "lambda {lambda}: converged in {iterations} iterations"
                    );
                }
                NewtonOutcome::Diverged {
                    iterations,
                    residual_norm,
                } => {
                    return Err(SolveError::Continuation {
                        lambda,
                        iterations,
                        residual_norm,
                    })
                }
            }
        }

        Ok(VoltageSolution {
            potential: state.potential,
            residual_norm: final_residual,
            iterations: total_iterations,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::{AssembledSystem, PoissonBackend};
    use crate::error::BackendError;
    use crate::newton::{ConvergenceMetric, NewtonSettings};
    use nalgebra_sparse::{CooMatrix, CscMatrix};

    fn newton(maximum_iterations: usize) -> NewtonSolver {
        NewtonSolver::new(NewtonSettings {
            maximum_iterations,
            tolerance: 1e-10,
            damping: 1.0,
            metric: ConvergenceMetric::Residual,
        })
    }

    /// One-dof backend with residual `a x - s + rho(x)`.
    struct ScalarBackend {
        stiffness: f64,
        source: f64,
    }

    impl PoissonBackend for ScalarBackend {
        fn num_dofs(&self) -> usize {
            1
        }

        fn apply_boundary_values(&self, _potential: &mut DVector<f64>, _boundary: &BoundaryValues) {}

        fn assemble(
            &self,
            trial: &DVector<f64>,
            charge: &dyn ChargeSource,
            _boundary: &BoundaryValues,
        ) -> Result<AssembledSystem, BackendError> {
            let x = trial[0];
            let mut coo = CooMatrix::new(1, 1);
            coo.push(0, 0, self.stiffness + charge.density_derivative(x));
            Ok(AssembledSystem {
                residual: DVector::from_element(
                    1,
                    self.stiffness * x - self.source + charge.density(x),
                ),
                jacobian: CscMatrix::from(&coo),
            })
        }

        fn solve_linear(
            &self,
            jacobian: &CscMatrix<f64>,
            rhs: &DVector<f64>,
        ) -> Result<DVector<f64>, BackendError> {
            let diagonal = jacobian.triplet_iter().map(|(_, _, v)| *v).sum::<f64>();
            Ok(DVector::from_element(1, rhs[0] / diagonal))
        }
    }

    /// Steep enough that undamped Newton from the origin cycles forever.
    struct SteepCharge;

    impl ChargeSource for SteepCharge {
        fn density(&self, phi: f64) -> f64 {
            (50.0 * (phi - 1.0)).atan()
        }

        fn density_derivative(&self, phi: f64) -> f64 {
            50.0 / (1.0 + (50.0 * (phi - 1.0)).powi(2))
        }
    }

    fn boundary() -> BoundaryValues {
        BoundaryValues {
            tip: 0.0,
            ground: 0.0,
            farfield_coefficient: 0.0,
        }
    }

    #[test]
    fn continuation_recovers_a_diverging_direct_solve() {
        let backend = ScalarBackend {
            stiffness: 0.05,
            source: 0.05,
        };
        let controller = HomotopyController::new(&backend, newton(25), DEFAULT_CONTINUATION_STEPS);
        let solution = controller
            .solve(&SteepCharge, &boundary(), DVector::zeros(1))
            .unwrap();
        // Root of 0.05 x - 0.05 + atan(50 (x - 1)) is x = 1
        approx::assert_relative_eq!(solution.potential[0], 1.0, max_relative = 1e-8);
        assert!(solution.residual_norm < 1e-10);
    }

    #[test]
    fn converging_direct_solve_skips_continuation() {
        let backend = ScalarBackend {
            stiffness: 1.0,
            source: 2.0,
        };
        let controller = HomotopyController::new(&backend, newton(25), DEFAULT_CONTINUATION_STEPS);
        let solution = controller
            .solve(
                &ScaledCharge {
                    source: &SteepCharge,
                    scaling: 0.0,
                },
                &boundary(),
                DVector::zeros(1),
            )
            .unwrap();
        approx::assert_relative_eq!(solution.potential[0], 2.0, max_relative = 1e-10);
        assert_eq!(solution.iterations, 1);
    }

    /// Charge with a pole that defeats Newton for every lambda > 0.
    struct HostileCharge;

    impl ChargeSource for HostileCharge {
        fn density(&self, phi: f64) -> f64 {
            (500.0 * (phi - 10.0)).atan()
        }

        fn density_derivative(&self, phi: f64) -> f64 {
            500.0 / (1.0 + (500.0 * (phi - 10.0)).powi(2))
        }
    }

    #[test]
    fn diverging_intermediate_step_fails_the_voltage_solve() {
        let backend = ScalarBackend {
            stiffness: 1e-4,
            source: 0.0,
        };
        let controller = HomotopyController::new(&backend, newton(8), DEFAULT_CONTINUATION_STEPS);
        let result = controller.solve(&HostileCharge, &boundary(), DVector::zeros(1));
        match result {
            Err(SolveError::Continuation { lambda, .. }) => {
                assert!(lambda > 0.0);
                assert!(lambda <= 1.0);
            }
            other => panic!("expected a continuation failure, got {other:?}"),
        }
    }
}
