//! # Backend
//!
//! The contract the nonlinear core requires from an assembly/linear-solve
//! backend: given a trial potential and the charge density callables, return
//! an algebraic residual vector and a Jacobian consistent with the supplied
//! derivative (exact Newton linearization, never a secant approximation).
//!
//! The weak form behind the contract carries a diffusion term weighted by
//! the regional permittivity, Dirichlet values at the tip and the grounded
//! semiconductor base, a Robin (radiation) condition on the far-field
//! boundary with coefficient epsilon / L, a natural condition on the
//! symmetry axis, the volumetric charge contribution in the semiconductor
//! and a surface term for the sheet charge at the oxide/semiconductor
//! interface.
//!
//! The narrow trait keeps the Newton and homotopy layers testable against a
//! synthetic backend; [`column`] provides the built-in 1-D discretization of
//! the layered column along the symmetry axis.

mod column;

pub use column::ColumnBackend;

use crate::charge::ChargeSource;
use crate::error::BackendError;
use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;

/// Boundary data for a single voltage solve, in dimensionless form.
#[derive(Clone, Copy, Debug)]
pub struct BoundaryValues {
    /// Dirichlet potential on the tip surface
    pub tip: f64,
    /// Dirichlet potential at the semiconductor base
    pub ground: f64,
    /// Inverse far-field radius 1/L multiplying the regional permittivity in
    /// the Robin term; ignored by backends without a lateral boundary
    pub farfield_coefficient: f64,
}

/// The algebraic system produced by one assembly pass.
pub struct AssembledSystem {
    /// Residual of the discretized weak form at the trial potential
    pub residual: DVector<f64>,
    /// Exact Jacobian of the residual with respect to the nodal potentials
    pub jacobian: CscMatrix<f64>,
}

/// Assembly and linear-solve capability supplied by a FEM backend.
pub trait PoissonBackend {
    /// Number of nodal degrees of freedom.
    fn num_dofs(&self) -> usize;

    /// Overwrites the Dirichlet nodes of `potential` with the boundary
    /// values, so a seed carried over from a different voltage satisfies the
    /// constraints before the first assembly.
    fn apply_boundary_values(&self, potential: &mut DVector<f64>, boundary: &BoundaryValues);

    /// Assembles the residual and Jacobian at `trial`.
    fn assemble(
        &self,
        trial: &DVector<f64>,
        charge: &dyn ChargeSource,
        boundary: &BoundaryValues,
    ) -> Result<AssembledSystem, BackendError>;

    /// Solves `jacobian * x = rhs` for the Newton update.
    fn solve_linear(
        &self,
        jacobian: &CscMatrix<f64>,
        rhs: &DVector<f64>,
    ) -> Result<DVector<f64>, BackendError>;
}
