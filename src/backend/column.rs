//! Built-in 1-D backend discretizing the layered semiconductor/oxide/vacuum
//! column along the symmetry axis with linear finite elements.
//!
//! The column runs from the grounded semiconductor base (node 0) up to the
//! tip surface (last node). The charge density is lumped onto the
//! semiconductor nodes, the interface sheet charge lands on the single node
//! shared by the semiconductor and the oxide, and the Dirichlet constraints
//! are eliminated symmetrically so the Jacobian stays positive definite and
//! a sparse Cholesky factorization backs the linear solve. There is no
//! lateral boundary, so the Robin far-field coefficient does not enter.

use super::{AssembledSystem, BoundaryValues, PoissonBackend};
use crate::app::GeometryConfiguration;
use crate::charge::ChargeSource;
use crate::error::{BackendError, ConfigurationError};
use crate::parameters::{DimensionlessScale, PhysicalParameters};
use itertools::izip;
use nalgebra::DVector;
use nalgebra_sparse::{factorization::CscCholesky, CooMatrix, CscMatrix};

/// 1-D reference backend for the layered column beneath the tip apex.
#[derive(Clone, Debug)]
pub struct ColumnBackend {
    /// Node coordinates in reference-length units, ascending from the ground
    /// plane to the tip surface
    coordinates: Vec<f64>,
    /// Relative permittivity per element
    element_permittivity: Vec<f64>,
    /// Lumped semiconductor volume per node; zero outside the semiconductor
    charge_weight: Vec<f64>,
    /// Node shared by the semiconductor and the oxide
    interface_node: usize,
    /// Dimensionless interface sheet charge
    interface_charge: f64,
}

impl ColumnBackend {
    /// Discretizes the column described by `geometry`.
    pub fn new(
        geometry: &GeometryConfiguration,
        parameters: &PhysicalParameters,
        scale: &DimensionlessScale,
    ) -> Result<Self, ConfigurationError> {
        for (name, value) in [
            ("semiconductor_thickness", geometry.semiconductor_thickness),
            ("oxide_thickness", geometry.oxide_thickness),
            ("tip_sample_distance", geometry.tip_sample_distance),
            ("farfield_radius", geometry.farfield_radius),
            ("mesh_spacing", geometry.mesh_spacing),
        ] {
            if value <= 0.0 || !value.is_finite() {
                return Err(ConfigurationError::InvalidGeometry(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }

        let spacing = scale.length_to_dimensionless(geometry.mesh_spacing);
        let layers = [
            (
                scale.length_to_dimensionless(geometry.semiconductor_thickness),
                parameters.epsilon_semiconductor,
            ),
            (
                scale.length_to_dimensionless(geometry.oxide_thickness),
                parameters.epsilon_oxide,
            ),
            (
                scale.length_to_dimensionless(geometry.tip_sample_distance),
                parameters.epsilon_vacuum,
            ),
        ];

        let mut coordinates = vec![0.0];
        let mut element_permittivity = Vec::new();
        let mut interface_node = 0;
        let mut z = 0.0;
        for (index, (thickness, permittivity)) in layers.into_iter().enumerate() {
            let elements = ((thickness / spacing).ceil() as usize).max(1);
            let h = thickness / elements as f64;
            for _ in 0..elements {
                z += h;
                coordinates.push(z);
                element_permittivity.push(permittivity);
            }
            if index == 0 {
                interface_node = coordinates.len() - 1;
            }
        }

        // Lump half of each adjacent semiconductor element onto its nodes
        let mut charge_weight = vec![0.0; coordinates.len()];
        for element in 0..interface_node {
            let h = coordinates[element + 1] - coordinates[element];
            charge_weight[element] += 0.5 * h;
            charge_weight[element + 1] += 0.5 * h;
        }

        tracing::debug!(
            "Column discretized with {} nodes, interface at node {}",
            coordinates.len(),
            interface_node
        );

        Ok(Self {
            coordinates,
            element_permittivity,
            charge_weight,
            interface_node,
            interface_charge: scale.surface_charge_scale * parameters.interface_charge,
        })
    }

    /// Potential at the oxide/semiconductor interface, the quantity probed
    /// by the tip.
    pub fn surface_potential(&self, potential: &DVector<f64>) -> f64 {
        potential[self.interface_node]
    }

    fn is_dirichlet(&self, node: usize) -> bool {
        node == 0 || node == self.coordinates.len() - 1
    }
}

impl PoissonBackend for ColumnBackend {
    fn num_dofs(&self) -> usize {
        self.coordinates.len()
    }

    fn apply_boundary_values(&self, potential: &mut DVector<f64>, boundary: &BoundaryValues) {
        potential[0] = boundary.ground;
        potential[self.coordinates.len() - 1] = boundary.tip;
    }

    fn assemble(
        &self,
        trial: &DVector<f64>,
        charge: &dyn ChargeSource,
        boundary: &BoundaryValues,
    ) -> Result<AssembledSystem, BackendError> {
        let n = self.coordinates.len();
        if trial.len() != n {
            return Err(BackendError::Dimension {
                expected: n,
                found: trial.len(),
            });
        }

        let mut residual = DVector::zeros(n);
        let mut diagonal = vec![0.0; n];
        let mut coo = CooMatrix::new(n, n);

        // Diffusion term, element by element
        for (element, (&permittivity, window)) in
            izip!(&self.element_permittivity, self.coordinates.windows(2)).enumerate()
        {
            let conductance = permittivity / (window[1] - window[0]);
            let (i, j) = (element, element + 1);
            residual[i] += conductance * (trial[i] - trial[j]);
            residual[j] += conductance * (trial[j] - trial[i]);
            diagonal[i] += conductance;
            diagonal[j] += conductance;
            if !self.is_dirichlet(i) && !self.is_dirichlet(j) {
                coo.push(i, j, -conductance);
                coo.push(j, i, -conductance);
            }
        }

        // Volumetric charge, lumped on the semiconductor nodes
        for (node, &weight) in self.charge_weight.iter().enumerate() {
            if weight > 0.0 {
                residual[node] -= weight * charge.density(trial[node]);
                diagonal[node] -= weight * charge.density_derivative(trial[node]);
            }
        }

        // Interface sheet charge
        residual[self.interface_node] -= self.interface_charge;

        // Symmetric elimination of the Dirichlet constraints
        residual[0] = trial[0] - boundary.ground;
        residual[n - 1] = trial[n - 1] - boundary.tip;
        for (node, &value) in diagonal.iter().enumerate() {
            if self.is_dirichlet(node) {
                coo.push(node, node, 1.0);
            } else {
                coo.push(node, node, value);
            }
        }

        Ok(AssembledSystem {
            residual,
            jacobian: CscMatrix::from(&coo),
        })
    }

    fn solve_linear(
        &self,
        jacobian: &CscMatrix<f64>,
        rhs: &DVector<f64>,
    ) -> Result<DVector<f64>, BackendError> {
        let factorization = CscCholesky::factor(jacobian)
            .map_err(|error| BackendError::Factorization(format!("{error:?}")))?;
        let solution = factorization.solve(rhs);
        Ok(DVector::from_column_slice(solution.as_slice()))
    }
}
