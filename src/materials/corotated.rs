//! Fixed-corotated elasticity.
//!
//! Kirchhoff-like stress `tau = 2 mu (F - R) F^T + lambda (J - 1) J I`, where `R` is the
//! rotation of `F` and `J = det F`. P2G scales it by `-dt * volume * 4 / dx^2`.

use crate::math::{Matrix, Real, determinant_adjoint, diagonal_from_value, matrix_trace};

use super::polar::{polar_decompose, polar_rotation_adjoint};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CorotatedElasticity {
    pub mu: Real,
    pub lambda: Real,
}

/// Forward intermediates kept for the adjoint.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StressEvaluation {
    pub deformation: Matrix,
    pub rotation: Matrix,
    pub determinant: Real,
    pub stress: Matrix,
}

impl CorotatedElasticity {
    pub fn new(mu: Real, lambda: Real) -> Self {
        Self { mu, lambda }
    }

    pub fn kirchhoff_stress(&self, deformation: &Matrix) -> StressEvaluation {
        let f = *deformation;
        let rotation = polar_decompose(&f).rotation;
        let determinant = f.determinant();
        let stress = (f - rotation) * f.transpose() * (2.0 * self.mu)
            + diagonal_from_value(self.lambda * (determinant - 1.0) * determinant);
        StressEvaluation {
            deformation: f,
            rotation,
            determinant,
            stress,
        }
    }

    /// Gradient with respect to the deformation, given a gradient on the stress.
    pub fn kirchhoff_stress_adjoint(&self, evaluation: &StressEvaluation, stress_grad: &Matrix) -> Matrix {
        let f = evaluation.deformation;
        let j = evaluation.determinant;
        let strain = f - evaluation.rotation;

        // 2 mu (F - R) F^T
        let strain_grad = *stress_grad * f * (2.0 * self.mu);
        let mut deformation_grad = stress_grad.transpose() * strain * (2.0 * self.mu) + strain_grad;
        deformation_grad += polar_rotation_adjoint(&f, &(-strain_grad));

        // lambda (J^2 - J) I
        let determinant_grad = self.lambda * (2.0 * j - 1.0) * matrix_trace(stress_grad);
        deformation_grad += determinant_adjoint(&f) * determinant_grad;

        deformation_grad
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{DIM, identity_matrix};
    use bevy::math::DVec2;

    fn sample() -> (CorotatedElasticity, Matrix) {
        let material = CorotatedElasticity::new(100.0, 60.0);
        let f = Matrix::from_cols(DVec2::new(1.1, 0.15), DVec2::new(-0.2, 0.93));
        (material, f)
    }

    #[test]
    fn rest_state_is_stress_free() {
        let material = CorotatedElasticity::new(100.0, 100.0);
        let evaluation = material.kirchhoff_stress(&identity_matrix());
        assert!(evaluation.stress.abs_diff_eq(Matrix::ZERO, 1e-12));
        assert_eq!(evaluation.determinant, 1.0);
    }

    #[test]
    fn pure_rotation_is_stress_free() {
        let material = CorotatedElasticity::new(100.0, 100.0);
        let (s, c) = 0.4_f64.sin_cos();
        let rotation = Matrix::from_cols(DVec2::new(c, s), DVec2::new(-s, c));
        let evaluation = material.kirchhoff_stress(&rotation);
        assert!(evaluation.stress.abs_diff_eq(Matrix::ZERO, 1e-10));
    }

    #[test]
    fn stress_adjoint_matches_finite_difference() {
        let (material, f) = sample();
        let seed = Matrix::from_cols(DVec2::new(0.3, -1.2), DVec2::new(0.7, 0.45));
        let objective = |m: &Matrix| {
            let stress = material.kirchhoff_stress(m).stress;
            stress.x_axis.dot(seed.x_axis) + stress.y_axis.dot(seed.y_axis)
        };

        let grad = material.kirchhoff_stress_adjoint(&material.kirchhoff_stress(&f), &seed);
        let eps = 1e-6;
        for col in 0..DIM {
            for row in 0..DIM {
                let mut plus = f;
                let mut minus = f;
                plus.col_mut(col)[row] += eps;
                minus.col_mut(col)[row] -= eps;
                let fd = (objective(&plus) - objective(&minus)) / (2.0 * eps);
                let analytic = grad.col(col)[row];
                assert!(
                    (fd - analytic).abs() < 1e-5 * (1.0 + analytic.abs()),
                    "entry ({row}, {col}): fd {fd} vs adjoint {analytic}"
                );
            }
        }
    }
}
