//! Polar decomposition `F = R S` of a 2x2 matrix, and the reverse-mode derivative of `R`.
//!
//! In 2-D the rotation has a closed form: with `x = F00 + F11` and `y = F10 - F01`,
//! `R = [[c, -s], [s, c]]` where `(c, s) = (x, y) / |(x, y)|`. The adjoint below is the exact
//! chain rule through that normalization, so no iterative solve or finite difference is involved.

use bevy::math::DVec2;

use crate::math::{Matrix, Real};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PolarDecomposition {
    pub rotation: Matrix,
    /// Symmetric stretch, `R^T F`.
    pub stretch: Matrix,
}

#[inline]
fn rotation_angle_terms(m: &Matrix) -> (Real, Real) {
    let x = m.x_axis.x + m.y_axis.y;
    let y = m.x_axis.y - m.y_axis.x;
    (x, y)
}

pub fn polar_decompose(m: &Matrix) -> PolarDecomposition {
    let (x, y) = rotation_angle_terms(m);
    let scale = 1.0 / (x * x + y * y).sqrt();
    let c = x * scale;
    let s = y * scale;
    let rotation = Matrix::from_cols(DVec2::new(c, s), DVec2::new(-s, c));
    PolarDecomposition {
        rotation,
        stretch: rotation.transpose() * *m,
    }
}

/// Pulls a gradient on the rotation factor of `m` back onto `m`.
pub fn polar_rotation_adjoint(m: &Matrix, rotation_grad: &Matrix) -> Matrix {
    let (x, y) = rotation_angle_terms(m);
    let r2 = x * x + y * y;
    let r3 = r2 * r2.sqrt();

    // R00 = R11 = c, R10 = -R01 = s
    let grad_c = rotation_grad.x_axis.x + rotation_grad.y_axis.y;
    let grad_s = rotation_grad.x_axis.y - rotation_grad.y_axis.x;

    let grad_x = y * (grad_c * y - grad_s * x) / r3;
    let grad_y = x * (grad_s * x - grad_c * y) / r3;

    Matrix::from_cols(DVec2::new(grad_x, grad_y), DVec2::new(-grad_y, grad_x))
}
