use bevy::math::{DMat2, DVec2, IVec2};

pub type Real = f64;
pub const DIM: usize = 2;

pub type Vector = DVec2;
pub type Matrix = DMat2;
pub type Coord = IVec2;

#[inline(always)]
pub fn identity_matrix() -> Matrix {
    DMat2::IDENTITY
}

#[inline(always)]
pub fn matrix_trace(m: &Matrix) -> Real {
    m.x_axis.x + m.y_axis.y
}

#[inline(always)]
pub fn diagonal_from_value(value: Real) -> Matrix {
    Matrix::from_diagonal(DVec2::splat(value))
}

/// `a ⊗ b`, i.e. the matrix with entries `a_i * b_j`.
#[inline(always)]
pub fn outer_product(a: Vector, b: Vector) -> Matrix {
    Matrix::from_cols(a * b.x, a * b.y)
}

/// Gradient of `det(m)` with respect to every entry of `m` (the cofactor matrix).
#[inline(always)]
pub fn determinant_adjoint(m: &Matrix) -> Matrix {
    Matrix::from_cols(
        DVec2::new(m.y_axis.y, -m.y_axis.x),
        DVec2::new(-m.x_axis.y, m.x_axis.x),
    )
}
