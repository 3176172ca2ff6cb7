use bevy::math::{DVec2, IVec2};

use crate::math::{Coord, Real, Vector};

/// Side of the 3x3 quadratic B-spline stencil.
pub const KERNEL_SIZE: usize = 3;
/// Number of neighbors in 3x3 kernel
pub const NEIGHBOR_COUNT: usize = KERNEL_SIZE * KERNEL_SIZE;

/// Inverse dimension factor `4 / dx^2` of the quadratic MLS-MPM kernel.
#[inline]
pub fn inv_d(cell_width: Real) -> Real {
    4.0 / (cell_width * cell_width)
}

// Quadratic B-spline weights at fractional offset `fx` in [0.5, 1.5).
#[inline(always)]
fn bspline_weights(fx: Real) -> [Real; KERNEL_SIZE] {
    [
        0.5 * (1.5 - fx) * (1.5 - fx),
        0.75 - (fx - 1.0) * (fx - 1.0),
        0.5 * (fx - 0.5) * (fx - 0.5),
    ]
}

#[inline(always)]
fn bspline_weight_slopes(fx: Real) -> [Real; KERNEL_SIZE] {
    [fx - 1.5, -2.0 * (fx - 1.0), fx - 0.5]
}

/// Interpolation stencil of one particle: the 3x3 cell block starting at `base` and its weights.
///
/// P2G, G2P and both adjoints build this from the same position, so all four kernels visit
/// the identical particle/cell pairs.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct QuadraticStencil {
    /// Lower-left cell of the 3x3 block.
    pub base: Coord,
    /// Particle position relative to `base`, in cells.
    pub fx: Vector,
    /// B-spline weights `[x, y]` per stencil row/column.
    pub weights: [Vector; KERNEL_SIZE],
}

impl QuadraticStencil {
    #[inline(always)]
    pub fn at(position: Vector, inv_dx: Real) -> Self {
        let scaled = position * inv_dx;
        let base = (scaled - 0.5).floor().as_ivec2();
        let fx = scaled - base.as_dvec2();

        let wx = bspline_weights(fx.x);
        let wy = bspline_weights(fx.y);
        Self {
            base,
            fx,
            weights: [
                DVec2::new(wx[0], wy[0]),
                DVec2::new(wx[1], wy[1]),
                DVec2::new(wx[2], wy[2]),
            ],
        }
    }

    #[inline(always)]
    pub fn weight(&self, i: usize, j: usize) -> Real {
        self.weights[i].x * self.weights[j].y
    }

    /// Cell `(i, j)` minus the particle position, in cells.
    #[inline(always)]
    pub fn offset(&self, i: usize, j: usize) -> Vector {
        DVec2::new(i as Real, j as Real) - self.fx
    }

    #[inline(always)]
    pub fn cell(&self, i: usize, j: usize) -> Coord {
        self.base + IVec2::new(i as i32, j as i32)
    }

    /// Iterator over `(i, j)` in the same order every kernel uses.
    #[inline(always)]
    pub fn neighbors() -> impl Iterator<Item = (usize, usize)> {
        (0..KERNEL_SIZE).flat_map(|i| (0..KERNEL_SIZE).map(move |j| (i, j)))
    }

    /// Whether the whole 3x3 block lies inside a `resolution`-sided grid.
    pub fn fits(&self, resolution: usize) -> bool {
        let last = resolution as i32 - KERNEL_SIZE as i32;
        self.base.x >= 0 && self.base.y >= 0 && self.base.x <= last && self.base.y <= last
    }

    /// Gradient on `fx` given gradients on each stencil weight `w(i, j)`.
    ///
    /// `base` is piecewise constant in the position, so this is the whole dependence of the
    /// weights on the particle position (scaled by `inv_dx`).
    pub fn weight_adjoint(&self, weight_grads: &[[Real; KERNEL_SIZE]; KERNEL_SIZE]) -> Vector {
        let mut grad_wx = [0.0; KERNEL_SIZE];
        let mut grad_wy = [0.0; KERNEL_SIZE];
        for (i, j) in Self::neighbors() {
            grad_wx[i] += weight_grads[i][j] * self.weights[j].y;
            grad_wy[j] += weight_grads[i][j] * self.weights[i].x;
        }

        let slope_x = bspline_weight_slopes(self.fx.x);
        let slope_y = bspline_weight_slopes(self.fx.y);
        let mut grad = Vector::ZERO;
        for k in 0..KERNEL_SIZE {
            grad.x += grad_wx[k] * slope_x[k];
            grad.y += grad_wy[k] * slope_y[k];
        }
        grad
    }
}
