use bevy::math::BVec2;
use rayon::prelude::*;

use crate::config::constants::MASS_EPSILON;
use crate::core::DiffMpmState;
use crate::core::grid::cell_coord;
use crate::math::{Real, Vector};

use super::SubstepKernel;

/// Grid update stage (divides momentum by mass, applies gravity, clamps boundaries).
pub struct GridUpdate;

#[inline(always)]
fn solve_cell(
    momentum: Vector,
    mass: Real,
    gravity_kick: Real,
    clamp: impl FnOnce(&mut Vector) -> BVec2,
) -> (Vector, Real, BVec2) {
    let inv_mass = 1.0 / (mass + MASS_EPSILON);
    let mut velocity = momentum * inv_mass;
    velocity.y -= gravity_kick;
    let clamped = clamp(&mut velocity);
    (velocity, inv_mass, clamped)
}

impl SubstepKernel for GridUpdate {
    fn label(&self) -> &'static str {
        "grid_update"
    }

    fn forward(&self, state: &mut DiffMpmState, _step: usize) {
        let band = state.boundary();
        let gravity_kick = state.config().dt * state.config().gravity;
        let grid = &mut state.grid;
        let resolution = grid.resolution;

        grid.velocity_out
            .par_iter_mut()
            .zip(grid.velocity_in.par_iter())
            .zip(grid.mass_in.par_iter())
            .enumerate()
            .for_each(|(index, ((velocity_out, &momentum), &mass))| {
                let coord = cell_coord(index, resolution);
                let (velocity, _, _) =
                    solve_cell(momentum, mass, gravity_kick, |v| band.apply(coord, v));
                *velocity_out = velocity;
            });
    }

    fn backward(&self, state: &mut DiffMpmState, _step: usize) {
        let band = state.boundary();
        let gravity_kick = state.config().dt * state.config().gravity;
        let grid = &state.grid;
        let grad = &mut state.grid_grad;
        let resolution = grid.resolution;

        grad.velocity_in
            .par_iter_mut()
            .zip(grad.mass_in.par_iter_mut())
            .zip(grad.velocity_out.par_iter())
            .enumerate()
            .for_each(|(index, ((momentum_grad, mass_grad), &velocity_grad))| {
                let coord = cell_coord(index, resolution);
                let momentum = grid.velocity_in[index];
                let (_, inv_mass, clamped) = solve_cell(
                    momentum,
                    grid.mass_in[index],
                    gravity_kick,
                    |v| band.apply(coord, v),
                );

                // Clamped components are constants downstream.
                let mut velocity_grad = velocity_grad;
                if clamped.x {
                    velocity_grad.x = 0.0;
                }
                if clamped.y {
                    velocity_grad.y = 0.0;
                }

                *momentum_grad += velocity_grad * inv_mass;
                *mass_grad -= inv_mass * inv_mass * velocity_grad.dot(momentum);
            });
    }
}
