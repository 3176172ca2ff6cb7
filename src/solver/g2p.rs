//! Grid-to-Particle (G2P) transfer operations
//!
//! Gathers grid velocities and their APIC gradient back to particles and advects positions.
//! The deformation gradient for the next frame was already written by P2G.

use rayon::prelude::*;

use crate::core::grid::reduce_rows;
use crate::core::{DiffMpmState, KERNEL_SIZE, NEIGHBOR_COUNT, QuadraticStencil, inv_d};
use crate::math::{Matrix, Real, Vector, outer_product};

use super::SubstepKernel;

pub struct GridToParticle;

/// One particle's share of the adjoint gather, scattered to the grid afterwards.
struct CellGradients {
    stencil: QuadraticStencil,
    position_grad: Vector,
    velocity_out: [Vector; NEIGHBOR_COUNT],
}

impl SubstepKernel for GridToParticle {
    fn label(&self) -> &'static str {
        "g2p"
    }

    fn forward(&self, state: &mut DiffMpmState, step: usize) {
        let config = state.config();
        let (dx, inv_dx, dt) = (config.dx(), config.inv_dx(), config.dt);
        let inv_d = inv_d(dx);
        let grid = &state.grid;
        let pair = state.particles.frame_pair_mut(step);
        let position = &*pair.current.position;
        let next = pair.next;

        next.position
            .par_iter_mut()
            .zip(next.velocity.par_iter_mut())
            .zip(next.affine.par_iter_mut())
            .enumerate()
            .for_each(|(p, ((next_position, next_velocity), next_affine))| {
                let stencil = QuadraticStencil::at(position[p], inv_dx);
                let mut velocity = Vector::ZERO;
                let mut velocity_gradient = Matrix::ZERO;

                for (i, j) in QuadraticStencil::neighbors() {
                    let weight = stencil.weight(i, j);
                    let cell_velocity = grid.velocity_out[grid.index(stencil.cell(i, j))];
                    let weighted_velocity = cell_velocity * weight;
                    let dpos = stencil.offset(i, j) * dx;

                    velocity += weighted_velocity;
                    velocity_gradient += outer_product(weighted_velocity, dpos) * inv_d;
                }

                *next_velocity = velocity;
                *next_affine = velocity_gradient;
                *next_position = position[p] + velocity * dt;
            });
    }

    fn backward(&self, state: &mut DiffMpmState, step: usize) {
        let config = state.config();
        let (dx, inv_dx, dt) = (config.dx(), config.inv_dx(), config.dt);
        let inv_d = inv_d(dx);
        let position = state.particles.positions(step);
        let grid = &state.grid;

        let pair = state.particles_grad.frame_pair_mut(step);
        let (position_grad_next, velocity_grad_next, affine_grad_next) = (
            &*pair.next.position,
            &*pair.next.velocity,
            &*pair.next.affine,
        );

        let gathered: Vec<CellGradients> = (0..position.len())
            .into_par_iter()
            .map(|p| {
                let stencil = QuadraticStencil::at(position[p], inv_dx);
                let affine_grad = affine_grad_next[p];
                // x' = x + dt v'
                let velocity_grad = velocity_grad_next[p] + position_grad_next[p] * dt;

                let mut velocity_out = [Vector::ZERO; NEIGHBOR_COUNT];
                let mut weight_grads = [[0.0 as Real; KERNEL_SIZE]; KERNEL_SIZE];
                let mut grad_fx = Vector::ZERO;

                for (k, (i, j)) in QuadraticStencil::neighbors().enumerate() {
                    let weight = stencil.weight(i, j);
                    let cell_velocity = grid.velocity_out[grid.index(stencil.cell(i, j))];
                    let dpos = stencil.offset(i, j) * dx;
                    let affine_pull = affine_grad * dpos;

                    velocity_out[k] = velocity_grad * weight + affine_pull * (inv_d * weight);
                    weight_grads[i][j] =
                        velocity_grad.dot(cell_velocity) + inv_d * cell_velocity.dot(affine_pull);
                    // dpos = (cell - fx) * dx
                    grad_fx -= affine_grad.transpose() * cell_velocity * (inv_d * weight * dx);
                }
                grad_fx += stencil.weight_adjoint(&weight_grads);

                CellGradients {
                    stencil,
                    position_grad: position_grad_next[p] + grad_fx * inv_dx,
                    velocity_out,
                }
            })
            .collect();

        pair.current
            .position
            .par_iter_mut()
            .zip(gathered.par_iter())
            .for_each(|(position_grad, gradients)| *position_grad += gradients.position_grad);

        let grid_grad = &mut state.grid_grad;
        let resolution = grid_grad.resolution;
        reduce_rows(
            resolution,
            &gathered,
            |gradients| gradients.stencil.base,
            grid_grad.velocity_out.par_chunks_mut(resolution),
            |row, x, gradients, i, j| row[x] += gradients.velocity_out[i * KERNEL_SIZE + j],
        );
    }
}
