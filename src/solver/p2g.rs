//! Particle-to-Grid (P2G) transfer operations
//!
//! Scatters mass, APIC momentum and elastic stress from particles to grid nodes, and
//! advances the deformation gradient. The adjoint gathers cell gradients back onto the
//! particle state of the same frame.

use rayon::prelude::*;

use crate::core::grid::reduce_rows;
use crate::core::{DiffMpmState, KERNEL_SIZE, NEIGHBOR_COUNT, QuadraticStencil, inv_d};
use crate::materials::{CorotatedElasticity, StressEvaluation};
use crate::math::{Matrix, Real, Vector, identity_matrix, outer_product};

use super::SubstepKernel;

pub struct ParticleToGrid;

#[derive(Clone, Copy)]
struct TransferScales {
    dx: Real,
    inv_dx: Real,
    dt: Real,
    particle_mass: Real,
    /// `-dt * volume * 4 / dx^2`, turning Kirchhoff stress into a momentum kick.
    stress_scale: Real,
}

impl TransferScales {
    fn from_state(state: &DiffMpmState) -> Self {
        let config = state.config();
        let dx = config.dx();
        Self {
            dx,
            inv_dx: config.inv_dx(),
            dt: config.dt,
            particle_mass: config.particle_mass,
            stress_scale: -config.dt * config.particle_volume * inv_d(dx),
        }
    }
}

/// Everything P2G derives from one particle before touching the grid.
struct ParticleStress {
    stencil: QuadraticStencil,
    evaluation: StressEvaluation,
    /// Stress kick plus mass-weighted affine velocity.
    affine: Matrix,
}

#[inline]
fn particle_stress(
    material: &CorotatedElasticity,
    scales: TransferScales,
    position: Vector,
    affine_velocity: Matrix,
    deformation: Matrix,
) -> ParticleStress {
    let stencil = QuadraticStencil::at(position, scales.inv_dx);
    let new_deformation = (identity_matrix() + affine_velocity * scales.dt) * deformation;
    let evaluation = material.kirchhoff_stress(&new_deformation);
    let affine = evaluation.stress * scales.stress_scale + affine_velocity * scales.particle_mass;
    ParticleStress {
        stencil,
        evaluation,
        affine,
    }
}

struct CellScatter {
    stencil: QuadraticStencil,
    deformation: Matrix,
    momentum: [Vector; NEIGHBOR_COUNT],
    mass: [Real; NEIGHBOR_COUNT],
}

impl SubstepKernel for ParticleToGrid {
    fn label(&self) -> &'static str {
        "p2g"
    }

    fn forward(&self, state: &mut DiffMpmState, step: usize) {
        let scales = TransferScales::from_state(state);
        let material = state.material;
        let pair = state.particles.frame_pair_mut(step);
        let (position, velocity) = (&*pair.current.position, &*pair.current.velocity);
        let (affine, deformation) = (&*pair.current.affine, &*pair.current.deformation);

        let scatters: Vec<CellScatter> = (0..position.len())
            .into_par_iter()
            .map(|p| {
                let particle =
                    particle_stress(&material, scales, position[p], affine[p], deformation[p]);
                let stencil = particle.stencil;
                let mut momentum = [Vector::ZERO; NEIGHBOR_COUNT];
                let mut mass = [0.0; NEIGHBOR_COUNT];
                for (k, (i, j)) in QuadraticStencil::neighbors().enumerate() {
                    let weight = stencil.weight(i, j);
                    let dpos = stencil.offset(i, j) * scales.dx;
                    momentum[k] = (velocity[p] * scales.particle_mass + particle.affine * dpos) * weight;
                    mass[k] = weight * scales.particle_mass;
                }
                CellScatter {
                    stencil,
                    deformation: particle.evaluation.deformation,
                    momentum,
                    mass,
                }
            })
            .collect();

        pair.next
            .deformation
            .par_iter_mut()
            .zip(scatters.par_iter())
            .for_each(|(next_deformation, scatter)| *next_deformation = scatter.deformation);

        let grid = &mut state.grid;
        let resolution = grid.resolution;
        let rows = grid
            .velocity_in
            .par_chunks_mut(resolution)
            .zip(grid.mass_in.par_chunks_mut(resolution));
        reduce_rows(
            resolution,
            &scatters,
            |scatter| scatter.stencil.base,
            rows,
            |(momentum, mass), x, scatter, i, j| {
                let k = i * KERNEL_SIZE + j;
                momentum[x] += scatter.momentum[k];
                mass[x] += scatter.mass[k];
            },
        );
    }

    fn backward(&self, state: &mut DiffMpmState, step: usize) {
        let scales = TransferScales::from_state(state);
        let material = state.material;
        let position = state.particles.positions(step);
        let velocity = state.particles.velocities(step);
        let affine_velocity = state.particles.affine(step);
        let deformation = state.particles.deformation(step);
        let grid = &state.grid;
        let grid_grad = &state.grid_grad;

        let pair = state.particles_grad.frame_pair_mut(step);
        let next_deformation_grad = &*pair.next.deformation;
        let current = pair.current;

        current
            .position
            .par_iter_mut()
            .zip(current.velocity.par_iter_mut())
            .zip(current.affine.par_iter_mut())
            .zip(current.deformation.par_iter_mut())
            .enumerate()
            .for_each(|(p, (((position_grad, velocity_grad), affine_grad), deformation_grad))| {
                let particle = particle_stress(
                    &material,
                    scales,
                    position[p],
                    affine_velocity[p],
                    deformation[p],
                );
                let stencil = particle.stencil;
                let momentum = velocity[p] * scales.particle_mass;

                let mut grad_v = Vector::ZERO;
                let mut grad_affine = Matrix::ZERO;
                let mut grad_fx = Vector::ZERO;
                let mut weight_grads = [[0.0; KERNEL_SIZE]; KERNEL_SIZE];

                for (i, j) in QuadraticStencil::neighbors() {
                    let weight = stencil.weight(i, j);
                    let dpos = stencil.offset(i, j) * scales.dx;
                    let index = grid.index(stencil.cell(i, j));
                    let cell_grad = grid_grad.velocity_in[index];
                    let mass_grad = grid_grad.mass_in[index];

                    grad_v += cell_grad * (weight * scales.particle_mass);
                    grad_affine += outer_product(cell_grad, dpos) * weight;
                    // dpos = (cell - fx) * dx
                    grad_fx -= particle.affine.transpose() * cell_grad * (scales.dx * weight);
                    weight_grads[i][j] = cell_grad.dot(momentum + particle.affine * dpos)
                        + mass_grad * scales.particle_mass;
                }
                grad_fx += stencil.weight_adjoint(&weight_grads);

                let stress_grad = grad_affine * scales.stress_scale;
                let new_deformation_grad = next_deformation_grad[p]
                    + material.kirchhoff_stress_adjoint(&particle.evaluation, &stress_grad);
                let step_matrix = identity_matrix() + affine_velocity[p] * scales.dt;

                *position_grad += grad_fx * scales.inv_dx;
                *velocity_grad += grad_v;
                *affine_grad += grad_affine * scales.particle_mass
                    + new_deformation_grad * deformation[p].transpose() * scales.dt;
                *deformation_grad += step_matrix.transpose() * new_deformation_grad;
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::core::LatticeLayout;

    fn single_particle_state() -> DiffMpmState {
        let config = SimulationConfig::default()
            .with_steps(2)
            .with_lattice(LatticeLayout::new(1, 1.0, Vector::new(40.3, 60.7)));
        DiffMpmState::new(config).unwrap()
    }

    #[test]
    fn scatter_conserves_mass_and_momentum_at_rest() {
        let mut state = single_particle_state();
        state.set_initial_velocity(Vector::new(0.4, -0.2));
        state.apply_initial_velocity();
        state.clear_grid();
        ParticleToGrid.forward(&mut state, 0);

        assert!((state.grid().total_mass() - 1.0).abs() < 1e-12);
        let momentum = state
            .grid()
            .velocity_in()
            .iter()
            .fold(Vector::ZERO, |acc, v| acc + *v);
        // Unit deformation and zero affine field: only the translational part survives.
        assert!((momentum - Vector::new(0.4, -0.2)).length() < 1e-12);
        assert_eq!(state.deformation(1)[0], identity_matrix());
    }

    #[test]
    fn stress_kick_carries_no_net_momentum() {
        let mut state = single_particle_state();
        let stretch = Matrix::from_cols(Vector::new(1.2, 0.05), Vector::new(0.1, 0.9));
        state.particles.frame_mut(0).deformation[0] = stretch;
        state.clear_grid();
        ParticleToGrid.forward(&mut state, 0);

        let momentum = state
            .grid()
            .velocity_in()
            .iter()
            .fold(Vector::ZERO, |acc, v| acc + *v);
        assert!(momentum.length() < 1e-9);
        assert_eq!(state.deformation(1)[0], stretch);
        let kicked = state.grid().velocity_in().iter().filter(|v| v.length() > 0.0).count();
        assert!(kicked > 0 && kicked <= NEIGHBOR_COUNT);
    }
}
