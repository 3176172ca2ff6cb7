//! Substep and sweep orchestration.
//!
//! Only particle state is kept per frame. The backward substep rebuilds the grid by rerunning
//! the forward stages of the same step before walking the adjoints in reverse.

use bevy::log::debug;

use crate::core::DiffMpmState;
use crate::error::Result;

use super::{GridToParticle, GridUpdate, ParticleToGrid, SubstepKernel};

/// Stage order within one substep.
pub const SUBSTEP_KERNELS: [&dyn SubstepKernel; 3] = [&ParticleToGrid, &GridUpdate, &GridToParticle];

/// Advances frame `step` to `step + 1`.
///
/// Fails with `ParticleOutOfDomain` when a particle of frame `step` has left the grid or gone
/// non-finite; the ledger past `step` is then stale.
pub fn forward_substep(state: &mut DiffMpmState, step: usize) -> Result<()> {
    state.config().check_positions(state.positions(step))?;
    state.clear_grid();
    for kernel in SUBSTEP_KERNELS {
        kernel.forward(state, step);
    }
    Ok(())
}

/// Pulls the gradients of frame `step + 1` back onto frame `step`.
///
/// Replays frames a successful forward sweep already checked.
pub fn backward_substep(state: &mut DiffMpmState, step: usize) {
    state.clear_grid();
    let recompute = SUBSTEP_KERNELS.len() - 1;
    for kernel in &SUBSTEP_KERNELS[..recompute] {
        kernel.forward(state, step);
    }
    for kernel in SUBSTEP_KERNELS.iter().rev() {
        kernel.backward(state, step);
    }
}

/// Writes frame 0 from the control, then every frame up to `steps - 1`.
pub fn forward_sweep(state: &mut DiffMpmState) -> Result<()> {
    state.apply_initial_velocity();
    let substeps = state.steps() - 1;
    for step in 0..substeps {
        forward_substep(state, step)?;
    }
    debug!(
        "forward sweep: {} substeps, min det F {:.6}",
        substeps,
        state.min_deformation_determinant(state.last_frame())
    );
    Ok(())
}

/// Walks the substeps in reverse and reduces the frame-0 velocity gradients onto the control.
///
/// The final-frame position gradient must already be seeded.
pub fn backward_sweep(state: &mut DiffMpmState) {
    for step in (0..state.steps() - 1).rev() {
        backward_substep(state, step);
    }
    state.collect_initial_velocity_grad();
    debug!(
        "backward sweep: initial velocity gradient {:?}",
        state.initial_velocity_grad()
    );
}
