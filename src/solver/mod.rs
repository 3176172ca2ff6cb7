// src/solver/mod.rs
//! Substep kernels and the sweeps that chain them.
//!
//! Each kernel owns its forward transfer and the hand-written adjoint of that transfer.
//! Within a substep kernels run strictly in order; substeps themselves are sequential.

pub mod g2p;
pub mod grid_update;
pub mod p2g;
pub mod step;

pub use g2p::GridToParticle;
pub use grid_update::GridUpdate;
pub use p2g::ParticleToGrid;
pub use step::{SUBSTEP_KERNELS, backward_substep, backward_sweep, forward_substep, forward_sweep};

use crate::core::DiffMpmState;

/// One stage of a substep, paired with its adjoint.
///
/// `step` is the frame read by the stage; stages that write particle state write frame `step + 1`.
pub trait SubstepKernel: Sync {
    fn label(&self) -> &'static str;

    fn forward(&self, state: &mut DiffMpmState, step: usize);

    /// Accumulates gradients into the adjoint ledger and grid. Expects the grid to hold the
    /// forward values of the stages before this one.
    fn backward(&self, state: &mut DiffMpmState, step: usize);
}
