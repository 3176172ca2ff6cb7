pub mod grid;
pub mod kernel;
pub mod ledger;
pub mod mpm_state;
pub mod particle;

pub use grid::{BoundaryBand, GridField};
pub use kernel::{KERNEL_SIZE, NEIGHBOR_COUNT, QuadraticStencil, inv_d};
pub use ledger::{FramePair, FrameSlices, ParticleLedger};
pub use mpm_state::{DiffMpmState, FrameSnapshot};
pub use particle::LatticeLayout;
