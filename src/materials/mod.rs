//! Materials for the differentiable solver
//!
//! * `polar` - rotation/stretch split of a 2x2 deformation and its adjoint
//! * `corotated` - the hyperelastic law driving P2G stress, with its adjoint
//! * `utils` - parameter conversions and checks

pub mod corotated;
pub mod polar;
pub mod utils;

pub use corotated::{CorotatedElasticity, StressEvaluation};
pub use polar::{PolarDecomposition, polar_decompose, polar_rotation_adjoint};

// Re-export physics utilities for easy access
pub use utils::check;
pub use utils::physics;
