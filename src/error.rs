//! Error types for the differentiable solver.

use thiserror::Error;

use crate::math::{Real, Vector};

#[derive(Debug, Clone, Error)]
pub enum SimulationError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Particle {particle} at {position:?} has a transfer stencil outside the grid")]
    ParticleOutOfDomain { particle: usize, position: Vector },

    #[error("Loss is not finite: {loss}")]
    NonFiniteLoss { loss: Real },

    #[error("Gradient is not finite: {gradient:?}")]
    NonFiniteGradient { gradient: Vector },
}

pub type Result<T> = std::result::Result<T, SimulationError>;
