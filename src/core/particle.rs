//! Initial particle placement.

use crate::config::constants;
use crate::error::{Result, SimulationError};
use crate::math::{Real, Vector};

/// A square block of particles on a regular lattice, measured in grid cells.
///
/// Particle `i * side + j` sits at `dx * (origin + spacing * (i, j))`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatticeLayout {
    pub side: usize,
    pub spacing: Real,
    pub origin: Vector,
}

impl Default for LatticeLayout {
    fn default() -> Self {
        Self {
            side: constants::LATTICE_SIDE,
            spacing: constants::LATTICE_SPACING,
            origin: constants::LATTICE_ORIGIN,
        }
    }
}

impl LatticeLayout {
    pub fn new(side: usize, spacing: Real, origin: Vector) -> Self {
        Self {
            side,
            spacing,
            origin,
        }
    }

    pub fn particle_count(&self) -> usize {
        self.side * self.side
    }

    pub fn validate(&self) -> Result<()> {
        if self.side == 0 {
            return Err(SimulationError::InvalidConfig(
                "lattice must contain at least one particle".to_string(),
            ));
        }
        if !(self.spacing.is_finite() && self.spacing > 0.0) || !self.origin.is_finite() {
            return Err(SimulationError::InvalidConfig(format!(
                "lattice spacing {} / origin {:?} must be finite, spacing positive",
                self.spacing, self.origin
            )));
        }
        Ok(())
    }

    /// World-space positions for a grid of cell width `dx`.
    pub fn positions(&self, dx: Real) -> Vec<Vector> {
        let mut positions = Vec::with_capacity(self.particle_count());
        for i in 0..self.side {
            for j in 0..self.side {
                let cell = self.origin + Vector::new(i as Real, j as Real) * self.spacing;
                positions.push(cell * dx);
            }
        }
        positions
    }
}
