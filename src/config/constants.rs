//! Reference scenario: an elastic block launched toward a target point.

use bevy::math::DVec2;

use crate::math::{Real, Vector};

// Grid
pub const GRID_RESOLUTION: usize = 120;
pub const DOMAIN_SIZE: Real = 1.0;
pub const BOUNDARY_WIDTH: usize = 3;
/// Narrowest band that still stops a block resting on a wall.
pub const MIN_BOUNDARY_WIDTH: usize = 2;
/// Guards the momentum-to-velocity division on empty cells.
pub const MASS_EPSILON: Real = 1e-10;

// Time integration
pub const TIME_STEP: Real = 3e-4;
pub const MAX_STEPS: usize = 1024;
pub const GRAVITY: Real = 9.8;

// Material
pub const PARTICLE_MASS: Real = 1.0;
pub const PARTICLE_VOLUME: Real = 1.0;
pub const YOUNGS_MODULUS: Real = 100.0;

// Initial layout, in grid cells
pub const LATTICE_SIDE: usize = 80;
pub const LATTICE_SPACING: Real = 0.5;
pub const LATTICE_ORIGIN: Vector = DVec2::new(10.0, 25.0);

// Objective
pub const TARGET: Vector = DVec2::new(0.3, 0.6);

// Optimizer
pub const LEARNING_RATE: Real = 10.0;
pub const ITERATIONS: usize = 30;

/// Frame stride used when handing positions to a viewer.
pub const SNAPSHOT_STRIDE: usize = 64;
