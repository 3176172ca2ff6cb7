use bevy::prelude::Resource;

use crate::config::SimulationConfig;
use crate::error::Result;
use crate::materials::{CorotatedElasticity, check};
use crate::math::{Matrix, Real, Vector};
use crate::objective::centroid;

use super::grid::{BoundaryBand, GridField};
use super::ledger::ParticleLedger;

/// Aggregate simulation context: configuration, trajectory ledgers, grids and the control.
///
/// Every kernel and the optimizer receive this by reference; nothing lives in globals.
#[derive(Resource, Clone, Debug)]
pub struct DiffMpmState {
    pub(crate) config: SimulationConfig,
    pub(crate) material: CorotatedElasticity,
    pub(crate) initial_positions: Vec<Vector>,
    pub(crate) particles: ParticleLedger,
    pub(crate) particles_grad: ParticleLedger,
    pub(crate) grid: GridField,
    pub(crate) grid_grad: GridField,
    pub(crate) initial_velocity: Vector,
    pub(crate) initial_velocity_grad: Vector,
}

/// Positions of one frame, as handed to a viewer.
#[derive(Clone, Copy, Debug)]
pub struct FrameSnapshot<'a> {
    pub frame: usize,
    pub positions: &'a [Vector],
    pub centroid: Vector,
}

impl DiffMpmState {
    /// Allocates the ledger for the configured lattice.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let positions = config.layout.positions(config.dx());
        Self::with_positions(config, positions)
    }

    /// Allocates the ledger for an arbitrary initial particle placement.
    pub fn with_positions(config: SimulationConfig, positions: Vec<Vector>) -> Result<Self> {
        config.validate_parameters()?;
        config.check_positions(&positions)?;

        let particle_count = positions.len();
        let mut particles = ParticleLedger::zeroed(config.max_steps, particle_count);
        particles.set_initial_frame(&positions, Vector::ZERO);

        Ok(Self {
            material: CorotatedElasticity::new(config.mu, config.lambda),
            particles,
            particles_grad: ParticleLedger::zeroed(config.max_steps, particle_count),
            grid: GridField::zeroed(config.grid_resolution),
            grid_grad: GridField::zeroed(config.grid_resolution),
            initial_positions: positions,
            initial_velocity: Vector::ZERO,
            initial_velocity_grad: Vector::ZERO,
            config,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn material(&self) -> &CorotatedElasticity {
        &self.material
    }

    pub fn particle_count(&self) -> usize {
        self.initial_positions.len()
    }

    /// Frames produced by one sweep.
    pub fn steps(&self) -> usize {
        self.config.steps
    }

    pub fn last_frame(&self) -> usize {
        self.config.steps - 1
    }

    pub fn initial_velocity(&self) -> Vector {
        self.initial_velocity
    }

    pub fn set_initial_velocity(&mut self, velocity: Vector) {
        self.initial_velocity = velocity;
    }

    /// Loss gradient on the initial velocity from the last backward sweep.
    pub fn initial_velocity_grad(&self) -> Vector {
        self.initial_velocity_grad
    }

    pub fn particles(&self) -> &ParticleLedger {
        &self.particles
    }

    pub fn particles_grad(&self) -> &ParticleLedger {
        &self.particles_grad
    }

    pub fn grid(&self) -> &GridField {
        &self.grid
    }

    pub fn grid_grad(&self) -> &GridField {
        &self.grid_grad
    }

    pub fn positions(&self, frame: usize) -> &[Vector] {
        self.particles.positions(frame)
    }

    pub fn velocities(&self, frame: usize) -> &[Vector] {
        self.particles.velocities(frame)
    }

    pub fn affine(&self, frame: usize) -> &[Matrix] {
        self.particles.affine(frame)
    }

    pub fn deformation(&self, frame: usize) -> &[Matrix] {
        self.particles.deformation(frame)
    }

    pub(crate) fn boundary(&self) -> BoundaryBand {
        BoundaryBand {
            width: self.config.boundary_width,
            resolution: self.config.grid_resolution,
        }
    }

    /// Zero the grid and its adjoint before a scatter.
    pub fn clear_grid(&mut self) {
        self.grid.clear();
        self.grid_grad.clear();
    }

    /// Zero every gradient accumulator ahead of a new backward sweep.
    pub fn reset_adjoints(&mut self) {
        self.particles_grad.clear();
        self.grid_grad.clear();
        self.initial_velocity_grad = Vector::ZERO;
    }

    /// Writes frame 0 from the initial layout and the current control.
    pub fn apply_initial_velocity(&mut self) {
        self.particles
            .set_initial_frame(&self.initial_positions, self.initial_velocity);
    }

    /// Reduces the frame-0 velocity gradients onto the shared control.
    pub(crate) fn collect_initial_velocity_grad(&mut self) {
        self.initial_velocity_grad += self.particles_grad.velocities(0).iter().sum::<Vector>();
    }

    pub fn min_deformation_determinant(&self, frame: usize) -> Real {
        self.deformation(frame)
            .iter()
            .map(|f| f.determinant())
            .fold(Real::INFINITY, Real::min)
    }

    /// Whether every deformation in `frame` is finite and orientation preserving.
    pub fn deformation_healthy(&self, frame: usize) -> bool {
        self.deformation(frame)
            .iter()
            .all(|f| check::deformation_gradient_ok(f.determinant()))
    }

    /// Bytes held by both particle ledgers and both grids.
    pub fn ledger_bytes(&self) -> usize {
        self.particles.memory_bytes()
            + self.particles_grad.memory_bytes()
            + self.grid.memory_bytes()
            + self.grid_grad.memory_bytes()
    }

    /// Every `stride`-th frame of the sweep, starting at `stride - 1`.
    pub fn frame_snapshots(&self, stride: usize) -> impl Iterator<Item = FrameSnapshot<'_>> {
        let stride = stride.max(1);
        (stride - 1..self.steps()).step_by(stride).map(move |frame| {
            let positions = self.positions(frame);
            FrameSnapshot {
                frame,
                positions,
                centroid: centroid(positions),
            }
        })
    }
}
