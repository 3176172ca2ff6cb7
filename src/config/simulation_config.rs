use bevy::prelude::Resource;

use super::constants;
use crate::core::kernel::QuadraticStencil;
use crate::core::particle::LatticeLayout;
use crate::error::{Result, SimulationError};
use crate::materials::{check, physics};
use crate::math::{Real, Vector};

/// Everything fixed before the ledger is allocated: lattice, material, time stepping and target.
#[derive(Resource, Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    /// Cells per side of the square background grid.
    pub grid_resolution: usize,
    /// World-space side length covered by the grid.
    pub domain_size: Real,
    pub dt: Real,
    /// Frames the ledger is allocated for.
    pub max_steps: usize,
    /// Frames used by one sweep (the final frame is `steps - 1`).
    pub steps: usize,
    pub particle_mass: Real,
    pub particle_volume: Real,
    /// Lamé shear modulus.
    pub mu: Real,
    /// Lamé first parameter.
    pub lambda: Real,
    /// Magnitude of gravity along -y.
    pub gravity: Real,
    /// Width, in cells, of the band where wall-facing velocity is removed.
    pub boundary_width: usize,
    pub layout: LatticeLayout,
    pub target: Vector,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid_resolution: constants::GRID_RESOLUTION,
            domain_size: constants::DOMAIN_SIZE,
            dt: constants::TIME_STEP,
            max_steps: constants::MAX_STEPS,
            steps: constants::MAX_STEPS,
            particle_mass: constants::PARTICLE_MASS,
            particle_volume: constants::PARTICLE_VOLUME,
            mu: constants::YOUNGS_MODULUS,
            lambda: constants::YOUNGS_MODULUS,
            gravity: constants::GRAVITY,
            boundary_width: constants::BOUNDARY_WIDTH,
            layout: LatticeLayout::default(),
            target: constants::TARGET,
        }
    }
}

impl SimulationConfig {
    #[inline]
    pub fn dx(&self) -> Real {
        self.domain_size / self.grid_resolution as Real
    }

    #[inline]
    pub fn inv_dx(&self) -> Real {
        self.grid_resolution as Real / self.domain_size
    }

    /// Sweep length and ledger horizon both set to `steps` frames.
    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self.max_steps = steps;
        self
    }

    pub fn with_time_step(mut self, dt: Real) -> Self {
        self.dt = dt;
        self
    }

    pub fn with_lattice(mut self, layout: LatticeLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_target(mut self, target: Vector) -> Self {
        self.target = target;
        self
    }

    pub fn with_lame(mut self, mu: Real, lambda: Real) -> Self {
        self.mu = mu;
        self.lambda = lambda;
        self
    }

    /// Derive the Lamé pair from Young's modulus and Poisson ratio.
    pub fn with_youngs_modulus(self, young_modulus: Real, poisson_ratio: Real) -> Self {
        let (lambda, mu) = physics::lame_lambda_mu(young_modulus, poisson_ratio);
        self.with_lame(mu, lambda)
    }

    /// Full check, including that the configured lattice fits the grid.
    pub fn validate(&self) -> Result<()> {
        self.validate_parameters()?;
        self.layout.validate()?;
        self.check_positions(&self.layout.positions(self.dx()))
    }

    /// Everything except particle placement.
    pub fn validate_parameters(&self) -> Result<()> {
        // Narrower bands leave floor-adjacent stencil cells moving into the wall.
        if self.boundary_width < constants::MIN_BOUNDARY_WIDTH {
            return Err(invalid(format!(
                "boundary band of {} cells is narrower than the {}-cell minimum",
                self.boundary_width,
                constants::MIN_BOUNDARY_WIDTH
            )));
        }
        let stencil_cells = 2 * self.boundary_width + 3;
        if self.grid_resolution < stencil_cells {
            return Err(invalid(format!(
                "grid resolution {} cannot hold a boundary band of {} cells plus a 3x3 stencil",
                self.grid_resolution, self.boundary_width
            )));
        }
        if self.grid_resolution > i32::MAX as usize {
            return Err(invalid(format!(
                "grid resolution {} exceeds the coordinate range",
                self.grid_resolution
            )));
        }
        positive("domain size", self.domain_size)?;
        positive("time step", self.dt)?;
        positive("particle mass", self.particle_mass)?;
        positive("particle volume", self.particle_volume)?;
        positive("shear modulus", self.mu)?;
        positive("lambda", self.lambda)?;
        if !(self.gravity.is_finite() && self.gravity >= 0.0) {
            return Err(invalid(format!("gravity must be finite and >= 0, got {}", self.gravity)));
        }
        if self.steps < 2 {
            return Err(invalid(format!("a sweep needs at least 2 frames, got {}", self.steps)));
        }
        if self.steps > self.max_steps {
            return Err(invalid(format!(
                "sweep length {} exceeds ledger horizon {}",
                self.steps, self.max_steps
            )));
        }
        if !self.target.is_finite() {
            return Err(invalid(format!("target {:?} is not finite", self.target)));
        }
        Ok(())
    }

    /// Every particle's 3x3 stencil must land inside the grid.
    pub fn check_positions(&self, positions: &[Vector]) -> Result<()> {
        if positions.is_empty() {
            return Err(invalid("at least one particle is required".to_string()));
        }
        let inv_dx = self.inv_dx();
        for (particle, &position) in positions.iter().enumerate() {
            let inside = position.is_finite() && {
                let stencil = QuadraticStencil::at(position, inv_dx);
                stencil.fits(self.grid_resolution)
            };
            if !inside {
                return Err(SimulationError::ParticleOutOfDomain { particle, position });
            }
        }
        Ok(())
    }
}

/// Step count and learning rate for gradient descent on the initial velocity.
#[derive(Clone, Debug, PartialEq)]
pub struct OptimizerSettings {
    pub iterations: usize,
    pub learning_rate: Real,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            iterations: constants::ITERATIONS,
            learning_rate: constants::LEARNING_RATE,
        }
    }
}

impl OptimizerSettings {
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: Real) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn validate(&self) -> Result<()> {
        positive("learning rate", self.learning_rate)
    }
}

fn positive(name: &str, value: Real) -> Result<()> {
    if check::positive_finite(value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be positive and finite, got {value}")))
    }
}

fn invalid(message: String) -> SimulationError {
    SimulationError::InvalidConfig(message)
}
