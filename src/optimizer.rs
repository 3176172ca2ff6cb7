//! Gradient descent on the shared initial velocity.

use std::time::Instant;

use bevy::log::{error, info, warn};
use bevy::prelude::Resource;

use crate::config::OptimizerSettings;
use crate::core::DiffMpmState;
use crate::error::{Result, SimulationError};
use crate::math::{Real, Vector};
use crate::objective::TargetObjective;
use crate::solver::{backward_sweep, forward_sweep};

/// Loss and its gradient with respect to the initial velocity, for the current control.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientEvaluation {
    pub loss: Real,
    pub centroid: Vector,
    pub gradient: Vector,
}

/// Full forward sweep, loss, seeding and backward sweep.
///
/// A particle leaving the grid mid-sweep is reported as `ParticleOutOfDomain`.
///
/// Leaves the trajectory of the current control in the ledger.
pub fn evaluate_gradient(
    state: &mut DiffMpmState,
    objective: &TargetObjective,
) -> Result<GradientEvaluation> {
    state.reset_adjoints();
    forward_sweep(state)?;

    let last = state.last_frame();
    if !state.deformation_healthy(last) {
        warn!(
            "deformation degenerated by frame {last}: min det F {:.3e}",
            state.min_deformation_determinant(last)
        );
    }
    let evaluation = objective.evaluate(state.positions(last))?;
    objective.seed_adjoint(&evaluation, state.particles_grad.frame_mut(last).position);

    backward_sweep(state);

    let gradient = state.initial_velocity_grad();
    if !gradient.is_finite() {
        return Err(SimulationError::NonFiniteGradient { gradient });
    }
    Ok(GradientEvaluation {
        loss: evaluation.loss,
        centroid: evaluation.centroid,
        gradient,
    })
}

/// One optimizer iteration, reported for the control that was evaluated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IterationReport {
    pub iteration: usize,
    pub loss: Real,
    pub gradient: Vector,
    pub initial_velocity: Vector,
    pub centroid: Vector,
}

/// Owns the simulation and runs a fixed number of descent iterations on it.
///
/// A numerical failure is sticky: once an iteration fails, no further updates are applied.
#[derive(Resource, Debug)]
pub struct ControlOptimizer {
    state: DiffMpmState,
    objective: TargetObjective,
    settings: OptimizerSettings,
    history: Vec<IterationReport>,
    failure: Option<SimulationError>,
}

impl ControlOptimizer {
    pub fn new(state: DiffMpmState, settings: OptimizerSettings) -> Result<Self> {
        settings.validate()?;
        let objective = TargetObjective::new(state.config().target);
        let history = Vec::with_capacity(settings.iterations);
        Ok(Self {
            state,
            objective,
            settings,
            history,
            failure: None,
        })
    }

    pub fn state(&self) -> &DiffMpmState {
        &self.state
    }

    pub fn objective(&self) -> &TargetObjective {
        &self.objective
    }

    pub fn settings(&self) -> &OptimizerSettings {
        &self.settings
    }

    pub fn history(&self) -> &[IterationReport] {
        &self.history
    }

    pub fn failure(&self) -> Option<&SimulationError> {
        self.failure.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.failure.is_some() || self.history.len() >= self.settings.iterations
    }

    /// Evaluates the gradient at the current control, then applies `v -= lr * grad`.
    pub fn step(&mut self) -> Result<IterationReport> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }

        let iteration = self.history.len();
        let initial_velocity = self.state.initial_velocity();
        let start = Instant::now();

        let evaluation = match evaluate_gradient(&mut self.state, &self.objective) {
            Ok(evaluation) => evaluation,
            Err(err) => {
                error!("iteration {iteration} halted: {err}");
                self.failure = Some(err.clone());
                return Err(err);
            }
        };

        let report = IterationReport {
            iteration,
            loss: evaluation.loss,
            gradient: evaluation.gradient,
            initial_velocity,
            centroid: evaluation.centroid,
        };
        info!(
            "iter {}: loss {:.6e}, grad {:?}, init v {:?} ({:.1}ms)",
            iteration,
            report.loss,
            report.gradient,
            initial_velocity,
            start.elapsed().as_secs_f64() * 1000.0
        );

        self.state
            .set_initial_velocity(initial_velocity - evaluation.gradient * self.settings.learning_rate);
        self.history.push(report);
        Ok(report)
    }

    /// Runs the remaining iterations.
    pub fn run(&mut self) -> Result<&[IterationReport]> {
        while !self.is_finished() {
            self.step()?;
        }
        match &self.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(&self.history),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::core::LatticeLayout;

    fn short_run() -> DiffMpmState {
        let config = SimulationConfig::default()
            .with_steps(6)
            .with_lattice(LatticeLayout::new(3, 0.5, Vector::new(40.0, 40.0)));
        DiffMpmState::new(config).unwrap()
    }

    #[test]
    fn history_stops_at_iteration_count() {
        let settings = OptimizerSettings::default().with_iterations(3);
        let mut optimizer = ControlOptimizer::new(short_run(), settings).unwrap();
        let history = optimizer.run().unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].initial_velocity, Vector::ZERO);
        let expected = history[0].initial_velocity - history[0].gradient * 10.0;
        assert_eq!(history[1].initial_velocity, expected);
        assert!(optimizer.is_finished());
    }

    #[test]
    fn repeated_evaluation_is_reproducible() {
        let mut state = short_run();
        let objective = TargetObjective::new(state.config().target);
        let first = evaluate_gradient(&mut state, &objective).unwrap();
        let second = evaluate_gradient(&mut state, &objective).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn non_finite_control_is_a_sticky_failure() {
        let mut state = short_run();
        state.set_initial_velocity(Vector::new(Real::NAN, 0.0));
        let mut optimizer = ControlOptimizer::new(state, OptimizerSettings::default()).unwrap();
        assert!(optimizer.step().is_err());
        assert!(optimizer.failure().is_some());
        assert!(optimizer.is_finished());
        assert!(optimizer.history().is_empty());
    }
}
