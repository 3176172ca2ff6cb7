use bevy::prelude::*;

pub mod config;
pub mod core;
pub mod error;
pub mod materials;
pub mod math;
pub mod objective;
pub mod optimizer;
pub mod solver;

// Public re-exports for clean API
pub use config::{OptimizerSettings, SimulationConfig};
pub use crate::core::{DiffMpmState, FrameSnapshot, LatticeLayout};
pub use error::{Result, SimulationError};
pub use materials::CorotatedElasticity;
pub use objective::{LossEvaluation, TargetObjective};
pub use optimizer::{ControlOptimizer, GradientEvaluation, IterationReport, evaluate_gradient};
pub use solver::{SubstepKernel, backward_sweep, forward_sweep};

/// Advances an inserted [`ControlOptimizer`] by one descent iteration per app update.
pub struct DiffMpmPlugin;

impl Plugin for DiffMpmPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, optimization_step);
    }
}

fn optimization_step(optimizer: Option<ResMut<ControlOptimizer>>) {
    let Some(mut optimizer) = optimizer else {
        return;
    };
    if optimizer.is_finished() {
        return;
    }
    // Failures are logged and kept on the resource.
    let _ = optimizer.step();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vector;

    #[test]
    fn plugin_drives_optimizer_to_completion() {
        let config = SimulationConfig::default()
            .with_steps(4)
            .with_lattice(LatticeLayout::new(2, 0.5, Vector::new(40.0, 40.0)));
        let state = DiffMpmState::new(config).unwrap();
        let settings = OptimizerSettings::default().with_iterations(2);

        let mut app = App::new();
        app.insert_resource(ControlOptimizer::new(state, settings).unwrap())
            .add_plugins(DiffMpmPlugin);
        for _ in 0..4 {
            app.update();
        }

        let optimizer = app.world().resource::<ControlOptimizer>();
        assert!(optimizer.is_finished());
        assert_eq!(optimizer.history().len(), 2);
    }
}
