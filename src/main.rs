use bevy::log::LogPlugin;
use bevy::prelude::*;

use diffmpm2d::config::constants::SNAPSHOT_STRIDE;
use diffmpm2d::{ControlOptimizer, DiffMpmPlugin, DiffMpmState, OptimizerSettings, SimulationConfig};

fn main() -> diffmpm2d::Result<()> {
    let mut app = App::new();
    app.add_plugins(LogPlugin::default());

    let config = SimulationConfig::default();
    config.validate()?;
    let state = DiffMpmState::new(config)?;
    info!(
        "{} particles, {} frames, ledger {:.1} MiB",
        state.particle_count(),
        state.steps(),
        state.ledger_bytes() as f64 / (1024.0 * 1024.0)
    );

    let optimizer = ControlOptimizer::new(state, OptimizerSettings::default())?;
    app.insert_resource(optimizer).add_plugins(DiffMpmPlugin);
    app.finish();
    app.cleanup();

    while !app.world().resource::<ControlOptimizer>().is_finished() {
        app.update();
    }

    let optimizer = app.world().resource::<ControlOptimizer>();
    if let (Some(first), Some(last)) = (optimizer.history().first(), optimizer.history().last()) {
        info!(
            "loss {:.6e} -> {:.6e} over {} iterations, init v {:?}",
            first.loss,
            last.loss,
            optimizer.history().len(),
            optimizer.state().initial_velocity()
        );
    }
    for snapshot in optimizer.state().frame_snapshots(SNAPSHOT_STRIDE) {
        info!("frame {}: centroid {:?}", snapshot.frame, snapshot.centroid);
    }

    match optimizer.failure() {
        Some(failure) => Err(failure.clone()),
        None => Ok(()),
    }
}
