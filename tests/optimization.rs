use diffmpm2d::math::Vector;
use diffmpm2d::{
    ControlOptimizer, DiffMpmState, LatticeLayout, OptimizerSettings, SimulationConfig,
    SimulationError,
};

#[test]
fn descent_reduces_the_loss() {
    let config = SimulationConfig::default()
        .with_steps(64)
        .with_lattice(LatticeLayout::new(20, 0.5, Vector::new(10.0, 25.0)));
    let state = DiffMpmState::new(config).unwrap();
    let settings = OptimizerSettings::default()
        .with_iterations(3)
        .with_learning_rate(10.0);

    let mut optimizer = ControlOptimizer::new(state, settings).unwrap();
    let history = optimizer.run().unwrap().to_vec();

    assert_eq!(history.len(), 3);
    assert!(history[1].loss < history[0].loss);
    assert!(history[2].loss < history[1].loss);
    assert!(history.iter().all(|report| report.loss.is_finite()));

    let control = optimizer.state().initial_velocity();
    // Target sits up and to the right of the block.
    assert!(control.x > 0.0 && control.y > 0.0);
}

#[test]
fn snapshots_report_centroids_of_the_last_sweep() {
    let config = SimulationConfig::default()
        .with_steps(130)
        .with_lattice(LatticeLayout::new(8, 0.5, Vector::new(10.0, 25.0)));
    let state = DiffMpmState::new(config).unwrap();
    let mut optimizer =
        ControlOptimizer::new(state, OptimizerSettings::default().with_iterations(1)).unwrap();
    optimizer.run().unwrap();

    let snapshots: Vec<_> = optimizer.state().frame_snapshots(64).collect();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[1].frame, 127);
    // The block starts at rest and falls.
    let start = diffmpm2d::objective::centroid(optimizer.state().positions(0));
    assert!(snapshots[1].centroid.y < start.y);
}

#[test]
fn control_driving_block_out_of_grid_halts_with_error() {
    let config = SimulationConfig::default()
        .with_steps(16)
        .with_lattice(LatticeLayout::new(2, 0.5, Vector::new(60.0, 10.0)));
    let mut state = DiffMpmState::new(config).unwrap();
    state.set_initial_velocity(Vector::new(0.0, -200.0));

    let mut optimizer = ControlOptimizer::new(state, OptimizerSettings::default()).unwrap();
    let err = optimizer.step().unwrap_err();
    assert!(matches!(err, SimulationError::ParticleOutOfDomain { .. }));
    assert!(matches!(
        optimizer.failure(),
        Some(SimulationError::ParticleOutOfDomain { .. })
    ));
    assert!(optimizer.is_finished());
    assert!(optimizer.run().is_err());
}
