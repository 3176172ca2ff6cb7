use diffmpm2d::math::{Real, Vector};
use diffmpm2d::{
    DiffMpmState, LatticeLayout, SimulationConfig, TargetObjective, evaluate_gradient,
    forward_sweep,
};

fn loss_at(state: &mut DiffMpmState, objective: &TargetObjective, velocity: Vector) -> Real {
    state.set_initial_velocity(velocity);
    forward_sweep(state).unwrap();
    objective.evaluate(state.positions(state.last_frame())).unwrap().loss
}

#[test]
fn initial_velocity_gradient_matches_central_differences() {
    let config = SimulationConfig::default()
        .with_steps(8)
        .with_lattice(LatticeLayout::new(4, 0.5, Vector::new(40.0, 40.0)));
    let mut state = DiffMpmState::new(config).unwrap();
    let objective = TargetObjective::new(state.config().target);
    let control = Vector::new(0.8, -0.4);

    state.set_initial_velocity(control);
    let analytic = evaluate_gradient(&mut state, &objective).unwrap().gradient;

    let eps = 1e-5;
    for (axis, direction) in [Vector::X, Vector::Y].into_iter().enumerate() {
        let plus = loss_at(&mut state, &objective, control + direction * eps);
        let minus = loss_at(&mut state, &objective, control - direction * eps);
        let fd = (plus - minus) / (2.0 * eps);
        let relative = (fd - analytic[axis]).abs() / fd.abs().max(analytic[axis].abs());
        assert!(
            relative < 1e-4,
            "axis {axis}: finite difference {fd} vs adjoint {}",
            analytic[axis]
        );
    }
}

#[test]
fn free_flight_gradient_is_flight_time_times_offset() {
    // Away from walls the block translates rigidly, so d centroid / d v0 = (steps - 1) dt.
    let config = SimulationConfig::default()
        .with_steps(8)
        .with_lattice(LatticeLayout::new(4, 0.5, Vector::new(40.0, 40.0)));
    let mut state = DiffMpmState::new(config).unwrap();
    let objective = TargetObjective::new(state.config().target);

    let evaluation = evaluate_gradient(&mut state, &objective).unwrap();
    let flight_time = 7.0 * state.config().dt;
    let expected = (evaluation.centroid - objective.target) * flight_time;
    assert!((evaluation.gradient - expected).length() < 1e-9 * expected.length().max(1.0));
}

#[test]
fn gradient_through_floor_contact_matches_central_differences() {
    let config = SimulationConfig::default()
        .with_steps(24)
        .with_lattice(LatticeLayout::new(4, 0.5, Vector::new(60.0, 4.5)));
    let inv_dx = config.inv_dx();
    let mut state = DiffMpmState::new(config).unwrap();
    let objective = TargetObjective::new(state.config().target);
    let control = Vector::new(0.5, -3.0);

    state.set_initial_velocity(control);
    let analytic = evaluate_gradient(&mut state, &objective).unwrap().gradient;

    // Some stencil must reach the clamped rows below y = 3 cells.
    let reached_band = (0..state.steps()).any(|frame| {
        state
            .positions(frame)
            .iter()
            .any(|position| position.y * inv_dx < 3.5)
    });
    assert!(reached_band);

    let eps = 1e-5;
    for (axis, direction) in [Vector::X, Vector::Y].into_iter().enumerate() {
        let plus = loss_at(&mut state, &objective, control + direction * eps);
        let minus = loss_at(&mut state, &objective, control - direction * eps);
        let fd = (plus - minus) / (2.0 * eps);
        let relative = (fd - analytic[axis]).abs() / fd.abs().max(analytic[axis].abs());
        assert!(
            relative < 1e-4,
            "axis {axis}: finite difference {fd} vs adjoint {}",
            analytic[axis]
        );
    }
}
