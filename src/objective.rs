//! Scalar objective on the final frame: half the squared distance from the particle
//! centroid to a target point.

use crate::error::{Result, SimulationError};
use crate::math::{Real, Vector};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetObjective {
    pub target: Vector,
}

/// Loss value and the centroid it was computed from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LossEvaluation {
    pub loss: Real,
    pub centroid: Vector,
}

/// Mean position, summed in particle order.
pub fn centroid(positions: &[Vector]) -> Vector {
    if positions.is_empty() {
        return Vector::ZERO;
    }
    let sum = positions
        .iter()
        .fold(Vector::ZERO, |acc, position| acc + *position);
    sum / positions.len() as Real
}

impl TargetObjective {
    pub fn new(target: Vector) -> Self {
        Self { target }
    }

    pub fn evaluate(&self, positions: &[Vector]) -> Result<LossEvaluation> {
        let centroid = centroid(positions);
        let loss = 0.5 * (centroid - self.target).length_squared();
        if !loss.is_finite() {
            return Err(SimulationError::NonFiniteLoss { loss });
        }
        Ok(LossEvaluation { loss, centroid })
    }

    /// Adds `dL/dx_p = (centroid - target) / P` to every final-frame position gradient.
    pub fn seed_adjoint(&self, evaluation: &LossEvaluation, position_grads: &mut [Vector]) {
        if position_grads.is_empty() {
            return;
        }
        let seed = (evaluation.centroid - self.target) / position_grads.len() as Real;
        for grad in position_grads.iter_mut() {
            *grad += seed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loss_is_half_squared_distance() {
        let objective = TargetObjective::new(Vector::new(0.3, 0.6));
        let positions = [Vector::new(0.1, 0.2), Vector::new(0.3, 0.4)];
        let evaluation = objective.evaluate(&positions).unwrap();
        assert!((evaluation.centroid - Vector::new(0.2, 0.3)).length() < 1e-15);
        // 0.5 * (0.1^2 + 0.3^2)
        assert!((evaluation.loss - 0.05).abs() < 1e-15);
    }

    #[test]
    fn seed_spreads_gradient_evenly() {
        let objective = TargetObjective::new(Vector::ZERO);
        let positions = [Vector::new(1.0, 0.0), Vector::new(3.0, 2.0)];
        let evaluation = objective.evaluate(&positions).unwrap();
        let mut grads = [Vector::ZERO; 2];
        objective.seed_adjoint(&evaluation, &mut grads);
        assert_eq!(grads, [Vector::new(1.0, 0.5); 2]);
    }

    #[test]
    fn non_finite_position_is_reported() {
        let objective = TargetObjective::new(Vector::new(0.3, 0.6));
        let positions = [Vector::new(Real::NAN, 0.2), Vector::new(0.3, 0.4)];
        assert!(matches!(
            objective.evaluate(&positions),
            Err(SimulationError::NonFiniteLoss { .. })
        ));
    }
}
