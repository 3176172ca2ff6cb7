//! Helper functions for materials
//!
//! Parameter conversions and sanity checks shared by constitutive models.

/// Physics parameter conversions
pub mod physics {
    use crate::math::Real;

    /// Computes the Lamé parameters (lambda, mu) from Young's modulus and Poisson ratio
    #[inline]
    pub fn lame_lambda_mu(young_modulus: Real, poisson_ratio: Real) -> (Real, Real) {
        let lambda =
            young_modulus * poisson_ratio / ((1.0 + poisson_ratio) * (1.0 - 2.0 * poisson_ratio));
        let mu = shear_modulus(young_modulus, poisson_ratio);
        (lambda, mu)
    }

    /// Shear modulus (mu) from Young's modulus and Poisson ratio
    #[inline]
    pub fn shear_modulus(young_modulus: Real, poisson_ratio: Real) -> Real {
        young_modulus / (2.0 * (1.0 + poisson_ratio))
    }
}

/// Check if material properties make sense
pub mod check {
    use crate::math::Real;

    #[inline]
    pub fn positive_finite(value: Real) -> bool {
        value > 0.0 && value.is_finite()
    }

    /// Deformation must stay invertible and orientation preserving.
    #[inline]
    pub fn deformation_gradient_ok(det: Real) -> bool {
        det > 0.0 && det.is_finite()
    }
}
