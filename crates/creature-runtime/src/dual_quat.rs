//! Dual quaternions for rigid bone transforms
//!
//! A dual quaternion stores a rotation in `real` and the rotation-coupled
//! translation in `imaginary`. Skinning accumulates weighted dual quaternions
//! with [`DualQuat::add`] and normalizes once, which is linear dual quaternion
//! blending rather than true screw interpolation.

use glam::{Quat, Vec3};

const ZERO_QUAT: Quat = Quat::from_xyzw(0.0, 0.0, 0.0, 0.0);

/// Rigid transform as a `(real, imaginary)` quaternion pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DualQuat {
    /// Rotation part
    pub real: Quat,
    /// Translation part, `0.5 * t * real`
    pub imaginary: Quat,
}

impl DualQuat {
    /// All-zero accumulator, ready for [`DualQuat::add`]
    pub const ZERO: Self = Self {
        real: ZERO_QUAT,
        imaginary: ZERO_QUAT,
    };

    /// Build from a rotation quaternion and a translation
    ///
    /// `rotation` is stored as given; it is expected to be unit length for the
    /// result to describe a rigid transform.
    pub fn from_rotation_translation(rotation: Quat, t: Vec3) -> Self {
        let q0 = rotation;
        let imaginary = Quat::from_xyzw(
            0.5 * (t.x * q0.w + t.y * q0.z - t.z * q0.y),
            0.5 * (-t.x * q0.z + t.y * q0.w + t.z * q0.x),
            0.5 * (t.x * q0.y - t.y * q0.x + t.z * q0.w),
            -0.5 * (t.x * q0.x + t.y * q0.y + t.z * q0.z),
        );

        Self {
            real: q0,
            imaginary,
        }
    }

    /// Clear both parts to zero
    pub fn reset(&mut self) {
        *self = Self::ZERO;
    }

    /// Accumulate `other` scaled by separate real and imaginary factors
    pub fn add(&mut self, other: &Self, real_factor: f32, imaginary_factor: f32) {
        self.real = self.real + other.real * real_factor;
        self.imaginary = self.imaginary + other.imaginary * imaginary_factor;
    }

    /// Divide both parts by the length of `real`
    ///
    /// A zero `real` produces non-finite components; callers must have
    /// accumulated at least one contribution.
    pub fn normalize(&mut self) {
        let norm = self.real.length();
        let inv = 1.0 / norm;
        self.real = self.real * inv;
        self.imaginary = self.imaginary * inv;
    }

    /// Normalized copy
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut dq = *self;
        dq.normalize();
        dq
    }

    /// Flip both parts, which describes the same transform
    #[must_use]
    pub fn negated(&self) -> Self {
        Self {
            real: -self.real,
            imaginary: -self.imaginary,
        }
    }

    /// Apply the transform to a point
    pub fn transform(&self, p: Vec3) -> Vec3 {
        let v0 = Vec3::new(self.real.x, self.real.y, self.real.z);
        let ve = Vec3::new(self.imaginary.x, self.imaginary.y, self.imaginary.z);

        let trans = (ve * self.real.w - v0 * self.imaginary.w + v0.cross(ve)) * 2.0;
        let rot = self.real * p;

        rot + trans
    }
}

impl Default for DualQuat {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn assert_vec_eq(a: Vec3, b: Vec3) {
        assert!((a - b).length() < 1e-4, "{a:?} != {b:?}");
    }

    #[test]
    fn test_reset_is_zero() {
        let mut dq = DualQuat::from_rotation_translation(Quat::IDENTITY, Vec3::ONE);
        dq.reset();
        assert_eq!(dq, DualQuat::ZERO);
    }

    #[test]
    fn test_pure_translation() {
        let dq = DualQuat::from_rotation_translation(Quat::IDENTITY, Vec3::new(3.0, -2.0, 1.0));
        assert_vec_eq(dq.transform(Vec3::new(1.0, 1.0, 1.0)), Vec3::new(4.0, -1.0, 2.0));
    }

    #[test]
    fn test_rotation_then_translation() {
        let rotation = Quat::from_rotation_z(FRAC_PI_2);
        let dq = DualQuat::from_rotation_translation(rotation, Vec3::new(10.0, 0.0, 0.0));
        // (1,0,0) rotates to (0,1,0), then shifts by +10 in x
        assert_vec_eq(dq.transform(Vec3::X), Vec3::new(10.0, 1.0, 0.0));
    }

    #[test]
    fn test_normalize_idempotent() {
        let mut dq = DualQuat::ZERO;
        let a = DualQuat::from_rotation_translation(Quat::from_rotation_z(0.4), Vec3::new(1.0, 2.0, 0.0));
        let b = DualQuat::from_rotation_translation(Quat::from_rotation_z(-0.9), Vec3::new(-3.0, 0.5, 0.0));
        dq.add(&a, 0.3, 0.3);
        dq.add(&b, 0.7, 0.7);

        let once = dq.normalized();
        let twice = once.normalized();
        assert!((once.real - twice.real).length() < 1e-6);
        assert!((once.imaginary - twice.imaginary).length() < 1e-6);
    }

    #[test]
    fn test_weighted_add_single_contribution() {
        let source = DualQuat::from_rotation_translation(Quat::from_rotation_z(1.1), Vec3::new(0.5, 4.0, 0.0));
        let mut accum = DualQuat::ZERO;
        accum.add(&source, 1.0, 1.0);
        accum.normalize();

        let p = Vec3::new(2.0, -1.0, 0.0);
        assert_vec_eq(accum.transform(p), source.transform(p));
    }

    #[test]
    fn test_negated_same_transform() {
        let dq = DualQuat::from_rotation_translation(Quat::from_rotation_z(0.7), Vec3::new(1.0, 1.0, 0.0));
        let p = Vec3::new(-2.0, 5.0, 0.0);
        assert_vec_eq(dq.negated().transform(p), dq.transform(p));
    }

    #[test]
    fn test_normalize_zero_is_not_finite() {
        let mut dq = DualQuat::ZERO;
        dq.normalize();
        assert!(!dq.real.x.is_finite());
    }
}
