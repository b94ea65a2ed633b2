//! Small vector and matrix helpers layered over `glam`
//!
//! These follow the conventions of the Creature asset format: bones live in
//! the XY plane, the binormal is always `+Z`, and normalizing a zero-length
//! vector yields the zero vector rather than NaN.

use glam::{Mat4, Quat, Vec2, Vec3};

/// Fixed binormal shared by every bone
pub const BINORMAL: Vec3 = Vec3::Z;

/// Build a rotation matrix whose columns are the given axes
pub fn axis_matrix(x_axis: Vec3, y_axis: Vec3, z_axis: Vec3) -> Mat4 {
    Mat4::from_cols(
        x_axis.extend(0.0),
        y_axis.extend(0.0),
        z_axis.extend(0.0),
        glam::Vec4::W,
    )
}

/// Rotate a vector by 90 degrees in the XY plane, keeping Z
pub fn rotate_vec_90(v: Vec3) -> Vec3 {
    Vec3::new(-v.y, v.x, v.z)
}

/// Tangent and in-plane normal of the segment `start -> end`
pub fn compute_dirs(start: Vec3, end: Vec3) -> (Vec3, Vec3) {
    let tangent = (end - start).normalize_or_zero();
    (tangent, rotate_vec_90(tangent))
}

/// Rotation taking `+X` onto `dir` within the XY plane
pub fn calc_rotate_mat(dir: Vec3) -> Mat4 {
    let dir = dir.normalize_or_zero();
    let normal = rotate_vec_90(dir);

    axis_matrix(
        Vec3::new(dir.x, dir.y, 0.0),
        Vec3::new(normal.x, normal.y, 0.0),
        BINORMAL,
    )
}

/// Frame matrix for a bone segment: translate to `anchor`, then rotate so
/// that `+X` follows the tangent of `start -> end`
pub fn segment_frame(anchor: Vec3, start: Vec3, end: Vec3) -> Mat4 {
    let (tangent, normal) = compute_dirs(start, end);
    let rotate = axis_matrix(
        Vec3::new(tangent.x, tangent.y, 0.0),
        Vec3::new(normal.x, normal.y, 0.0),
        BINORMAL,
    );

    Mat4::from_translation(anchor) * rotate
}

/// Convert the rotation part of a matrix to a quaternion
///
/// Uses the trace when it is positive, otherwise picks the dominant diagonal
/// element. The result is not renormalized.
pub fn matrix_to_quat(m: &Mat4) -> Quat {
    let (m11, m12, m13) = (m.x_axis.x, m.y_axis.x, m.z_axis.x);
    let (m21, m22, m23) = (m.x_axis.y, m.y_axis.y, m.z_axis.y);
    let (m31, m32, m33) = (m.x_axis.z, m.y_axis.z, m.z_axis.z);

    let trace = m11 + m22 + m33;

    if trace > 0.0 {
        let s = 0.5 / (trace + 1.0).sqrt();
        Quat::from_xyzw((m32 - m23) * s, (m13 - m31) * s, (m21 - m12) * s, 0.25 / s)
    } else if m11 > m22 && m11 > m33 {
        let s = 2.0 * (1.0 + m11 - m22 - m33).sqrt();
        Quat::from_xyzw(
            0.25 * s,
            (m12 + m21) / s,
            (m13 + m31) / s,
            (m32 - m23) / s,
        )
    } else if m22 > m33 {
        let s = 2.0 * (1.0 + m22 - m11 - m33).sqrt();
        Quat::from_xyzw(
            (m12 + m21) / s,
            0.25 * s,
            (m23 + m32) / s,
            (m13 - m31) / s,
        )
    } else {
        let s = 2.0 * (1.0 + m33 - m11 - m22).sqrt();
        Quat::from_xyzw(
            (m13 + m31) / s,
            (m23 + m32) / s,
            0.25 * s,
            (m21 - m12) / s,
        )
    }
}

/// Translation column of an affine matrix
pub fn mat_translation(m: &Mat4) -> Vec3 {
    m.w_axis.truncate()
}

/// Inverse of `m`, or `None` when the determinant is zero or not finite
pub fn checked_inverse(m: &Mat4) -> Option<Mat4> {
    let det = m.determinant();
    if det == 0.0 || !det.is_finite() {
        None
    } else {
        Some(m.inverse())
    }
}

/// `(1 - ratio) * a + ratio * b`
pub fn vec3_interp(a: Vec3, b: Vec3, ratio: f32) -> Vec3 {
    a * (1.0 - ratio) + b * ratio
}

/// `(1 - ratio) * a + ratio * b`
pub fn vec2_interp(a: Vec2, b: Vec2, ratio: f32) -> Vec2 {
    a * (1.0 - ratio) + b * ratio
}
