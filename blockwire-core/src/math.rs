//! Numeric routines shared by both backends.
//!
//! The interpreter calls these directly and the compiled module imports
//! them as host functions, so any operation that is not a single IEEE
//! instruction lives here and nowhere else.

use glam::{EulerRot, Mat3, Quat, Vec3};

/// Tolerance of the equality blocks.
pub const EQUALITY_EPSILON: f32 = 0.001;
/// Upper bound on the iterations of one Loop entry.
pub const MAX_LOOP_ITERATIONS: u32 = 1_000_000;

pub fn numbers_equal(a: f32, b: f32) -> bool {
    (a - b).abs() < EQUALITY_EPSILON
}

pub fn vectors_equal(a: Vec3, b: Vec3) -> bool {
    a.distance(b) < EQUALITY_EPSILON
}

/// Floored modulo: the result has the sign of the divisor.
pub fn modulo(a: f32, b: f32) -> f32 {
    a - b * (a / b).floor()
}

pub fn power(base: f32, exponent: f32) -> f32 {
    base.powf(exponent)
}

pub fn logarithm(number: f32, base: f32) -> f32 {
    number.ln() / base.ln()
}

pub fn sin_degrees(angle: f32) -> f32 {
    angle.to_radians().sin()
}

pub fn cos_degrees(angle: f32) -> f32 {
    angle.to_radians().cos()
}

pub fn min(a: f32, b: f32) -> f32 {
    a.min(b)
}

pub fn max(a: f32, b: f32) -> f32 {
    a.max(b)
}

pub fn normalize(v: Vec3) -> Vec3 {
    v.normalize_or_zero()
}

pub fn dot(a: Vec3, b: Vec3) -> f32 {
    a.dot(b)
}

pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    a.cross(b)
}

pub fn distance(a: Vec3, b: Vec3) -> f32 {
    a.distance(b)
}

pub fn rotate(v: Vec3, rot: Quat) -> Vec3 {
    rot * v
}

pub fn combine(a: Quat, b: Quat) -> Quat {
    a * b
}

pub fn inverse(rot: Quat) -> Quat {
    rot.inverse()
}

pub fn lerp(from: Quat, to: Quat, amount: f32) -> Quat {
    from.slerp(to, amount)
}

/// Rotation of `angle` degrees around `axis`; a zero axis yields identity.
pub fn axis_angle(axis: Vec3, angle: f32) -> Quat {
    let axis = axis.normalize_or_zero();
    if axis == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    Quat::from_axis_angle(axis, angle.to_radians())
}

/// Rotation whose forward (+z) axis points along `direction`.
pub fn look_rotation(direction: Vec3, up: Vec3) -> Quat {
    let forward = direction.normalize_or_zero();
    if forward == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let right = up.cross(forward).normalize_or_zero();
    if right == Vec3::ZERO {
        return Quat::from_rotation_arc(Vec3::Z, forward);
    }
    let up = forward.cross(right);
    Quat::from_mat3(&Mat3::from_cols(right, up, forward)).normalize()
}

/// Intersection of the line through `from` and `to` with a plane.
///
/// A line parallel to the plane has no intersection and yields zero.
pub fn line_vs_plane(from: Vec3, to: Vec3, point: Vec3, normal: Vec3) -> Vec3 {
    let direction = to - from;
    let denom = normal.dot(direction);
    if denom == 0.0 {
        return Vec3::ZERO;
    }
    from + direction * (normal.dot(point - from) / denom)
}

/// Euler angles in degrees (applied y, then x, then z) to a rotation.
pub fn make_rotation(x: f32, y: f32, z: f32) -> Quat {
    Quat::from_euler(
        EulerRot::YXZ,
        y.to_radians(),
        x.to_radians(),
        z.to_radians(),
    )
}

/// Inverse of [`make_rotation`], as (x, y, z) degrees.
pub fn break_rotation(rot: Quat) -> Vec3 {
    let (y, x, z) = rot.to_euler(EulerRot::YXZ);
    Vec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees())
}

/// Number of iterations a Loop entry runs.
pub fn loop_count(start: f32, stop: f32) -> u32 {
    let span = (stop - start).abs().ceil();
    if span.is_nan() || span <= 0.0 {
        0
    } else if span >= MAX_LOOP_ITERATIONS as f32 {
        MAX_LOOP_ITERATIONS
    } else {
        span as u32
    }
}

/// Counter value of iteration `k`.
pub fn loop_counter(start: f32, stop: f32, k: u32) -> f32 {
    if start <= stop {
        start + k as f32
    } else {
        start - k as f32
    }
}
