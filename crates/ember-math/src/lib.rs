// SPDX-License-Identifier: CEPL-1.0
pub use glam::{vec2, Vec2};

/// Scalar lerp with the same fused-multiply-add shape as the vector one.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    (b - a).mul_add(t, a)
}
