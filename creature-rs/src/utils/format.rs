//! Formatting utilities

use glam::{Vec2, Vec3};

/// `(x, y)` with three decimals
pub fn format_vec2(v: Vec2) -> String {
    format!("({:.3}, {:.3})", v.x, v.y)
}

/// `(x, y, z)` with three decimals
pub fn format_vec3(v: Vec3) -> String {
    format!("({:.3}, {:.3}, {:.3})", v.x, v.y, v.z)
}

/// Inclusive frame range, `start..=end`
pub fn format_frame_range(start: i32, end: i32) -> String {
    format!("{start}..={end}")
}

/// Inclusive index range, or `-` for an empty span
pub fn format_span(start: usize, end: usize) -> String {
    if end < start {
        "-".to_string()
    } else {
        format!("{start}..={end}")
    }
}
