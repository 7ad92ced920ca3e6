//! Three-point angle math

use pose_frame::Landmark;

/// Angle in degrees at vertex `b` between rays `b -> a` and `b -> c`
///
/// Standard dot-product formula. A zero-length ray yields 0.0 rather than
/// NaN.
pub fn joint_angle(a: &Landmark, b: &Landmark, c: &Landmark) -> f32 {
    let v1 = (a.x - b.x, a.y - b.y);
    let v2 = (c.x - b.x, c.y - b.y);

    let mag1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
    let mag2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();

    if mag1 < 1e-6 || mag2 < 1e-6 {
        return 0.0;
    }

    let dot = v1.0 * v2.0 + v1.1 * v2.1;
    let cos_angle = (dot / (mag1 * mag2)).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}

/// Angle in degrees of the line `from -> to` measured from image vertical
///
/// 0.0 means perfectly upright; coincident points yield 0.0.
pub fn angle_from_vertical(from: &Landmark, to: &Landmark) -> f32 {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let mag = (dx * dx + dy * dy).sqrt();
    if mag < 1e-6 {
        return 0.0;
    }
    // Image y grows downward; vertical reference is the y axis.
    (dx.abs() / mag).clamp(-1.0, 1.0).asin().to_degrees()
}
