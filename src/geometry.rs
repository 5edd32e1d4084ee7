// src/geometry.rs

/// Inner angle at `b` formed by the segments b→a and b→c, in degrees.
///
/// Computed from the atan2 difference of the two segments and rectified
/// into 0–180 so that the result is orientation-independent.
pub fn joint_angle(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    let radians = (c[1] - b[1]).atan2(c[0] - b[0]) - (a[1] - b[1]).atan2(a[0] - b[0]);
    let mut angle = radians.to_degrees().abs();
    if angle > 180.0 {
        angle = 360.0 - angle;
    }
    angle
}
