//! Cubic bezier evaluation between two spline control points

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::core::types::{Quat, Result, Vec3};
use crate::core::TreeError;
use crate::math::turtle::{track_z_up_y, Turtle};

/// A spline control point with independent left/right handles
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BezierPoint {
    pub co: Vec3,
    pub handle_left: Vec3,
    pub handle_right: Vec3,
    pub radius: f32,
}

impl BezierPoint {
    /// Point at `co` with both handles collapsed onto it
    pub fn at(co: Vec3) -> Self {
        Self {
            co,
            handle_left: co,
            handle_right: co,
            radius: 0.0,
        }
    }
}

#[inline]
fn check_offset(t: f32) -> Result<()> {
    if (0.0..=1.0).contains(&t) {
        Ok(())
    } else {
        Err(TreeError::OffsetOutOfRange(t))
    }
}

/// Evaluate the curve between `start` and `end` at offset `t` in [0, 1]
pub fn point_on_bezier(t: f32, start: &BezierPoint, end: &BezierPoint) -> Result<Vec3> {
    check_offset(t)?;
    let u = 1.0 - t;
    Ok(u * u * u * start.co
        + 3.0 * u * u * t * start.handle_right
        + 3.0 * u * t * t * end.handle_left
        + t * t * t * end.co)
}

/// Derivative of the curve between `start` and `end` at offset `t` (not normalized)
pub fn tangent_on_bezier(t: f32, start: &BezierPoint, end: &BezierPoint) -> Result<Vec3> {
    check_offset(t)?;
    let u = 1.0 - t;
    Ok(3.0 * u * u * (start.handle_right - start.co)
        + 6.0 * u * t * (end.handle_left - start.handle_right)
        + 3.0 * t * t * (end.co - end.handle_left))
}

/// Radius between `start` and `end` at offset `t`, linear in `t`
pub fn radius_on_bezier(t: f32, start: &BezierPoint, end: &BezierPoint) -> Result<f32> {
    check_offset(t)?;
    Ok(start.radius + (end.radius - start.radius) * t)
}

/// Relative control points of one helix turn.
///
/// Returned as `(p0, p1, p2, axis)` where the three points are offsets from
/// the helix start and `axis` is the turtle heading.
#[derive(Debug, Clone, Copy)]
pub struct HelixPoints {
    pub p0: Vec3,
    pub p1: Vec3,
    pub p2: Vec3,
    pub axis: Vec3,
}

/// Bezier approximation of a helix with the given radius and pitch.
///
/// Uses the closed form for a 90 degree inclination, spun by `spin` radians
/// about the helix axis and then aligned with the turtle heading.
pub fn helix_points(turtle: &Turtle, radius: f32, pitch: f32, spin: f32) -> HelixPoints {
    let points = [
        Vec3::new(0.0, -radius, -pitch / 4.0),
        Vec3::new((4.0 * radius) / 3.0, -radius, 0.0),
        Vec3::new((4.0 * radius) / 3.0, radius, 0.0),
        Vec3::new(0.0, radius, pitch / 4.0),
    ];

    let track = track_z_up_y(turtle.dir);
    let spin = Quat::from_axis_angle(Vec3::Z, spin);
    let [b0, b1, b2, b3] = points.map(|p| track * (spin * p));

    HelixPoints {
        p0: b1 - b0,
        p1: b2 - b0,
        p2: b3 - b0,
        axis: turtle.dir,
    }
}

/// Rotate a helix offset by half turns about its axis
pub fn helix_step(offset: Vec3, axis: Vec3, half_turns: f32) -> Vec3 {
    Quat::from_axis_angle(axis.normalize(), half_turns * PI) * offset
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn straight_segment() -> (BezierPoint, BezierPoint) {
        let start = BezierPoint {
            co: Vec3::ZERO,
            handle_left: Vec3::new(0.0, 0.0, -1.0),
            handle_right: Vec3::new(0.0, 0.0, 1.0),
            radius: 1.0,
        };
        let end = BezierPoint {
            co: Vec3::new(0.0, 0.0, 3.0),
            handle_left: Vec3::new(0.0, 0.0, 2.0),
            handle_right: Vec3::new(0.0, 0.0, 4.0),
            radius: 0.5,
        };
        (start, end)
    }

    #[test]
    fn test_endpoints() {
        let (start, end) = straight_segment();
        assert!((point_on_bezier(0.0, &start, &end).unwrap() - start.co).length() < EPS);
        assert!((point_on_bezier(1.0, &start, &end).unwrap() - end.co).length() < EPS);
    }

    #[test]
    fn test_straight_line_midpoint() {
        let (start, end) = straight_segment();
        let mid = point_on_bezier(0.5, &start, &end).unwrap();
        assert!((mid - Vec3::new(0.0, 0.0, 1.5)).length() < EPS);
        let tangent = tangent_on_bezier(0.5, &start, &end).unwrap();
        assert!((tangent.normalize() - Vec3::Z).length() < EPS);
    }

    #[test]
    fn test_radius_interpolates() {
        let (start, end) = straight_segment();
        assert!((radius_on_bezier(0.5, &start, &end).unwrap() - 0.75).abs() < EPS);
    }

    #[test]
    fn test_offset_out_of_range() {
        let (start, end) = straight_segment();
        assert!(matches!(
            point_on_bezier(1.5, &start, &end),
            Err(TreeError::OffsetOutOfRange(_))
        ));
        assert!(tangent_on_bezier(-0.1, &start, &end).is_err());
        assert!(radius_on_bezier(f32::NAN, &start, &end).is_err());
    }

    #[test]
    fn test_helix_advances_along_axis() {
        let turtle = Turtle::new();
        let helix = helix_points(&turtle, 0.5, 2.0, 0.0);
        // One half turn climbs half the pitch
        assert!((helix.p2.z - 1.0).abs() < EPS);
        assert_eq!(helix.axis, Vec3::Z);
    }
}
