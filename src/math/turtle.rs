//! 3D turtle used to place every stem, clone, branch and leaf
//!
//! The turtle carries a position, a unit heading (`dir`) and a unit `right`
//! vector perpendicular to it. All angles are given in degrees and every
//! rotated vector is re-normalized to keep drift in check over long stems.

use crate::core::types::{Quat, Vec3};

/// Below this the tropism axis is degenerate (heading parallel to tropism)
const TROPISM_EPSILON: f32 = 1e-6;

/// Rotate `v` about a unit `axis` by `degrees`, normalizing the result
#[inline]
fn rotated(v: Vec3, axis: Vec3, degrees: f32) -> Vec3 {
    (Quat::from_axis_angle(axis, degrees.to_radians()) * v).normalize()
}

/// Declination of a vector in degrees, measured from +Z
pub fn declination(v: Vec3) -> f32 {
    (v.x * v.x + v.y * v.y).sqrt().atan2(v.z).to_degrees()
}

/// Quaternion tracking +Z onto `dir` with +Y kept as the up axis
pub fn track_z_up_y(dir: Vec3) -> Quat {
    let dir = dir.normalize_or_zero();
    if dir == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let arc = Quat::from_rotation_arc(Vec3::Z, dir);
    let twist = Quat::from_axis_angle(dir, dir.x.atan2(dir.y));
    (twist * arc).normalize()
}

/// 3D turtle state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Turtle {
    pub pos: Vec3,
    pub dir: Vec3,
    pub right: Vec3,
    pub width: f32,
}

impl Default for Turtle {
    fn default() -> Self {
        Self {
            pos: Vec3::ZERO,
            dir: Vec3::Z,
            right: Vec3::X,
            width: 0.0,
        }
    }
}

impl Turtle {
    /// Turtle at the origin facing +Z with +X as right
    pub fn new() -> Self {
        Self::default()
    }

    /// Move forward along the heading
    pub fn move_forward(&mut self, distance: f32) {
        self.pos += self.dir * distance;
    }

    /// Turn right about the axis perpendicular to heading and right
    pub fn turn_right(&mut self, angle: f32) {
        let axis = self.dir.cross(self.right).normalize();
        self.dir = rotated(self.dir, axis, angle);
        self.right = rotated(self.right, axis, angle);
    }

    /// Turn left about the axis perpendicular to heading and right
    pub fn turn_left(&mut self, angle: f32) {
        self.turn_right(-angle);
    }

    /// Pitch the heading up about the right axis
    pub fn pitch_up(&mut self, angle: f32) {
        self.dir = rotated(self.dir, self.right, angle);
    }

    /// Pitch the heading down about the right axis
    pub fn pitch_down(&mut self, angle: f32) {
        self.pitch_up(-angle);
    }

    /// Roll the right vector about the heading
    pub fn roll_right(&mut self, angle: f32) {
        self.right = rotated(self.right, self.dir, angle);
    }

    /// Roll the right vector the other way about the heading
    pub fn roll_left(&mut self, angle: f32) {
        self.roll_right(-angle);
    }

    /// Set the width carried by the turtle
    pub fn set_width(&mut self, width: f32) {
        self.width = width;
    }

    /// Rotate heading and right about world Z by `angle` degrees
    pub fn spin_world_z(&mut self, angle: f32) {
        self.dir = rotated(self.dir, Vec3::Z, angle);
        self.right = rotated(self.right, Vec3::Z, angle);
    }

    /// Bend heading and right toward `tropism`.
    ///
    /// The rotation angle is `10 * |dir x tropism|` degrees about the axis
    /// perpendicular to both, so a heading already parallel to the tropism
    /// vector is left alone.
    pub fn apply_tropism(&mut self, tropism: Vec3) {
        let h_cross_t = self.dir.cross(tropism);
        let magnitude = h_cross_t.length();
        if magnitude < TROPISM_EPSILON {
            return;
        }
        let axis = h_cross_t / magnitude;
        let alpha = 10.0 * magnitude;
        self.dir = rotated(self.dir, axis, alpha);
        self.right = rotated(self.right, axis, alpha);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_move_forward() {
        let mut turtle = Turtle::new();
        turtle.move_forward(2.5);
        assert!((turtle.pos - Vec3::new(0.0, 0.0, 2.5)).length() < EPS);
    }

    #[test]
    fn test_pitch_down_keeps_right() {
        let mut turtle = Turtle::new();
        turtle.pitch_down(90.0);
        // Rotating +Z by -90 degrees about +X lands on +Y
        assert!((turtle.dir - Vec3::Y).length() < EPS);
        assert_eq!(turtle.right, Vec3::X);
    }

    #[test]
    fn test_turn_rotates_both_vectors() {
        let mut turtle = Turtle::new();
        turtle.turn_right(90.0);
        assert!(turtle.dir.dot(turtle.right).abs() < EPS);
        assert!((turtle.dir.length() - 1.0).abs() < EPS);
        assert!((turtle.right.length() - 1.0).abs() < EPS);

        turtle.turn_left(90.0);
        assert!((turtle.dir - Vec3::Z).length() < EPS);
        assert!((turtle.right - Vec3::X).length() < EPS);
    }

    #[test]
    fn test_roll_keeps_heading() {
        let mut turtle = Turtle::new();
        turtle.roll_right(90.0);
        assert_eq!(turtle.dir, Vec3::Z);
        assert!((turtle.right - Vec3::Y).length() < EPS);
        turtle.roll_left(90.0);
        assert!((turtle.right - Vec3::X).length() < EPS);
    }

    #[test]
    fn test_copy_is_independent() {
        let mut original = Turtle::new();
        original.set_width(0.3);
        let mut copy = original;
        copy.move_forward(1.0);
        copy.pitch_down(45.0);
        assert_eq!(original.pos, Vec3::ZERO);
        assert_eq!(original.dir, Vec3::Z);
        assert_eq!(copy.width, 0.3);
    }

    #[test]
    fn test_tropism_parallel_is_noop() {
        let mut turtle = Turtle::new();
        turtle.apply_tropism(Vec3::new(0.0, 0.0, 0.5));
        assert_eq!(turtle.dir, Vec3::Z);
    }

    #[test]
    fn test_tropism_bends_toward_vector() {
        let mut turtle = Turtle::new();
        turtle.pitch_down(90.0);
        let before = turtle.dir.dot(Vec3::Z);
        turtle.apply_tropism(Vec3::new(0.0, 0.0, 0.5));
        assert!(turtle.dir.dot(Vec3::Z) > before);
    }

    #[test]
    fn test_declination() {
        assert!(declination(Vec3::Z).abs() < EPS);
        assert!((declination(Vec3::X) - 90.0).abs() < EPS);
        assert!((declination(Vec3::NEG_Z) - 180.0).abs() < EPS);
    }

    #[test]
    fn test_track_quat_maps_z_to_dir() {
        for dir in [Vec3::Z, Vec3::X, Vec3::new(0.3, -0.4, 0.8), Vec3::NEG_Z] {
            let q = track_z_up_y(dir);
            assert!((q * Vec3::Z - dir.normalize()).length() < 1e-4, "dir {:?}", dir);
        }
        assert!((track_z_up_y(Vec3::Z) * Vec3::Y - Vec3::Y).length() < EPS);
    }
}
