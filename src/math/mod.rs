//! Geometric primitives: turtle, bezier evaluation, bounds

pub mod aabb;
pub mod bezier;
pub mod turtle;

pub use aabb::Aabb;
pub use bezier::{BezierPoint, point_on_bezier, tangent_on_bezier, radius_on_bezier};
pub use turtle::{Turtle, declination};
