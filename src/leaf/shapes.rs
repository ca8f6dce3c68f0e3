//! Leaf and blossom polygon templates
//!
//! Leaves lie in the XZ plane with the petiole at the origin, width along X
//! and the blade running to `z = 1`. Blossoms open in the XY plane around the
//! origin and cup toward +Z, so the placement direction becomes the flower
//! axis.

use crate::core::types::{Vec2, Vec3};

/// Unscaled template geometry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeTemplate {
    pub vertices: Vec<Vec3>,
    /// Polygons as vertex index lists
    pub faces: Vec<Vec<u32>>,
    /// One UV per vertex, or empty
    pub uvs: Vec<Vec2>,
}

/// Template catalog entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafTemplate {
    Ovate,
    Linear,
    Cordate,
    Maple,
    Palmate,
    SpikyOak,
    RoundedOak,
    Elliptic,
    Rectangle,
    Triangle,
    Cherry,
    Orange,
    Magnolia,
}

impl LeafTemplate {
    /// Template for a shape code.
    ///
    /// Codes 1-10 are leaves and anything else non-negative falls back to
    /// elliptic. Codes -1..-3 are blossoms and lower codes fall back to cherry.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Ovate,
            2 => Self::Linear,
            3 => Self::Cordate,
            4 => Self::Maple,
            5 => Self::Palmate,
            6 => Self::SpikyOak,
            7 => Self::RoundedOak,
            9 => Self::Rectangle,
            10 => Self::Triangle,
            -2 => Self::Orange,
            -3 => Self::Magnolia,
            c if c < 0 => Self::Cherry,
            _ => Self::Elliptic,
        }
    }

    pub fn is_blossom(self) -> bool {
        matches!(self, Self::Cherry | Self::Orange | Self::Magnolia)
    }

    /// Build the template geometry
    pub fn template(self) -> ShapeTemplate {
        match self {
            Self::Ovate => strip(
                0.0,
                &[(0.1, 0.2), (0.25, 0.3), (0.4, 0.32), (0.55, 0.28), (0.7, 0.2), (0.85, 0.1)],
                1.0,
            ),
            Self::Linear => strip(
                0.0,
                &[(0.1, 0.05), (0.3, 0.06), (0.5, 0.06), (0.7, 0.05), (0.9, 0.03)],
                1.0,
            ),
            // Base vertex sits above the first row to form the notch
            Self::Cordate => strip(
                0.1,
                &[(0.02, 0.2), (0.15, 0.38), (0.3, 0.4), (0.45, 0.35), (0.6, 0.27), (0.75, 0.17), (0.9, 0.07)],
                1.0,
            ),
            Self::Maple => leaf_fan(
                0.3,
                &[
                    (-165.0, 0.12),
                    (-130.0, 0.2),
                    (-105.0, 0.45),
                    (-80.0, 0.28),
                    (-50.0, 0.6),
                    (-25.0, 0.3),
                    (0.0, 0.7),
                    (25.0, 0.3),
                    (50.0, 0.6),
                    (80.0, 0.28),
                    (105.0, 0.45),
                    (130.0, 0.2),
                    (165.0, 0.12),
                    (180.0, 0.3),
                ],
            ),
            Self::Palmate => leaf_fan(
                0.25,
                &[
                    (-140.0, 0.1),
                    (-110.0, 0.4),
                    (-90.0, 0.12),
                    (-70.0, 0.55),
                    (-52.0, 0.12),
                    (-35.0, 0.65),
                    (-17.0, 0.12),
                    (0.0, 0.7),
                    (17.0, 0.12),
                    (35.0, 0.65),
                    (52.0, 0.12),
                    (70.0, 0.55),
                    (90.0, 0.12),
                    (110.0, 0.4),
                    (140.0, 0.1),
                    (180.0, 0.25),
                ],
            ),
            Self::SpikyOak => strip(
                0.0,
                &[
                    (0.1, 0.1),
                    (0.2, 0.3),
                    (0.3, 0.12),
                    (0.4, 0.34),
                    (0.5, 0.14),
                    (0.6, 0.32),
                    (0.7, 0.12),
                    (0.8, 0.24),
                    (0.9, 0.08),
                ],
                1.0,
            ),
            Self::RoundedOak => strip(
                0.0,
                &[
                    (0.08, 0.1),
                    (0.15, 0.22),
                    (0.22, 0.24),
                    (0.28, 0.14),
                    (0.35, 0.26),
                    (0.44, 0.28),
                    (0.5, 0.16),
                    (0.57, 0.27),
                    (0.66, 0.26),
                    (0.72, 0.14),
                    (0.79, 0.2),
                    (0.87, 0.16),
                ],
                1.0,
            ),
            Self::Elliptic => strip(
                0.0,
                &[(0.1, 0.12), (0.25, 0.22), (0.4, 0.26), (0.55, 0.26), (0.7, 0.22), (0.85, 0.13)],
                1.0,
            ),
            Self::Rectangle => ShapeTemplate {
                vertices: vec![
                    Vec3::new(-0.5, 0.0, 0.0),
                    Vec3::new(0.5, 0.0, 0.0),
                    Vec3::new(0.5, 0.0, 1.0),
                    Vec3::new(-0.5, 0.0, 1.0),
                ],
                faces: vec![vec![0, 1, 2, 3]],
                uvs: vec![
                    Vec2::new(0.0, 0.0),
                    Vec2::new(1.0, 0.0),
                    Vec2::new(1.0, 1.0),
                    Vec2::new(0.0, 1.0),
                ],
            },
            Self::Triangle => ShapeTemplate {
                vertices: vec![
                    Vec3::new(-0.25, 0.0, 0.0),
                    Vec3::new(0.25, 0.0, 0.0),
                    Vec3::new(0.0, 0.0, 1.0),
                ],
                faces: vec![vec![0, 1, 2]],
                uvs: Vec::new(),
            },
            Self::Cherry => blossom(5, &[(-25.0, 0.6), (-12.0, 1.0), (0.0, 0.9), (12.0, 1.0), (25.0, 0.6)], 0.2, 0.2),
            Self::Orange => blossom(5, &[(-15.0, 0.5), (0.0, 1.0), (15.0, 0.5)], 0.15, 0.4),
            Self::Magnolia => blossom(
                6,
                &[(-20.0, 0.7), (-10.0, 0.95), (0.0, 1.0), (10.0, 0.95), (20.0, 0.7)],
                0.25,
                0.8,
            ),
        }
    }
}

/// Symmetric blade from `(z, half_width)` rows between a base and a tip vertex
fn strip(base_z: f32, rows: &[(f32, f32)], tip_z: f32) -> ShapeTemplate {
    let mut vertices = Vec::with_capacity(rows.len() * 2 + 2);
    vertices.push(Vec3::new(0.0, 0.0, base_z));
    for &(z, w) in rows {
        vertices.push(Vec3::new(-w, 0.0, z));
        vertices.push(Vec3::new(w, 0.0, z));
    }
    let tip = vertices.len() as u32;
    vertices.push(Vec3::new(0.0, 0.0, tip_z));

    let left = |i: usize| 1 + 2 * i as u32;
    let right = |i: usize| 2 + 2 * i as u32;

    let mut faces = Vec::with_capacity(rows.len() + 1);
    faces.push(vec![0, right(0), left(0)]);
    for i in 0..rows.len() - 1 {
        faces.push(vec![left(i), right(i), right(i + 1), left(i + 1)]);
    }
    let last = rows.len() - 1;
    faces.push(vec![left(last), right(last), tip]);

    ShapeTemplate {
        vertices,
        faces,
        uvs: Vec::new(),
    }
}

/// Star-shaped blade in the XZ plane, fanned from a center on the midrib.
/// Outline angles are degrees from +Z, increasing toward +X.
fn leaf_fan(center_z: f32, outline: &[(f32, f32)]) -> ShapeTemplate {
    let center = Vec3::new(0.0, 0.0, center_z);
    fan(center, outline.iter().map(|&(angle, r)| {
        let a = angle.to_radians();
        center + Vec3::new(r * a.sin(), 0.0, r * a.cos())
    }))
}

/// Flower with `petals` copies of a petal outline in the XY plane, cupped by `lift`
fn blossom(petals: u32, petal: &[(f32, f32)], gap_radius: f32, lift: f32) -> ShapeTemplate {
    let step = 360.0 / petals as f32;
    let outline = (0..petals).flat_map(move |k| {
        let base = k as f32 * step;
        petal
            .iter()
            .map(move |&(offset, r)| (base + offset, r))
            .chain(std::iter::once((base + step / 2.0, gap_radius)))
    });
    fan(
        Vec3::ZERO,
        outline.map(|(angle, r)| {
            let a = angle.to_radians();
            Vec3::new(r * a.cos(), r * a.sin(), lift * r)
        }),
    )
}

fn fan(center: Vec3, outline: impl Iterator<Item = Vec3>) -> ShapeTemplate {
    let mut vertices = vec![center];
    vertices.extend(outline);
    let rim = vertices.len() as u32 - 1;
    let faces = (0..rim).map(|i| vec![0, 1 + i, 1 + (i + 1) % rim]).collect();
    ShapeTemplate {
        vertices,
        faces,
        uvs: Vec::new(),
    }
}
