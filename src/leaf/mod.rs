//! Leaf placements and their meshes

pub mod shapes;

pub use shapes::{LeafTemplate, ShapeTemplate};

use crate::core::types::{Mat3, Quat, Vec2, Vec3};

/// A template scaled for one tree
#[derive(Debug, Clone, PartialEq)]
pub struct LeafShape {
    pub template: LeafTemplate,
    pub vertices: Vec<Vec3>,
    pub faces: Vec<Vec<u32>>,
    pub uvs: Vec<Vec2>,
}

impl LeafShape {
    /// Select and scale a template.
    ///
    /// `kind` follows [`LeafTemplate::from_code`]. Every vertex is scaled by
    /// `scale * g_scale_factor`, and x additionally by `scale_x`.
    pub fn new(kind: i32, g_scale_factor: f32, scale: f32, scale_x: f32) -> Self {
        let template = LeafTemplate::from_code(kind);
        let ShapeTemplate { vertices, faces, uvs } = template.template();
        let s = scale * g_scale_factor;
        let vertices = vertices
            .into_iter()
            .map(|v| Vec3::new(v.x * s * scale_x, v.y * s, v.z * s))
            .collect();
        Self {
            template,
            vertices,
            faces,
            uvs,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }
}

/// Where a leaf (or blossom) sits on its stem
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leaf {
    pub position: Vec3,
    pub direction: Vec3,
    pub right: Vec3,
}

impl Leaf {
    pub fn new(position: Vec3, direction: Vec3, right: Vec3) -> Self {
        Self {
            position,
            direction,
            right,
        }
    }

    /// Rotation taking template space (+Z blade, +X width) onto this leaf
    fn orientation(&self) -> Mat3 {
        let mut z = self.direction.normalize_or_zero();
        if z == Vec3::ZERO {
            z = Vec3::Z;
        }
        let mut x = (self.right - z * self.right.dot(z)).normalize_or_zero();
        if x == Vec3::ZERO {
            x = z.any_orthonormal_vector();
        }
        Mat3::from_cols(x, z.cross(x), z)
    }

    /// Turn about world Z so the blade faces away from the trunk axis
    fn bend_rotation(&self, bend: f32) -> Quat {
        let normal = self.direction.cross(self.right);
        let theta_pos = self.position.y.atan2(self.position.x);
        let theta_bend = theta_pos - normal.y.atan2(normal.x);
        Quat::from_rotation_z(theta_bend * bend)
    }

    /// Place `shape` at this leaf.
    ///
    /// Face indices are offset by `index * shape.vertex_count()` so meshes of
    /// consecutive leaves can be concatenated into one buffer.
    pub fn mesh(&self, bend: f32, shape: &LeafShape, index: usize) -> (Vec<Vec3>, Vec<Vec<u32>>) {
        let orient = self.orientation();
        let bend_quat = (bend > 0.0).then(|| self.bend_rotation(bend));

        let vertices = shape
            .vertices
            .iter()
            .map(|&v| {
                let mut v = orient * v;
                if let Some(q) = bend_quat {
                    v = q * v;
                }
                v + self.position
            })
            .collect();

        let offset = (index * shape.vertex_count()) as u32;
        let faces = shape
            .faces
            .iter()
            .map(|face| face.iter().map(|&i| i + offset).collect())
            .collect();

        (vertices, faces)
    }
}
