//! Stem records kept in an arena owned by the tree

/// Index of a stem in [`super::Tree`]'s arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StemId(pub usize);

/// Location of a spline: level container and index within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SplineId {
    pub level: usize,
    pub index: usize,
}

/// One stem (trunk, branch or clone)
#[derive(Debug, Clone, PartialEq)]
pub struct Stem {
    pub depth: usize,
    pub spline: SplineId,
    pub parent: Option<StemId>,
    /// Distance along the parent where this stem starts
    pub offset: f32,
    /// Parent radius at the attachment point; negative means unconstrained
    pub radius_limit: f32,
    pub length: f32,
    pub radius: f32,
    /// Maximum relative length of children
    pub length_child_max: f32,
}

impl Stem {
    pub fn new(depth: usize, spline: SplineId, parent: Option<StemId>, offset: f32, radius_limit: f32) -> Self {
        Self {
            depth,
            spline,
            parent,
            offset,
            radius_limit,
            length: 0.0,
            radius: 0.0,
            length_child_max: 0.0,
        }
    }

    /// A trunk stem
    pub fn trunk(spline: SplineId) -> Self {
        Self::new(0, spline, None, 0.0, -1.0)
    }

    /// Copy of this stem drawing into another spline
    pub fn clone_into(&self, spline: SplineId) -> Self {
        Self { spline, ..self.clone() }
    }

    /// Too thin to be visible
    pub fn is_negligible(&self) -> bool {
        (0.0..0.0001).contains(&self.radius_limit)
    }
}
