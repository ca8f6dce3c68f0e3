//! Generated tree geometry and its JSON export

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::types::{Result, Vec2, Vec3};
use crate::core::TreeError;
use crate::math::{Aabb, BezierPoint};

/// Current version of the geometry export format
pub const GEOMETRY_VERSION: u32 = 1;

/// One stem or clone as a bezier spline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spline {
    pub points: Vec<BezierPoint>,
}

/// All splines of one branching level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelCurves {
    /// `Trunk`, `Branches1`, `Branches2`, ...
    pub name: String,
    /// Curve resolution for consumers that tessellate the splines
    pub resolution: u32,
    pub bevel_resolution: u32,
    pub splines: Vec<Spline>,
}

impl LevelCurves {
    pub fn new(depth: usize, resolution: u32, bevel_resolution: u32) -> Self {
        let name = if depth == 0 {
            "Trunk".to_string()
        } else {
            format!("Branches{}", depth)
        };
        Self {
            name,
            resolution,
            bevel_resolution,
            splines: Vec::new(),
        }
    }

    /// Total control points over all splines
    pub fn point_count(&self) -> usize {
        self.splines.iter().map(|s| s.points.len()).sum()
    }
}

/// Flat polygon buffers for all leaves (or blossoms) of a tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeafMesh {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<Vec<u32>>,
    /// Per-vertex UVs when the template carries them, otherwise empty
    pub uvs: Vec<Vec2>,
}

impl LeafMesh {
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

/// Everything a generation run produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeGeometry {
    /// Format version for compatibility
    pub version: u32,
    /// Seed actually used
    pub seed: u64,
    pub levels: Vec<LevelCurves>,
    pub leaves: Option<LeafMesh>,
    pub blossoms: Option<LeafMesh>,
    /// Number of leaf placements (leaves plus blossoms)
    pub leaf_count: usize,
    pub stem_count: usize,
    /// Set when generation stopped early; the geometry is what was built so far
    pub error: Option<String>,
}

impl TreeGeometry {
    /// Total control points over all levels
    pub fn point_count(&self) -> usize {
        self.levels.iter().map(LevelCurves::point_count).sum()
    }

    /// Bounds of every control point
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(
            self.levels
                .iter()
                .flat_map(|level| level.splines.iter())
                .flat_map(|spline| spline.points.iter().map(|p| p.co)),
        )
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON, checking the format version
    pub fn from_json_str(json: &str) -> Result<Self> {
        let geometry: TreeGeometry = serde_json::from_str(json)?;
        if geometry.version != GEOMETRY_VERSION {
            return Err(TreeError::InvalidParam {
                key: "version".to_string(),
                reason: format!(
                    "geometry version mismatch: expected {}, got {}",
                    GEOMETRY_VERSION, geometry.version
                ),
            });
        }
        Ok(geometry)
    }

    /// Save to file (sync)
    pub fn save_sync(&self, path: &Path) -> Result<()> {
        let json = self.to_json_string()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from file (sync)
    pub fn load_sync(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> TreeGeometry {
        let mut trunk = LevelCurves::new(0, 5, 10);
        trunk.splines.push(Spline {
            points: vec![BezierPoint::at(Vec3::ZERO), BezierPoint::at(Vec3::new(1.0, 2.0, 8.0))],
        });
        TreeGeometry {
            version: GEOMETRY_VERSION,
            seed: 42,
            levels: vec![trunk, LevelCurves::new(1, 5, 10)],
            leaves: None,
            blossoms: None,
            leaf_count: 0,
            stem_count: 1,
            error: None,
        }
    }

    #[test]
    fn test_level_names() {
        assert_eq!(LevelCurves::new(0, 1, 1).name, "Trunk");
        assert_eq!(LevelCurves::new(2, 1, 1).name, "Branches2");
    }

    #[test]
    fn test_bounds_and_counts() {
        let geometry = sample();
        assert_eq!(geometry.point_count(), 2);
        let bounds = geometry.bounds().unwrap();
        assert_eq!(bounds.max, Vec3::new(1.0, 2.0, 8.0));
    }

    #[test]
    fn test_geometry_persistence() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("out").join("tree.json");

        let geometry = sample();
        geometry.save_sync(&path).expect("save failed");
        let loaded = TreeGeometry::load_sync(&path).expect("load failed");
        assert_eq!(loaded, geometry);
    }

    #[test]
    fn test_version_mismatch() {
        let mut geometry = sample();
        geometry.version = GEOMETRY_VERSION + 1;
        let json = serde_json::to_string(&geometry).unwrap();
        assert!(TreeGeometry::from_json_str(&json).is_err());
    }
}
