//! Weber & Penn tree parameters and named presets

use serde::{Deserialize, Serialize};

use crate::core::types::Vec3;

/// Number of per-level coefficients carried by every array parameter
pub const PARAM_LEVELS: usize = 4;

/// Index into per-level arrays for a stem depth; depths past 3 reuse level 3
#[inline]
pub fn level_index(depth: usize) -> usize {
    depth.min(PARAM_LEVELS - 1)
}

/// Overall tree silhouette, used for first-level branch lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeShape {
    Conical,
    Spherical,
    Hemispherical,
    Cylindrical,
    TaperedCylindrical,
    Flame,
    InverseConical,
    TendFlame,
    /// Driven by the pruning envelope parameters
    Envelope,
}

impl TreeShape {
    /// Shape for a numeric code; unknown codes fall back to conical
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Spherical,
            2 => Self::Hemispherical,
            3 => Self::Cylindrical,
            4 => Self::TaperedCylindrical,
            5 => Self::Flame,
            6 => Self::InverseConical,
            7 => Self::TendFlame,
            8 => Self::Envelope,
            _ => Self::Conical,
        }
    }

    /// All shapes in code order
    pub fn all() -> [Self; 9] {
        [
            Self::Conical,
            Self::Spherical,
            Self::Hemispherical,
            Self::Cylindrical,
            Self::TaperedCylindrical,
            Self::Flame,
            Self::InverseConical,
            Self::TendFlame,
            Self::Envelope,
        ]
    }
}

/// Parameter set for one tree (field names are the persisted key names)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeParams {
    /// Shape code 0-8, see [`TreeShape`]
    pub shape: u32,
    /// Overall tree size
    pub g_scale: f32,
    /// Maximum variation of `g_scale`
    pub g_scale_v: f32,
    /// Branching depth (trunk counts as level 1)
    pub levels: u32,
    /// Trunk radius to length ratio
    pub ratio: f32,
    /// Radius reduction between levels
    pub ratio_power: f32,
    /// Radius increase at the trunk base
    pub flare: f32,
    /// Trunk splits at the base segment; negative picks up to |n| at random
    pub base_splits: i32,
    /// Unbranched fraction of each stem
    pub base_size: [f32; 4],
    pub down_angle: [f32; 4],
    /// Negative values distribute the down angle along the parent
    pub down_angle_v: [f32; 4],
    /// Rotation between children; negative means alternate about the parent
    pub rotate: [f32; 4],
    pub rotate_v: [f32; 4],
    /// Child count per parent (level 0: trunks from the floor); negative means fan
    pub branches: [i32; 4],
    pub length: [f32; 4],
    pub length_v: [f32; 4],
    /// <1 linear, [1,2) rounded tip, >=2 periodic lobes
    pub taper: [f32; 4],
    /// Dichotomous splits per segment
    pub seg_splits: [f32; 4],
    /// Split angle; negative selects the direct spread mode
    pub split_angle: [f32; 4],
    pub split_angle_v: [f32; 4],
    /// Bevel resolution handed through to curve consumers
    pub bevel_res: [u32; 4],
    /// Segments per stem
    pub curve_res: [u32; 4],
    pub curve: [f32; 4],
    /// Curve variation; negative produces helical stems
    pub curve_v: [f32; 4],
    /// Curve back angle from halfway along the stem (S shapes)
    pub curve_back: [f32; 4],
    pub bend_v: [f32; 4],
    /// 0 alternate .. 1 opposite, >1 whorls of `branch_dist + 1`
    pub branch_dist: [f32; 4],
    pub radius_mod: [f32; 4],
    /// Leaves per deepest stem; negative places a fan at the tip
    pub leaf_blos_num: i32,
    /// Leaf template 1-10, anything else selects elliptic
    pub leaf_shape: u32,
    pub leaf_scale: f32,
    pub leaf_scale_x: f32,
    /// Fraction by which leaves turn toward the light
    pub leaf_bend: f32,
    /// Blossom template 1-3
    pub blossom_shape: u32,
    pub blossom_scale: f32,
    /// Fraction of leaf placements that become blossoms
    pub blossom_rate: f32,
    /// Growth bias; z only applies from the second branch level on
    pub tropism: [f32; 3],
    pub prune_ratio: f32,
    pub prune_width: f32,
    pub prune_width_peak: f32,
    pub prune_power_low: f32,
    pub prune_power_high: f32,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self::quaking_aspen()
    }
}

impl TreeParams {
    /// Quaking aspen, the reference tree of the model
    pub fn quaking_aspen() -> Self {
        Self {
            shape: 7,
            g_scale: 13.0,
            g_scale_v: 3.0,
            levels: 3,
            ratio: 0.015,
            ratio_power: 1.2,
            flare: 0.6,
            base_splits: 0,
            base_size: [0.3, 0.02, 0.02, 0.02],
            down_angle: [0.0, 60.0, 45.0, 45.0],
            down_angle_v: [0.0, -50.0, 10.0, 10.0],
            rotate: [0.0, 140.0, 140.0, 77.0],
            rotate_v: [0.0; 4],
            branches: [1, 50, 30, 10],
            length: [1.0, 0.3, 0.6, 0.0],
            length_v: [0.0; 4],
            taper: [1.0; 4],
            seg_splits: [0.0; 4],
            split_angle: [40.0, 0.0, 0.0, 0.0],
            split_angle_v: [5.0, 0.0, 0.0, 0.0],
            bevel_res: [10; 4],
            curve_res: [5, 5, 3, 1],
            curve: [0.0, -40.0, -40.0, 0.0],
            curve_v: [20.0, 50.0, 75.0, 0.0],
            curve_back: [0.0; 4],
            bend_v: [0.0, 50.0, 0.0, 0.0],
            branch_dist: [0.0; 4],
            radius_mod: [1.0; 4],
            leaf_blos_num: 25,
            leaf_shape: 0,
            leaf_scale: 0.17,
            leaf_scale_x: 1.0,
            leaf_bend: 0.0,
            blossom_shape: 0,
            blossom_scale: 0.0,
            blossom_rate: 0.0,
            tropism: [0.0, 0.0, 0.5],
            prune_ratio: 0.0,
            prune_width: 0.5,
            prune_width_peak: 0.5,
            prune_power_low: 0.5,
            prune_power_high: 0.5,
        }
    }

    /// Black tupelo: four levels, tapered cylindrical crown
    pub fn black_tupelo() -> Self {
        Self {
            shape: 4,
            g_scale: 23.0,
            g_scale_v: 5.0,
            levels: 4,
            ratio: 0.015,
            ratio_power: 1.3,
            flare: 1.0,
            base_size: [0.2, 0.02, 0.02, 0.02],
            down_angle: [0.0, 60.0, 30.0, 45.0],
            down_angle_v: [0.0, -40.0, 10.0, 10.0],
            rotate: [0.0, 140.0, 140.0, 140.0],
            branches: [1, 50, 25, 12],
            length: [1.0, 0.3, 0.6, 0.4],
            length_v: [0.0, 0.05, 0.1, 0.0],
            curve_res: [10, 10, 10, 1],
            curve: [0.0, 0.0, -10.0, 0.0],
            curve_v: [40.0, 90.0, 150.0, 0.0],
            bend_v: [0.0, 0.0, 0.0, 0.0],
            leaf_blos_num: 6,
            leaf_shape: 1,
            leaf_scale: 0.3,
            leaf_scale_x: 0.5,
            leaf_bend: 0.3,
            ..Self::quaking_aspen()
        }
    }

    /// Palm: lobed trunk with a fan of fronds at the top
    pub fn palm() -> Self {
        Self {
            shape: 4,
            g_scale: 12.0,
            g_scale_v: 4.0,
            levels: 2,
            ratio: 0.015,
            ratio_power: 2.0,
            flare: 0.0,
            base_size: [0.95, 0.02, 0.02, 0.02],
            down_angle: [0.0, 70.0, 0.0, 0.0],
            down_angle_v: [0.0, 10.0, 0.0, 0.0],
            rotate: [0.0, 360.0, 0.0, 0.0],
            rotate_v: [0.0, 10.0, 0.0, 0.0],
            branches: [1, -33, 0, 0],
            length: [1.0, 0.4, 0.0, 0.0],
            length_v: [0.0, 0.05, 0.0, 0.0],
            taper: [2.1, 1.0, 1.0, 1.0],
            curve_res: [12, 9, 1, 1],
            curve: [20.0, 50.0, 0.0, 0.0],
            curve_v: [10.0, 20.0, 0.0, 0.0],
            bend_v: [0.0, 0.0, 0.0, 0.0],
            leaf_blos_num: 150,
            leaf_shape: 2,
            leaf_scale: 0.6,
            leaf_scale_x: 0.3,
            leaf_bend: 0.0,
            tropism: [0.0, 0.0, -1.0],
            ..Self::quaking_aspen()
        }
    }

    /// Balsam fir: conical whorled branches pruned to an envelope
    pub fn balsam_fir() -> Self {
        Self {
            shape: 0,
            g_scale: 10.0,
            g_scale_v: 2.0,
            levels: 3,
            ratio: 0.02,
            ratio_power: 1.5,
            flare: 0.4,
            base_size: [0.1, 0.05, 0.05, 0.05],
            down_angle: [0.0, 80.0, 45.0, 45.0],
            down_angle_v: [0.0, -20.0, 10.0, 10.0],
            rotate: [0.0, 40.0, 140.0, 140.0],
            rotate_v: [0.0, 10.0, 0.0, 0.0],
            branches: [1, 90, 20, 0],
            length: [1.0, 0.3, 0.4, 0.0],
            curve_res: [10, 4, 3, 1],
            curve: [0.0, -20.0, 0.0, 0.0],
            curve_v: [10.0, 40.0, 40.0, 0.0],
            bend_v: [0.0, 0.0, 0.0, 0.0],
            branch_dist: [0.0, 3.5, 0.0, 0.0],
            leaf_blos_num: 60,
            leaf_shape: 2,
            leaf_scale: 0.08,
            leaf_scale_x: 0.2,
            tropism: [0.0, 0.0, -0.2],
            prune_ratio: 0.7,
            prune_width: 0.4,
            prune_width_peak: 0.05,
            prune_power_low: 0.8,
            prune_power_high: 1.0,
            ..Self::quaking_aspen()
        }
    }

    /// Params for a named preset
    pub fn from_preset(preset: TreePreset) -> Self {
        match preset {
            TreePreset::QuakingAspen => Self::quaking_aspen(),
            TreePreset::BlackTupelo => Self::black_tupelo(),
            TreePreset::Palm => Self::palm(),
            TreePreset::BalsamFir => Self::balsam_fir(),
        }
    }

    /// Tree shape as an enum
    pub fn tree_shape(&self) -> TreeShape {
        TreeShape::from_code(self.shape)
    }

    /// Number of levels as an index-friendly count (at least 1)
    pub fn level_count(&self) -> usize {
        self.levels.max(1) as usize
    }

    /// Segments for a stem at `depth` (at least 1)
    pub fn curve_res_at(&self, depth: usize) -> usize {
        self.curve_res[level_index(depth)].max(1) as usize
    }

    /// Full tropism vector
    pub fn tropism_vec(&self) -> Vec3 {
        Vec3::from_array(self.tropism)
    }

    /// Tropism applied at `depth`: trunk and first level only feel the horizontal part
    pub fn tropism_at(&self, depth: usize) -> Vec3 {
        let t = self.tropism_vec();
        if depth > 1 { t } else { Vec3::new(t.x, t.y, 0.0) }
    }
}

/// Named parameter presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TreePreset {
    #[default]
    QuakingAspen,
    BlackTupelo,
    Palm,
    BalsamFir,
}

impl TreePreset {
    /// All presets
    pub fn all() -> [Self; 4] {
        [Self::QuakingAspen, Self::BlackTupelo, Self::Palm, Self::BalsamFir]
    }

    /// Snake-case preset name
    pub fn name(self) -> &'static str {
        match self {
            Self::QuakingAspen => "quaking_aspen",
            Self::BlackTupelo => "black_tupelo",
            Self::Palm => "palm",
            Self::BalsamFir => "balsam_fir",
        }
    }

    /// Look up a preset by name (case-insensitive, `-` or `_`)
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace('-', "_");
        Self::all().into_iter().find(|p| p.name() == normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_quaking_aspen() {
        assert_eq!(TreeParams::default(), TreeParams::quaking_aspen());
        assert_eq!(TreeParams::default().tree_shape(), TreeShape::TendFlame);
    }

    #[test]
    fn test_level_index_clamps() {
        assert_eq!(level_index(0), 0);
        assert_eq!(level_index(3), 3);
        assert_eq!(level_index(7), 3);
    }

    #[test]
    fn test_presets_by_name() {
        for preset in TreePreset::all() {
            assert_eq!(TreePreset::from_name(preset.name()), Some(preset));
        }
        assert_eq!(TreePreset::from_name("Balsam-Fir"), Some(TreePreset::BalsamFir));
        assert_eq!(TreePreset::from_name("baobab"), None);
    }

    #[test]
    fn test_preset_character() {
        let palm = TreeParams::palm();
        let fir = TreeParams::balsam_fir();
        // Palm fronds come out as a fan, fir branches in whorls
        assert!(palm.branches[1] < 0);
        assert!(fir.branch_dist[1] > 1.0);
        assert!(fir.prune_ratio > 0.0);
        assert_eq!(TreeParams::black_tupelo().levels, 4);
    }

    #[test]
    fn test_every_preset_fills_every_level() {
        for preset in TreePreset::all() {
            let params = TreeParams::from_preset(preset);
            for seed in [1, 2, 31] {
                let geometry = crate::generation::construct(&params, seed, true);
                assert!(geometry.error.is_none(), "{} seed {}: {:?}", preset.name(), seed, geometry.error);
                assert_eq!(geometry.levels.len(), params.level_count());
                for (depth, level) in geometry.levels.iter().enumerate() {
                    assert!(
                        !level.splines.is_empty(),
                        "{} seed {} has no splines at level {}",
                        preset.name(),
                        seed,
                        depth
                    );
                }
                assert!(geometry.leaf_count > 0, "{} seed {} has no leaves", preset.name(), seed);
            }
        }
    }

    #[test]
    fn test_tropism_at_depth() {
        let mut params = TreeParams::default();
        params.tropism = [0.1, 0.2, 0.5];
        assert_eq!(params.tropism_at(0), Vec3::new(0.1, 0.2, 0.0));
        assert_eq!(params.tropism_at(1), Vec3::new(0.1, 0.2, 0.0));
        assert_eq!(params.tropism_at(2), Vec3::new(0.1, 0.2, 0.5));
    }

    #[test]
    fn test_shape_codes() {
        for (code, shape) in TreeShape::all().into_iter().enumerate() {
            assert_eq!(TreeShape::from_code(code as u32), shape);
        }
        assert_eq!(TreeShape::from_code(42), TreeShape::Conical);
    }
}
