//! Weber & Penn formulas: shape ratio, radius profile, lengths, counts and angles

use crate::generation::context::GenerationContext;
use crate::generation::stem::Stem;
use crate::generation::tree::Tree;
use crate::params::{level_index, TreeParams, TreeShape};

const EPSILON: f32 = 1e-6;

/// `num / den`, or 0 when the denominator vanishes
#[inline]
pub(crate) fn safe_div(num: f32, den: f32) -> f32 {
    if den.abs() < EPSILON { 0.0 } else { num / den }
}

/// Relative size of a stem at `ratio` along its parent, per tree shape.
///
/// Envelope values are 0 outside [0, 1]; every shape stays within [0, 1]
/// for ratios in [0, 1].
pub fn shape_ratio(params: &TreeParams, shape: TreeShape, ratio: f32) -> f32 {
    use std::f32::consts::PI;

    match shape {
        TreeShape::Conical => 0.2 + 0.8 * ratio,
        TreeShape::Spherical => 0.2 + 0.8 * (PI * ratio).sin(),
        TreeShape::Hemispherical => 0.2 + 0.8 * (0.5 * PI * ratio).sin(),
        TreeShape::Cylindrical => 1.0,
        TreeShape::TaperedCylindrical => 0.5 + 0.5 * ratio,
        TreeShape::Flame => {
            if ratio <= 0.7 {
                ratio / 0.7
            } else {
                (1.0 - ratio) / 0.3
            }
        }
        TreeShape::InverseConical => 1.0 - 0.8 * ratio,
        TreeShape::TendFlame => {
            if ratio <= 0.7 {
                0.5 + 0.5 * ratio / 0.7
            } else {
                0.5 + 0.5 * (1.0 - ratio) / 0.3
            }
        }
        TreeShape::Envelope => {
            if !(0.0..=1.0).contains(&ratio) {
                0.0
            } else {
                let peak = 1.0 - params.prune_width_peak;
                if ratio < peak {
                    safe_div(ratio, peak).powf(params.prune_power_high)
                } else {
                    safe_div(1.0 - ratio, peak).powf(params.prune_power_low)
                }
            }
        }
    }
}

/// Stem radius at relative offset `z1` in [0, 1], including taper lobes and trunk flare
pub fn radius_at_offset(params: &TreeParams, stem: &Stem, z1: f32) -> f32 {
    let n_taper = params.taper[level_index(stem.depth)];

    let unit_taper = if n_taper < 1.0 {
        n_taper
    } else if n_taper < 2.0 {
        2.0 - n_taper
    } else {
        0.0
    };
    let taper = stem.radius * (1.0 - unit_taper * z1);

    let mut radius = if n_taper < 1.0 || taper <= 0.0 {
        taper
    } else {
        let z2 = (1.0 - z1) * stem.length;
        let depth = if n_taper < 2.0 || z2 < taper { 1.0 } else { n_taper - 2.0 };
        let z3 = if n_taper < 2.0 {
            z2
        } else {
            (z2 - 2.0 * taper * (z2 / (2.0 * taper) + 0.5).trunc()).abs()
        };
        if n_taper < 2.0 && z3 >= taper {
            taper
        } else {
            let bulge = (taper * taper - (z3 - taper) * (z3 - taper)).max(0.0).sqrt();
            (1.0 - depth) * taper + depth * bulge
        }
    };

    if stem.depth == 0 {
        let y = (1.0 - 8.0 * z1).max(0.0);
        radius *= params.flare * ((100f32.powf(y) - 1.0) / 100.0) + 1.0;
    }
    radius
}

impl Tree {
    pub(crate) fn parent_of(&self, stem: &Stem) -> Option<&Stem> {
        stem.parent.and_then(|id| self.stems.get(id.0))
    }

    /// Length of a new stem; the trunk length is also recorded on the tree
    pub(crate) fn calc_stem_length(&mut self, ctx: &mut GenerationContext, stem: &Stem) -> f32 {
        if stem.depth == 0 {
            let length = self.tree_scale * (self.params.length[0] + ctx.uniform() * self.params.length_v[0]);
            self.trunk_length = length;
            return length.max(0.0);
        }

        let p = &self.params;
        let result = match (stem.depth, self.parent_of(stem)) {
            (1, Some(parent)) => {
                let ratio = safe_div(parent.length - stem.offset, parent.length - self.base_length);
                parent.length * parent.length_child_max * shape_ratio(p, p.tree_shape(), ratio)
            }
            (_, Some(parent)) => parent.length_child_max * (parent.length - 0.7 * stem.offset),
            (_, None) => 0.0,
        };
        result.max(0.0)
    }

    /// Base radius of a stem from its length
    pub(crate) fn calc_stem_radius(&self, stem: &Stem) -> f32 {
        let p = &self.params;
        if stem.depth == 0 {
            return stem.length * p.ratio * p.radius_mod[0];
        }
        let parent_radius = self.parent_of(stem).map_or(0.0, |parent| {
            parent.radius * safe_div(stem.length, parent.length).powf(p.ratio_power)
        });
        (p.radius_mod[level_index(stem.depth)] * parent_radius)
            .max(0.005)
            .min(stem.radius_limit)
    }

    /// Curvature applied at segment `seg`, with an optional S-curve via `curve_back`
    pub(crate) fn calc_curve_angle(&self, ctx: &mut GenerationContext, depth: usize, seg: usize) -> f32 {
        let p = &self.params;
        let d = level_index(depth);
        let curve_res = p.curve_res_at(depth) as f32;
        let mut angle = if p.curve_back[d] == 0.0 {
            p.curve[d] / curve_res
        } else if (seg as f32) < curve_res / 2.0 {
            p.curve[d] / (curve_res / 2.0)
        } else {
            p.curve_back[d] / (curve_res / 2.0)
        };
        angle += ctx.uniform() * (p.curve_v[d] / curve_res);
        angle
    }

    /// Angle between a child and its parent at `stem_offset` along the parent
    pub(crate) fn calc_down_angle(&self, ctx: &mut GenerationContext, stem: &Stem, stem_offset: f32) -> f32 {
        let p = &self.params;
        let d1 = level_index(stem.depth + 1);
        if p.down_angle_v[d1] >= 0.0 {
            p.down_angle[d1] + ctx.uniform() * p.down_angle_v[d1]
        } else {
            let ratio = safe_div(
                stem.length - stem_offset,
                stem.length * (1.0 - p.base_size[level_index(stem.depth)]),
            );
            let angle = p.down_angle[d1]
                + p.down_angle_v[d1] * (1.0 - 2.0 * shape_ratio(p, TreeShape::Conical, ratio));
            angle + ctx.uniform() * (angle * 0.1).abs()
        }
    }

    /// Rotation of the next alternating child about its parent.
    ///
    /// Negative `rotate` alternates sides: `prev` is then a sign multiplier.
    pub(crate) fn calc_rotate_angle(&self, ctx: &mut GenerationContext, level: usize, prev: f32) -> f32 {
        let p = &self.params;
        let d = level_index(level);
        let variation = ctx.uniform() * p.rotate_v[d];
        if p.rotate[d] >= 0.0 {
            (prev + p.rotate[d] + variation).rem_euclid(360.0)
        } else {
            prev * (180.0 + p.rotate[d] + variation)
        }
    }

    /// Leaves for a stem at the deepest level; negative means a fan of that many
    pub(crate) fn calc_leaf_count(&self, stem: &Stem) -> f32 {
        let p = &self.params;
        if p.leaf_blos_num < 0 {
            return p.leaf_blos_num as f32;
        }
        let leaves = p.leaf_blos_num as f32 * safe_div(self.tree_scale, p.g_scale);
        let Some(parent) = self.parent_of(stem) else {
            return 0.0;
        };
        // Degenerate parents get no leaves
        leaves * safe_div(stem.length, parent.length_child_max * parent.length)
    }

    /// Children for a stem; negative means a fan of exactly that many at the tip
    pub(crate) fn calc_branch_count(&self, ctx: &mut GenerationContext, stem: &Stem) -> f32 {
        let p = &self.params;
        let branches = p.branches[level_index(stem.depth + 1)] as f32;
        // Fan counts are absolute
        if branches < 0.0 {
            return branches;
        }
        let result = if stem.depth == 0 {
            branches * (ctx.random() * 0.2 + 0.9)
        } else if let Some(parent) = self.parent_of(stem) {
            if stem.depth == 1 {
                let relative = safe_div(safe_div(stem.length, parent.length), parent.length_child_max);
                branches * (0.2 + 0.8 * relative)
            } else {
                branches * (1.0 - 0.5 * safe_div(stem.offset, parent.length))
            }
        } else {
            0.0
        };
        safe_div(result, 1.0 - p.base_size[level_index(stem.depth)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::stem::{SplineId, StemId};

    fn trunk(length: f32, radius: f32) -> Stem {
        let mut stem = Stem::trunk(SplineId { level: 0, index: 0 });
        stem.length = length;
        stem.radius = radius;
        stem
    }

    fn branch(length: f32, radius: f32) -> Stem {
        let mut stem = Stem::new(1, SplineId { level: 1, index: 0 }, Some(StemId(0)), 1.0, 1.0);
        stem.length = length;
        stem.radius = radius;
        stem
    }

    #[test]
    fn test_shape_ratio_bounds() {
        let params = TreeParams::default();
        for shape in TreeShape::all() {
            for i in 0..=100 {
                let r = i as f32 / 100.0;
                let value = shape_ratio(&params, shape, r);
                assert!(
                    (0.0..=1.0 + 1e-5).contains(&value),
                    "{:?} at {} gave {}",
                    shape,
                    r,
                    value
                );
            }
        }
    }

    #[test]
    fn test_cylindrical_is_constant() {
        let params = TreeParams::default();
        for r in [0.0, 0.3, 0.7, 1.0] {
            assert_eq!(shape_ratio(&params, TreeShape::Cylindrical, r), 1.0);
        }
    }

    #[test]
    fn test_envelope_outside_range_is_zero() {
        let params = TreeParams::default();
        assert_eq!(shape_ratio(&params, TreeShape::Envelope, -0.1), 0.0);
        assert_eq!(shape_ratio(&params, TreeShape::Envelope, 1.1), 0.0);
        // Peaks at 1 - prune_width_peak
        let peak = shape_ratio(&params, TreeShape::Envelope, 1.0 - params.prune_width_peak);
        assert!((peak - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_radius_decreases_for_linear_taper() {
        let mut params = TreeParams::default();
        params.taper = [0.7; 4];
        let stem = branch(5.0, 0.4);
        let mut previous = f32::MAX;
        for i in 0..=20 {
            let r = radius_at_offset(&params, &stem, i as f32 / 20.0);
            assert!(r <= previous, "radius grew at step {}", i);
            previous = r;
        }
    }

    #[test]
    fn test_taper_one_reaches_zero_at_tip() {
        let params = TreeParams::default();
        let stem = branch(5.0, 0.4);
        assert!((radius_at_offset(&params, &stem, 0.0) - 0.4).abs() < 1e-6);
        assert!(radius_at_offset(&params, &stem, 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_periodic_taper_stays_within_base_radius() {
        let mut params = TreeParams::default();
        params.taper = [1.0, 2.5, 1.0, 1.0];
        let stem = branch(2.0, 0.3);
        for i in 0..=50 {
            let r = radius_at_offset(&params, &stem, i as f32 / 50.0);
            assert!(r.is_finite() && r >= 0.0 && r <= 0.3 + 1e-5, "r = {}", r);
        }
    }

    #[test]
    fn test_trunk_flare() {
        let mut params = TreeParams::default();
        params.flare = 0.6;
        let stem = trunk(10.0, 0.5);
        // Full flare at the base, none past an eighth of the trunk
        let base = radius_at_offset(&params, &stem, 0.0);
        assert!((base - 0.5 * (1.0 + 0.6 * 0.99)).abs() < 1e-4);
        let above = radius_at_offset(&params, &stem, 0.2);
        assert!((above - 0.5 * 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_safe_div() {
        assert_eq!(safe_div(1.0, 0.0), 0.0);
        assert_eq!(safe_div(1.0, 4.0), 0.25);
    }
}
