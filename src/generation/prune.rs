//! Pruning against the envelope: stems are shortened until their replayed path fits

use crate::core::types::{Result, Vec3};
use crate::generation::build::{apply_split, SplitDraw, StemStart};
use crate::generation::context::GenerationContext;
use crate::generation::shape::{safe_div, shape_ratio};
use crate::generation::stem::StemId;
use crate::generation::tree::Tree;
use crate::math::bezier::helix_step;
use crate::math::Turtle;
use crate::params::{level_index, TreeShape};

/// Length kept per shrink step
const SHRINK_FACTOR: f32 = 0.9;

/// Below this fraction of the starting length a stem is dropped
const MIN_LENGTH_FRACTION: f32 = 0.15;

impl Tree {
    /// Whether `point` lies inside the pruning envelope around the origin
    pub fn point_inside(&self, point: Vec3) -> bool {
        let p = &self.params;
        let dist = (point.x * point.x + point.y * point.y).sqrt();
        let ratio = safe_div(self.tree_scale - point.z, self.tree_scale * (1.0 - p.base_size[0]));
        safe_div(dist, self.tree_scale) < p.prune_width * shape_ratio(p, TreeShape::Envelope, ratio)
    }

    /// Shrink stem `id` until it fits the envelope, then blend by `prune_ratio`.
    ///
    /// The random stream and split errors are rewound after every trial, so
    /// building the stem afterwards draws the same numbers the trials did.
    /// Returns false when the stem is dropped entirely.
    pub(crate) fn prune_stem(
        &mut self,
        ctx: &mut GenerationContext,
        turtle: &Turtle,
        id: StemId,
        state: &StemStart,
    ) -> Result<bool> {
        let start_length = self.stems[id.0].length;
        let rng = ctx.snapshot();
        let split_error = self.split_num_error.clone();
        let prune_ratio = self.params.prune_ratio;

        let mut inside = self.test_stem(ctx, *turtle, id, state);
        while !inside {
            let length = self.stems[id.0].length * SHRINK_FACTOR;
            self.stems[id.0].length = length;

            if start_length <= 0.0 || length < MIN_LENGTH_FRACTION * start_length {
                if prune_ratio < 1.0 {
                    self.stems[id.0].length = 0.0;
                    break;
                }
                return Ok(false);
            }

            ctx.restore(&rng);
            self.split_num_error.clone_from(&split_error);
            inside = self.test_stem(ctx, *turtle, id, state);
        }

        let fitted = self.stems[id.0].length;
        self.stems[id.0].length = start_length * (1.0 - prune_ratio) + fitted * prune_ratio;
        let radius = self.calc_stem_radius(&self.stems[id.0]);
        self.stems[id.0].radius = radius;

        ctx.restore(&rng);
        self.split_num_error = split_error;
        Ok(true)
    }

    /// Replay the walk of stem `id` without emitting anything.
    ///
    /// Draws the same random numbers in the same order as the builder up to
    /// the last segment. Base segments of the trunk are not checked.
    fn test_stem(&mut self, ctx: &mut GenerationContext, mut turtle: Turtle, id: StemId, state: &StemStart) -> bool {
        let stem = &self.stems[id.0];
        let depth = stem.depth;
        let length = stem.length;
        let d = level_index(depth);
        let d1 = level_index(depth + 1);
        let curve_res = self.params.curve_res_at(depth);
        let seg_length = length / curve_res as f32;
        let base_seg = self.base_segment();
        let check_points = !(depth == 0 && state.start < base_seg);

        let mut clone_prob = state.clone_prob;
        let mut split_corr_angle = state.split_corr_angle;

        if !self.is_leaf_level(depth) {
            // Child count, unused here
            self.calc_branch_count(ctx, &self.stems[id.0]);
        }

        if self.params.rotate[d1] >= 0.0 {
            // Start rotation, unused here
            ctx.rand_in_range(0.0, 360.0);
        }

        let helix = if self.params.curve_v[d] < 0.0 {
            Some(self.helix_setup(ctx, &mut turtle, depth, length))
        } else {
            None
        };

        let mut previous = turtle.pos;
        for seg in state.start..=curve_res {
            let remaining_segs = (curve_res + 1 - seg) as f32;

            if let Some(helix) = &helix {
                turtle.pos = match seg {
                    0 => turtle.pos,
                    1 => helix.p2 + turtle.pos,
                    _ => helix_step(helix.p2, helix.axis, (seg - 1) as f32) + previous,
                };
                previous = turtle.pos;
                continue;
            }

            if seg != state.start {
                turtle.move_forward(seg_length);
                if check_points && !self.point_inside(turtle.pos) {
                    return false;
                }
            }

            if seg <= state.start {
                continue;
            }

            let split = self.draw_split(ctx, depth, seg, base_seg, &mut clone_prob);
            let num_splits = split.count();
            if num_splits > 0 {
                let is_base_split = matches!(split, SplitDraw::Base(_));
                let angles = self.draw_split_angles(ctx, depth, turtle.dir, remaining_segs);
                split_corr_angle = angles.correction;
                apply_split(&mut turtle, &angles, num_splits, is_base_split);
            } else {
                self.apply_curvature(ctx, &mut turtle, depth, seg, split_corr_angle);
            }
            turtle.apply_tropism(self.params.tropism_at(depth));
        }

        self.point_inside(turtle.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::construct;
    use crate::generation::stem::Stem;
    use crate::params::TreeParams;

    fn pruned(prune_ratio: f32, prune_width: f32) -> TreeParams {
        let mut params = TreeParams::default();
        params.levels = 2;
        params.base_splits = 0;
        params.seg_splits = [0.0; 4];
        params.prune_ratio = prune_ratio;
        params.prune_width = prune_width;
        params
    }

    #[test]
    fn test_point_inside_envelope() {
        let mut tree = Tree::new(TreeParams::default(), false);
        tree.tree_scale = 10.0;
        // Widest at the peak, halfway up the crown
        assert!(tree.point_inside(Vec3::new(0.5, 0.0, 6.5)));
        assert!(!tree.point_inside(Vec3::new(8.0, 0.0, 6.5)));
        // Above the top and below the base everything is outside
        assert!(!tree.point_inside(Vec3::new(0.0, 0.0, 11.0)));
        assert!(!tree.point_inside(Vec3::new(0.1, 0.0, 0.5)));
    }

    #[test]
    fn test_fully_pruned_branches_fit_envelope() {
        let mut tree = Tree::new(pruned(1.0, 0.4), false);
        let mut ctx = GenerationContext::new(17);
        tree.make(&mut ctx).unwrap();

        for spline in &tree.levels[1].splines {
            // The attachment point is not replayed
            for point in spline.points.iter().skip(1) {
                assert!(tree.point_inside(point.co), "{:?} outside envelope", point.co);
            }
        }
    }

    #[test]
    fn test_pruned_trunk_tip_fits_envelope() {
        // Non-fan child counts draw before the trunk walk
        let mut params = pruned(1.0, 0.4);
        params.curve_v[0] = 80.0;
        params.bend_v[0] = 60.0;
        params.branches = [1, 5, 0, 0];

        for seed in 1..60 {
            let mut tree = Tree::new(params.clone(), false);
            let mut ctx = GenerationContext::new(seed);
            tree.make(&mut ctx).unwrap();

            if let Some(tip) = tree.levels[0].splines[0].points.last() {
                assert!(tree.point_inside(tip.co), "seed {}: tip {:?} outside envelope", seed, tip.co);
            }
        }
    }

    #[test]
    fn test_pruning_is_deterministic_across_ratios_and_widths() {
        let mut params = TreeParams::balsam_fir();
        params.levels = 2;

        for prune_ratio in [0.1, 0.5, 1.0] {
            for prune_width in [0.01, 0.4, 2.0] {
                params.prune_ratio = prune_ratio;
                params.prune_width = prune_width;

                let a = construct(&params, 8, false);
                let b = construct(&params, 8, false);
                assert_eq!(a, b, "ratio {} width {}", prune_ratio, prune_width);
                assert!(a.error.is_none());
                if prune_width >= 0.4 {
                    assert!(a.stem_count > 1, "ratio {} width {} built no branches", prune_ratio, prune_width);
                }
            }
        }
    }

    #[test]
    fn test_partial_pruning_never_lengthens() {
        let params = pruned(0.5, 0.3);
        let mut tree = Tree::new(params, false);
        tree.tree_scale = 12.0;
        let mut ctx = GenerationContext::new(2);

        let spline = tree.new_spline(0);
        let id = tree.push_stem(Stem::trunk(spline));
        tree.stems[id.0].length = 30.0;
        tree.stems[id.0].radius = 0.4;

        let kept = tree.prune_stem(&mut ctx, &Turtle::new(), id, &StemStart::default()).unwrap();
        assert!(kept);
        let length = tree.stems[id.0].length;
        assert!(length < 30.0 && length >= 15.0, "length {}", length);
    }

    #[test]
    fn test_pruning_rewinds_random_stream() {
        let mut tree = Tree::new(pruned(0.5, 0.3), false);
        tree.tree_scale = 12.0;
        let spline = tree.new_spline(0);
        let id = tree.push_stem(Stem::trunk(spline));
        tree.stems[id.0].length = 30.0;

        let mut ctx = GenerationContext::new(99);
        let mut reference = GenerationContext::new(99);
        tree.prune_stem(&mut ctx, &Turtle::new(), id, &StemStart::default()).unwrap();
        assert_eq!(ctx.random(), reference.random());
    }
}
