//! Child placement along a parent segment: fans, whorls and alternate/opposite pairs

use crate::core::types::{Result, Vec3};
use crate::generation::build::StemStart;
use crate::generation::context::GenerationContext;
use crate::generation::shape::{radius_at_offset, safe_div};
use crate::generation::stem::{Stem, StemId};
use crate::generation::tree::Tree;
use crate::leaf::Leaf;
use crate::math::{point_on_bezier, tangent_on_bezier, BezierPoint, Turtle};
use crate::params::level_index;

/// How the children of one segment are arranged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BranchMode {
    /// All at the tip, spread across `rotate` degrees
    Fan { index: usize, count: usize },
    /// Evenly around the stem at one offset
    Whorled { index: usize, count: usize },
    /// One at a time, rotating by `rotate` each
    AlternateOpposite,
}

/// A child ready to be built: where it attaches and which way it grows
#[derive(Debug, Clone, Copy)]
struct BranchPlacement {
    /// On the parent surface, pointing outward
    pos_turtle: Turtle,
    dir_turtle: Turtle,
    radius_limit: f32,
    /// Distance along the parent
    stem_offset: f32,
}

impl Tree {
    /// Place `count` children (or leaves) on segment `seg` of stem `id`.
    ///
    /// Negative counts are fans at the tip. Every placement is drawn before
    /// any child is built.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn make_branches(
        &mut self,
        ctx: &mut GenerationContext,
        turtle: &Turtle,
        id: StemId,
        seg: usize,
        count: i32,
        prev_rotation: &mut f32,
        is_leaves: bool,
    ) -> Result<()> {
        let stem = self.stems[id.0].clone();
        let (start_point, end_point) = {
            let points = self.points(stem.spline);
            match points {
                [.., start, end] => (*start, *end),
                _ => return Ok(()),
            }
        };

        let d = level_index(stem.depth);
        let d1 = level_index(stem.depth + 1);
        let mut placements = Vec::new();

        if count < 0 {
            let count = count.unsigned_abs() as usize;
            for index in 0..count {
                placements.push(self.set_up_branch(
                    ctx,
                    turtle,
                    &stem,
                    BranchMode::Fan { index, count },
                    1.0,
                    (&start_point, &end_point),
                    1.0,
                    prev_rotation,
                )?);
            }
        } else {
            let base_length = stem.length * self.params.base_size[d];
            let branch_dist = self.params.branch_dist[d1];
            let curve_res = self.params.curve_res_at(stem.depth) as f32;
            let stem_offset_at = |offset: f32| ((seg as f32 - 1.0 + offset) / curve_res) * stem.length;

            if branch_dist > 1.0 {
                // Rounds to whole whorls rather than the exact count
                let whorls = (count as f32 / (branch_dist + 1.0)) as usize;
                let per_whorl = branch_dist + 1.0;
                let mut whorl_error = 0.0;

                for whorl in 0..whorls {
                    let offset = (whorl as f32 / whorls as f32).clamp(0.0, 1.0);
                    let stem_offset = stem_offset_at(offset);

                    if stem_offset > base_length {
                        let in_whorl = (per_whorl + whorl_error).trunc();
                        whorl_error -= in_whorl - per_whorl;
                        let in_whorl = in_whorl as usize;
                        for index in 0..in_whorl {
                            placements.push(self.set_up_branch(
                                ctx,
                                turtle,
                                &stem,
                                BranchMode::Whorled { index, count: in_whorl },
                                offset,
                                (&start_point, &end_point),
                                stem_offset,
                                prev_rotation,
                            )?);
                        }
                    }

                    *prev_rotation += self.params.rotate[d1];
                }
            } else {
                let n = count as f32;
                for index in 0..count as usize {
                    let along = if index % 2 == 0 { index as f32 } else { index as f32 - branch_dist };
                    let offset = (along / n).clamp(0.0, 1.0);
                    let stem_offset = stem_offset_at(offset);

                    if stem_offset > base_length {
                        placements.push(self.set_up_branch(
                            ctx,
                            turtle,
                            &stem,
                            BranchMode::AlternateOpposite,
                            offset,
                            (&start_point, &end_point),
                            stem_offset,
                            prev_rotation,
                        )?);
                    }
                }
            }
        }

        if is_leaves {
            self.leaves.extend(
                placements
                    .iter()
                    .map(|b| Leaf::new(b.pos_turtle.pos, b.dir_turtle.dir, b.dir_turtle.right)),
            );
            return Ok(());
        }

        let depth = stem.depth + 1;
        for placement in placements {
            let spline = self.new_spline(depth);
            let child = self.push_stem(Stem::new(
                depth,
                spline,
                Some(id),
                placement.stem_offset,
                placement.radius_limit,
            ));
            self.build_stem(
                ctx,
                placement.dir_turtle,
                child,
                StemStart::default(),
                Some(placement.pos_turtle),
                None,
            )?;
        }
        Ok(())
    }

    /// Orient one child: rotation about the parent, position on its surface, then down angle
    #[allow(clippy::too_many_arguments)]
    fn set_up_branch(
        &self,
        ctx: &mut GenerationContext,
        turtle: &Turtle,
        stem: &Stem,
        mode: BranchMode,
        offset: f32,
        (start_point, end_point): (&BezierPoint, &BezierPoint),
        stem_offset: f32,
        prev_rotation: &mut f32,
    ) -> Result<BranchPlacement> {
        let p = &self.params;
        let d1 = level_index(stem.depth + 1);
        let helix = p.curve_v[level_index(stem.depth)] < 0.0;
        let mut dir_turtle = branch_dir_turtle(turtle, helix, offset, start_point, end_point)?;

        let (radius_limit, surface_offset) = match mode {
            BranchMode::Fan { index, count } => {
                let angle = if count > 1 {
                    p.rotate[d1] * (index as f32 / (count - 1) as f32 - 0.5) + ctx.uniform() * p.rotate_v[d1]
                } else {
                    0.0
                };
                dir_turtle.turn_right(angle);
                // Fans sprout from the tip center, limited by the parent's base radius
                (stem.radius, 0.0)
            }
            BranchMode::Whorled { index, count } => {
                let angle = *prev_rotation + 360.0 * index as f32 / count as f32 + ctx.uniform() * p.rotate_v[d1];
                dir_turtle.roll_right(angle);
                let limit = radius_at_offset(p, stem, safe_div(stem_offset, stem.length));
                (limit, limit)
            }
            BranchMode::AlternateOpposite => {
                let angle = self.calc_rotate_angle(ctx, stem.depth + 1, *prev_rotation);
                *prev_rotation = if p.rotate[d1] >= 0.0 { angle } else { -*prev_rotation };
                dir_turtle.roll_right(angle);
                let limit = radius_at_offset(p, stem, safe_div(stem_offset, stem.length));
                (limit, limit)
            }
        };

        dir_turtle.pos = point_on_bezier(offset, start_point, end_point)?;
        let mut pos_turtle = dir_turtle;
        pos_turtle.pitch_down(90.0);
        pos_turtle.move_forward(surface_offset);

        let down_angle = self.calc_down_angle(ctx, stem, stem_offset);
        dir_turtle.pitch_down(down_angle);

        Ok(BranchPlacement {
            pos_turtle,
            dir_turtle,
            radius_limit,
            stem_offset,
        })
    }
}

/// Heading along the parent tangent at `offset`, with right kept in the parent's bending plane
fn branch_dir_turtle(
    turtle: &Turtle,
    helix: bool,
    offset: f32,
    start_point: &BezierPoint,
    end_point: &BezierPoint,
) -> Result<Turtle> {
    let mut dir_turtle = Turtle::new();
    let tangent = tangent_on_bezier(offset, start_point, end_point)?.normalize_or_zero();
    dir_turtle.dir = if tangent == Vec3::ZERO { turtle.dir } else { tangent };

    let right = if helix {
        let ahead = tangent_on_bezier((offset + 0.0001).min(1.0), start_point, end_point)?.normalize_or_zero();
        dir_turtle.dir.cross(ahead)
    } else {
        turtle.dir.cross(turtle.right).cross(dir_turtle.dir)
    };
    let right = right.normalize_or_zero();
    dir_turtle.right = if right == Vec3::ZERO {
        dir_turtle.dir.any_orthonormal_vector()
    } else {
        right
    };
    Ok(dir_turtle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::TreeParams;

    fn two_levels() -> TreeParams {
        let mut params = TreeParams::default();
        params.levels = 2;
        params.base_splits = 0;
        params.seg_splits = [0.0; 4];
        params
    }

    fn build(params: TreeParams, leaves: bool, seed: u64) -> Tree {
        let mut tree = Tree::new(params, leaves);
        let mut ctx = GenerationContext::new(seed);
        tree.make(&mut ctx).expect("generation failed");
        tree
    }

    #[test]
    fn test_fan_branches_at_trunk_tip() {
        let mut params = two_levels();
        params.branches = [1, -6, 0, 0];
        let tree = build(params, false, 21);
        assert_eq!(tree.levels[1].splines.len(), 6);

        // All fan children start near the trunk tip
        let trunk = &tree.levels[0].splines[0].points;
        let tip = trunk[trunk.len() - 1].co;
        let trunk_radius = tree.stems[0].radius;
        for spline in &tree.levels[1].splines {
            if let Some(first) = spline.points.first() {
                assert!((first.co - tip).length() <= trunk_radius + 1e-3);
            }
        }
    }

    #[test]
    fn test_fan_leaves_are_exact() {
        let mut params = two_levels();
        params.branches = [1, 8, 0, 0];
        params.leaf_blos_num = -12;
        let tree = build(params, true, 4);

        let leafy = tree.levels[1].splines.iter().filter(|s| !s.points.is_empty()).count();
        assert!(leafy > 0);
        assert_eq!(tree.leaves().len(), 12 * leafy);
    }

    #[test]
    fn test_whorls_come_in_groups() {
        let mut params = two_levels();
        params.branch_dist = [0.0, 3.0, 0.0, 0.0];
        let tree = build(params, false, 13);
        let children = tree.levels[1].splines.len();
        assert!(children > 0);
        assert_eq!(children % 4, 0);
    }

    #[test]
    fn test_children_start_above_base() {
        let params = two_levels();
        let tree = build(params, false, 8);
        let base_length = tree.base_length;
        for stem in tree.stems.iter().filter(|s| s.depth == 1) {
            assert!(stem.offset > base_length);
        }
    }

    #[test]
    fn test_branch_dir_turtle_is_orthonormal() {
        let start = BezierPoint {
            co: Vec3::ZERO,
            handle_left: Vec3::new(0.0, 0.0, -0.5),
            handle_right: Vec3::new(0.0, 0.0, 0.5),
            radius: 1.0,
        };
        let end = BezierPoint {
            co: Vec3::new(0.0, 1.0, 2.0),
            handle_left: Vec3::new(0.0, 0.5, 1.5),
            handle_right: Vec3::new(0.0, 1.5, 2.5),
            radius: 0.5,
        };
        let turtle = Turtle::new();
        for helix in [false, true] {
            for offset in [0.0, 0.3, 1.0] {
                let t = branch_dir_turtle(&turtle, helix, offset, &start, &end).unwrap();
                assert!((t.dir.length() - 1.0).abs() < 1e-4);
                assert!((t.right.length() - 1.0).abs() < 1e-4);
            }
        }
        // In the bending plane the right vector stays perpendicular to the heading
        let t = branch_dir_turtle(&turtle, false, 0.5, &start, &end).unwrap();
        assert!(t.dir.dot(t.right).abs() < 1e-4);
    }
}
