//! Recursive stem construction: points, splits, clones, curvature and resampling
//!
//! A stem is walked segment by segment with a turtle. Each segment emits one
//! bezier point, may spawn children (or leaves) along the segment just drawn,
//! may split the stem into clones, and finally bends the turtle for the next
//! segment. Clones continue from the split segment with their own spline;
//! children start a fresh stem one level deeper.

use std::f32::consts::TAU;

use crate::core::types::{Result, Vec3};
use crate::core::TreeError;
use crate::generation::context::GenerationContext;
use crate::generation::shape::radius_at_offset;
use crate::generation::stem::StemId;
use crate::generation::tree::Tree;
use crate::math::bezier::{helix_points, helix_step, HelixPoints};
use crate::math::{declination, point_on_bezier, tangent_on_bezier, BezierPoint, Turtle};
use crate::params::level_index;

/// Where a stem walk starts and the split state it inherits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StemStart {
    /// First segment; non-zero for clones
    pub start: usize,
    /// Per-segment pitch that cancels the split angle over the rest of the stem
    pub split_corr_angle: f32,
    /// Scales the branch count of clones
    pub num_branches_factor: f32,
    /// Probability of further segment splits
    pub clone_prob: f32,
}

impl Default for StemStart {
    fn default() -> Self {
        Self {
            start: 0,
            split_corr_angle: 0.0,
            num_branches_factor: 1.0,
            clone_prob: 1.0,
        }
    }
}

/// Outcome of the split draw at one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SplitDraw {
    None,
    /// Trunk split at the base segment
    Base(usize),
    /// Regular `seg_splits` split
    Segment(usize),
}

impl SplitDraw {
    pub(crate) fn count(self) -> usize {
        match self {
            SplitDraw::None => 0,
            SplitDraw::Base(n) | SplitDraw::Segment(n) => n,
        }
    }
}

/// Angles for one split
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SplitAngles {
    /// Pitch away from the stem axis, shared by the stem and its clones
    pub split: f32,
    /// Spread between the stem and its clones
    pub spread: f32,
    /// Correction pitch per remaining segment
    pub correction: f32,
    /// Spread by turning in the turtle's own plane instead of about world Z
    pub direct: bool,
}

impl Tree {
    /// Segment at which the trunk may split at its base
    pub(crate) fn base_segment(&self) -> usize {
        let p = &self.params;
        (p.base_size[0] * p.curve_res[0].max(1) as f32).ceil() as usize
    }

    /// Whether stems at `depth` carry leaves instead of child stems
    pub(crate) fn is_leaf_level(&self, depth: usize) -> bool {
        depth + 1 == self.params.level_count() && depth > 0 && self.params.leaf_blos_num != 0
    }

    /// Helix parameters for a stem with negative `curve_v`; tropism is applied first
    pub(crate) fn helix_setup(
        &self,
        ctx: &mut GenerationContext,
        turtle: &mut Turtle,
        depth: usize,
        length: f32,
    ) -> HelixPoints {
        let p = &self.params;
        let curve_res = p.curve_res_at(depth) as f32;
        let incline = p.curve_v[level_index(depth)].abs().min(89.0);
        let tan_ang = (90.0 - incline).to_radians().tan();
        let pitch = 2.0 * length / curve_res * ctx.rand_in_range(0.8, 1.2);
        let radius = 3.0 * pitch / (16.0 * tan_ang) * ctx.rand_in_range(0.8, 1.2);

        turtle.apply_tropism(p.tropism_at(depth));

        let spin = ctx.rand_in_range(0.0, TAU);
        helix_points(turtle, radius, pitch, spin)
    }

    /// Number of clones to split into at `seg`, updating the split error
    pub(crate) fn draw_split(
        &mut self,
        ctx: &mut GenerationContext,
        depth: usize,
        seg: usize,
        base_seg: usize,
        clone_prob: &mut f32,
    ) -> SplitDraw {
        let p = &self.params;
        let curve_res = p.curve_res_at(depth);
        let seg_splits = p.seg_splits[level_index(depth)];

        if depth == 0 && seg == base_seg && p.base_splits != 0 {
            let n = if p.base_splits < 0 {
                // Random count up to |base_splits|
                (ctx.random() * (p.base_splits.unsigned_abs() as f32 + 0.5)) as usize
            } else {
                p.base_splits as usize
            };
            return SplitDraw::Base(n);
        }

        if seg_splits > 0.0 && seg < curve_res && (depth > 0 || seg > base_seg) && ctx.random() <= *clone_prob {
            let error = &mut self.split_num_error[depth];
            let n = (seg_splits + *error).trunc();
            *error -= n - seg_splits;
            *clone_prob /= n + 1.0;
            return SplitDraw::Segment(n.max(0.0) as usize);
        }

        SplitDraw::None
    }

    /// Split and spread angles for the current heading
    pub(crate) fn draw_split_angles(
        &self,
        ctx: &mut GenerationContext,
        depth: usize,
        dir: Vec3,
        remaining_segs: f32,
    ) -> SplitAngles {
        let p = &self.params;
        let d = level_index(depth);
        if p.split_angle[d] < 0.0 {
            SplitAngles {
                split: 0.0,
                spread: p.split_angle[d].abs() + ctx.uniform() * p.split_angle_v[d],
                correction: 0.0,
                direct: true,
            }
        } else {
            let decl = declination(dir);
            let split = (p.split_angle[d] + ctx.uniform() * p.split_angle_v[d] - decl).max(0.0);
            let r = ctx.random();
            SplitAngles {
                split,
                spread: -(20.0 + 0.75 * (30.0 + (decl - 90.0).abs() * r * r)),
                correction: split / remaining_segs,
                direct: false,
            }
        }
    }

    /// Random bend plus curvature for the next segment
    pub(crate) fn apply_curvature(
        &self,
        ctx: &mut GenerationContext,
        turtle: &mut Turtle,
        depth: usize,
        seg: usize,
        split_corr_angle: f32,
    ) {
        let curve_res = self.params.curve_res_at(depth) as f32;
        turtle.turn_left(ctx.uniform() * self.params.bend_v[level_index(depth)] / curve_res);
        let curve_angle = self.calc_curve_angle(ctx, depth, seg);
        turtle.pitch_down(curve_angle - split_corr_angle);
    }

    /// Walk one stem, emitting its points and recursing into clones and children.
    ///
    /// `pos_corr_turtle` sits on the parent's surface and pulls the start
    /// back by this stem's radius; `cloned_turtle` is the heading of the stem
    /// a clone split from.
    pub(crate) fn build_stem(
        &mut self,
        ctx: &mut GenerationContext,
        mut turtle: Turtle,
        id: StemId,
        mut state: StemStart,
        pos_corr_turtle: Option<Turtle>,
        cloned_turtle: Option<Turtle>,
    ) -> Result<()> {
        if self.stems[id.0].is_negligible() {
            return Ok(());
        }

        self.report_stem_progress(ctx);

        let depth = self.stems[id.0].depth;
        let d = level_index(depth);
        let d1 = level_index(depth + 1);

        if state.start == 0 {
            let p = &self.params;
            let length_child_max = p.length[d1] + ctx.uniform() * p.length_v[d1];
            self.stems[id.0].length_child_max = length_child_max;

            let stem = self.stems[id.0].clone();
            let length = self.calc_stem_length(ctx, &stem);
            self.stems[id.0].length = length;
            let radius = self.calc_stem_radius(&self.stems[id.0]);
            self.stems[id.0].radius = radius;

            if depth == 0 {
                self.base_length = length * self.params.base_size[0];
            }
        }

        if let Some(mut pos_turtle) = pos_corr_turtle {
            let stem = &self.stems[id.0];
            pos_turtle.move_forward(-stem.radius.min(stem.radius_limit));
            turtle.pos = pos_turtle.pos;
        }

        if cloned_turtle.is_none() && self.params.prune_ratio > 0.0 && !self.prune_stem(ctx, &turtle, id, &state)? {
            log::debug!("Stem {} pruned away", id.0);
            return Ok(());
        }

        let p = &self.params;
        let levels = p.level_count();
        let curve_res = p.curve_res_at(depth);
        let res = curve_res as f32;
        let length = self.stems[id.0].length;
        let seg_length = length / res;
        let handle_length = length / (res * 3.0);
        let base_seg = self.base_segment();
        let start_fraction = 1.0 - state.start as f32 / res;

        let stem = self.stems[id.0].clone();
        let (mut branch_count, leaf_count) = if self.is_leaf_level(depth) {
            let count = self.calc_leaf_count(&stem);
            // Fan counts are absolute
            let count = if count > 0.0 { count * start_fraction } else { count };
            (0.0, count)
        } else {
            let count = self.calc_branch_count(ctx, &stem);
            let count = if count > 0.0 {
                count * start_fraction * state.num_branches_factor
            } else {
                count
            };
            (count, 0.0)
        };
        let mut f_branches_on_seg = branch_count / res;
        let f_leaves_on_seg = leaf_count / res;

        let max_points_per_seg = (100.0 / res).max(1.0).ceil() as usize;

        let mut branch_num_error = 0.0;
        let mut leaf_num_error = 0.0;

        let mut prev_rotation_angle = if self.params.rotate[d1] >= 0.0 {
            ctx.rand_in_range(0.0, 360.0)
        } else {
            // Sign multiplier for alternating sides
            1.0
        };

        let helix = if self.params.curve_v[d] < 0.0 {
            Some(self.helix_setup(ctx, &mut turtle, depth, length))
        } else {
            None
        };

        let mut resampled: Option<(usize, usize)> = None;

        for seg in state.start..=curve_res {
            let remaining_segs = (curve_res + 1 - seg) as f32;

            match &helix {
                Some(helix) => self.place_helix_point(&mut turtle, id, seg, helix),
                None => {
                    if seg != state.start {
                        turtle.move_forward(seg_length);
                    }
                    let handle_dir = match cloned_turtle {
                        Some(cloned) if seg == state.start => cloned.dir,
                        _ => turtle.dir,
                    };
                    self.points_mut(stem.spline).push(BezierPoint {
                        co: turtle.pos,
                        handle_left: turtle.pos - handle_dir * handle_length,
                        handle_right: turtle.pos + handle_dir * handle_length,
                        radius: 0.0,
                    });
                }
            }

            let radius = radius_at_offset(&self.params, &stem, seg as f32 / res);
            if let Some(point) = self.points_mut(stem.spline).last_mut() {
                point.radius = radius;
            }

            if seg <= state.start {
                continue;
            }

            let split = if helix.is_none() {
                self.draw_split(ctx, depth, seg, base_seg, &mut state.clone_prob)
            } else {
                SplitDraw::None
            };
            if let SplitDraw::Segment(n) = split {
                let divisor = n as f32 + 1.0;
                state.num_branches_factor = (state.num_branches_factor / divisor).max(0.8);
                if branch_count > 0.0 {
                    branch_count *= state.num_branches_factor;
                    f_branches_on_seg = branch_count / res;
                }
            }

            // Children never disturb this stem's random stream
            let snapshot = ctx.snapshot();
            if branch_count != 0.0 && depth + 1 < levels {
                let branches_on_seg = if branch_count < 0.0 {
                    if seg == curve_res { branch_count as i32 } else { 0 }
                } else {
                    let n = (f_branches_on_seg + branch_num_error).trunc();
                    branch_num_error -= n - f_branches_on_seg;
                    n as i32
                };
                if branches_on_seg != 0 {
                    self.make_branches(ctx, &turtle, id, seg, branches_on_seg, &mut prev_rotation_angle, false)?;
                }
            } else if leaf_count != 0.0 && depth > 0 {
                let leaves_on_seg = if leaf_count < 0.0 {
                    if seg == curve_res { leaf_count as i32 } else { 0 }
                } else {
                    let n = (f_leaves_on_seg + leaf_num_error).trunc();
                    leaf_num_error -= n - f_leaves_on_seg;
                    n as i32
                };
                if leaves_on_seg != 0 {
                    self.make_branches(ctx, &turtle, id, seg, leaves_on_seg, &mut prev_rotation_angle, true)?;
                }
            }
            ctx.restore(&snapshot);

            if helix.is_none() {
                let num_splits = split.count();
                if num_splits > 0 {
                    let is_base_split = matches!(split, SplitDraw::Base(_));
                    let angles = self.draw_split_angles(ctx, depth, turtle.dir, remaining_segs);
                    state.split_corr_angle = angles.correction;

                    let snapshot = ctx.snapshot();
                    self.make_clones(ctx, &turtle, id, seg, &state, num_splits, &angles, is_base_split)?;
                    ctx.restore(&snapshot);

                    apply_split(&mut turtle, &angles, num_splits, is_base_split);
                } else {
                    self.apply_curvature(ctx, &mut turtle, depth, seg, state.split_corr_angle);
                }

                turtle.apply_tropism(self.params.tropism_at(depth));
            }

            if self.needs_resampling(depth, seg, max_points_per_seg) {
                let (first, last) = self.increase_bezier_point_res(id, seg, max_points_per_seg)?;
                resampled = Some(match resampled {
                    Some((from, _)) => (from, last),
                    None => (first, last),
                });
            }
        }

        if let Some((from, to)) = resampled {
            scale_handles(&mut self.points_mut(stem.spline)[from..=to], max_points_per_seg as f32);
        }

        self.stem_index += 1;
        Ok(())
    }

    /// Emit the helix point for `seg` and move the turtle onto it
    fn place_helix_point(&mut self, turtle: &mut Turtle, id: StemId, seg: usize, helix: &HelixPoints) {
        let spline = self.stems[id.0].spline;
        let pos = turtle.pos;
        let point = match seg {
            0 => BezierPoint {
                co: pos,
                handle_left: pos,
                handle_right: helix.p0 + pos,
                radius: 0.0,
            },
            1 => {
                let co = helix.p2 + pos;
                let handle_left = helix.p1 + pos;
                BezierPoint {
                    co,
                    handle_left,
                    handle_right: 2.0 * co - handle_left,
                    radius: 0.0,
                }
            }
            _ => {
                let half_turns = (seg - 1) as f32;
                let prev = self.points(spline).last().map_or(pos, |p| p.co);
                let co = helix_step(helix.p2, helix.axis, half_turns) + prev;
                let dif = helix_step(helix.p2 - helix.p1, helix.axis, half_turns);
                let handle_left = co - dif;
                BezierPoint {
                    co,
                    handle_left,
                    handle_right: 2.0 * co - handle_left,
                    radius: 0.0,
                }
            }
        };

        turtle.pos = point.co;
        let heading = (point.handle_right - point.co).normalize_or_zero();
        if heading != Vec3::ZERO {
            turtle.dir = heading;
        }
        self.points_mut(spline).push(point);
    }

    /// Split the stem at `seg` into `num_splits` clones, each continuing on its own spline
    #[allow(clippy::too_many_arguments)]
    fn make_clones(
        &mut self,
        ctx: &mut GenerationContext,
        turtle: &Turtle,
        id: StemId,
        seg: usize,
        state: &StemStart,
        num_splits: usize,
        angles: &SplitAngles,
        is_base_split: bool,
    ) -> Result<()> {
        let depth = self.stems[id.0].depth;
        let split_angle_v = self.params.split_angle_v[level_index(depth)];

        if !is_base_split && num_splits > 2 && angles.direct {
            return Err(TreeError::UnsupportedSplit(num_splits));
        }

        for split_index in 0..num_splits {
            let mut clone_turtle = *turtle;
            clone_turtle.pitch_down(angles.split / 2.0);

            let spread = if is_base_split && !angles.direct {
                (split_index + 1) as f32 * (360.0 / (num_splits + 1) as f32) + ctx.uniform() * split_angle_v
            } else if split_index == 0 {
                angles.spread / 2.0
            } else {
                -angles.spread / 2.0
            };

            if angles.direct {
                clone_turtle.turn_left(spread);
            } else {
                clone_turtle.spin_world_z(spread);
            }

            let spline = self.new_spline(depth);
            let clone = self.stems[id.0].clone_into(spline);
            let clone_id = self.push_stem(clone);

            let cloned = (split_angle_v >= 0.0).then_some(*turtle);
            let clone_start = StemStart { start: seg, ..*state };
            self.build_stem(ctx, clone_turtle, clone_id, clone_start, None, cloned)?;
        }
        Ok(())
    }

    /// Whether segment `seg` gets extra points (lobed taper or the flared trunk base)
    fn needs_resampling(&self, depth: usize, seg: usize, max_points_per_seg: usize) -> bool {
        if max_points_per_seg <= 2 {
            return false;
        }
        let p = &self.params;
        let res = p.curve_res_at(depth) as f32;
        let in_flare = depth == 0 && p.flare > 0.0 && ((seg - 1) as f32 / res) < 0.125;
        p.taper[level_index(depth)] > 1.0 || in_flare
    }

    /// Replace the last segment with `points_per_seg` points on the same curve.
    ///
    /// Handles keep the full segment magnitude so later segments still
    /// evaluate the original curve; they are shrunk once the stem is done.
    /// Returns the index range of the points touched.
    fn increase_bezier_point_res(&mut self, id: StemId, seg: usize, points_per_seg: usize) -> Result<(usize, usize)> {
        let stem = self.stems[id.0].clone();
        let res = self.params.curve_res_at(stem.depth) as f32;

        let count = self.points(stem.spline).len();
        if count < 2 {
            return Ok((0, count.saturating_sub(1)));
        }
        let start_index = count - 2;
        let start_point = self.points(stem.spline)[start_index];
        let end_point = self.points(stem.spline)[count - 1];
        let handle_length = (end_point.handle_left - end_point.co).length();

        for k in 0..points_per_seg {
            let offset = k as f32 / (points_per_seg - 1) as f32;
            let mut point = if k == 0 {
                start_point
            } else if k == points_per_seg - 1 {
                end_point
            } else {
                let co = point_on_bezier(offset, &start_point, &end_point)?;
                let tangent = tangent_on_bezier(offset, &start_point, &end_point)?.normalize_or_zero();
                BezierPoint {
                    co,
                    handle_left: co - tangent * handle_length,
                    handle_right: co + tangent * handle_length,
                    radius: 0.0,
                }
            };
            point.radius = radius_at_offset(&self.params, &stem, (offset + seg as f32 - 1.0) / res);

            let points = self.points_mut(stem.spline);
            match k {
                0 => points[start_index] = point,
                1 => points[start_index + 1] = point,
                _ => points.push(point),
            }
        }

        Ok((start_index, self.points(stem.spline).len() - 1))
    }
}

/// Pitch the parent away from its clones and spread a two-way split
pub(crate) fn apply_split(turtle: &mut Turtle, angles: &SplitAngles, num_splits: usize, is_base_split: bool) {
    turtle.pitch_down(angles.split / 2.0);

    if !is_base_split && num_splits == 1 {
        if angles.direct {
            turtle.turn_right(angles.spread / 2.0);
        } else {
            turtle.spin_world_z(-angles.spread / 2.0);
        }
    }
}

/// Shrink handles toward their points after resampling
fn scale_handles(points: &mut [BezierPoint], factor: f32) {
    for point in points {
        point.handle_left = point.co + (point.handle_left - point.co) / factor;
        point.handle_right = point.co + (point.handle_right - point.co) / factor;
    }
}
