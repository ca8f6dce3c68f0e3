//! Tree aggregate: owns stems, splines and leaf placements for one generation run

use std::f32::consts::TAU;
use std::time::Instant;

use crate::core::types::{Result, Vec3};
use crate::generation::build::StemStart;
use crate::generation::context::GenerationContext;
use crate::generation::geometry::{LeafMesh, LevelCurves, Spline, TreeGeometry, GEOMETRY_VERSION};
use crate::generation::shape::safe_div;
use crate::generation::stem::{SplineId, Stem, StemId};
use crate::leaf::{Leaf, LeafShape};
use crate::math::{BezierPoint, Turtle};
use crate::params::{level_index, TreeParams};

/// Rejection sampling attempts per floor trunk before a position is accepted anyway
const FLOOR_SPLIT_ATTEMPTS: usize = 1000;

/// Progress is reported every this many stems
const STEM_PROGRESS_INTERVAL: usize = 100;

/// Progress is reported every this many leaf placements
const LEAF_PROGRESS_INTERVAL: usize = 500;

/// All state of one tree while it is being generated
pub struct Tree {
    pub(crate) params: TreeParams,
    generate_leaves: bool,
    pub(crate) leaves: Vec<Leaf>,
    pub(crate) levels: Vec<LevelCurves>,
    pub(crate) stems: Vec<Stem>,
    /// Completed stems
    pub(crate) stem_index: usize,
    last_progress: Option<usize>,
    /// Scale of the trunk being built
    pub(crate) tree_scale: f32,
    /// Unbranched length at the base of the current trunk
    pub(crate) base_length: f32,
    pub(crate) trunk_length: f32,
    /// Floyd-Steinberg error for segment splits, per depth
    pub(crate) split_num_error: Vec<f32>,
    leaf_mesh: Option<LeafMesh>,
    blossom_mesh: Option<LeafMesh>,
}

impl Tree {
    /// New empty tree; with `generate_leaves` off no leaves are placed at all
    pub fn new(mut params: TreeParams, generate_leaves: bool) -> Self {
        if !generate_leaves {
            params.leaf_blos_num = 0;
        }
        let level_count = params.level_count();
        let levels = (0..level_count)
            .map(|depth| {
                let d = level_index(depth);
                LevelCurves::new(depth, params.curve_res[d], params.bevel_res[d])
            })
            .collect();

        Self {
            params,
            generate_leaves,
            leaves: Vec::new(),
            levels,
            stems: Vec::new(),
            stem_index: 0,
            last_progress: None,
            tree_scale: 0.0,
            base_length: 0.0,
            trunk_length: 0.0,
            split_num_error: vec![0.0; level_count],
            leaf_mesh: None,
            blossom_mesh: None,
        }
    }

    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    /// Leaf placements collected so far
    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    /// Completed stems, clones included
    pub fn stem_count(&self) -> usize {
        self.stem_index
    }

    /// Build all stems, then the leaf meshes
    pub fn make(&mut self, ctx: &mut GenerationContext) -> Result<()> {
        self.create_branches(ctx)?;

        if self.generate_leaves {
            self.create_leaf_mesh(ctx);
        }
        Ok(())
    }

    /// Hand the result over as plain geometry; empty splines are dropped
    pub fn into_geometry(self, seed: u64, error: Option<String>) -> TreeGeometry {
        let levels = self
            .levels
            .into_iter()
            .map(|mut level| {
                level.splines.retain(|spline| !spline.points.is_empty());
                level
            })
            .collect();

        TreeGeometry {
            version: GEOMETRY_VERSION,
            seed,
            levels,
            leaves: self.leaf_mesh,
            blossoms: self.blossom_mesh,
            leaf_count: self.leaves.len(),
            stem_count: self.stem_index,
            error,
        }
    }

    // --- Arena helpers ---

    pub(crate) fn new_spline(&mut self, depth: usize) -> SplineId {
        let splines = &mut self.levels[depth].splines;
        splines.push(Spline::default());
        SplineId {
            level: depth,
            index: splines.len() - 1,
        }
    }

    pub(crate) fn push_stem(&mut self, stem: Stem) -> StemId {
        self.stems.push(stem);
        StemId(self.stems.len() - 1)
    }

    pub(crate) fn points(&self, id: SplineId) -> &[BezierPoint] {
        &self.levels[id.level].splines[id.index].points
    }

    pub(crate) fn points_mut(&mut self, id: SplineId) -> &mut Vec<BezierPoint> {
        &mut self.levels[id.level].splines[id.index].points
    }

    pub(crate) fn report_stem_progress(&mut self, ctx: &mut GenerationContext) {
        if self.stem_index % STEM_PROGRESS_INTERVAL == 0 && self.last_progress != Some(self.stem_index) {
            self.last_progress = Some(self.stem_index);
            ctx.report(&format!("-> {} stems made", self.stem_index));
        }
    }

    // --- Trunks ---

    /// Trunk start points spread over the floor, with the angle each faces out at
    fn points_for_floor_split(&mut self, ctx: &mut GenerationContext) -> Vec<(Vec3, f32)> {
        let p = &self.params;
        let count = p.branches[0].max(0) as usize;
        self.tree_scale = p.g_scale + p.g_scale_v;

        // Spacing from a dummy trunk at maximum scale
        let mut dummy = Stem::trunk(SplineId { level: 0, index: 0 });
        dummy.length = self.calc_stem_length(ctx, &dummy);
        let spacing = 2.5 * self.calc_stem_radius(&dummy);

        let p = &self.params;
        let spread = count as f32 / 2.5 * p.g_scale * p.ratio;
        let mut points: Vec<(Vec3, f32)> = Vec::with_capacity(count);
        for _ in 0..count {
            let mut attempt = 0;
            loop {
                let dis = (ctx.random() * spread).sqrt();
                let theta = ctx.rand_in_range(0.0, TAU);
                let pos = Vec3::new(dis * theta.cos(), dis * theta.sin(), 0.0);
                attempt += 1;

                let clear = points.iter().all(|(other, _)| (*other - pos).length() >= spacing);
                if clear || attempt >= FLOOR_SPLIT_ATTEMPTS {
                    points.push((pos, theta));
                    break;
                }
            }
        }
        points
    }

    fn create_branches(&mut self, ctx: &mut GenerationContext) -> Result<()> {
        ctx.report("Making stems");
        let start_time = Instant::now();

        let trunks = self.params.branches[0].max(0) as usize;
        let floor_points = if trunks > 0 {
            self.points_for_floor_split(ctx)
        } else {
            Vec::new()
        };

        for (pos, theta) in floor_points {
            self.tree_scale = self.params.g_scale + ctx.uniform() * self.params.g_scale_v;

            let mut turtle = Turtle::new();
            if trunks > 1 {
                // Face away from the center
                turtle.roll_right(theta.to_degrees() - 90.0);
                turtle.pos = pos;
            } else {
                turtle.roll_right(ctx.rand_in_range(0.0, 360.0));
            }

            let spline = self.new_spline(0);
            let trunk = self.push_stem(Stem::trunk(spline));
            self.build_stem(ctx, turtle, trunk, StemStart::default(), None, None)?;
        }

        let elapsed = start_time.elapsed();
        ctx.report(&format!(
            "Stems made: {} in {:.3}s",
            self.stem_index,
            elapsed.as_secs_f64()
        ));
        let curve_points: usize = self.levels.iter().map(LevelCurves::point_count).sum();
        ctx.report(&format!("Curve points: {}", curve_points));
        Ok(())
    }

    // --- Leaves ---

    fn create_leaf_mesh(&mut self, ctx: &mut GenerationContext) {
        if self.leaves.is_empty() {
            return;
        }

        ctx.report("Making leaves");
        let start_time = Instant::now();

        let p = &self.params;
        let scale_factor = safe_div(self.tree_scale, p.g_scale);
        let leaf_shape = LeafShape::new(p.leaf_shape as i32, scale_factor, p.leaf_scale, p.leaf_scale_x);
        let blossom_shape = LeafShape::new(-(p.blossom_shape.max(1) as i32), scale_factor, p.blossom_scale, 1.0);

        let mut leaf_mesh = LeafMesh::default();
        let mut blossom_mesh = LeafMesh::default();
        let mut leaf_index = 0;
        let mut blossom_index = 0;

        for (placed, leaf) in self.leaves.iter().enumerate() {
            if placed > 0 && placed % LEAF_PROGRESS_INTERVAL == 0 {
                ctx.report(&format!(
                    "-> {} leaves made, {} blossoms made",
                    leaf_index, blossom_index
                ));
            }

            if p.blossom_rate > 0.0 && ctx.random() < p.blossom_rate {
                let (vertices, faces) = leaf.mesh(p.leaf_bend, &blossom_shape, blossom_index);
                blossom_mesh.vertices.extend(vertices);
                blossom_mesh.faces.extend(faces);
                blossom_mesh.uvs.extend_from_slice(&blossom_shape.uvs);
                blossom_index += 1;
            } else {
                let (vertices, faces) = leaf.mesh(p.leaf_bend, &leaf_shape, leaf_index);
                leaf_mesh.vertices.extend(vertices);
                leaf_mesh.faces.extend(faces);
                leaf_mesh.uvs.extend_from_slice(&leaf_shape.uvs);
                leaf_index += 1;
            }
        }

        ctx.report(&format!(
            "Made {} leaves and {} blossoms in {:.3}s",
            leaf_index,
            blossom_index,
            start_time.elapsed().as_secs_f64()
        ));

        self.leaf_mesh = (leaf_index > 0).then_some(leaf_mesh);
        self.blossom_mesh = (blossom_index > 0).then_some(blossom_mesh);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_containers() {
        let mut params = TreeParams::default();
        params.levels = 3;
        let tree = Tree::new(params, true);
        let names: Vec<&str> = tree.levels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Trunk", "Branches1", "Branches2"]);
        assert_eq!(tree.levels[0].resolution, 5);
        assert_eq!(tree.levels[0].bevel_resolution, 10);
        assert_eq!(tree.split_num_error.len(), 3);
    }

    #[test]
    fn test_leaves_disabled_clears_count() {
        let tree = Tree::new(TreeParams::default(), false);
        assert_eq!(tree.params().leaf_blos_num, 0);
    }

    #[test]
    fn test_floor_split_points_are_spaced() {
        let mut params = TreeParams::default();
        params.branches[0] = 4;
        let mut tree = Tree::new(params, false);
        let mut ctx = GenerationContext::new(11);
        let points = tree.points_for_floor_split(&mut ctx);
        assert_eq!(points.len(), 4);
        assert!(points.iter().all(|(pos, _)| pos.z == 0.0));
    }

    #[test]
    fn test_spline_allocation() {
        let mut tree = Tree::new(TreeParams::default(), true);
        let a = tree.new_spline(1);
        let b = tree.new_spline(1);
        assert_ne!(a, b);
        tree.points_mut(b).push(BezierPoint::default());
        assert!(tree.points(a).is_empty());
        assert_eq!(tree.points(b).len(), 1);
    }
}
