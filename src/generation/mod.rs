//! Tree generation pipeline: parameters and a seed in, bezier splines and leaf meshes out.
//!
//! The pipeline:
//! 1. Seed the random stream (0 picks a fresh seed, reported in the output)
//! 2. Place one trunk per floor-split position
//! 3. Recursively build every stem: clones, children, leaves, pruning
//! 4. Assemble leaf and blossom meshes from the collected placements

pub mod branching;
pub mod build;
pub mod context;
pub mod geometry;
pub mod prune;
pub mod shape;
pub mod stem;
pub mod tree;

pub use build::StemStart;
pub use context::{GenerationContext, ProgressCallback};
pub use geometry::{LeafMesh, LevelCurves, Spline, TreeGeometry, GEOMETRY_VERSION};
pub use shape::{radius_at_offset, shape_ratio};
pub use stem::{SplineId, Stem, StemId};
pub use tree::Tree;

use rayon::prelude::*;

use crate::core::types::Result;
use crate::core::TreeError;
use crate::params::{RawParams, TreeParams};

/// Generate one tree.
///
/// A failure inside the stem recursion does not lose the work done so far:
/// it is logged and the partial geometry comes back with `error` set.
pub fn construct(params: &TreeParams, seed: u64, generate_leaves: bool) -> TreeGeometry {
    let mut ctx = GenerationContext::new(seed);
    construct_with(&mut ctx, params, generate_leaves)
}

/// Generate one tree with a caller-provided context (progress callback, seed)
pub fn construct_with(ctx: &mut GenerationContext, params: &TreeParams, generate_leaves: bool) -> TreeGeometry {
    ctx.report(&format!("Using seed: {}", ctx.seed()));

    let mut tree = Tree::new(params.clone(), generate_leaves);
    let error = match tree.make(ctx) {
        Ok(()) => None,
        Err(e) => {
            log::error!("Tree generation failed (seed {}): {}", ctx.seed(), e);
            Some(e.to_string())
        }
    };
    tree.into_geometry(ctx.seed(), error)
}

/// Generate one tree from raw key/value parameters
pub fn construct_from_map(raw: &RawParams, seed: u64, generate_leaves: bool) -> Result<TreeGeometry> {
    let params = TreeParams::from_map(raw)?;
    Ok(construct(&params, seed, generate_leaves))
}

/// Generate one tree on the blocking pool and hand the geometry back
pub async fn construct_async(params: TreeParams, seed: u64, generate_leaves: bool) -> Result<TreeGeometry> {
    tokio::task::spawn_blocking(move || construct(&params, seed, generate_leaves))
        .await
        .map_err(|e| TreeError::Join(e.to_string()))
}

/// Generate one tree per seed in parallel.
///
/// Each tree has its own random stream, so the result for a seed does not
/// depend on the others or on scheduling.
pub fn construct_batch(params: &TreeParams, seeds: &[u64], generate_leaves: bool) -> Vec<TreeGeometry> {
    log::info!("Generating {} trees...", seeds.len());
    let start = std::time::Instant::now();

    let trees: Vec<TreeGeometry> = seeds
        .par_iter()
        .map(|&seed| construct(params, seed, generate_leaves))
        .collect();

    let elapsed = start.elapsed();
    log::info!(
        "Generated {} trees in {:.1}s ({:.1} trees/sec)",
        trees.len(),
        elapsed.as_secs_f64(),
        trees.len() as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    trees
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn small() -> TreeParams {
        let mut params = TreeParams::default();
        params.levels = 2;
        params.branches = [1, 12, 0, 0];
        params
    }

    #[test]
    fn test_same_seed_same_tree() {
        let params = TreeParams::default();
        let a = construct(&params, 1234, true);
        let b = construct(&params, 1234, true);
        assert_eq!(a, b);
        assert!(a.error.is_none());
        assert!(a.leaf_count > 0);
    }

    #[test]
    fn test_same_seed_same_pruned_tree() {
        let params = TreeParams::balsam_fir();
        let a = construct(&params, 4321, true);
        let b = construct(&params, 4321, true);
        assert_eq!(a, b);
        assert!(a.stem_count > 1);
    }

    #[test]
    fn test_different_seeds_differ() {
        let params = small();
        let a = construct(&params, 1, false);
        let b = construct(&params, 2, false);
        assert_ne!(a.levels, b.levels);
    }

    #[test]
    fn test_zero_seed_is_replaced() {
        let geometry = construct(&small(), 0, false);
        assert_ne!(geometry.seed, 0);
        // The reported seed reproduces the tree
        assert_eq!(construct(&small(), geometry.seed, false), geometry);
    }

    #[test]
    fn test_error_keeps_partial_geometry() {
        let mut params = small();
        params.seg_splits = [3.0, 0.0, 0.0, 0.0];
        params.split_angle = [-30.0, 0.0, 0.0, 0.0];
        let geometry = construct(&params, 5, false);
        let error = geometry.error.as_deref().unwrap_or_default();
        assert!(error.contains("3"), "unexpected error: {:?}", geometry.error);
        assert!(!geometry.levels[0].splines.is_empty());
    }

    #[test]
    fn test_leaves_toggle() {
        let geometry = construct(&TreeParams::default(), 77, false);
        assert!(geometry.leaves.is_none());
        assert!(geometry.blossoms.is_none());
        assert_eq!(geometry.leaf_count, 0);
    }

    #[test]
    fn test_progress_callback_sees_log_lines() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let mut ctx = GenerationContext::new(3).with_progress(Box::new(move |line: &str| {
            sink.lock().unwrap().push(line.to_string());
        }));
        construct_with(&mut ctx, &small(), false);

        let lines = lines.lock().unwrap();
        assert_eq!(lines[0], "Using seed: 3");
        assert!(lines.iter().any(|l| l.starts_with("Stems made")));
    }

    #[test]
    fn test_construct_from_map() {
        let raw = match serde_json::json!({ "levels": 1, "branches": [1, 0, 0, 0] }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        let geometry = construct_from_map(&raw, 10, true).unwrap();
        assert_eq!(geometry.levels.len(), 1);
        assert_eq!(geometry.stem_count, 1);
    }

    #[test]
    fn test_batch_matches_single() {
        let params = small();
        let seeds = [3, 4, 5];
        let batch = construct_batch(&params, &seeds, false);
        assert_eq!(batch.len(), 3);
        for (geometry, &seed) in batch.iter().zip(&seeds) {
            assert_eq!(*geometry, construct(&params, seed, false));
        }
    }

    #[test]
    fn test_construct_async() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let geometry = rt.block_on(construct_async(small(), 6, false)).unwrap();
        assert_eq!(geometry.seed, 6);
        assert_eq!(geometry, construct(&small(), 6, false));
    }
}
