//! Batch tree generation utility
//!
//! Generates trees from a preset or a parameter file and writes each one as
//! JSON geometry.
//!
//! Usage:
//!     generate_trees [OPTIONS] <OUTPUT_DIR>
//!
//! Options:
//!     -p, --preset <NAME>     Preset: quaking_aspen, black_tupelo, palm, balsam_fir (default: quaking_aspen)
//!     -f, --params <FILE>     JSON parameter file (overrides --preset)
//!     -n, --count <N>         Number of trees (default: 1)
//!     --seed <SEED>           Base seed, 0 for random seeds (default: 0)
//!     --no-leaves             Skip leaves and blossoms
//!     -h, --help              Show this help message

use std::env;
use std::path::PathBuf;
use std::time::Instant;

use rayon::prelude::*;

use arbor::params::persist::PARAMS_FILE_EXTENSION;
use arbor::{construct, TreeGeometry, TreeParams, TreePreset};

fn print_help() {
    eprintln!("generate_trees - Batch tree generation utility");
    eprintln!();
    eprintln!("Usage: generate_trees [OPTIONS] <OUTPUT_DIR>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("    -p, --preset <NAME>     Preset: quaking_aspen, black_tupelo, palm, balsam_fir (default: quaking_aspen)");
    eprintln!("    -f, --params <FILE>     JSON parameter file (overrides --preset)");
    eprintln!("    -n, --count <N>         Number of trees (default: 1)");
    eprintln!("    --seed <SEED>           Base seed, 0 for random seeds (default: 0)");
    eprintln!("    --no-leaves             Skip leaves and blossoms");
    eprintln!("    -h, --help              Show this help message");
    eprintln!();
    eprintln!("Example:");
    eprintln!("    generate_trees -p palm -n 20 ./out/trees");
    eprintln!("    generate_trees -f my_tree.json --seed 42 ./out/trees");
}

#[derive(Debug)]
struct Args {
    output_dir: PathBuf,
    preset: TreePreset,
    params_file: Option<PathBuf>,
    count: u32,
    seed: u64,
    generate_leaves: bool,
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() {
        return Err("Missing output directory".to_string());
    }

    let mut preset = TreePreset::default();
    let mut params_file: Option<PathBuf> = None;
    let mut count: u32 = 1;
    let mut seed: u64 = 0;
    let mut generate_leaves = true;
    let mut output_dir: Option<PathBuf> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-p" | "--preset" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --preset".to_string());
                }
                preset = TreePreset::from_name(&args[i]).ok_or_else(|| {
                    let valid: Vec<&str> = TreePreset::all().iter().map(|p| p.name()).collect();
                    format!("Unknown preset: {}. Valid presets: {}", args[i], valid.join(", "))
                })?;
            }
            "-f" | "--params" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --params".to_string());
                }
                params_file = Some(PathBuf::from(&args[i]));
            }
            "-n" | "--count" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --count".to_string());
                }
                count = args[i].parse().map_err(|_| format!("Invalid count: {}", args[i]))?;
            }
            "--seed" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --seed".to_string());
                }
                seed = args[i].parse().map_err(|_| format!("Invalid seed: {}", args[i]))?;
            }
            "--no-leaves" => generate_leaves = false,
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            path => {
                if output_dir.is_some() {
                    return Err("Multiple output directories specified".to_string());
                }
                output_dir = Some(PathBuf::from(path));
            }
        }
        i += 1;
    }

    let output_dir = output_dir.ok_or("Missing output directory")?;

    Ok(Args {
        output_dir,
        preset,
        params_file,
        count,
        seed,
        generate_leaves,
    })
}

fn main() {
    arbor::core::logging::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    };

    let (params, name) = match &args.params_file {
        Some(path) => match TreeParams::load_sync(path) {
            Ok(params) => {
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "tree".to_string());
                (params, name)
            }
            Err(e) => {
                eprintln!("Failed to load parameters from {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => (TreeParams::from_preset(args.preset), args.preset.name().to_string()),
    };

    println!("Tree Generation Utility");
    println!("=======================");
    println!("Output directory: {}", args.output_dir.display());
    println!("Parameters: {}", name);
    println!("Trees: {}", args.count);
    println!("Base seed: {}", args.seed);
    println!("Leaves: {}", if args.generate_leaves { "yes" } else { "no" });
    println!();

    if let Err(e) = std::fs::create_dir_all(&args.output_dir) {
        eprintln!("Failed to create {}: {}", args.output_dir.display(), e);
        std::process::exit(1);
    }

    // Keep the parameters next to the trees they produced
    let params_path = args.output_dir.join(format!("{}_params.{}", name, PARAMS_FILE_EXTENSION));
    if let Err(e) = params.save_sync(&params_path) {
        log::warn!("Could not write {}: {}", params_path.display(), e);
    }

    let start = Instant::now();
    let results: Vec<(u32, TreeGeometry)> = (0..args.count)
        .into_par_iter()
        .map(|i| {
            // Base seed 0 gives every tree its own fresh seed
            let seed = if args.seed == 0 { 0 } else { args.seed.wrapping_add(i as u64) };
            (i, construct(&params, seed, args.generate_leaves))
        })
        .collect();

    let mut failures = 0;
    for (i, geometry) in &results {
        if let Some(error) = &geometry.error {
            log::warn!("Tree {} (seed {}) is incomplete: {}", i, geometry.seed, error);
        }
        if let Some(bounds) = geometry.bounds() {
            let size = bounds.size();
            log::info!("Tree {} spans {:.2} x {:.2} x {:.2}", i, size.x, size.y, size.z);
        }
        let path = args.output_dir.join(format!("{}_{:04}_{}.json", name, i, geometry.seed));
        match geometry.save_sync(&path) {
            Ok(()) => println!(
                "  {} stems, {} leaves -> {}",
                geometry.stem_count,
                geometry.leaf_count,
                path.display()
            ),
            Err(e) => {
                eprintln!("  Failed to write {}: {}", path.display(), e);
                failures += 1;
            }
        }
    }

    let elapsed = start.elapsed();
    println!(
        "\nCompleted {} trees in {:.2}s ({:.1} trees/sec)",
        results.len(),
        elapsed.as_secs_f64(),
        results.len() as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );

    if failures > 0 {
        std::process::exit(1);
    }
}
