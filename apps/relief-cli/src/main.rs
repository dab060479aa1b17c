mod config;
mod demo;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::Vec3;
use relief_heightmap::{HeightSource, Heightfield, Heightmap};
use relief_mesh::{GridMesher, Shading};
use relief_render::IndexFormat;
use tracing_subscriber::EnvFilter;

use crate::config::{DemoConfig, parse_size, parse_vec3};

#[derive(Parser)]
#[command(name = "relief", about = "Heightmap terrain mesher")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON config with `mesh`, `dispatcher`, `game_loop` and `placement` sections
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Mesh a heightmap once and print a summary
    Generate {
        /// Heightmap image; a synthetic pattern is used when omitted
        input: Option<PathBuf>,
        /// Synthetic heightmap size, e.g. 257x257
        #[arg(long, value_parser = parse_size, conflicts_with = "input")]
        size: Option<(usize, usize)>,
        /// `diffuse` (smooth) or `flat`
        #[arg(long)]
        shading: Option<Shading>,
        /// Mesh scale as x,y,z
        #[arg(long, value_parser = parse_vec3)]
        scale: Option<Vec3>,
        /// Write the physics heightfield as JSON
        #[arg(long)]
        heightfield: Option<PathBuf>,
    },
    /// Headless demo: async generation through the game loop
    Demo {
        /// Asset manifest to load the heightmap from
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Asset name of the heightmap in the manifest
        #[arg(long, default_value = "terrain")]
        asset: String,
        /// Synthetic heightmap size when no manifest is given
        #[arg(long, value_parser = parse_size, default_value = "129x129")]
        size: (usize, usize),
        /// Number of generation requests to submit
        #[arg(short, long, default_value = "3")]
        requests: usize,
        /// Minimum number of frames to run
        #[arg(short, long, default_value = "60")]
        frames: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = DemoConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Info => {
            println!("relief v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", relief_common::crate_info());
            println!("heightmap: {}", relief_heightmap::crate_info());
            println!("mesh: {}", relief_mesh::crate_info());
            println!("dispatch: {}", relief_dispatch::crate_info());
            println!("terrain: {}", relief_terrain::crate_info());
            println!("assets: {}", relief_assets::crate_info());
            println!("render: {}", relief_render::crate_info());
            println!("runtime: {}", relief_runtime::crate_info());
        }
        Commands::Generate {
            input,
            size,
            shading,
            scale,
            heightfield,
        } => {
            let mut options = config.mesh;
            if let Some(shading) = shading {
                options.shading = shading;
            }
            if let Some(scale) = scale {
                options.scale = scale;
            }

            let source = match (&input, size) {
                (Some(path), _) => Heightmap::open(path)
                    .with_context(|| format!("loading heightmap {}", path.display()))?,
                (None, Some((w, h))) => synthetic_heightmap(w, h)?,
                (None, None) => synthetic_heightmap(129, 129)?,
            };
            println!(
                "Heightmap: {}x{} ({})",
                source.width(),
                source.height(),
                input
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "synthetic".into())
            );

            let start = Instant::now();
            let mut next_report = 0.25;
            let mesh = GridMesher::new(options).generate(&source, |fraction| {
                if fraction >= next_report {
                    println!("  progress {:>3.0}%", fraction * 100.0);
                    next_report += 0.25;
                }
            })?;
            let elapsed = start.elapsed();

            println!("Shading: {}", options.shading);
            println!(
                "Mesh: {} vertices, {} triangles, stride={} bytes, indices={:?}",
                mesh.vertex_count(),
                mesh.triangle_count(),
                mesh.vertex_stride,
                IndexFormat::of(&mesh.indices)
            );
            println!(
                "Buffers: {} vertex bytes, {} index bytes",
                mesh.vertex_bytes().len(),
                mesh.indices.as_bytes().len()
            );
            println!(
                "Extent: {:.2} x {:.2}",
                mesh.meta.terrain_width, mesh.meta.terrain_length
            );
            println!("Terrain generation took {:.3} seconds", elapsed.as_secs_f64());

            let field = Heightfield::from_source(&source, options.scale);
            let extent = field.extent();
            println!(
                "Heightfield: {}x{}, extent=({:.2}, {:.2}, {:.2})",
                field.columns, field.rows, extent.x, extent.y, extent.z
            );
            if let Some(path) = heightfield {
                write_heightfield(&field, &path)?;
                println!("Heightfield written to {}", path.display());
            }
        }
        Commands::Demo {
            manifest,
            asset,
            size,
            requests,
            frames,
        } => {
            let source = match &manifest {
                Some(path) => {
                    let (db, report) = relief_assets::AssetDatabase::open(path)
                        .with_context(|| format!("loading manifest {}", path.display()))?;
                    for (name, reason) in &report.skipped {
                        println!("Skipped asset {name}: {reason}");
                    }
                    db.heightmap(&asset)
                        .with_context(|| format!("heightmap asset `{asset}`"))?
                }
                None => synthetic_heightmap(size.0, size.1)?,
            };
            let summary = demo::run(&config, source, requests, frames)?;
            println!("{summary}");
        }
    }

    Ok(())
}

/// Rolling hills: two crossed sine waves, normalized to `[0, 1]`.
fn synthetic_heightmap(width: usize, height: usize) -> anyhow::Result<Heightmap> {
    Heightmap::from_fn(width, height, |x, z| {
        let fx = x as f32 / width as f32;
        let fz = z as f32 / height as f32;
        ((fx * 12.0).sin() * (fz * 9.0).cos() + 1.0) * 0.5
    })
    .context("building synthetic heightmap")
}

fn write_heightfield(field: &Heightfield, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer(file, field).context("writing heightfield")?;
    Ok(())
}
