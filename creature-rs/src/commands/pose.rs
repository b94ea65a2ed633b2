//! `pose`: evaluate a clip at one frame time

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use creature_runtime::CreatureManager;

use crate::cli::AssetArg;
use crate::utils::{add_table_row, create_table, format_vec2};

#[derive(Args, Debug)]
pub struct PoseArgs {
    #[command(flatten)]
    pub asset: AssetArg,

    /// Clip to pose (defaults to the first clip in the asset)
    #[arg(short, long)]
    pub animation: Option<String>,

    /// Frame time; fractional times interpolate between frames
    #[arg(short, long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub time: f32,

    /// Cross-fade with this clip
    #[arg(long, value_name = "CLIP")]
    pub blend_with: Option<String>,

    /// Weight of the --blend-with clip (0 to 1)
    #[arg(long, default_value_t = 0.5, requires = "blend_with")]
    pub factor: f32,

    /// Clamp times outside the clip instead of wrapping them
    #[arg(long)]
    pub no_loop: bool,

    /// Write the posed points as JSON instead of printing them
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the bounds of the posed mesh outline
    #[arg(long)]
    pub bounds: bool,
}

/// Posed mesh as written by `--output`
#[derive(Debug, Serialize)]
struct PoseExport<'a> {
    animation: &'a str,
    blend_with: Option<&'a str>,
    factor: f32,
    time: f32,
    points: Vec<[f32; 3]>,
}

pub fn execute(args: &PoseArgs) -> Result<()> {
    let (_, mut manager) = super::load_manager(&args.asset.file)?;
    let name = super::activate_clip(&mut manager, args.animation.as_deref())?;

    manager.set_should_loop(!args.no_loop);
    if let Some(other) = args.blend_with.as_deref() {
        if manager.animation(other).is_none() {
            anyhow::bail!("Unknown blend animation '{other}'");
        }
        manager.set_blending(true);
        manager.set_blending_animations(&name, other);
        manager.set_blending_factor(args.factor.clamp(0.0, 1.0));
    }

    manager.set_is_playing(true);
    manager
        .run_at_time(args.time)
        .with_context(|| format!("Failed to pose '{name}' at {}", args.time))?;
    log::info!("Posed '{}' at frame {}", name, manager.run_time());

    let points: Vec<[f32; 3]> = manager
        .creature()
        .render_pts()
        .chunks_exact(3)
        .map(|p| [p[0], p[1], p[2]])
        .collect();

    if let Some(path) = &args.output {
        let export = PoseExport {
            animation: &name,
            blend_with: args.blend_with.as_deref(),
            factor: manager.blending_factor(),
            time: manager.run_time(),
            points,
        };
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &export)
            .with_context(|| format!("Failed to write pose to {}", path.display()))?;
        println!(
            "Wrote {} points to {}",
            export.points.len(),
            style(path.display()).green()
        );
    } else {
        println!(
            "{} '{}' at frame {}",
            style("Pose").bold(),
            name,
            manager.run_time()
        );
        let mut table = create_table(&["Point", "X", "Y", "Z"]);
        for (i, [x, y, z]) in points.iter().enumerate() {
            add_table_row(
                &mut table,
                [i.to_string(), format!("{x:.4}"), format!("{y:.4}"), format!("{z:.4}")],
            );
        }
        table.printstd();
    }

    if args.bounds {
        print_bounds(&mut manager);
    }
    Ok(())
}

fn print_bounds(manager: &mut CreatureManager) {
    let creature = manager.creature_mut();
    creature.compute_boundary_indices();
    match creature.compute_boundary_min_max() {
        Some((min, max)) => println!(
            "Bounds: min {} max {} ({} outline points)",
            format_vec2(min),
            format_vec2(max),
            creature.boundary_indices().len()
        ),
        None => println!("Bounds: mesh has no outline points"),
    }
}
