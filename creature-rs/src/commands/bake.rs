//! `bake`: fill point caches frame by frame

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use crate::cli::AssetArg;
use crate::utils::{add_table_row, create_progress_bar, create_table, format_frame_range};

#[derive(Args, Debug)]
pub struct BakeArgs {
    #[command(flatten)]
    pub asset: AssetArg,

    /// Clips to bake (repeatable; all clips when omitted)
    #[arg(short, long = "animation", value_name = "CLIP")]
    pub animations: Vec<String>,

    /// Write the baked frames as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// One baked clip as written by `--output`
#[derive(Debug, Serialize)]
struct BakedClip<'a> {
    name: &'a str,
    start_time: i32,
    end_time: i32,
    frames: &'a [Vec<f32>],
}

pub fn execute(args: &BakeArgs, quiet: bool) -> Result<()> {
    let (_, mut manager) = super::load_manager(&args.asset.file)?;

    let names: Vec<String> = if args.animations.is_empty() {
        manager
            .animation_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    } else {
        args.animations.clone()
    };

    for name in &names {
        let animation = manager
            .animation(name)
            .with_context(|| format!("Unknown animation '{name}'"))?;
        let (start, end) = (animation.start_time(), animation.end_time());

        let pb = create_progress_bar(animation.num_frames() as u64, name, quiet);
        for frame in start..=end {
            manager
                .fill_single_point_cache_frame(name, frame as f32)
                .with_context(|| format!("Failed to bake '{name}' frame {frame}"))?;
            pb.inc(1);
        }
        pb.finish_and_clear();

        let baked = manager
            .animation(name)
            .is_some_and(creature_runtime::CreatureAnimation::has_point_cache);
        if !baked {
            anyhow::bail!("Point cache for '{name}' is incomplete");
        }
        log::info!("Baked '{name}'");
    }

    let mut table = create_table(&["Clip", "Frames", "Range", "Floats/frame"]);
    let mut export = Vec::with_capacity(names.len());
    for name in &names {
        if let Some(animation) = manager.animation(name) {
            add_table_row(
                &mut table,
                [
                    name.clone(),
                    animation.cache_pts().len().to_string(),
                    format_frame_range(animation.start_time(), animation.end_time()),
                    animation.cache_pts().first().map_or(0, Vec::len).to_string(),
                ],
            );
            export.push(BakedClip {
                name,
                start_time: animation.start_time(),
                end_time: animation.end_time(),
                frames: animation.cache_pts(),
            });
        }
    }
    if !quiet {
        table.printstd();
    }

    if let Some(path) = &args.output {
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), &export)
            .with_context(|| format!("Failed to write point caches to {}", path.display()))?;
        println!("Wrote {} baked clip(s) to {}", export.len(), path.display());
    }
    Ok(())
}
