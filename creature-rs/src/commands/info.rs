//! `info`: asset summary

use anyhow::Result;
use clap::Args;
use console::style;

use crate::cli::AssetArg;
use crate::utils::{add_table_row, create_table, format_frame_range, format_span};

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub asset: AssetArg,
}

pub fn execute(args: &InfoArgs) -> Result<()> {
    let (data, manager) = super::load_manager(&args.asset.file)?;
    let creature = manager.creature();
    let composition = creature.composition();

    println!("{}", style("Creature Asset").bold().underlined());
    println!("File: {}", args.asset.file.display());
    println!();
    println!("Points:  {}", creature.total_num_pts());
    println!("Indices: {}", creature.total_num_indices());
    println!("Bones:   {}", composition.skeleton().len());
    println!("Regions: {}", composition.regions().len());
    println!("Clips:   {}", manager.animation_names().len());
    if let Some(name) = manager.active_animation_name() {
        println!("Default clip: {name}");
    }

    if !composition.regions().is_empty() {
        println!();
        println!("{}", style("Regions").bold());
        let mut table = create_table(&["Name", "Tag", "Points", "Indices", "Bones"]);
        for region in composition.regions() {
            add_table_row(
                &mut table,
                [
                    region.name().to_string(),
                    region.tag_id().to_string(),
                    format_span(region.start_pt_index(), region.end_pt_index()),
                    format_span(region.start_index(), region.end_index()),
                    region.fast_bones().len().to_string(),
                ],
            );
        }
        table.printstd();
    }

    // Clips in document order
    let clips = data.animation_names();
    if !clips.is_empty() {
        println!();
        println!("{}", style("Clips").bold());
        let mut table = create_table(&["Name", "Frames", "Range"]);
        for name in &clips {
            if let Some(animation) = manager.animation(name) {
                add_table_row(
                    &mut table,
                    [
                        name.clone(),
                        animation.num_frames().to_string(),
                        format_frame_range(animation.start_time(), animation.end_time()),
                    ],
                );
            }
        }
        table.printstd();
    }

    Ok(())
}
