//! `contact`: bone picking at a point

use anyhow::{Context, Result};
use clap::Args;
use glam::Vec2;

use crate::cli::AssetArg;
use crate::utils::{format_vec2, format_vec3};

#[derive(Args, Debug)]
pub struct ContactArgs {
    #[command(flatten)]
    pub asset: AssetArg,

    /// X coordinate of the probe point
    #[arg(allow_hyphen_values = true)]
    pub x: f32,

    /// Y coordinate of the probe point
    #[arg(allow_hyphen_values = true)]
    pub y: f32,

    /// Maximum distance from a bone segment
    #[arg(short, long, default_value_t = 0.1)]
    pub radius: f32,

    /// Clip posed before probing (defaults to the first clip)
    #[arg(short, long)]
    pub animation: Option<String>,

    /// Frame time of the pose
    #[arg(short, long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub time: f32,
}

pub fn execute(args: &ContactArgs) -> Result<()> {
    let (_, mut manager) = super::load_manager(&args.asset.file)?;

    if manager.active_animation_name().is_some() || args.animation.is_some() {
        let name = super::activate_clip(&mut manager, args.animation.as_deref())?;
        manager.set_is_playing(true);
        manager
            .run_at_time(args.time)
            .with_context(|| format!("Failed to pose '{name}' at {}", args.time))?;
    }

    let pt = Vec2::new(args.x, args.y);
    match manager.is_contact_bone(pt, args.radius) {
        Some(id) => {
            let bone = manager.creature().composition().skeleton().bone(id);
            println!(
                "{} (start {}, end {})",
                bone.key(),
                format_vec3(bone.world_start_pt()),
                format_vec3(bone.world_end_pt())
            );
        }
        None => println!(
            "No bone within {} of {}",
            args.radius,
            format_vec2(pt)
        ),
    }
    Ok(())
}
