//! Root CLI structure for creature-rs

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::bake::BakeArgs;
use crate::commands::contact::ContactArgs;
use crate::commands::info::InfoArgs;
use crate::commands::pose::PoseArgs;
use crate::commands::tree::TreeArgs;

#[derive(Parser)]
#[command(name = "creature-rs")]
#[command(about = "Inspect, pose and bake Creature skeletal animation assets", long_about = None)]
#[command(version)]
#[command(author)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Summarize the mesh, skeleton, regions and clips of an asset
    Info(InfoArgs),

    /// Show the bone hierarchy, regions and clips as a tree
    Tree(TreeArgs),

    /// Pose a clip at a frame time, optionally cross-faded with another clip
    Pose(PoseArgs),

    /// Bake clips into per-frame point caches
    Bake(BakeArgs),

    /// Find the bone whose posed segment passes near a point
    Contact(ContactArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Asset path shared by every command
#[derive(Args, Debug, Clone)]
pub struct AssetArg {
    /// Path to the asset JSON file
    #[arg(env = "CREATURE_ASSET")]
    pub file: PathBuf,
}
