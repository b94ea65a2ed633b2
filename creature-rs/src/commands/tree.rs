//! `tree`: skeleton, regions and clips as a tree

use anyhow::Result;
use clap::Args;

use creature_runtime::{BoneId, CreatureManager, Skeleton};

use crate::cli::AssetArg;
use crate::utils::{
    NodeType, TreeNode, TreeOptions, format_frame_range, format_span, format_vec3, render_tree,
};

#[derive(Args, Debug)]
pub struct TreeArgs {
    #[command(flatten)]
    pub asset: AssetArg,

    /// Maximum depth to display
    #[arg(long)]
    pub depth: Option<usize>,

    /// Only show the bone hierarchy
    #[arg(long)]
    pub bones_only: bool,

    /// Hide bone, region and clip details
    #[arg(long)]
    pub no_metadata: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Show details inline
    #[arg(long)]
    pub compact: bool,
}

pub fn execute(args: &TreeArgs) -> Result<()> {
    let (_, manager) = super::load_manager(&args.asset.file)?;
    let name = args
        .asset
        .file
        .file_name()
        .map_or_else(|| "asset".to_string(), |n| n.to_string_lossy().into_owned());

    let root = build_tree(&name, &manager, args.bones_only);
    let options = TreeOptions {
        max_depth: args.depth,
        no_color: args.no_color,
        show_metadata: !args.no_metadata,
        compact: args.compact,
    };
    print!("{}", render_tree(&root, &options));
    Ok(())
}

fn build_tree(name: &str, manager: &CreatureManager, bones_only: bool) -> TreeNode {
    let composition = manager.creature().composition();
    let skeleton = composition.skeleton();
    let bones = bone_node(skeleton, skeleton.root());

    if bones_only {
        return TreeNode::new(name, NodeType::Root).add_child(bones);
    }

    let mut regions = TreeNode::new("regions", NodeType::Header);
    for region in composition.regions() {
        regions = regions.add_child(
            TreeNode::new(region.name(), NodeType::Region)
                .with_metadata("tag", region.tag_id().to_string())
                .with_metadata("points", format_span(region.start_pt_index(), region.end_pt_index()))
                .with_metadata("indices", format_span(region.start_index(), region.end_index())),
        );
    }

    let mut clips = TreeNode::new("animations", NodeType::Header);
    for clip in manager.animation_names() {
        if let Some(animation) = manager.animation(clip) {
            clips = clips.add_child(
                TreeNode::new(clip, NodeType::Clip)
                    .with_metadata("frames", animation.num_frames().to_string())
                    .with_metadata(
                        "range",
                        format_frame_range(animation.start_time(), animation.end_time()),
                    ),
            );
        }
    }

    TreeNode::new(name, NodeType::Root)
        .add_child(TreeNode::new("skeleton", NodeType::Header).add_child(bones))
        .add_child(regions)
        .add_child(clips)
}

fn bone_node(skeleton: &Skeleton, id: BoneId) -> TreeNode {
    let bone = skeleton.bone(id);
    let node = TreeNode::new(bone.key(), NodeType::Bone)
        .with_metadata("id", bone.tag_id().to_string())
        .with_metadata("start", format_vec3(bone.world_rest_start_pt()))
        .with_metadata("end", format_vec3(bone.world_rest_end_pt()))
        .with_metadata("length", format!("{:.3}", bone.rest_length()));

    bone.children()
        .iter()
        .fold(node, |node, &child| node.add_child(bone_node(skeleton, child)))
}
