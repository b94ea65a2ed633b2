#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod animation;
pub mod bone;
pub mod cache;
pub mod composition;
pub mod creature;
pub mod data;
pub mod debug;
pub mod dual_quat;
pub mod error;
pub mod manager;
pub mod math;
pub mod region;

pub use animation::CreatureAnimation;
pub use bone::{Bone, BoneId, Skeleton};
pub use cache::Retrieval;
pub use composition::BoneComposition;
pub use creature::{BOUNDARY_MAX_REFERENCES, Creature, REGION_Z_STEP};
pub use data::{CreatureData, MAX_CLIP_FRAMES};
pub use dual_quat::DualQuat;
pub use error::{CreatureError, Result, TransformStage};
pub use manager::{BonesOverrideCallback, CreatureManager, DEFAULT_TIME_SCALE, PlaybackFlags};
pub use region::{RenderRegion, WEIGHT_CUTOFF};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
