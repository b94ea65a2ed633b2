use glam::Vec3;
use log::warn;

use super::frame_table::{FrameTable, Keyed, pair_by_key};
use super::Retrieval;
use crate::composition::BoneComposition;
use crate::math::vec3_interp;

/// Endpoints of one bone at one frame
#[derive(Debug, Clone, PartialEq)]
pub struct BoneCache {
    pub key: String,
    pub world_start_pt: Vec3,
    pub world_end_pt: Vec3,
}

impl BoneCache {
    pub fn new(key: impl Into<String>, world_start_pt: Vec3, world_end_pt: Vec3) -> Self {
        Self {
            key: key.into(),
            world_start_pt,
            world_end_pt,
        }
    }
}

impl Keyed for BoneCache {
    fn key(&self) -> &str {
        &self.key
    }
}

/// Per-frame bone endpoints of one clip
#[derive(Debug, Clone, Default)]
pub struct BoneCacheManager {
    frames: FrameTable<BoneCache>,
}

impl BoneCacheManager {
    pub fn init(&mut self, start_time: i32, end_time: i32) {
        self.frames.init(start_time, end_time);
    }

    pub fn table(&self) -> &FrameTable<BoneCache> {
        &self.frames
    }

    pub fn table_mut(&mut self) -> &mut FrameTable<BoneCache> {
        &mut self.frames
    }

    pub fn start_time(&self) -> i32 {
        self.frames.start_time()
    }

    pub fn end_time(&self) -> i32 {
        self.frames.end_time()
    }

    pub fn index_by_time(&self, time: i32) -> usize {
        self.frames.index_by_time(time)
    }

    pub fn all_ready(&mut self) -> bool {
        self.frames.all_ready()
    }

    pub fn make_all_ready(&mut self) {
        self.frames.make_all_ready();
    }

    /// Write interpolated endpoints at `time` into the matching bones
    pub fn retrieve_values_at_time(
        &self,
        time: f32,
        composition: &mut BoneComposition,
    ) -> Retrieval {
        let Some((base, end, ratio)) = self.frames.bracket(time) else {
            return Retrieval::NotReady;
        };

        for (base_data, end_data) in pair_by_key(base, end) {
            let Some(id) = composition.bone_by_key(&base_data.key) else {
                warn!("Bone cache names unknown bone '{}'", base_data.key);
                continue;
            };

            let bone = composition.skeleton_mut().bone_mut(id);
            bone.set_world_start_pt(vec3_interp(
                base_data.world_start_pt,
                end_data.world_start_pt,
                ratio,
            ));
            bone.set_world_end_pt(vec3_interp(base_data.world_end_pt, end_data.world_end_pt, ratio));
        }

        Retrieval::Applied
    }
}
