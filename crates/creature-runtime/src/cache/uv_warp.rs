use glam::Vec2;
use log::warn;

use super::frame_table::{FrameTable, Keyed};
use super::Retrieval;
use crate::composition::BoneComposition;

/// UV warp parameters of one region at one frame
#[derive(Debug, Clone, PartialEq)]
pub struct UvWarpCache {
    pub key: String,
    pub enabled: bool,
    pub local_offset: Vec2,
    pub global_offset: Vec2,
    pub scale: Vec2,
}

impl UvWarpCache {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            enabled: false,
            local_offset: Vec2::ZERO,
            global_offset: Vec2::ZERO,
            scale: Vec2::ONE,
        }
    }
}

impl Keyed for UvWarpCache {
    fn key(&self) -> &str {
        &self.key
    }
}

/// Per-frame region UV warps of one clip
#[derive(Debug, Clone, Default)]
pub struct UvWarpCacheManager {
    frames: FrameTable<UvWarpCache>,
}

impl UvWarpCacheManager {
    pub fn init(&mut self, start_time: i32, end_time: i32) {
        self.frames.init(start_time, end_time);
    }

    pub fn table(&self) -> &FrameTable<UvWarpCache> {
        &self.frames
    }

    pub fn table_mut(&mut self) -> &mut FrameTable<UvWarpCache> {
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

    /// Copy the warp parameters of the frame at or before `time` into
    /// regions that have UV warping enabled
    ///
    /// UV warps step from frame to frame; they are not interpolated. The ceil
    /// frame only has to be ready.
    pub fn retrieve_values_at_time(
        &self,
        time: f32,
        composition: &mut BoneComposition,
    ) -> Retrieval {
        let Some((base, _, _)) = self.frames.bracket(time) else {
            return Retrieval::NotReady;
        };

        for base_data in base {
            let Some(region) = composition.region_mut(&base_data.key) else {
                warn!("UV warp cache names unknown region '{}'", base_data.key);
                continue;
            };

            if region.use_uv_warp() {
                region.set_uv_warp_local_offset(base_data.local_offset);
                region.set_uv_warp_global_offset(base_data.global_offset);
                region.set_uv_warp_scale(base_data.scale);
            }
        }

        Retrieval::Applied
    }
}
