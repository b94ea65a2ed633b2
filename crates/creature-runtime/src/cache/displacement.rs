use glam::Vec2;
use log::warn;

use super::frame_table::{FrameTable, Keyed, pair_by_key};
use super::Retrieval;
use crate::composition::BoneComposition;
use crate::math::vec2_interp;

/// Local and post displacements of one region at one frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DisplacementCache {
    pub key: String,
    pub local_displacements: Vec<Vec2>,
    pub post_displacements: Vec<Vec2>,
}

impl DisplacementCache {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }
}

impl Keyed for DisplacementCache {
    fn key(&self) -> &str {
        &self.key
    }
}

/// Per-frame region displacements of one clip
#[derive(Debug, Clone, Default)]
pub struct DisplacementCacheManager {
    frames: FrameTable<DisplacementCache>,
}

/// Blend `base` and `end` into `target`, or zero `target` when either
/// snapshot has a different vertex count
fn blend_into(target: &mut [Vec2], base: &[Vec2], end: &[Vec2], ratio: f32) {
    if base.len() == target.len() && end.len() == target.len() {
        for ((out, &b), &e) in target.iter_mut().zip(base).zip(end) {
            *out = vec2_interp(b, e, ratio);
        }
    } else {
        target.fill(Vec2::ZERO);
    }
}

impl DisplacementCacheManager {
    pub fn init(&mut self, start_time: i32, end_time: i32) {
        self.frames.init(start_time, end_time);
    }

    pub fn table(&self) -> &FrameTable<DisplacementCache> {
        &self.frames
    }

    pub fn table_mut(&mut self) -> &mut FrameTable<DisplacementCache> {
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

    /// Write interpolated displacements at `time` into regions that have the
    /// matching displacement kind enabled
    pub fn retrieve_values_at_time(
        &self,
        time: f32,
        composition: &mut BoneComposition,
    ) -> Retrieval {
        let Some((base, end, ratio)) = self.frames.bracket(time) else {
            return Retrieval::NotReady;
        };

        for (base_data, end_data) in pair_by_key(base, end) {
            let Some(region) = composition.region_mut(&base_data.key) else {
                warn!("Displacement cache names unknown region '{}'", base_data.key);
                continue;
            };

            if region.use_local_displacements() {
                blend_into(
                    region.local_displacements_mut(),
                    &base_data.local_displacements,
                    &end_data.local_displacements,
                    ratio,
                );
            }

            if region.use_post_displacements() {
                blend_into(
                    region.post_displacements_mut(),
                    &base_data.post_displacements,
                    &end_data.post_displacements,
                    ratio,
                );
            }
        }

        Retrieval::Applied
    }
}
