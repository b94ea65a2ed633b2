//! Animation clips

use custom_debug::Debug;
use glam::Vec2;
use log::debug;

use crate::cache::{
    BoneCache, BoneCacheManager, DisplacementCache, DisplacementCacheManager, UvWarpCache,
    UvWarpCacheManager,
};
use crate::data::{ClipData, UvSwapFrame, parse_frame, read_points_2d, read_pt};
use crate::debug::trimmed_collection_fmt;
use crate::error::Result;

/// One named clip: three frame caches over `start_time..=end_time` and an
/// optional baked point cache
#[derive(Debug, Clone)]
pub struct CreatureAnimation {
    name: String,
    start_time: i32,
    end_time: i32,
    bones_cache: BoneCacheManager,
    displacement_cache: DisplacementCacheManager,
    uv_warp_cache: UvWarpCacheManager,
    #[debug(with = trimmed_collection_fmt)]
    cache_pts: Vec<Vec<f32>>,
    #[debug(with = trimmed_collection_fmt)]
    fill_cache_pts: Vec<Vec<f32>>,
}

impl CreatureAnimation {
    /// Empty clip whose caches span `start_time..=end_time`
    pub fn new(name: impl Into<String>, start_time: i32, end_time: i32) -> Self {
        let mut animation = Self {
            name: name.into(),
            start_time,
            end_time,
            bones_cache: BoneCacheManager::default(),
            displacement_cache: DisplacementCacheManager::default(),
            uv_warp_cache: UvWarpCacheManager::default(),
            cache_pts: Vec::new(),
            fill_cache_pts: Vec::new(),
        };
        animation.bones_cache.init(start_time, end_time);
        animation.displacement_cache.init(start_time, end_time);
        animation.uv_warp_cache.init(start_time, end_time);
        animation
    }

    /// Build a clip from its asset data
    ///
    /// The frame range comes from the bone table. Every cache is marked ready
    /// once filled; frames absent from the asset stay empty.
    pub fn from_data(name: impl Into<String>, clip: &ClipData) -> Result<Self> {
        let (start_time, end_time) = clip.start_end_times()?;
        let mut animation = Self::new(name, start_time, end_time);

        for (frame_key, bones) in clip.bones.iter() {
            let index = animation.bones_cache.index_by_time(parse_frame(frame_key)?);
            let snapshots = bones
                .iter()
                .map(|(key, frame)| {
                    Ok(BoneCache::new(key, frame.start_pt(key)?, frame.end_pt(key)?))
                })
                .collect::<Result<Vec<_>>>()?;
            animation.bones_cache.table_mut().set_frame(index, snapshots);
        }
        animation.bones_cache.make_all_ready();

        for (frame_key, meshes) in clip.meshes.iter() {
            let index = animation.displacement_cache.index_by_time(parse_frame(frame_key)?);
            let snapshots = meshes
                .iter()
                .map(|(key, frame)| {
                    let mut cache = DisplacementCache::new(key);
                    if frame.use_local_displacements {
                        cache.local_displacements = read_points_2d(&frame.local_displacements);
                    }
                    if frame.use_post_displacements {
                        cache.post_displacements = read_points_2d(&frame.post_displacements);
                    }
                    cache
                })
                .collect();
            animation.displacement_cache.table_mut().set_frame(index, snapshots);
        }
        animation.displacement_cache.make_all_ready();

        for (frame_key, swaps) in clip.uv_swaps.iter() {
            let index = animation.uv_warp_cache.index_by_time(parse_frame(frame_key)?);
            let snapshots = swaps
                .iter()
                .map(|(key, frame)| uv_warp_snapshot(key, frame))
                .collect::<Result<Vec<_>>>()?;
            animation.uv_warp_cache.table_mut().set_frame(index, snapshots);
        }
        animation.uv_warp_cache.make_all_ready();

        debug!(
            "Loaded clip '{}' frames {}..={}",
            animation.name, start_time, end_time
        );
        Ok(animation)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_time(&self) -> i32 {
        self.start_time
    }

    pub fn end_time(&self) -> i32 {
        self.end_time
    }

    /// Number of integer frames in the clip
    pub fn num_frames(&self) -> usize {
        usize::try_from(i64::from(self.end_time) - i64::from(self.start_time) + 1).unwrap_or(0)
    }

    pub fn bones_cache(&self) -> &BoneCacheManager {
        &self.bones_cache
    }

    pub fn bones_cache_mut(&mut self) -> &mut BoneCacheManager {
        &mut self.bones_cache
    }

    pub fn displacement_cache(&self) -> &DisplacementCacheManager {
        &self.displacement_cache
    }

    pub fn displacement_cache_mut(&mut self) -> &mut DisplacementCacheManager {
        &mut self.displacement_cache
    }

    pub fn uv_warp_cache(&self) -> &UvWarpCacheManager {
        &self.uv_warp_cache
    }

    pub fn uv_warp_cache_mut(&mut self) -> &mut UvWarpCacheManager {
        &mut self.uv_warp_cache
    }

    /// Point cache slot for `time`, clamped to the baked frames
    pub fn index_by_time(&self, time: i32) -> usize {
        let Some(last) = self.cache_pts.len().checked_sub(1) else {
            return 0;
        };
        let offset = i64::from(time) - i64::from(self.start_time);
        usize::try_from(offset).map_or(0, |i| i.min(last))
    }

    pub fn has_point_cache(&self) -> bool {
        !self.cache_pts.is_empty()
    }

    pub fn cache_pts(&self) -> &[Vec<f32>] {
        &self.cache_pts
    }

    pub fn fill_cache_pts(&self) -> &[Vec<f32>] {
        &self.fill_cache_pts
    }

    /// Append one baked frame to the pending point cache
    pub fn push_fill_cache_frame(&mut self, pts: Vec<f32>) {
        self.fill_cache_pts.push(pts);
    }

    /// Activate the pending point cache once it holds every frame
    pub fn verify_fill_cache(&mut self) -> bool {
        if self.fill_cache_pts.len() == self.num_frames() {
            self.cache_pts = std::mem::take(&mut self.fill_cache_pts);
            debug!("Point cache for '{}' activated", self.name);
            true
        } else {
            false
        }
    }

    pub fn clear_point_cache(&mut self) {
        self.cache_pts.clear();
        self.fill_cache_pts.clear();
    }

    /// Blend the baked frames around `time` into the first `num_pts` points
    /// of `target`; does nothing without a point cache
    pub fn pose_from_cache_pts(&self, time: f32, target: &mut [f32], num_pts: usize) {
        if self.cache_pts.is_empty() {
            return;
        }

        let floor = time.floor();
        let floor_pts = &self.cache_pts[self.index_by_time(floor as i32)];
        let ceil_pts = &self.cache_pts[self.index_by_time(time.ceil() as i32)];
        let ratio = time - floor;

        for ((out, &f), &c) in target
            .iter_mut()
            .zip(floor_pts)
            .zip(ceil_pts)
            .take(num_pts * 3)
        {
            *out = (1.0 - ratio) * f + ratio * c;
        }
    }
}

fn uv_warp_snapshot(key: &str, frame: &UvSwapFrame) -> Result<UvWarpCache> {
    let mut cache = UvWarpCache::new(key);
    cache.enabled = frame.enabled;
    if frame.enabled {
        let read = |values: &Option<Vec<f32>>, field: &str, default: Vec2| match values {
            Some(values) => read_pt(values, key, field),
            None => Ok(default),
        };
        cache.local_offset = read(&frame.local_offset, "local_offset", Vec2::ZERO)?;
        cache.global_offset = read(&frame.global_offset, "global_offset", Vec2::ZERO)?;
        cache.scale = read(&frame.scale, "scale", Vec2::ONE)?;
    }
    Ok(cache)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn clip() -> ClipData {
        serde_json::from_value(json!({
            "bones": {
                "1": { "root": { "start_pt": [0.0, 0.0], "end_pt": [1.0, 0.0] } },
                "3": { "root": { "start_pt": [2.0, 0.0], "end_pt": [3.0, 0.0] } }
            },
            "meshes": {
                "1": { "body": {
                    "use_local_displacements": true,
                    "use_post_displacements": false,
                    "local_displacements": [1.0, 2.0, 3.0, 4.0]
                } }
            },
            "uv_swaps": {
                "2": { "body": { "enabled": true, "local_offset": [0.5, 0.5] } }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_from_data() {
        let animation = CreatureAnimation::from_data("walk", &clip()).unwrap();

        assert_eq!(animation.name(), "walk");
        assert_eq!((animation.start_time(), animation.end_time()), (1, 3));
        assert_eq!(animation.num_frames(), 3);

        let bones = animation.bones_cache().table();
        assert_eq!(bones.len(), 3);
        assert!(bones.frame(1).is_empty());
        assert_eq!(bones.frame(2)[0].world_start_pt, glam::Vec3::new(2.0, 0.0, 0.0));

        let displacement = &animation.displacement_cache().table().frame(0)[0];
        assert_eq!(
            displacement.local_displacements,
            vec![Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0)]
        );
        assert!(displacement.post_displacements.is_empty());

        let uv = &animation.uv_warp_cache().table().frame(1)[0];
        assert!(uv.enabled);
        assert_eq!(uv.local_offset, Vec2::new(0.5, 0.5));
        assert_eq!(uv.scale, Vec2::ONE);
    }

    #[test]
    fn test_caches_ready_after_load() {
        let mut animation = CreatureAnimation::from_data("walk", &clip()).unwrap();
        assert!(animation.bones_cache_mut().all_ready());
        assert!(animation.displacement_cache_mut().all_ready());
        assert!(animation.uv_warp_cache_mut().all_ready());
    }

    #[test]
    fn test_fill_cache_switches_when_complete() {
        let mut animation = CreatureAnimation::new("idle", 0, 2);

        animation.push_fill_cache_frame(vec![0.0; 3]);
        animation.push_fill_cache_frame(vec![1.0; 3]);
        assert!(!animation.verify_fill_cache());
        assert!(!animation.has_point_cache());

        animation.push_fill_cache_frame(vec![2.0; 3]);
        assert!(animation.verify_fill_cache());
        assert!(animation.has_point_cache());
        assert!(animation.fill_cache_pts().is_empty());

        animation.clear_point_cache();
        assert!(!animation.has_point_cache());
    }

    #[test]
    fn test_pose_from_cache_pts() {
        let mut animation = CreatureAnimation::new("idle", 10, 11);
        animation.push_fill_cache_frame(vec![0.0, 0.0, 0.0, 2.0, 2.0, 2.0]);
        animation.push_fill_cache_frame(vec![4.0, 4.0, 4.0, 6.0, 6.0, 6.0]);
        assert!(animation.verify_fill_cache());

        let mut target = [9.0; 6];
        animation.pose_from_cache_pts(10.25, &mut target, 2);
        assert_eq!(target, [1.0, 1.0, 1.0, 3.0, 3.0, 3.0]);

        animation.pose_from_cache_pts(-5.0, &mut target, 1);
        assert_eq!(target, [0.0, 0.0, 0.0, 3.0, 3.0, 3.0]);

        animation.pose_from_cache_pts(40.0, &mut target, 2);
        assert_eq!(target, [4.0, 4.0, 4.0, 6.0, 6.0, 6.0]);
    }

    #[test]
    fn test_pose_without_cache_is_noop() {
        let animation = CreatureAnimation::new("idle", 0, 1);
        let mut target = [7.0; 3];
        animation.pose_from_cache_pts(0.5, &mut target, 1);
        assert_eq!(target, [7.0; 3]);
    }
}
