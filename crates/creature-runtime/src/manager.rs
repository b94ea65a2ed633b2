//! Playback controller
//!
//! [`CreatureManager`] owns a [`Creature`] and its clips, advances time, and
//! runs the per-frame pipeline: sample the active clip's caches into the
//! bones and regions, propagate bone transforms, skin every region into the
//! creature's render buffer. Two clips can be cross-faded, and any clip can
//! be baked into a point cache that replaces live skinning.

use std::collections::HashMap;
use std::fmt;

use bitflags::bitflags;
use glam::Vec2;
use log::{debug, trace};

use crate::animation::CreatureAnimation;
use crate::bone::{BoneId, Skeleton};
use crate::cache::{DisplacementCache, Retrieval, UvWarpCache};
use crate::creature::Creature;
use crate::data::CreatureData;
use crate::error::{CreatureError, Result};

/// Frames advanced per unit of `update` delta
pub const DEFAULT_TIME_SCALE: f32 = 30.0;

bitflags! {
    /// Independent playback switches
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PlaybackFlags: u8 {
        /// `update` and `run_at_time` advance and pose
        const PLAYING      = 0b0001;
        /// Leaving the time range wraps to the opposite end instead of clamping
        const LOOP         = 0b0010;
        /// The custom time range replaces the active clip's own range
        const CUSTOM_RANGE = 0b0100;
        /// Two clips are posed and cross-faded
        const BLENDING     = 0b1000;
    }
}

impl Default for PlaybackFlags {
    fn default() -> Self {
        Self::LOOP
    }
}

/// Hook run after bone endpoints are sampled and before transforms propagate
pub type BonesOverrideCallback = Box<dyn FnMut(&mut Skeleton, &HashMap<String, BoneId>)>;

pub struct CreatureManager {
    target_creature: Creature,
    animations: HashMap<String, CreatureAnimation>,
    animation_order: Vec<String>,
    active_animation_name: Option<String>,
    flags: PlaybackFlags,
    run_time: f32,
    time_scale: f32,
    custom_start_time: f32,
    custom_end_time: f32,
    blending_factor: f32,
    blend_render_pts: [Vec<f32>; 2],
    active_blend_animation_names: [String; 2],
    bones_override_callback: Option<BonesOverrideCallback>,
}

impl fmt::Debug for CreatureManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatureManager")
            .field("target_creature", &self.target_creature)
            .field("animations", &self.animation_order)
            .field("active_animation_name", &self.active_animation_name)
            .field("flags", &self.flags)
            .field("run_time", &self.run_time)
            .field("time_scale", &self.time_scale)
            .field("custom_range", &(self.custom_start_time, self.custom_end_time))
            .field("blending_factor", &self.blending_factor)
            .field("active_blend_animation_names", &self.active_blend_animation_names)
            .field("bones_override_callback", &self.bones_override_callback.is_some())
            .finish()
    }
}

impl CreatureManager {
    pub fn new(target_creature: Creature) -> Self {
        Self {
            target_creature,
            animations: HashMap::new(),
            animation_order: Vec::new(),
            active_animation_name: None,
            flags: PlaybackFlags::default(),
            run_time: 0.0,
            time_scale: DEFAULT_TIME_SCALE,
            custom_start_time: 0.0,
            custom_end_time: 0.0,
            blending_factor: 0.0,
            blend_render_pts: [Vec::new(), Vec::new()],
            active_blend_animation_names: [String::new(), String::new()],
            bones_override_callback: None,
        }
    }

    pub fn creature(&self) -> &Creature {
        &self.target_creature
    }

    pub fn creature_mut(&mut self) -> &mut Creature {
        &mut self.target_creature
    }

    /// Build the clip `name` from `data` and register it
    pub fn create_animation(&mut self, data: &CreatureData, name: &str) -> Result<()> {
        let clip = data
            .animation
            .get(name)
            .ok_or_else(|| CreatureError::UnknownAnimation(name.to_string()))?;
        self.add_animation(CreatureAnimation::from_data(name, clip)?);
        Ok(())
    }

    /// Build every clip in `data` and activate the first one in document
    /// order
    pub fn create_all_animations(&mut self, data: &CreatureData) -> Result<()> {
        let names = data.animation_names();
        for name in &names {
            self.create_animation(data, name)?;
        }

        if let Some(first) = names.first() {
            self.set_active_animation_name(first, false);
        }
        Ok(())
    }

    /// Register a clip, replacing any clip of the same name in place
    pub fn add_animation(&mut self, animation: CreatureAnimation) {
        let name = animation.name().to_string();
        if self.animations.insert(name.clone(), animation).is_none() {
            self.animation_order.push(name);
        }
    }

    pub fn animation(&self, name: &str) -> Option<&CreatureAnimation> {
        self.animations.get(name)
    }

    pub fn animation_mut(&mut self, name: &str) -> Option<&mut CreatureAnimation> {
        self.animations.get_mut(name)
    }

    /// Registered clip names in the order they were added
    pub fn animation_names(&self) -> Vec<&str> {
        self.animation_order.iter().map(String::as_str).collect()
    }

    /// Make `name` the active clip and rewind to its start
    ///
    /// Each region's displacement and UV warp overlays are switched on or off
    /// according to the clip's first frame. Returns `false` when the clip is
    /// unknown, or when `check_already_active` is set and it is already
    /// active.
    pub fn set_active_animation_name(&mut self, name: &str, check_already_active: bool) -> bool {
        let Some(animation) = self.animations.get(name) else {
            return false;
        };
        if check_already_active && self.active_animation_name.as_deref() == Some(name) {
            return false;
        }

        let displacements = first_frame(animation.displacement_cache().table());
        let uv_warps = first_frame(animation.uv_warp_cache().table());
        let overlays: Vec<(bool, bool, bool)> = self
            .target_creature
            .composition()
            .regions()
            .iter()
            .map(|region| {
                let displacement: Option<&DisplacementCache> =
                    displacements.iter().find(|d| d.key == region.name());
                let uv_warp: Option<&UvWarpCache> = uv_warps.iter().find(|u| u.key == region.name());
                (
                    displacement.is_some_and(|d| !d.local_displacements.is_empty()),
                    displacement.is_some_and(|d| !d.post_displacements.is_empty()),
                    uv_warp.is_some_and(|u| u.enabled),
                )
            })
            .collect();

        self.run_time = animation.start_time() as f32;
        for (i, (local, post, uv_warp)) in overlays.into_iter().enumerate() {
            self.target_creature
                .set_region_overlays(i, local, post, uv_warp);
        }

        debug!("Active animation set to '{name}'");
        self.active_animation_name = Some(name.to_string());
        true
    }

    pub fn active_animation_name(&self) -> Option<&str> {
        self.active_animation_name.as_deref()
    }

    /// Bake every frame of `name` into its point cache
    ///
    /// Frames are posed at their own frame time; the playback time is left
    /// alone. A clip that already has a point cache is skipped.
    pub fn make_point_cache(&mut self, name: &str) -> Result<()> {
        let animation = self
            .animations
            .get(name)
            .ok_or_else(|| CreatureError::UnknownAnimation(name.to_string()))?;
        if animation.has_point_cache() {
            debug!("Point cache for '{name}' already exists");
            return Ok(());
        }

        let (start, end) = (animation.start_time(), animation.end_time());
        let num_floats = self.target_creature.total_num_pts() * 3;
        let mut frames = Vec::with_capacity(animation.num_frames());
        for frame in start..=end {
            let mut pts = vec![0.0; num_floats];
            self.pose_creature_at(name, frame as f32, &mut pts)?;
            frames.push(pts);
        }

        let animation = self
            .animations
            .get_mut(name)
            .ok_or_else(|| CreatureError::UnknownAnimation(name.to_string()))?;
        animation.clear_point_cache();
        for pts in frames {
            animation.push_fill_cache_frame(pts);
        }
        animation.verify_fill_cache();
        Ok(())
    }

    /// Pose `name` at `time` and append the result to its pending point
    /// cache; frames must be filled in order
    ///
    /// Returns `true` once the cache holds every frame and has been
    /// activated.
    pub fn fill_single_point_cache_frame(&mut self, name: &str, time: f32) -> Result<bool> {
        let mut pts = vec![0.0; self.target_creature.total_num_pts() * 3];
        self.pose_creature_at(name, time, &mut pts)?;

        let animation = self
            .animations
            .get_mut(name)
            .ok_or_else(|| CreatureError::UnknownAnimation(name.to_string()))?;
        animation.push_fill_cache_frame(pts);
        Ok(animation.verify_fill_cache())
    }

    pub fn flags(&self) -> PlaybackFlags {
        self.flags
    }

    pub fn is_playing(&self) -> bool {
        self.flags.contains(PlaybackFlags::PLAYING)
    }

    pub fn set_is_playing(&mut self, flag: bool) {
        self.flags.set(PlaybackFlags::PLAYING, flag);
    }

    pub fn should_loop(&self) -> bool {
        self.flags.contains(PlaybackFlags::LOOP)
    }

    pub fn set_should_loop(&mut self, flag: bool) {
        self.flags.set(PlaybackFlags::LOOP, flag);
    }

    pub fn use_custom_time_range(&self) -> bool {
        self.flags.contains(PlaybackFlags::CUSTOM_RANGE)
    }

    pub fn set_use_custom_time_range(&mut self, flag: bool) {
        self.flags.set(PlaybackFlags::CUSTOM_RANGE, flag);
    }

    pub fn set_custom_time_range(&mut self, start_time: f32, end_time: f32) {
        self.custom_start_time = start_time;
        self.custom_end_time = end_time;
    }

    pub fn custom_time_range(&self) -> (f32, f32) {
        (self.custom_start_time, self.custom_end_time)
    }

    /// Rewind to the active clip's first frame
    pub fn reset_to_start_times(&mut self) -> Result<()> {
        let animation = self.active_animation()?;
        self.run_time = animation.start_time() as f32;
        Ok(())
    }

    pub fn run_time(&self) -> f32 {
        self.run_time
    }

    pub fn set_run_time(&mut self, time: f32) {
        self.run_time = time;
        self.correct_time();
    }

    pub fn incre_run_time(&mut self, delta: f32) {
        self.run_time += delta;
        self.correct_time();
    }

    /// Wrap (looping) or clamp `run_time` into the current time range
    fn correct_time(&mut self) {
        let (start, end) = if self.use_custom_time_range() {
            (self.custom_start_time, self.custom_end_time)
        } else if let Some(animation) = self.active_animation_name.as_deref().and_then(|n| self.animations.get(n)) {
            (animation.start_time() as f32, animation.end_time() as f32)
        } else {
            return;
        };

        let looping = self.should_loop();
        if self.run_time > end {
            self.run_time = if looping { start } else { end };
        } else if self.run_time < start {
            self.run_time = if looping { end } else { start };
        }
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale;
    }

    /// Advance by `delta * time_scale` frames and pose; does nothing while
    /// paused
    pub fn update(&mut self, delta: f32) -> Result<()> {
        if !self.is_playing() {
            return Ok(());
        }

        self.incre_run_time(delta * self.time_scale);
        self.run_creature()
    }

    /// Jump to `time` and pose; does nothing while paused
    pub fn run_at_time(&mut self, time: f32) -> Result<()> {
        if !self.is_playing() {
            return Ok(());
        }

        self.set_run_time(time);
        self.run_creature()
    }

    /// Pose the current time into the creature's render buffer
    pub fn run_creature(&mut self) -> Result<()> {
        let time = self.run_time;
        let mut render_pts = std::mem::take(self.target_creature.render_pts_mut());
        let result = if self.is_blending() {
            self.run_blended(time, &mut render_pts)
        } else {
            match self.active_animation_name.clone() {
                Some(name) => self.pose_or_cached(&name, time, &mut render_pts),
                None => Err(CreatureError::NoActiveAnimation),
            }
        };
        *self.target_creature.render_pts_mut() = render_pts;
        result
    }

    fn run_blended(&mut self, time: f32, render_pts: &mut [f32]) -> Result<()> {
        let num_floats = self.target_creature.total_num_pts() * 3;
        let mut blend = std::mem::take(&mut self.blend_render_pts);
        let names = self.active_blend_animation_names.clone();

        let mut result = Ok(());
        for (buffer, name) in blend.iter_mut().zip(&names) {
            buffer.resize(num_floats, 0.0);
            result = self.pose_or_cached(name, time, buffer);
            if result.is_err() {
                break;
            }
        }

        if result.is_ok() {
            let factor = self.blending_factor;
            for ((out, &a), &b) in render_pts.iter_mut().zip(&blend[0]).zip(&blend[1]) {
                *out = (1.0 - factor) * a + factor * b;
            }
        }

        self.blend_render_pts = blend;
        result
    }

    fn pose_or_cached(&mut self, name: &str, time: f32, target: &mut [f32]) -> Result<()> {
        let animation = self
            .animations
            .get(name)
            .ok_or_else(|| CreatureError::UnknownAnimation(name.to_string()))?;

        if animation.has_point_cache() {
            trace!("Posing '{name}' at {time} from point cache");
            animation.pose_from_cache_pts(time, target, self.target_creature.total_num_pts());
            Ok(())
        } else {
            self.pose_creature_at(name, time, target)
        }
    }

    /// Live-pose clip `name` at the current run time into `target`
    pub fn pose_creature(&mut self, name: &str, target: &mut [f32]) -> Result<()> {
        self.pose_creature_at(name, self.run_time, target)
    }

    fn pose_creature_at(&mut self, name: &str, time: f32, target: &mut [f32]) -> Result<()> {
        let animation = self
            .animations
            .get(name)
            .ok_or_else(|| CreatureError::UnknownAnimation(name.to_string()))?;
        let composition = self.target_creature.composition_mut();

        note_retrieval(
            "bone",
            name,
            time,
            animation.bones_cache().retrieve_values_at_time(time, composition),
        );

        if let Some(callback) = self.bones_override_callback.as_mut() {
            let (skeleton, bones_map) = composition.bones_mut();
            callback(skeleton, bones_map);
        }

        note_retrieval(
            "displacement",
            name,
            time,
            animation
                .displacement_cache()
                .retrieve_values_at_time(time, composition),
        );
        note_retrieval(
            "UV warp",
            name,
            time,
            animation.uv_warp_cache().retrieve_values_at_time(time, composition),
        );

        composition.update_all_transforms(false)?;
        self.target_creature.pose_regions(target);
        Ok(())
    }

    pub fn is_blending(&self) -> bool {
        self.flags.contains(PlaybackFlags::BLENDING)
    }

    /// Toggle cross-fading; enabling allocates the two blend buffers
    pub fn set_blending(&mut self, flag: bool) {
        self.flags.set(PlaybackFlags::BLENDING, flag);
        if flag {
            let num_floats = self.target_creature.total_num_pts() * 3;
            for buffer in &mut self.blend_render_pts {
                if buffer.is_empty() {
                    *buffer = vec![0.0; num_floats];
                }
            }
        }
    }

    pub fn set_blending_animations(&mut self, first: &str, second: &str) {
        self.active_blend_animation_names = [first.to_string(), second.to_string()];
    }

    pub fn blending_animations(&self) -> [&str; 2] {
        [
            &self.active_blend_animation_names[0],
            &self.active_blend_animation_names[1],
        ]
    }

    /// Weight of the second blend clip, `0.0..=1.0`
    pub fn set_blending_factor(&mut self, value: f32) {
        self.blending_factor = value;
    }

    pub fn blending_factor(&self) -> f32 {
        self.blending_factor
    }

    pub fn set_bones_override_callback(&mut self, callback: BonesOverrideCallback) {
        self.bones_override_callback = Some(callback);
    }

    pub fn clear_bones_override_callback(&mut self) {
        self.bones_override_callback = None;
    }

    /// First bone (pre-order) whose current segment passes within `radius`
    /// of `pt`
    pub fn is_contact_bone(&self, pt: Vec2, radius: f32) -> Option<BoneId> {
        let skeleton = self.target_creature.composition().skeleton();
        skeleton.contact_bone(skeleton.root(), pt, radius)
    }

    fn active_animation(&self) -> Result<&CreatureAnimation> {
        let name = self
            .active_animation_name
            .as_deref()
            .ok_or(CreatureError::NoActiveAnimation)?;
        self.animations
            .get(name)
            .ok_or_else(|| CreatureError::UnknownAnimation(name.to_string()))
    }
}

fn first_frame<T>(table: &crate::cache::FrameTable<T>) -> &[T] {
    if table.is_empty() { &[] } else { table.frame(0) }
}

fn note_retrieval(kind: &str, name: &str, time: f32, retrieval: Retrieval) {
    if retrieval == Retrieval::NotReady {
        debug!("{kind} cache of '{name}' not ready at {time}");
    }
}
