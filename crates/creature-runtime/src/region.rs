//! Render regions: contiguous vertex ranges skinned to a set of bones

use std::collections::HashMap;
use std::ops::Range;

use custom_debug::Debug;
use glam::{Vec2, Vec3};

use crate::bone::{BoneId, Skeleton};
use crate::debug::trimmed_collection_fmt;
use crate::dual_quat::DualQuat;
use crate::error::{CreatureError, Result};

/// Bones weighing this much or less on a vertex are left out of its blend
pub const WEIGHT_CUTOFF: f32 = 0.05;

/// A slice of the creature mesh posed as one unit
///
/// A region does not own mesh data. It records point and index ranges into
/// the creature's global buffers, and every posing call receives the matching
/// sub-slices. Ranges are inclusive on both ends.
#[derive(Debug, Clone)]
pub struct RenderRegion {
    name: String,
    tag_id: i32,
    start_pt_index: usize,
    end_pt_index: usize,
    start_index: usize,
    end_index: usize,

    use_local_displacements: bool,
    use_post_displacements: bool,
    use_uv_warp: bool,
    #[debug(with = trimmed_collection_fmt)]
    local_displacements: Vec<Vec2>,
    #[debug(with = trimmed_collection_fmt)]
    post_displacements: Vec<Vec2>,

    uv_warp_local_offset: Vec2,
    uv_warp_global_offset: Vec2,
    uv_warp_scale: Vec2,
    #[debug(with = trimmed_collection_fmt)]
    uv_warp_ref_uvs: Vec<Vec2>,

    #[debug(skip)]
    normal_weight_map: HashMap<String, Vec<f32>>,
    #[debug(skip)]
    fast_bones_map: Vec<BoneId>,
    #[debug(skip)]
    fast_normal_weight_map: Vec<Vec<f32>>,
    #[debug(skip)]
    relevant_bones_indices: Vec<Vec<usize>>,
}

impl RenderRegion {
    /// Create a region over points `start_pt_index..=end_pt_index` and
    /// indices `start_index..=end_index`
    ///
    /// The current contents of `uvs` (the creature's global UV buffer) become
    /// the reference UVs restored when UV warping is switched off.
    pub fn new(
        name: impl Into<String>,
        start_pt_index: usize,
        end_pt_index: usize,
        start_index: usize,
        end_index: usize,
        uvs: &[f32],
    ) -> Result<Self> {
        let name = name.into();
        if end_pt_index < start_pt_index || end_index < start_index {
            return Err(CreatureError::InvalidAsset(format!(
                "region '{name}' has an inverted range"
            )));
        }

        let mut region = Self {
            name,
            tag_id: -1,
            start_pt_index,
            end_pt_index,
            start_index,
            end_index,
            use_local_displacements: false,
            use_post_displacements: false,
            use_uv_warp: false,
            local_displacements: Vec::new(),
            post_displacements: Vec::new(),
            uv_warp_local_offset: Vec2::ZERO,
            uv_warp_global_offset: Vec2::ZERO,
            uv_warp_scale: Vec2::ONE,
            uv_warp_ref_uvs: Vec::new(),
            normal_weight_map: HashMap::new(),
            fast_bones_map: Vec::new(),
            fast_normal_weight_map: Vec::new(),
            relevant_bones_indices: Vec::new(),
        };

        let uv_range = region.uv_range();
        let region_uvs = uvs.get(uv_range).ok_or_else(|| {
            CreatureError::InvalidAsset(format!(
                "region '{}' points {}..={} exceed the UV buffer",
                region.name, start_pt_index, end_pt_index
            ))
        })?;
        region.uv_warp_ref_uvs = region_uvs
            .chunks_exact(2)
            .map(|uv| Vec2::new(uv[0], uv[1]))
            .collect();

        Ok(region)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag_id(&self) -> i32 {
        self.tag_id
    }

    pub fn set_tag_id(&mut self, value: i32) {
        self.tag_id = value;
    }

    pub fn start_pt_index(&self) -> usize {
        self.start_pt_index
    }

    pub fn end_pt_index(&self) -> usize {
        self.end_pt_index
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    pub fn end_index(&self) -> usize {
        self.end_index
    }

    pub fn num_pts(&self) -> usize {
        self.end_pt_index - self.start_pt_index + 1
    }

    pub fn num_indices(&self) -> usize {
        self.end_index - self.start_index + 1
    }

    /// Offset of the first point in a flat xyz buffer
    pub fn rest_pts_index(&self) -> usize {
        3 * self.start_pt_index
    }

    /// Offset of the first UV in a flat uv buffer
    pub fn uvs_index(&self) -> usize {
        2 * self.start_pt_index
    }

    /// Range of this region's floats in a flat xyz buffer
    pub fn pt_range(&self) -> Range<usize> {
        self.rest_pts_index()..3 * (self.end_pt_index + 1)
    }

    /// Range of this region's floats in a flat uv buffer
    pub fn uv_range(&self) -> Range<usize> {
        self.uvs_index()..2 * (self.end_pt_index + 1)
    }

    /// Range of this region's entries in the index buffer
    pub fn index_range(&self) -> Range<usize> {
        self.start_index..self.end_index + 1
    }

    /// Whether point `pt` (a global point index) belongs to this region
    pub fn contains_pt(&self, pt: usize) -> bool {
        (self.start_pt_index..=self.end_pt_index).contains(&pt)
    }

    /// Rest position (x, y) of the region's `index`-th point
    pub fn rest_local_pt(&self, rest_pts: &[f32], index: usize) -> Vec2 {
        let read = self.rest_pts_index() + 3 * index;
        Vec2::new(rest_pts[read], rest_pts[read + 1])
    }

    /// The region's `index`-th entry of the index buffer
    pub fn local_index(&self, indices: &[u32], index: usize) -> u32 {
        indices[self.start_index + index]
    }

    /// Per-vertex weights of one bone
    pub fn set_normal_weights(&mut self, bone: impl Into<String>, weights: Vec<f32>) {
        self.normal_weight_map.insert(bone.into(), weights);
    }

    pub fn normal_weights(&self, bone: &str) -> Option<&[f32]> {
        self.normal_weight_map.get(bone).map(Vec::as_slice)
    }

    /// Build the dense per-bone weight table and the per-vertex list of
    /// bones that actually influence each vertex
    ///
    /// Bones are visited in skeleton pre-order. A bone with no weights for
    /// this region weighs 0 everywhere, as does any vertex past the end of a
    /// short weight array.
    pub fn init_fast_normal_weight_map(&mut self, skeleton: &Skeleton) {
        let num_pts = self.num_pts();
        let bones = skeleton.all_children(skeleton.root());

        self.fast_normal_weight_map = bones
            .iter()
            .map(|&id| {
                let weights = self.normal_weight_map.get(skeleton.bone(id).key());
                (0..num_pts)
                    .map(|i| weights.and_then(|w| w.get(i)).copied().unwrap_or(0.0))
                    .collect()
            })
            .collect();

        self.relevant_bones_indices = (0..num_pts)
            .map(|i| {
                self.fast_normal_weight_map
                    .iter()
                    .enumerate()
                    .filter(|(_, weights)| weights[i] > WEIGHT_CUTOFF)
                    .map(|(j, _)| j)
                    .collect()
            })
            .collect();

        self.fast_bones_map = bones;
    }

    /// Bones (as indices into the fast tables) influencing vertex `i`
    pub fn relevant_bones(&self, i: usize) -> &[usize] {
        &self.relevant_bones_indices[i]
    }

    /// Bones in fast table order
    pub fn fast_bones(&self) -> &[BoneId] {
        &self.fast_bones_map
    }

    /// Skin every vertex of the region
    ///
    /// `rest_pts` is the creature's global rest buffer; `out` and `uvs` are
    /// this region's own sub-slices ([`Self::pt_range`] and
    /// [`Self::uv_range`]) of the output and UV buffers.
    pub fn pose_final_pts(
        &self,
        rest_pts: &[f32],
        out: &mut [f32],
        uvs: &mut [f32],
        skeleton: &Skeleton,
    ) {
        let rest = &rest_pts[self.pt_range()];
        let mut accum = DualQuat::ZERO;

        for (i, (rest_pt, out_pt)) in rest
            .chunks_exact(3)
            .zip(out.chunks_exact_mut(3))
            .enumerate()
        {
            let mut cur_rest_pt = Vec3::new(rest_pt[0], rest_pt[1], rest_pt[2]);
            if self.use_local_displacements {
                let disp = self.local_displacements[i];
                cur_rest_pt.x += disp.x;
                cur_rest_pt.y += disp.y;
            }

            accum.reset();
            for &j in &self.relevant_bones_indices[i] {
                let weight = self.fast_normal_weight_map[j][i];
                let world_dq = skeleton.bone(self.fast_bones_map[j]).world_dq();
                accum.add(world_dq, weight, weight);
            }
            accum.normalize();

            let mut final_pt = accum.transform(cur_rest_pt);
            if self.use_post_displacements {
                let disp = self.post_displacements[i];
                final_pt.x += disp.x;
                final_pt.y += disp.y;
            }

            out_pt.copy_from_slice(&final_pt.to_array());
        }

        if self.use_uv_warp {
            self.run_uv_warp(uvs);
        }
    }

    pub fn use_local_displacements(&self) -> bool {
        self.use_local_displacements
    }

    /// Toggle local displacements, allocating a zeroed array when enabling
    /// with an array of the wrong size
    pub fn set_use_local_displacements(&mut self, flag: bool) {
        self.use_local_displacements = flag;
        if flag && self.local_displacements.len() != self.num_pts() {
            self.local_displacements = vec![Vec2::ZERO; self.num_pts()];
        }
    }

    pub fn use_post_displacements(&self) -> bool {
        self.use_post_displacements
    }

    /// Toggle post displacements, allocating a zeroed array when enabling
    /// with an array of the wrong size
    pub fn set_use_post_displacements(&mut self, flag: bool) {
        self.use_post_displacements = flag;
        if flag && self.post_displacements.len() != self.num_pts() {
            self.post_displacements = vec![Vec2::ZERO; self.num_pts()];
        }
    }

    pub fn local_displacements(&self) -> &[Vec2] {
        &self.local_displacements
    }

    pub fn local_displacements_mut(&mut self) -> &mut [Vec2] {
        &mut self.local_displacements
    }

    pub fn post_displacements(&self) -> &[Vec2] {
        &self.post_displacements
    }

    pub fn post_displacements_mut(&mut self) -> &mut [Vec2] {
        &mut self.post_displacements
    }

    pub fn clear_local_displacements(&mut self) {
        self.local_displacements.fill(Vec2::ZERO);
    }

    pub fn clear_post_displacements(&mut self) {
        self.post_displacements.fill(Vec2::ZERO);
    }

    pub fn use_uv_warp(&self) -> bool {
        self.use_uv_warp
    }

    /// Toggle UV warping; switching it off writes the reference UVs back
    /// into `uvs` (this region's UV sub-slice)
    pub fn set_use_uv_warp(&mut self, flag: bool, uvs: &mut [f32]) {
        self.use_uv_warp = flag;
        if !flag {
            self.restore_ref_uv(uvs);
        }
    }

    pub fn uv_warp_local_offset(&self) -> Vec2 {
        self.uv_warp_local_offset
    }

    pub fn set_uv_warp_local_offset(&mut self, offset: Vec2) {
        self.uv_warp_local_offset = offset;
    }

    pub fn uv_warp_global_offset(&self) -> Vec2 {
        self.uv_warp_global_offset
    }

    pub fn set_uv_warp_global_offset(&mut self, offset: Vec2) {
        self.uv_warp_global_offset = offset;
    }

    pub fn uv_warp_scale(&self) -> Vec2 {
        self.uv_warp_scale
    }

    pub fn set_uv_warp_scale(&mut self, scale: Vec2) {
        self.uv_warp_scale = scale;
    }

    pub fn uv_warp_ref_uvs(&self) -> &[Vec2] {
        &self.uv_warp_ref_uvs
    }

    /// Write `(ref - local_offset) * scale + global_offset` for every
    /// reference UV into `uvs`
    pub fn run_uv_warp(&self, uvs: &mut [f32]) {
        for (ref_uv, uv) in self.uv_warp_ref_uvs.iter().zip(uvs.chunks_exact_mut(2)) {
            let warped =
                (*ref_uv - self.uv_warp_local_offset) * self.uv_warp_scale + self.uv_warp_global_offset;
            uv.copy_from_slice(&warped.to_array());
        }
    }

    /// Write the reference UVs back into `uvs`
    pub fn restore_ref_uv(&self, uvs: &mut [f32]) {
        for (ref_uv, uv) in self.uv_warp_ref_uvs.iter().zip(uvs.chunks_exact_mut(2)) {
            uv.copy_from_slice(&ref_uv.to_array());
        }
    }
}
