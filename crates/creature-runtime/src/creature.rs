//! Mesh container: global buffers, the bone composition and render output

use std::collections::{HashMap, HashSet};
use std::path::Path;

use custom_debug::Debug;
use glam::Vec2;
use log::{debug, warn};

use crate::bone::{Bone, BoneId, Skeleton};
use crate::composition::BoneComposition;
use crate::data::{CreatureData, OrderedMap, SkeletonNode};
use crate::debug::trimmed_collection_fmt;
use crate::error::{CreatureError, Result};
use crate::region::RenderRegion;

/// Depth offset between consecutive regions; region `j` is pushed to
/// `z = -j * REGION_Z_STEP`
pub const REGION_Z_STEP: f32 = 0.001;

/// Points referenced by at most this many region indices lie on the boundary
pub const BOUNDARY_MAX_REFERENCES: usize = 5;

/// A loaded character mesh
#[derive(Debug, Clone)]
pub struct Creature {
    #[debug(with = trimmed_collection_fmt)]
    global_pts: Vec<f32>,
    #[debug(with = trimmed_collection_fmt)]
    global_indices: Vec<u32>,
    #[debug(with = trimmed_collection_fmt)]
    global_uvs: Vec<f32>,
    #[debug(with = trimmed_collection_fmt)]
    render_colours: Vec<f32>,
    #[debug(with = trimmed_collection_fmt)]
    render_pts: Vec<f32>,
    render_composition: BoneComposition,
    #[debug(with = trimmed_collection_fmt)]
    boundary_indices: Vec<usize>,
    boundary_min: Vec2,
    boundary_max: Vec2,
}

impl Creature {
    /// Build the mesh, skeleton and regions and put everything in rest pose
    pub fn from_data(data: &CreatureData) -> Result<Self> {
        let mesh = &data.mesh;
        if mesh.points.len() % 2 != 0 {
            return Err(CreatureError::InvalidAsset(
                "mesh points must be xy pairs".to_string(),
            ));
        }

        let global_pts = mesh.points_3d();
        let total_num_pts = global_pts.len() / 3;

        let mut skeleton = create_bones(&data.skeleton)?;
        let root = skeleton.root();
        skeleton.compute_rest_parent_transforms(root)?;

        let mut composition = BoneComposition::new(skeleton);
        for (name, region_data) in mesh.regions.iter() {
            if region_data.end_pt_index >= total_num_pts
                || region_data.end_index >= mesh.indices.len()
            {
                return Err(CreatureError::InvalidAsset(format!(
                    "region '{name}' exceeds the mesh ({total_num_pts} points, {} indices)",
                    mesh.indices.len()
                )));
            }

            let mut region = RenderRegion::new(
                name,
                region_data.start_pt_index,
                region_data.end_pt_index,
                region_data.start_index,
                region_data.end_index,
                &mesh.uvs,
            )?;
            region.set_tag_id(region_data.id);
            for (bone, weights) in region_data.weights.iter() {
                if composition.bone_by_key(bone).is_none() {
                    return Err(CreatureError::UnknownBone(format!(
                        "{bone} (weighted by region '{name}')"
                    )));
                }
                region.set_normal_weights(bone, weights.clone());
            }
            composition.add_region(region);
        }
        check_disjoint(composition.regions())?;

        composition.init_bone_map();
        composition.init_regions_map();
        let (skeleton, regions) = composition.split_mut();
        for region in regions {
            region.init_fast_normal_weight_map(skeleton);
        }
        composition.reset_to_world_rest_pts();

        debug!(
            "Loaded creature: {} points, {} indices, {} bones, {} regions",
            total_num_pts,
            mesh.indices.len(),
            composition.bones_map().len(),
            composition.regions().len()
        );

        Ok(Self {
            render_pts: global_pts.clone(),
            global_pts,
            global_indices: mesh.indices.clone(),
            global_uvs: mesh.uvs.clone(),
            render_colours: vec![1.0; total_num_pts * 4],
            render_composition: composition,
            boundary_indices: Vec::new(),
            boundary_min: Vec2::ZERO,
            boundary_max: Vec2::ZERO,
        })
    }

    /// Load and build a creature from a JSON asset on disk
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_data(&CreatureData::from_path(path)?)
    }

    pub fn total_num_pts(&self) -> usize {
        self.global_pts.len() / 3
    }

    pub fn total_num_indices(&self) -> usize {
        self.global_indices.len()
    }

    /// Rest pose, flat xyz
    pub fn global_pts(&self) -> &[f32] {
        &self.global_pts
    }

    pub fn global_indices(&self) -> &[u32] {
        &self.global_indices
    }

    /// Current UVs, flat uv; UV warping writes here
    pub fn global_uvs(&self) -> &[f32] {
        &self.global_uvs
    }

    /// Posed output of the last frame, flat xyz
    pub fn render_pts(&self) -> &[f32] {
        &self.render_pts
    }

    pub fn render_pts_mut(&mut self) -> &mut Vec<f32> {
        &mut self.render_pts
    }

    /// Flat rgba per point
    pub fn render_colours(&self) -> &[f32] {
        &self.render_colours
    }

    pub fn composition(&self) -> &BoneComposition {
        &self.render_composition
    }

    pub fn composition_mut(&mut self) -> &mut BoneComposition {
        &mut self.render_composition
    }

    pub fn fill_render_colours(&mut self, r: f32, g: f32, b: f32, a: f32) {
        for colour in self.render_colours.chunks_exact_mut(4) {
            colour.copy_from_slice(&[r, g, b, a]);
        }
    }

    /// Switch the overlays of region `index`
    ///
    /// Turning UV warping off restores the region's reference UVs.
    pub fn set_region_overlays(
        &mut self,
        index: usize,
        local_displacements: bool,
        post_displacements: bool,
        uv_warp: bool,
    ) {
        let Some(region) = self.render_composition.regions_mut().get_mut(index) else {
            return;
        };
        region.set_use_local_displacements(local_displacements);
        region.set_use_post_displacements(post_displacements);
        let range = region.uv_range();
        region.set_use_uv_warp(uv_warp, &mut self.global_uvs[range]);
    }

    /// Skin every region into `target` (flat xyz, one entry per mesh point)
    /// and stack the regions in depth
    ///
    /// The bone transforms must already be up to date.
    pub fn pose_regions(&mut self, target: &mut [f32]) {
        if target.len() < self.global_pts.len() {
            warn!(
                "Pose target holds {} floats, mesh needs {}",
                target.len(),
                self.global_pts.len()
            );
            return;
        }

        #[cfg(feature = "parallel")]
        {
            if self.pose_regions_parallel(target) {
                return;
            }
        }

        let skeleton = self.render_composition.skeleton();
        for (j, region) in self.render_composition.regions().iter().enumerate() {
            let out = &mut target[region.pt_range()];
            let uvs = &mut self.global_uvs[region.uv_range()];
            region.pose_final_pts(&self.global_pts, out, uvs, skeleton);
            stack_region(out, j);
        }
    }

    #[cfg(feature = "parallel")]
    fn pose_regions_parallel(&mut self, target: &mut [f32]) -> bool {
        use rayon::prelude::*;

        let skeleton = self.render_composition.skeleton();
        let regions = self.render_composition.regions();
        let Some(jobs) = split_by_region(regions, target, &mut self.global_uvs) else {
            warn!("Regions overlap; posing serially");
            return false;
        };

        let global_pts = &self.global_pts;
        jobs.into_par_iter().for_each(|(j, region, out, uvs)| {
            region.pose_final_pts(global_pts, out, uvs, skeleton);
            stack_region(out, j);
        });
        true
    }

    /// Points referenced by few region indices
    pub fn compute_boundary_indices(&mut self) {
        let regions = self.render_composition.regions();
        let mut freq = vec![0_usize; self.total_num_pts()];

        for &idx in &self.global_indices {
            let idx = idx as usize;
            if regions.iter().any(|region| region.contains_pt(idx))
                && let Some(count) = freq.get_mut(idx)
            {
                *count += 1;
            }
        }

        self.boundary_indices = freq
            .iter()
            .enumerate()
            .filter(|&(_, &count)| count <= BOUNDARY_MAX_REFERENCES)
            .map(|(i, _)| i)
            .collect();
    }

    pub fn boundary_indices(&self) -> &[usize] {
        &self.boundary_indices
    }

    /// 2D bounds of the boundary points in the current render output
    ///
    /// Boundary indices are computed first if they are missing. Returns
    /// `None` when the mesh has no boundary points.
    pub fn compute_boundary_min_max(&mut self) -> Option<(Vec2, Vec2)> {
        if self.boundary_indices.is_empty() {
            self.compute_boundary_indices();
        }

        let mut pts = self.boundary_indices.iter().filter_map(|&i| {
            let base = i * 3;
            self.render_pts
                .get(base..base + 2)
                .map(|xy| Vec2::new(xy[0], xy[1]))
        });

        let first = pts.next()?;
        let (min, max) = pts.fold((first, first), |(min, max), pt| (min.min(pt), max.max(pt)));
        self.boundary_min = min;
        self.boundary_max = max;
        Some((min, max))
    }

    pub fn boundary_min(&self) -> Vec2 {
        self.boundary_min
    }

    pub fn boundary_max(&self) -> Vec2 {
        self.boundary_max
    }
}

fn stack_region(out: &mut [f32], region_index: usize) {
    let z = -(region_index as f32) * REGION_Z_STEP;
    for pt in out.chunks_exact_mut(3) {
        pt[2] = z;
    }
}

/// Give each region its own mutable point and UV sub-slices, or `None` when
/// ranges overlap or fall outside the buffers
#[cfg(feature = "parallel")]
fn split_by_region<'a>(
    regions: &'a [RenderRegion],
    pts: &'a mut [f32],
    uvs: &'a mut [f32],
) -> Option<Vec<(usize, &'a RenderRegion, &'a mut [f32], &'a mut [f32])>> {
    let mut order: Vec<usize> = (0..regions.len()).collect();
    order.sort_by_key(|&j| regions[j].start_pt_index());

    let (mut pts_rest, mut pts_offset) = (pts, 0);
    let (mut uvs_rest, mut uvs_offset) = (uvs, 0);
    let mut jobs = Vec::with_capacity(order.len());

    for j in order {
        let region = &regions[j];
        let (pt_range, uv_range) = (region.pt_range(), region.uv_range());

        let (_, tail) = std::mem::take(&mut pts_rest)
            .split_at_mut_checked(pt_range.start.checked_sub(pts_offset)?)?;
        let (out, tail) = tail.split_at_mut_checked(pt_range.len())?;
        pts_rest = tail;
        pts_offset = pt_range.end;

        let (_, tail) = std::mem::take(&mut uvs_rest)
            .split_at_mut_checked(uv_range.start.checked_sub(uvs_offset)?)?;
        let (region_uvs, tail) = tail.split_at_mut_checked(uv_range.len())?;
        uvs_rest = tail;
        uvs_offset = uv_range.end;

        jobs.push((j, region, out, region_uvs));
    }

    Some(jobs)
}

fn check_disjoint(regions: &[RenderRegion]) -> Result<()> {
    let mut spans: Vec<(usize, usize, &str)> = regions
        .iter()
        .map(|r| (r.start_pt_index(), r.end_pt_index(), r.name()))
        .collect();
    spans.sort_unstable();

    for pair in spans.windows(2) {
        let ((_, prev_end, prev), (start, _, next)) = (pair[0], pair[1]);
        if start <= prev_end {
            return Err(CreatureError::InvalidAsset(format!(
                "regions '{prev}' and '{next}' share points"
            )));
        }
    }
    Ok(())
}

/// Build the bone tree
///
/// The root is the lowest-id bone that no bone lists as a child. Children are
/// attached parent by parent in ascending id order.
fn create_bones(nodes: &OrderedMap<SkeletonNode>) -> Result<Skeleton> {
    let mut entries: Vec<(i32, Bone, &[i32])> = Vec::with_capacity(nodes.len());
    let mut child_set = HashSet::new();

    for (name, node) in nodes.iter() {
        let mut bone = Bone::from_local_rest(
            name,
            node.local_rest_start_pt(name)?,
            node.local_rest_end_pt(name)?,
            node.rest_parent_mat(name)?,
        )?;
        bone.set_tag_id(node.id);
        entries.push((node.id, bone, node.children.as_slice()));
        child_set.extend(node.children.iter().copied());
    }
    entries.sort_by_key(|(id, ..)| *id);

    if let Some(pair) = entries.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(CreatureError::InvalidAsset(format!(
            "bone id {} is used twice",
            pair[0].0
        )));
    }

    let root_pos = entries
        .iter()
        .position(|(id, ..)| !child_set.contains(id))
        .ok_or_else(|| CreatureError::InvalidAsset("skeleton has no root bone".to_string()))?;

    let (root_id, root_bone, root_children) = entries.remove(root_pos);
    let mut skeleton = Skeleton::new(root_bone);
    let mut ids: HashMap<i32, BoneId> = HashMap::from([(root_id, skeleton.root())]);
    let mut links = vec![(root_id, root_children)];

    for (id, bone, children) in entries {
        ids.insert(id, skeleton.insert(bone));
        links.push((id, children));
    }
    links.sort_by_key(|(id, _)| *id);

    let mut attached = HashSet::new();
    for (parent, children) in links {
        let parent_id = ids[&parent];
        for child in children {
            let child_id = *ids.get(child).ok_or_else(|| {
                CreatureError::InvalidAsset(format!("bone id {parent} lists unknown child {child}"))
            })?;
            if !attached.insert(child_id) {
                return Err(CreatureError::InvalidAsset(format!(
                    "bone id {child} has more than one parent"
                )));
            }
            skeleton.add_child(parent_id, child_id);
        }
    }

    Ok(skeleton)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    const IDENTITY: [f32; 16] = [
        1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
    ];

    fn asset(skeleton: Value, regions: Value) -> CreatureData {
        serde_json::from_value(json!({
            "mesh": {
                "points": [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 2.0, 0.0, 2.0, 1.0],
                "indices": [0, 1, 2, 0, 2, 3, 1, 4, 5, 1, 5, 2],
                "uvs": [0.0, 0.0, 0.5, 0.0, 0.5, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0],
                "regions": regions
            },
            "skeleton": skeleton
        }))
        .unwrap()
    }

    fn chain() -> Value {
        json!({
            "hip": {
                "id": 1, "restParentMat": IDENTITY,
                "localRestStartPt": [0.0, 0.0], "localRestEndPt": [1.0, 0.0],
                "children": [2]
            },
            "knee": {
                "id": 2, "restParentMat": IDENTITY,
                "localRestStartPt": [0.0, 0.0], "localRestEndPt": [1.0, 0.0],
                "children": []
            }
        })
    }

    fn two_regions() -> Value {
        json!({
            "a_left": {
                "id": 10, "start_pt_index": 0, "end_pt_index": 3,
                "start_index": 0, "end_index": 5,
                "weights": { "hip": [1.0, 1.0, 1.0, 1.0] }
            },
            "b_right": {
                "id": 11, "start_pt_index": 4, "end_pt_index": 5,
                "start_index": 6, "end_index": 11,
                "weights": { "knee": [1.0, 1.0] }
            }
        })
    }

    #[test]
    fn test_load_builds_tree_and_regions() {
        let creature = Creature::from_data(&asset(chain(), two_regions())).unwrap();
        let composition = creature.composition();
        let skeleton = composition.skeleton();

        assert_eq!(skeleton.bone(skeleton.root()).key(), "hip");
        assert_eq!(skeleton.all_bone_keys(skeleton.root()), vec!["hip", "knee"]);
        assert_eq!(skeleton.bone(skeleton.root()).tag_id(), 1);
        assert_eq!(composition.regions().len(), 2);
        assert_eq!(composition.region("b_right").map(RenderRegion::tag_id), Some(11));

        assert_eq!(creature.total_num_pts(), 6);
        assert_eq!(creature.render_colours(), &[1.0; 24]);
        assert_eq!(creature.render_pts(), creature.global_pts());
    }

    #[test]
    fn test_child_rest_pose_follows_parent() {
        let creature = Creature::from_data(&asset(chain(), two_regions())).unwrap();
        let composition = creature.composition();
        let knee = composition.bone_by_key("knee").unwrap();
        let bone = composition.skeleton().bone(knee);

        assert!((bone.world_start_pt() - glam::Vec3::X).length() < 1e-5);
        assert!((bone.world_end_pt() - glam::Vec3::new(2.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_rest_pose_regions_reproduce_mesh() {
        let mut creature = Creature::from_data(&asset(chain(), two_regions())).unwrap();
        creature.composition_mut().update_all_transforms(false).unwrap();

        let mut target = vec![0.0; creature.global_pts().len()];
        creature.pose_regions(&mut target);

        let rest = creature.global_pts().to_vec();
        for (i, (posed, rest)) in target.chunks_exact(3).zip(rest.chunks_exact(3)).enumerate() {
            assert!((posed[0] - rest[0]).abs() < 1e-5, "point {i}");
            assert!((posed[1] - rest[1]).abs() < 1e-5, "point {i}");
        }
        assert_eq!(target[2], 0.0);
        assert_eq!(target[14], -REGION_Z_STEP);
    }

    #[test]
    fn test_missing_child_rejected() {
        let skeleton = json!({
            "hip": {
                "id": 1, "restParentMat": IDENTITY,
                "localRestStartPt": [0.0, 0.0], "localRestEndPt": [1.0, 0.0],
                "children": [7]
            }
        });
        let err = Creature::from_data(&asset(skeleton, json!({}))).unwrap_err();
        assert!(matches!(err, CreatureError::InvalidAsset(_)));
    }

    #[test]
    fn test_cycle_without_root_rejected() {
        let skeleton = json!({
            "a": {
                "id": 1, "restParentMat": IDENTITY,
                "localRestStartPt": [0.0, 0.0], "localRestEndPt": [1.0, 0.0],
                "children": [2]
            },
            "b": {
                "id": 2, "restParentMat": IDENTITY,
                "localRestStartPt": [0.0, 0.0], "localRestEndPt": [1.0, 0.0],
                "children": [1]
            }
        });
        let err = Creature::from_data(&asset(skeleton, json!({}))).unwrap_err();
        assert!(matches!(err, CreatureError::InvalidAsset(_)));
    }

    #[test]
    fn test_overlapping_regions_rejected() {
        let regions = json!({
            "a": { "id": 0, "start_pt_index": 0, "end_pt_index": 3, "start_index": 0, "end_index": 5 },
            "b": { "id": 1, "start_pt_index": 3, "end_pt_index": 5, "start_index": 6, "end_index": 11 }
        });
        let err = Creature::from_data(&asset(chain(), regions)).unwrap_err();
        assert!(matches!(err, CreatureError::InvalidAsset(_)));
    }

    #[test]
    fn test_weights_for_unknown_bone_rejected() {
        let mut regions = two_regions();
        regions["b_right"]["weights"] = json!({ "ankle": [1.0, 1.0] });

        let err = Creature::from_data(&asset(chain(), regions)).unwrap_err();
        assert!(matches!(err, CreatureError::UnknownBone(ref key) if key.starts_with("ankle")));
    }

    #[test]
    fn test_region_out_of_mesh_rejected() {
        let regions = json!({
            "a": { "id": 0, "start_pt_index": 0, "end_pt_index": 9, "start_index": 0, "end_index": 5 }
        });
        let err = Creature::from_data(&asset(chain(), regions)).unwrap_err();
        assert!(matches!(err, CreatureError::InvalidAsset(_)));
    }

    #[test]
    fn test_fill_render_colours() {
        let mut creature = Creature::from_data(&asset(chain(), two_regions())).unwrap();
        creature.fill_render_colours(0.1, 0.2, 0.3, 0.4);
        assert_eq!(&creature.render_colours()[4..8], &[0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_boundary() {
        let mut creature = Creature::from_data(&asset(chain(), two_regions())).unwrap();
        creature.compute_boundary_indices();

        // Every point of the two-quad strip is referenced at most four times
        assert_eq!(creature.boundary_indices(), &[0, 1, 2, 3, 4, 5]);

        let (min, max) = creature.compute_boundary_min_max().unwrap();
        assert_eq!(min, Vec2::ZERO);
        assert_eq!(max, Vec2::new(2.0, 1.0));
        assert_eq!(creature.boundary_max(), max);
    }

    #[test]
    fn test_set_region_overlays() {
        let mut creature = Creature::from_data(&asset(chain(), two_regions())).unwrap();
        creature.set_region_overlays(1, true, false, true);

        let region = &creature.composition().regions()[1];
        assert!(region.use_local_displacements());
        assert!(!region.use_post_displacements());
        assert!(region.use_uv_warp());
        assert_eq!(region.local_displacements().len(), 2);
    }
}
