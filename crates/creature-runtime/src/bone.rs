//! Bone hierarchy for Creature skeletons
//!
//! Bones are stored in an arena ([`Skeleton`]) and refer to each other by
//! [`BoneId`]. A bone owns its subtree through its `children` list; lookup
//! maps elsewhere in the runtime hold ids, never references.
//!
//! Three passes walk the tree top-down:
//! - the rest pass ([`Skeleton::compute_rest_parent_transforms`]) runs once at
//!   load time and fixes the rest and bind pose matrices,
//! - the delta pass ([`Skeleton::compute_world_delta_transforms`]) runs every
//!   frame after the animated endpoints were written and produces a dual
//!   quaternion per bone,
//! - the sign fix ([`Skeleton::fix_dqs`]) keeps every dual quaternion in the
//!   same hemisphere as its parent's so that blending never crosses antipodes.

use std::collections::HashMap;

use glam::{Mat4, Vec2, Vec3};

use crate::dual_quat::DualQuat;
use crate::error::{CreatureError, Result, TransformStage};
use crate::math::{
    BINORMAL, axis_matrix, calc_rotate_mat, checked_inverse, compute_dirs, mat_translation,
    matrix_to_quat, segment_frame,
};

/// Handle to a bone inside a [`Skeleton`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoneId(pub usize);

/// A rigid segment between two animated endpoints
#[derive(Debug, Clone)]
pub struct Bone {
    key: String,
    tag_id: i32,
    parent: Option<BoneId>,
    children: Vec<BoneId>,

    local_rest_start_pt: Vec3,
    local_rest_end_pt: Vec3,
    local_rest_dir: Vec3,
    local_rest_normal_dir: Vec3,
    rest_length: f32,

    rest_parent_mat: Mat4,
    rest_parent_inv_mat: Mat4,
    rest_world_mat: Mat4,
    rest_world_inv_mat: Mat4,
    bind_world_mat: Mat4,
    bind_world_inv_mat: Mat4,
    parent_world_mat: Mat4,
    parent_world_inv_mat: Mat4,
    world_rest_pos: Vec3,

    world_start_pt: Vec3,
    world_end_pt: Vec3,
    world_delta_mat: Mat4,
    world_dq: DualQuat,
}

impl Bone {
    /// Create a bone from rest endpoints given in the space above
    /// `rest_parent_mat`
    pub fn new(
        key: impl Into<String>,
        start_pt: Vec3,
        end_pt: Vec3,
        rest_parent_mat: Mat4,
    ) -> Result<Self> {
        let mut bone = Self::detached(key.into(), rest_parent_mat);
        bone.set_rest_parent_mat(rest_parent_mat, None)?;
        bone.local_rest_start_pt = bone.rest_parent_inv_mat.transform_point3(start_pt);
        bone.local_rest_end_pt = bone.rest_parent_inv_mat.transform_point3(end_pt);
        bone.calc_rest_data();
        Ok(bone)
    }

    /// Create a bone whose rest endpoints are already in parent-local space
    pub fn from_local_rest(
        key: impl Into<String>,
        local_start_pt: Vec3,
        local_end_pt: Vec3,
        rest_parent_mat: Mat4,
    ) -> Result<Self> {
        let mut bone = Self::detached(key.into(), rest_parent_mat);
        bone.set_rest_parent_mat(rest_parent_mat, None)?;
        bone.local_rest_start_pt = local_start_pt;
        bone.local_rest_end_pt = local_end_pt;
        bone.calc_rest_data();
        Ok(bone)
    }

    fn detached(key: String, rest_parent_mat: Mat4) -> Self {
        Self {
            key,
            tag_id: 0,
            parent: None,
            children: Vec::new(),
            local_rest_start_pt: Vec3::ZERO,
            local_rest_end_pt: Vec3::ZERO,
            local_rest_dir: Vec3::ZERO,
            local_rest_normal_dir: Vec3::ZERO,
            rest_length: 0.0,
            rest_parent_mat,
            rest_parent_inv_mat: Mat4::IDENTITY,
            rest_world_mat: Mat4::IDENTITY,
            rest_world_inv_mat: Mat4::IDENTITY,
            bind_world_mat: Mat4::IDENTITY,
            bind_world_inv_mat: Mat4::IDENTITY,
            parent_world_mat: Mat4::IDENTITY,
            parent_world_inv_mat: Mat4::IDENTITY,
            world_rest_pos: Vec3::ZERO,
            world_start_pt: Vec3::ZERO,
            world_end_pt: Vec3::ZERO,
            world_delta_mat: Mat4::IDENTITY,
            world_dq: DualQuat::ZERO,
        }
    }

    /// Set the rest parent transform; the inverse is computed when not given
    pub fn set_rest_parent_mat(&mut self, transform: Mat4, inverse: Option<Mat4>) -> Result<()> {
        self.rest_parent_inv_mat = match inverse {
            Some(inverse) => inverse,
            None => checked_inverse(&transform).ok_or_else(|| CreatureError::DegenerateTransform {
                bone: self.key.clone(),
                stage: TransformStage::RestParent,
            })?,
        };
        self.rest_parent_mat = transform;
        Ok(())
    }

    /// Set the rest start point from a point in the space above the parent
    pub fn set_local_rest_start_pt(&mut self, world_pt: Vec3) {
        self.local_rest_start_pt = self.rest_parent_inv_mat.transform_point3(world_pt);
        self.calc_rest_data();
    }

    /// Set the rest end point from a point in the space above the parent
    pub fn set_local_rest_end_pt(&mut self, world_pt: Vec3) {
        self.local_rest_end_pt = self.rest_parent_inv_mat.transform_point3(world_pt);
        self.calc_rest_data();
    }

    /// Recompute rest direction, normal and length from the local endpoints
    pub fn calc_rest_data(&mut self) {
        let (dir, normal) = compute_dirs(self.local_rest_start_pt, self.local_rest_end_pt);
        self.local_rest_dir = dir;
        self.local_rest_normal_dir = normal;
        self.rest_length = (self.local_rest_end_pt - self.local_rest_start_pt).length();
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn tag_id(&self) -> i32 {
        self.tag_id
    }

    pub fn set_tag_id(&mut self, value: i32) {
        self.tag_id = value;
    }

    pub fn parent(&self) -> Option<BoneId> {
        self.parent
    }

    pub fn children(&self) -> &[BoneId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn local_rest_start_pt(&self) -> Vec3 {
        self.local_rest_start_pt
    }

    pub fn local_rest_end_pt(&self) -> Vec3 {
        self.local_rest_end_pt
    }

    pub fn local_rest_dir(&self) -> Vec3 {
        self.local_rest_dir
    }

    pub fn local_rest_normal_dir(&self) -> Vec3 {
        self.local_rest_normal_dir
    }

    pub fn rest_length(&self) -> f32 {
        self.rest_length
    }

    /// Rest start point lifted into world space by the rest parent transform
    pub fn world_rest_start_pt(&self) -> Vec3 {
        self.rest_parent_mat.transform_point3(self.local_rest_start_pt)
    }

    /// Rest end point lifted into world space by the rest parent transform
    pub fn world_rest_end_pt(&self) -> Vec3 {
        self.rest_parent_mat.transform_point3(self.local_rest_end_pt)
    }

    /// World rest start point captured by the last rest pass
    pub fn world_rest_pos(&self) -> Vec3 {
        self.world_rest_pos
    }

    pub fn rest_parent_mat(&self) -> &Mat4 {
        &self.rest_parent_mat
    }

    pub fn rest_parent_inv_mat(&self) -> &Mat4 {
        &self.rest_parent_inv_mat
    }

    pub fn rest_world_mat(&self) -> &Mat4 {
        &self.rest_world_mat
    }

    pub fn rest_world_inv_mat(&self) -> &Mat4 {
        &self.rest_world_inv_mat
    }

    pub fn bind_world_mat(&self) -> &Mat4 {
        &self.bind_world_mat
    }

    pub fn bind_world_inv_mat(&self) -> &Mat4 {
        &self.bind_world_inv_mat
    }

    pub fn parent_world_mat(&self) -> &Mat4 {
        &self.parent_world_mat
    }

    pub fn parent_world_inv_mat(&self) -> &Mat4 {
        &self.parent_world_inv_mat
    }

    pub fn world_start_pt(&self) -> Vec3 {
        self.world_start_pt
    }

    pub fn world_end_pt(&self) -> Vec3 {
        self.world_end_pt
    }

    pub fn set_world_start_pt(&mut self, pt: Vec3) {
        self.world_start_pt = pt;
    }

    pub fn set_world_end_pt(&mut self, pt: Vec3) {
        self.world_end_pt = pt;
    }

    /// Transform from the bind pose to the current pose
    pub fn world_delta_mat(&self) -> &Mat4 {
        &self.world_delta_mat
    }

    pub fn world_dq(&self) -> &DualQuat {
        &self.world_dq
    }

    /// Whether `pt` lies within `radius` of the current bone segment
    ///
    /// The point must project inside the segment; only the XY plane is
    /// considered.
    pub fn is_contact(&self, pt: Vec2, radius: f32) -> bool {
        let start = self.world_start_pt.truncate();
        let diff = self.world_end_pt.truncate() - start;
        let length = diff.length();
        if length <= 0.0 {
            return false;
        }

        let unit = diff / length;
        let normal = Vec2::new(-unit.y, unit.x);
        let rel = pt - start;

        let along = rel.dot(unit);
        let across = rel.dot(normal).abs();

        (0.0..=length).contains(&along) && across <= radius
    }
}

/// Arena of bones forming one tree
#[derive(Debug, Clone)]
pub struct Skeleton {
    bones: Vec<Bone>,
    root: BoneId,
}

impl Skeleton {
    /// Create a skeleton containing only `root`
    pub fn new(root: Bone) -> Self {
        Self {
            bones: vec![root],
            root: BoneId(0),
        }
    }

    pub fn root(&self) -> BoneId {
        self.root
    }

    /// Number of bones stored, including any detached by
    /// [`Skeleton::delete_children`]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bone(&self, id: BoneId) -> &Bone {
        &self.bones[id.0]
    }

    pub fn bone_mut(&mut self, id: BoneId) -> &mut Bone {
        &mut self.bones[id.0]
    }

    pub fn get(&self, id: BoneId) -> Option<&Bone> {
        self.bones.get(id.0)
    }

    /// Store a bone that is not yet attached to the tree
    pub fn insert(&mut self, bone: Bone) -> BoneId {
        self.bones.push(bone);
        BoneId(self.bones.len() - 1)
    }

    /// Attach `child` under `parent`
    ///
    /// The child's rest parent transform becomes the parent's current rest
    /// world transform, so parents must be finalized first (or the rest pass
    /// rerun afterwards).
    pub fn add_child(&mut self, parent: BoneId, child: BoneId) {
        let rest_world = self.bones[parent.0].rest_world_mat;
        let rest_world_inv = self.bones[parent.0].rest_world_inv_mat;

        let child_bone = &mut self.bones[child.0];
        child_bone.rest_parent_mat = rest_world;
        child_bone.rest_parent_inv_mat = rest_world_inv;
        child_bone.parent = Some(parent);

        self.bones[parent.0].children.push(child);
    }

    /// Whether `child` is a direct child of `parent`
    pub fn has_child(&self, parent: BoneId, child: BoneId) -> bool {
        self.bones[parent.0].children.contains(&child)
    }

    /// Depth-first search for `key` in the subtree rooted at `from`
    pub fn child_by_key(&self, from: BoneId, key: &str) -> Option<BoneId> {
        if self.bones[from.0].key == key {
            return Some(from);
        }

        self.bones[from.0]
            .children
            .iter()
            .find_map(|&child| self.child_by_key(child, key))
    }

    /// Search the whole tree for `key`
    pub fn find(&self, key: &str) -> Option<BoneId> {
        self.child_by_key(self.root, key)
    }

    /// Keys of the subtree rooted at `from`, in pre-order
    pub fn all_bone_keys(&self, from: BoneId) -> Vec<String> {
        self.all_children(from)
            .into_iter()
            .map(|id| self.bones[id.0].key.clone())
            .collect()
    }

    /// Ids of the subtree rooted at `from` (including `from`), in pre-order
    pub fn all_children(&self, from: BoneId) -> Vec<BoneId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.bones[id.0].children.iter().rev());
        }
        out
    }

    /// Depth of `target` below `from`, where `from` itself is at `depth`
    pub fn bone_depth(&self, from: BoneId, target: BoneId, depth: usize) -> Option<usize> {
        if from == target {
            return Some(depth);
        }

        self.bones[from.0]
            .children
            .iter()
            .find_map(|&child| self.bone_depth(child, target, depth + 1))
    }

    pub fn is_leaf(&self, id: BoneId) -> bool {
        self.bones[id.0].is_leaf()
    }

    /// Detach the whole subtree below `id`
    ///
    /// Detached bones stay in the arena but are no longer reachable from the
    /// root; key maps must be regenerated afterwards.
    pub fn delete_children(&mut self, id: BoneId) {
        let children = std::mem::take(&mut self.bones[id.0].children);
        for child in children {
            self.delete_children(child);
            self.bones[child.0].parent = None;
        }
    }

    /// Map every key reachable from `from` to its bone
    pub fn gen_bone_map(&self, from: BoneId) -> HashMap<String, BoneId> {
        self.all_bone_keys(from)
            .into_iter()
            .filter_map(|key| self.child_by_key(from, &key).map(|id| (key, id)))
            .collect()
    }

    /// Rest pass: derive rest world and bind matrices, then hand the rest
    /// world transform down to every child
    pub fn compute_rest_parent_transforms(&mut self, id: BoneId) -> Result<()> {
        {
            let bone = &mut self.bones[id.0];

            let rest_dir = Vec3::new(bone.local_rest_dir.x, bone.local_rest_dir.y, 0.0);
            let rest_normal =
                Vec3::new(bone.local_rest_normal_dir.x, bone.local_rest_normal_dir.y, 0.0);
            let cur_final = Mat4::from_translation(bone.local_rest_end_pt)
                * axis_matrix(rest_dir, rest_normal, BINORMAL);

            bone.rest_world_mat = bone.rest_parent_mat * cur_final;
            bone.rest_world_inv_mat = checked_inverse(&bone.rest_world_mat).ok_or_else(|| {
                CreatureError::DegenerateTransform {
                    bone: bone.key.clone(),
                    stage: TransformStage::RestWorld,
                }
            })?;

            let world_start = bone.world_rest_start_pt();
            let world_end = bone.world_rest_end_pt();
            bone.world_rest_pos = world_start;

            bone.bind_world_mat =
                Mat4::from_translation(world_start) * calc_rotate_mat(world_end - world_start);
            bone.bind_world_inv_mat = checked_inverse(&bone.bind_world_mat).ok_or_else(|| {
                CreatureError::DegenerateTransform {
                    bone: bone.key.clone(),
                    stage: TransformStage::BindWorld,
                }
            })?;
        }

        let rest_world = self.bones[id.0].rest_world_mat;
        let rest_world_inv = self.bones[id.0].rest_world_inv_mat;
        for i in 0..self.bones[id.0].children.len() {
            let child = self.bones[id.0].children[i];
            self.bones[child.0].rest_parent_mat = rest_world;
            self.bones[child.0].rest_parent_inv_mat = rest_world_inv;
            self.compute_rest_parent_transforms(child)?;
        }

        Ok(())
    }

    /// Hand each bone's current world frame (anchored at its end point) down
    /// to its children as their parent world transform
    pub fn compute_parent_transforms(&mut self, id: BoneId) -> Result<()> {
        let bone = &self.bones[id.0];
        let final_transform = Mat4::from_translation(bone.world_end_pt)
            * calc_rotate_mat(bone.world_end_pt - bone.world_start_pt);
        let final_inv = checked_inverse(&final_transform).ok_or_else(|| {
            CreatureError::DegenerateTransform {
                bone: bone.key.clone(),
                stage: TransformStage::ParentWorld,
            }
        })?;

        for i in 0..self.bones[id.0].children.len() {
            let child = self.bones[id.0].children[i];
            self.bones[child.0].parent_world_mat = final_transform;
            self.bones[child.0].parent_world_inv_mat = final_inv;
            self.compute_parent_transforms(child)?;
        }

        Ok(())
    }

    /// Delta pass: rebuild every bone's dual quaternion from its current
    /// endpoints relative to the bind pose
    pub fn compute_world_delta_transforms(&mut self, id: BoneId) {
        {
            let bone = &mut self.bones[id.0];
            bone.world_delta_mat =
                segment_frame(bone.world_start_pt, bone.world_start_pt, bone.world_end_pt)
                    * bone.bind_world_inv_mat;

            let rotation = matrix_to_quat(&bone.world_delta_mat);
            let translation = mat_translation(&bone.world_delta_mat);
            bone.world_dq = DualQuat::from_rotation_translation(rotation, translation);
        }

        for i in 0..self.bones[id.0].children.len() {
            let child = self.bones[id.0].children[i];
            self.compute_world_delta_transforms(child);
        }
    }

    /// Flip dual quaternions that point away from `reference`, then recurse
    /// with each corrected bone as its children's reference
    pub fn fix_dqs(&mut self, id: BoneId, reference: &DualQuat) {
        let bone = &mut self.bones[id.0];
        if bone.world_dq.real.dot(reference.real) < 0.0 {
            bone.world_dq = bone.world_dq.negated();
        }

        let corrected = bone.world_dq;
        for i in 0..self.bones[id.0].children.len() {
            let child = self.bones[id.0].children[i];
            self.fix_dqs(child, &corrected);
        }
    }

    /// Reset animated endpoints to the rest pose
    pub fn init_world_pts(&mut self, id: BoneId) {
        let bone = &mut self.bones[id.0];
        bone.world_start_pt = bone.world_rest_start_pt();
        bone.world_end_pt = bone.world_rest_end_pt();

        for i in 0..self.bones[id.0].children.len() {
            let child = self.bones[id.0].children[i];
            self.init_world_pts(child);
        }
    }

    /// Pre-order search for the first bone in contact with `pt`
    pub fn contact_bone(&self, from: BoneId, pt: Vec2, radius: f32) -> Option<BoneId> {
        self.all_children(from)
            .into_iter()
            .find(|&id| self.bones[id.0].is_contact(pt, radius))
    }
}
