//! The bone tree together with the regions skinned to it

use std::collections::HashMap;

use crate::bone::{BoneId, Skeleton};
use crate::error::Result;
use crate::region::RenderRegion;

/// Owns the skeleton and the render regions, plus key lookups into both
#[derive(Debug, Clone)]
pub struct BoneComposition {
    skeleton: Skeleton,
    bones_map: HashMap<String, BoneId>,
    regions: Vec<RenderRegion>,
    regions_map: HashMap<String, usize>,
}

impl BoneComposition {
    pub fn new(skeleton: Skeleton) -> Self {
        let bones_map = skeleton.gen_bone_map(skeleton.root());
        Self {
            skeleton,
            bones_map,
            regions: Vec::new(),
            regions_map: HashMap::new(),
        }
    }

    pub fn add_region(&mut self, region: RenderRegion) {
        self.regions.push(region);
    }

    /// Rebuild the key to bone lookup after the tree changed
    pub fn init_bone_map(&mut self) {
        self.bones_map = self.skeleton.gen_bone_map(self.skeleton.root());
    }

    /// Rebuild the name to region lookup after regions were added
    pub fn init_regions_map(&mut self) {
        self.regions_map = self
            .regions
            .iter()
            .enumerate()
            .map(|(i, region)| (region.name().to_string(), i))
            .collect();
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn skeleton_mut(&mut self) -> &mut Skeleton {
        &mut self.skeleton
    }

    pub fn root(&self) -> BoneId {
        self.skeleton.root()
    }

    pub fn bones_map(&self) -> &HashMap<String, BoneId> {
        &self.bones_map
    }

    pub fn bone_by_key(&self, key: &str) -> Option<BoneId> {
        self.bones_map.get(key).copied()
    }

    pub fn regions(&self) -> &[RenderRegion] {
        &self.regions
    }

    pub fn regions_mut(&mut self) -> &mut [RenderRegion] {
        &mut self.regions
    }

    pub fn regions_map(&self) -> &HashMap<String, usize> {
        &self.regions_map
    }

    pub fn region_index(&self, name: &str) -> Option<usize> {
        self.regions_map.get(name).copied()
    }

    pub fn region(&self, name: &str) -> Option<&RenderRegion> {
        self.region_index(name).map(|i| &self.regions[i])
    }

    pub fn region_mut(&mut self, name: &str) -> Option<&mut RenderRegion> {
        self.region_index(name).map(|i| &mut self.regions[i])
    }

    /// First region carrying `tag_id`
    pub fn region_with_id(&self, tag_id: i32) -> Option<&RenderRegion> {
        self.regions.iter().find(|region| region.tag_id() == tag_id)
    }

    /// Skeleton and regions borrowed together, regions mutably
    pub fn split_mut(&mut self) -> (&Skeleton, &mut [RenderRegion]) {
        (&self.skeleton, &mut self.regions)
    }

    /// Skeleton borrowed mutably alongside the key lookup
    pub fn bones_mut(&mut self) -> (&mut Skeleton, &HashMap<String, BoneId>) {
        (&mut self.skeleton, &self.bones_map)
    }

    /// Move every bone back to its rest endpoints
    pub fn reset_to_world_rest_pts(&mut self) {
        let root = self.skeleton.root();
        self.skeleton.init_world_pts(root);
    }

    /// Propagate the current bone endpoints through the whole tree
    ///
    /// With `update_parent_xf` the parent world matrices are refreshed first.
    pub fn update_all_transforms(&mut self, update_parent_xf: bool) -> Result<()> {
        let root = self.skeleton.root();
        if update_parent_xf {
            self.skeleton.compute_parent_transforms(root)?;
        }

        self.skeleton.compute_world_delta_transforms(root);
        let reference = *self.skeleton.bone(root).world_dq();
        self.skeleton.fix_dqs(root, &reference);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bone::Bone;
    use glam::{Mat4, Vec3};
    use pretty_assertions::assert_eq;

    fn composition() -> BoneComposition {
        let root = Bone::new("root", Vec3::ZERO, Vec3::X, Mat4::IDENTITY).unwrap();
        let mut skeleton = Skeleton::new(root);
        skeleton.compute_rest_parent_transforms(skeleton.root()).unwrap();

        let mut composition = BoneComposition::new(skeleton);
        let uvs = [0.0; 8];
        let mut body = RenderRegion::new("body", 0, 1, 0, 2, &uvs).unwrap();
        body.set_tag_id(7);
        composition.add_region(body);
        composition.add_region(RenderRegion::new("head", 2, 3, 3, 5, &uvs).unwrap());
        composition.init_regions_map();
        composition
    }

    #[test]
    fn test_lookups() {
        let composition = composition();

        assert_eq!(composition.bone_by_key("root"), Some(BoneId(0)));
        assert_eq!(composition.bone_by_key("tail"), None);
        assert_eq!(composition.region_index("head"), Some(1));
        assert_eq!(composition.region("body").map(RenderRegion::num_pts), Some(2));
        assert_eq!(composition.region_with_id(7).map(RenderRegion::name), Some("body"));
        assert!(composition.region_with_id(8).is_none());
    }

    #[test]
    fn test_update_all_transforms_at_rest() {
        let mut composition = composition();
        composition.reset_to_world_rest_pts();
        composition.update_all_transforms(true).unwrap();

        let root = composition.root();
        let bone = composition.skeleton().bone(root);
        let p = Vec3::new(2.0, 3.0, 0.0);
        assert!((bone.world_dq().transform(p) - p).length() < 1e-5);
    }

    #[test]
    fn test_init_bone_map_after_new_child() {
        let mut composition = composition();
        let child = Bone::new("tip", Vec3::X, Vec3::new(2.0, 0.0, 0.0), Mat4::IDENTITY).unwrap();
        let root = composition.root();
        let skeleton = composition.skeleton_mut();
        let child = skeleton.insert(child);
        skeleton.add_child(root, child);

        assert_eq!(composition.bone_by_key("tip"), None);
        composition.init_bone_map();
        assert_eq!(composition.bone_by_key("tip"), Some(child));
    }
}
