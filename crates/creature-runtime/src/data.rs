//! Creature JSON asset model
//!
//! The exporter writes one JSON document holding the mesh, the skeleton and
//! every animation clip. Keyed objects (bones, regions, clips, frames) are
//! read into [`OrderedMap`] so that document order survives: regions are
//! posed and depth-stacked in that order, and the first clip becomes active
//! by default.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::marker::PhantomData;
use std::path::Path;

use glam::{Mat4, Vec2, Vec3};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;

use crate::error::{CreatureError, Result};

/// Longest frame range a clip may span; each frame costs one slot in every
/// cache table
pub const MAX_CLIP_FRAMES: i64 = 1 << 20;

/// String-keyed map that keeps entries in document order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<T>(Vec<(String, T)>);

impl<T> Default for OrderedMap<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> OrderedMap<T> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<T> FromIterator<(String, T)> for OrderedMap<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OrderedMap<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedMapVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<T> {
            type Value = OrderedMap<T>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a JSON object")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, T>()? {
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// A whole exported character
#[derive(Debug, Clone, Deserialize)]
pub struct CreatureData {
    pub mesh: MeshData,
    pub skeleton: OrderedMap<SkeletonNode>,
    #[serde(default)]
    pub animation: OrderedMap<ClipData>,
}

impl CreatureData {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Clip names in document order
    pub fn animation_names(&self) -> Vec<String> {
        self.animation.keys().map(str::to_string).collect()
    }
}

/// One bone of the skeleton, keyed by bone name
#[derive(Debug, Clone, Deserialize)]
pub struct SkeletonNode {
    pub id: i32,
    #[serde(rename = "restParentMat")]
    pub rest_parent_mat: Vec<f32>,
    #[serde(rename = "localRestStartPt")]
    pub local_rest_start_pt: Vec<f32>,
    #[serde(rename = "localRestEndPt")]
    pub local_rest_end_pt: Vec<f32>,
    #[serde(default)]
    pub children: Vec<i32>,
}

impl SkeletonNode {
    /// Rest parent matrix, column-major
    pub fn rest_parent_mat(&self, bone: &str) -> Result<Mat4> {
        if self.rest_parent_mat.len() < 16 {
            return Err(CreatureError::InvalidAsset(format!(
                "bone '{bone}' restParentMat has {} values, expected 16",
                self.rest_parent_mat.len()
            )));
        }
        Ok(Mat4::from_cols_slice(&self.rest_parent_mat))
    }

    pub fn local_rest_start_pt(&self, bone: &str) -> Result<Vec3> {
        read_pt(&self.local_rest_start_pt, bone, "localRestStartPt").map(|p| p.extend(0.0))
    }

    pub fn local_rest_end_pt(&self, bone: &str) -> Result<Vec3> {
        read_pt(&self.local_rest_end_pt, bone, "localRestEndPt").map(|p| p.extend(0.0))
    }
}

/// Mesh buffers and region layout
#[derive(Debug, Clone, Deserialize)]
pub struct MeshData {
    /// Flat xy pairs
    pub points: Vec<f32>,
    pub indices: Vec<u32>,
    /// Flat uv pairs
    pub uvs: Vec<f32>,
    #[serde(default)]
    pub regions: OrderedMap<RegionData>,
}

impl MeshData {
    /// Points widened to flat xyz with z = 0
    pub fn points_3d(&self) -> Vec<f32> {
        self.points
            .chunks_exact(2)
            .flat_map(|xy| [xy[0], xy[1], 0.0])
            .collect()
    }
}

/// One region, keyed by region name
#[derive(Debug, Clone, Deserialize)]
pub struct RegionData {
    pub id: i32,
    pub start_pt_index: usize,
    pub end_pt_index: usize,
    pub start_index: usize,
    pub end_index: usize,
    /// Bone name to per-vertex weight
    #[serde(default)]
    pub weights: OrderedMap<Vec<f32>>,
}

/// One animation clip; every table is keyed by frame number
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClipData {
    #[serde(default)]
    pub bones: OrderedMap<OrderedMap<BoneFrame>>,
    #[serde(default)]
    pub meshes: OrderedMap<OrderedMap<MeshFrame>>,
    #[serde(default)]
    pub uv_swaps: OrderedMap<OrderedMap<UvSwapFrame>>,
}

impl ClipData {
    /// First and last frame numbers found in the bone table, `(0, 0)` when
    /// it is empty
    pub fn start_end_times(&self) -> Result<(i32, i32)> {
        let mut range: Option<(i32, i32)> = None;
        for key in self.bones.keys() {
            let frame = parse_frame(key)?;
            range = Some(match range {
                None => (frame, frame),
                Some((start, end)) => (start.min(frame), end.max(frame)),
            });
        }
        let (start, end) = range.unwrap_or((0, 0));
        let span = i64::from(end) - i64::from(start) + 1;
        if span > MAX_CLIP_FRAMES {
            return Err(CreatureError::InvalidAsset(format!(
                "clip spans {span} frames ({start}..={end}), more than {MAX_CLIP_FRAMES}"
            )));
        }
        Ok((start, end))
    }
}

/// Bone endpoints at one frame
#[derive(Debug, Clone, Deserialize)]
pub struct BoneFrame {
    pub start_pt: Vec<f32>,
    pub end_pt: Vec<f32>,
}

impl BoneFrame {
    pub fn start_pt(&self, bone: &str) -> Result<Vec3> {
        read_pt(&self.start_pt, bone, "start_pt").map(|p| p.extend(0.0))
    }

    pub fn end_pt(&self, bone: &str) -> Result<Vec3> {
        read_pt(&self.end_pt, bone, "end_pt").map(|p| p.extend(0.0))
    }
}

/// Region displacements at one frame; the arrays are flat xy pairs
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeshFrame {
    #[serde(default)]
    pub use_local_displacements: bool,
    #[serde(default)]
    pub use_post_displacements: bool,
    #[serde(default)]
    pub local_displacements: Vec<f32>,
    #[serde(default)]
    pub post_displacements: Vec<f32>,
}

/// Region UV warp at one frame
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UvSwapFrame {
    #[serde(default)]
    pub enabled: bool,
    pub local_offset: Option<Vec<f32>>,
    pub global_offset: Option<Vec<f32>>,
    pub scale: Option<Vec<f32>>,
}

/// Parse a frame-number key
pub fn parse_frame(key: &str) -> Result<i32> {
    key.trim()
        .parse()
        .map_err(|_| CreatureError::InvalidAsset(format!("frame key '{key}' is not an integer")))
}

/// Split flat xy pairs into vectors
pub fn read_points_2d(flat: &[f32]) -> Vec<Vec2> {
    flat.chunks_exact(2).map(|xy| Vec2::new(xy[0], xy[1])).collect()
}

/// First two components of a point array
pub fn read_pt(values: &[f32], owner: &str, field: &str) -> Result<Vec2> {
    match values {
        [x, y, ..] => Ok(Vec2::new(*x, *y)),
        _ => Err(CreatureError::InvalidAsset(format!(
            "'{owner}' field {field} needs at least 2 values"
        ))),
    }
}
