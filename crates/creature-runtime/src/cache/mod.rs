//! Per-frame animation caches
//!
//! A clip stores three independent caches over the same integer frame range:
//! bone endpoints, region displacements and region UV warps. Each one is a
//! [`FrameTable`] of keyed snapshots that can be sampled at a fractional time.

mod bone;
mod displacement;
mod frame_table;
mod uv_warp;

pub use bone::{BoneCache, BoneCacheManager};
pub use displacement::{DisplacementCache, DisplacementCacheManager};
pub use frame_table::{FrameTable, Keyed};
pub use uv_warp::{UvWarpCache, UvWarpCacheManager};

/// Outcome of sampling a cache
///
/// Sampling a frame that has not been marked ready leaves the targets
/// untouched and reports [`Retrieval::NotReady`] instead of failing.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retrieval {
    Applied,
    NotReady,
}

impl Retrieval {
    pub fn is_applied(self) -> bool {
        self == Self::Applied
    }
}
