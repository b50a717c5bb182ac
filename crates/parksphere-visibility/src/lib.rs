//! Per-frame visibility: frustum, distance and occlusion culling plus a
//! frame-time driven LOD bias.

mod lod;
mod occlusion;
mod optimizer;

pub use lod::{LodThresholds, MAX_LOD_BIAS, MIN_LOD_BIAS};
pub use occlusion::OcclusionCache;
pub use optimizer::{VisibilityOptimizer, VisibilitySettings, VisibilityStats};
