//! Render-side building blocks: the backend seam and its headless
//! implementation, the camera, frustum and bounds math, mesh payloads and
//! frame-time history.

pub mod backend;
pub mod bounds;
pub mod camera;
pub mod frustum;
pub mod headless;
pub mod history;
pub mod mesh;

pub use backend::{
    AntialiasMode, BackendCapabilities, GeometryHandle, MarkerInstance, NodeDesc, NodeId,
    NodeLayer, OcclusionQuery, QueryStatus, RenderBackend, RenderContextError, RenderInfo,
    RenderQuality, SurfaceDescriptor, TextureHandle, TextureTier,
};
pub use bounds::{Aabb, BoundingSphere};
pub use camera::{Camera, CameraPose, CameraUniform, DEFAULT_POSITION};
pub use frustum::Frustum;
pub use headless::{HeadlessBackend, HeadlessNode, OcclusionMode};
pub use history::FrameHistory;
pub use mesh::{MeshData, TextureData};
