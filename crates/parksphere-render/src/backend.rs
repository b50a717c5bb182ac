//! The minimal render-backend surface the engine drives.
//!
//! Culling, quality and asset code only talk to [`RenderBackend`], so the
//! whole engine runs against [`HeadlessBackend`](crate::HeadlessBackend) in
//! tests without a GPU context.

use std::time::Duration;

use bytemuck::{Pod, Zeroable};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::bounds::BoundingSphere;
use crate::camera::Camera;
use crate::mesh::{MeshData, TextureData};

/// Error type for render context initialization failures.
#[derive(Debug, thiserror::Error)]
pub enum RenderContextError {
    /// The surface has a zero dimension.
    #[error("surface has zero size ({width}x{height})")]
    ZeroSizedSurface { width: u32, height: u32 },

    /// The backend cannot create a context on this host.
    #[error("render context unavailable: {0}")]
    Unavailable(String),

    /// `initialize` was called on a backend that is already live.
    #[error("render context already initialized")]
    AlreadyInitialized,
}

/// What the host hands the engine to render into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceDescriptor {
    pub width: u32,
    pub height: u32,
    /// Device pixels per logical pixel.
    pub pixel_ratio: f32,
}

impl SurfaceDescriptor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixel_ratio: 1.0,
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

/// Feature-support set reported by the backend.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BackendCapabilities {
    pub renderer: String,
    pub occlusion_query: bool,
    pub instancing: bool,
    pub compressed_textures: bool,
    pub float_render_targets: bool,
    pub max_texture_size: u32,
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self {
            renderer: "headless".to_string(),
            occlusion_query: true,
            instancing: true,
            compressed_textures: false,
            float_render_targets: true,
            max_texture_size: 8192,
        }
    }
}

/// GPU-resident geometry. Owned by whoever uploaded it (the asset cache).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryHandle(pub u64);

/// GPU-resident texture. Owned by whoever uploaded it (the asset cache).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u64);

/// A scene node in the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Coarse grouping of scene nodes, used when hiding the globe as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeLayer {
    Globe,
    Terrain,
    Markers,
    Background,
}

/// Everything needed to add a node. Nodes reference geometry, never own it.
#[derive(Debug, Clone)]
pub struct NodeDesc {
    pub name: String,
    pub layer: NodeLayer,
    pub bounds: BoundingSphere,
    /// Geometry per LOD level; index 0 is the finest. Missing levels fall
    /// back to the nearest loaded one.
    pub lods: Vec<Option<GeometryHandle>>,
    pub texture: Option<TextureHandle>,
    pub visible: bool,
}

impl NodeDesc {
    pub fn new(name: impl Into<String>, layer: NodeLayer, bounds: BoundingSphere) -> Self {
        Self {
            name: name.into(),
            layer,
            bounds,
            lods: Vec::new(),
            texture: None,
            visible: true,
        }
    }

    pub fn with_geometry(mut self, geometry: GeometryHandle) -> Self {
        self.lods = vec![Some(geometry)];
        self
    }

    pub fn with_lods(mut self, lods: Vec<Option<GeometryHandle>>) -> Self {
        self.lods = lods;
        self
    }

    pub fn with_texture(mut self, texture: Option<TextureHandle>) -> Self {
        self.texture = texture;
        self
    }
}

/// Per-instance marker data: one instanced draw for every site marker.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MarkerInstance {
    pub position: [f32; 3],
    pub scale: f32,
    pub color: [f32; 4],
}

/// Antialiasing mode in the render-quality projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum AntialiasMode {
    None,
    Fxaa,
    Msaa(u8),
}

/// Texture resolution tier in the render-quality projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub enum TextureTier {
    Low,
    Medium,
    High,
}

/// Simplified quality settings consumed by the backend each frame.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RenderQuality {
    pub render_scale: f32,
    pub shadows: bool,
    pub shadow_map_size: u32,
    pub antialias: AntialiasMode,
    pub texture_tier: TextureTier,
    pub bloom: bool,
    pub bloom_strength: f32,
    pub ssao: bool,
    pub reflections: bool,
}

impl Default for RenderQuality {
    fn default() -> Self {
        Self {
            render_scale: 1.0,
            shadows: true,
            shadow_map_size: 2048,
            antialias: AntialiasMode::Fxaa,
            texture_tier: TextureTier::Medium,
            bloom: false,
            bloom_strength: 0.0,
            ssao: false,
            reflections: false,
        }
    }
}

/// Renderer counters for one frame plus resident resource totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct RenderInfo {
    pub draw_calls: u32,
    pub triangles: u64,
    pub points: u64,
    pub lines: u64,
    pub geometries: u32,
    pub textures: u32,
    pub geometry_bytes: u64,
    pub texture_bytes: u64,
    /// GPU time for the frame when the backend can measure it.
    pub gpu_time_ms: Option<f32>,
}

impl RenderInfo {
    pub fn memory_bytes(&self) -> u64 {
        self.geometry_bytes + self.texture_bytes
    }
}

/// Outcome of polling an [`OcclusionQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Pending,
    /// `true` if any sample passed the depth test.
    Ready(bool),
    /// The backend dropped the query; callers assume visible.
    Lost,
}

/// A visibility query resolving on a later frame.
#[derive(Debug)]
pub struct OcclusionQuery {
    receiver: Receiver<bool>,
}

impl OcclusionQuery {
    /// A query and the sender the backend resolves it through.
    pub fn pending() -> (Sender<bool>, Self) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        (tx, Self { receiver: rx })
    }

    /// An already-answered query.
    pub fn resolved(visible: bool) -> Self {
        let (tx, query) = Self::pending();
        // Capacity 1 and the receiver is alive, so this cannot fail.
        let _ = tx.send(visible);
        query
    }

    /// Non-blocking poll.
    pub fn poll(&self) -> QueryStatus {
        match self.receiver.try_recv() {
            Ok(visible) => QueryStatus::Ready(visible),
            Err(TryRecvError::Empty) => QueryStatus::Pending,
            Err(TryRecvError::Disconnected) => QueryStatus::Lost,
        }
    }

    /// Blocking wait up to `timeout`; `Pending` if it elapses.
    pub fn wait(&self, timeout: Duration) -> QueryStatus {
        match self.receiver.recv_timeout(timeout) {
            Ok(visible) => QueryStatus::Ready(visible),
            Err(RecvTimeoutError::Timeout) => QueryStatus::Pending,
            Err(RecvTimeoutError::Disconnected) => QueryStatus::Lost,
        }
    }
}

/// The render backend seam.
///
/// All calls happen on the frame thread. Handles returned by the upload
/// methods stay valid until released; nodes never release what they
/// reference.
pub trait RenderBackend {
    /// Create the context for `surface`. The only fallible call.
    fn initialize(&mut self, surface: &SurfaceDescriptor) -> Result<(), RenderContextError>;

    fn capabilities(&self) -> BackendCapabilities;

    fn resize(&mut self, surface: &SurfaceDescriptor);

    fn upload_geometry(&mut self, mesh: &MeshData) -> GeometryHandle;
    fn release_geometry(&mut self, handle: GeometryHandle);
    fn upload_texture(&mut self, texture: &TextureData) -> TextureHandle;
    fn release_texture(&mut self, handle: TextureHandle);

    fn add_node(&mut self, desc: NodeDesc) -> NodeId;
    fn remove_node(&mut self, id: NodeId);
    fn set_visible(&mut self, id: NodeId, visible: bool);
    /// Select which LOD slot of a node is drawn.
    fn set_lod_level(&mut self, id: NodeId, level: usize);
    /// Fill or replace one LOD slot of a node.
    fn set_node_geometry(&mut self, id: NodeId, level: usize, geometry: GeometryHandle);
    fn set_node_texture(&mut self, id: NodeId, texture: Option<TextureHandle>);

    /// Replace the instance buffer of an instanced node.
    fn set_marker_instances(&mut self, id: NodeId, instances: &[MarkerInstance]);
    /// Set a named float uniform (shader time, cloud rotation, ...).
    fn set_uniform(&mut self, name: &str, value: f32);
    fn set_camera(&mut self, camera: &Camera);
    fn apply_quality(&mut self, quality: &RenderQuality);

    /// Issue a visibility query for a node. `None` when unsupported.
    fn query_occlusion(&mut self, id: NodeId) -> Option<OcclusionQuery>;

    /// Draw the frame and report counters.
    fn render(&mut self) -> RenderInfo;

    /// Drop every node and resource. The backend is unusable afterwards.
    fn dispose(&mut self);
}
