//! In-memory render backend.
//!
//! Records every node, upload and release so callers can assert on resource
//! lifecycles, and reports counters computed from the recorded scene. The
//! app runs on it when no GPU is wanted, and every test uses it as the fake
//! GPU.

use crossbeam_channel::Sender;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::backend::{
    BackendCapabilities, GeometryHandle, MarkerInstance, NodeDesc, NodeId, NodeLayer,
    OcclusionQuery, RenderBackend, RenderContextError, RenderInfo, RenderQuality,
    SurfaceDescriptor, TextureHandle,
};
use crate::camera::{Camera, CameraUniform};
use crate::mesh::{MeshData, TextureData};

/// How the headless backend answers occlusion queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OcclusionMode {
    /// Answer when the query is issued.
    #[default]
    Immediate,
    /// Answer during the next `render()`, like a real GPU readback.
    NextFrame,
    /// Never answer.
    Stalled,
}

#[derive(Debug, Clone, Copy)]
struct GeometryRecord {
    triangles: u64,
    bytes: u64,
}

/// A node as the headless backend stores it.
#[derive(Debug, Clone)]
pub struct HeadlessNode {
    pub desc: NodeDesc,
    pub lod_level: usize,
    pub instances: Vec<MarkerInstance>,
}

impl HeadlessNode {
    /// The geometry drawn at the current LOD level, falling back to the
    /// nearest coarser slot, then the nearest finer one.
    pub fn active_geometry(&self) -> Option<GeometryHandle> {
        let lods = &self.desc.lods;
        let level = self.lod_level.min(lods.len().saturating_sub(1));
        lods.iter()
            .skip(level)
            .flatten()
            .next()
            .or_else(|| lods.iter().take(level).rev().flatten().next())
            .copied()
    }
}

/// Render backend that draws nothing and remembers everything.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    surface: Option<SurfaceDescriptor>,
    capabilities: BackendCapabilities,
    fail_initialize: Option<String>,
    disposed: bool,
    next_id: u64,

    geometries: FxHashMap<GeometryHandle, GeometryRecord>,
    textures: FxHashMap<TextureHandle, u64>,
    nodes: FxHashMap<NodeId, HeadlessNode>,
    released_geometries: Vec<GeometryHandle>,
    released_textures: Vec<TextureHandle>,
    invalid_releases: u32,

    uniforms: FxHashMap<String, f32>,
    camera: Option<CameraUniform>,
    quality: Option<RenderQuality>,

    occluded: FxHashSet<NodeId>,
    occlusion_mode: OcclusionMode,
    pending_queries: Vec<(NodeId, Sender<bool>)>,
    queries_issued: u64,

    simulated_frame_ms: Option<f32>,
    frames_rendered: u64,
    last_info: RenderInfo,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the reported capabilities.
    pub fn with_capabilities(mut self, capabilities: BackendCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Make `initialize` fail with [`RenderContextError::Unavailable`].
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail_initialize: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Report this GPU time from every `render()` call.
    pub fn with_frame_time(mut self, ms: f32) -> Self {
        self.simulated_frame_ms = Some(ms);
        self
    }

    pub fn set_frame_time(&mut self, ms: Option<f32>) {
        self.simulated_frame_ms = ms;
    }

    pub fn set_occlusion_mode(&mut self, mode: OcclusionMode) {
        self.occlusion_mode = mode;
    }

    /// Mark a node as hidden behind other geometry for occlusion queries.
    pub fn set_occluded(&mut self, id: NodeId, occluded: bool) {
        if occluded {
            self.occluded.insert(id);
        } else {
            self.occluded.remove(&id);
        }
    }

    // ── Inspection ──────────────────────────────────────────────────

    pub fn is_initialized(&self) -> bool {
        self.surface.is_some() && !self.disposed
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn surface(&self) -> Option<SurfaceDescriptor> {
        self.surface
    }

    pub fn node(&self, id: NodeId) -> Option<&HeadlessNode> {
        self.nodes.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Ids of the nodes in `layer`, sorted.
    pub fn nodes_in_layer(&self, layer: NodeLayer) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.desc.layer == layer)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// `None` for unknown nodes.
    pub fn is_visible(&self, id: NodeId) -> Option<bool> {
        self.nodes.get(&id).map(|n| n.desc.visible)
    }

    pub fn lod_level(&self, id: NodeId) -> Option<usize> {
        self.nodes.get(&id).map(|n| n.lod_level)
    }

    pub fn is_geometry_live(&self, handle: GeometryHandle) -> bool {
        self.geometries.contains_key(&handle)
    }

    pub fn is_texture_live(&self, handle: TextureHandle) -> bool {
        self.textures.contains_key(&handle)
    }

    pub fn live_geometry_count(&self) -> usize {
        self.geometries.len()
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Every geometry released so far, in release order.
    pub fn released_geometries(&self) -> &[GeometryHandle] {
        &self.released_geometries
    }

    pub fn released_textures(&self) -> &[TextureHandle] {
        &self.released_textures
    }

    /// Releases of handles that were not live (double frees).
    pub fn invalid_releases(&self) -> u32 {
        self.invalid_releases
    }

    pub fn uniform(&self, name: &str) -> Option<f32> {
        self.uniforms.get(name).copied()
    }

    pub fn camera(&self) -> Option<&CameraUniform> {
        self.camera.as_ref()
    }

    pub fn quality(&self) -> Option<&RenderQuality> {
        self.quality.as_ref()
    }

    pub fn queries_issued(&self) -> u64 {
        self.queries_issued
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn last_info(&self) -> RenderInfo {
        self.last_info
    }

    fn next_handle(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn answer_pending_queries(&mut self) {
        for (id, tx) in self.pending_queries.drain(..) {
            let _ = tx.send(!self.occluded.contains(&id));
        }
    }
}

impl RenderBackend for HeadlessBackend {
    fn initialize(&mut self, surface: &SurfaceDescriptor) -> Result<(), RenderContextError> {
        if let Some(reason) = &self.fail_initialize {
            return Err(RenderContextError::Unavailable(reason.clone()));
        }
        if self.is_initialized() {
            return Err(RenderContextError::AlreadyInitialized);
        }
        if surface.width == 0 || surface.height == 0 {
            return Err(RenderContextError::ZeroSizedSurface {
                width: surface.width,
                height: surface.height,
            });
        }
        log::info!(
            "Headless backend initialized: {}x{} @{}x",
            surface.width,
            surface.height,
            surface.pixel_ratio
        );
        self.surface = Some(*surface);
        self.disposed = false;
        Ok(())
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities.clone()
    }

    fn resize(&mut self, surface: &SurfaceDescriptor) {
        if surface.width > 0 && surface.height > 0 {
            self.surface = Some(*surface);
        }
    }

    fn upload_geometry(&mut self, mesh: &MeshData) -> GeometryHandle {
        let handle = GeometryHandle(self.next_handle());
        self.geometries.insert(
            handle,
            GeometryRecord {
                triangles: mesh.triangle_count() as u64,
                bytes: mesh.byte_size(),
            },
        );
        handle
    }

    fn release_geometry(&mut self, handle: GeometryHandle) {
        if self.geometries.remove(&handle).is_some() {
            self.released_geometries.push(handle);
        } else {
            log::warn!("Release of unknown geometry {handle:?}");
            self.invalid_releases += 1;
        }
    }

    fn upload_texture(&mut self, texture: &TextureData) -> TextureHandle {
        let handle = TextureHandle(self.next_handle());
        self.textures.insert(handle, texture.byte_size());
        handle
    }

    fn release_texture(&mut self, handle: TextureHandle) {
        if self.textures.remove(&handle).is_some() {
            self.released_textures.push(handle);
        } else {
            log::warn!("Release of unknown texture {handle:?}");
            self.invalid_releases += 1;
        }
    }

    fn add_node(&mut self, desc: NodeDesc) -> NodeId {
        let id = NodeId(self.next_handle());
        self.nodes.insert(
            id,
            HeadlessNode {
                desc,
                lod_level: 0,
                instances: Vec::new(),
            },
        );
        id
    }

    fn remove_node(&mut self, id: NodeId) {
        self.nodes.remove(&id);
        self.occluded.remove(&id);
    }

    fn set_visible(&mut self, id: NodeId, visible: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.desc.visible = visible;
        }
    }

    fn set_lod_level(&mut self, id: NodeId, level: usize) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.lod_level = level;
        }
    }

    fn set_node_geometry(&mut self, id: NodeId, level: usize, geometry: GeometryHandle) {
        if let Some(node) = self.nodes.get_mut(&id) {
            if node.desc.lods.len() <= level {
                node.desc.lods.resize(level + 1, None);
            }
            node.desc.lods[level] = Some(geometry);
        }
    }

    fn set_node_texture(&mut self, id: NodeId, texture: Option<TextureHandle>) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.desc.texture = texture;
        }
    }

    fn set_marker_instances(&mut self, id: NodeId, instances: &[MarkerInstance]) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.instances.clear();
            node.instances.extend_from_slice(instances);
        }
    }

    fn set_uniform(&mut self, name: &str, value: f32) {
        self.uniforms.insert(name.to_string(), value);
    }

    fn set_camera(&mut self, camera: &Camera) {
        self.camera = Some(camera.to_uniform());
    }

    fn apply_quality(&mut self, quality: &RenderQuality) {
        if self.quality.as_ref() != Some(quality) {
            log::debug!(
                "Render quality: scale {:.2}, shadows {}, {:?}",
                quality.render_scale,
                quality.shadows,
                quality.antialias
            );
            self.quality = Some(quality.clone());
        }
    }

    fn query_occlusion(&mut self, id: NodeId) -> Option<OcclusionQuery> {
        if !self.capabilities.occlusion_query {
            return None;
        }
        self.queries_issued += 1;
        match self.occlusion_mode {
            OcclusionMode::Immediate => {
                Some(OcclusionQuery::resolved(!self.occluded.contains(&id)))
            }
            OcclusionMode::NextFrame => {
                let (tx, query) = OcclusionQuery::pending();
                self.pending_queries.push((id, tx));
                Some(query)
            }
            OcclusionMode::Stalled => {
                let (tx, query) = OcclusionQuery::pending();
                // Kept alive so the query stays pending rather than lost.
                self.pending_queries.push((id, tx));
                Some(query)
            }
        }
    }

    fn render(&mut self) -> RenderInfo {
        let mut info = RenderInfo::default();
        for node in self.nodes.values().filter(|n| n.desc.visible) {
            let Some(record) = node
                .active_geometry()
                .and_then(|g| self.geometries.get(&g))
            else {
                continue;
            };
            if node.desc.layer == NodeLayer::Markers {
                if node.instances.is_empty() {
                    continue;
                }
                info.triangles += record.triangles * node.instances.len() as u64;
            } else {
                info.triangles += record.triangles;
            }
            info.draw_calls += 1;
        }
        info.geometries = self.geometries.len() as u32;
        info.textures = self.textures.len() as u32;
        info.geometry_bytes = self.geometries.values().map(|g| g.bytes).sum();
        info.texture_bytes = self.textures.values().sum();
        info.gpu_time_ms = self.simulated_frame_ms;

        if self.occlusion_mode == OcclusionMode::NextFrame {
            self.answer_pending_queries();
        }
        self.frames_rendered += 1;
        self.last_info = info;
        info
    }

    fn dispose(&mut self) {
        let geometries = self.geometries.len();
        let textures = self.textures.len();
        self.nodes.clear();
        self.geometries.clear();
        self.textures.clear();
        self.pending_queries.clear();
        self.uniforms.clear();
        self.disposed = true;
        log::info!("Headless backend disposed ({geometries} geometries, {textures} textures)");
    }
}
