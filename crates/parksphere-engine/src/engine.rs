//! The orchestrator: view-mode state machine, event bus and the per-frame
//! pipeline.
//!
//! One frame runs strictly in this order: auto-rotate gate, time uniforms,
//! marker pulse, asset integration and picking, camera, visibility, quality,
//! quality push, render, metrics. Everything happens on the caller's thread.

use glam::Vec3;
use parksphere_assets::{AssetCache, AssetKey, CacheStats, Catalog, MAX_LEVEL, Site, terrain_texture_path};
use parksphere_camera::{
    CameraAnimator, CameraController, Completion, EasingFunction, FreeFlyController,
    FreeFlySettings, OrbitController,
};
use parksphere_input::{InputState, KeyCode};
use parksphere_metrics::{MetricsCollector, MetricsSnapshot, MetricsThresholds};
use parksphere_quality::{DeviceProfile, DeviceTier, QualityController};
use parksphere_render::{
    Aabb, Camera, CameraPose, GeometryHandle, NodeDesc, NodeId, NodeLayer, RenderBackend,
    RenderInfo, RenderQuality, SurfaceDescriptor, TextureHandle,
};
use parksphere_visibility::{LodThresholds, VisibilityOptimizer, VisibilityStats};
use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus, EventHandler, EventKind, SubscriptionId};
use crate::globe::GlobeScene;
use crate::markers::MarkerSet;
use crate::options::EngineOptions;

const LOD_SLOTS: usize = MAX_LEVEL as usize + 1;

/// Top-level view state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "site", rename_all = "lowercase")]
pub enum ViewMode {
    Globe,
    Terrain(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    Disposed,
}

/// What a finished camera flight leads to.
#[derive(Debug, Clone, PartialEq)]
enum Flight {
    EnterTerrain(String),
    ReturnGlobe,
    FlyTo,
}

#[derive(Debug)]
enum ActiveController {
    Orbit(OrbitController),
    FreeFly(FreeFlyController),
}

impl ActiveController {
    fn as_controller(&mut self) -> &mut dyn CameraController {
        match self {
            ActiveController::Orbit(c) => c,
            ActiveController::FreeFly(c) => c,
        }
    }
}

/// The terrain of the site being visited. Geometry belongs to the cache.
#[derive(Debug)]
struct ActiveTerrain {
    site_id: String,
    node: Option<NodeId>,
    bounds: Option<Aabb>,
    levels: [Option<GeometryHandle>; LOD_SLOTS],
    texture_settled: bool,
}

impl ActiveTerrain {
    fn new(site_id: &str) -> Self {
        Self {
            site_id: site_id.to_string(),
            node: None,
            bounds: None,
            levels: [None; LOD_SLOTS],
            texture_settled: false,
        }
    }

    /// No LOD level has arrived yet, so there is nothing to fly to.
    fn is_awaiting(&self) -> bool {
        self.node.is_none()
    }
}

/// Camera pose that frames a terrain tile from its near edge.
pub fn terrain_view_pose(bounds: &Aabb) -> CameraPose {
    let center = bounds.center();
    let half = bounds.extents();
    let reach = half.x.min(half.z).max(1.0);
    CameraPose::new(center + Vec3::new(0.0, half.y + reach * 0.6, reach * 0.9), center)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualitySnapshot {
    pub preset: String,
    pub index: usize,
    pub ceiling: usize,
    pub emergency_level: u32,
    pub transitioning: bool,
    pub render: RenderQuality,
}

/// Everything the diagnostics overlay shows, in one serializable value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub mode: ViewMode,
    pub frame: u64,
    pub animating: bool,
    pub transitioning: bool,
    pub metrics: MetricsSnapshot,
    pub quality: QualitySnapshot,
    pub visibility: VisibilityStats,
    pub assets: CacheStats,
    pub device: Option<DeviceProfile>,
    pub markers: usize,
}

/// The engine facade the host drives.
pub struct Engine<B: RenderBackend> {
    backend: B,
    cache: AssetCache,
    options: EngineOptions,
    lifecycle: Lifecycle,
    surface: SurfaceDescriptor,

    camera: Camera,
    input: InputState,
    events: EventBus,
    animator: CameraAnimator<Flight>,
    controller: Option<ActiveController>,

    mode: ViewMode,
    terrain: Option<ActiveTerrain>,
    scene: Option<GlobeScene>,
    globe_texture_settled: bool,
    markers: MarkerSet,
    catalog: Catalog,

    device: Option<DeviceProfile>,
    // Rebuilt by `initialize` from the device profile and backend capabilities.
    quality: QualityController,
    visibility: VisibilityOptimizer,
    metrics: MetricsCollector,

    clock_ms: f64,
    frame_index: u64,
}

impl<B: RenderBackend> Engine<B> {
    pub fn new(backend: B, cache: AssetCache, options: EngineOptions) -> Self {
        let camera = Camera {
            fov_y: options.fov_degrees.to_radians(),
            ..Camera::default()
        };
        let quality = QualityController::new(
            options.device_tier.unwrap_or(DeviceTier::Low),
            options.quality.clone(),
            None,
        );
        let visibility =
            VisibilityOptimizer::new(options.visibility.clone(), &backend.capabilities());
        let metrics = MetricsCollector::new(
            MetricsThresholds::with_target_fps(options.quality.target_fps),
            options.metrics_history,
        );
        Self {
            backend,
            cache,
            lifecycle: Lifecycle::Created,
            surface: SurfaceDescriptor::new(1, 1),
            camera,
            input: InputState::new(),
            events: EventBus::new(),
            animator: CameraAnimator::new(),
            controller: None,
            mode: ViewMode::Globe,
            terrain: None,
            scene: None,
            globe_texture_settled: false,
            markers: MarkerSet::default(),
            catalog: Catalog::empty(),
            device: None,
            quality,
            visibility,
            metrics,
            clock_ms: 0.0,
            frame_index: 0,
            options,
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Create the render context, profile the device and build the globe
    /// scene. The only fallible engine call.
    pub fn initialize(
        &mut self,
        surface: SurfaceDescriptor,
        quality_override: Option<&str>,
    ) -> Result<(), EngineError> {
        match self.lifecycle {
            Lifecycle::Running => return Err(EngineError::AlreadyInitialized),
            Lifecycle::Disposed => return Err(EngineError::Disposed),
            Lifecycle::Created => {}
        }
        if let Err(e) = self.backend.initialize(&surface) {
            error!("Engine initialization failed: {e}");
            return Err(e.into());
        }
        self.surface = surface;
        self.camera
            .set_aspect_ratio(surface.width as f32, surface.height as f32);

        let capabilities = self.backend.capabilities();
        let profile = match self.options.device_tier {
            Some(tier) => DeviceProfile::fixed(tier, capabilities.clone()),
            None => self
                .options
                .profiler
                .profile(&mut self.backend, &self.options.environment),
        };
        let preset = quality_override.or(self.options.preset.as_deref());
        self.quality = QualityController::new(profile.tier, self.options.quality.clone(), preset);
        self.visibility = VisibilityOptimizer::new(self.options.visibility.clone(), &capabilities);
        self.visibility
            .set_finest_level(self.quality.effective().finest_lod_level());

        self.scene = Some(GlobeScene::build(&mut self.backend));
        self.register_globe();
        let _ = self
            .cache
            .request_texture(&self.options.globe_texture, self.clock_ms);

        info!(
            width = surface.width,
            height = surface.height,
            tier = %profile.tier,
            preset = self.quality.current_preset_name(),
            "Engine initialized"
        );
        self.device = Some(profile);
        self.lifecycle = Lifecycle::Running;
        self.reseat_controller();
        self.backend.apply_quality(&self.quality.render_quality());
        Ok(())
    }

    /// Load the site catalog and rebuild the markers. An unavailable
    /// catalog yields an empty list.
    pub fn load_static_data(&mut self) -> Vec<Site> {
        if self.lifecycle == Lifecycle::Disposed {
            return Vec::new();
        }
        self.catalog = self.cache.load_manifest();
        self.markers = MarkerSet::from_sites(self.catalog.sites());
        self.sync_markers();
        self.catalog.sites().to_vec()
    }

    /// Release every node, cached resource and subscriber. Idempotent.
    pub fn dispose(&mut self) {
        if self.lifecycle == Lifecycle::Disposed {
            return;
        }
        self.animator.cancel();
        if let Some(mut controller) = self.controller.take() {
            controller.as_controller().dispose();
        }
        self.teardown_terrain();
        if let Some(scene) = self.scene.take() {
            scene.dispose(&mut self.backend);
        }
        self.visibility.clear();
        self.cache.clear(&mut self.backend);
        self.events.clear();
        self.backend.dispose();
        self.lifecycle = Lifecycle::Disposed;
        info!(frames = self.frame_index, "Engine disposed");
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 || self.lifecycle != Lifecycle::Running {
            return;
        }
        self.surface.width = width;
        self.surface.height = height;
        self.backend.resize(&self.surface);
        self.camera.set_aspect_ratio(width as f32, height as f32);
        if let Some(ActiveController::Orbit(orbit)) = &mut self.controller {
            orbit.set_viewport(width as f32, height as f32);
        }
    }

    // ── Per-frame pipeline ──────────────────────────────────────────

    /// Run one frame of `dt_ms` milliseconds. Before `initialize` and after
    /// `dispose` this renders nothing.
    pub fn frame(&mut self, dt_ms: f32) -> RenderInfo {
        if self.lifecycle != Lifecycle::Running {
            return RenderInfo::default();
        }
        let dt_ms = if dt_ms.is_finite() { dt_ms.max(0.0) } else { 0.0 };
        let dt_s = dt_ms / 1000.0;
        self.clock_ms += f64::from(dt_ms);
        self.frame_index += 1;

        let auto_rotate = self.mode == ViewMode::Globe
            && !self.animator.is_animating()
            && self.markers.hovered().is_none();
        if let Some(ActiveController::Orbit(orbit)) = &mut self.controller {
            orbit.set_auto_rotate_allowed(auto_rotate);
        }

        let seconds = (self.clock_ms / 1000.0) as f32;
        self.backend.set_uniform("time", seconds);
        self.backend.set_uniform("cloud_rotation", seconds * 0.005);

        let pulse = self.markers.advance(dt_s);
        self.backend.set_uniform("marker_pulse", pulse);
        self.sync_markers();

        self.integrate_assets();
        self.handle_input();
        self.update_camera(dt_ms);

        self.visibility
            .optimize(dt_ms, &self.camera, &mut self.backend);

        if let Some(change) = self.quality.update(dt_ms) {
            info!(?change, "Quality preset changed");
        }
        self.backend.apply_quality(&self.quality.render_quality());
        self.visibility
            .set_finest_level(self.quality.effective().finest_lod_level());

        self.backend.set_camera(&self.camera);
        let info = self.backend.render();
        self.visibility.record_render(&info);
        self.metrics.record(dt_ms, &info);

        self.input.clear_transients();
        info
    }

    fn sync_markers(&mut self) {
        if let Some(scene) = &self.scene
            && self.markers.take_dirty()
        {
            scene.set_marker_instances(&mut self.backend, &self.markers.instances());
        }
    }

    /// Integrate finished loads and attach whatever the current view is
    /// waiting for.
    fn integrate_assets(&mut self) {
        let resolved = self.cache.poll(&mut self.backend, self.clock_ms);
        if !resolved.is_empty() {
            trace!(count = resolved.len(), "Assets resolved");
        }
        self.attach_globe_texture();
        self.attach_terrain();
    }

    fn attach_globe_texture(&mut self) {
        if self.globe_texture_settled {
            return;
        }
        let url = &self.options.globe_texture;
        if self.cache.is_pending(&AssetKey::Texture(url.clone())) {
            return;
        }
        let texture = self.cache.texture(url);
        if let Some(scene) = &mut self.scene {
            scene.set_texture(&mut self.backend, texture);
        }
        if texture.is_none() {
            debug!(%url, "Globe renders untextured");
        }
        self.globe_texture_settled = true;
    }

    fn attach_terrain(&mut self) {
        let Some(active) = self.terrain.as_mut() else {
            return;
        };
        let mut first_bounds = None;
        for level in 0..=MAX_LEVEL {
            let slot = usize::from(level);
            if active.levels[slot].is_some() {
                continue;
            }
            let Some(asset) = self.cache.terrain(&active.site_id, level) else {
                continue;
            };
            let node = match active.node {
                Some(node) => node,
                None => {
                    let bounds = asset.bounds();
                    let sphere = bounds.bounding_sphere();
                    let node = self.backend.add_node(
                        NodeDesc::new(
                            format!("terrain-{}", active.site_id),
                            NodeLayer::Terrain,
                            sphere,
                        )
                        .with_lods(vec![None; LOD_SLOTS]),
                    );
                    self.visibility
                        .register_lod(node, sphere, LodThresholds::default_terrain());
                    active.node = Some(node);
                    active.bounds = Some(bounds);
                    first_bounds = Some(bounds);
                    node
                }
            };
            self.backend.set_node_geometry(node, slot, asset.geometry);
            active.levels[slot] = Some(asset.geometry);
        }

        if !active.texture_settled {
            let path = terrain_texture_path(&active.site_id);
            if !self.cache.is_pending(&AssetKey::Texture(path.clone())) {
                let texture: Option<TextureHandle> = self.cache.texture(&path);
                if let Some(node) = active.node {
                    self.backend.set_node_texture(node, texture);
                    active.texture_settled = true;
                }
            }
        }

        if let Some(bounds) = first_bounds {
            let site_id = active.site_id.clone();
            debug!(site = %site_id, "Terrain attached; flying in");
            self.start_flight(
                terrain_view_pose(&bounds),
                self.options.enter_transition_ms,
                Flight::EnterTerrain(site_id),
            );
        }
    }

    fn handle_input(&mut self) {
        match &self.mode {
            ViewMode::Terrain(_) => {
                if self.input.keyboard.just_pressed(KeyCode::Escape) {
                    self.back();
                }
            }
            ViewMode::Globe => self.handle_picking(),
        }
    }

    fn handle_picking(&mut self) {
        if self.animator.is_animating() {
            return;
        }
        let pointer = &self.input.pointer;
        let hit = if pointer.is_inside() {
            let pos = pointer.position();
            let (origin, dir) = self.camera.screen_ray(
                pos.x,
                pos.y,
                self.surface.width as f32,
                self.surface.height as f32,
            );
            self.markers.pick(origin, dir).map(str::to_owned)
        } else {
            None
        };
        let clicked = pointer.clicked();

        if self.markers.set_hovered(hit.as_deref()) {
            self.events.emit(&EngineEvent::Hover {
                site_id: hit.clone(),
            });
        }
        if clicked && let Some(site_id) = hit {
            self.events.emit(&EngineEvent::Click {
                site_id: site_id.clone(),
            });
            self.enter_site(&site_id);
        }
    }

    fn update_camera(&mut self, dt_ms: f32) {
        let before = self.camera.pose();
        if let Some(flight) = self.animator.update(f64::from(dt_ms), &mut self.camera) {
            self.finish_flight(flight);
        } else if !self.animator.is_animating()
            && !self.awaiting_terrain()
            && let Some(controller) = &mut self.controller
        {
            controller
                .as_controller()
                .update(dt_ms / 1000.0, &self.input, &mut self.camera);
        }
        let pose = self.camera.pose();
        if pose != before {
            self.events.emit(&EngineEvent::CameraChange { pose });
        }
    }

    // ── View-mode transitions ───────────────────────────────────────

    /// Switch to the terrain view of `site_id`. Unknown ids and the site
    /// already shown are no-ops. Returns whether the view changed.
    ///
    /// Until the first LOD level is resident the camera holds still: the
    /// orbit controller is suspended and the flight starts on attach.
    pub fn enter_site(&mut self, site_id: &str) -> bool {
        if self.lifecycle != Lifecycle::Running || !self.catalog.contains(site_id) {
            debug!(site = site_id, "Ignoring enter request");
            return false;
        }
        if matches!(&self.mode, ViewMode::Terrain(current) if current == site_id) {
            return false;
        }

        if let Some(ActiveController::FreeFly(_)) = &self.controller
            && let Some(mut controller) = self.controller.take()
        {
            controller.as_controller().dispose();
        }
        self.teardown_terrain();
        self.hide_globe();
        self.markers.set_hovered(None);
        self.markers.set_selected(Some(site_id));

        info!(site = site_id, "Entering terrain view");
        self.mode = ViewMode::Terrain(site_id.to_string());
        self.terrain = Some(ActiveTerrain::new(site_id));
        self.cache
            .preload_site(&mut self.backend, site_id, self.clock_ms);
        self.integrate_assets();
        true
    }

    /// Return to the globe. A no-op on the globe already.
    pub fn back(&mut self) -> bool {
        if self.lifecycle != Lifecycle::Running || self.mode == ViewMode::Globe {
            return false;
        }
        if let Some(mut controller) = self.controller.take() {
            controller.as_controller().dispose();
        }
        self.teardown_terrain();
        self.mode = ViewMode::Globe;
        self.show_globe();
        self.markers.set_selected(None);

        info!("Returning to globe view");
        self.start_flight(
            CameraPose::default(),
            self.options.return_transition_ms,
            Flight::ReturnGlobe,
        );
        true
    }

    fn hide_globe(&mut self) {
        if let Some(scene) = &mut self.scene
            && !scene.is_hidden()
        {
            for id in scene.nodes() {
                self.visibility.unregister(id);
            }
            scene.set_hidden(&mut self.backend, true);
        }
    }

    fn show_globe(&mut self) {
        if let Some(scene) = &mut self.scene
            && scene.is_hidden()
        {
            scene.set_hidden(&mut self.backend, false);
        }
        self.register_globe();
    }

    fn register_globe(&mut self) {
        if let Some(scene) = &self.scene {
            self.visibility
                .register(scene.globe_node(), GlobeScene::globe_bounds());
            self.visibility
                .register_unoccludable(scene.marker_node(), GlobeScene::marker_bounds());
        }
    }

    /// Remove the terrain node and evict the site's GPU resources.
    fn teardown_terrain(&mut self) {
        let Some(active) = self.terrain.take() else {
            return;
        };
        if let Some(node) = active.node {
            self.visibility.unregister(node);
            self.backend.remove_node(node);
        }
        let evicted = self.cache.evict_terrain(&mut self.backend, &active.site_id);
        self.cache
            .evict_texture(&mut self.backend, &terrain_texture_path(&active.site_id));
        debug!(site = %active.site_id, evicted, "Terrain torn down");
    }

    fn start_flight(&mut self, end: CameraPose, duration_ms: f64, flight: Flight) -> Completion {
        self.animator.start(
            &self.camera,
            end,
            duration_ms,
            EasingFunction::EaseInOutCubic,
            flight,
        )
    }

    fn finish_flight(&mut self, flight: Flight) {
        match flight {
            Flight::EnterTerrain(site) => info!(site = %site, "Arrived at terrain"),
            Flight::ReturnGlobe => info!("Back on the globe"),
            Flight::FlyTo => debug!("Camera flight finished"),
        }
        self.reseat_controller();
    }

    /// Replace the controller with the one the current mode uses, adopting
    /// the live camera pose.
    fn reseat_controller(&mut self) {
        if let Some(mut old) = self.controller.take() {
            old.as_controller().dispose();
        }
        self.controller = match &self.mode {
            ViewMode::Globe => {
                let mut orbit = OrbitController::from_camera(&self.camera, self.options.orbit.clone());
                orbit.set_viewport(self.surface.width as f32, self.surface.height as f32);
                Some(ActiveController::Orbit(orbit))
            }
            ViewMode::Terrain(_) => self
                .terrain
                .as_ref()
                .and_then(|t| t.bounds)
                .map(|bounds| {
                    ActiveController::FreeFly(FreeFlyController::from_camera(
                        &self.camera,
                        self.free_fly_settings(bounds),
                    ))
                }),
        };
    }

    fn free_fly_settings(&self, bounds: Aabb) -> FreeFlySettings {
        let base = &self.options.free_fly;
        FreeFlySettings {
            min_height: bounds.min.y + base.min_height,
            max_height: bounds.max.y + base.max_height,
            bounds: Some(bounds),
            ..base.clone()
        }
    }

    // ── Host surface ────────────────────────────────────────────────

    /// Animate the camera to `pose` over `duration_ms`. A running flight is
    /// superseded from the live pose.
    pub fn fly_to(&mut self, pose: CameraPose, duration_ms: f64) -> Completion {
        if self.lifecycle != Lifecycle::Running {
            return Completion::cancelled();
        }
        self.start_flight(pose, duration_ms, Flight::FlyTo)
    }

    pub fn get_view(&self) -> CameraPose {
        self.camera.pose()
    }

    /// Jump to `pose`, cancelling any flight.
    pub fn set_view(&mut self, pose: CameraPose) {
        if self.lifecycle != Lifecycle::Running {
            return;
        }
        self.animator.cancel();
        let before = self.camera.pose();
        self.camera.set_pose(pose);
        self.reseat_controller();
        if pose != before {
            self.events.emit(&EngineEvent::CameraChange { pose });
        }
    }

    /// Select a marker, or clear the selection with `None`. Unknown ids
    /// change nothing and return false.
    pub fn highlight_site(&mut self, site_id: Option<&str>) -> bool {
        let changed = self.markers.set_selected(site_id);
        if !changed && let Some(id) = site_id {
            warn!(site = id, "highlight_site: unknown site");
        }
        changed
    }

    pub fn on(&mut self, kind: EventKind, handler: EventHandler) -> SubscriptionId {
        self.events.on(kind, handler)
    }

    pub fn off(&mut self, id: SubscriptionId) -> bool {
        self.events.off(id)
    }

    pub fn metrics(&self) -> EngineSnapshot {
        EngineSnapshot {
            mode: self.mode.clone(),
            frame: self.frame_index,
            animating: self.animator.is_animating(),
            transitioning: self.is_transitioning(),
            metrics: self.metrics.snapshot(),
            quality: QualitySnapshot {
                preset: self.quality.current_preset_name().to_string(),
                index: self.quality.current_index(),
                ceiling: self.quality.ceiling(),
                emergency_level: self.quality.emergency_level(),
                transitioning: self.quality.is_transitioning(),
                render: self.quality.render_quality(),
            },
            visibility: self.visibility.stats(),
            assets: self.cache.stats(),
            device: self.device.clone(),
            markers: self.markers.len(),
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn mode(&self) -> &ViewMode {
        &self.mode
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    /// A camera flight is running.
    pub fn is_animating(&self) -> bool {
        self.animator.is_animating()
    }

    /// A view change is still under way: either a flight is running or the
    /// terrain view is waiting for its first LOD level.
    pub fn is_transitioning(&self) -> bool {
        self.animator.is_animating() || self.awaiting_terrain()
    }

    fn awaiting_terrain(&self) -> bool {
        self.terrain.as_ref().is_some_and(ActiveTerrain::is_awaiting)
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Host-fed input; cleared of per-frame transients after each frame.
    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    pub fn device_profile(&self) -> Option<&DeviceProfile> {
        self.device.as_ref()
    }

    pub fn quality(&self) -> &QualityController {
        &self.quality
    }

    pub fn assets(&self) -> &AssetCache {
        &self.cache
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn globe_nodes(&self) -> Option<[NodeId; 2]> {
        self.scene.as_ref().map(GlobeScene::nodes)
    }

    pub fn terrain_node(&self) -> Option<NodeId> {
        self.terrain.as_ref().and_then(|t| t.node)
    }

    pub fn terrain_bounds(&self) -> Option<Aabb> {
        self.terrain.as_ref().and_then(|t| t.bounds)
    }

    /// True once the walkthrough controller is driving the camera.
    pub fn is_free_flying(&self) -> bool {
        matches!(self.controller, Some(ActiveController::FreeFly(_)))
    }

    pub fn is_orbiting(&self) -> bool {
        matches!(self.controller, Some(ActiveController::Orbit(_)))
    }
}

impl<B: RenderBackend> Drop for Engine<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parksphere_assets::{CacheSettings, MemorySource};
    use parksphere_render::HeadlessBackend;
    use std::sync::Arc;

    const CATALOG: &str = r#"[
        {"id": 1, "name": "Alpha", "coordinates": {"lat": 0.0, "lon": -90.0}, "category": "mountain"},
        {"id": "2", "name": "Beta", "coordinates": {"lat": 40.0, "lon": 30.0}, "category": "forest"}
    ]"#;

    fn engine() -> Engine<HeadlessBackend> {
        let source = Arc::new(MemorySource::new());
        source.insert("parks.json", CATALOG.as_bytes().to_vec());
        let cache = AssetCache::inline(source, CacheSettings::default());
        let options = EngineOptions::default().with_device_tier(DeviceTier::High);
        Engine::new(HeadlessBackend::new(), cache, options)
    }

    fn running() -> Engine<HeadlessBackend> {
        let mut engine = engine();
        engine
            .initialize(SurfaceDescriptor::new(1280, 720), None)
            .expect("headless init");
        engine.load_static_data();
        engine
    }

    #[test]
    fn test_frame_before_initialize_is_noop() {
        let mut engine = engine();
        assert_eq!(engine.frame(16.0), RenderInfo::default());
        assert_eq!(engine.backend().frames_rendered(), 0);
    }

    #[test]
    fn test_initialize_twice_fails() {
        let mut engine = running();
        assert!(matches!(
            engine.initialize(SurfaceDescriptor::new(10, 10), None),
            Err(EngineError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_quality_override_respects_ceiling() {
        let mut engine = engine();
        engine
            .initialize(SurfaceDescriptor::new(640, 480), Some("ultra"))
            .expect("headless init");
        assert_eq!(engine.quality().current_preset_name(), "high");
    }

    #[test]
    fn test_frame_pushes_uniforms_and_quality() {
        let mut engine = running();
        engine.frame(16.0);
        let backend = engine.backend();
        assert_eq!(backend.frames_rendered(), 1);
        assert!(backend.uniform("time").is_some());
        assert!(backend.uniform("marker_pulse").is_some());
        assert!(backend.quality().is_some());
        assert!(backend.camera().is_some());
    }

    #[test]
    fn test_markers_are_one_instanced_node() {
        let mut engine = running();
        engine.frame(16.0);
        assert_eq!(engine.markers().len(), 2);
        let marker_nodes = engine.backend().nodes_in_layer(NodeLayer::Markers);
        assert_eq!(marker_nodes.len(), 1);
        let node = engine.backend().node(marker_nodes[0]).map(|n| n.instances.len());
        assert_eq!(node, Some(2));
    }

    #[test]
    fn test_unknown_site_is_noop() {
        let mut engine = running();
        assert!(!engine.enter_site("404"));
        assert!(!engine.highlight_site(Some("404")));
        assert_eq!(engine.mode(), &ViewMode::Globe);
    }

    #[test]
    fn test_enter_hides_globe_and_starts_flight() {
        let mut engine = running();
        assert!(engine.enter_site("1"));
        assert_eq!(engine.mode(), &ViewMode::Terrain("1".into()));
        assert!(engine.is_animating());
        assert!(engine.terrain_node().is_some());
        let [globe, markers] = engine.globe_nodes().expect("scene");
        assert_eq!(engine.backend().is_visible(globe), Some(false));
        assert_eq!(engine.backend().is_visible(markers), Some(false));
        // Entering the same site again changes nothing.
        assert!(!engine.enter_site("1"));
    }

    #[test]
    fn test_back_on_globe_is_noop() {
        let mut engine = running();
        assert!(!engine.back());
    }

    #[test]
    fn test_set_view_cancels_flight() {
        let mut engine = running();
        let completion = engine.fly_to(CameraPose::new(Vec3::new(0.0, 2.0, 4.0), Vec3::ZERO), 1000.0);
        engine.frame(16.0);
        let pose = CameraPose::new(Vec3::new(4.0, 0.0, 0.0), Vec3::ZERO);
        engine.set_view(pose);
        assert_eq!(
            completion.poll(),
            Some(parksphere_camera::AnimationOutcome::Cancelled)
        );
        assert!(engine.get_view().approx_eq(&pose, 1e-6));
        assert!(engine.is_orbiting());
    }

    #[test]
    fn test_dispose_releases_everything() {
        let mut engine = running();
        engine.enter_site("2");
        engine.frame(16.0);
        engine.dispose();
        assert!(engine.backend().is_disposed());
        assert_eq!(engine.backend().invalid_releases(), 0);
        assert_eq!(engine.assets().stats().terrain_entries, 0);
        assert!(matches!(
            engine.initialize(SurfaceDescriptor::new(10, 10), None),
            Err(EngineError::Disposed)
        ));
        assert_eq!(engine.fly_to(CameraPose::default(), 10.0).poll(),
            Some(parksphere_camera::AnimationOutcome::Cancelled));
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut engine = running();
        engine.frame(16.0);
        let json = serde_json::to_value(engine.metrics()).expect("serialize");
        assert_eq!(json["mode"]["mode"], "globe");
        assert_eq!(json["quality"]["preset"], "high");
        assert_eq!(json["markers"], 2);
        assert_eq!(json["device"]["tier"], "high");
    }
}
