//! Per-frame culling and LOD-bias control.

use parksphere_render::{
    BackendCapabilities, BoundingSphere, Camera, FrameHistory, Frustum, NodeId, RenderBackend,
    RenderInfo,
};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, trace};

use crate::lod::{LodThresholds, MAX_LOD_BIAS, MIN_LOD_BIAS};
use crate::occlusion::OcclusionCache;

/// Multiplicative bias change per frame while out of budget.
const BIAS_STEP: f32 = 1.05;

#[derive(Debug, Clone, PartialEq)]
pub struct VisibilitySettings {
    /// Objects whose nearest point is farther than this are hidden.
    pub max_draw_distance: f32,
    pub occlusion_culling: bool,
    pub occlusion_timeout_ms: f64,
    /// Fraction of cached occlusion answers dropped per frame.
    pub invalidation_ratio: f32,
    pub target_fps: f32,
    pub history_len: usize,
    pub seed: u64,
}

impl Default for VisibilitySettings {
    fn default() -> Self {
        Self {
            max_draw_distance: 100.0,
            occlusion_culling: true,
            occlusion_timeout_ms: 100.0,
            invalidation_ratio: 0.1,
            target_fps: 60.0,
            history_len: 60,
            seed: 0x5eed,
        }
    }
}

/// Counters from the most recent [`VisibilityOptimizer::optimize`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VisibilityStats {
    pub total: u32,
    pub visible: u32,
    pub culled_frustum: u32,
    pub culled_distance: u32,
    pub culled_occlusion: u32,
    /// From the last render recorded with [`VisibilityOptimizer::record_render`].
    pub draw_calls: u32,
    pub triangles: u64,
    pub average_frame_ms: f32,
    pub lod_bias: f32,
}

impl VisibilityStats {
    pub fn culled(&self) -> u32 {
        self.culled_frustum + self.culled_distance + self.culled_occlusion
    }
}

#[derive(Debug, Clone)]
struct Tracked {
    bounds: BoundingSphere,
    lod: Option<LodThresholds>,
    occludable: bool,
}

/// Decides node visibility and LOD level every frame.
///
/// Only registered nodes are touched; everything else keeps whatever
/// visibility its owner set.
#[derive(Debug)]
pub struct VisibilityOptimizer {
    settings: VisibilitySettings,
    objects: FxHashMap<NodeId, Tracked>,
    occlusion: OcclusionCache,
    history: FrameHistory,
    lod_bias: f32,
    finest_level: u8,
    clock_ms: f64,
    stats: VisibilityStats,
}

impl VisibilityOptimizer {
    /// Occlusion culling is enabled only when both the settings ask for it
    /// and the backend can answer queries.
    pub fn new(settings: VisibilitySettings, capabilities: &BackendCapabilities) -> Self {
        let occlusion_enabled = settings.occlusion_culling && capabilities.occlusion_query;
        if settings.occlusion_culling && !capabilities.occlusion_query {
            debug!(renderer = %capabilities.renderer, "No occlusion queries; culling without them");
        }
        Self {
            occlusion: OcclusionCache::new(
                occlusion_enabled,
                settings.invalidation_ratio,
                settings.occlusion_timeout_ms,
                settings.seed,
            ),
            history: FrameHistory::new(settings.history_len),
            settings,
            objects: FxHashMap::default(),
            lod_bias: 1.0,
            finest_level: 0,
            clock_ms: 0.0,
            stats: VisibilityStats {
                lod_bias: 1.0,
                ..VisibilityStats::default()
            },
        }
    }

    /// Track a node for frustum, distance and occlusion culling.
    pub fn register(&mut self, id: NodeId, bounds: BoundingSphere) {
        self.objects.insert(
            id,
            Tracked {
                bounds,
                lod: None,
                occludable: true,
            },
        );
    }

    /// Track a node that also switches LOD level by distance.
    pub fn register_lod(&mut self, id: NodeId, bounds: BoundingSphere, thresholds: LodThresholds) {
        self.objects.insert(
            id,
            Tracked {
                bounds,
                lod: Some(thresholds),
                occludable: true,
            },
        );
    }

    /// Track a node that is never occlusion-tested (e.g. the globe itself).
    pub fn register_unoccludable(&mut self, id: NodeId, bounds: BoundingSphere) {
        self.objects.insert(
            id,
            Tracked {
                bounds,
                lod: None,
                occludable: false,
            },
        );
    }

    pub fn unregister(&mut self, id: NodeId) {
        self.objects.remove(&id);
        self.occlusion.forget(id);
    }

    pub fn is_registered(&self, id: NodeId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn set_bounds(&mut self, id: NodeId, bounds: BoundingSphere) {
        if let Some(obj) = self.objects.get_mut(&id) {
            obj.bounds = bounds;
            self.occlusion.forget(id);
        }
    }

    /// Finest LOD level the current quality preset allows.
    pub fn set_finest_level(&mut self, level: u8) {
        self.finest_level = level;
    }

    pub fn lod_bias(&self) -> f32 {
        self.lod_bias
    }

    pub fn stats(&self) -> VisibilityStats {
        self.stats
    }

    pub fn occlusion_enabled(&self) -> bool {
        self.occlusion.is_enabled()
    }

    /// Cull every registered node against `camera` and push the results into
    /// `backend`. `frame_ms` feeds the LOD-bias loop.
    pub fn optimize(
        &mut self,
        frame_ms: f32,
        camera: &Camera,
        backend: &mut dyn RenderBackend,
    ) -> VisibilityStats {
        if frame_ms.is_finite() && frame_ms >= 0.0 {
            self.clock_ms += f64::from(frame_ms);
        }
        self.history.push(frame_ms);
        self.adjust_bias();

        let frustum = Frustum::from_view_projection(&camera.view_projection_matrix());
        let eye = camera.position;
        self.occlusion.invalidate_random();

        let mut stats = VisibilityStats {
            draw_calls: self.stats.draw_calls,
            triangles: self.stats.triangles,
            average_frame_ms: self.history.average_ms().unwrap_or(0.0),
            lod_bias: self.lod_bias,
            ..VisibilityStats::default()
        };

        for (&id, obj) in &self.objects {
            stats.total += 1;
            let distance = obj.bounds.distance_to(eye);
            let visible = if distance > self.settings.max_draw_distance {
                stats.culled_distance += 1;
                false
            } else if !frustum.intersects_sphere(&obj.bounds) {
                stats.culled_frustum += 1;
                false
            } else if obj.occludable && !self.occlusion.is_visible(id, backend, self.clock_ms) {
                stats.culled_occlusion += 1;
                false
            } else {
                stats.visible += 1;
                true
            };
            backend.set_visible(id, visible);

            if visible && let Some(lod) = &obj.lod {
                let level = lod.select(distance, self.lod_bias, self.finest_level);
                backend.set_lod_level(id, usize::from(level));
            }
        }

        trace!(
            visible = stats.visible,
            culled = stats.culled(),
            bias = self.lod_bias,
            "Visibility pass"
        );
        self.stats = stats;
        stats
    }

    /// Record the counters of the frame just rendered.
    pub fn record_render(&mut self, info: &RenderInfo) {
        self.stats.draw_calls = info.draw_calls;
        self.stats.triangles = info.triangles;
    }

    fn adjust_bias(&mut self) {
        let Some(avg_ms) = self.history.average_ms() else {
            return;
        };
        let budget_ms = 1000.0 / self.settings.target_fps.max(1.0);
        if avg_ms > budget_ms {
            self.lod_bias = (self.lod_bias * BIAS_STEP).min(MAX_LOD_BIAS);
        } else if avg_ms < budget_ms * 0.9 {
            self.lod_bias = (self.lod_bias / BIAS_STEP).max(MIN_LOD_BIAS);
        }
    }

    /// Forget every tracked object and cached query.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.occlusion.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use parksphere_render::{
        HeadlessBackend, MeshData, NodeDesc, NodeLayer, OcclusionMode, SurfaceDescriptor,
    };

    fn setup() -> (HeadlessBackend, Camera) {
        let mut backend = HeadlessBackend::new();
        backend.initialize(&SurfaceDescriptor::new(800, 600)).unwrap();
        let camera = Camera {
            position: Vec3::new(0.0, 0.0, 10.0),
            target: Vec3::ZERO,
            ..Camera::default()
        };
        (backend, camera)
    }

    fn add(backend: &mut HeadlessBackend, center: Vec3, radius: f32) -> (NodeId, BoundingSphere) {
        let bounds = BoundingSphere::new(center, radius);
        let geometry = backend.upload_geometry(&MeshData::uv_sphere(radius, 8, 4));
        let id = backend.add_node(
            NodeDesc::new("obj", NodeLayer::Terrain, bounds).with_geometry(geometry),
        );
        (id, bounds)
    }

    #[test]
    fn test_object_in_view_is_visible() {
        let (mut backend, camera) = setup();
        let (id, bounds) = add(&mut backend, Vec3::ZERO, 1.0);
        let mut opt = VisibilityOptimizer::new(VisibilitySettings::default(), &backend.capabilities());
        opt.register(id, bounds);
        let stats = opt.optimize(16.0, &camera, &mut backend);
        assert_eq!(stats.visible, 1);
        assert_eq!(backend.is_visible(id), Some(true));
    }

    #[test]
    fn test_object_behind_camera_is_frustum_culled() {
        let (mut backend, camera) = setup();
        let (id, bounds) = add(&mut backend, Vec3::new(0.0, 0.0, 30.0), 1.0);
        let mut opt = VisibilityOptimizer::new(VisibilitySettings::default(), &backend.capabilities());
        opt.register(id, bounds);
        let stats = opt.optimize(16.0, &camera, &mut backend);
        assert_eq!(stats.culled_frustum, 1);
        assert_eq!(backend.is_visible(id), Some(false));
    }

    #[test]
    fn test_distance_cull_overrides_frustum() {
        let (mut backend, camera) = setup();
        let (id, bounds) = add(&mut backend, Vec3::new(0.0, 0.0, -200.0), 1.0);
        let mut opt = VisibilityOptimizer::new(VisibilitySettings::default(), &backend.capabilities());
        opt.register(id, bounds);
        let stats = opt.optimize(16.0, &camera, &mut backend);
        assert_eq!(stats.culled_distance, 1);
        assert_eq!(backend.is_visible(id), Some(false));
    }

    #[test]
    fn test_occluded_object_hidden() {
        let (mut backend, camera) = setup();
        let (id, bounds) = add(&mut backend, Vec3::ZERO, 1.0);
        backend.set_occluded(id, true);
        let mut opt = VisibilityOptimizer::new(VisibilitySettings::default(), &backend.capabilities());
        opt.register(id, bounds);
        let stats = opt.optimize(16.0, &camera, &mut backend);
        assert_eq!(stats.culled_occlusion, 1);
        assert_eq!(backend.is_visible(id), Some(false));
    }

    #[test]
    fn test_unresolved_query_assumed_visible() {
        let (mut backend, camera) = setup();
        backend.set_occlusion_mode(OcclusionMode::Stalled);
        let (id, bounds) = add(&mut backend, Vec3::ZERO, 1.0);
        backend.set_occluded(id, true);
        let mut opt = VisibilityOptimizer::new(VisibilitySettings::default(), &backend.capabilities());
        opt.register(id, bounds);
        for _ in 0..20 {
            opt.optimize(16.0, &camera, &mut backend);
            assert_eq!(backend.is_visible(id), Some(true));
        }
    }

    #[test]
    fn test_unoccludable_skips_queries() {
        let (mut backend, camera) = setup();
        let (id, bounds) = add(&mut backend, Vec3::ZERO, 1.0);
        backend.set_occluded(id, true);
        let mut opt = VisibilityOptimizer::new(VisibilitySettings::default(), &backend.capabilities());
        opt.register_unoccludable(id, bounds);
        opt.optimize(16.0, &camera, &mut backend);
        assert_eq!(backend.is_visible(id), Some(true));
        assert_eq!(backend.queries_issued(), 0);
    }

    #[test]
    fn test_bias_rises_when_slow_and_falls_when_fast() {
        let (mut backend, camera) = setup();
        let mut opt = VisibilityOptimizer::new(VisibilitySettings::default(), &backend.capabilities());
        for _ in 0..200 {
            opt.optimize(40.0, &camera, &mut backend);
        }
        assert_eq!(opt.lod_bias(), MAX_LOD_BIAS);
        for _ in 0..400 {
            opt.optimize(5.0, &camera, &mut backend);
        }
        assert_eq!(opt.lod_bias(), MIN_LOD_BIAS);
    }

    #[test]
    fn test_lod_level_follows_distance_and_bias() {
        let (mut backend, camera) = setup();
        let (id, bounds) = add(&mut backend, Vec3::ZERO, 1.0);
        let mut opt = VisibilityOptimizer::new(VisibilitySettings::default(), &backend.capabilities());
        opt.register_lod(id, bounds, LodThresholds::default());
        // 9 units away, on budget: full detail.
        opt.optimize(1000.0 / 60.0 * 0.95, &camera, &mut backend);
        assert_eq!(backend.lod_level(id), Some(0));

        for _ in 0..100 {
            opt.optimize(40.0, &camera, &mut backend);
        }
        // 9 * 2.0 = 18 -> level 1.
        assert_eq!(backend.lod_level(id), Some(1));

        opt.set_finest_level(2);
        opt.optimize(40.0, &camera, &mut backend);
        assert_eq!(backend.lod_level(id), Some(2));
    }

    #[test]
    fn test_stats_include_render_counters() {
        let (mut backend, camera) = setup();
        let (id, bounds) = add(&mut backend, Vec3::ZERO, 1.0);
        let mut opt = VisibilityOptimizer::new(VisibilitySettings::default(), &backend.capabilities());
        opt.register(id, bounds);
        opt.optimize(16.0, &camera, &mut backend);
        let info = backend.render();
        opt.record_render(&info);
        let stats = opt.stats();
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.triangles, info.triangles);
        assert!((stats.average_frame_ms - 16.0).abs() < 1e-4);
    }

    #[test]
    fn test_unregistered_nodes_untouched() {
        let (mut backend, camera) = setup();
        let (id, bounds) = add(&mut backend, Vec3::new(0.0, 0.0, 30.0), 1.0);
        let mut opt = VisibilityOptimizer::new(VisibilitySettings::default(), &backend.capabilities());
        opt.register(id, bounds);
        opt.unregister(id);
        opt.optimize(16.0, &camera, &mut backend);
        assert_eq!(backend.is_visible(id), Some(true));
        assert!(!opt.is_registered(id));
    }
}
