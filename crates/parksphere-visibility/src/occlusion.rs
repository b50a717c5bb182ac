//! Cached occlusion-query results.
//!
//! A query is a best-effort hint: anything unresolved, lost or timed out
//! counts as visible. Each frame a random fraction of the cached answers is
//! dropped so stale results are eventually re-queried without querying
//! every object every frame.

use parksphere_render::{NodeId, OcclusionQuery, QueryStatus, RenderBackend};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rustc_hash::FxHashMap;
use tracing::debug;

#[derive(Debug)]
struct InFlight {
    query: OcclusionQuery,
    issued_ms: f64,
}

/// Per-object occlusion cache with random invalidation.
#[derive(Debug)]
pub struct OcclusionCache {
    enabled: bool,
    results: FxHashMap<NodeId, bool>,
    in_flight: FxHashMap<NodeId, InFlight>,
    rng: ChaCha8Rng,
    invalidation_ratio: f32,
    timeout_ms: f64,
    timeouts: u64,
}

impl OcclusionCache {
    pub fn new(enabled: bool, invalidation_ratio: f32, timeout_ms: f64, seed: u64) -> Self {
        Self {
            enabled,
            results: FxHashMap::default(),
            in_flight: FxHashMap::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            invalidation_ratio: invalidation_ratio.clamp(0.0, 1.0),
            timeout_ms: timeout_ms.max(0.0),
            timeouts: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn disable(&mut self) {
        self.enabled = false;
        self.clear();
    }

    /// Whether `id` should be drawn. Issues a query when nothing is cached.
    pub fn is_visible(&mut self, id: NodeId, backend: &mut dyn RenderBackend, now_ms: f64) -> bool {
        if !self.enabled {
            return true;
        }
        if let Some(&visible) = self.results.get(&id) {
            return visible;
        }

        if !self.in_flight.contains_key(&id) {
            let Some(query) = backend.query_occlusion(id) else {
                debug!("Occlusion queries unavailable, disabling");
                self.disable();
                return true;
            };
            self.in_flight.insert(
                id,
                InFlight {
                    query,
                    issued_ms: now_ms,
                },
            );
        }
        self.resolve(id, now_ms)
    }

    fn resolve(&mut self, id: NodeId, now_ms: f64) -> bool {
        let Some(entry) = self.in_flight.get(&id) else {
            return true;
        };
        match entry.query.poll() {
            QueryStatus::Ready(visible) => {
                self.in_flight.remove(&id);
                self.results.insert(id, visible);
                visible
            }
            QueryStatus::Lost => {
                self.in_flight.remove(&id);
                true
            }
            QueryStatus::Pending => {
                if now_ms - entry.issued_ms > self.timeout_ms {
                    self.in_flight.remove(&id);
                    self.timeouts += 1;
                }
                true
            }
        }
    }

    /// Drop each cached answer with probability `invalidation_ratio`.
    pub fn invalidate_random(&mut self) -> usize {
        let before = self.results.len();
        let ratio = self.invalidation_ratio;
        let rng = &mut self.rng;
        self.results.retain(|_, _| rng.random::<f32>() >= ratio);
        before - self.results.len()
    }

    pub fn forget(&mut self, id: NodeId) {
        self.results.remove(&id);
        self.in_flight.remove(&id);
    }

    pub fn cached(&self, id: NodeId) -> Option<bool> {
        self.results.get(&id).copied()
    }

    pub fn cached_count(&self) -> usize {
        self.results.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Queries abandoned after the timeout.
    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    pub fn clear(&mut self) {
        self.results.clear();
        self.in_flight.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use parksphere_render::{
        BackendCapabilities, BoundingSphere, HeadlessBackend, NodeDesc, NodeLayer, OcclusionMode,
        SurfaceDescriptor,
    };

    fn backend() -> (HeadlessBackend, NodeId) {
        let mut backend = HeadlessBackend::new();
        backend.initialize(&SurfaceDescriptor::new(640, 480)).unwrap();
        let id = backend.add_node(NodeDesc::new(
            "rock",
            NodeLayer::Terrain,
            BoundingSphere::new(Vec3::ZERO, 1.0),
        ));
        (backend, id)
    }

    #[test]
    fn test_immediate_answer_is_cached() {
        let (mut backend, id) = backend();
        backend.set_occluded(id, true);
        let mut cache = OcclusionCache::new(true, 0.0, 100.0, 1);
        assert!(!cache.is_visible(id, &mut backend, 0.0));
        assert!(!cache.is_visible(id, &mut backend, 1.0));
        assert_eq!(backend.queries_issued(), 1);
        assert_eq!(cache.cached(id), Some(false));
    }

    #[test]
    fn test_pending_query_assumed_visible() {
        let (mut backend, id) = backend();
        backend.set_occlusion_mode(OcclusionMode::NextFrame);
        backend.set_occluded(id, true);
        let mut cache = OcclusionCache::new(true, 0.0, 100.0, 1);
        assert!(cache.is_visible(id, &mut backend, 0.0));
        assert_eq!(cache.in_flight_count(), 1);

        backend.render();
        assert!(!cache.is_visible(id, &mut backend, 16.0));
        assert_eq!(backend.queries_issued(), 1);
    }

    #[test]
    fn test_stalled_query_times_out() {
        let (mut backend, id) = backend();
        backend.set_occlusion_mode(OcclusionMode::Stalled);
        let mut cache = OcclusionCache::new(true, 0.0, 100.0, 1);
        assert!(cache.is_visible(id, &mut backend, 0.0));
        assert!(cache.is_visible(id, &mut backend, 50.0));
        assert!(cache.is_visible(id, &mut backend, 150.0));
        assert_eq!(cache.timeouts(), 1);
        assert_eq!(cache.in_flight_count(), 0);
        // A fresh query goes out next time.
        cache.is_visible(id, &mut backend, 160.0);
        assert_eq!(backend.queries_issued(), 2);
    }

    #[test]
    fn test_missing_capability_disables() {
        let mut backend = HeadlessBackend::new().with_capabilities(BackendCapabilities {
            occlusion_query: false,
            ..BackendCapabilities::default()
        });
        backend.initialize(&SurfaceDescriptor::new(640, 480)).unwrap();
        let id = backend.add_node(NodeDesc::new(
            "rock",
            NodeLayer::Terrain,
            BoundingSphere::new(Vec3::ZERO, 1.0),
        ));
        let mut cache = OcclusionCache::new(true, 0.1, 100.0, 1);
        assert!(cache.is_visible(id, &mut backend, 0.0));
        assert!(!cache.is_enabled());
    }

    #[test]
    fn test_disabled_never_queries() {
        let (mut backend, id) = backend();
        backend.set_occluded(id, true);
        let mut cache = OcclusionCache::new(false, 0.1, 100.0, 1);
        assert!(cache.is_visible(id, &mut backend, 0.0));
        assert_eq!(backend.queries_issued(), 0);
    }

    #[test]
    fn test_random_invalidation_ratio() {
        let (mut backend, _) = backend();
        let ids: Vec<NodeId> = (0..1000)
            .map(|i| {
                backend.add_node(NodeDesc::new(
                    format!("n{i}"),
                    NodeLayer::Terrain,
                    BoundingSphere::new(Vec3::ZERO, 1.0),
                ))
            })
            .collect();
        let mut cache = OcclusionCache::new(true, 0.1, 100.0, 7);
        for &id in &ids {
            cache.is_visible(id, &mut backend, 0.0);
        }
        assert_eq!(cache.cached_count(), 1000);
        let dropped = cache.invalidate_random();
        assert!((50..=150).contains(&dropped), "dropped {dropped}");
        assert_eq!(cache.cached_count(), 1000 - dropped);
    }

    #[test]
    fn test_invalidation_is_deterministic_per_seed() {
        let run = || {
            let (mut backend, _) = backend();
            let mut cache = OcclusionCache::new(true, 0.5, 100.0, 42);
            for i in 0..64 {
                let id = backend.add_node(NodeDesc::new(
                    format!("n{i}"),
                    NodeLayer::Terrain,
                    BoundingSphere::new(Vec3::ZERO, 1.0),
                ));
                cache.is_visible(id, &mut backend, 0.0);
            }
            cache.invalidate_random()
        };
        assert_eq!(run(), run());
    }
}
