//! Process-wide asset cache: one entry per key, explicit GPU disposal,
//! procedural fallback for terrain and null handles for textures.
//!
//! The cache is the sole owner of every GPU resource it uploads. Nodes that
//! draw a cached mesh only reference its handle; eviction is the one place
//! that releases. All mutation happens on the frame thread: the loader's
//! workers fetch and decode, and [`AssetCache::poll`] integrates.

use std::sync::Arc;
use std::time::Duration;

use parksphere_render::{Aabb, GeometryHandle, MeshData, RenderBackend, TextureHandle};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::AssetError;
use crate::loader::{
    AssetKey, AssetLoader, LoadJob, LoadResult, Payload, run_job, terrain_texture_path,
};
use crate::procedural::{MAX_LEVEL, TerrainParams, generate_terrain};
use crate::source::AssetSource;

/// Where a terrain mesh came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssetOrigin {
    Fetched,
    Procedural,
}

/// One resident terrain LOD. Immutable once inserted.
#[derive(Debug)]
pub struct LodAsset {
    pub site_id: String,
    pub level: u8,
    pub mesh: MeshData,
    pub geometry: GeometryHandle,
    pub origin: AssetOrigin,
}

impl LodAsset {
    pub fn bounds(&self) -> Aabb {
        self.mesh.bounds
    }
}

/// Answer to a non-blocking terrain request.
#[derive(Debug, Clone)]
pub enum TerrainRequest {
    Ready(Arc<LodAsset>),
    Pending,
}

/// Answer to a non-blocking texture request. `Ready(None)` is the null
/// handle: the texture failed and the caller renders untextured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureRequest {
    Ready(Option<TextureHandle>),
    Pending,
}

#[derive(Debug, Clone, Copy)]
enum TextureEntry {
    Resident(TextureHandle),
    Failed,
}

impl TextureEntry {
    fn handle(self) -> Option<TextureHandle> {
        match self {
            TextureEntry::Resident(h) => Some(h),
            TextureEntry::Failed => None,
        }
    }
}

/// Counters exposed in the diagnostics snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub terrain_entries: usize,
    pub texture_entries: usize,
    pub pending: usize,
    pub hits: u64,
    pub misses: u64,
    pub fetched: u64,
    pub procedural: u64,
    pub failed_textures: u64,
    pub timeouts: u64,
    pub late_discards: u64,
    pub evictions: u64,
}

/// Tuning for [`AssetCache`].
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub manifest_path: String,
    pub fetch_timeout: Duration,
    pub terrain: TerrainParams,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            manifest_path: "parks.json".to_string(),
            fetch_timeout: Duration::from_millis(5000),
            terrain: TerrainParams::default(),
        }
    }
}

/// Terrain and texture cache backed by an [`AssetSource`].
pub struct AssetCache {
    source: Arc<dyn AssetSource>,
    loader: AssetLoader,
    settings: CacheSettings,
    terrain: FxHashMap<(String, u8), Arc<LodAsset>>,
    textures: FxHashMap<String, TextureEntry>,
    /// Outstanding background requests and when they were issued (ms).
    pending: FxHashMap<AssetKey, f64>,
    stats: CacheStats,
}

impl AssetCache {
    pub fn new(source: Arc<dyn AssetSource>, loader: AssetLoader, settings: CacheSettings) -> Self {
        info!(
            source = %source.describe(),
            workers = loader.worker_count(),
            "Asset cache ready"
        );
        Self {
            source,
            loader,
            settings,
            terrain: FxHashMap::default(),
            textures: FxHashMap::default(),
            pending: FxHashMap::default(),
            stats: CacheStats::default(),
        }
    }

    /// A cache whose loads run inline on `submit`.
    pub fn inline(source: Arc<dyn AssetSource>, settings: CacheSettings) -> Self {
        let loader = AssetLoader::inline(Arc::clone(&source));
        Self::new(source, loader, settings)
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    // ── Catalog ─────────────────────────────────────────────────────

    /// Fetch and parse the site catalog. Any failure yields an empty catalog.
    pub fn load_manifest(&self) -> Catalog {
        let path = &self.settings.manifest_path;
        match self.source.fetch(path).map_err(AssetError::from).and_then(|bytes| {
            Catalog::from_json(&bytes).map_err(AssetError::from)
        }) {
            Ok(catalog) => {
                info!(sites = catalog.len(), "Loaded site catalog from {path}");
                catalog
            }
            Err(e) => {
                warn!("Site catalog unavailable ({path}): {e}");
                Catalog::empty()
            }
        }
    }

    // ── Terrain ─────────────────────────────────────────────────────

    /// Resident terrain for `(site, level)`, if any. Does not load.
    pub fn terrain(&self, site: &str, level: u8) -> Option<Arc<LodAsset>> {
        self.terrain.get(&(site.to_string(), level)).cloned()
    }

    /// Blocking load: cached entry, else fetch + decode on this thread, else
    /// the procedural mesh. Always returns renderable geometry.
    pub fn load_terrain(
        &mut self,
        backend: &mut dyn RenderBackend,
        site: &str,
        level: u8,
    ) -> Arc<LodAsset> {
        let level = level.min(MAX_LEVEL);
        if let Some(asset) = self.terrain(site, level) {
            self.stats.hits += 1;
            return asset;
        }
        self.stats.misses += 1;
        let result = run_job(
            self.source.as_ref(),
            LoadJob::for_key(AssetKey::terrain(site, level)),
        );
        self.integrate(backend, result);
        match self.terrain(site, level) {
            Some(asset) => asset,
            None => self.insert_procedural(backend, site, level),
        }
    }

    /// Non-blocking load. A miss queues a background job and returns
    /// `Pending`; the asset appears after a later [`poll`](Self::poll).
    pub fn request_terrain(
        &mut self,
        backend: &mut dyn RenderBackend,
        site: &str,
        level: u8,
        now_ms: f64,
    ) -> TerrainRequest {
        let level = level.min(MAX_LEVEL);
        if let Some(asset) = self.terrain(site, level) {
            self.stats.hits += 1;
            return TerrainRequest::Ready(asset);
        }
        let key = AssetKey::terrain(site, level);
        if self.pending.contains_key(&key) {
            return TerrainRequest::Pending;
        }
        self.stats.misses += 1;
        match self.loader.submit(LoadJob::for_key(key.clone())) {
            Ok(()) => {
                self.pending.insert(key, now_ms);
                TerrainRequest::Pending
            }
            Err(job) => {
                warn!(path = %job.path, "Loader queue full; using procedural terrain");
                TerrainRequest::Ready(self.insert_procedural(backend, site, level))
            }
        }
    }

    /// Queue every LOD level and the terrain texture for `site`. Does not block.
    pub fn preload_site(&mut self, backend: &mut dyn RenderBackend, site: &str, now_ms: f64) {
        debug!(site, "Preloading site assets");
        for level in 0..=MAX_LEVEL {
            let _ = self.request_terrain(backend, site, level, now_ms);
        }
        let _ = self.request_texture(&terrain_texture_path(site), now_ms);
    }

    fn insert_procedural(
        &mut self,
        backend: &mut dyn RenderBackend,
        site: &str,
        level: u8,
    ) -> Arc<LodAsset> {
        let mesh = generate_terrain(site, level, &self.settings.terrain);
        self.stats.procedural += 1;
        self.insert_terrain(backend, site, level, mesh, AssetOrigin::Procedural)
    }

    fn insert_terrain(
        &mut self,
        backend: &mut dyn RenderBackend,
        site: &str,
        level: u8,
        mesh: MeshData,
        origin: AssetOrigin,
    ) -> Arc<LodAsset> {
        let geometry = backend.upload_geometry(&mesh);
        let asset = Arc::new(LodAsset {
            site_id: site.to_string(),
            level,
            mesh,
            geometry,
            origin,
        });
        self.terrain
            .insert((site.to_string(), level), Arc::clone(&asset));
        asset
    }

    /// Release every resident LOD of `site`. Returns how many were evicted.
    /// In-flight requests are left to resolve into the cache.
    pub fn evict_terrain(&mut self, backend: &mut dyn RenderBackend, site: &str) -> usize {
        let keys: Vec<(String, u8)> = self
            .terrain
            .keys()
            .filter(|(s, _)| s == site)
            .cloned()
            .collect();
        for key in &keys {
            if let Some(asset) = self.terrain.remove(key) {
                backend.release_geometry(asset.geometry);
                self.stats.evictions += 1;
            }
        }
        if !keys.is_empty() {
            debug!(site, levels = keys.len(), "Evicted terrain");
        }
        keys.len()
    }

    // ── Textures ────────────────────────────────────────────────────

    /// Blocking texture load. `None` on any failure; failures are remembered
    /// so the same URL is not retried.
    pub fn load_texture(
        &mut self,
        backend: &mut dyn RenderBackend,
        url: &str,
    ) -> Option<TextureHandle> {
        if let Some(entry) = self.textures.get(url) {
            self.stats.hits += 1;
            return entry.handle();
        }
        self.stats.misses += 1;
        let result = run_job(
            self.source.as_ref(),
            LoadJob::for_key(AssetKey::Texture(url.to_string())),
        );
        self.integrate(backend, result);
        self.textures.get(url).and_then(|e| e.handle())
    }

    /// Non-blocking texture load.
    pub fn request_texture(&mut self, url: &str, now_ms: f64) -> TextureRequest {
        if let Some(entry) = self.textures.get(url) {
            self.stats.hits += 1;
            return TextureRequest::Ready(entry.handle());
        }
        let key = AssetKey::Texture(url.to_string());
        if self.pending.contains_key(&key) {
            return TextureRequest::Pending;
        }
        self.stats.misses += 1;
        match self.loader.submit(LoadJob::for_key(key.clone())) {
            Ok(()) => {
                self.pending.insert(key, now_ms);
                TextureRequest::Pending
            }
            Err(job) => {
                warn!(path = %job.path, "Loader queue full; texture skipped");
                self.stats.failed_textures += 1;
                self.textures.insert(url.to_string(), TextureEntry::Failed);
                TextureRequest::Ready(None)
            }
        }
    }

    /// Resident texture handle for `url`, if loaded successfully.
    pub fn texture(&self, url: &str) -> Option<TextureHandle> {
        self.textures.get(url).and_then(|e| e.handle())
    }

    pub fn evict_texture(&mut self, backend: &mut dyn RenderBackend, url: &str) -> bool {
        match self.textures.remove(url) {
            Some(TextureEntry::Resident(handle)) => {
                backend.release_texture(handle);
                self.stats.evictions += 1;
                true
            }
            Some(TextureEntry::Failed) => true,
            None => false,
        }
    }

    // ── Frame integration ───────────────────────────────────────────

    /// Integrate finished background loads and expire overdue ones.
    /// Returns the keys that became resident this call.
    pub fn poll(&mut self, backend: &mut dyn RenderBackend, now_ms: f64) -> Vec<AssetKey> {
        let mut resolved = Vec::new();
        for result in self.loader.drain_results() {
            let key = result.key.clone();
            let was_pending = self.pending.remove(&key).is_some();
            if self.is_resident(&key) {
                debug!(path = %result.path, "Discarding late load result");
                self.stats.late_discards += 1;
                continue;
            }
            if !was_pending {
                // Cleared while in flight.
                continue;
            }
            self.integrate(backend, result);
            resolved.push(key);
        }

        let timeout_ms = self.settings.fetch_timeout.as_secs_f64() * 1000.0;
        let overdue: Vec<AssetKey> = self
            .pending
            .iter()
            .filter(|(_, issued)| now_ms - **issued >= timeout_ms)
            .map(|(k, _)| k.clone())
            .collect();
        for key in overdue {
            self.pending.remove(&key);
            self.stats.timeouts += 1;
            match &key {
                AssetKey::Terrain { site, level } => {
                    warn!(site = %site, level, "Terrain load timed out; using procedural mesh");
                    let (site, level) = (site.clone(), *level);
                    self.insert_procedural(backend, &site, level);
                }
                AssetKey::Texture(url) => {
                    warn!(%url, "Texture load timed out");
                    self.stats.failed_textures += 1;
                    self.textures.insert(url.clone(), TextureEntry::Failed);
                }
            }
            resolved.push(key);
        }
        resolved
    }

    fn is_resident(&self, key: &AssetKey) -> bool {
        match key {
            AssetKey::Terrain { site, level } => {
                self.terrain.contains_key(&(site.clone(), *level))
            }
            AssetKey::Texture(url) => self.textures.contains_key(url),
        }
    }

    /// Turn a load result into a cache entry, substituting fallbacks.
    fn integrate(&mut self, backend: &mut dyn RenderBackend, result: LoadResult) {
        match (result.key, result.outcome) {
            (AssetKey::Terrain { site, level }, Ok(Payload::Mesh(mesh))) if !mesh.is_empty() => {
                debug!(site = %site, level, us = result.elapsed_us, "Terrain loaded");
                self.stats.fetched += 1;
                self.insert_terrain(backend, &site, level, mesh, AssetOrigin::Fetched);
            }
            (AssetKey::Terrain { site, level }, outcome) => {
                match outcome {
                    Err(e) => warn!(path = %result.path, "Terrain load failed, using procedural: {e}"),
                    Ok(_) => warn!(path = %result.path, "Terrain mesh empty, using procedural"),
                }
                self.insert_procedural(backend, &site, level);
            }
            (AssetKey::Texture(url), Ok(Payload::Texture(texture))) => {
                let handle = backend.upload_texture(&texture);
                self.textures.insert(url, TextureEntry::Resident(handle));
            }
            (AssetKey::Texture(url), outcome) => {
                if let Err(e) = outcome {
                    warn!(%url, "Texture load failed: {e}");
                }
                self.stats.failed_textures += 1;
                self.textures.insert(url, TextureEntry::Failed);
            }
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Release every resident resource and forget pending requests.
    pub fn clear(&mut self, backend: &mut dyn RenderBackend) {
        for (_, asset) in self.terrain.drain() {
            backend.release_geometry(asset.geometry);
            self.stats.evictions += 1;
        }
        for (_, entry) in self.textures.drain() {
            if let TextureEntry::Resident(handle) = entry {
                backend.release_texture(handle);
                self.stats.evictions += 1;
            }
        }
        self.pending.clear();
        info!("Asset cache cleared");
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, key: &AssetKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            terrain_entries: self.terrain.len(),
            texture_entries: self.textures.len(),
            pending: self.pending.len(),
            ..self.stats
        }
    }
}
