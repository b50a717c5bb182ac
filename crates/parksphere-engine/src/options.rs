//! Engine construction options, derived from the loaded [`Config`].

use std::time::Duration;

use parksphere_assets::{
    AssetCache, AssetLoader, CacheSettings, TerrainParams, default_worker_count, source_for,
};
use parksphere_camera::{FreeFlySettings, OrbitSettings};
use parksphere_config::{AssetConfig, Config};
use parksphere_quality::{DeviceProfiler, DeviceTier, EnvironmentInfo, QualitySettings};
use parksphere_visibility::VisibilitySettings;

/// Pending-job capacity of the background asset loader.
const LOADER_QUEUE: usize = 64;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub quality: QualitySettings,
    /// Preset to start on when `initialize` gets no override.
    pub preset: Option<String>,
    pub visibility: VisibilitySettings,
    pub orbit: OrbitSettings,
    /// Heights here are relative: `min_height` above the terrain floor and
    /// `max_height` above its highest point.
    pub free_fly: FreeFlySettings,
    pub fov_degrees: f32,
    pub enter_transition_ms: f64,
    pub return_transition_ms: f64,
    pub globe_texture: String,
    /// Skip the benchmark and use this tier.
    pub device_tier: Option<DeviceTier>,
    pub environment: EnvironmentInfo,
    pub profiler: DeviceProfiler,
    pub metrics_history: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        let render = &config.render;
        let quality = &config.quality;
        let camera = &config.camera;
        Self {
            quality: QualitySettings {
                target_fps: render.target_fps,
                cooldown_ms: quality.cooldown_ms as f64,
                history_len: quality.history_len,
                transition_ms: quality.transition_ms as f64,
                adaptive: quality.adaptive,
            },
            preset: quality.preset.clone(),
            visibility: VisibilitySettings {
                max_draw_distance: render.max_draw_distance,
                occlusion_culling: render.occlusion_culling,
                occlusion_timeout_ms: render.occlusion_query_timeout_ms as f64,
                invalidation_ratio: render.occlusion_invalidation_ratio,
                target_fps: render.target_fps,
                history_len: quality.history_len,
                ..VisibilitySettings::default()
            },
            orbit: OrbitSettings {
                rotate_speed: camera.orbit.rotate_speed,
                zoom_speed: camera.orbit.zoom_speed,
                damping: camera.orbit.damping,
                min_distance: camera.orbit.min_distance,
                max_distance: camera.orbit.max_distance,
                auto_rotate: camera.orbit.auto_rotate,
                auto_rotate_speed: camera.orbit.auto_rotate_speed,
                idle_grace_ms: camera.orbit.idle_grace_ms as f32,
                ..OrbitSettings::default()
            },
            free_fly: FreeFlySettings {
                acceleration: camera.free_fly.acceleration,
                damping: camera.free_fly.damping,
                look_sensitivity: camera.free_fly.look_sensitivity,
                min_height: camera.free_fly.min_height,
                max_height: camera.free_fly.max_height,
                ..FreeFlySettings::default()
            },
            fov_degrees: camera.fov_degrees,
            enter_transition_ms: camera.enter_transition_ms as f64,
            return_transition_ms: camera.return_transition_ms as f64,
            globe_texture: config.assets.globe_texture.clone(),
            device_tier: None,
            environment: EnvironmentInfo::native(),
            profiler: DeviceProfiler::default(),
            metrics_history: quality.history_len,
        }
    }

    pub fn with_device_tier(mut self, tier: DeviceTier) -> Self {
        self.device_tier = Some(tier);
        self
    }
}

/// Build the asset cache for `config`: source from `base_url`, background
/// workers from `fetch_workers` (0 picks a count from the CPU).
pub fn asset_cache_from_config(config: &AssetConfig) -> AssetCache {
    let timeout = Duration::from_millis(config.fetch_timeout_ms);
    let source = source_for(&config.base_url, timeout);
    let workers = match config.fetch_workers {
        0 => default_worker_count(),
        n => n,
    };
    let loader = AssetLoader::new(source.clone(), workers, LOADER_QUEUE);
    AssetCache::new(
        source,
        loader,
        CacheSettings {
            manifest_path: config.manifest_path.clone(),
            fetch_timeout: timeout,
            terrain: TerrainParams::default(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_config() {
        let options = EngineOptions::default();
        assert_eq!(options.quality.cooldown_ms, 3000.0);
        assert_eq!(options.quality.history_len, 60);
        assert_eq!(options.visibility.max_draw_distance, 100.0);
        assert_eq!(options.orbit.idle_grace_ms, 3000.0);
        assert_eq!(options.enter_transition_ms, 2000.0);
        assert_eq!(options.return_transition_ms, 1500.0);
        assert!(options.device_tier.is_none());
    }

    #[test]
    fn test_overrides_carry_through() {
        let mut config = Config::default();
        config.render.target_fps = 30.0;
        config.quality.preset = Some("low".into());
        config.camera.orbit.auto_rotate = false;
        let options = EngineOptions::from_config(&config).with_device_tier(DeviceTier::High);
        assert_eq!(options.quality.target_fps, 30.0);
        assert_eq!(options.visibility.target_fps, 30.0);
        assert_eq!(options.preset.as_deref(), Some("low"));
        assert!(!options.orbit.auto_rotate);
        assert_eq!(options.device_tier, Some(DeviceTier::High));
    }

    #[test]
    fn test_offline_cache_from_config() {
        let config = AssetConfig {
            base_url: "offline".into(),
            fetch_workers: 1,
            ..AssetConfig::default()
        };
        let cache = asset_cache_from_config(&config);
        assert!(cache.load_manifest().is_empty());
    }
}
