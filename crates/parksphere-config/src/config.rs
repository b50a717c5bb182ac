//! Configuration structs with engine defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.ron";

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Drawing surface settings.
    pub surface: SurfaceConfig,
    /// Culling and frame-budget settings.
    pub render: RenderConfig,
    /// Adaptive quality controller settings.
    pub quality: QualityConfig,
    /// Asset acquisition settings.
    pub assets: AssetConfig,
    /// Camera controller and transition settings.
    pub camera: CameraConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Drawing surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Surface width in physical pixels.
    pub width: u32,
    /// Surface height in physical pixels.
    pub height: u32,
    /// Device pixel ratio reported by the host.
    pub pixel_ratio: f32,
}

/// Culling and frame-budget configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Frame rate the quality controller and LOD bias aim for.
    pub target_fps: f32,
    /// Objects further than this from the camera are never drawn.
    pub max_draw_distance: f32,
    /// Use GPU occlusion queries when the backend supports them.
    pub occlusion_culling: bool,
    /// Occlusion query results older than this are treated as "visible".
    pub occlusion_query_timeout_ms: u64,
    /// Fraction of cached occlusion results dropped each frame.
    pub occlusion_invalidation_ratio: f32,
}

/// Adaptive quality configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QualityConfig {
    /// Let the controller move between presets based on measured frame time.
    pub adaptive: bool,
    /// Minimum time between two preset changes.
    pub cooldown_ms: u64,
    /// Number of frame-time samples in the rolling window.
    pub history_len: usize,
    /// Duration of the numeric interpolation between presets.
    pub transition_ms: u64,
    /// Start on this preset instead of the device tier's preset.
    pub preset: Option<String>,
}

/// Asset acquisition configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssetConfig {
    /// Root of the static asset tree: a directory path or an `http(s)://` URL.
    pub base_url: String,
    /// Site catalog path relative to `base_url`.
    pub manifest_path: String,
    /// Globe surface texture path relative to `base_url`.
    pub globe_texture: String,
    /// Per-request fetch timeout; slower loads fall back to procedural terrain.
    pub fetch_timeout_ms: u64,
    /// Background fetch/decode worker threads (0 = derive from CPU count).
    pub fetch_workers: usize,
}

/// Camera configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    /// Duration of the globe to terrain fly-in.
    pub enter_transition_ms: u64,
    /// Duration of the terrain to globe fly-out.
    pub return_transition_ms: u64,
    /// Globe orbit controller tuning.
    pub orbit: OrbitConfig,
    /// Terrain walkthrough controller tuning.
    pub free_fly: FreeFlyConfig,
}

/// Orbit controller tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrbitConfig {
    /// Drag sensitivity multiplier.
    pub rotate_speed: f32,
    /// Wheel zoom base (radius scale per wheel notch).
    pub zoom_speed: f32,
    /// Fraction of the pending motion applied each frame (0..1).
    pub damping: f32,
    /// Closest allowed orbit radius.
    pub min_distance: f32,
    /// Furthest allowed orbit radius.
    pub max_distance: f32,
    /// Drift around the globe after the idle grace period.
    pub auto_rotate: bool,
    /// Auto-rotate speed in radians per second.
    pub auto_rotate_speed: f32,
    /// Time without interaction before auto-rotate starts.
    pub idle_grace_ms: u64,
}

/// Free-fly controller tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FreeFlyConfig {
    /// Acceleration in world units per second squared.
    pub acceleration: f32,
    /// Velocity retained per 1/60 s (0..1).
    pub damping: f32,
    /// Pointer look sensitivity in radians per pixel.
    pub look_sensitivity: f32,
    /// Height kept above the terrain floor.
    pub min_height: f32,
    /// Height allowed above the terrain ceiling.
    pub max_height: f32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log filter (e.g. "debug", "info,parksphere_assets=trace").
    pub log_level: String,
    /// Print the metrics snapshot every N frames (0 = never).
    pub stats_interval_frames: u32,
}

// --- Default implementations ---

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            pixel_ratio: 1.0,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            max_draw_distance: 100.0,
            occlusion_culling: true,
            occlusion_query_timeout_ms: 100,
            occlusion_invalidation_ratio: 0.1,
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            adaptive: true,
            cooldown_ms: 3000,
            history_len: 60,
            transition_ms: 500,
            preset: None,
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            base_url: "public/z/assets".to_string(),
            manifest_path: "parks.json".to_string(),
            globe_texture: "earth/earth_day_4k.jpg".to_string(),
            fetch_timeout_ms: 5000,
            fetch_workers: 0,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            enter_transition_ms: 2000,
            return_transition_ms: 1500,
            orbit: OrbitConfig::default(),
            free_fly: FreeFlyConfig::default(),
        }
    }
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            rotate_speed: 0.5,
            zoom_speed: 0.95,
            damping: 0.1,
            min_distance: 1.5,
            max_distance: 10.0,
            auto_rotate: true,
            auto_rotate_speed: 0.1,
            idle_grace_ms: 3000,
        }
    }
}

impl Default for FreeFlyConfig {
    fn default() -> Self {
        Self {
            acceleration: 40.0,
            damping: 0.9,
            look_sensitivity: 0.003,
            min_height: 0.5,
            max_height: 40.0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            stats_interval_frames: 0,
        }
    }
}

// --- Validation ---

impl Config {
    /// Reject values that would make a controller undefined (empty windows,
    /// inverted ranges, non-positive targets).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render.target_fps <= 0.0 {
            return Err(invalid("render.target_fps", "must be positive"));
        }
        if self.quality.history_len == 0 {
            return Err(invalid("quality.history_len", "must hold at least one sample"));
        }
        if !(0.0..=1.0).contains(&self.render.occlusion_invalidation_ratio) {
            return Err(invalid(
                "render.occlusion_invalidation_ratio",
                "must be within 0..=1",
            ));
        }
        let orbit = &self.camera.orbit;
        if orbit.min_distance <= 0.0 || orbit.min_distance > orbit.max_distance {
            return Err(invalid(
                "camera.orbit.min_distance",
                format!(
                    "must be positive and <= max_distance ({})",
                    orbit.max_distance
                ),
            ));
        }
        if !(0.0..1.0).contains(&orbit.damping) || orbit.damping == 0.0 {
            return Err(invalid("camera.orbit.damping", "must be within (0, 1)"));
        }
        if !(0.0..1.0).contains(&self.camera.free_fly.damping) {
            return Err(invalid("camera.free_fly.damping", "must be within [0, 1)"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            config.validate()?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);
        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(config_dir.join(CONFIG_FILE), serialized).map_err(ConfigError::WriteError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("cooldown_ms: 3000"));
        assert!(ron_str.contains("history_len: 60"));
    }

    #[test]
    fn test_missing_section_uses_default() {
        let config: Config = ron::from_str("(surface: (width: 800))").unwrap();
        assert_eq!(config.surface.width, 800);
        assert_eq!(config.surface.height, 720);
        assert_eq!(config.quality, QualityConfig::default());
    }

    #[test]
    fn test_unknown_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(chat_widget: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_preset_override_parses() {
        let config: Config = ron::from_str(r#"(quality: (preset: Some("low")))"#).unwrap();
        assert_eq!(config.quality.preset.as_deref(), Some("low"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.surface.width = 1920;
        config.assets.base_url = "https://cdn.example.org/assets".to_string();

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn test_inverted_orbit_range_rejected() {
        let mut config = Config::default();
        config.camera.orbit.min_distance = 20.0;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "camera.orbit.min_distance",
                ..
            }
        ));
    }

    #[test]
    fn test_zero_history_rejected() {
        let mut config = Config::default();
        config.quality.history_len = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Config, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }
}
