//! One-shot device classification.
//!
//! The profile is computed once at startup and never changes for the
//! session; its tier is the hard ceiling for the quality controller.

use std::time::Instant;

use glam::Vec3;
use parksphere_render::{
    BackendCapabilities, BoundingSphere, Camera, MeshData, NodeDesc, NodeLayer, RenderBackend,
};
use serde::Serialize;
use tracing::info;

/// Capability bucket; the index doubles as the highest reachable preset index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceTier {
    Mobile,
    Low,
    Medium,
    High,
    Ultra,
}

impl DeviceTier {
    pub const ALL: [DeviceTier; 5] = [
        DeviceTier::Mobile,
        DeviceTier::Low,
        DeviceTier::Medium,
        DeviceTier::High,
        DeviceTier::Ultra,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            DeviceTier::Mobile => "mobile",
            DeviceTier::Low => "low",
            DeviceTier::Medium => "medium",
            DeviceTier::High => "high",
            DeviceTier::Ultra => "ultra",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Bucket a 0–100 benchmark score (never returns `Mobile`).
    pub fn from_score(score: f32) -> Self {
        if score >= 80.0 {
            DeviceTier::Ultra
        } else if score >= 60.0 {
            DeviceTier::High
        } else if score >= 35.0 {
            DeviceTier::Medium
        } else {
            DeviceTier::Low
        }
    }
}

impl std::fmt::Display for DeviceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

const MOBILE_MARKERS: [&str; 9] = [
    "android",
    "iphone",
    "ipad",
    "ipod",
    "mobile",
    "blackberry",
    "iemobile",
    "opera mini",
    "webos",
];

/// What the host knows about the runtime environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnvironmentInfo {
    pub user_agent: String,
    pub touch_points: u32,
    pub hardware_concurrency: usize,
}

impl EnvironmentInfo {
    /// Description of the native process.
    pub fn native() -> Self {
        Self {
            user_agent: format!("parksphere/{} ({})", env!("CARGO_PKG_VERSION"), std::env::consts::OS),
            touch_points: 0,
            hardware_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }

    pub fn with_user_agent(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            ..Self::default()
        }
    }

    /// User-agent heuristic for phones and tablets.
    pub fn is_mobile(&self) -> bool {
        let ua = self.user_agent.to_ascii_lowercase();
        MOBILE_MARKERS.iter().any(|m| ua.contains(m))
    }
}

/// Immutable result of profiling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceProfile {
    pub tier: DeviceTier,
    /// 0–100 benchmark score.
    pub score: f32,
    pub benchmark_frame_ms: f32,
    pub forced_mobile: bool,
    pub capabilities: BackendCapabilities,
}

impl DeviceProfile {
    /// A profile with a fixed tier, skipping the benchmark.
    pub fn fixed(tier: DeviceTier, capabilities: BackendCapabilities) -> Self {
        Self {
            tier,
            score: match tier {
                DeviceTier::Mobile | DeviceTier::Low => 20.0,
                DeviceTier::Medium => 50.0,
                DeviceTier::High => 70.0,
                DeviceTier::Ultra => 90.0,
            },
            benchmark_frame_ms: 0.0,
            forced_mobile: tier == DeviceTier::Mobile,
            capabilities,
        }
    }
}

/// Average frame time at or below this scores 100.
pub const BEST_FRAME_MS: f32 = 4.0;
/// Average frame time at or above this scores 0.
pub const WORST_FRAME_MS: f32 = 50.0;

/// Linear 0–100 score from an average benchmark frame time.
pub fn score_from_frame_ms(frame_ms: f32) -> f32 {
    if !frame_ms.is_finite() {
        return 0.0;
    }
    let t = (frame_ms - BEST_FRAME_MS) / (WORST_FRAME_MS - BEST_FRAME_MS);
    (100.0 * (1.0 - t)).clamp(0.0, 100.0)
}

/// Renders a fixed scene for a few frames and classifies the device.
#[derive(Debug, Clone)]
pub struct DeviceProfiler {
    pub frames: u32,
    pub sphere_segments: u32,
    pub sphere_rings: u32,
}

impl Default for DeviceProfiler {
    fn default() -> Self {
        // 128 x 80 x 2 = 20480 triangles.
        Self {
            frames: 10,
            sphere_segments: 128,
            sphere_rings: 80,
        }
    }
}

impl DeviceProfiler {
    /// Profile the device. The benchmark scene is removed and its geometry
    /// released before returning.
    pub fn profile(&self, backend: &mut dyn RenderBackend, env: &EnvironmentInfo) -> DeviceProfile {
        let capabilities = backend.capabilities();
        let frame_ms = self.benchmark(backend);
        let score = score_from_frame_ms(frame_ms);
        let forced_mobile = env.is_mobile();
        let tier = if forced_mobile {
            DeviceTier::Mobile
        } else {
            DeviceTier::from_score(score)
        };
        info!(
            %tier,
            score = format_args!("{score:.1}"),
            frame_ms = format_args!("{frame_ms:.2}"),
            forced_mobile,
            renderer = %capabilities.renderer,
            "Device profiled"
        );
        DeviceProfile {
            tier,
            score,
            benchmark_frame_ms: frame_ms,
            forced_mobile,
            capabilities,
        }
    }

    /// Average frame time of the benchmark scene in milliseconds.
    fn benchmark(&self, backend: &mut dyn RenderBackend) -> f32 {
        let mesh = MeshData::uv_sphere(1.0, self.sphere_segments, self.sphere_rings);
        let geometry = backend.upload_geometry(&mesh);
        let node = backend.add_node(
            NodeDesc::new(
                "benchmark",
                NodeLayer::Background,
                BoundingSphere::new(Vec3::ZERO, 1.0),
            )
            .with_geometry(geometry),
        );
        backend.set_camera(&Camera::default());

        let frames = self.frames.max(1);
        let mut total_ms = 0.0;
        for _ in 0..frames {
            let start = Instant::now();
            let info = backend.render();
            let wall_ms = start.elapsed().as_secs_f32() * 1000.0;
            total_ms += info.gpu_time_ms.unwrap_or(wall_ms);
        }

        backend.remove_node(node);
        backend.release_geometry(geometry);
        total_ms / frames as f32
    }
}
