//! Renderer counter aggregation, scoring and advice.
//!
//! The collector only observes. It never changes quality or visibility
//! itself; its suggestions are for people and diagnostic overlays.

use std::fmt;

use parksphere_render::{FrameHistory, RenderInfo};
use serde::Serialize;
use tracing::debug;

/// A metric's "good" and "bad" values. Scores map linearly between them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Band {
    pub good: f32,
    pub bad: f32,
}

impl Band {
    pub const fn new(good: f32, bad: f32) -> Self {
        Self { good, bad }
    }

    /// 100 at or beyond `good`, 0 at or beyond `bad`. Works in either
    /// direction (`good` may be larger than `bad`).
    pub fn score(&self, value: f32) -> f32 {
        if self.good == self.bad || !value.is_finite() {
            return if value.is_finite() && value == self.good { 100.0 } else { 0.0 };
        }
        let t = ((value - self.good) / (self.bad - self.good)).clamp(0.0, 1.0);
        100.0 * (1.0 - t)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsThresholds {
    pub target_fps: f32,
    pub fps: Band,
    pub draw_calls: Band,
    pub triangles: Band,
    pub memory_mb: Band,
}

impl Default for MetricsThresholds {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            fps: Band::new(60.0, 20.0),
            draw_calls: Band::new(100.0, 1000.0),
            triangles: Band::new(500_000.0, 5_000_000.0),
            memory_mb: Band::new(256.0, 1024.0),
        }
    }
}

impl MetricsThresholds {
    pub fn with_target_fps(target_fps: f32) -> Self {
        Self {
            target_fps,
            fps: Band::new(target_fps, target_fps / 3.0),
            ..Self::default()
        }
    }
}

/// Score weights: FPS, draw calls, triangles, memory.
const WEIGHTS: [f32; 4] = [0.4, 0.3, 0.2, 0.1];

/// Advice emitted when a metric leaves its good range.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Suggestion {
    LowFps { fps: f32, target: f32 },
    HighDrawCalls { draw_calls: u32 },
    HighTriangles { triangles: u64 },
    HighMemory { megabytes: f32 },
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suggestion::LowFps { fps, target } => write!(
                f,
                "FPS below target ({fps:.1} < {target:.0}); lower the quality preset or render scale"
            ),
            Suggestion::HighDrawCalls { draw_calls } => write!(
                f,
                "Draw calls high ({draw_calls}); merge geometry or instance repeated objects"
            ),
            Suggestion::HighTriangles { triangles } => write!(
                f,
                "Triangle count high ({triangles}); use coarser LOD levels at distance"
            ),
            Suggestion::HighMemory { megabytes } => write!(
                f,
                "GPU memory high ({megabytes:.0} MB); evict unused assets or lower texture tier"
            ),
        }
    }
}

/// Min/max/sum of frame times over the whole session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FrameTimeSummary {
    pub count: u64,
    pub sum_ms: f64,
    pub min_ms: f32,
    pub max_ms: f32,
}

impl FrameTimeSummary {
    pub fn record(&mut self, frame_ms: f32) {
        if self.count == 0 {
            self.min_ms = frame_ms;
            self.max_ms = frame_ms;
        } else {
            self.min_ms = self.min_ms.min(frame_ms);
            self.max_ms = self.max_ms.max(frame_ms);
        }
        self.count += 1;
        self.sum_ms += f64::from(frame_ms);
    }

    pub fn mean_ms(&self) -> Option<f32> {
        (self.count > 0).then(|| (self.sum_ms / self.count as f64) as f32)
    }
}

/// Serializable view of the collector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub frames: u64,
    pub fps: f32,
    pub average_frame_ms: f32,
    pub session: FrameTimeSummary,
    pub draw_calls: u32,
    pub triangles: u64,
    pub points: u64,
    pub lines: u64,
    pub geometries: u32,
    pub textures: u32,
    pub memory_bytes: u64,
    pub gpu_time_ms: Option<f32>,
    pub score: f32,
    pub suggestions: Vec<String>,
}

/// Samples renderer counters each frame.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    thresholds: MetricsThresholds,
    history: FrameHistory,
    session: FrameTimeSummary,
    last: RenderInfo,
    frames: u64,
}

impl MetricsCollector {
    pub fn new(thresholds: MetricsThresholds, history_len: usize) -> Self {
        Self {
            thresholds,
            history: FrameHistory::new(history_len),
            session: FrameTimeSummary::default(),
            last: RenderInfo::default(),
            frames: 0,
        }
    }

    /// Record one rendered frame.
    pub fn record(&mut self, frame_ms: f32, info: &RenderInfo) {
        if frame_ms.is_finite() && frame_ms >= 0.0 {
            self.history.push(frame_ms);
            self.session.record(frame_ms);
        }
        self.last = *info;
        self.frames += 1;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_info(&self) -> &RenderInfo {
        &self.last
    }

    pub fn average_fps(&self) -> f32 {
        self.history.average_fps().unwrap_or(0.0)
    }

    fn memory_mb(&self) -> f32 {
        self.last.memory_bytes() as f32 / (1024.0 * 1024.0)
    }

    /// Weighted 0–100 score. Zero before the first frame.
    pub fn score(&self) -> f32 {
        if self.history.is_empty() {
            return 0.0;
        }
        let t = &self.thresholds;
        let parts = [
            t.fps.score(self.average_fps()),
            t.draw_calls.score(self.last.draw_calls as f32),
            t.triangles.score(self.last.triangles as f32),
            t.memory_mb.score(self.memory_mb()),
        ];
        parts.iter().zip(WEIGHTS).map(|(s, w)| s * w).sum::<f32>().clamp(0.0, 100.0)
    }

    /// Advice for every metric outside its good range.
    pub fn suggestions(&self) -> Vec<Suggestion> {
        let mut out = Vec::new();
        if self.history.is_empty() {
            return out;
        }
        let t = &self.thresholds;
        let fps = self.average_fps();
        if fps < t.target_fps * 0.9 {
            out.push(Suggestion::LowFps {
                fps,
                target: t.target_fps,
            });
        }
        if self.last.draw_calls as f32 > t.draw_calls.good {
            out.push(Suggestion::HighDrawCalls {
                draw_calls: self.last.draw_calls,
            });
        }
        if self.last.triangles as f32 > t.triangles.good {
            out.push(Suggestion::HighTriangles {
                triangles: self.last.triangles,
            });
        }
        let megabytes = self.memory_mb();
        if megabytes > t.memory_mb.good {
            out.push(Suggestion::HighMemory { megabytes });
        }
        out
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let snapshot = MetricsSnapshot {
            frames: self.frames,
            fps: self.average_fps(),
            average_frame_ms: self.history.average_ms().unwrap_or(0.0),
            session: self.session,
            draw_calls: self.last.draw_calls,
            triangles: self.last.triangles,
            points: self.last.points,
            lines: self.last.lines,
            geometries: self.last.geometries,
            textures: self.last.textures,
            memory_bytes: self.last.memory_bytes(),
            gpu_time_ms: self.last.gpu_time_ms,
            score: self.score(),
            suggestions: self.suggestions().iter().map(ToString::to_string).collect(),
        };
        debug!(score = snapshot.score, fps = snapshot.fps, "Metrics snapshot");
        snapshot
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.session = FrameTimeSummary::default();
        self.last = RenderInfo::default();
        self.frames = 0;
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(MetricsThresholds::default(), 60)
    }
}
