//! Closed-loop quality control driven by measured frame times.
//!
//! The controller keeps its own session clock (the sum of frame times it
//! has been fed), so its behaviour is a pure function of the input
//! sequence. Changes are rate-limited by a cooldown that starts at
//! construction; the device tier caps how high it may climb.

use parksphere_render::{FrameHistory, RenderQuality};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::device::DeviceTier;
use crate::preset::{QualityPreset, preset_index, standard_presets};

/// Tuning knobs for [`QualityController`].
#[derive(Debug, Clone, PartialEq)]
pub struct QualitySettings {
    pub target_fps: f32,
    pub cooldown_ms: f64,
    pub history_len: usize,
    pub transition_ms: f64,
    /// When false the preset only changes through [`QualityController::set_preset`].
    pub adaptive: bool,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            cooldown_ms: 3000.0,
            history_len: 60,
            transition_ms: 500.0,
            adaptive: true,
        }
    }
}

/// A preset change decided by [`QualityController::update`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityChange {
    StepDown { from: String, to: String },
    StepUp { from: String, to: String },
    /// Cut below the lowest named preset.
    Emergency { level: u32, render_scale: f32 },
    /// Emergency cuts undone; back on the lowest named preset.
    Recovered { preset: String },
}

#[derive(Debug, Clone)]
struct Transition {
    from: QualityPreset,
    to: QualityPreset,
    start_ms: f64,
    duration_ms: f64,
}

impl Transition {
    fn sample(&self, now_ms: f64) -> (QualityPreset, bool) {
        if self.duration_ms <= 0.0 {
            return (self.to.clone(), true);
        }
        let t = ((now_ms - self.start_ms) / self.duration_ms).clamp(0.0, 1.0);
        if t >= 1.0 {
            (self.to.clone(), true)
        } else {
            (self.from.lerp(&self.to, t as f32), false)
        }
    }
}

/// Selects and interpolates quality presets from rolling frame-time history.
#[derive(Debug)]
pub struct QualityController {
    presets: Vec<QualityPreset>,
    index: usize,
    ceiling: usize,
    settings: QualitySettings,
    history: FrameHistory,
    clock_ms: f64,
    last_change_ms: f64,
    /// Settings being moved toward (a named preset or an emergency cut).
    target: QualityPreset,
    /// Interpolated settings in effect this frame.
    effective: QualityPreset,
    transition: Option<Transition>,
    emergency_level: u32,
}

impl QualityController {
    /// Start at the tier's own preset, or at `preset_override` if it names a
    /// preset; either way never above the tier ceiling.
    pub fn new(tier: DeviceTier, settings: QualitySettings, preset_override: Option<&str>) -> Self {
        Self::with_presets(standard_presets(), tier, settings, preset_override)
    }

    pub fn with_presets(
        presets: Vec<QualityPreset>,
        tier: DeviceTier,
        settings: QualitySettings,
        preset_override: Option<&str>,
    ) -> Self {
        let presets = if presets.is_empty() {
            standard_presets()
        } else {
            presets
        };
        let ceiling = tier.index().min(presets.len() - 1);
        let requested = preset_override.and_then(|name| {
            let found = preset_index(&presets, name);
            if found.is_none() {
                warn!(preset = name, "Unknown quality preset, using device tier");
            }
            found
        });
        let index = requested.unwrap_or(ceiling).min(ceiling);
        let current = presets[index].clone();
        info!(preset = %current.name, %tier, "Quality controller ready");

        Self {
            history: FrameHistory::new(settings.history_len),
            presets,
            index,
            ceiling,
            settings,
            clock_ms: 0.0,
            last_change_ms: 0.0,
            target: current.clone(),
            effective: current,
            transition: None,
            emergency_level: 0,
        }
    }

    /// Feed one frame time. Returns the change decided this frame, if any.
    pub fn update(&mut self, frame_ms: f32) -> Option<QualityChange> {
        if frame_ms.is_finite() && frame_ms >= 0.0 {
            self.clock_ms += f64::from(frame_ms);
        }
        self.history.push(frame_ms);
        self.advance_transition();

        if !self.settings.adaptive {
            return None;
        }
        if self.clock_ms - self.last_change_ms < self.settings.cooldown_ms {
            return None;
        }
        let (avg_ms, avg_fps) = (self.history.average_ms()?, self.history.average_fps()?);
        let target_fps = self.settings.target_fps.max(1.0);
        let target_ms = 1000.0 / target_fps;

        let change = if avg_fps < target_fps * 0.9 {
            self.step_down()
        } else if avg_fps > target_fps * 1.1 && avg_ms < target_ms * 0.8 {
            self.step_up()
        } else {
            None
        };
        if let Some(change) = &change {
            debug!(avg_fps, ?change, "Quality changed");
        }
        change
    }

    fn step_down(&mut self) -> Option<QualityChange> {
        if self.index > 0 {
            let from = self.presets[self.index].name.clone();
            self.index -= 1;
            self.emergency_level = 0;
            let to = self.presets[self.index].clone();
            let name = to.name.clone();
            self.begin_transition(to);
            return Some(QualityChange::StepDown { from, to: name });
        }
        let reduced = self.target.reduced()?;
        self.emergency_level += 1;
        let render_scale = reduced.render_scale;
        warn!(
            level = self.emergency_level,
            render_scale, "Emergency quality reduction"
        );
        self.begin_transition(reduced);
        Some(QualityChange::Emergency {
            level: self.emergency_level,
            render_scale,
        })
    }

    fn step_up(&mut self) -> Option<QualityChange> {
        if self.emergency_level > 0 {
            self.emergency_level = 0;
            let preset = self.presets[self.index].clone();
            let name = preset.name.clone();
            self.begin_transition(preset);
            return Some(QualityChange::Recovered { preset: name });
        }
        if self.index >= self.ceiling {
            return None;
        }
        let from = self.presets[self.index].name.clone();
        self.index += 1;
        let to = self.presets[self.index].clone();
        let name = to.name.clone();
        self.begin_transition(to);
        Some(QualityChange::StepUp { from, to: name })
    }

    fn begin_transition(&mut self, to: QualityPreset) {
        self.last_change_ms = self.clock_ms;
        // Booleans switch now; numeric knobs follow over the transition.
        self.transition = Some(Transition {
            from: self.effective.clone(),
            to: to.clone(),
            start_ms: self.clock_ms,
            duration_ms: self.settings.transition_ms,
        });
        self.target = to;
        self.advance_transition();
    }

    fn advance_transition(&mut self) {
        if let Some(transition) = &self.transition {
            let (preset, done) = transition.sample(self.clock_ms);
            self.effective = preset;
            if done {
                self.transition = None;
            }
        }
    }

    /// Jump to a named preset (clamped to the ceiling) and restart the cooldown.
    /// Returns false for unknown names.
    pub fn set_preset(&mut self, name: &str) -> bool {
        let Some(index) = preset_index(&self.presets, name) else {
            return false;
        };
        self.index = index.min(self.ceiling);
        self.emergency_level = 0;
        let preset = self.presets[self.index].clone();
        self.begin_transition(preset);
        true
    }

    /// Name of the selected preset.
    pub fn current_preset_name(&self) -> &str {
        &self.presets[self.index].name
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub fn emergency_level(&self) -> u32 {
        self.emergency_level
    }

    /// Settings in effect this frame, mid-transition values included.
    pub fn effective(&self) -> &QualityPreset {
        &self.effective
    }

    pub fn render_quality(&self) -> RenderQuality {
        self.effective.render_quality()
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    pub fn average_fps(&self) -> Option<f32> {
        self.history.average_fps()
    }

    pub fn clock_ms(&self) -> f64 {
        self.clock_ms
    }

    pub fn settings(&self) -> &QualitySettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(tier: DeviceTier) -> QualityController {
        QualityController::new(tier, QualitySettings::default(), None)
    }

    fn feed(c: &mut QualityController, frame_ms: f32, frames: usize) -> Vec<QualityChange> {
        (0..frames).filter_map(|_| c.update(frame_ms)).collect()
    }

    #[test]
    fn test_starts_at_tier_preset() {
        assert_eq!(controller(DeviceTier::Medium).current_preset_name(), "medium");
        assert_eq!(controller(DeviceTier::Mobile).current_preset_name(), "mobile");
    }

    #[test]
    fn test_override_clamped_to_ceiling() {
        let c = QualityController::new(DeviceTier::Low, QualitySettings::default(), Some("ultra"));
        assert_eq!(c.current_preset_name(), "low");
        let c = QualityController::new(DeviceTier::High, QualitySettings::default(), Some("Mobile"));
        assert_eq!(c.current_preset_name(), "mobile");
        let c = QualityController::new(DeviceTier::High, QualitySettings::default(), Some("bogus"));
        assert_eq!(c.current_preset_name(), "high");
    }

    #[test]
    fn test_low_tier_never_exceeds_ceiling() {
        let mut c = controller(DeviceTier::Low);
        c.set_preset("mobile");
        feed(&mut c, 2.0, 20_000);
        assert_eq!(c.current_index(), DeviceTier::Low.index());
        assert_eq!(c.current_preset_name(), "low");
    }

    #[test]
    fn test_cooldown_blocks_changes() {
        let mut c = controller(DeviceTier::High);
        let before = c.current_preset_name().to_string();
        // 2900 ms of terrible frames, still inside the initial cooldown.
        assert!(feed(&mut c, 100.0, 29).is_empty());
        assert_eq!(c.current_preset_name(), before);
        assert!(c.update(100.0).is_some());
        // A second change within the next cooldown is impossible.
        assert!(feed(&mut c, 100.0, 29).is_empty());
    }

    #[test]
    fn test_sustained_fast_frames_on_medium() {
        let mut c = controller(DeviceTier::Medium);
        c.set_preset("low");
        let changes = feed(&mut c, 10.0, 120);
        // 1200 ms is inside the cooldown started by set_preset.
        assert!(changes.len() <= 1);
        assert!(c.current_index() <= DeviceTier::Medium.index());

        let changes = feed(&mut c, 10.0, 1200);
        assert_eq!(
            changes,
            vec![QualityChange::StepUp {
                from: "low".into(),
                to: "medium".into()
            }]
        );
        assert_eq!(c.current_preset_name(), "medium");
    }

    #[test]
    fn test_at_most_one_change_per_cooldown() {
        let mut c = controller(DeviceTier::Ultra);
        c.set_preset("mobile");
        let mut last_change = None;
        for frame in 0..3000u32 {
            if c.update(10.0).is_some() {
                if let Some(prev) = last_change {
                    assert!((frame - prev) as f64 * 10.0 >= 3000.0);
                }
                last_change = Some(frame);
            }
        }
        assert_eq!(c.current_preset_name(), "ultra");
    }

    #[test]
    fn test_step_down_when_slow() {
        let mut c = controller(DeviceTier::High);
        let changes = feed(&mut c, 25.0, 130);
        assert_eq!(
            changes[0],
            QualityChange::StepDown {
                from: "high".into(),
                to: "medium".into()
            }
        );
    }

    #[test]
    fn test_dead_band_holds_preset() {
        let mut c = controller(DeviceTier::Ultra);
        c.set_preset("medium");
        // 60 fps exactly sits between both thresholds.
        assert!(feed(&mut c, 1000.0 / 60.0, 1000).is_empty());
        assert_eq!(c.current_preset_name(), "medium");
    }

    #[test]
    fn test_emergency_reduction_at_bottom() {
        let mut c = controller(DeviceTier::Mobile);
        let changes = feed(&mut c, 50.0, 61);
        assert!(matches!(changes[0], QualityChange::Emergency { level: 1, .. }));
        assert_eq!(c.current_preset_name(), "mobile");
        assert_eq!(c.emergency_level(), 1);

        // Let the transition finish, then check the cut settings.
        feed(&mut c, 50.0, 10);
        let effective = c.effective();
        assert!((effective.render_scale - 0.45).abs() < 1e-5);
        assert_eq!(effective.particle_budget, 250);
        assert_eq!(effective.max_lod, 0);
    }

    #[test]
    fn test_recovery_after_emergency() {
        let mut c = controller(DeviceTier::Low);
        c.set_preset("mobile");
        feed(&mut c, 50.0, 61);
        assert_eq!(c.emergency_level(), 1);
        let changes = feed(&mut c, 5.0, 700);
        assert_eq!(
            changes[0],
            QualityChange::Recovered {
                preset: "mobile".into()
            }
        );
        assert_eq!(c.emergency_level(), 0);
    }

    #[test]
    fn test_numeric_knobs_interpolate_booleans_snap() {
        let mut c = controller(DeviceTier::High);
        c.set_preset("low");
        feed(&mut c, 10.0, 300);
        // Step low -> medium just happened at 3000 ms.
        assert_eq!(c.current_preset_name(), "medium");
        assert!(c.is_transitioning());
        assert!(c.effective().shadows, "booleans switch at the start");
        assert_eq!(c.effective().render_scale, 0.75);

        feed(&mut c, 10.0, 25);
        assert!((c.effective().render_scale - 0.875).abs() < 1e-5);

        feed(&mut c, 10.0, 25);
        assert!(!c.is_transitioning());
        assert_eq!(c.effective().render_scale, 1.0);
    }

    #[test]
    fn test_non_adaptive_never_changes() {
        let settings = QualitySettings {
            adaptive: false,
            ..QualitySettings::default()
        };
        let mut c = QualityController::new(DeviceTier::Ultra, settings, Some("low"));
        assert!(feed(&mut c, 200.0, 500).is_empty());
        assert!(feed(&mut c, 1.0, 5000).is_empty());
        assert_eq!(c.current_preset_name(), "low");
    }

    #[test]
    fn test_render_quality_follows_effective() {
        let c = controller(DeviceTier::Ultra);
        let q = c.render_quality();
        assert!(q.reflections);
        assert_eq!(q.shadow_map_size, 4096);
    }
}
