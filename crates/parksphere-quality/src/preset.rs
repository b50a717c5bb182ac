//! Named quality presets and the render-quality projection.

use parksphere_render::{AntialiasMode, RenderQuality, TextureTier};
use serde::Serialize;

/// Lowest render scale an emergency reduction may reach.
pub const MIN_RENDER_SCALE: f32 = 0.25;

/// Bundle of renderer knobs applied together.
///
/// Numeric knobs interpolate during a transition; boolean knobs switch when
/// the transition starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityPreset {
    pub name: String,
    /// Fraction of the surface resolution rendered.
    pub render_scale: f32,
    pub shadow_map_size: u32,
    /// 0 = no antialiasing, 1 = FXAA, 2+ = MSAA sample count.
    pub msaa_samples: u32,
    pub ssao_samples: u32,
    pub bloom_strength: f32,
    /// Finer LOD levels allowed above the coarsest (0..=3).
    pub max_lod: u8,
    pub particle_budget: u32,
    pub shadows: bool,
    pub ssao: bool,
    pub bloom: bool,
    pub reflections: bool,
}

fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn lerp_u32(a: u32, b: u32, t: f32) -> u32 {
    lerp_f32(a as f32, b as f32, t).round().max(0.0) as u32
}

impl QualityPreset {
    /// Numeric knobs interpolated by `t`; name and booleans from `target`.
    pub fn lerp(&self, target: &QualityPreset, t: f32) -> QualityPreset {
        let t = t.clamp(0.0, 1.0);
        QualityPreset {
            name: target.name.clone(),
            render_scale: lerp_f32(self.render_scale, target.render_scale, t),
            shadow_map_size: lerp_u32(self.shadow_map_size, target.shadow_map_size, t),
            msaa_samples: lerp_u32(self.msaa_samples, target.msaa_samples, t),
            ssao_samples: lerp_u32(self.ssao_samples, target.ssao_samples, t),
            bloom_strength: lerp_f32(self.bloom_strength, target.bloom_strength, t),
            max_lod: lerp_u32(u32::from(self.max_lod), u32::from(target.max_lod), t) as u8,
            particle_budget: lerp_u32(self.particle_budget, target.particle_budget, t),
            shadows: target.shadows,
            ssao: target.ssao,
            bloom: target.bloom,
            reflections: target.reflections,
        }
    }

    /// Emergency cut below the lowest preset. `None` when nothing is left to cut.
    pub fn reduced(&self) -> Option<QualityPreset> {
        let next = QualityPreset {
            render_scale: (self.render_scale * 0.75).max(MIN_RENDER_SCALE),
            particle_budget: self.particle_budget / 2,
            max_lod: self.max_lod.saturating_sub(1),
            ..self.clone()
        };
        (next != *self).then_some(next)
    }

    /// Finest LOD level this preset permits (0 finest, 3 coarsest).
    pub fn finest_lod_level(&self) -> u8 {
        3u8.saturating_sub(self.max_lod.min(3))
    }

    /// The simplified settings pushed to the backend.
    pub fn render_quality(&self) -> RenderQuality {
        let antialias = match self.msaa_samples {
            0 => AntialiasMode::None,
            1 => AntialiasMode::Fxaa,
            n => AntialiasMode::Msaa(n.min(16) as u8),
        };
        let texture_tier = match self.max_lod {
            0 | 1 => TextureTier::Low,
            2 => TextureTier::Medium,
            _ => TextureTier::High,
        };
        RenderQuality {
            render_scale: self.render_scale,
            shadows: self.shadows,
            shadow_map_size: self.shadow_map_size,
            antialias,
            texture_tier,
            bloom: self.bloom,
            bloom_strength: if self.bloom { self.bloom_strength } else { 0.0 },
            ssao: self.ssao,
            reflections: self.reflections,
        }
    }
}

/// The five presets, lowest first. Index `i` matches device tier index `i`.
pub fn standard_presets() -> Vec<QualityPreset> {
    let preset = |name: &str,
                  render_scale,
                  shadow_map_size,
                  msaa_samples,
                  ssao_samples,
                  bloom_strength,
                  max_lod,
                  particle_budget,
                  [shadows, ssao, bloom, reflections]: [bool; 4]| QualityPreset {
        name: name.to_string(),
        render_scale,
        shadow_map_size,
        msaa_samples,
        ssao_samples,
        bloom_strength,
        max_lod,
        particle_budget,
        shadows,
        ssao,
        bloom,
        reflections,
    };
    vec![
        preset("mobile", 0.6, 512, 0, 0, 0.0, 1, 500, [false, false, false, false]),
        preset("low", 0.75, 1024, 1, 0, 0.0, 1, 1000, [false, false, false, false]),
        preset("medium", 1.0, 2048, 2, 8, 0.3, 2, 2500, [true, false, true, false]),
        preset("high", 1.0, 2048, 4, 16, 0.5, 3, 5000, [true, true, true, false]),
        preset("ultra", 1.0, 4096, 8, 32, 0.7, 3, 10000, [true, true, true, true]),
    ]
}

/// Index of the preset called `name` (case-insensitive).
pub fn preset_index(presets: &[QualityPreset], name: &str) -> Option<usize> {
    presets
        .iter()
        .position(|p| p.name.eq_ignore_ascii_case(name.trim()))
}
