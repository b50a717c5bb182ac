//! Distance-based LOD selection with a global bias.

/// Lowest LOD bias (finer detail persists longer).
pub const MIN_LOD_BIAS: f32 = 0.5;
/// Highest LOD bias (coarser detail sooner).
pub const MAX_LOD_BIAS: f32 = 2.0;

/// Switch distances between LOD levels.
///
/// `thresholds[i]` is the maximum distance for level `i`; the last level
/// extends to infinity.
#[derive(Clone, Debug, PartialEq)]
pub struct LodThresholds {
    thresholds: Vec<f32>,
}

impl LodThresholds {
    /// Switch distances for a terrain tile: 15, 30, 60 world units.
    pub fn default_terrain() -> Self {
        Self {
            thresholds: vec![15.0, 30.0, 60.0],
        }
    }

    /// Custom switch distances. `None` unless non-empty, positive and
    /// strictly increasing.
    pub fn custom(thresholds: Vec<f32>) -> Option<Self> {
        let valid = !thresholds.is_empty()
            && thresholds.iter().all(|t| t.is_finite() && *t > 0.0)
            && thresholds.windows(2).all(|w| w[1] > w[0]);
        valid.then_some(Self { thresholds })
    }

    /// The coarsest level.
    pub fn max_level(&self) -> u8 {
        self.thresholds.len() as u8
    }

    pub fn thresholds(&self) -> &[f32] {
        &self.thresholds
    }

    /// Level for `distance` scaled by `bias`, never finer than `finest`.
    ///
    /// Level 0 is full detail.
    pub fn select(&self, distance: f32, bias: f32, finest: u8) -> u8 {
        let scaled = distance.max(0.0) * bias.clamp(MIN_LOD_BIAS, MAX_LOD_BIAS);
        let level = self
            .thresholds
            .iter()
            .position(|&t| scaled < t)
            .map_or(self.max_level(), |i| i as u8);
        level.max(finest.min(self.max_level()))
    }
}

impl Default for LodThresholds {
    fn default() -> Self {
        Self::default_terrain()
    }
}
