//! Device profiling and adaptive quality control.
//!
//! [`DeviceProfiler`] classifies the device once at startup. The resulting
//! tier caps the [`QualityController`], which then walks the named presets
//! up and down from measured frame times.

mod controller;
mod device;
mod preset;

pub use controller::{QualityChange, QualityController, QualitySettings};
pub use device::{
    BEST_FRAME_MS, DeviceProfile, DeviceProfiler, DeviceTier, EnvironmentInfo, WORST_FRAME_MS,
    score_from_frame_ms,
};
pub use preset::{MIN_RENDER_SCALE, QualityPreset, preset_index, standard_presets};
