//! Camera controllers (orbit for the globe, free-fly for terrain) and the
//! single-slot camera animator.

pub mod animator;
pub mod free_fly;
pub mod orbit;

pub use animator::{
    Animation, AnimationOutcome, AnimationState, CameraAnimator, Completion, EasingFunction,
};
pub use free_fly::{FreeFlyController, FreeFlySettings};
pub use orbit::{OrbitController, OrbitSettings};

use parksphere_input::InputState;
use parksphere_render::Camera;

/// A per-frame camera driver.
pub trait CameraController {
    /// Apply one frame of input to `camera`. Returns true if the camera moved.
    fn update(&mut self, dt_s: f32, input: &InputState, camera: &mut Camera) -> bool;

    /// Stop responding to input. Further updates are no-ops.
    fn dispose(&mut self);
}
