//! Single-slot camera animation.
//!
//! The animator is either idle or running exactly one animation. Starting a
//! new one replaces the old completely: the start pose is resampled from the
//! live camera, and the replaced animation's completion reports
//! [`AnimationOutcome::Superseded`].

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use parksphere_render::{Camera, CameraPose};
use tracing::trace;

/// Easing curves for camera animations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EasingFunction {
    /// Constant speed, no acceleration.
    Linear,
    /// Slow start, fast end.
    EaseIn,
    /// Fast start, slow end.
    EaseOut,
    /// Cubic: slow start, fast middle, slow end.
    #[default]
    EaseInOutCubic,
}

impl EasingFunction {
    /// Map linear progress (0.0..=1.0) to eased progress.
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            EasingFunction::Linear => t,
            EasingFunction::EaseIn => t * t,
            EasingFunction::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            EasingFunction::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

/// How an animation ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnimationOutcome {
    /// Reached its end pose.
    Completed,
    /// Replaced by a newer animation before finishing.
    Superseded,
    /// Dropped without finishing (animator cancelled or disposed).
    Cancelled,
}

/// Receiving end of an animation's completion.
#[derive(Debug)]
pub struct Completion {
    receiver: Receiver<AnimationOutcome>,
}

impl Completion {
    fn pair() -> (Sender<AnimationOutcome>, Self) {
        let (tx, rx) = bounded(1);
        (tx, Self { receiver: rx })
    }

    /// A completion that already reports `Cancelled`, for requests that
    /// never start an animation.
    pub fn cancelled() -> Self {
        let (tx, completion) = Self::pair();
        let _ = tx.send(AnimationOutcome::Cancelled);
        completion
    }

    /// Non-blocking check. `None` while the animation is still running.
    pub fn poll(&self) -> Option<AnimationOutcome> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(AnimationOutcome::Cancelled),
        }
    }

    /// Block up to `timeout`. Only useful when another thread drives frames.
    pub fn wait(&self, timeout: Duration) -> Option<AnimationOutcome> {
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(AnimationOutcome::Cancelled),
        }
    }
}

/// An animation in flight. `T` is what the owner wants back on completion.
#[derive(Debug)]
pub struct Animation<T> {
    pub start: CameraPose,
    pub end: CameraPose,
    pub start_ms: f64,
    pub duration_ms: f64,
    pub easing: EasingFunction,
    on_complete: T,
    notify: Sender<AnimationOutcome>,
}

impl<T> Animation<T> {
    /// Linear progress at `now_ms`, 0..=1.
    pub fn progress(&self, now_ms: f64) -> f32 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        ((now_ms - self.start_ms) / self.duration_ms).clamp(0.0, 1.0) as f32
    }

    pub fn pose_at(&self, now_ms: f64) -> CameraPose {
        let t = self.easing.apply(self.progress(now_ms));
        self.start.lerp(&self.end, t)
    }

    pub fn on_complete(&self) -> &T {
        &self.on_complete
    }
}

#[derive(Debug)]
pub enum AnimationState<T> {
    Idle,
    Animating(Animation<T>),
}

impl<T> Default for AnimationState<T> {
    fn default() -> Self {
        AnimationState::Idle
    }
}

/// Owns the one camera animation allowed at a time.
#[derive(Debug)]
pub struct CameraAnimator<T> {
    state: AnimationState<T>,
    clock_ms: f64,
}

impl<T> Default for CameraAnimator<T> {
    fn default() -> Self {
        Self {
            state: AnimationState::Idle,
            clock_ms: 0.0,
        }
    }
}

impl<T> CameraAnimator<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.state, AnimationState::Animating(_))
    }

    pub fn state(&self) -> &AnimationState<T> {
        &self.state
    }

    /// Start animating from the camera's live pose to `end`. Any running
    /// animation is superseded and its payload dropped.
    pub fn start(
        &mut self,
        camera: &Camera,
        end: CameraPose,
        duration_ms: f64,
        easing: EasingFunction,
        on_complete: T,
    ) -> Completion {
        let (notify, completion) = Completion::pair();
        let next = Animation {
            start: camera.pose(),
            end,
            start_ms: self.clock_ms,
            duration_ms: duration_ms.max(0.0),
            easing,
            on_complete,
            notify,
        };
        if let AnimationState::Animating(old) =
            std::mem::replace(&mut self.state, AnimationState::Animating(next))
        {
            trace!("Camera animation superseded");
            let _ = old.notify.send(AnimationOutcome::Superseded);
        }
        completion
    }

    /// Advance by `dt_ms` and write the pose into `camera`. Returns the
    /// payload when the animation finishes this frame.
    pub fn update(&mut self, dt_ms: f64, camera: &mut Camera) -> Option<T> {
        if dt_ms.is_finite() && dt_ms > 0.0 {
            self.clock_ms += dt_ms;
        }
        let AnimationState::Animating(animation) = &self.state else {
            return None;
        };
        if animation.progress(self.clock_ms) < 1.0 {
            camera.set_pose(animation.pose_at(self.clock_ms));
            return None;
        }

        let AnimationState::Animating(done) = std::mem::take(&mut self.state) else {
            return None;
        };
        camera.set_pose(done.end);
        let _ = done.notify.send(AnimationOutcome::Completed);
        Some(done.on_complete)
    }

    /// Stop without completing. The completion reports `Cancelled`.
    pub fn cancel(&mut self) {
        if let AnimationState::Animating(old) = std::mem::take(&mut self.state) {
            let _ = old.notify.send(AnimationOutcome::Cancelled);
        }
    }
}
