//! Frame pacing for the host loop.
//!
//! Each tick yields the elapsed frame time in milliseconds, clamped so a
//! stall (debugger, suspended laptop) cannot hand the engine a giant step.

use std::time::Instant;

use tracing::warn;

/// Longest frame the engine is ever told about: 250 ms, i.e. 4 FPS.
pub const MAX_FRAME_MS: f32 = 250.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pacing {
    /// Measure real elapsed time between ticks.
    Realtime,
    /// Report the same step every tick.
    Fixed(f32),
}

#[derive(Debug)]
pub struct FrameClock {
    pacing: Pacing,
    previous: Instant,
    elapsed_ms: f64,
    frame_count: u64,
}

impl FrameClock {
    pub fn new(pacing: Pacing) -> Self {
        Self {
            pacing,
            previous: Instant::now(),
            elapsed_ms: 0.0,
            frame_count: 0,
        }
    }

    pub fn realtime() -> Self {
        Self::new(Pacing::Realtime)
    }

    /// Fixed step matching `target_fps`. Non-positive rates fall back to 60.
    pub fn fixed_rate(target_fps: f32) -> Self {
        let fps = if target_fps.is_finite() && target_fps > 0.0 {
            target_fps
        } else {
            60.0
        };
        Self::new(Pacing::Fixed(1000.0 / fps))
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    /// Advance one frame and return its duration in milliseconds.
    pub fn tick(&mut self) -> f32 {
        let raw = match self.pacing {
            Pacing::Fixed(step) => step,
            Pacing::Realtime => {
                let now = Instant::now();
                let ms = now.duration_since(self.previous).as_secs_f32() * 1000.0;
                self.previous = now;
                ms
            }
        };
        let dt = clamp_frame_ms(raw);
        self.elapsed_ms += f64::from(dt);
        self.frame_count += 1;
        dt
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Sum of every clamped step handed out so far.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }
}

/// Clamp a raw frame time into `0..=MAX_FRAME_MS`. Non-finite input is zero.
pub fn clamp_frame_ms(raw: f32) -> f32 {
    if !raw.is_finite() || raw <= 0.0 {
        return 0.0;
    }
    if raw > MAX_FRAME_MS {
        warn!(
            "Frame time {:.1}ms exceeds maximum, clamping to {:.1}ms",
            raw, MAX_FRAME_MS
        );
        return MAX_FRAME_MS;
    }
    raw
}
