//! ParkSphere host application: directory resolution, frame pacing and the
//! scripted viewing session the binary runs.

pub mod frame_clock;
pub mod platform;
pub mod session;

pub use frame_clock::{FrameClock, MAX_FRAME_MS, Pacing, clamp_frame_ms};
pub use platform::{APP_NAME, PlatformDirs, PlatformError};
pub use session::{SessionPlan, SessionReport, run_session};
