//! Globe and terrain viewer engine.
//!
//! [`Engine`] owns the render backend, asset cache, quality and visibility
//! controllers and the camera, and runs them once per [`Engine::frame`].
//! The host feeds input through [`Engine::input_mut`] and listens for
//! clicks, hovers and camera moves on the event bus.

pub mod engine;
pub mod error;
pub mod events;
pub mod globe;
pub mod markers;
pub mod options;

pub use engine::{Engine, EngineSnapshot, QualitySnapshot, ViewMode, terrain_view_pose};
pub use error::EngineError;
pub use events::{EngineEvent, EventBus, EventHandler, EventKind, SubscriptionId};
pub use globe::GlobeScene;
pub use markers::{GLOBE_RADIUS, Marker, MarkerSet, lat_lon_to_position};
pub use options::{EngineOptions, asset_cache_from_config};
