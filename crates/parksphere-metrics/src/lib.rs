//! Frame metrics: a weighted performance score and advisory suggestions.

mod collector;

pub use collector::{
    Band, FrameTimeSummary, MetricsCollector, MetricsSnapshot, MetricsThresholds, Suggestion,
};
