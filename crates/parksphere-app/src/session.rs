//! Scripted viewing session: globe, one site's terrain, then back.

use parksphere_engine::{Engine, EngineSnapshot};
use parksphere_render::RenderBackend;
use serde::Serialize;
use tracing::{info, warn};

use crate::frame_clock::FrameClock;

/// Safety valve for view changes that never finish.
const MAX_SETTLE_FRAMES: u32 = 10_000;

#[derive(Debug, Clone, Default)]
pub struct SessionPlan {
    /// Frames to hold each view once the camera has settled.
    pub frames_per_view: u32,
    /// Site to visit; the first catalog entry when `None`.
    pub site: Option<String>,
    /// Log a metrics snapshot every N frames (0 = never).
    pub stats_interval: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub sites: usize,
    pub visited: Option<String>,
    pub frames: u64,
    pub simulated_ms: f64,
    pub snapshot: EngineSnapshot,
}

/// Drive `engine` through the plan. The engine must already be initialized
/// with its static data loaded.
pub fn run_session<B: RenderBackend>(
    engine: &mut Engine<B>,
    clock: &mut FrameClock,
    plan: &SessionPlan,
) -> SessionReport {
    hold(engine, clock, plan, plan.frames_per_view);

    let target = plan
        .site
        .clone()
        .or_else(|| engine.catalog().sites().first().map(|s| s.id.clone()));
    let mut visited = None;
    match target {
        Some(site) if engine.enter_site(&site) => {
            settle(engine, clock, plan);
            hold(engine, clock, plan, plan.frames_per_view);
            engine.back();
            settle(engine, clock, plan);
            hold(engine, clock, plan, plan.frames_per_view);
            visited = Some(site);
        }
        Some(site) => warn!(site = %site, "Site not in catalog; staying on the globe"),
        None => info!("Catalog is empty; globe only"),
    }

    SessionReport {
        sites: engine.catalog().len(),
        visited,
        frames: clock.frame_count(),
        simulated_ms: clock.elapsed_ms(),
        snapshot: engine.metrics(),
    }
}

fn step<B: RenderBackend>(engine: &mut Engine<B>, clock: &mut FrameClock, plan: &SessionPlan) {
    engine.frame(clock.tick());
    let frame = clock.frame_count();
    if plan.stats_interval > 0
        && frame % u64::from(plan.stats_interval) == 0
        && let Ok(json) = serde_json::to_string(&engine.metrics())
    {
        info!(frame, "{json}");
    }
}

fn hold<B: RenderBackend>(
    engine: &mut Engine<B>,
    clock: &mut FrameClock,
    plan: &SessionPlan,
    frames: u32,
) {
    for _ in 0..frames {
        step(engine, clock, plan);
    }
}

fn settle<B: RenderBackend>(engine: &mut Engine<B>, clock: &mut FrameClock, plan: &SessionPlan) {
    let mut frames = 0;
    while engine.is_transitioning() && frames < MAX_SETTLE_FRAMES {
        step(engine, clock, plan);
        frames += 1;
    }
    if engine.is_transitioning() {
        warn!(frames, "View change still running; moving on");
    }
}
