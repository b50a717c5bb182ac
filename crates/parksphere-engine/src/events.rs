//! Typed engine events with synchronous subscribers.
//!
//! Handlers are stored in a hash map, so the order in which they run for
//! one event is unspecified.

use parksphere_render::CameraPose;
use rustc_hash::FxHashMap;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    Hover,
    CameraChange,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A site marker was clicked.
    Click { site_id: String },
    /// The hovered marker changed; `None` when the pointer left all markers.
    Hover { site_id: Option<String> },
    /// The camera moved this frame.
    CameraChange { pose: CameraPose },
}

impl EngineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            EngineEvent::Click { .. } => EventKind::Click,
            EngineEvent::Hover { .. } => EventKind::Hover,
            EngineEvent::CameraChange { .. } => EventKind::CameraChange,
        }
    }
}

pub type EventHandler = Box<dyn FnMut(&EngineEvent)>;

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    kind: EventKind,
    handler: EventHandler,
}

#[derive(Default)]
pub struct EventBus {
    subscriptions: FxHashMap<SubscriptionId, Subscription>,
    next_id: u64,
    emitted: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.len())
            .field("emitted", &self.emitted)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, kind: EventKind, handler: EventHandler) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscriptions.insert(id, Subscription { kind, handler });
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    /// Run every handler subscribed to the event's kind. Returns how many ran.
    pub fn emit(&mut self, event: &EngineEvent) -> usize {
        let kind = event.kind();
        let mut delivered = 0;
        for sub in self.subscriptions.values_mut().filter(|s| s.kind == kind) {
            (sub.handler)(event);
            delivered += 1;
        }
        self.emitted += 1;
        trace!(?kind, delivered, "Event emitted");
        delivered
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.subscriptions.values().filter(|s| s.kind == kind).count()
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder() -> (Rc<RefCell<Vec<EngineEvent>>>, EventHandler) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        (log, Box::new(move |e: &EngineEvent| sink.borrow_mut().push(e.clone())))
    }

    #[test]
    fn test_handlers_receive_only_their_kind() {
        let mut bus = EventBus::new();
        let (clicks, handler) = recorder();
        bus.on(EventKind::Click, handler);

        bus.emit(&EngineEvent::Hover { site_id: None });
        assert!(clicks.borrow().is_empty());

        let click = EngineEvent::Click { site_id: "12".into() };
        assert_eq!(bus.emit(&click), 1);
        assert_eq!(clicks.borrow().as_slice(), &[click]);
    }

    #[test]
    fn test_every_subscriber_runs() {
        let mut bus = EventBus::new();
        let (a, ha) = recorder();
        let (b, hb) = recorder();
        bus.on(EventKind::Hover, ha);
        bus.on(EventKind::Hover, hb);
        assert_eq!(bus.emit(&EngineEvent::Hover { site_id: Some("1".into()) }), 2);
        assert_eq!(a.borrow().len(), 1);
        assert_eq!(b.borrow().len(), 1);
    }

    #[test]
    fn test_off_unsubscribes() {
        let mut bus = EventBus::new();
        let (log, handler) = recorder();
        let id = bus.on(EventKind::CameraChange, handler);
        assert!(bus.off(id));
        assert!(!bus.off(id));
        bus.emit(&EngineEvent::CameraChange { pose: CameraPose::default() });
        assert!(log.borrow().is_empty());
        assert_eq!(bus.handler_count(EventKind::CameraChange), 0);
    }
}
