//! Frame-coherent keyboard state.
//!
//! Physical key codes are used so WASD walkthrough movement works the same
//! on every keyboard layout. Keys that are not plain codes (unidentified
//! scancodes) are ignored.

use std::collections::HashSet;

use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Platform-independent key event, also used by tests and non-winit hosts.
#[derive(Debug, Clone, Copy)]
pub struct RawKeyEvent {
    pub key: KeyCode,
    pub state: ElementState,
    pub repeat: bool,
}

/// Held / just-pressed / just-released key sets for the current frame.
#[derive(Debug, Clone, Default)]
pub struct KeyboardState {
    pressed: HashSet<KeyCode>,
    just_pressed: HashSet<KeyCode>,
    just_released: HashSet<KeyCode>,
}

impl KeyboardState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward a winit key event.
    pub fn process_event(&mut self, event: &KeyEvent) {
        if let PhysicalKey::Code(key) = event.physical_key {
            self.process_raw(RawKeyEvent {
                key,
                state: event.state,
                repeat: event.repeat,
            });
        }
    }

    /// Apply a key transition. Auto-repeat events are ignored.
    pub fn process_raw(&mut self, event: RawKeyEvent) {
        if event.repeat {
            return;
        }
        match event.state {
            ElementState::Pressed => {
                if self.pressed.insert(event.key) {
                    self.just_pressed.insert(event.key);
                }
            }
            ElementState::Released => {
                if self.pressed.remove(&event.key) {
                    self.just_released.insert(event.key);
                }
            }
        }
    }

    /// Convenience for `process_raw` with a non-repeat press.
    pub fn press(&mut self, key: KeyCode) {
        self.process_raw(RawKeyEvent {
            key,
            state: ElementState::Pressed,
            repeat: false,
        });
    }

    /// Convenience for `process_raw` with a release.
    pub fn release(&mut self, key: KeyCode) {
        self.process_raw(RawKeyEvent {
            key,
            state: ElementState::Released,
            repeat: false,
        });
    }

    #[must_use]
    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.pressed.contains(&key)
    }

    #[must_use]
    pub fn just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed.contains(&key)
    }

    #[must_use]
    pub fn just_released(&self, key: KeyCode) -> bool {
        self.just_released.contains(&key)
    }

    /// True if any of `keys` is held.
    #[must_use]
    pub fn any_pressed(&self, keys: &[KeyCode]) -> bool {
        keys.iter().any(|k| self.pressed.contains(k))
    }

    /// -1, 0 or +1 from a pair of opposing key groups.
    #[must_use]
    pub fn axis(&self, negative: &[KeyCode], positive: &[KeyCode]) -> f32 {
        let mut value = 0.0;
        if self.any_pressed(negative) {
            value -= 1.0;
        }
        if self.any_pressed(positive) {
            value += 1.0;
        }
        value
    }

    /// Whether any key is held.
    #[must_use]
    pub fn has_activity(&self) -> bool {
        !self.pressed.is_empty() || !self.just_released.is_empty()
    }

    /// Clears the edge sets. Call at end of frame.
    pub fn clear_transients(&mut self) {
        self.just_pressed.clear();
        self.just_released.clear();
    }
}
