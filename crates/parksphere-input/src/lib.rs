//! Host-fed input state: pointer (mouse/touch) and keyboard, cleared per frame.

pub mod keyboard;
pub mod pointer;

pub use keyboard::{KeyboardState, RawKeyEvent};
pub use pointer::PointerState;
pub use winit::event::{ElementState, MouseButton, MouseScrollDelta};
pub use winit::keyboard::KeyCode;

/// Everything a camera controller reads in one frame.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    pub pointer: PointerState,
    pub keyboard: KeyboardState,
}

impl InputState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the user touched any control this frame. Resets idle timers.
    #[must_use]
    pub fn had_interaction(&self) -> bool {
        self.pointer.has_activity() || self.keyboard.has_activity()
    }

    /// End-of-frame reset of edge-triggered state.
    pub fn clear_transients(&mut self) {
        self.pointer.clear_transients();
        self.keyboard.clear_transients();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_input_has_no_interaction() {
        assert!(!InputState::new().had_interaction());
    }

    #[test]
    fn test_key_hold_counts_as_interaction_until_released() {
        let mut input = InputState::new();
        input.keyboard.press(KeyCode::KeyW);
        input.clear_transients();
        assert!(input.had_interaction());
        input.keyboard.release(KeyCode::KeyW);
        input.clear_transients();
        assert!(!input.had_interaction());
    }
}
