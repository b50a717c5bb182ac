//! Frame-coherent pointer state.
//!
//! [`PointerState`] accumulates host pointer events (mouse or touch) during a
//! frame and exposes position, drag delta, button state, wheel and pinch
//! zoom. The camera controllers read it once per frame; the engine clears the
//! transients after rendering.

use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta};

/// Pixels of pointer travel after which a press is a drag, not a click.
const CLICK_SLOP_PX: f32 = 4.0;

/// Pixels per wheel "line" when the host reports pixel deltas.
const PIXELS_PER_LINE: f64 = 40.0;

#[derive(Debug, Clone, Copy, Default)]
struct ButtonFrame {
    pressed: bool,
    just_pressed: bool,
    just_released: bool,
}

fn button_index(button: MouseButton) -> usize {
    match button {
        MouseButton::Left => 0,
        MouseButton::Right => 1,
        MouseButton::Middle => 2,
        _ => 3,
    }
}

/// Pointer state for one frame.
#[derive(Debug, Clone)]
pub struct PointerState {
    position: Vec2,
    delta: Vec2,
    buttons: [ButtonFrame; 4],
    wheel: f32,
    pinch: f32,
    press_origin: Option<Vec2>,
    dragged: bool,
    inside: bool,
}

impl Default for PointerState {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            position: Vec2::ZERO,
            delta: Vec2::ZERO,
            buttons: [ButtonFrame::default(); 4],
            wheel: 0.0,
            pinch: 1.0,
            press_origin: None,
            dragged: false,
            inside: false,
        }
    }

    // ── Event handlers ──────────────────────────────────────────────

    /// Pointer moved to `(x, y)` in surface pixels.
    pub fn on_moved(&mut self, x: f32, y: f32) {
        let new_pos = Vec2::new(x, y);
        if self.inside {
            self.delta += new_pos - self.position;
        }
        self.position = new_pos;
        self.inside = true;
        if let Some(origin) = self.press_origin
            && origin.distance(new_pos) > CLICK_SLOP_PX
        {
            self.dragged = true;
        }
    }

    /// Button pressed or released.
    pub fn on_button(&mut self, button: MouseButton, state: ElementState) {
        let frame = &mut self.buttons[button_index(button)];
        match state {
            ElementState::Pressed => {
                frame.pressed = true;
                frame.just_pressed = true;
                if button == MouseButton::Left {
                    self.press_origin = Some(self.position);
                    self.dragged = false;
                }
            }
            ElementState::Released => {
                frame.pressed = false;
                frame.just_released = true;
                if button == MouseButton::Left {
                    self.press_origin = None;
                }
            }
        }
    }

    /// Wheel notches; positive scrolls "up" (zoom in).
    pub fn on_wheel(&mut self, delta: MouseScrollDelta) {
        match delta {
            MouseScrollDelta::LineDelta(_x, y) => self.wheel += y,
            MouseScrollDelta::PixelDelta(pos) => self.wheel += (pos.y / PIXELS_PER_LINE) as f32,
        }
    }

    /// Two-finger pinch; `scale` > 1 spreads the fingers (zoom in).
    pub fn on_pinch(&mut self, scale: f32) {
        if scale.is_finite() && scale > 0.0 {
            self.pinch *= scale;
        }
    }

    /// Pointer left the surface; the next move starts a fresh delta.
    pub fn on_left(&mut self) {
        self.inside = false;
        self.press_origin = None;
    }

    /// Clears per-frame transients: delta, wheel, pinch, edge flags.
    pub fn clear_transients(&mut self) {
        self.delta = Vec2::ZERO;
        self.wheel = 0.0;
        self.pinch = 1.0;
        for b in &mut self.buttons {
            b.just_pressed = false;
            b.just_released = false;
        }
        if self.press_origin.is_none() {
            self.dragged = false;
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Movement since the last clear.
    #[must_use]
    pub fn delta(&self) -> Vec2 {
        self.delta
    }

    #[must_use]
    pub fn is_pressed(&self, button: MouseButton) -> bool {
        self.buttons[button_index(button)].pressed
    }

    #[must_use]
    pub fn just_pressed(&self, button: MouseButton) -> bool {
        self.buttons[button_index(button)].just_pressed
    }

    #[must_use]
    pub fn just_released(&self, button: MouseButton) -> bool {
        self.buttons[button_index(button)].just_released
    }

    /// Wheel notches accumulated this frame.
    #[must_use]
    pub fn wheel(&self) -> f32 {
        self.wheel
    }

    /// Pinch scale accumulated this frame (1.0 = none).
    #[must_use]
    pub fn pinch(&self) -> f32 {
        self.pinch
    }

    /// Drag delta while the primary button is held, zero otherwise.
    #[must_use]
    pub fn drag_delta(&self) -> Vec2 {
        if self.is_pressed(MouseButton::Left) || self.just_released(MouseButton::Left) {
            self.delta
        } else {
            Vec2::ZERO
        }
    }

    /// A primary-button release this frame that did not travel past the click slop.
    #[must_use]
    pub fn clicked(&self) -> bool {
        self.just_released(MouseButton::Left) && !self.dragged
    }

    #[must_use]
    pub fn is_inside(&self) -> bool {
        self.inside
    }

    /// Any zoom or drag activity this frame.
    #[must_use]
    pub fn has_activity(&self) -> bool {
        self.drag_delta() != Vec2::ZERO
            || self.wheel != 0.0
            || (self.pinch - 1.0).abs() > f32::EPSILON
            || self.buttons.iter().any(|b| b.just_pressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_move_has_no_delta() {
        let mut ps = PointerState::new();
        ps.on_moved(100.0, 200.0);
        assert_eq!(ps.position(), Vec2::new(100.0, 200.0));
        assert_eq!(ps.delta(), Vec2::ZERO);
    }

    #[test]
    fn test_delta_accumulates_within_frame() {
        let mut ps = PointerState::new();
        ps.on_moved(100.0, 200.0);
        ps.clear_transients();
        ps.on_moved(110.0, 195.0);
        ps.on_moved(115.0, 190.0);
        assert_eq!(ps.delta(), Vec2::new(15.0, -10.0));
    }

    #[test]
    fn test_drag_delta_requires_primary_button() {
        let mut ps = PointerState::new();
        ps.on_moved(0.0, 0.0);
        ps.on_moved(10.0, 0.0);
        assert_eq!(ps.drag_delta(), Vec2::ZERO);

        ps.on_button(MouseButton::Left, ElementState::Pressed);
        ps.on_moved(20.0, 0.0);
        assert_eq!(ps.drag_delta(), Vec2::new(20.0, 0.0));
    }

    #[test]
    fn test_click_without_travel() {
        let mut ps = PointerState::new();
        ps.on_moved(50.0, 50.0);
        ps.on_button(MouseButton::Left, ElementState::Pressed);
        ps.on_moved(51.0, 50.0);
        ps.on_button(MouseButton::Left, ElementState::Released);
        assert!(ps.clicked());
    }

    #[test]
    fn test_drag_is_not_a_click() {
        let mut ps = PointerState::new();
        ps.on_moved(50.0, 50.0);
        ps.on_button(MouseButton::Left, ElementState::Pressed);
        ps.on_moved(90.0, 50.0);
        ps.on_button(MouseButton::Left, ElementState::Released);
        assert!(!ps.clicked());
    }

    #[test]
    fn test_wheel_and_pinch_reset_after_clear() {
        let mut ps = PointerState::new();
        ps.on_wheel(MouseScrollDelta::LineDelta(0.0, 1.0));
        ps.on_wheel(MouseScrollDelta::LineDelta(0.0, 0.5));
        ps.on_pinch(1.2);
        assert!((ps.wheel() - 1.5).abs() < f32::EPSILON);
        assert!((ps.pinch() - 1.2).abs() < 1e-6);
        assert!(ps.has_activity());

        ps.clear_transients();
        assert_eq!(ps.wheel(), 0.0);
        assert_eq!(ps.pinch(), 1.0);
        assert!(!ps.has_activity());
    }

    #[test]
    fn test_invalid_pinch_ignored() {
        let mut ps = PointerState::new();
        ps.on_pinch(0.0);
        ps.on_pinch(f32::NAN);
        assert_eq!(ps.pinch(), 1.0);
    }

    #[test]
    fn test_leaving_resets_delta_origin() {
        let mut ps = PointerState::new();
        ps.on_moved(10.0, 10.0);
        ps.on_left();
        ps.on_moved(500.0, 500.0);
        assert_eq!(ps.delta(), Vec2::ZERO);
    }
}
