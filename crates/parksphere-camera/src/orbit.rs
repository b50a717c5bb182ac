//! Orbit controller for the globe view.
//!
//! Spherical coordinates (radius, azimuth, polar) about a fixed target.
//! Drag and zoom input become angular and log-radius deltas that decay by
//! a per-frame damping factor and snap to zero below an epsilon, so the
//! camera settles instead of drifting.

use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};
use parksphere_input::InputState;
use parksphere_render::Camera;

use crate::CameraController;

/// Deltas smaller than this are zeroed.
const SETTLE_EPSILON: f32 = 1e-5;

#[derive(Debug, Clone, PartialEq)]
pub struct OrbitSettings {
    /// Radians of rotation per viewport-height of drag, divided by 2π.
    pub rotate_speed: f32,
    /// Radius factor per wheel notch (< 1 zooms in on positive notches).
    pub zoom_speed: f32,
    /// Fraction of each delta removed per frame, in (0, 1).
    pub damping: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Polar angle limits from +Y, keeping the camera off the poles.
    pub min_polar: f32,
    pub max_polar: f32,
    pub auto_rotate: bool,
    /// Radians per second of idle drift.
    pub auto_rotate_speed: f32,
    /// Idle time before auto-rotate starts.
    pub idle_grace_ms: f32,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            rotate_speed: 0.5,
            zoom_speed: 0.95,
            damping: 0.1,
            min_distance: 1.5,
            max_distance: 10.0,
            min_polar: 0.1,
            max_polar: PI - 0.1,
            auto_rotate: true,
            auto_rotate_speed: 0.1,
            idle_grace_ms: 3000.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrbitController {
    settings: OrbitSettings,
    target: Vec3,
    radius: f32,
    azimuth: f32,
    polar: f32,
    delta_azimuth: f32,
    delta_polar: f32,
    delta_log_radius: f32,
    viewport: Vec2,
    idle_ms: f32,
    /// Engine-controlled gate; auto-rotate also needs the idle grace.
    auto_rotate_allowed: bool,
    disposed: bool,
}

impl OrbitController {
    /// Adopt the camera's current position around its target.
    pub fn from_camera(camera: &Camera, settings: OrbitSettings) -> Self {
        let offset = camera.position - camera.target;
        let radius = offset.length().max(f32::EPSILON);
        let polar = (offset.y / radius).clamp(-1.0, 1.0).acos();
        let azimuth = offset.x.atan2(offset.z);
        let mut controller = Self {
            target: camera.target,
            radius,
            azimuth,
            polar,
            delta_azimuth: 0.0,
            delta_polar: 0.0,
            delta_log_radius: 0.0,
            viewport: Vec2::new(1280.0, 720.0),
            idle_ms: 0.0,
            auto_rotate_allowed: true,
            disposed: false,
            settings,
        };
        controller.clamp();
        controller
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        if width > 0.0 && height > 0.0 {
            self.viewport = Vec2::new(width, height);
        }
    }

    pub fn set_auto_rotate_allowed(&mut self, allowed: bool) {
        self.auto_rotate_allowed = allowed;
    }

    /// Whether idle drift applies this frame.
    pub fn is_auto_rotating(&self) -> bool {
        self.settings.auto_rotate
            && self.auto_rotate_allowed
            && self.idle_ms >= self.settings.idle_grace_ms
    }

    /// True once every delta has decayed to exactly zero.
    pub fn is_settled(&self) -> bool {
        self.delta_azimuth == 0.0 && self.delta_polar == 0.0 && self.delta_log_radius == 0.0
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }

    pub fn polar(&self) -> f32 {
        self.polar
    }

    pub fn deltas(&self) -> (f32, f32, f32) {
        (self.delta_azimuth, self.delta_polar, self.delta_log_radius)
    }

    pub fn settings(&self) -> &OrbitSettings {
        &self.settings
    }

    /// Camera position for the current spherical coordinates.
    pub fn position(&self) -> Vec3 {
        let sin_polar = self.polar.sin();
        self.target
            + self.radius
                * Vec3::new(
                    sin_polar * self.azimuth.sin(),
                    self.polar.cos(),
                    sin_polar * self.azimuth.cos(),
                )
    }

    fn take_input(&mut self, input: &InputState) {
        let drag = input.pointer.drag_delta();
        if drag != Vec2::ZERO {
            let per_pixel = TAU * self.settings.rotate_speed / self.viewport.y;
            self.delta_azimuth -= drag.x * per_pixel;
            self.delta_polar -= drag.y * per_pixel;
        }
        let wheel = input.pointer.wheel();
        if wheel != 0.0 {
            self.delta_log_radius += wheel * self.settings.zoom_speed.ln();
        }
        let pinch = input.pointer.pinch();
        if pinch > 0.0 && (pinch - 1.0).abs() > f32::EPSILON {
            self.delta_log_radius -= pinch.ln();
        }
    }

    fn clamp(&mut self) {
        self.polar = self
            .polar
            .clamp(self.settings.min_polar, self.settings.max_polar);
        self.radius = self
            .radius
            .clamp(self.settings.min_distance, self.settings.max_distance);
        self.azimuth = self.azimuth.rem_euclid(TAU);
    }

    fn decay(&mut self) {
        let keep = 1.0 - self.settings.damping.clamp(f32::EPSILON, 1.0);
        for delta in [
            &mut self.delta_azimuth,
            &mut self.delta_polar,
            &mut self.delta_log_radius,
        ] {
            *delta *= keep;
            if delta.abs() < SETTLE_EPSILON {
                *delta = 0.0;
            }
        }
    }
}

impl CameraController for OrbitController {
    fn update(&mut self, dt_s: f32, input: &InputState, camera: &mut Camera) -> bool {
        if self.disposed {
            return false;
        }
        if input.had_interaction() {
            self.idle_ms = 0.0;
        } else {
            self.idle_ms += dt_s.max(0.0) * 1000.0;
        }
        self.take_input(input);

        let before = (self.azimuth, self.polar, self.radius);
        self.azimuth += self.delta_azimuth;
        self.polar += self.delta_polar;
        self.radius *= self.delta_log_radius.exp();
        if self.is_auto_rotating() {
            self.azimuth += self.settings.auto_rotate_speed * dt_s.max(0.0);
        }
        self.clamp();
        self.decay();

        let moved = before != (self.azimuth, self.polar, self.radius);
        camera.position = self.position();
        camera.target = self.target;
        moved
    }

    fn dispose(&mut self) {
        self.delta_azimuth = 0.0;
        self.delta_polar = 0.0;
        self.delta_log_radius = 0.0;
        self.disposed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parksphere_input::{ElementState, MouseButton, MouseScrollDelta};

    fn controller() -> (OrbitController, Camera) {
        let camera = Camera::default();
        let settings = OrbitSettings {
            auto_rotate: false,
            ..OrbitSettings::default()
        };
        (OrbitController::from_camera(&camera, settings), camera)
    }

    fn drag(dx: f32, dy: f32) -> InputState {
        let mut input = InputState::new();
        input.pointer.on_moved(100.0, 100.0);
        input.pointer.on_button(MouseButton::Left, ElementState::Pressed);
        input.pointer.on_moved(100.0 + dx, 100.0 + dy);
        input
    }

    #[test]
    fn test_adopts_default_pose() {
        let (orbit, _) = controller();
        assert!((orbit.radius() - 3.0).abs() < 1e-5);
        assert!((orbit.polar() - PI / 2.0).abs() < 1e-5);
        assert!(orbit.azimuth().abs() < 1e-5);
        assert!((orbit.position() - Vec3::new(0.0, 0.0, 3.0)).length() < 1e-5);
    }

    #[test]
    fn test_drag_rotates() {
        let (mut orbit, mut camera) = controller();
        assert!(orbit.update(0.016, &drag(50.0, 0.0), &mut camera));
        assert!(camera.position.x < 0.0, "dragging right swings the camera left");
        assert!((camera.position.length() - 3.0).abs() < 1e-4);
        assert_eq!(camera.target, Vec3::ZERO);
    }

    /// With no input the deltas reach exactly zero in bounded frames.
    #[test]
    fn test_converges_to_rest() {
        let (mut orbit, mut camera) = controller();
        let mut input = drag(200.0, 80.0);
        input.pointer.on_wheel(MouseScrollDelta::LineDelta(0.0, 3.0));
        orbit.update(0.016, &input, &mut camera);
        assert!(!orbit.is_settled());

        let idle = InputState::new();
        let mut frames = 0;
        while !orbit.is_settled() {
            orbit.update(0.016, &idle, &mut camera);
            frames += 1;
            assert!(frames <= 200, "still moving: {:?}", orbit.deltas());
        }
        assert_eq!(orbit.deltas(), (0.0, 0.0, 0.0));
        assert!(!orbit.update(0.016, &idle, &mut camera));
    }

    #[test]
    fn test_polar_clamped_off_poles() {
        let (mut orbit, mut camera) = controller();
        for _ in 0..50 {
            orbit.update(0.016, &drag(0.0, 500.0), &mut camera);
        }
        assert!(orbit.polar() >= orbit.settings().min_polar - 1e-6);
        assert!(camera.position.y < 3.0);
        for _ in 0..100 {
            orbit.update(0.016, &drag(0.0, -500.0), &mut camera);
        }
        assert!(orbit.polar() <= orbit.settings().max_polar + 1e-6);
    }

    #[test]
    fn test_zoom_clamped() {
        let (mut orbit, mut camera) = controller();
        for _ in 0..200 {
            let mut input = InputState::new();
            input.pointer.on_wheel(MouseScrollDelta::LineDelta(0.0, 10.0));
            orbit.update(0.016, &input, &mut camera);
        }
        assert_eq!(orbit.radius(), 1.5);
        for _ in 0..200 {
            let mut input = InputState::new();
            input.pointer.on_pinch(0.5);
            orbit.update(0.016, &input, &mut camera);
        }
        assert_eq!(orbit.radius(), 10.0);
    }

    #[test]
    fn test_auto_rotate_after_idle_grace() {
        let camera = Camera::default();
        let mut camera_mut = camera.clone();
        let mut orbit = OrbitController::from_camera(&camera, OrbitSettings::default());
        let idle = InputState::new();
        // 2.9 s idle: no drift yet.
        for _ in 0..29 {
            assert!(!orbit.update(0.1, &idle, &mut camera_mut));
        }
        assert!(orbit.update(0.1, &idle, &mut camera_mut));
        assert!(orbit.is_auto_rotating());

        // Any interaction cancels it immediately.
        let mut touch = InputState::new();
        touch.pointer.on_button(MouseButton::Left, ElementState::Pressed);
        orbit.update(0.1, &touch, &mut camera_mut);
        assert!(!orbit.is_auto_rotating());
    }

    #[test]
    fn test_auto_rotate_gate() {
        let camera = Camera::default();
        let mut camera_mut = camera.clone();
        let mut orbit = OrbitController::from_camera(&camera, OrbitSettings::default());
        orbit.set_auto_rotate_allowed(false);
        let idle = InputState::new();
        for _ in 0..100 {
            assert!(!orbit.update(0.1, &idle, &mut camera_mut));
        }
    }

    #[test]
    fn test_disposed_ignores_input() {
        let (mut orbit, mut camera) = controller();
        orbit.dispose();
        assert!(!orbit.update(0.016, &drag(100.0, 0.0), &mut camera));
    }
}
