//! Free-fly controller for the terrain walkthrough.
//!
//! Pointer drag turns the view (yaw/pitch, pitch clamped). Directional keys
//! accelerate a damped velocity in camera-relative space, with an
//! independent vertical axis. The final position is clamped to an optional
//! bounding box and a height band.

use glam::{Vec2, Vec3};
use parksphere_input::{InputState, KeyCode};
use parksphere_render::{Aabb, Camera};

use crate::CameraController;

/// Velocities slower than this stop.
const REST_SPEED: f32 = 1e-4;

const FORWARD_KEYS: [KeyCode; 2] = [KeyCode::KeyW, KeyCode::ArrowUp];
const BACK_KEYS: [KeyCode; 2] = [KeyCode::KeyS, KeyCode::ArrowDown];
const LEFT_KEYS: [KeyCode; 2] = [KeyCode::KeyA, KeyCode::ArrowLeft];
const RIGHT_KEYS: [KeyCode; 2] = [KeyCode::KeyD, KeyCode::ArrowRight];
const UP_KEYS: [KeyCode; 2] = [KeyCode::Space, KeyCode::KeyE];
const DOWN_KEYS: [KeyCode; 2] = [KeyCode::ControlLeft, KeyCode::KeyQ];

#[derive(Debug, Clone, PartialEq)]
pub struct FreeFlySettings {
    /// Units per second squared while a key is held.
    pub acceleration: f32,
    /// Fraction of velocity kept each frame, in [0, 1).
    pub damping: f32,
    /// Radians per pixel of drag.
    pub look_sensitivity: f32,
    pub max_pitch: f32,
    pub min_height: f32,
    pub max_height: f32,
    /// Horizontal walk area; `None` for unbounded.
    pub bounds: Option<Aabb>,
}

impl Default for FreeFlySettings {
    fn default() -> Self {
        Self {
            acceleration: 40.0,
            damping: 0.9,
            look_sensitivity: 0.003,
            max_pitch: 89.0_f32.to_radians(),
            min_height: 0.5,
            max_height: 40.0,
            bounds: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FreeFlyController {
    settings: FreeFlySettings,
    position: Vec3,
    yaw: f32,
    pitch: f32,
    velocity: Vec3,
    disposed: bool,
}

/// View direction for yaw/pitch; yaw 0 looks down -Z.
fn direction(yaw: f32, pitch: f32) -> Vec3 {
    Vec3::new(
        -yaw.sin() * pitch.cos(),
        pitch.sin(),
        -yaw.cos() * pitch.cos(),
    )
}

impl FreeFlyController {
    /// Start from the camera's current position and view direction.
    pub fn from_camera(camera: &Camera, settings: FreeFlySettings) -> Self {
        let forward = camera.forward();
        let pitch = forward
            .y
            .clamp(-1.0, 1.0)
            .asin()
            .clamp(-settings.max_pitch, settings.max_pitch);
        let yaw = (-forward.x).atan2(-forward.z);
        let mut controller = Self {
            position: camera.position,
            yaw,
            pitch,
            velocity: Vec3::ZERO,
            disposed: false,
            settings,
        };
        controller.position = controller.clamp_position(controller.position);
        controller
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn forward(&self) -> Vec3 {
        direction(self.yaw, self.pitch)
    }

    pub fn set_bounds(&mut self, bounds: Option<Aabb>) {
        self.settings.bounds = bounds;
        self.position = self.clamp_position(self.position);
    }

    fn clamp_position(&self, p: Vec3) -> Vec3 {
        let mut p = match &self.settings.bounds {
            Some(b) => Vec3::new(p.x.clamp(b.min.x, b.max.x), p.y, p.z.clamp(b.min.z, b.max.z)),
            None => p,
        };
        let (lo, hi) = (self.settings.min_height, self.settings.max_height);
        p.y = p.y.clamp(lo.min(hi), hi.max(lo));
        p
    }

    fn look(&mut self, drag: Vec2) -> bool {
        if drag == Vec2::ZERO {
            return false;
        }
        let s = self.settings.look_sensitivity;
        self.yaw -= drag.x * s;
        self.pitch = (self.pitch - drag.y * s).clamp(-self.settings.max_pitch, self.settings.max_pitch);
        true
    }

    fn thrust(&self, input: &InputState) -> Vec3 {
        let keys = &input.keyboard;
        let ahead = keys.axis(&BACK_KEYS, &FORWARD_KEYS);
        let side = keys.axis(&LEFT_KEYS, &RIGHT_KEYS);
        let vertical = keys.axis(&DOWN_KEYS, &UP_KEYS);

        let forward = self.forward();
        let right = forward.cross(Vec3::Y).normalize_or(Vec3::X);
        let dir = forward * ahead + right * side + Vec3::Y * vertical;
        dir.normalize_or_zero()
    }
}

impl CameraController for FreeFlyController {
    fn update(&mut self, dt_s: f32, input: &InputState, camera: &mut Camera) -> bool {
        if self.disposed {
            return false;
        }
        let dt = dt_s.max(0.0);
        let turned = self.look(input.pointer.drag_delta());

        let thrust = self.thrust(input);
        let keep = self.settings.damping.clamp(0.0, 0.999);
        self.velocity = self.velocity * keep + thrust * self.settings.acceleration * dt;
        if self.velocity.length() < REST_SPEED {
            self.velocity = Vec3::ZERO;
        }

        let before = self.position;
        let desired = self.position + self.velocity * dt;
        self.position = self.clamp_position(desired);
        // Axes that hit a bound lose their velocity.
        self.velocity = Vec3::select(desired.cmpne(self.position), Vec3::ZERO, self.velocity);

        camera.position = self.position;
        camera.target = self.position + self.forward();
        turned || self.position != before
    }

    fn dispose(&mut self) {
        self.velocity = Vec3::ZERO;
        self.disposed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parksphere_input::{ElementState, MouseButton};

    fn start() -> (FreeFlyController, Camera) {
        let camera = Camera {
            position: Vec3::new(0.0, 5.0, 10.0),
            target: Vec3::new(0.0, 5.0, 0.0),
            ..Camera::default()
        };
        (FreeFlyController::from_camera(&camera, FreeFlySettings::default()), camera)
    }

    fn holding(key: KeyCode) -> InputState {
        let mut input = InputState::new();
        input.keyboard.press(key);
        input
    }

    #[test]
    fn test_adopts_camera_direction() {
        let (ff, _) = start();
        assert!(ff.yaw().abs() < 1e-5);
        assert!(ff.pitch().abs() < 1e-5);
        assert!((ff.forward() - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn test_forward_key_moves_forward() {
        let (mut ff, mut camera) = start();
        let input = holding(KeyCode::KeyW);
        for _ in 0..30 {
            assert!(ff.update(1.0 / 60.0, &input, &mut camera));
        }
        assert!(camera.position.z < 10.0);
        assert!((camera.position.y - 5.0).abs() < 1e-4);
        assert!((camera.target - camera.position - Vec3::NEG_Z).length() < 1e-4);
    }

    /// Velocity carries on after release, then dies out.
    #[test]
    fn test_inertia_then_rest() {
        let (mut ff, mut camera) = start();
        let input = holding(KeyCode::KeyD);
        for _ in 0..10 {
            ff.update(1.0 / 60.0, &input, &mut camera);
        }
        let idle = InputState::new();
        assert!(ff.update(1.0 / 60.0, &idle, &mut camera), "coasts after release");
        let mut frames = 0;
        while ff.velocity() != Vec3::ZERO {
            ff.update(1.0 / 60.0, &idle, &mut camera);
            frames += 1;
            assert!(frames < 500);
        }
        assert!(camera.position.x > 0.0);
        assert!(!ff.update(1.0 / 60.0, &idle, &mut camera));
    }

    #[test]
    fn test_vertical_axis_is_independent() {
        let (mut ff, mut camera) = start();
        let input = holding(KeyCode::Space);
        for _ in 0..30 {
            ff.update(1.0 / 60.0, &input, &mut camera);
        }
        assert!(camera.position.y > 5.0);
        assert!((camera.position.x).abs() < 1e-5);
        assert!((camera.position.z - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_height_band() {
        let (mut ff, mut camera) = start();
        let input = holding(KeyCode::KeyQ);
        for _ in 0..600 {
            ff.update(1.0 / 60.0, &input, &mut camera);
        }
        assert_eq!(camera.position.y, 0.5);
    }

    #[test]
    fn test_bounds_clamp() {
        let (mut ff, mut camera) = start();
        ff.set_bounds(Some(Aabb::new(Vec3::splat(-12.0), Vec3::splat(12.0))));
        let input = holding(KeyCode::KeyW);
        for _ in 0..600 {
            ff.update(1.0 / 60.0, &input, &mut camera);
        }
        assert_eq!(camera.position.z, -12.0);
    }

    #[test]
    fn test_look_pitch_clamped() {
        let (mut ff, mut camera) = start();
        let mut input = InputState::new();
        input.pointer.on_moved(0.0, 0.0);
        input.pointer.on_button(MouseButton::Left, ElementState::Pressed);
        input.pointer.on_moved(0.0, -10_000.0);
        assert!(ff.update(1.0 / 60.0, &input, &mut camera));
        assert!((ff.pitch() - 89.0_f32.to_radians()).abs() < 1e-5);
        assert!(camera.forward().y > 0.99);
    }

    #[test]
    fn test_disposed_ignores_input() {
        let (mut ff, mut camera) = start();
        ff.dispose();
        assert!(!ff.update(1.0 / 60.0, &holding(KeyCode::KeyW), &mut camera));
    }
}
