//! Look-at camera that generates view and reverse-Z projection matrices.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Default globe pose: three units out on +Z, looking at the origin.
pub const DEFAULT_POSITION: Vec3 = Vec3::new(0.0, 0.0, 3.0);

/// Position and look target; everything a camera animation interpolates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
}

impl CameraPose {
    pub fn new(position: Vec3, target: Vec3) -> Self {
        Self { position, target }
    }

    /// Component-wise linear interpolation.
    pub fn lerp(&self, other: &CameraPose, t: f32) -> CameraPose {
        CameraPose {
            position: self.position.lerp(other.position, t),
            target: self.target.lerp(other.target, t),
        }
    }

    /// True when both position and target are within `epsilon`.
    pub fn approx_eq(&self, other: &CameraPose, epsilon: f32) -> bool {
        self.position.distance(other.position) <= epsilon
            && self.target.distance(other.target) <= epsilon
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        Self::new(DEFAULT_POSITION, Vec3::ZERO)
    }
}

/// GPU-facing camera block, uploaded by the backend.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
}

/// A perspective camera that looks at a target point.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Width / height.
    pub aspect_ratio: f32,
    /// Near clip plane distance (always positive).
    pub near: f32,
    /// Far clip plane distance (always positive, > near).
    pub far: f32,
}

impl Camera {
    /// Compute the view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Compute the projection matrix with reverse-Z.
    pub fn projection_matrix(&self) -> Mat4 {
        // Near maps to z=1, far to z=0: swap the clip distances.
        Mat4::perspective_rh(self.fov_y, self.aspect_ratio, self.far, self.near)
    }

    /// Compute the combined view-projection matrix.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Unit vector from position toward target.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Z)
    }

    /// Unit vector to the camera's right.
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize_or(Vec3::X)
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose::new(self.position, self.target)
    }

    pub fn set_pose(&mut self, pose: CameraPose) {
        self.position = pose.position;
        self.target = pose.target;
    }

    /// Update the aspect ratio from a surface size. Zero heights are ignored.
    pub fn set_aspect_ratio(&mut self, width: f32, height: f32) {
        if height > 0.0 && width > 0.0 {
            self.aspect_ratio = width / height;
        }
    }

    /// World-space ray through a surface pixel, for picking.
    ///
    /// `(x, y)` are pixels from the top-left corner.
    pub fn screen_ray(&self, x: f32, y: f32, width: f32, height: f32) -> (Vec3, Vec3) {
        let ndc_x = (2.0 * x / width.max(1.0)) - 1.0;
        let ndc_y = 1.0 - (2.0 * y / height.max(1.0));
        let half_h = (self.fov_y * 0.5).tan();
        let half_w = half_h * self.aspect_ratio;
        let forward = self.forward();
        let right = self.right();
        let up = right.cross(forward);
        let dir = (forward + right * (ndc_x * half_w) + up * (ndc_y * half_h)).normalize_or(forward);
        (self.position, dir)
    }

    /// Convert the camera to a uniform suitable for GPU upload.
    pub fn to_uniform(&self) -> CameraUniform {
        CameraUniform {
            view_proj: self.view_projection_matrix().to_cols_array_2d(),
            camera_pos: [self.position.x, self.position.y, self.position.z, 0.0],
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: DEFAULT_POSITION,
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: std::f32::consts::FRAC_PI_4, // 45 degrees
            aspect_ratio: 16.0 / 9.0,
            near: 0.01,
            far: 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_4;

    #[test]
    fn test_default_camera_looks_at_origin() {
        let camera = Camera::default();
        assert_eq!(camera.pose(), CameraPose::default());
        let forward = camera.forward();
        assert!((forward - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn test_default_fov_is_45_degrees() {
        assert!((Camera::default().fov_y - FRAC_PI_4).abs() < 1e-6);
    }

    #[test]
    fn test_aspect_ratio_ignores_zero_height() {
        let mut camera = Camera::default();
        camera.set_aspect_ratio(1920.0, 1080.0);
        assert!((camera.aspect_ratio - 16.0 / 9.0).abs() < 1e-6);
        camera.set_aspect_ratio(800.0, 0.0);
        assert!((camera.aspect_ratio - 16.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_view_matrix_inverse_is_camera_transform() {
        let camera = Camera {
            position: Vec3::new(10.0, 20.0, 30.0),
            target: Vec3::new(10.0, 20.0, 0.0),
            ..Camera::default()
        };
        let reconstructed = camera.view_matrix().inverse().col(3).truncate();
        assert!((reconstructed - camera.position).length() < 1e-4);
    }

    #[test]
    fn test_reverse_z_maps_near_to_one() {
        let camera = Camera::default();
        let vp = camera.view_projection_matrix();
        let near_point = vp * (camera.position + camera.forward() * camera.near).extend(1.0);
        let far_point = vp * (camera.position + camera.forward() * camera.far).extend(1.0);
        assert!((near_point.z / near_point.w - 1.0).abs() < 1e-3);
        assert!((far_point.z / far_point.w).abs() < 1e-3);
    }

    #[test]
    fn test_pose_lerp_midpoint() {
        let a = CameraPose::new(Vec3::ZERO, Vec3::ZERO);
        let b = CameraPose::new(Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 4.0, 0.0));
        let mid = a.lerp(&b, 0.5);
        assert!(mid.approx_eq(&CameraPose::new(Vec3::X, Vec3::new(0.0, 2.0, 0.0)), 1e-6));
    }

    #[test]
    fn test_center_screen_ray_is_forward() {
        let camera = Camera::default();
        let (origin, dir) = camera.screen_ray(640.0, 360.0, 1280.0, 720.0);
        assert_eq!(origin, camera.position);
        assert!((dir - camera.forward()).length() < 1e-5);
    }

    #[test]
    fn test_uniform_carries_position() {
        let uniform = Camera::default().to_uniform();
        assert_eq!(uniform.camera_pos, [0.0, 0.0, 3.0, 0.0]);
        assert_eq!(bytemuck::bytes_of(&uniform).len(), 80);
    }
}
