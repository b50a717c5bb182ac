//! View-frustum planes extracted from a view-projection matrix, with sphere
//! and AABB separation tests.

use glam::{Mat4, Vec3, Vec4};

use crate::bounds::{Aabb, BoundingSphere};

/// Plane indices into the frustum planes array.
const LEFT: usize = 0;
const RIGHT: usize = 1;
const BOTTOM: usize = 2;
const TOP: usize = 3;
const NEAR: usize = 4;
const FAR: usize = 5;

/// A view frustum defined by six inward-pointing planes.
#[derive(Clone, Debug)]
pub struct Frustum {
    /// Six planes: left, right, bottom, top, near, far.
    /// Each `Vec4(a, b, c, d)` where `(a,b,c)` is the normalized inward
    /// normal and `d` is the signed distance term.
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extract frustum planes from a combined view-projection matrix
    /// using the Griggs-Hartmann method.
    ///
    /// Expects a reverse-Z projection (near → z=1, far → z=0), which is what
    /// [`Camera`](crate::Camera) produces.
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let rows = [vp.row(0), vp.row(1), vp.row(2), vp.row(3)];

        let mut planes = [Vec4::ZERO; 6];
        planes[LEFT] = rows[3] + rows[0];
        planes[RIGHT] = rows[3] - rows[0];
        planes[BOTTOM] = rows[3] + rows[1];
        planes[TOP] = rows[3] - rows[1];
        // Reverse-Z: z_ndc in [0, 1] with far at 0, so the far plane is row2
        // alone and the near plane is row3 - row2.
        planes[NEAR] = rows[3] - rows[2];
        planes[FAR] = rows[2];

        for plane in &mut planes {
            let len = plane.truncate().length();
            if len > 0.0 {
                *plane /= len;
            }
        }

        Self { planes }
    }

    /// The six normalized planes.
    pub fn planes(&self) -> &[Vec4; 6] {
        &self.planes
    }

    /// Signed distance from `point` to plane `index` (positive = inside).
    fn signed_distance(&self, index: usize, point: Vec3) -> f32 {
        let plane = self.planes[index];
        plane.truncate().dot(point) + plane.w
    }

    /// Sphere-vs-six-planes separating test. Hidden if fully behind any plane.
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        (0..6).all(|i| self.signed_distance(i, sphere.center) >= -sphere.radius)
    }

    /// Whether an AABB is at least partially inside the frustum.
    ///
    /// Uses the positive-vertex test: conservative near frustum corners, never
    /// rejects a visible box.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            let normal = plane.truncate();
            let p = Vec3::select(normal.cmpge(Vec3::ZERO), aabb.max, aabb.min);
            normal.dot(p) + plane.w >= 0.0
        })
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        (0..6).all(|i| self.signed_distance(i, point) >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_camera_vp() -> Mat4 {
        let view = Mat4::look_to_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(
            std::f32::consts::FRAC_PI_4,
            16.0 / 9.0,
            1000.0, // reverse-Z: far as near param
            0.1,    // reverse-Z: near as far param
        );
        proj * view
    }

    #[test]
    fn test_sphere_in_front_visible() {
        let frustum = Frustum::from_view_projection(&default_camera_vp());
        assert!(frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(0.0, 0.0, -5.0), 1.0)));
    }

    #[test]
    fn test_sphere_behind_camera_hidden() {
        let frustum = Frustum::from_view_projection(&default_camera_vp());
        assert!(!frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(0.0, 0.0, 5.0), 1.0)));
    }

    #[test]
    fn test_sphere_outside_each_plane_hidden() {
        let frustum = Frustum::from_view_projection(&default_camera_vp());
        for center in [
            Vec3::new(-1000.0, 0.0, -5.0),
            Vec3::new(1000.0, 0.0, -5.0),
            Vec3::new(0.0, 1000.0, -5.0),
            Vec3::new(0.0, -1000.0, -5.0),
            Vec3::new(0.0, 0.0, -2000.0),
        ] {
            assert!(
                !frustum.intersects_sphere(&BoundingSphere::new(center, 1.0)),
                "{center:?} should be culled"
            );
        }
    }

    #[test]
    fn test_sphere_straddling_side_plane_visible() {
        let frustum = Frustum::from_view_projection(&default_camera_vp());
        // Centre just outside the right plane at depth 10, radius reaching back in.
        let sphere = BoundingSphere::new(Vec3::new(8.0, 0.0, -10.0), 5.0);
        assert!(frustum.intersects_sphere(&sphere));
    }

    #[test]
    fn test_aabb_partially_in_frustum_is_visible() {
        let frustum = Frustum::from_view_projection(&default_camera_vp());
        let aabb = Aabb::new(Vec3::new(-100.0, -1.0, -10.0), Vec3::new(1.0, 1.0, -5.0));
        assert!(frustum.intersects_aabb(&aabb));
        let behind = Aabb::new(Vec3::splat(10.0), Vec3::splat(20.0));
        assert!(!frustum.intersects_aabb(&behind));
    }

    #[test]
    fn test_point_containment() {
        let frustum = Frustum::from_view_projection(&default_camera_vp());
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -1.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -0.01)));
    }

    #[test]
    fn test_frustum_planes_normalized() {
        let frustum = Frustum::from_view_projection(&default_camera_vp());
        for plane in frustum.planes() {
            let normal_len = plane.truncate().length();
            assert!(
                (normal_len - 1.0).abs() < 1e-4,
                "plane normal not normalized: {normal_len}"
            );
        }
    }
}
