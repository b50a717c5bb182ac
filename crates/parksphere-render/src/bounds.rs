//! Spatial bounds used for culling, picking and camera framing.

use glam::Vec3;

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box.
    pub min: Vec3,
    /// Maximum corner of the bounding box.
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing every point, or `None` for an empty slice.
    pub fn from_points(points: &[[f32; 3]]) -> Option<Self> {
        let first = Vec3::from_array(*points.first()?);
        let (min, max) = points
            .iter()
            .map(|p| Vec3::from_array(*p))
            .fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(Self { min, max })
    }

    /// Returns the center point of the AABB.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Returns the half-extents (half-size along each axis).
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Length of the box diagonal.
    pub fn diagonal(&self) -> f32 {
        (self.max - self.min).length()
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Clamp `point` into the box.
    pub fn clamp(&self, point: Vec3) -> Vec3 {
        point.clamp(self.min, self.max)
    }

    /// The enclosing sphere of this box.
    pub fn bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere::new(self.center(), self.extents().length())
    }
}

/// A bounding sphere, the primitive tested by the visibility pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
        }
    }

    /// Distance from `point` to the sphere surface; zero when inside.
    pub fn distance_to(&self, point: Vec3) -> f32 {
        (self.center.distance(point) - self.radius).max(0.0)
    }

    /// Nearest positive hit distance along a normalized ray, if any.
    pub fn ray_hit(&self, origin: Vec3, dir: Vec3) -> Option<f32> {
        let oc = origin - self.center;
        let b = oc.dot(dir);
        let c = oc.length_squared() - self.radius * self.radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sqrt = disc.sqrt();
        let near = -b - sqrt;
        if near >= 0.0 {
            return Some(near);
        }
        let far = -b + sqrt;
        (far >= 0.0).then_some(far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_center_and_extents() {
        let aabb = Aabb::new(Vec3::new(-2.0, -3.0, -4.0), Vec3::new(2.0, 3.0, 4.0));
        assert_eq!(aabb.center(), Vec3::ZERO);
        assert_eq!(aabb.extents(), Vec3::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn test_from_points() {
        let aabb = Aabb::from_points(&[[1.0, 0.0, -1.0], [-1.0, 2.0, 3.0], [0.0, -5.0, 0.0]])
            .unwrap();
        assert_eq!(aabb.min, Vec3::new(-1.0, -5.0, -1.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 2.0, 3.0));
        assert!(Aabb::from_points(&[]).is_none());
    }

    #[test]
    fn test_clamp_and_contains() {
        let aabb = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        assert!(aabb.contains(Vec3::ZERO));
        assert!(!aabb.contains(Vec3::new(2.0, 0.0, 0.0)));
        assert_eq!(aabb.clamp(Vec3::new(5.0, -5.0, 0.5)), Vec3::new(1.0, -1.0, 0.5));
    }

    #[test]
    fn test_sphere_distance() {
        let sphere = BoundingSphere::new(Vec3::ZERO, 1.0);
        assert!((sphere.distance_to(Vec3::new(3.0, 0.0, 0.0)) - 2.0).abs() < 1e-6);
        assert_eq!(sphere.distance_to(Vec3::new(0.5, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_ray_hit() {
        let sphere = BoundingSphere::new(Vec3::new(0.0, 0.0, -5.0), 1.0);
        let hit = sphere.ray_hit(Vec3::ZERO, Vec3::NEG_Z).unwrap();
        assert!((hit - 4.0).abs() < 1e-5);
        assert!(sphere.ray_hit(Vec3::ZERO, Vec3::Z).is_none());
        assert!(sphere.ray_hit(Vec3::ZERO, Vec3::X).is_none());
    }
}
