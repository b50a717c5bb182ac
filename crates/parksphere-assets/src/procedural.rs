//! Deterministic procedural terrain, substituted whenever a real LOD mesh
//! cannot be fetched or decoded.
//!
//! The heightfield is fractal Brownian motion over simplex noise, seeded
//! from a hash of the site id and faded to zero toward the edge of the
//! tile. Grid resolution halves with each coarser LOD level.

use std::hash::{Hash, Hasher};

use glam::Vec3;
use noise::{NoiseFn, Simplex};
use parksphere_render::{Aabb, MeshData};
use rustc_hash::FxHasher;

/// Quads per side at LOD 0.
pub const BASE_SEGMENTS: u32 = 128;
/// Quads per side never drop below this.
pub const MIN_SEGMENTS: u32 = 8;
/// Coarsest LOD level.
pub const MAX_LEVEL: u8 = 3;

/// Shape of a generated terrain tile.
#[derive(Clone, Debug)]
pub struct TerrainParams {
    /// Side length of the square tile in world units.
    pub extent: f32,
    /// Peak height before falloff.
    pub max_height: f32,
    pub octaves: u32,
    pub base_frequency: f64,
    pub lacunarity: f64,
    pub persistence: f64,
    /// Fraction of the half-extent where the edge falloff begins.
    pub falloff_start: f32,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            extent: 20.0,
            max_height: 3.0,
            octaves: 5,
            base_frequency: 0.08,
            lacunarity: 2.0,
            persistence: 0.5,
            falloff_start: 0.6,
        }
    }
}

/// Stable 64-bit seed for a site id.
pub fn site_seed(site_id: &str) -> u64 {
    let mut hasher = FxHasher::default();
    site_id.hash(&mut hasher);
    hasher.finish()
}

/// Quads per side for `level` (0 finest, 3 coarsest).
pub fn segments_for_level(level: u8) -> u32 {
    (BASE_SEGMENTS >> level.min(MAX_LEVEL)).max(MIN_SEGMENTS)
}

/// fBm heightfield over simplex noise.
pub struct Heightfield {
    noise: Simplex,
    params: TerrainParams,
    norm: f64,
}

impl Heightfield {
    pub fn new(seed: u64, params: TerrainParams) -> Self {
        // Fold the high bits in; Simplex takes a u32 seed.
        let noise = Simplex::new((seed ^ (seed >> 32)) as u32);
        let mut norm = 0.0;
        let mut amp = 1.0;
        for _ in 0..params.octaves {
            norm += amp;
            amp *= params.persistence;
        }
        Self {
            noise,
            params,
            norm: if norm > 0.0 { norm } else { 1.0 },
        }
    }

    /// Height at tile-local `(x, z)`, with the edge falloff applied.
    pub fn height(&self, x: f32, z: f32) -> f32 {
        let mut total = 0.0;
        let mut frequency = self.params.base_frequency;
        let mut amplitude = 1.0;
        for _ in 0..self.params.octaves {
            total += self.noise.get([x as f64 * frequency, z as f64 * frequency]) * amplitude;
            frequency *= self.params.lacunarity;
            amplitude *= self.params.persistence;
        }
        // Map [-1, 1] to [0, 1] so terrain sits on the ground plane.
        let h = ((total / self.norm) * 0.5 + 0.5) as f32;
        h * self.params.max_height * self.falloff(x, z)
    }

    /// 1 in the interior, easing to 0 at the tile edge.
    fn falloff(&self, x: f32, z: f32) -> f32 {
        let half = self.params.extent * 0.5;
        let r = (x * x + z * z).sqrt() / half;
        let start = self.params.falloff_start.clamp(0.0, 0.99);
        let t = ((r - start) / (1.0 - start)).clamp(0.0, 1.0);
        1.0 - t * t * (3.0 - 2.0 * t)
    }
}

/// Generate the fallback mesh for `site_id` at `level`.
pub fn generate_terrain(site_id: &str, level: u8, params: &TerrainParams) -> MeshData {
    let field = Heightfield::new(site_seed(site_id), params.clone());
    let segments = segments_for_level(level);
    let side = segments + 1;
    let step = params.extent / segments as f32;
    let half = params.extent * 0.5;

    let mut heights = Vec::with_capacity((side * side) as usize);
    for row in 0..side {
        for col in 0..side {
            let x = -half + col as f32 * step;
            let z = -half + row as f32 * step;
            heights.push(field.height(x, z));
        }
    }
    let h = |col: u32, row: u32| heights[(row.min(segments) * side + col.min(segments)) as usize];

    let mut positions = Vec::with_capacity(heights.len());
    let mut normals = Vec::with_capacity(heights.len());
    let mut uvs = Vec::with_capacity(heights.len());
    for row in 0..side {
        for col in 0..side {
            let x = -half + col as f32 * step;
            let z = -half + row as f32 * step;
            positions.push([x, h(col, row), z]);

            let dx = h(col + 1, row) - h(col.saturating_sub(1), row);
            let dz = h(col, row + 1) - h(col, row.saturating_sub(1));
            let n = Vec3::new(-dx, 2.0 * step, -dz).normalize_or(Vec3::Y);
            normals.push(n.to_array());
            uvs.push([col as f32 / segments as f32, row as f32 / segments as f32]);
        }
    }

    let mut indices = Vec::with_capacity((segments * segments * 6) as usize);
    for row in 0..segments {
        for col in 0..segments {
            let a = row * side + col;
            let b = a + side;
            indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }

    let bounds = Aabb::from_points(&positions)
        .unwrap_or(Aabb::new(Vec3::splat(-half), Vec3::splat(half)));
    MeshData {
        positions,
        normals,
        uvs,
        indices,
        bounds,
        source_resolution: side,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_site_same_mesh() {
        let params = TerrainParams::default();
        let a = generate_terrain("yellowstone", 2, &params);
        let b = generate_terrain("yellowstone", 2, &params);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_sites_differ() {
        let params = TerrainParams::default();
        let a = generate_terrain("yellowstone", 3, &params);
        let b = generate_terrain("banff", 3, &params);
        assert_ne!(a.positions, b.positions);
    }

    #[test]
    fn test_every_level_is_renderable() {
        let params = TerrainParams::default();
        for level in 0..=MAX_LEVEL {
            let mesh = generate_terrain("any-site", level, &params);
            assert!(!mesh.is_empty(), "level {level}");
            assert!(mesh.is_well_formed(), "level {level}");
            let segments = segments_for_level(level);
            assert_eq!(mesh.triangle_count(), (segments * segments * 2) as usize);
        }
    }

    #[test]
    fn test_vertex_count_shrinks_with_level() {
        let params = TerrainParams::default();
        let counts: Vec<usize> = (0..=MAX_LEVEL)
            .map(|l| generate_terrain("site", l, &params).vertex_count())
            .collect();
        assert!(counts.windows(2).all(|w| w[0] > w[1]), "{counts:?}");
    }

    #[test]
    fn test_segments_clamped() {
        assert_eq!(segments_for_level(0), 128);
        assert_eq!(segments_for_level(3), 16);
        assert_eq!(segments_for_level(200), 16);
    }

    #[test]
    fn test_edges_fall_to_ground() {
        let params = TerrainParams::default();
        let field = Heightfield::new(site_seed("x"), params.clone());
        let half = params.extent * 0.5;
        assert!(field.height(half, 0.0).abs() < 1e-5);
        assert!(field.height(0.0, -half).abs() < 1e-5);
        assert!(field.height(0.0, 0.0) >= 0.0);
    }

    #[test]
    fn test_bounds_within_tile() {
        let params = TerrainParams::default();
        let mesh = generate_terrain("glacier", 1, &params);
        assert!(mesh.bounds.min.y >= 0.0);
        assert!(mesh.bounds.max.y <= params.max_height + 1e-4);
        assert!((mesh.bounds.max.x - 10.0).abs() < 1e-4);
    }
}
