//! CPU-side geometry and texture payloads handed to the backend for upload.

use crate::bounds::Aabb;

/// Indexed triangle mesh with per-vertex normals and UVs.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    pub bounds: Aabb,
    /// Samples per side of the heightfield the mesh was built from.
    pub source_resolution: u32,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.indices.is_empty()
    }

    /// Bytes the mesh occupies once resident on the GPU.
    pub fn byte_size(&self) -> u64 {
        let vertex = (3 + 3 + 2) * 4;
        (self.positions.len() * vertex + self.indices.len() * 4) as u64
    }

    /// Recompute `bounds` from the positions.
    pub fn recompute_bounds(&mut self) {
        if let Some(bounds) = Aabb::from_points(&self.positions) {
            self.bounds = bounds;
        }
    }

    /// Structural checks: matching attribute lengths, whole triangles, indices in range.
    pub fn is_well_formed(&self) -> bool {
        let n = self.positions.len();
        self.normals.len() == n
            && self.uvs.len() == n
            && self.indices.len() % 3 == 0
            && self.indices.iter().all(|&i| (i as usize) < n)
    }

    /// UV sphere centred on the origin; used for the globe and the benchmark scene.
    pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut positions = Vec::with_capacity(((segments + 1) * (rings + 1)) as usize);
        let mut normals = Vec::with_capacity(positions.capacity());
        let mut uvs = Vec::with_capacity(positions.capacity());

        for ring in 0..=rings {
            let v = ring as f32 / rings as f32;
            let polar = v * std::f32::consts::PI;
            for seg in 0..=segments {
                let u = seg as f32 / segments as f32;
                let azimuth = u * std::f32::consts::TAU;
                let n = [
                    polar.sin() * azimuth.cos(),
                    polar.cos(),
                    polar.sin() * azimuth.sin(),
                ];
                positions.push([n[0] * radius, n[1] * radius, n[2] * radius]);
                normals.push(n);
                uvs.push([u, v]);
            }
        }

        let stride = segments + 1;
        let mut indices = Vec::with_capacity((segments * rings * 6) as usize);
        for ring in 0..rings {
            for seg in 0..segments {
                let a = ring * stride + seg;
                let b = a + stride;
                indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
            }
        }

        let r = radius.abs();
        Self {
            positions,
            normals,
            uvs,
            indices,
            bounds: Aabb::new(glam::Vec3::splat(-r), glam::Vec3::splat(r)),
            source_resolution: segments,
        }
    }
}

/// Decoded RGBA8 texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureData {
    pub fn byte_size(&self) -> u64 {
        self.rgba.len() as u64
    }

    /// A single-colour texture.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = (width as usize) * (height as usize);
        Self {
            width,
            height,
            rgba: rgba.repeat(pixels),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uv_sphere_is_well_formed() {
        let sphere = MeshData::uv_sphere(1.0, 16, 8);
        assert!(sphere.is_well_formed());
        assert_eq!(sphere.triangle_count(), 16 * 8 * 2);
        assert_eq!(sphere.vertex_count(), 17 * 9);
        for p in &sphere.positions {
            let len = glam::Vec3::from_array(*p).length();
            assert!((len - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_recompute_bounds() {
        let mut mesh = MeshData::uv_sphere(2.0, 8, 4);
        mesh.bounds = Aabb::new(glam::Vec3::ZERO, glam::Vec3::ZERO);
        mesh.recompute_bounds();
        assert!((mesh.bounds.max.y - 2.0).abs() < 1e-5);
        assert!((mesh.bounds.min.y + 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_byte_sizes() {
        let mesh = MeshData::uv_sphere(1.0, 4, 2);
        assert_eq!(mesh.byte_size(), (15 * 32 + 48 * 4) as u64);
        assert_eq!(TextureData::solid(4, 2, [1, 2, 3, 4]).byte_size(), 32);
    }
}
