//! Binary container for per-site LOD meshes.
//!
//! ```text
//! offset size
//! 0      4    magic "PSMH"
//! 4      2    version (1)
//! 6      2    flags (bit 0: payload is LZ4 block with prepended size)
//! 8      4    vertex count
//! 12     4    index count
//! 16     4    source resolution
//! 20     ..   payload: positions f32x3, normals f32x3, uvs f32x2, indices u32
//! ```
//!
//! All integers and floats are little-endian.

use glam::Vec3;
use parksphere_render::{Aabb, MeshData};

use crate::error::DecodeError;

pub const MAGIC: [u8; 4] = *b"PSMH";
pub const VERSION: u16 = 1;
pub const FLAG_LZ4: u16 = 1;
const HEADER_LEN: usize = 20;

struct Header {
    flags: u16,
    vertex_count: u32,
    index_count: u32,
    source_resolution: u32,
}

fn read_header(bytes: &[u8]) -> Result<Header, DecodeError> {
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            needed: HEADER_LEN,
            available: bytes.len(),
        });
    }
    let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
    if magic != MAGIC {
        return Err(DecodeError::BadMagic(magic));
    }
    let u16_at = |o: usize| u16::from_le_bytes([bytes[o], bytes[o + 1]]);
    let u32_at = |o: usize| u32::from_le_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]]);
    let version = u16_at(4);
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    Ok(Header {
        flags: u16_at(6),
        vertex_count: u32_at(8),
        index_count: u32_at(12),
        source_resolution: u32_at(16),
    })
}

fn floats(bytes: &[u8]) -> impl Iterator<Item = f32> + '_ {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
}

/// Decode a mesh container.
pub fn decode_mesh(bytes: &[u8]) -> Result<MeshData, DecodeError> {
    let header = read_header(bytes)?;
    let raw = &bytes[HEADER_LEN..];
    let decompressed;
    let payload: &[u8] = if header.flags & FLAG_LZ4 != 0 {
        decompressed = lz4_flex::decompress_size_prepended(raw)?;
        &decompressed
    } else {
        raw
    };

    let v = header.vertex_count as usize;
    let i = header.index_count as usize;
    let pos_len = v * 12;
    let nrm_len = v * 12;
    let uv_len = v * 8;
    let idx_len = i * 4;
    let needed = pos_len + nrm_len + uv_len + idx_len;
    if payload.len() < needed {
        return Err(DecodeError::Truncated {
            needed,
            available: payload.len(),
        });
    }

    let (pos_bytes, rest) = payload.split_at(pos_len);
    let (nrm_bytes, rest) = rest.split_at(nrm_len);
    let (uv_bytes, rest) = rest.split_at(uv_len);
    let idx_bytes = &rest[..idx_len];

    let triples = |b: &[u8]| -> Vec<[f32; 3]> {
        let f: Vec<f32> = floats(b).collect();
        f.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()
    };
    let positions = triples(pos_bytes);
    let normals = triples(nrm_bytes);
    let uv_floats: Vec<f32> = floats(uv_bytes).collect();
    let uvs = uv_floats.chunks_exact(2).map(|c| [c[0], c[1]]).collect();
    let indices: Vec<u32> = idx_bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    if let Some(&bad) = indices.iter().find(|&&ix| ix >= header.vertex_count) {
        return Err(DecodeError::IndexOutOfRange {
            index: bad,
            vertices: header.vertex_count,
        });
    }

    let bounds = Aabb::from_points(&positions).unwrap_or(Aabb::new(Vec3::ZERO, Vec3::ZERO));
    Ok(MeshData {
        positions,
        normals,
        uvs,
        indices: indices[..i - i % 3].to_vec(),
        bounds,
        source_resolution: header.source_resolution,
    })
}

/// Encode a mesh container, LZ4-compressing the payload when `compress`.
pub fn encode_mesh(mesh: &MeshData, compress: bool) -> Vec<u8> {
    let mut payload = Vec::with_capacity(mesh.byte_size() as usize);
    for p in &mesh.positions {
        payload.extend(p.iter().flat_map(|f| f.to_le_bytes()));
    }
    for n in &mesh.normals {
        payload.extend(n.iter().flat_map(|f| f.to_le_bytes()));
    }
    for uv in &mesh.uvs {
        payload.extend(uv.iter().flat_map(|f| f.to_le_bytes()));
    }
    for ix in &mesh.indices {
        payload.extend_from_slice(&ix.to_le_bytes());
    }

    let flags = if compress { FLAG_LZ4 } else { 0 };
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&(mesh.positions.len() as u32).to_le_bytes());
    out.extend_from_slice(&(mesh.indices.len() as u32).to_le_bytes());
    out.extend_from_slice(&mesh.source_resolution.to_le_bytes());
    if compress {
        out.extend_from_slice(&lz4_flex::compress_prepend_size(&payload));
    } else {
        out.extend_from_slice(&payload);
    }
    out
}
