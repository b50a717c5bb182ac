//! Error types for asset acquisition.
//!
//! None of these reach the engine's public surface: the cache logs them and
//! substitutes a procedural or null result.

/// Failure to retrieve raw bytes.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("asset source is offline")]
    Offline,

    #[error("timed out after {0} ms")]
    Timeout(u64),
}

/// Failure to turn fetched bytes into a mesh or texture.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("bad mesh magic {0:?}")]
    BadMagic([u8; 4]),

    #[error("unsupported mesh version {0}")]
    UnsupportedVersion(u16),

    #[error("mesh payload truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("mesh decompression failed: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),

    #[error("mesh index {index} out of range for {vertices} vertices")]
    IndexOutOfRange { index: u32, vertices: u32 },

    #[error("unsupported texture format: {0}")]
    UnsupportedFormat(String),

    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("catalog parse failed: {0}")]
    Catalog(#[from] serde_json::Error),
}

/// Either stage of acquiring an asset.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
