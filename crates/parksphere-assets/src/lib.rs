//! Site catalog and asset acquisition: sources, codecs, procedural
//! fallback, background loading and the GPU-owning cache.

pub mod cache;
pub mod catalog;
pub mod error;
pub mod loader;
pub mod mesh_codec;
pub mod procedural;
pub mod source;
pub mod texture;

pub use cache::{
    AssetCache, AssetOrigin, CacheSettings, CacheStats, LodAsset, TerrainRequest, TextureRequest,
};
pub use catalog::{Catalog, CatalogStats, Coordinates, Facet, GalleryImage, Site, SiteFilter};
pub use error::{AssetError, DecodeError, FetchError};
pub use loader::{AssetKey, AssetLoader, default_worker_count, terrain_path, terrain_texture_path};
pub use procedural::{MAX_LEVEL, TerrainParams, generate_terrain};
pub use source::{AssetSource, DirectorySource, HttpSource, MemorySource, UnavailableSource, source_for};
