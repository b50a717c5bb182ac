//! The globe scene: textured globe node plus the instanced marker node.
//!
//! The globe and marker meshes are generated here, so the scene owns and
//! releases them. The globe texture comes from the asset cache and is only
//! referenced.

use glam::Vec3;
use parksphere_render::{
    BoundingSphere, GeometryHandle, MarkerInstance, MeshData, NodeDesc, NodeId, NodeLayer,
    RenderBackend, TextureHandle,
};
use tracing::debug;

use crate::markers::GLOBE_RADIUS;

const GLOBE_SEGMENTS: u32 = 96;
const GLOBE_RINGS: u32 = 64;

#[derive(Debug)]
pub struct GlobeScene {
    globe: NodeId,
    globe_geometry: GeometryHandle,
    markers: NodeId,
    marker_geometry: GeometryHandle,
    texture: Option<TextureHandle>,
    hidden: bool,
}

impl GlobeScene {
    pub fn build(backend: &mut dyn RenderBackend) -> Self {
        let globe_geometry =
            backend.upload_geometry(&MeshData::uv_sphere(GLOBE_RADIUS, GLOBE_SEGMENTS, GLOBE_RINGS));
        let globe = backend.add_node(
            NodeDesc::new(
                "globe",
                NodeLayer::Globe,
                BoundingSphere::new(Vec3::ZERO, GLOBE_RADIUS),
            )
            .with_geometry(globe_geometry),
        );

        // Unit sphere scaled per instance.
        let marker_geometry = backend.upload_geometry(&MeshData::uv_sphere(1.0, 8, 6));
        let markers = backend.add_node(
            NodeDesc::new("site-markers", NodeLayer::Markers, Self::marker_bounds())
                .with_geometry(marker_geometry),
        );
        debug!(?globe, ?markers, "Globe scene built");
        Self {
            globe,
            globe_geometry,
            markers,
            marker_geometry,
            texture: None,
            hidden: false,
        }
    }

    pub fn globe_bounds() -> BoundingSphere {
        BoundingSphere::new(Vec3::ZERO, GLOBE_RADIUS)
    }

    pub fn marker_bounds() -> BoundingSphere {
        BoundingSphere::new(Vec3::ZERO, GLOBE_RADIUS * 1.05)
    }

    pub fn globe_node(&self) -> NodeId {
        self.globe
    }

    pub fn marker_node(&self) -> NodeId {
        self.markers
    }

    pub fn nodes(&self) -> [NodeId; 2] {
        [self.globe, self.markers]
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    pub fn set_texture(&mut self, backend: &mut dyn RenderBackend, texture: Option<TextureHandle>) {
        self.texture = texture;
        backend.set_node_texture(self.globe, texture);
    }

    pub fn set_marker_instances(&self, backend: &mut dyn RenderBackend, instances: &[MarkerInstance]) {
        backend.set_marker_instances(self.markers, instances);
    }

    pub fn set_hidden(&mut self, backend: &mut dyn RenderBackend, hidden: bool) {
        self.hidden = hidden;
        for id in self.nodes() {
            backend.set_visible(id, !hidden);
        }
    }

    /// Remove the nodes and release the scene-owned meshes. The texture
    /// belongs to the cache and is left alone.
    pub fn dispose(self, backend: &mut dyn RenderBackend) {
        backend.remove_node(self.globe);
        backend.remove_node(self.markers);
        backend.release_geometry(self.globe_geometry);
        backend.release_geometry(self.marker_geometry);
    }
}
