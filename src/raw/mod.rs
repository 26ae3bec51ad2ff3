//! In-memory scene representation handed to the exporters.
//!
//! Importers populate a [`RawModel`] through the `add_*` methods; the exporters
//! only read from it. Nodes live in a flat array and reference each other by id,
//! resolved through an id to index map.

use std::collections::HashMap;

mod material;
mod node;
mod partition;
mod vertex;

pub use material::{RawMaterial, RawMaterialType, RawShadingModel, RawTexture, RawTextureUsage};
pub use node::{Bounds, NodeId, RawNode, SurfaceId};
pub use vertex::{flip_u, flip_v, RawTriangle, RawVertex, UvTransform, VertexAttributes};

#[derive(Debug, Clone, PartialEq)]
pub struct RawSurface {
    pub id: SurfaceId,
    pub name: String,
    /// Node whose transform chain places this surface in the world.
    pub skeleton_root_id: NodeId,
    /// Recomputed from the vertices when partitioning; not trusted from importers.
    pub bounds: Bounds,
}

impl RawSurface {
    pub fn new(id: SurfaceId, name: &str, skeleton_root_id: NodeId) -> Self {
        Self {
            id,
            name: name.to_string(),
            skeleton_root_id,
            bounds: Bounds::EMPTY,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawModel {
    vertex_attributes: VertexAttributes,
    vertices: Vec<RawVertex>,
    vertex_lookup: HashMap<[u32; 25], u32>,
    triangles: Vec<RawTriangle>,
    surfaces: Vec<RawSurface>,
    surface_lookup: HashMap<SurfaceId, usize>,
    materials: Vec<RawMaterial>,
    textures: Vec<RawTexture>,
    nodes: Vec<RawNode>,
    node_lookup: HashMap<NodeId, usize>,
    root_node_id: Option<NodeId>,
}

impl RawModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_attributes(&self) -> VertexAttributes {
        self.vertex_attributes
    }

    pub fn add_vertex_attributes(&mut self, attributes: VertexAttributes) {
        self.vertex_attributes |= attributes;
    }

    /// Returns the index of an identical vertex if one was added before.
    pub fn add_vertex(&mut self, vertex: RawVertex) -> u32 {
        let key = vertex.key();
        if let Some(index) = self.vertex_lookup.get(&key) {
            return *index;
        }
        let index = self.vertices.len() as u32;
        self.vertices.push(vertex);
        self.vertex_lookup.insert(key, index);
        index
    }

    pub fn add_triangle(&mut self, v0: u32, v1: u32, v2: u32, material_index: usize, surface_index: usize) {
        self.triangles.push(RawTriangle {
            verts: [v0, v1, v2],
            material_index,
            surface_index,
        });
    }

    /// Adds a surface, or returns the index of the surface with the same id.
    pub fn add_surface(&mut self, surface: RawSurface) -> usize {
        if let Some(index) = self.surface_lookup.get(&surface.id) {
            return *index;
        }
        let index = self.surfaces.len();
        self.surface_lookup.insert(surface.id, index);
        self.surfaces.push(surface);
        index
    }

    pub fn add_material(&mut self, material: RawMaterial) -> usize {
        if let Some(index) = self.materials.iter().position(|m| *m == material) {
            return index;
        }
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn add_texture(&mut self, file_name: &str, usage: RawTextureUsage) -> usize {
        if let Some(index) = self
            .textures
            .iter()
            .position(|t| t.file_name == file_name && t.usage == usage)
        {
            return index;
        }
        self.textures.push(RawTexture {
            file_name: file_name.to_string(),
            usage,
        });
        self.textures.len() - 1
    }

    /// Adds a node and links it into its parent's children.
    pub fn add_node(&mut self, node: RawNode) -> usize {
        if let Some(index) = self.node_lookup.get(&node.id) {
            return *index;
        }
        if let Some(parent_index) = node.parent_id.and_then(|id| self.node_lookup.get(&id).copied()) {
            let parent = &mut self.nodes[parent_index];
            if !parent.child_ids.contains(&node.id) {
                parent.child_ids.push(node.id);
            }
        }
        let index = self.nodes.len();
        self.node_lookup.insert(node.id, index);
        self.nodes.push(node);
        index
    }

    pub fn set_root_node(&mut self, id: NodeId) {
        self.root_node_id = Some(id);
    }

    pub fn root_node_id(&self) -> Option<NodeId> {
        self.root_node_id
    }

    /// Applies every transform, in order, to both UV channels of every vertex.
    pub fn transform_textures(&mut self, transforms: &[UvTransform]) {
        if transforms.is_empty() {
            return;
        }
        for vertex in &mut self.vertices {
            for transform in transforms {
                vertex.uv0 = transform(vertex.uv0);
                vertex.uv1 = transform(vertex.uv1);
            }
        }
        self.rebuild_vertex_lookup();
    }

    fn rebuild_vertex_lookup(&mut self) {
        self.vertex_lookup = self
            .vertices
            .iter()
            .enumerate()
            .map(|(i, v)| (v.key(), i as u32))
            .collect();
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertex(&self, index: usize) -> &RawVertex {
        &self.vertices[index]
    }

    pub fn vertices(&self) -> &[RawVertex] {
        &self.vertices
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn triangle(&self, index: usize) -> &RawTriangle {
        &self.triangles[index]
    }

    pub fn triangles(&self) -> &[RawTriangle] {
        &self.triangles
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn surface(&self, index: usize) -> &RawSurface {
        &self.surfaces[index]
    }

    pub fn surfaces(&self) -> &[RawSurface] {
        &self.surfaces
    }

    pub fn surface_by_id(&self, id: SurfaceId) -> Option<usize> {
        self.surface_lookup.get(&id).copied()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn material(&self, index: usize) -> &RawMaterial {
        &self.materials[index]
    }

    pub fn materials(&self) -> &[RawMaterial] {
        &self.materials
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn texture(&self, index: usize) -> &RawTexture {
        &self.textures[index]
    }

    pub fn textures(&self) -> &[RawTexture] {
        &self.textures
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, index: usize) -> &RawNode {
        &self.nodes[index]
    }

    pub fn node_mut(&mut self, index: usize) -> &mut RawNode {
        &mut self.nodes[index]
    }

    pub fn nodes(&self) -> &[RawNode] {
        &self.nodes
    }

    pub fn node_by_id(&self, id: NodeId) -> Option<usize> {
        self.node_lookup.get(&id).copied()
    }

    /// Walks parent links starting at `id`, yielding the node itself first.
    pub fn ancestry(&self, id: NodeId) -> impl Iterator<Item = &RawNode> + '_ {
        let mut next = self.node_by_id(id);
        let mut remaining = self.nodes.len();
        std::iter::from_fn(move || {
            // a malformed parent cycle would never reach the root
            if remaining == 0 {
                return None;
            }
            remaining -= 1;
            let node = &self.nodes[next?];
            next = node.parent_id.and_then(|parent| self.node_by_id(parent));
            Some(node)
        })
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};

    use super::*;

    fn vertex_at(x: f32, y: f32, z: f32) -> RawVertex {
        RawVertex {
            position: Vec3::new(x, y, z),
            ..Default::default()
        }
    }

    #[test]
    fn identical_vertices_are_shared() {
        let mut raw = RawModel::new();
        let a = raw.add_vertex(vertex_at(0.0, 0.0, 0.0));
        let b = raw.add_vertex(vertex_at(1.0, 0.0, 0.0));
        let c = raw.add_vertex(vertex_at(0.0, 0.0, 0.0));
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(raw.vertex_count(), 2);
    }

    #[test]
    fn nodes_link_to_parents() {
        let mut raw = RawModel::new();
        raw.add_node(RawNode::new(10, "root", None));
        raw.add_node(RawNode::new(11, "child", Some(10)));
        raw.add_node(RawNode::new(12, "grandchild", Some(11)));
        raw.set_root_node(10);

        let root = raw.node(raw.node_by_id(10).unwrap());
        assert_eq!(root.child_ids, vec![11]);
        let names: Vec<_> = raw.ancestry(12).map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["grandchild", "child", "root"]);
        assert!(raw.node_by_id(99).is_none());
    }

    #[test]
    fn ancestry_stops_on_cycles() {
        let mut raw = RawModel::new();
        raw.add_node(RawNode::new(1, "a", Some(2)));
        raw.add_node(RawNode::new(2, "b", Some(1)));
        assert_eq!(raw.ancestry(1).count(), 2);
    }

    #[test]
    fn uv_transforms_apply_in_order() {
        let mut raw = RawModel::new();
        raw.add_vertex(RawVertex {
            uv0: Vec2::new(0.25, 0.25),
            uv1: Vec2::new(0.0, 1.0),
            ..Default::default()
        });
        raw.transform_textures(&[flip_u, flip_v]);
        assert_eq!(raw.vertex(0).uv0, Vec2::new(0.75, 0.75));
        assert_eq!(raw.vertex(0).uv1, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn textures_and_materials_are_deduplicated() {
        let mut raw = RawModel::new();
        let t0 = raw.add_texture("a/b.png", RawTextureUsage::Albedo);
        let t1 = raw.add_texture("a/b.png", RawTextureUsage::Albedo);
        assert_eq!(t0, t1);

        let mut material = RawMaterial::new("m", RawMaterialType::Opaque, RawShadingModel::PbrMetRough);
        material.set_texture(RawTextureUsage::Albedo, t0);
        assert_eq!(raw.add_material(material.clone()), raw.add_material(material));
        assert_eq!(raw.material_count(), 1);
    }
}
