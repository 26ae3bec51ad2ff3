//! glTF 2.0 (`.gltf` / `.glb`) importer.
//!
//! Node ids are the glTF node index plus one; id 0 is a synthetic `RootNode`
//! parenting every top level node. Every glTF mesh becomes one surface whose id
//! is the mesh index plus one. Images are not decoded, only their file names kept.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use glam::{Quat, Vec2, Vec3, Vec4};
use gltf::material::AlphaMode;
use log::{debug, info, warn};

use super::tangents::generate_tangents_for_mesh;
use super::ImportOptions;
use crate::error::ImportError;
use crate::raw::{
    NodeId, RawMaterial, RawMaterialType, RawModel, RawNode, RawShadingModel, RawSurface, RawTextureUsage,
    RawVertex, VertexAttributes,
};

pub const ROOT_NODE_ID: NodeId = 0;
pub const ROOT_NODE_NAME: &str = "RootNode";
pub const DEFAULT_MATERIAL_NAME: &str = "DefaultMaterial";

pub fn load_gltf(path: &Path, options: &ImportOptions) -> Result<RawModel, ImportError> {
    let gltf = gltf::Gltf::open(path).map_err(|e| ImportError::Gltf(path.to_path_buf(), e))?;
    let buffers = gltf::import_buffers(&gltf.document, path.parent(), gltf.blob.clone())
        .map_err(|e| ImportError::Gltf(path.to_path_buf(), e))?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("scene")
        .to_string();

    let mut builder = SceneBuilder {
        document: &gltf.document,
        buffers: &buffers,
        options,
        stem,
        raw: RawModel::new(),
        materials: HashMap::new(),
        instances: vec![None; gltf.document.meshes().len()],
    };
    builder.add_nodes();
    for mesh in gltf.document.meshes() {
        builder.add_mesh(&mesh);
    }

    let mut raw = builder.raw;
    raw.transform_textures(&options.uv_transforms);
    if raw.triangle_count() == 0 {
        warn!("{} contains no triangles", path.display());
    }
    info!(
        "loaded {}: {} nodes, {} surfaces, {} materials, {} textures, {} vertices, {} triangles",
        path.display(),
        raw.node_count(),
        raw.surface_count(),
        raw.material_count(),
        raw.texture_count(),
        raw.vertex_count(),
        raw.triangle_count()
    );
    Ok(raw)
}

/// The first node instancing a mesh names its surface and places it.
#[derive(Debug, Clone)]
struct MeshInstance {
    node_name: Option<String>,
    skeleton_root_id: NodeId,
    skinned: bool,
}

struct SceneBuilder<'a> {
    document: &'a gltf::Document,
    buffers: &'a [gltf::buffer::Data],
    options: &'a ImportOptions,
    stem: String,
    raw: RawModel,
    materials: HashMap<(Option<usize>, bool), usize>,
    instances: Vec<Option<MeshInstance>>,
}

fn node_id(node: &gltf::Node) -> NodeId {
    node.index() as NodeId + 1
}

fn image_extension(mime_type: Option<&str>) -> &'static str {
    match mime_type {
        Some("image/png") => "png",
        Some("image/jpeg") => "jpg",
        Some("image/bmp") => "bmp",
        _ => "bin",
    }
}

/// Drops `data` when its length does not match the vertex count.
fn matching<T>(name: &str, mesh: &str, data: Option<Vec<T>>, count: usize) -> Option<Vec<T>> {
    match data {
        Some(data) if data.len() == count => Some(data),
        Some(data) => {
            warn!(
                "mesh '{}': {} has {} elements for {} vertices, ignoring it",
                mesh,
                name,
                data.len(),
                count
            );
            None
        }
        None => None,
    }
}

impl SceneBuilder<'_> {
    fn add_nodes(&mut self) {
        self.raw.add_node(RawNode::new(ROOT_NODE_ID, ROOT_NODE_NAME, None));
        self.raw.set_root_node(ROOT_NODE_ID);

        let mut has_parent = vec![false; self.document.nodes().len()];
        for node in self.document.nodes() {
            for child in node.children() {
                has_parent[child.index()] = true;
            }
        }

        let mut visited = HashSet::new();
        let document = self.document;
        for node in document.nodes().filter(|n| !has_parent[n.index()]) {
            self.add_node_tree(&node, ROOT_NODE_ID, &mut visited);
        }
    }

    fn add_node_tree(&mut self, node: &gltf::Node, parent_id: NodeId, visited: &mut HashSet<usize>) {
        if !visited.insert(node.index()) {
            warn!("node {} is reachable twice, keeping the first parent", node.index());
            return;
        }

        let id = node_id(node);
        let name = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node_{}", node.index()));
        let mut raw_node = RawNode::new(id, &name, Some(parent_id));
        let (translation, rotation, scale) = node.transform().decomposed();
        raw_node.translation = Vec3::from(translation);
        raw_node.rotation = Quat::from_array(rotation);
        raw_node.scale = Vec3::from(scale);

        if let Some(mesh) = node.mesh() {
            raw_node.surface_id = Some(mesh.index() as i64 + 1);
            if self.instances[mesh.index()].is_none() {
                let skin = node.skin();
                let skeleton_root_id = skin
                    .as_ref()
                    .and_then(|skin| skin.skeleton().or_else(|| skin.joints().next()))
                    .map(|joint| node_id(&joint))
                    .unwrap_or(id);
                self.instances[mesh.index()] = Some(MeshInstance {
                    node_name: node.name().map(str::to_string),
                    skeleton_root_id,
                    skinned: skin.is_some(),
                });
            }
        }

        debug!("node {} '{}' under {}", id, name, parent_id);
        self.raw.add_node(raw_node);

        for child in node.children() {
            self.add_node_tree(&child, id, visited);
        }
    }

    fn texture_file_name(&self, texture: &gltf::Texture) -> String {
        let image = texture.source();
        match image.source() {
            gltf::image::Source::Uri { uri, mime_type } if uri.starts_with("data:") => {
                let mime = mime_type.or_else(|| {
                    uri.strip_prefix("data:")
                        .and_then(|rest| rest.split(';').next())
                });
                format!("{}_image{}.{}", self.stem, image.index(), image_extension(mime))
            }
            gltf::image::Source::Uri { uri, .. } => uri.to_string(),
            gltf::image::Source::View { mime_type, .. } => {
                format!("{}_image{}.{}", self.stem, image.index(), image_extension(Some(mime_type)))
            }
        }
    }

    fn add_texture(&mut self, material: &mut RawMaterial, texture: &gltf::Texture, usages: &[RawTextureUsage]) {
        let file_name = self.texture_file_name(texture);
        if !self.options.allows_texture(&file_name) {
            warn!(
                "material '{}': texture '{}' does not have an allowed extension ({}), skipping it",
                material.name,
                file_name,
                self.options.texture_extensions.join(";")
            );
            return;
        }
        for usage in usages {
            let index = self.raw.add_texture(&file_name, *usage);
            material.set_texture(*usage, index);
        }
    }

    fn material_index(&mut self, material: &gltf::Material, skinned: bool) -> usize {
        let key = (material.index(), skinned);
        if let Some(index) = self.materials.get(&key) {
            return *index;
        }

        let raw_material = match material.index() {
            None => RawMaterial::new(
                DEFAULT_MATERIAL_NAME,
                RawMaterialType::new(false, skinned),
                RawShadingModel::Lambert,
            ),
            Some(index) => {
                let name = material
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("material_{}", index));
                let transparent = material.alpha_mode() == AlphaMode::Blend;
                let mut raw_material = RawMaterial::new(
                    &name,
                    RawMaterialType::new(transparent, skinned),
                    RawShadingModel::PbrMetRough,
                );
                let pbr = material.pbr_metallic_roughness();
                if let Some(info) = pbr.base_color_texture() {
                    self.add_texture(&mut raw_material, &info.texture(), &[RawTextureUsage::Albedo]);
                }
                if let Some(normal) = material.normal_texture() {
                    self.add_texture(&mut raw_material, &normal.texture(), &[RawTextureUsage::Normal]);
                }
                if let Some(info) = material.emissive_texture() {
                    self.add_texture(&mut raw_material, &info.texture(), &[RawTextureUsage::Emissive]);
                }
                if let Some(occlusion) = material.occlusion_texture() {
                    self.add_texture(&mut raw_material, &occlusion.texture(), &[RawTextureUsage::Occlusion]);
                }
                if let Some(info) = pbr.metallic_roughness_texture() {
                    self.add_texture(
                        &mut raw_material,
                        &info.texture(),
                        &[RawTextureUsage::Roughness, RawTextureUsage::Metallic],
                    );
                }
                raw_material
            }
        };

        let index = self.raw.add_material(raw_material);
        self.materials.insert(key, index);
        index
    }

    fn add_mesh(&mut self, mesh: &gltf::Mesh) {
        let instance = self.instances[mesh.index()].clone();
        let surface_name = instance
            .as_ref()
            .and_then(|i| i.node_name.clone())
            .or_else(|| mesh.name().map(str::to_string))
            .unwrap_or_else(|| format!("mesh_{}", mesh.index()));
        let skeleton_root_id = instance.as_ref().map_or(ROOT_NODE_ID, |i| i.skeleton_root_id);
        let node_skinned = instance.as_ref().is_some_and(|i| i.skinned);

        let surface = self.raw.add_surface(RawSurface::new(
            mesh.index() as i64 + 1,
            &surface_name,
            skeleton_root_id,
        ));
        debug!(
            "mesh {} '{}': {} primitives",
            mesh.index(),
            surface_name,
            mesh.primitives().len()
        );

        for primitive in mesh.primitives() {
            self.add_primitive(&primitive, &surface_name, surface, node_skinned);
        }
    }

    fn add_primitive(&mut self, primitive: &gltf::Primitive, mesh_name: &str, surface: usize, node_skinned: bool) {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            warn!(
                "mesh '{}' primitive {}: {:?} topology is not supported, skipping it",
                mesh_name,
                primitive.index(),
                primitive.mode()
            );
            return;
        }

        let buffers = self.buffers;
        let reader = primitive.reader(move |buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));

        let Some(positions) = reader
            .read_positions()
            .map(|iter| iter.map(Vec3::from).collect::<Vec<_>>())
        else {
            warn!(
                "mesh '{}' primitive {} has no positions, skipping it",
                mesh_name,
                primitive.index()
            );
            return;
        };
        let count = positions.len();

        let indices: Vec<u32> = reader
            .read_indices()
            .map(|iter| iter.into_u32().collect())
            .unwrap_or_else(|| (0..count as u32).collect());
        if indices.len() % 3 != 0 {
            warn!(
                "mesh '{}' primitive {}: {} indices is not a multiple of 3, skipping it",
                mesh_name,
                primitive.index(),
                indices.len()
            );
            return;
        }
        if indices.iter().any(|i| *i as usize >= count) {
            warn!(
                "mesh '{}' primitive {} has indices outside of its {} vertices, skipping it",
                mesh_name,
                primitive.index(),
                count
            );
            return;
        }

        let normals: Option<Vec<Vec3>> = matching(
            "NORMAL",
            mesh_name,
            reader.read_normals().map(|iter| iter.map(Vec3::from).collect()),
            count,
        );
        let mut tangents: Option<Vec<Vec4>> = matching(
            "TANGENT",
            mesh_name,
            reader.read_tangents().map(|iter| iter.map(Vec4::from).collect()),
            count,
        );
        let colors: Option<Vec<Vec4>> = matching(
            "COLOR_0",
            mesh_name,
            reader
                .read_colors(0)
                .map(|colors| colors.into_rgba_f32().map(Vec4::from).collect()),
            count,
        );
        let uv0: Option<Vec<Vec2>> = matching(
            "TEXCOORD_0",
            mesh_name,
            reader
                .read_tex_coords(0)
                .map(|uvs| uvs.into_f32().map(Vec2::from).collect()),
            count,
        );
        let uv1: Option<Vec<Vec2>> = matching(
            "TEXCOORD_1",
            mesh_name,
            reader
                .read_tex_coords(1)
                .map(|uvs| uvs.into_f32().map(Vec2::from).collect()),
            count,
        );
        let joints: Option<Vec<Vec4>> = matching(
            "JOINTS_0",
            mesh_name,
            reader
                .read_joints(0)
                .map(|joints| joints.into_u16().map(|j| Vec4::from(j.map(f32::from))).collect()),
            count,
        );
        let weights: Option<Vec<Vec4>> = matching(
            "WEIGHTS_0",
            mesh_name,
            reader
                .read_weights(0)
                .map(|weights| weights.into_f32().map(Vec4::from).collect()),
            count,
        );

        let material = primitive.material();
        if tangents.is_none() && material.normal_texture().is_some() {
            if let (Some(normals), Some(uvs)) = (&normals, &uv0) {
                match generate_tangents_for_mesh(&positions, normals, uvs, &indices) {
                    Ok(generated) => tangents = Some(generated),
                    Err(e) => warn!("mesh '{}': {}", mesh_name, e),
                }
            }
        }
        let binormals: Option<Vec<Vec3>> = match (&normals, &tangents) {
            (Some(normals), Some(tangents)) => Some(
                normals
                    .iter()
                    .zip(tangents)
                    .map(|(n, t)| n.cross(t.truncate()) * t.w)
                    .collect(),
            ),
            _ => None,
        };

        let skinned = node_skinned && joints.is_some() && weights.is_some();
        let material_index = self.material_index(&material, skinned);

        let mut attributes = VertexAttributes::POSITION;
        attributes.set(VertexAttributes::NORMAL, normals.is_some());
        attributes.set(VertexAttributes::BINORMAL, binormals.is_some());
        attributes.set(VertexAttributes::COLOR, colors.is_some());
        attributes.set(VertexAttributes::UV0, uv0.is_some());
        attributes.set(VertexAttributes::UV1, uv1.is_some());
        attributes.set(VertexAttributes::JOINT_INDICES, joints.is_some());
        attributes.set(VertexAttributes::JOINT_WEIGHTS, weights.is_some());
        self.raw.add_vertex_attributes(attributes);

        let mut vertex_indices = Vec::with_capacity(count);
        for i in 0..count {
            let mut vertex = RawVertex {
                position: positions[i],
                ..Default::default()
            };
            if let Some(normals) = &normals {
                vertex.normal = normals[i];
            }
            if let Some(binormals) = &binormals {
                vertex.binormal = binormals[i];
            }
            if let Some(colors) = &colors {
                vertex.color = colors[i];
            }
            if let Some(uv0) = &uv0 {
                vertex.uv0 = uv0[i];
            }
            if let Some(uv1) = &uv1 {
                vertex.uv1 = uv1[i];
            }
            if let Some(joints) = &joints {
                vertex.joint_indices = joints[i];
            }
            if let Some(weights) = &weights {
                vertex.joint_weights = weights[i];
            }
            vertex_indices.push(self.raw.add_vertex(vertex));
        }

        for triangle in indices.chunks_exact(3) {
            self.raw.add_triangle(
                vertex_indices[triangle[0] as usize],
                vertex_indices[triangle[1] as usize],
                vertex_indices[triangle[2] as usize],
                material_index,
                surface,
            );
        }
    }
}
