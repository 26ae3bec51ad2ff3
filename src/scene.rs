//! Scene graph XML.
//!
//! ```xml
//! <Mesh mesh="Scene.mesh">
//!   <Node name="RootNode" translation="0 0 0" rotation="0 0 0 1" scale="1 1 1">
//!     <Draw index="0" name="Cube" material="Stone.material" mask="4294967295" />
//!     <Node ...>
//!   </Node>
//! </Mesh>
//! ```
//!
//! A LOD group node keeps its LOD children out of the tree and draws them itself,
//! tagging each `Draw` with the LOD index found in the child's name.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use log::warn;
use xmltree::Element;

use crate::error::{ExportError, StructuralWarning};
use crate::material::{element_with, material_file_name, push_child, save_xml};
use crate::raw::{NodeId, RawModel, RawNode, SurfaceId};

pub const DRAW_MASK: u32 = u32::MAX;
pub const LOD_GROUP_TAG: &str = "_LODGroup";
pub const MAX_LOD: usize = 8;
const LOD_EPSILON: f32 = 1e-4;

/// Submeshes drawn for a surface: (submesh index in the mesh file, material file name).
pub type SurfaceMap = HashMap<SurfaceId, Vec<(u32, String)>>;

/// Maps each surface to its partitions, in partition order. `partitions` must be
/// the output of `create_material_models` so the indices match the mesh file.
pub fn surface_map(partitions: &[RawModel]) -> SurfaceMap {
    let mut map = SurfaceMap::new();
    for (index, partition) in partitions.iter().enumerate() {
        map.entry(partition.surface(0).id)
            .or_default()
            .push((index as u32, material_file_name(partition.material(0))));
    }
    map
}

/// First `k` in `0..MAX_LOD` for which `name` contains `_LOD<k>`.
pub fn lod_index(name: &str) -> Option<usize> {
    (0..MAX_LOD).find(|k| name.contains(&format!("_LOD{}", k)))
}

/// Depends only on the node's name and its direct children.
pub fn is_lod_group(raw: &RawModel, node: &RawNode) -> bool {
    if !node.name.contains(LOD_GROUP_TAG) || node.child_ids.is_empty() {
        return false;
    }
    node.child_ids.iter().all(|id| match raw.node_by_id(*id) {
        Some(index) => {
            let child = raw.node(index);
            child.child_ids.is_empty() && child.has_identity_transform(LOD_EPSILON)
        }
        None => false,
    })
}

fn join_floats(values: &[f32]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

struct SceneWriter<'a> {
    raw: &'a RawModel,
    surfaces: &'a SurfaceMap,
    visited: HashSet<NodeId>,
    warnings: Vec<StructuralWarning>,
}

impl<'a> SceneWriter<'a> {
    fn warn(&mut self, node: &RawNode, message: String) {
        let warning = StructuralWarning {
            node: node.name.clone(),
            message,
        };
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    fn push_draws(&mut self, parent: &mut Element, node: &RawNode, lod: Option<usize>) {
        let Some(surface_id) = node.surface_id else {
            return;
        };
        let Some(surface_index) = self.raw.surface_by_id(surface_id) else {
            self.warn(node, format!("surface {} does not exist", surface_id));
            return;
        };
        let Some(draws) = self.surfaces.get(&surface_id) else {
            self.warn(node, format!("surface {} has no triangles", surface_id));
            return;
        };
        let name = &self.raw.surface(surface_index).name;
        for (index, material) in draws {
            let mut attributes = vec![
                ("index", index.to_string()),
                ("name", name.clone()),
                ("material", material.clone()),
                ("mask", DRAW_MASK.to_string()),
            ];
            if let Some(lod) = lod {
                attributes.push(("lod", lod.to_string()));
            }
            push_child(parent, element_with("Draw", &attributes));
        }
    }

    fn node_element(&mut self, node: &RawNode) -> Element {
        let raw = self.raw;
        let r = node.rotation;
        let mut element = element_with(
            "Node",
            &[
                ("name", node.name.clone()),
                ("translation", join_floats(&node.translation.to_array())),
                ("rotation", join_floats(&[r.x, r.y, r.z, r.w])),
                ("scale", join_floats(&node.scale.to_array())),
            ],
        );
        self.push_draws(&mut element, node, None);

        if is_lod_group(raw, node) {
            for id in &node.child_ids {
                if let Some(index) = raw.node_by_id(*id) {
                    let child = raw.node(index);
                    self.visited.insert(child.id);
                    self.push_draws(&mut element, child, lod_index(&child.name));
                }
            }
            return element;
        }

        for id in &node.child_ids {
            let Some(index) = raw.node_by_id(*id) else {
                self.warn(node, format!("child {} does not exist", id));
                continue;
            };
            let child = raw.node(index);
            if !self.visited.insert(child.id) {
                self.warn(node, format!("child {} was already visited", id));
                continue;
            }
            let child_element = self.node_element(child);
            push_child(&mut element, child_element);
        }
        element
    }
}

/// Builds the scene tree for `raw`, returning it with the warnings collected on the way.
pub fn scene_element(
    raw: &RawModel,
    mesh_file_name: &str,
    surfaces: &SurfaceMap,
) -> (Element, Vec<StructuralWarning>) {
    let mut root = element_with("Mesh", &[("mesh", mesh_file_name.to_string())]);
    let mut writer = SceneWriter {
        raw,
        surfaces,
        visited: HashSet::new(),
        warnings: vec![],
    };

    match raw.root_node_id().and_then(|id| raw.node_by_id(id)) {
        Some(index) => {
            let node = raw.node(index);
            writer.visited.insert(node.id);
            let element = writer.node_element(node);
            push_child(&mut root, element);
        }
        None => {
            let warning = StructuralWarning {
                node: String::new(),
                message: format!("root node {:?} does not exist", raw.root_node_id()),
            };
            warn!("{}", warning);
            writer.warnings.push(warning);
        }
    }

    (root, writer.warnings)
}

pub fn write_scene(
    path: &Path,
    raw: &RawModel,
    mesh_file_name: &str,
    surfaces: &SurfaceMap,
) -> Result<Vec<StructuralWarning>, ExportError> {
    let (root, warnings) = scene_element(raw, mesh_file_name, surfaces);
    save_xml(&root, path)?;
    Ok(warnings)
}
