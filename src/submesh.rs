use glam::{Mat3, Mat4};
use serde::{Deserialize, Serialize};

use crate::optimize::VertexCacheOptimizer;
use crate::raw::{Bounds, RawModel, RawVertex, VertexAttributes};

/// How normals and binormals are moved into world space by the world-space bake.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalTransform {
    /// The same 4x4 affine matrix as positions, translation included.
    /// Not correct under non-uniform scale; kept as the default so output matches
    /// existing assets byte for byte.
    #[default]
    Matrix,
    /// Normals by the inverse transpose, binormals by the linear part, both renormalized.
    InverseTranspose,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submesh {
    pub vertices: Vec<RawVertex>,
    /// Local to `vertices`, three per triangle.
    pub indices: Vec<u32>,
    pub bounds: Bounds,
    pub surface_name: String,
    pub material_name: String,
}

/// Accumulated transform from `node_id` up to the root: starting at identity,
/// each node on the way up is right-multiplied as `translate * rotate * scale`.
pub fn world_matrix(raw: &RawModel, node_id: i64) -> Mat4 {
    raw.ancestry(node_id)
        .fold(Mat4::IDENTITY, |matrix, node| matrix * node.local_matrix())
}

pub fn bake_world_space(
    vertices: &mut [RawVertex],
    attributes: VertexAttributes,
    matrix: &Mat4,
    normal_transform: NormalTransform,
) {
    let linear = Mat3::from_mat4(*matrix);
    let normal_matrix = linear.inverse().transpose();
    for vertex in vertices {
        if attributes.contains(VertexAttributes::POSITION) {
            vertex.position = matrix.project_point3(vertex.position);
        }
        match normal_transform {
            NormalTransform::Matrix => {
                if attributes.contains(VertexAttributes::NORMAL) {
                    vertex.normal = matrix.project_point3(vertex.normal);
                }
                if attributes.contains(VertexAttributes::BINORMAL) {
                    vertex.binormal = matrix.project_point3(vertex.binormal);
                }
            }
            NormalTransform::InverseTranspose => {
                if attributes.contains(VertexAttributes::NORMAL) {
                    vertex.normal = (normal_matrix * vertex.normal).normalize_or_zero();
                }
                if attributes.contains(VertexAttributes::BINORMAL) {
                    vertex.binormal = (linear * vertex.binormal).normalize_or_zero();
                }
            }
        }
    }
}

/// Builds the vertex and index arrays of one material partition.
///
/// `partition` is one of `raw.create_material_models()`; `raw` resolves the node
/// chain of the partition's surface when `world_space` is set.
pub fn build_submesh(
    partition: &RawModel,
    raw: &RawModel,
    optimizer: &dyn VertexCacheOptimizer,
    world_space: bool,
    normal_transform: NormalTransform,
) -> Submesh {
    let mut vertices = partition.vertices().to_vec();
    let mut indices: Vec<u32> = partition
        .triangles()
        .iter()
        .flat_map(|t| t.verts)
        .collect();

    optimizer.optimize(&mut vertices, &mut indices);

    let surface = partition.surface(0);
    if world_space {
        let matrix = world_matrix(raw, surface.skeleton_root_id);
        bake_world_space(&mut vertices, partition.vertex_attributes(), &matrix, normal_transform);
    }

    let bounds = Bounds::from_points(vertices.iter().map(|v| &v.position));

    Submesh {
        vertices,
        indices,
        bounds,
        surface_name: surface.name.clone(),
        material_name: partition.material(0).name.clone(),
    }
}
