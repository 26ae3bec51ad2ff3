//! Packed vertex layout of the mesh file.
//!
//! Attributes are written in a fixed order, each only when its bit is set:
//! position, normal, binormal, color (rgb, alpha dropped), uv0, uv1,
//! joint indices (as floats), joint weights.

use crate::raw::{RawVertex, VertexAttributes};

/// Canonical attribute order with the byte size each occupies in a packed vertex.
pub const ATTRIBUTE_LAYOUT: [(VertexAttributes, u32); 8] = [
    (VertexAttributes::POSITION, 12),
    (VertexAttributes::NORMAL, 12),
    (VertexAttributes::BINORMAL, 12),
    (VertexAttributes::COLOR, 12),
    (VertexAttributes::UV0, 8),
    (VertexAttributes::UV1, 8),
    (VertexAttributes::JOINT_INDICES, 16),
    (VertexAttributes::JOINT_WEIGHTS, 16),
];

pub fn vertex_stride(attributes: VertexAttributes) -> u32 {
    ATTRIBUTE_LAYOUT
        .iter()
        .filter(|(attribute, _)| attributes.contains(*attribute))
        .map(|(_, size)| size)
        .sum()
}

fn push_floats(out: &mut Vec<u8>, floats: &[f32]) {
    for f in floats {
        out.extend_from_slice(&f.to_le_bytes());
    }
}

/// Appends `vertex` to `out` using the packed layout for `attributes`.
pub fn write_vertex(attributes: VertexAttributes, vertex: &RawVertex, out: &mut Vec<u8>) {
    if attributes.contains(VertexAttributes::POSITION) {
        push_floats(out, &vertex.position.to_array());
    }
    if attributes.contains(VertexAttributes::NORMAL) {
        push_floats(out, &vertex.normal.to_array());
    }
    if attributes.contains(VertexAttributes::BINORMAL) {
        push_floats(out, &vertex.binormal.to_array());
    }
    if attributes.contains(VertexAttributes::COLOR) {
        push_floats(out, &vertex.color.truncate().to_array());
    }
    if attributes.contains(VertexAttributes::UV0) {
        push_floats(out, &vertex.uv0.to_array());
    }
    if attributes.contains(VertexAttributes::UV1) {
        push_floats(out, &vertex.uv1.to_array());
    }
    if attributes.contains(VertexAttributes::JOINT_INDICES) {
        push_floats(out, &vertex.joint_indices.to_array());
    }
    if attributes.contains(VertexAttributes::JOINT_WEIGHTS) {
        push_floats(out, &vertex.joint_weights.to_array());
    }
}

pub fn write_vertices(attributes: VertexAttributes, vertices: &[RawVertex], out: &mut Vec<u8>) {
    out.reserve(vertices.len() * vertex_stride(attributes) as usize);
    for vertex in vertices {
        write_vertex(attributes, vertex, out);
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3, Vec4};

    use super::*;

    fn read_f32s(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn stride_sums_enabled_attributes() {
        assert_eq!(vertex_stride(VertexAttributes::empty()), 0);
        assert_eq!(
            vertex_stride(VertexAttributes::POSITION | VertexAttributes::NORMAL | VertexAttributes::UV0),
            32
        );
        assert_eq!(vertex_stride(VertexAttributes::COLOR), 12);
        assert_eq!(vertex_stride(VertexAttributes::all()), 96);
    }

    #[test]
    fn stride_matches_written_bytes_for_every_combination() {
        let vertex = RawVertex::default();
        for bits in 0..(1u32 << 9) {
            let attributes = VertexAttributes::from_bits_truncate(bits);
            let mut out = vec![];
            write_vertex(attributes, &vertex, &mut out);
            assert_eq!(out.len() as u32, vertex_stride(attributes));
        }
    }

    #[test]
    fn color_alpha_is_dropped() {
        let vertex = RawVertex {
            color: Vec4::new(0.1, 0.2, 0.3, 0.4),
            ..Default::default()
        };
        let mut out = vec![];
        write_vertex(VertexAttributes::COLOR, &vertex, &mut out);
        assert_eq!(read_f32s(&out), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn attributes_follow_canonical_order() {
        let vertex = RawVertex {
            position: Vec3::new(1.0, 2.0, 3.0),
            uv0: Vec2::new(4.0, 5.0),
            joint_indices: Vec4::new(6.0, 7.0, 8.0, 9.0),
            joint_weights: Vec4::new(0.5, 0.25, 0.25, 0.0),
            ..Default::default()
        };
        let attributes = VertexAttributes::JOINT_WEIGHTS
            | VertexAttributes::UV0
            | VertexAttributes::POSITION
            | VertexAttributes::JOINT_INDICES;
        let mut out = vec![];
        write_vertex(attributes, &vertex, &mut out);
        assert_eq!(
            read_f32s(&out),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 0.5, 0.25, 0.25, 0.0]
        );
    }
}
