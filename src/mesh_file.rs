//! Binary mesh container.
//!
//! ```text
//! MeshHeader
//! SubMeshHeader[num_submeshes]
//! u32 indices of every submesh, already offset into the shared vertex block
//! packed vertices of every submesh
//! ```
//!
//! Every value, headers included, is a 4 byte little-endian word regardless of
//! the host, so every region stays 4 byte aligned without padding.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::codec::{vertex_stride, write_vertices};
use crate::error::ExportError;
use crate::raw::{Bounds, VertexAttributes};
use crate::submesh::Submesh;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshHeader {
    /// `VertexAttributes` bits.
    pub format: u32,
    pub num_submeshes: u32,
    pub index_buffer_size: u32,
    pub index_buffer_offset: u32,
    pub vertex_buffer_size: u32,
    pub vertex_buffer_offset: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SubMeshHeader {
    pub min: [f32; 3],
    pub max: [f32; 3],
    /// Always 0: indices in the file are already offset by the vertices of earlier submeshes.
    pub base_vertex: u32,
    /// In indices, not bytes.
    pub first_index: u32,
    pub index_count: u32,
}

pub const MESH_HEADER_SIZE: usize = std::mem::size_of::<MeshHeader>();
pub const SUBMESH_HEADER_SIZE: usize = std::mem::size_of::<SubMeshHeader>();

impl SubMeshHeader {
    pub fn bounds(&self) -> Bounds {
        Bounds {
            min: self.min.into(),
            max: self.max.into(),
        }
    }
}

/// Header fields are u32 words; anything that does not fit is rejected instead of wrapped.
fn header_word(value: usize, what: &'static str) -> Result<u32, ExportError> {
    u32::try_from(value).map_err(|_| ExportError::MeshTooLarge { what, value })
}

fn push_words(out: &mut Vec<u8>, words: &[u32]) {
    for word in words {
        out.extend_from_slice(&word.to_le_bytes());
    }
}

fn read_words(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Serializes `submeshes`, in order, into one mesh file image.
pub fn assemble_mesh(attributes: VertexAttributes, submeshes: &[Submesh]) -> Result<Vec<u8>, ExportError> {
    let stride = vertex_stride(attributes) as usize;
    let index_count: usize = submeshes.iter().map(|s| s.indices.len()).sum();
    let vertex_count: usize = submeshes.iter().map(|s| s.vertices.len()).sum();

    let index_buffer_offset = MESH_HEADER_SIZE + submeshes.len() * SUBMESH_HEADER_SIZE;
    let index_buffer_size = index_count * 4;
    let vertex_buffer_size = vertex_count * stride;

    // indices are offset by at most the total vertex count
    header_word(vertex_count, "vertex count")?;
    let header = MeshHeader {
        format: attributes.bits(),
        num_submeshes: header_word(submeshes.len(), "submesh count")?,
        index_buffer_size: header_word(index_buffer_size, "index buffer size")?,
        index_buffer_offset: header_word(index_buffer_offset, "index buffer offset")?,
        vertex_buffer_size: header_word(vertex_buffer_size, "vertex buffer size")?,
        vertex_buffer_offset: header_word(index_buffer_offset + index_buffer_size, "vertex buffer offset")?,
    };

    let mut submesh_headers = Vec::with_capacity(submeshes.len());
    let mut indices: Vec<u32> = Vec::with_capacity(index_count);
    let mut vertex_bytes: Vec<u8> = Vec::with_capacity(vertex_buffer_size);
    let mut base_vertex = 0u32;

    for submesh in submeshes {
        submesh_headers.push(SubMeshHeader {
            min: submesh.bounds.min.to_array(),
            max: submesh.bounds.max.to_array(),
            base_vertex: 0,
            first_index: indices.len() as u32,
            index_count: submesh.indices.len() as u32,
        });
        indices.extend(submesh.indices.iter().map(|i| i + base_vertex));
        write_vertices(attributes, &submesh.vertices, &mut vertex_bytes);
        base_vertex += submesh.vertices.len() as u32;
    }

    let mut out = Vec::with_capacity(header.vertex_buffer_offset as usize + vertex_buffer_size);
    push_words(&mut out, bytemuck::cast_slice(std::slice::from_ref(&header)));
    push_words(&mut out, bytemuck::cast_slice(&submesh_headers));
    push_words(&mut out, &indices);
    out.extend_from_slice(&vertex_bytes);
    Ok(out)
}

pub fn write_mesh(path: &Path, attributes: VertexAttributes, submeshes: &[Submesh]) -> Result<(), ExportError> {
    let bytes = assemble_mesh(attributes, submeshes)?;
    let mut file = File::create(path).map_err(|e| ExportError::OutputOpen(path.to_path_buf(), e))?;
    file.write_all(&bytes)
        .map_err(|e| ExportError::Io(path.to_path_buf(), e))?;
    Ok(())
}

/// A mesh file read back into memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshFile {
    pub header: MeshHeader,
    pub submeshes: Vec<SubMeshHeader>,
    pub indices: Vec<u32>,
    pub vertex_data: Vec<u8>,
}

fn region<'a>(bytes: &'a [u8], offset: usize, size: usize, what: &str) -> Result<&'a [u8], ExportError> {
    offset
        .checked_add(size)
        .and_then(|end| bytes.get(offset..end))
        .ok_or_else(|| {
            ExportError::MalformedMesh(format!(
                "{} at {}..{} is outside of {} bytes",
                what,
                offset,
                offset.saturating_add(size),
                bytes.len()
            ))
        })
}

impl MeshFile {
    pub fn parse(bytes: &[u8]) -> Result<Self, ExportError> {
        let header_words = read_words(region(bytes, 0, MESH_HEADER_SIZE, "header")?);
        let header: MeshHeader = bytemuck::pod_read_unaligned(bytemuck::cast_slice(&header_words));

        let submesh_words = read_words(region(
            bytes,
            MESH_HEADER_SIZE,
            header.num_submeshes as usize * SUBMESH_HEADER_SIZE,
            "submesh headers",
        )?);
        let submeshes = bytemuck::cast_slice::<u32, u8>(&submesh_words)
            .chunks_exact(SUBMESH_HEADER_SIZE)
            .map(bytemuck::pod_read_unaligned::<SubMeshHeader>)
            .collect();

        if header.index_buffer_size % 4 != 0 {
            return Err(ExportError::MalformedMesh(format!(
                "index buffer size {} is not a multiple of 4",
                header.index_buffer_size
            )));
        }
        let indices = read_words(region(
            bytes,
            header.index_buffer_offset as usize,
            header.index_buffer_size as usize,
            "index buffer",
        )?);

        let vertex_data = region(
            bytes,
            header.vertex_buffer_offset as usize,
            header.vertex_buffer_size as usize,
            "vertex buffer",
        )?
        .to_vec();

        Ok(Self {
            header,
            submeshes,
            indices,
            vertex_data,
        })
    }

    pub fn attributes(&self) -> VertexAttributes {
        VertexAttributes::from_bits_truncate(self.header.format)
    }

    pub fn stride(&self) -> usize {
        vertex_stride(self.attributes()) as usize
    }

    pub fn vertex_count(&self) -> usize {
        match self.stride() {
            0 => 0,
            stride => self.vertex_data.len() / stride,
        }
    }

    /// Floats of vertex `index`, in packed order, or `None` past the last vertex.
    pub fn vertex(&self, index: usize) -> Option<Vec<f32>> {
        let stride = self.stride();
        let start = index.checked_mul(stride)?;
        let bytes = self.vertex_data.get(start..start.checked_add(stride)?)?;
        Some(
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        )
    }

    /// Indices of submesh `submesh`, or `None` if the submesh or its index range does not exist.
    pub fn submesh_indices(&self, submesh: usize) -> Option<&[u32]> {
        let header = self.submeshes.get(submesh)?;
        let first = header.first_index as usize;
        self.indices.get(first..first.checked_add(header.index_count as usize)?)
    }
}
