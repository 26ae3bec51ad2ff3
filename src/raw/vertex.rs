use bitflags::bitflags;
use glam::{Vec2, Vec3, Vec4};

bitflags! {
    /// Vertex attributes present on every vertex of a raw model.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct VertexAttributes: u32 {
        const POSITION = 1 << 0;
        const NORMAL = 1 << 1;
        const BINORMAL = 1 << 3;
        const COLOR = 1 << 4;
        const UV0 = 1 << 5;
        const UV1 = 1 << 6;
        const JOINT_INDICES = 1 << 7;
        const JOINT_WEIGHTS = 1 << 8;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub binormal: Vec3,
    pub color: Vec4,
    pub uv0: Vec2,
    pub uv1: Vec2,
    /// Joint indices are carried as floats; that is also how they are written.
    pub joint_indices: Vec4,
    pub joint_weights: Vec4,
}

impl Default for RawVertex {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            normal: Vec3::ZERO,
            binormal: Vec3::ZERO,
            color: Vec4::ZERO,
            uv0: Vec2::ZERO,
            uv1: Vec2::ZERO,
            joint_indices: Vec4::ZERO,
            joint_weights: Vec4::ZERO,
        }
    }
}

impl RawVertex {
    /// Bit-exact key used to deduplicate vertices.
    pub(crate) fn key(&self) -> [u32; 25] {
        let floats: [f32; 25] = [
            self.position.x,
            self.position.y,
            self.position.z,
            self.normal.x,
            self.normal.y,
            self.normal.z,
            self.binormal.x,
            self.binormal.y,
            self.binormal.z,
            self.color.x,
            self.color.y,
            self.color.z,
            self.color.w,
            self.uv0.x,
            self.uv0.y,
            self.uv1.x,
            self.uv1.y,
            self.joint_indices.x,
            self.joint_indices.y,
            self.joint_indices.z,
            self.joint_indices.w,
            self.joint_weights.x,
            self.joint_weights.y,
            self.joint_weights.z,
            self.joint_weights.w,
        ];
        floats.map(f32::to_bits)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawTriangle {
    pub verts: [u32; 3],
    pub material_index: usize,
    pub surface_index: usize,
}

/// A transform applied to every UV coordinate, e.g. a U or V flip.
pub type UvTransform = fn(Vec2) -> Vec2;

pub fn flip_u(uv: Vec2) -> Vec2 {
    Vec2::new(1.0 - uv.x, uv.y)
}

pub fn flip_v(uv: Vec2) -> Vec2 {
    Vec2::new(uv.x, 1.0 - uv.y)
}
