use glam::{Mat4, Quat, Vec3};

pub type NodeId = i64;
pub type SurfaceId = i64;

#[derive(Debug, Clone, PartialEq)]
pub struct RawNode {
    pub id: NodeId,
    pub name: String,
    /// `None` for the root of the forest.
    pub parent_id: Option<NodeId>,
    pub child_ids: Vec<NodeId>,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    /// `None` when the node carries no surface.
    pub surface_id: Option<SurfaceId>,
}

impl RawNode {
    pub fn new(id: NodeId, name: &str, parent_id: Option<NodeId>) -> Self {
        Self {
            id,
            name: name.to_string(),
            parent_id,
            child_ids: vec![],
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            surface_id: None,
        }
    }

    /// `translate * rotate * scale`
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.translation)
            * Mat4::from_quat(self.rotation)
            * Mat4::from_scale(self.scale)
    }

    pub fn has_identity_transform(&self, epsilon: f32) -> bool {
        let r = self.rotation;
        (self.scale - Vec3::ONE).abs().max_element() <= epsilon
            && self.translation.abs().max_element() <= epsilon
            && (r.w - 1.0).abs() <= epsilon
            && r.x.abs() <= epsilon
            && r.y.abs() <= epsilon
            && r.z.abs() <= epsilon
    }
}

/// Axis aligned bounds. An empty box has `min = +inf` and `max = -inf`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Bounds {
    pub const EMPTY: Bounds = Bounds {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn add_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        let mut bounds = Bounds::EMPTY;
        for p in points {
            bounds.add_point(*p);
        }
        bounds
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn contains(&self, p: Vec3) -> bool {
        self.min.cmple(p).all() && p.cmple(self.max).all()
    }
}
