use std::collections::HashMap;

use super::{RawModel, RawTriangle};

impl RawModel {
    /// Splits the model into one sub-model per (material, surface) pair that owns
    /// at least one triangle.
    ///
    /// Opaque materials come first, then transparent ones; within each group
    /// triangles are ordered by material, surface and first vertex. Each sub-model
    /// holds exactly one surface and one material, its vertices in first-use
    /// order, and the attribute bitset of `self`. The returned order is the submesh
    /// order of the exported mesh file.
    pub fn create_material_models(&self) -> Vec<RawModel> {
        let mut sorted: Vec<&RawTriangle> = self.triangles.iter().collect();
        sorted.sort_by_key(|t| {
            (
                self.materials[t.material_index].material_type.is_transparent(),
                t.material_index,
                t.surface_index,
                t.verts[0],
            )
        });

        let mut models: Vec<RawModel> = vec![];
        let mut local_index = HashMap::<u32, u32>::new();
        let mut previous: Option<&RawTriangle> = None;

        for triangle in sorted {
            let starts_new = match previous {
                None => true,
                Some(p) => {
                    p.material_index != triangle.material_index
                        || p.surface_index != triangle.surface_index
                }
            };
            if starts_new {
                let mut model = RawModel::new();
                model.vertex_attributes = self.vertex_attributes;
                model.add_material(self.materials[triangle.material_index].clone());
                let mut surface = self.surfaces[triangle.surface_index].clone();
                surface.bounds = Default::default();
                model.add_surface(surface);
                models.push(model);
                local_index.clear();
            }
            previous = Some(triangle);

            let Some(model) = models.last_mut() else {
                continue;
            };
            let mut verts = [0u32; 3];
            for (local, global) in verts.iter_mut().zip(triangle.verts.iter()) {
                *local = *local_index.entry(*global).or_insert_with(|| {
                    let vertex = self.vertices[*global as usize];
                    model.surfaces[0].bounds.add_point(vertex.position);
                    model.vertices.push(vertex);
                    (model.vertices.len() - 1) as u32
                });
            }
            model.add_triangle(verts[0], verts[1], verts[2], 0, 0);
        }

        models
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use crate::raw::*;

    fn vertex_at(x: f32, y: f32, z: f32) -> RawVertex {
        RawVertex {
            position: Vec3::new(x, y, z),
            ..Default::default()
        }
    }

    fn two_material_quad() -> RawModel {
        let mut raw = RawModel::new();
        raw.add_vertex_attributes(VertexAttributes::POSITION);
        let surface = raw.add_surface(RawSurface::new(7, "quad", 1));
        let glass = raw.add_material(RawMaterial::new(
            "glass",
            RawMaterialType::Transparent,
            RawShadingModel::Phong,
        ));
        let stone = raw.add_material(RawMaterial::new(
            "stone",
            RawMaterialType::Opaque,
            RawShadingModel::Phong,
        ));
        let a = raw.add_vertex(vertex_at(0.0, 0.0, 0.0));
        let b = raw.add_vertex(vertex_at(1.0, 0.0, 0.0));
        let c = raw.add_vertex(vertex_at(1.0, 1.0, 0.0));
        let d = raw.add_vertex(vertex_at(0.0, 1.0, 0.0));
        raw.add_triangle(a, b, c, glass, surface);
        raw.add_triangle(a, c, d, stone, surface);
        raw
    }

    #[test]
    fn opaque_partitions_come_first() {
        let raw = two_material_quad();
        let models = raw.create_material_models();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].material(0).name, "stone");
        assert_eq!(models[1].material(0).name, "glass");
    }

    #[test]
    fn partitions_renumber_vertices_locally() {
        let raw = two_material_quad();
        for model in raw.create_material_models() {
            assert_eq!(model.surface_count(), 1);
            assert_eq!(model.material_count(), 1);
            assert_eq!(model.vertex_count(), 3);
            assert_eq!(model.vertex_attributes(), raw.vertex_attributes());
            for triangle in model.triangles() {
                assert!(triangle.verts.iter().all(|v| (*v as usize) < model.vertex_count()));
            }
        }
    }

    #[test]
    fn partition_bounds_cover_only_their_vertices() {
        let raw = two_material_quad();
        let models = raw.create_material_models();
        // stone: a, c, d
        assert_eq!(models[0].surface(0).bounds.min, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(models[0].surface(0).bounds.max, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(models[0].surface(0).id, 7);
    }

    #[test]
    fn model_without_triangles_has_no_partitions() {
        let mut raw = RawModel::new();
        raw.add_surface(RawSurface::new(1, "empty", 1));
        assert!(raw.create_material_models().is_empty());
    }
}
