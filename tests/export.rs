use std::fs::File;
use std::path::{Path, PathBuf};

use cross_bake::export::{export_all, ExportOptions};
use cross_bake::mesh_file::MeshFile;
use cross_bake::raw::*;
use glam::{Quat, Vec2, Vec3};
use xmltree::Element;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("cross_bake_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn read_mesh(path: &Path) -> MeshFile {
    MeshFile::parse(&std::fs::read(path).unwrap()).unwrap()
}

fn read_xml(path: &Path) -> Element {
    Element::parse(File::open(path).unwrap()).unwrap()
}

fn child_elements<'a>(element: &'a Element, name: &'a str) -> Vec<&'a Element> {
    element
        .children
        .iter()
        .filter_map(|c| c.as_element())
        .filter(|e| e.name == name)
        .collect()
}

fn all_draws(element: &Element, out: &mut Vec<Element>) {
    for child in element.children.iter().filter_map(|c| c.as_element()) {
        if child.name == "Draw" {
            out.push(child.clone());
        }
        all_draws(child, out);
    }
}

fn scene_with_root() -> RawModel {
    let mut raw = RawModel::new();
    raw.add_node(RawNode::new(0, "RootNode", None));
    raw.set_root_node(0);
    raw
}

fn unit_cube() -> RawModel {
    let mut raw = scene_with_root();
    raw.add_vertex_attributes(VertexAttributes::POSITION | VertexAttributes::NORMAL | VertexAttributes::UV0);
    let mut node = RawNode::new(1, "Cube", Some(0));
    node.surface_id = Some(1);
    raw.add_node(node);
    let surface = raw.add_surface(RawSurface::new(1, "Cube", 1));
    let material = raw.add_material(RawMaterial::new("Stone", RawMaterialType::Opaque, RawShadingModel::Lambert));

    let corners: Vec<u32> = (0..8)
        .map(|i| {
            raw.add_vertex(RawVertex {
                position: Vec3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32),
                normal: Vec3::Y,
                uv0: Vec2::new(0.5, 0.5),
                ..Default::default()
            })
        })
        .collect();
    let faces = [
        [0, 2, 1, 1, 2, 3],
        [4, 5, 6, 5, 7, 6],
        [0, 1, 4, 1, 5, 4],
        [2, 6, 3, 3, 6, 7],
        [0, 4, 2, 2, 4, 6],
        [1, 3, 5, 3, 7, 5],
    ];
    for face in faces {
        for t in face.chunks_exact(3) {
            raw.add_triangle(corners[t[0]], corners[t[1]], corners[t[2]], material, surface);
        }
    }
    raw
}

#[test]
fn single_cube_exports_three_artifacts() {
    let dir = scratch_dir("cube");
    let raw = unit_cube();
    assert_eq!(raw.vertex_count(), 8);
    let options = ExportOptions {
        mesh_name: Some("cube".into()),
        ..Default::default()
    };
    let report = export_all(&dir, &raw, &options);
    assert!(report.is_success(), "{:?}", report.failures);
    assert!(report.warnings.is_empty());
    assert_eq!(report.written.len(), 3);

    let mesh = read_mesh(&dir.join("cube.mesh"));
    assert_eq!(mesh.header.num_submeshes, 1);
    assert_eq!(mesh.submeshes[0].index_count, 36);
    assert_eq!(mesh.stride(), 32);
    assert_eq!(mesh.vertex_count(), 8);
    assert_eq!(mesh.submeshes[0].min, [0.0, 0.0, 0.0]);
    assert_eq!(mesh.submeshes[0].max, [1.0, 1.0, 1.0]);

    assert!(dir.join("Stone.material").exists());

    let scene = read_xml(&dir.join("cube.xml"));
    assert_eq!(scene.name, "Mesh");
    assert_eq!(scene.attributes["mesh"], "cube.mesh");
    let root = child_elements(&scene, "Node")[0];
    assert_eq!(root.attributes["rotation"], "0 0 0 1");
    let cube = child_elements(root, "Node")[0];
    let draws = child_elements(cube, "Draw");
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].attributes["index"], "0");
    assert_eq!(draws[0].attributes["name"], "Cube");
    assert_eq!(draws[0].attributes["material"], "Stone.material");
    assert_eq!(draws[0].attributes["mask"], "4294967295");
    assert!(!draws[0].attributes.contains_key("lod"));

    std::fs::remove_dir_all(&dir).ok();
}

/// Two materials on one surface, a transparent third, and a LOD group.
fn mixed_scene() -> RawModel {
    let mut raw = unit_cube();
    let paint = raw.add_material(RawMaterial::new("Paint", RawMaterialType::Opaque, RawShadingModel::Phong));
    let glass = raw.add_material(RawMaterial::new("Glass", RawMaterialType::Transparent, RawShadingModel::Phong));
    let cube = raw.surface_by_id(1).unwrap();
    let extra: Vec<u32> = [Vec3::new(2.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 0.0)]
        .into_iter()
        .map(|p| {
            raw.add_vertex(RawVertex {
                position: p,
                ..Default::default()
            })
        })
        .collect();
    raw.add_triangle(extra[0], extra[1], extra[2], glass, cube);
    raw.add_triangle(0, 1, extra[2], paint, cube);

    raw.add_node(RawNode::new(10, "Tree_LODGroup", Some(0)));
    for k in 0..2 {
        let id = 11 + k as i64;
        let mut node = RawNode::new(id, &format!("Tree_LOD{}", k), Some(10));
        node.surface_id = Some(20 + k as i64);
        raw.add_node(node);
        let surface = raw.add_surface(RawSurface::new(20 + k as i64, &format!("Tree{}", k), id));
        let v: Vec<u32> = [Vec3::ZERO, Vec3::Z, Vec3::Y]
            .into_iter()
            .map(|p| {
                raw.add_vertex(RawVertex {
                    position: p * (k as f32 + 5.0),
                    ..Default::default()
                })
            })
            .collect();
        raw.add_triangle(v[0], v[1], v[2], paint, surface);
    }
    raw
}

#[test]
fn partitions_share_one_mesh_and_resolve_from_the_scene() {
    let dir = scratch_dir("mixed");
    let raw = mixed_scene();
    let report = export_all(&dir, &raw, &ExportOptions::default());
    assert!(report.is_success(), "{:?}", report.failures);

    let mesh = read_mesh(&dir.join("Scene.mesh"));
    // Stone, Paint on the cube, Paint on two LOD surfaces, then Glass last
    assert_eq!(mesh.header.num_submeshes, 5);

    // submesh ranges are contiguous and indices address the shared vertex block
    let mut first = 0;
    for submesh in &mesh.submeshes {
        assert_eq!(submesh.base_vertex, 0);
        assert_eq!(submesh.first_index, first);
        first += submesh.index_count;
    }
    assert_eq!(first as usize, mesh.indices.len());
    assert!(mesh.indices.iter().all(|i| (*i as usize) < mesh.vertex_count()));
    assert_eq!(mesh.vertex_data.len(), mesh.vertex_count() * mesh.stride());

    // the second submesh only references vertices after the first one's
    let first_vertices = mesh.submesh_indices(0).unwrap().iter().max().unwrap() + 1;
    assert!(mesh.submesh_indices(1).unwrap().iter().all(|i| *i >= first_vertices));

    // bounds hold every position their submesh references
    for (k, submesh) in mesh.submeshes.iter().enumerate() {
        let bounds = submesh.bounds();
        for index in mesh.submesh_indices(k).unwrap() {
            let v = mesh.vertex(*index as usize).unwrap();
            assert!(bounds.contains(Vec3::new(v[0], v[1], v[2])));
        }
        assert!(bounds.min.cmple(bounds.max).all());
    }

    let scene = read_xml(&dir.join("Scene.xml"));
    let mut draws = vec![];
    all_draws(&scene, &mut draws);
    assert_eq!(draws.len(), 5);
    for draw in &draws {
        let index: u32 = draw.attributes["index"].parse().unwrap();
        assert!(index < mesh.header.num_submeshes);
        assert!(dir.join(&draw.attributes["material"]).exists());
    }

    let root = child_elements(&scene, "Node")[0];
    let group = child_elements(root, "Node")
        .into_iter()
        .find(|n| n.attributes["name"] == "Tree_LODGroup")
        .unwrap();
    assert!(child_elements(group, "Node").is_empty());
    let lods: Vec<&str> = child_elements(group, "Draw")
        .iter()
        .map(|d| d.attributes["lod"].as_str())
        .collect();
    assert_eq!(lods, vec!["0", "1"]);

    let glass = draws.iter().find(|d| d.attributes["material"] == "Glass.material").unwrap();
    assert_eq!(glass.attributes["index"], "4");

    std::fs::remove_dir_all(&dir).ok();
}

fn triangle_under_chain() -> RawModel {
    let mut raw = scene_with_root();
    raw.add_vertex_attributes(VertexAttributes::POSITION);
    let mut node = RawNode::new(1, "Chain", Some(0));
    node.translation = Vec3::new(1.0, 2.0, 3.0);
    node.rotation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
    node.scale = Vec3::splat(2.0);
    node.surface_id = Some(1);
    raw.add_node(node);
    let surface = raw.add_surface(RawSurface::new(1, "Tri", 1));
    let material = raw.add_material(RawMaterial::new("Flat", RawMaterialType::Opaque, RawShadingModel::Lambert));
    let v: Vec<u32> = [Vec3::ZERO, Vec3::X, Vec3::Z]
        .into_iter()
        .map(|p| {
            raw.add_vertex(RawVertex {
                position: p,
                ..Default::default()
            })
        })
        .collect();
    raw.add_triangle(v[0], v[1], v[2], material, surface);
    raw
}

fn positions(mesh: &MeshFile) -> Vec<Vec3> {
    (0..mesh.vertex_count())
        .map(|i| {
            let v = mesh.vertex(i).unwrap();
            Vec3::new(v[0], v[1], v[2])
        })
        .collect()
}

/// Same points in any order, each within `1e-5`.
fn assert_same_points(actual: &[Vec3], expected: &[Vec3]) {
    assert_eq!(actual.len(), expected.len(), "{:?} != {:?}", actual, expected);
    let mut unmatched = actual.to_vec();
    for point in expected {
        let Some(at) = unmatched
            .iter()
            .position(|p| (*p - *point).abs().max_element() < 1e-5)
        else {
            panic!("{:?} not found in {:?}", point, actual);
        };
        unmatched.swap_remove(at);
    }
}

#[test]
fn world_space_bake_applies_the_node_chain() {
    let raw = triangle_under_chain();

    let dir = scratch_dir("local");
    assert!(export_all(&dir, &raw, &ExportOptions::default()).is_success());
    let local = positions(&read_mesh(&dir.join("Scene.mesh")));
    assert_same_points(&local, &[Vec3::ZERO, Vec3::X, Vec3::Z]);
    std::fs::remove_dir_all(&dir).ok();

    let dir = scratch_dir("world");
    let options = ExportOptions {
        world_space: true,
        ..Default::default()
    };
    assert!(export_all(&dir, &raw, &options).is_success());
    let first = std::fs::read(dir.join("Scene.mesh")).unwrap();
    let world = positions(&MeshFile::parse(&first).unwrap());
    // x -> -z and z -> x, both scaled by 2, rotation noise stays below 1e-5
    assert_same_points(
        &world,
        &[Vec3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 2.0, 1.0), Vec3::new(3.0, 2.0, 3.0)],
    );

    // same model, same options: same bytes
    assert!(export_all(&dir, &raw, &options).is_success());
    let second = std::fs::read(dir.join("Scene.mesh")).unwrap();
    assert_eq!(first, second);

    let parallel = ExportOptions {
        world_space: true,
        parallel: true,
        ..Default::default()
    };
    assert!(export_all(&dir, &raw, &parallel).is_success());
    assert_eq!(std::fs::read(dir.join("Scene.mesh")).unwrap(), first);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_surface_is_a_warning_not_a_failure() {
    let dir = scratch_dir("dangling");
    let mut raw = unit_cube();
    let mut node = RawNode::new(5, "Dangling", Some(0));
    node.surface_id = Some(77);
    raw.add_node(node);

    let report = export_all(&dir, &raw, &ExportOptions::default());
    assert!(report.is_success());
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].node, "Dangling");

    let scene = read_xml(&dir.join("Scene.xml"));
    let mut draws = vec![];
    all_draws(&scene, &mut draws);
    assert_eq!(draws.len(), 1);
    std::fs::remove_dir_all(&dir).ok();
}
