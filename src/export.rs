use std::path::{Path, PathBuf};

use log::{debug, error, info, log_enabled, Level};
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, StructuralWarning};
use crate::material::write_material;
use crate::mesh_file::write_mesh;
use crate::optimize::{ForsythOptimizer, VertexCacheOptimizer, VertexCacheStats};
use crate::raw::RawModel;
use crate::scene::{surface_map, write_scene};
use crate::submesh::{build_submesh, NormalTransform, Submesh};

pub const DEFAULT_MESH_NAME: &str = "Scene";
/// Cache size the per-submesh statistics are reported for.
const STATS_CACHE_SIZE: usize = 16;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ExportOptions {
    /// Bake each surface's node chain into its vertices.
    pub world_space: bool,
    pub normal_transform: NormalTransform,
    /// Build submeshes on a worker pool.
    pub parallel: bool,
    /// Base name of the `.mesh` and scene `.xml` files.
    pub mesh_name: Option<String>,
}

impl ExportOptions {
    pub fn from_json_file(path: &Path) -> Result<Self, ExportError> {
        let json = std::fs::read_to_string(path).map_err(|e| ExportError::OptionsRead(path.to_path_buf(), e))?;
        serde_json::from_str(&json).map_err(|e| ExportError::Options(path.to_path_buf(), e))
    }

    pub fn name(&self) -> &str {
        self.mesh_name.as_deref().unwrap_or(DEFAULT_MESH_NAME)
    }

    pub fn mesh_file_name(&self) -> String {
        format!("{}.mesh", self.name())
    }

    pub fn scene_file_name(&self) -> String {
        format!("{}.xml", self.name())
    }
}

/// Outcome of one export run. Artifacts fail independently.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<ExportError>,
    pub warnings: Vec<StructuralWarning>,
}

impl ExportReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, result: Result<PathBuf, ExportError>) {
        match result {
            Ok(path) => {
                info!("wrote {}", path.display());
                self.written.push(path);
            }
            Err(e) => {
                error!("{}", e);
                self.failures.push(e);
            }
        }
    }
}

fn build_sequential(
    raw: &RawModel,
    partitions: &[RawModel],
    options: &ExportOptions,
    optimizer: &dyn VertexCacheOptimizer,
) -> Vec<Submesh> {
    partitions
        .iter()
        .map(|partition| build_submesh(partition, raw, optimizer, options.world_space, options.normal_transform))
        .collect()
}

fn build_parallel(
    raw: &RawModel,
    partitions: &[RawModel],
    options: &ExportOptions,
    optimizer: &dyn VertexCacheOptimizer,
) -> Result<Vec<Submesh>, ExportError> {
    let worker_count = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(8)
        .clamp(1, partitions.len().max(1));

    let (task_tx, task_rx) = crossbeam::channel::unbounded::<usize>();
    let (result_tx, result_rx) = crossbeam::channel::unbounded::<(usize, Submesh)>();
    for index in 0..partitions.len() {
        // the receiver is alive until the scope below ends
        let _ = task_tx.send(index);
    }
    drop(task_tx);

    let scope_result = crossbeam::scope(|scope| {
        for _ in 0..worker_count {
            let rx = task_rx.clone();
            let tx = result_tx.clone();
            scope.spawn(move |_| {
                while let Ok(index) = rx.recv() {
                    let submesh = build_submesh(
                        &partitions[index],
                        raw,
                        optimizer,
                        options.world_space,
                        options.normal_transform,
                    );
                    if tx.send((index, submesh)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);

    let mut slots: Vec<Option<Submesh>> = vec![None; partitions.len()];
    for (index, submesh) in result_rx.iter() {
        slots[index] = Some(submesh);
    }
    let missing = slots.iter().filter(|slot| slot.is_none()).count();
    if scope_result.is_err() || missing > 0 {
        return Err(ExportError::WorkerPanicked {
            missing,
            total: partitions.len(),
        });
    }
    Ok(slots.into_iter().flatten().collect())
}

/// Builds one submesh per partition, in partition order.
pub fn build_submeshes(
    raw: &RawModel,
    partitions: &[RawModel],
    options: &ExportOptions,
    optimizer: &dyn VertexCacheOptimizer,
) -> Result<Vec<Submesh>, ExportError> {
    if options.parallel && partitions.len() > 1 {
        build_parallel(raw, partitions, options, optimizer)
    } else {
        Ok(build_sequential(raw, partitions, options, optimizer))
    }
}

pub fn export_mesh(
    dir: &Path,
    raw: &RawModel,
    partitions: &[RawModel],
    options: &ExportOptions,
    optimizer: &dyn VertexCacheOptimizer,
) -> Result<PathBuf, ExportError> {
    let submeshes = build_submeshes(raw, partitions, options, optimizer)?;
    if log_enabled!(Level::Debug) {
        for (index, submesh) in submeshes.iter().enumerate() {
            let stats = VertexCacheStats::measure(&submesh.indices, STATS_CACHE_SIZE);
            debug!(
                "submesh {}: surface '{}', material '{}', {} vertices, {} triangles, acmr {:.3}, atvr {:.3}",
                index,
                submesh.surface_name,
                submesh.material_name,
                submesh.vertices.len(),
                submesh.indices.len() / 3,
                stats.acmr,
                stats.atvr
            );
        }
    }
    let path = dir.join(options.mesh_file_name());
    write_mesh(&path, raw.vertex_attributes(), &submeshes)?;
    Ok(path)
}

/// Writes one `.material` per raw material; each result stands on its own.
pub fn export_materials(dir: &Path, raw: &RawModel) -> Vec<Result<PathBuf, ExportError>> {
    raw.materials()
        .iter()
        .map(|material| write_material(dir, material, raw, raw.vertex_attributes()))
        .collect()
}

pub fn export_scene(
    dir: &Path,
    raw: &RawModel,
    partitions: &[RawModel],
    options: &ExportOptions,
) -> Result<(PathBuf, Vec<StructuralWarning>), ExportError> {
    let path = dir.join(options.scene_file_name());
    let warnings = write_scene(&path, raw, &options.mesh_file_name(), &surface_map(partitions))?;
    Ok((path, warnings))
}

/// Writes the mesh, every material and the scene into `dir`.
pub fn export_all_with(
    dir: &Path,
    raw: &RawModel,
    options: &ExportOptions,
    optimizer: &dyn VertexCacheOptimizer,
) -> ExportReport {
    let mut report = ExportReport::default();
    let partitions = raw.create_material_models();
    info!(
        "exporting {} partitions, {} materials, {} nodes to {}",
        partitions.len(),
        raw.material_count(),
        raw.node_count(),
        dir.display()
    );

    report.record(export_mesh(dir, raw, &partitions, options, optimizer));
    for result in export_materials(dir, raw) {
        report.record(result);
    }
    let scene = export_scene(dir, raw, &partitions, options).map(|(path, warnings)| {
        report.warnings.extend(warnings);
        path
    });
    report.record(scene);
    report
}

pub fn export_all(dir: &Path, raw: &RawModel, options: &ExportOptions) -> ExportReport {
    export_all_with(dir, raw, options, &ForsythOptimizer::default())
}
