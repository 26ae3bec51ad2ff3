use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use cross_bake::error::ImportError;
use cross_bake::export::{export_all, ExportOptions};
use cross_bake::import::{load_scene, parse_extension_list, ImportOptions, DEFAULT_TEXTURE_EXTENSIONS};
use cross_bake::mesh_file::MeshFile;
use cross_bake::submesh::NormalTransform;
use log::{error, info, warn};

/// Converts a glTF scene into a binary .mesh, one .material per material and a scene .xml.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Scene file to convert (.gltf or .glb)
    input: Option<PathBuf>,

    /// Output directory, defaults to the directory of the input
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Mirror texture coordinates horizontally
    #[arg(long)]
    flip_u: bool,

    /// Mirror texture coordinates vertically
    #[arg(long)]
    flip_v: bool,

    /// Bake node transforms into vertex positions, normals and binormals
    #[arg(long)]
    world: bool,

    /// Move normals by the inverse transpose when baking world space
    #[arg(long)]
    inverse_transpose_normals: bool,

    /// Build submeshes on several threads
    #[arg(long)]
    parallel: bool,

    /// Base name of the .mesh and scene .xml, defaults to the input file stem
    #[arg(long)]
    name: Option<String>,

    /// JSON file with export options; flags given on the command line win
    #[arg(long)]
    options: Option<PathBuf>,

    /// Allowed texture file extensions
    #[arg(long, default_value = DEFAULT_TEXTURE_EXTENSIONS)]
    texture_extensions: String,
}

fn export_options(args: &Args, input: &Path) -> Result<ExportOptions, cross_bake::error::ExportError> {
    let mut options = match &args.options {
        Some(path) => ExportOptions::from_json_file(path)?,
        None => ExportOptions::default(),
    };
    options.world_space |= args.world;
    options.parallel |= args.parallel;
    if args.inverse_transpose_normals {
        options.normal_transform = NormalTransform::InverseTranspose;
    }
    if let Some(name) = &args.name {
        options.mesh_name = Some(name.clone());
    }
    if options.mesh_name.is_none() {
        options.mesh_name = input.file_stem().and_then(|s| s.to_str()).map(str::to_string);
    }
    Ok(options)
}

fn output_dir(args: &Args, input: &Path) -> PathBuf {
    match (&args.output, input.parent()) {
        (Some(output), _) => output.clone(),
        (None, Some(parent)) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("./"),
    }
}

fn log_mesh_summary(path: &Path) {
    let summary = std::fs::read(path)
        .map_err(|e| e.to_string())
        .and_then(|bytes| MeshFile::parse(&bytes).map_err(|e| e.to_string()));
    match summary {
        Ok(mesh) => info!(
            "{}: {} submeshes, {} vertices of {} bytes, {} indices",
            path.display(),
            mesh.header.num_submeshes,
            mesh.vertex_count(),
            mesh.stride(),
            mesh.indices.len()
        ),
        Err(e) => warn!("could not read back {}: {}", path.display(), e),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let Some(input) = args.input.clone() else {
        error!("{}, see --help", ImportError::InputMissing);
        return ExitCode::from(1);
    };

    let options = match export_options(&args, &input) {
        Ok(options) => options,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(1);
        }
    };

    let mut import_options = ImportOptions::with_uv_flips(args.flip_u, args.flip_v);
    import_options.texture_extensions = parse_extension_list(&args.texture_extensions);

    let raw = match load_scene(&input, &import_options) {
        Ok(raw) => raw,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(1);
        }
    };

    let dir = output_dir(&args, &input);
    if let Err(e) = std::fs::create_dir_all(&dir) {
        error!("could not create output directory {}: {}", dir.display(), e);
        return ExitCode::from(1);
    }

    let report = export_all(&dir, &raw, &options);
    log_mesh_summary(&dir.join(options.mesh_file_name()));
    if !report.warnings.is_empty() {
        warn!("scene written with {} structural warnings", report.warnings.len());
    }

    if report.is_success() {
        info!("wrote {} files to {}", report.written.len(), dir.display());
        ExitCode::SUCCESS
    } else {
        error!(
            "{} of {} files failed",
            report.failures.len(),
            report.failures.len() + report.written.len()
        );
        ExitCode::from(1)
    }
}
