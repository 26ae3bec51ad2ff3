use std::path::PathBuf;

/// Failures writing one artifact. A failed artifact does not stop its siblings.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("could not open '{0}' for writing: {1}")]
    OutputOpen(PathBuf, #[source] std::io::Error),

    #[error("I/O error writing '{0}': {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to write XML '{0}': {1}")]
    Xml(PathBuf, #[source] xmltree::Error),

    #[error("malformed mesh file: {0}")]
    MalformedMesh(String),

    #[error("a submesh worker panicked, {missing} of {total} submeshes were not built")]
    WorkerPanicked { missing: usize, total: usize },

    #[error("{what} of {value} does not fit a 32 bit mesh header field")]
    MeshTooLarge { what: &'static str, value: usize },

    #[error("could not read export options '{0}': {1}")]
    OptionsRead(PathBuf, #[source] std::io::Error),

    #[error("invalid export options '{0}': {1}")]
    Options(PathBuf, #[source] serde_json::Error),
}

/// Failures loading the input scene. Any of them aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("no input file given")]
    InputMissing,

    #[error("input file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to load glTF file '{0}': {1}")]
    Gltf(PathBuf, #[source] gltf::Error),

    #[error("unsupported input format '{0}'")]
    UnsupportedFormat(PathBuf),
}

/// Non-fatal inconsistency between nodes and surfaces found while exporting.
/// The affected part of the tree is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralWarning {
    pub node: String,
    pub message: String,
}

impl std::fmt::Display for StructuralWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node '{}': {}", self.node, self.message)
    }
}
