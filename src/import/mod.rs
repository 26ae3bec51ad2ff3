//! Importers that fill a [`RawModel`] from an interchange file.

use std::path::Path;

use crate::error::ImportError;
use crate::paths::extension_of;
use crate::raw::{flip_u, flip_v, RawModel, UvTransform};

pub mod gltf_loader;
pub mod tangents;

pub const DEFAULT_TEXTURE_EXTENSIONS: &str = "bmp;png;jpg;jpeg";

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Lowercase, without the dot.
    pub texture_extensions: Vec<String>,
    /// Applied in order to both UV sets of every vertex after loading.
    pub uv_transforms: Vec<UvTransform>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            texture_extensions: parse_extension_list(DEFAULT_TEXTURE_EXTENSIONS),
            uv_transforms: vec![],
        }
    }
}

impl ImportOptions {
    pub fn with_uv_flips(flip_u_coords: bool, flip_v_coords: bool) -> Self {
        let mut uv_transforms: Vec<UvTransform> = vec![];
        if flip_u_coords {
            uv_transforms.push(flip_u);
        }
        if flip_v_coords {
            uv_transforms.push(flip_v);
        }
        Self {
            uv_transforms,
            ..Default::default()
        }
    }

    pub fn allows_texture(&self, file_name: &str) -> bool {
        extension_of(file_name).is_some_and(|ext| self.texture_extensions.contains(&ext))
    }
}

/// Splits a `;` separated list such as `"bmp;png"`.
pub fn parse_extension_list(list: &str) -> Vec<String> {
    list.split(';')
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

/// Loads `path` with the importer matching its extension.
pub fn load_scene(path: &Path, options: &ImportOptions) -> Result<RawModel, ImportError> {
    if !path.exists() {
        return Err(ImportError::NotFound(path.to_path_buf()));
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("gltf") | Some("glb") => gltf_loader::load_gltf(path, options),
        _ => Err(ImportError::UnsupportedFormat(path.to_path_buf())),
    }
}
