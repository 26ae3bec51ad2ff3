//! Offline converter from an interchange scene to engine native assets.
//!
//! An importer fills a [`raw::RawModel`]; the exporter then writes
//!
//! * one binary `.mesh` holding every (material, surface) partition as a submesh,
//! * one `.material` XML per raw material,
//! * one scene `.xml` mirroring the node tree and referencing both by file name.
//!
//! ```no_run
//! use std::path::Path;
//! use cross_bake::export::{export_all, ExportOptions};
//! use cross_bake::import::{load_scene, ImportOptions};
//!
//! let raw = load_scene(Path::new("tree.gltf"), &ImportOptions::default()).unwrap();
//! let options = ExportOptions {
//!     mesh_name: Some("tree".into()),
//!     ..Default::default()
//! };
//! let report = export_all(Path::new("out"), &raw, &options);
//! assert!(report.is_success());
//! ```

pub mod codec;
pub mod error;
pub mod export;
pub mod import;
pub mod material;
pub mod mesh_file;
pub mod optimize;
pub mod paths;
pub mod raw;
pub mod scene;
pub mod submesh;
