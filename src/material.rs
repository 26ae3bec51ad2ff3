use std::fs::File;
use std::path::{Path, PathBuf};

use xmltree::{Element, EmitterConfig, XMLNode};

use crate::error::ExportError;
use crate::paths::file_name_of;
use crate::raw::{RawMaterial, RawModel, VertexAttributes};

const SHADER_FILE: &str = "Default.glsl";
const PASS_NAME: &str = "Default";

/// Shader define for each vertex attribute, in packed order.
const ATTRIBUTE_DEFINES: [(VertexAttributes, &str); 8] = [
    (VertexAttributes::POSITION, "VERTEX_ATTRIBUTE_POSITION"),
    (VertexAttributes::NORMAL, "VERTEX_ATTRIBUTE_NORMAL"),
    (VertexAttributes::BINORMAL, "VERTEX_ATTRIBUTE_BINORMAL"),
    (VertexAttributes::COLOR, "VERTEX_ATTRIBUTE_COLOR"),
    (VertexAttributes::UV0, "VERTEX_ATTRIBUTE_TEXCOORD0"),
    (VertexAttributes::UV1, "VERTEX_ATTRIBUTE_TEXCOORD1"),
    (VertexAttributes::JOINT_INDICES, "VERTEX_ATTRIBUTE_INDICES"),
    (VertexAttributes::JOINT_WEIGHTS, "VERTEX_ATTRIBUTE_WEIGHTS"),
];

pub fn material_file_name(material: &RawMaterial) -> String {
    format!("{}.material", material.name)
}

pub(crate) fn element_with(name: &str, attributes: &[(&str, String)]) -> Element {
    let mut element = Element::new(name);
    for (key, value) in attributes {
        element.attributes.insert(key.to_string(), value.clone());
    }
    element
}

pub(crate) fn push_child(parent: &mut Element, child: Element) {
    parent.children.push(XMLNode::Element(child));
}

pub(crate) fn save_xml(root: &Element, path: &Path) -> Result<(), ExportError> {
    let file = File::create(path).map_err(|e| ExportError::OutputOpen(path.to_path_buf(), e))?;
    root.write_with_config(file, EmitterConfig::new().perform_indent(true))
        .map_err(|e| ExportError::Xml(path.to_path_buf(), e))
}

fn define(name: &str) -> Element {
    element_with("Define", &[("name", name.to_string())])
}

/// Builds the XML tree of one material: a single pass with the default pipeline,
/// a define per enabled vertex attribute, and a `Texture2D` per populated slot.
pub fn material_element(material: &RawMaterial, raw: &RawModel, attributes: VertexAttributes) -> Element {
    let mut vertex = element_with("Vertex", &[("file_name", SHADER_FILE.to_string())]);
    for (attribute, name) in ATTRIBUTE_DEFINES {
        if attributes.contains(attribute) {
            push_child(&mut vertex, define(name));
        }
    }
    push_child(&mut vertex, define("INSTANCE_ATTRIBUTE_TRANSFORM"));

    let mut pipeline = element_with("Pipeline", &[("render_pass", PASS_NAME.to_string())]);
    push_child(&mut pipeline, vertex);
    push_child(
        &mut pipeline,
        element_with("Fragment", &[("file_name", SHADER_FILE.to_string())]),
    );

    let mut pass = element_with("Pass", &[("name", PASS_NAME.to_string())]);
    push_child(&mut pass, pipeline);

    for (usage, texture_index) in material.texture_slots() {
        let texture = raw.texture(texture_index);
        push_child(
            &mut pass,
            element_with(
                "Texture2D",
                &[
                    ("name", usage.sampler_name().to_string()),
                    ("file_name", file_name_of(&texture.file_name).to_string()),
                    ("min_filter", "GFX_NEAREST".to_string()),
                    ("mag_filter", "GFX_LINEAR".to_string()),
                    ("mipmap_mode", "GFX_NEAREST".to_string()),
                    ("address_mode", "GFX_CLAMP_TO_EDGE".to_string()),
                ],
            ),
        );
    }

    let mut root = Element::new("Material");
    push_child(&mut root, pass);
    root
}

/// Writes `<dir>/<material name>.material` and returns its path.
pub fn write_material(
    dir: &Path,
    material: &RawMaterial,
    raw: &RawModel,
    attributes: VertexAttributes,
) -> Result<PathBuf, ExportError> {
    let path = dir.join(material_file_name(material));
    save_xml(&material_element(material, raw, attributes), &path)?;
    Ok(path)
}
