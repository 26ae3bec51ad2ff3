use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum RawMaterialType {
    Opaque,
    Transparent,
    SkinnedOpaque,
    SkinnedTransparent,
}

impl RawMaterialType {
    pub fn is_transparent(&self) -> bool {
        matches!(self, RawMaterialType::Transparent | RawMaterialType::SkinnedTransparent)
    }

    pub fn new(transparent: bool, skinned: bool) -> Self {
        match (transparent, skinned) {
            (false, false) => RawMaterialType::Opaque,
            (true, false) => RawMaterialType::Transparent,
            (false, true) => RawMaterialType::SkinnedOpaque,
            (true, true) => RawMaterialType::SkinnedTransparent,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum RawShadingModel {
    Lambert,
    Blinn,
    Phong,
    PbrMetRough,
}

/// Texture slots of a material, in declaration order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum RawTextureUsage {
    Ambient,
    Diffuse,
    Normal,
    Specular,
    Shininess,
    Emissive,
    Reflection,
    Albedo,
    Occlusion,
    Roughness,
    Metallic,
}

impl RawTextureUsage {
    pub const COUNT: usize = 11;

    pub const ALL: [RawTextureUsage; Self::COUNT] = [
        RawTextureUsage::Ambient,
        RawTextureUsage::Diffuse,
        RawTextureUsage::Normal,
        RawTextureUsage::Specular,
        RawTextureUsage::Shininess,
        RawTextureUsage::Emissive,
        RawTextureUsage::Reflection,
        RawTextureUsage::Albedo,
        RawTextureUsage::Occlusion,
        RawTextureUsage::Roughness,
        RawTextureUsage::Metallic,
    ];

    /// Sampler name the engine binds this slot to. Diffuse shares `texAlbedo` with the PBR albedo slot.
    pub fn sampler_name(&self) -> &'static str {
        match self {
            RawTextureUsage::Ambient => "texAmbient",
            RawTextureUsage::Diffuse => "texAlbedo",
            RawTextureUsage::Normal => "texNormal",
            RawTextureUsage::Specular => "texSpecular",
            RawTextureUsage::Shininess => "texShininess",
            RawTextureUsage::Emissive => "texEmissive",
            RawTextureUsage::Reflection => "texReflection",
            RawTextureUsage::Albedo => "texAlbedo",
            RawTextureUsage::Occlusion => "texOcclusion",
            RawTextureUsage::Roughness => "texRoughness",
            RawTextureUsage::Metallic => "texMetallic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawMaterial {
    pub name: String,
    pub material_type: RawMaterialType,
    pub shading_model: RawShadingModel,
    /// Indices into the model's textures, one per `RawTextureUsage`; `None` is an empty slot.
    pub textures: [Option<usize>; RawTextureUsage::COUNT],
}

impl RawMaterial {
    pub fn new(name: &str, material_type: RawMaterialType, shading_model: RawShadingModel) -> Self {
        Self {
            name: name.to_string(),
            material_type,
            shading_model,
            textures: [None; RawTextureUsage::COUNT],
        }
    }

    pub fn texture(&self, usage: RawTextureUsage) -> Option<usize> {
        self.textures[usage as usize]
    }

    pub fn set_texture(&mut self, usage: RawTextureUsage, texture: usize) {
        self.textures[usage as usize] = Some(texture);
    }

    /// Populated slots in declaration order.
    pub fn texture_slots(&self) -> impl Iterator<Item = (RawTextureUsage, usize)> + '_ {
        RawTextureUsage::ALL
            .iter()
            .filter_map(move |usage| self.texture(*usage).map(|t| (*usage, t)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawTexture {
    /// Path as stored by the importer.
    pub file_name: String,
    pub usage: RawTextureUsage,
}
