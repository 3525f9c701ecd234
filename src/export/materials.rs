//! Material and texture registration.
//!
//! The material-mapping collaborator resolves vendor shader graphs into
//! plain color/texture descriptions; this module turns those into
//! document materials, sharing sampler/image/texture entries by URI so
//! repeated references never duplicate them.

use crate::document::metadata::{MetadataExtensions, MetadataSchema, NodeMetadata};
use crate::document::{
    Image, KhrTextureTransform, Material, PbrMetallicRoughness, Sampler, Texture, TextureInfo,
    TextureInfoExtensions, ALPHA_BLEND,
};
use crate::model::ResolvedMaterial;
use crate::preferences::Preferences;
use crate::registry::Registry;

const DEFAULT_SAMPLER_KEY: &str = "defaultSampler";

pub(crate) struct RegisterOutcome {
    pub has_texture: bool,
    /// The texture carries a KHR_texture_transform block.
    pub uses_transform: bool,
}

/// Registers `resolved` into the material registries, returning whether
/// the active material ended up textured.
pub(crate) fn register(
    resolved: &ResolvedMaterial,
    prefs: &Preferences,
    materials: &mut Registry<Material>,
    images: &mut Registry<Image>,
    samplers: &mut Registry<Sampler>,
    textures: &mut Registry<Texture>,
    schema: &mut MetadataSchema,
) -> RegisterOutcome {
    if resolved.is_placeholder() {
        log::warn!("placeholder material {} substituted", resolved.key);
        materials.insert_or_update(
            &resolved.key,
            Material {
                name: Some(resolved.name.clone()),
                ..Material::default()
            },
        );
        return RegisterOutcome {
            has_texture: false,
            uses_transform: false,
        };
    }

    let mut base_color_texture = None;
    let mut uses_transform = false;
    if prefs.textures {
        if let Some(texture) = &resolved.texture {
            if texture.uri.is_empty() {
                // Unreadable source: this material simply loses its
                // texture, nothing else is affected.
                log::warn!("material {} has an unreadable texture source", resolved.name);
            } else {
                if samplers.is_empty() {
                    samplers.insert_or_update(DEFAULT_SAMPLER_KEY, Sampler::default());
                }
                let source = images.insert_or_update(
                    &texture.uri,
                    Image {
                        name: None,
                        uri: Some(texture.uri.clone()),
                    },
                );
                let index = textures.insert_or_update(
                    &texture.uri,
                    Texture {
                        sampler: Some(0),
                        source: Some(source),
                    },
                );
                let has_transform =
                    texture.offset.is_some() || texture.rotation.is_some() || texture.scale.is_some();
                let extensions = has_transform.then(|| TextureInfoExtensions {
                    khr_texture_transform: KhrTextureTransform {
                        offset: texture.offset,
                        rotation: texture.rotation,
                        scale: texture.scale,
                    },
                });
                uses_transform = has_transform;
                base_color_texture = Some(TextureInfo {
                    index,
                    tex_coord: None,
                    extensions,
                });
            }
        }
    }
    let has_texture = base_color_texture.is_some();

    let extensions = if prefs.metadata && !resolved.parameters.is_empty() {
        let class_key = schema.add_class(&resolved.name);
        schema.record_parameters(&class_key, &resolved.parameters);
        let mut meta = NodeMetadata::with_class(&resolved.name);
        for (name, value) in &resolved.parameters {
            meta.insert(name, value);
        }
        Some(MetadataExtensions {
            ext_structural_metadata: meta,
        })
    } else {
        None
    };

    let material = Material {
        name: Some(resolved.name.clone()),
        pbr_metallic_roughness: Some(PbrMetallicRoughness {
            base_color_factor: Some(resolved.base_color),
            metallic_factor: Some(resolved.metallic),
            roughness_factor: Some(resolved.roughness),
            base_color_texture,
        }),
        alpha_mode: (resolved.base_color[3] < 1.0).then(|| ALPHA_BLEND.to_owned()),
        double_sided: resolved.double_sided.then_some(true),
        extensions,
    };
    materials.insert_or_update(&resolved.key, material);

    RegisterOutcome {
        has_texture,
        uses_transform,
    }
}
