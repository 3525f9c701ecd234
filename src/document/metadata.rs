//! Structural metadata extension blocks.
//!
//! Building elements carry parameter sets worth preserving alongside the
//! geometry. Categories become schema classes, element parameters become
//! class properties, and every exported node references its class and
//! carries a property map, under the `EXT_structural_metadata` extension.
//! `BTreeMap` keeps the emitted JSON deterministic.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::model::ParameterValue;

/// Sanitizes a display name into a glTF-friendly identifier:
/// alphanumeric camelCase with a lowercase first letter.
///
/// `"Structural Framing"` → `"structuralFraming"`.
#[must_use]
pub fn gltf_name(display: &str) -> String {
    let mut out = String::with_capacity(display.len());
    let mut capitalize_next = false;
    for c in display.chars() {
        if c.is_alphanumeric() {
            if out.is_empty() {
                out.extend(c.to_lowercase());
            } else if capitalize_next {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            capitalize_next = false;
        } else {
            capitalize_next = true;
        }
    }
    out
}

// ============================================================================
// Per-node / per-material extension block
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct MetadataExtensions {
    #[serde(rename = "EXT_structural_metadata")]
    pub ext_structural_metadata: NodeMetadata,
}

/// The class reference and property map attached to one node or
/// material.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NodeMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
}

impl NodeMetadata {
    #[must_use]
    pub fn with_class(display: &str) -> Self {
        Self {
            class: Some(gltf_name(display)),
            properties: BTreeMap::new(),
        }
    }

    /// Inserts a property unless one with that key already exists.
    pub fn insert(&mut self, name: &str, value: &ParameterValue) {
        let key = gltf_name(name);
        if key.is_empty() {
            return;
        }
        self.properties.entry(key).or_insert_with(|| value.to_json());
    }

    pub fn insert_text(&mut self, name: &str, value: &str) {
        self.properties
            .entry(gltf_name(name))
            .or_insert_with(|| Value::String(value.to_owned()));
    }
}

// ============================================================================
// Document-level schema
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SchemaExtensions {
    #[serde(rename = "EXT_structural_metadata")]
    pub ext_structural_metadata: MetadataSchema,
}

/// The schema half of the extension: class descriptors for every
/// category/family seen during the traversal.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetadataSchema {
    pub schema: Schema,
}

#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    pub id: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub classes: BTreeMap<String, ClassSchema>,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            id: "model".to_owned(),
            classes: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSchema {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertySchema>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySchema {
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_type: Option<&'static str>,
    pub required: bool,
}

impl PropertySchema {
    #[must_use]
    pub fn for_value(name: &str, value: &ParameterValue) -> Self {
        let (property_type, component_type) = match value {
            ParameterValue::Int(_) => ("SCALAR", Some("INT32")),
            ParameterValue::Float(_) => ("SCALAR", Some("FLOAT32")),
            ParameterValue::Text(_) | ParameterValue::EntityRef(_) => ("STRING", None),
        };
        Self {
            name: name.to_owned(),
            property_type,
            component_type,
            required: false,
        }
    }
}

impl MetadataSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures a class for `display` exists and returns its key.
    pub fn add_class(&mut self, display: &str) -> String {
        let key = gltf_name(display);
        if key.is_empty() {
            return key;
        }
        self.schema
            .classes
            .entry(key.clone())
            .or_insert_with(|| ClassSchema {
                name: display.to_owned(),
                parent: None,
                properties: BTreeMap::new(),
            });
        key
    }

    /// Links `class` under a parent class (super-component categories).
    pub fn set_parent(&mut self, class_key: &str, parent_display: &str) {
        let parent = gltf_name(parent_display);
        if let Some(class) = self.schema.classes.get_mut(class_key) {
            class.parent = Some(parent);
        }
    }

    /// Records property descriptors for every parameter of `class_key`.
    pub fn record_parameters(&mut self, class_key: &str, params: &[(String, ParameterValue)]) {
        let Some(class) = self.schema.classes.get_mut(class_key) else {
            return;
        };
        for (name, value) in params {
            let prop_key = gltf_name(name);
            if prop_key.is_empty() {
                continue;
            }
            class
                .properties
                .entry(prop_key)
                .or_insert_with(|| PropertySchema::for_value(name, value));
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schema.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gltf_name_camel_cases_and_strips() {
        assert_eq!(gltf_name("Structural Framing"), "structuralFraming");
        assert_eq!(gltf_name("Fire Rating (hrs)"), "fireRatingHrs");
        assert_eq!(gltf_name("walls"), "walls");
        assert_eq!(gltf_name(""), "");
    }
}
