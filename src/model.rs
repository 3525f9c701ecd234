//! The seam to the host model: opaque handles, resolved payloads, and
//! the accessor trait the traversal engine drives the exporter through.
//!
//! Nothing in this module reads a building model itself. The host
//! traversal engine owns iteration and hands the exporter resolved data:
//! element descriptions, resolved materials, and triangulated polygon
//! batches. Document switching for linked sub-documents is likewise
//! delegated back to the accessor.

use glam::{DVec2, DVec3};
use serde::Serialize;
use serde_json::Value;

/// Opaque element handle, resolved through [`ModelSource::element`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(pub String);

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Document-level properties recorded into the asset header extras.
#[derive(Debug, Clone, Default)]
pub struct DocumentInfo {
    pub name: Option<String>,
    pub properties: Vec<(String, String)>,
}

/// A typed element or material parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Text(String),
    /// Reference to another model entity, stringified.
    EntityRef(String),
}

impl ParameterValue {
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A resolved element description.
#[derive(Debug, Clone, Default)]
pub struct ElementInfo {
    /// Stable identity; node registry key.
    pub unique_id: String,
    pub category: Option<String>,
    pub family: Option<String>,
    pub type_name: Option<String>,
    pub level_id: Option<String>,
    /// Back-reference to the owning compound element, if this element is
    /// a sub-component of one.
    pub super_component: Option<ElementId>,
    /// Elements failing the view's visibility/category filter are
    /// delivered with this unset and get skipped.
    pub visible: bool,
    pub parameters: Vec<(String, ParameterValue)>,
}

impl ElementInfo {
    /// Display name from category + family + type, the parts that exist.
    #[must_use]
    pub fn display_name(&self) -> String {
        let mut name = String::new();
        for part in [self.category.as_deref(), self.family.as_deref()] {
            if let Some(part) = part {
                if !name.is_empty() {
                    name.push(' ');
                }
                name.push_str(part);
            }
        }
        if let Some(type_name) = self.type_name.as_deref() {
            if name.is_empty() {
                name.push_str(type_name);
            } else {
                name.push_str(": ");
                name.push_str(type_name);
            }
        }
        if name.is_empty() {
            name.clone_from(&self.unique_id);
        }
        name
    }
}

/// Opaque material handle carried by a material event.
#[derive(Debug, Clone)]
pub struct MaterialNode {
    pub id: String,
}

/// What the material-mapping collaborator resolved a handle to.
#[derive(Debug, Clone)]
pub struct ResolvedMaterial {
    /// Stable identity; material registry key.
    pub key: String,
    pub name: String,
    pub kind: MaterialKind,
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub double_sided: bool,
    pub texture: Option<ResolvedTexture>,
    pub parameters: Vec<(String, ParameterValue)>,
}

/// Placeholder classification for materials the host could not resolve.
/// Placeholder materials are registered so primitives keep a stable
/// stream key, but primitives never reference them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    Valid,
    /// The handle itself was invalid.
    Invalid,
    /// The handle resolved to no material element.
    Null,
}

impl ResolvedMaterial {
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            key: "INVALID_MATERIAL".to_owned(),
            name: "Invalid Material".to_owned(),
            kind: MaterialKind::Invalid,
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 0.0,
            roughness: 1.0,
            double_sided: false,
            texture: None,
            parameters: Vec::new(),
        }
    }

    #[must_use]
    pub fn null() -> Self {
        Self {
            key: "NULL_MATERIAL".to_owned(),
            ..Self::invalid()
        }
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.kind != MaterialKind::Valid
    }
}

/// Texture reference produced by the material collaborator. The image
/// file is never opened here; it is carried by URI.
#[derive(Debug, Clone)]
pub struct ResolvedTexture {
    pub uri: String,
    pub offset: Option<[f32; 2]>,
    pub rotation: Option<f32>,
    pub scale: Option<[f32; 2]>,
}

/// How a batch's normals map onto its points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalDistribution {
    /// One normal per point.
    #[default]
    PerVertex,
    /// One normal per triangular facet.
    PerFacet,
}

/// One triangulated polygon batch, in the coordinate space of the
/// current traversal depth.
#[derive(Debug, Clone, Default)]
pub struct PolygonBatch {
    pub points: Vec<DVec3>,
    /// Triangles as point-index triples.
    pub facets: Vec<[u32; 3]>,
    pub normals: Option<Vec<DVec3>>,
    pub normal_distribution: NormalDistribution,
    pub uvs: Option<Vec<DVec2>>,
}

/// The external document accessor. Implemented by the host; the exporter
/// only ever calls inward through this trait.
pub trait ModelSource {
    /// Project-level properties for the asset header.
    fn document_info(&self) -> DocumentInfo {
        DocumentInfo::default()
    }

    /// Resolves an element handle in the active document context.
    /// `None` means the handle is dangling.
    fn element(&mut self, id: &ElementId) -> Option<ElementInfo>;

    /// The material-mapping collaborator: vendor shader graphs in,
    /// colors and texture URIs out.
    fn resolve_material(&mut self, node: &MaterialNode) -> ResolvedMaterial;

    /// Switches element/geometry resolution to a linked sub-document.
    fn enter_link_document(&mut self, _document: &str) {}

    /// Returns resolution to the previous document context.
    fn exit_link_document(&mut self) {}
}
