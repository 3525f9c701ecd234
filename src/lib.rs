#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod buffer;
pub mod document;
pub mod errors;
pub mod export;
pub mod geometry;
pub mod model;
pub mod preferences;
pub mod registry;
pub mod transform;

pub use buffer::{BufferBuilder, StreamAccessors};
pub use document::{Accessor, Buffer, BufferView, Mesh, Node, Primitive, Root, Scene};
pub use errors::{ExportError, Result};
pub use export::writer::GltfArtifacts;
pub use export::{ExportContext, NodeAction};
pub use geometry::dedup::MeshCache;
pub use geometry::{FinalizedStream, GeometryStream, StreamKey, StreamSet, VertexKey};
pub use model::{
    DocumentInfo, ElementId, ElementInfo, MaterialKind, MaterialNode, ModelSource,
    NormalDistribution, ParameterValue, PolygonBatch, ResolvedMaterial, ResolvedTexture,
};
pub use preferences::Preferences;
pub use registry::Registry;
pub use transform::TransformStack;
