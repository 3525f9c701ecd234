//! The traversal-driven export state machine.
//!
//! The host traversal engine owns iteration and calls into
//! [`ExportContext`] with ordered begin/end events. The context keeps all
//! session state — transform stack, geometry streams, registries, the
//! growing binary buffer — and emits the finished node/mesh/scene graph
//! when the traversal completes. One context is one export session:
//! construct it fresh, drive it, consume it with [`ExportContext::finish`].
//!
//! Event ordering contract (enforced by the driver, not re-verified
//! here): all instance/material/polygon-batch events for an element fall
//! strictly between that element's begin and end, and instance begin/end
//! pairs nest properly.

pub mod materials;
pub mod writer;

use std::collections::BTreeMap;

use glam::DAffine3;
use rustc_hash::FxHashSet;
use serde_json::Value;

use crate::buffer::BufferBuilder;
use crate::document::metadata::{MetadataExtensions, MetadataSchema, NodeMetadata, SchemaExtensions};
use crate::document::{
    self, Asset, Mesh, Node, Primitive, PrimitiveAttributes, Scene, MODE_TRIANGLES,
};
use crate::geometry::dedup::{self, MeshCache};
use crate::geometry::{StreamKey, StreamSet};
use crate::model::{ElementId, MaterialNode, ModelSource, NormalDistribution, PolygonBatch};
use crate::preferences::Preferences;
use crate::registry::Registry;
use crate::transform::{column_major, normal_matrix, z_up_to_y_up, TransformStack};
use self::writer::GltfArtifacts;

const ROOT_NODE_KEY: &str = "rootNode";
const NULL_MATERIAL_KEY: &str = "NULL_MATERIAL";
const IDENTITY_EPSILON: f64 = 1.0e-12;

/// What the driver should do with the subtree it just announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAction {
    Proceed,
    /// Do not descend; the driver must still deliver the matching end
    /// event.
    Skip,
}

struct CurrentElement {
    unique_id: String,
    name: String,
}

/// The export session: owns every piece of mutable state and the model
/// source for its lifetime.
pub struct ExportContext<S: ModelSource> {
    source: S,
    prefs: Preferences,

    // Document under construction
    nodes: Registry<Node>,
    meshes: Registry<Mesh>,
    materials: Registry<document::Material>,
    images: Registry<document::Image>,
    samplers: Registry<document::Sampler>,
    textures: Registry<document::Texture>,
    accessors: Vec<document::Accessor>,
    buffer_views: Vec<document::BufferView>,
    buffer: BufferBuilder,
    scenes: Vec<Scene>,
    asset: Asset,
    schema: MetadataSchema,
    extensions_used: Vec<String>,

    // Traversal state
    transforms: TransformStack,
    streams: StreamSet,
    mesh_cache: MeshCache,
    element: Option<CurrentElement>,
    skip_element: bool,
    instance_depth: u32,
    /// An instance pair already closed at depth 0 for this element —
    /// geometry arriving now was delivered after the instance closed.
    instance_end_completed: bool,
    /// The open element is attached under a non-root parent
    /// (super-component), which changes which transform the node bakes.
    non_root_parent: bool,
    cached_transform: DAffine3,
    current_material: Option<String>,
    placeholder_materials: FxHashSet<String>,
    material_has_texture: bool,
    khr_texture_transform_added: bool,
    skipped_links: u32,
    canceled: bool,
}

impl<S: ModelSource> ExportContext<S> {
    /// Opens a session: builds the root node and scene, records
    /// document-level properties into the asset header.
    pub fn new(source: S, prefs: Preferences) -> Self {
        let info = source.document_info();

        let mut extras = BTreeMap::new();
        for (key, value) in &info.properties {
            extras.insert(key.clone(), Value::String(value.clone()));
        }
        let asset = Asset {
            extras,
            ..Asset::default()
        };

        let mut root = Node::named(ROOT_NODE_KEY);
        if prefs.flip_axis {
            root.matrix = Some(column_major(&z_up_to_y_up()));
        }
        let mut nodes = Registry::new();
        nodes.insert_or_update(ROOT_NODE_KEY, root);

        let scenes = vec![Scene {
            name: info.name,
            nodes: vec![0],
        }];

        let mut extensions_used = Vec::new();
        if prefs.metadata {
            extensions_used.push("EXT_structural_metadata".to_owned());
        }

        log::info!("export session opened");

        Self {
            source,
            prefs,
            nodes,
            meshes: Registry::new(),
            materials: Registry::new(),
            images: Registry::new(),
            samplers: Registry::new(),
            textures: Registry::new(),
            accessors: Vec::new(),
            buffer_views: Vec::new(),
            buffer: BufferBuilder::new(),
            scenes,
            asset,
            schema: MetadataSchema::new(),
            extensions_used,
            transforms: TransformStack::new(),
            streams: StreamSet::new(),
            mesh_cache: MeshCache::new(),
            element: None,
            skip_element: false,
            instance_depth: 0,
            instance_end_completed: false,
            non_root_parent: false,
            cached_transform: DAffine3::IDENTITY,
            current_material: None,
            placeholder_materials: FxHashSet::default(),
            material_has_texture: false,
            khr_texture_transform_added: false,
            skipped_links: 0,
            canceled: false,
        }
    }

    // ========================================================================
    // Element lifecycle
    // ========================================================================

    /// Opens an element: filter, duplicate check, node creation, parent
    /// attachment, stream reset.
    pub fn begin_element(&mut self, id: &ElementId) -> NodeAction {
        self.instance_end_completed = false;
        self.non_root_parent = false;

        let info = match self.source.element(id) {
            Some(info) => info,
            None => {
                // Dangling handle: substitute a placeholder node rather
                // than aborting the session.
                log::warn!("element {id} did not resolve, emitting placeholder node");
                crate::model::ElementInfo {
                    unique_id: id.0.clone(),
                    type_name: Some("Unresolved Element".to_owned()),
                    visible: true,
                    ..crate::model::ElementInfo::default()
                }
            }
        };

        if !info.visible {
            log::debug!("element {id} filtered by view, skipping");
            self.skip_element = true;
            return NodeAction::Skip;
        }
        if self.nodes.contains(&info.unique_id) {
            log::debug!("element {id} already exported, skipping duplicate");
            self.skip_element = true;
            return NodeAction::Skip;
        }

        let name = info.display_name();
        log::debug!("element begin: {name}");

        let mut node = Node::named(name.clone());
        let class_display = class_display_name(&info);
        if self.prefs.metadata {
            let mut meta = NodeMetadata::with_class(&class_display);
            meta.insert_text("uniqueId", &info.unique_id);
            if let Some(level) = &info.level_id {
                meta.insert_text("levelId", level);
            }
            if let Some(category) = &info.category {
                meta.insert_text(
                    "categoryName",
                    &crate::document::metadata::gltf_name(category),
                );
            }
            for (param_name, value) in &info.parameters {
                meta.insert(param_name, value);
            }
            node.extensions = Some(MetadataExtensions {
                ext_structural_metadata: meta,
            });
            let class_key = self.schema.add_class(&class_display);
            self.schema.record_parameters(&class_key, &info.parameters);
        }

        let index = self.nodes.insert_or_update(&info.unique_id, node);

        // Attach under the super-component when one is already in the
        // graph, otherwise under the root.
        let mut parent_index = 0;
        if let Some(super_id) = &info.super_component {
            if let Some(super_info) = self.source.element(super_id) {
                if let Some(i) = self.nodes.index_of(&super_info.unique_id) {
                    parent_index = i;
                    self.non_root_parent = true;
                    if self.prefs.metadata {
                        if let Some(super_category) = &super_info.category {
                            let class_key =
                                crate::document::metadata::gltf_name(&class_display);
                            self.schema.set_parent(&class_key, super_category);
                        }
                    }
                }
            }
        }
        self.nodes.items_mut()[parent_index].children.push(index);

        self.streams.reset();
        self.element = Some(CurrentElement {
            unique_id: info.unique_id,
            name,
        });
        NodeAction::Proceed
    }

    /// Closes an element: finalize streams, dedup, assemble buffers on a
    /// miss, assign the mesh.
    pub fn end_element(&mut self, id: &ElementId) {
        if self.skip_element {
            self.skip_element = false;
            self.element = None;
            return;
        }
        let Some(current) = self.element.take() else {
            log::warn!("unmatched element end for {id}");
            return;
        };
        if self.streams.total_vertices() == 0 {
            // Grouping-only node: stays in the graph without a mesh.
            log::debug!("element end: {} (no geometry)", current.name);
            return;
        }

        let finalized = self.streams.finalize_all();
        let digest = dedup::content_digest(&finalized);

        if let Some(mesh_index) = self.mesh_cache.lookup(digest) {
            log::debug!("element end: {} reuses mesh {mesh_index}", current.name);
            if let Some(node) = self.nodes.current_mut() {
                node.mesh = Some(mesh_index);
            }
            return;
        }

        let mut primitives = Vec::with_capacity(finalized.len());
        for (key, stream) in &finalized {
            let stream_accessors =
                self.buffer
                    .append(stream, &mut self.accessors, &mut self.buffer_views);
            let material = if self.prefs.materials {
                // Placeholder materials keep streams separated but are
                // never referenced by primitives.
                self.materials
                    .index_of(&key.material)
                    .filter(|_| !self.placeholder_materials.contains(&key.material))
            } else {
                None
            };
            primitives.push(Primitive {
                attributes: PrimitiveAttributes {
                    position: stream_accessors.position,
                    normal: stream_accessors.normal,
                    texcoord_0: stream_accessors.texcoord,
                },
                indices: stream_accessors.indices,
                material,
                mode: Some(MODE_TRIANGLES),
            });
        }

        let mesh_index = self.meshes.insert_or_update(
            &current.unique_id,
            Mesh {
                name: Some(current.name.clone()),
                primitives,
            },
        );
        if let Some(node) = self.nodes.current_mut() {
            node.mesh = Some(mesh_index);
        }
        self.mesh_cache.record(digest, mesh_index);
        log::debug!("element end: {} -> mesh {mesh_index}", current.name);
    }

    // ========================================================================
    // Instances & links
    // ========================================================================

    pub fn begin_instance(&mut self, transform: DAffine3) {
        self.instance_depth += 1;
        self.transforms.push_composed(transform);
        log::trace!("instance begin, depth {}", self.instance_depth);
    }

    /// Closes an instance. In the local-space instancing mode the
    /// outermost close bakes the node matrix; the default world-space
    /// mode only unwinds the stack.
    pub fn end_instance(&mut self, transform: DAffine3) {
        self.instance_depth = self.instance_depth.saturating_sub(1);
        let popped = self.transforms.pop();
        log::trace!("instance end, depth {}", self.instance_depth);

        // Delivered even for skipped elements; only the stack unwinds.
        if self.skip_element {
            return;
        }
        if !self.prefs.instancing {
            // World-space mode: vertices were transformed as they
            // arrived, the node needs no matrix.
            return;
        }
        // Sub-instances (e.g. balusters inside a railing instance) close
        // without touching the node.
        if self.instance_depth > 0 {
            return;
        }

        if !popped.abs_diff_eq(DAffine3::IDENTITY, IDENTITY_EPSILON) {
            // Two event-ordering shapes exist for instanced elements.
            // Simple elements deliver geometry inside the instance pair
            // and the node takes the popped composite transform. Compound
            // elements (non-root parent) deliver geometry after the pair
            // closes and the node takes the instance's own transform,
            // re-fetched from the end event.
            let matrix = if self.non_root_parent {
                (!transform.abs_diff_eq(DAffine3::IDENTITY, IDENTITY_EPSILON))
                    .then(|| column_major(&transform))
            } else {
                Some(column_major(&popped))
            };
            if let Some(matrix) = matrix {
                if let Some(node) = self.nodes.current_mut() {
                    node.matrix = Some(matrix);
                }
            }
        }

        self.cached_transform = popped;
        self.instance_end_completed = true;
    }

    /// Enters a linked sub-document: one more transform on the stack and
    /// a document-context switch in the accessor.
    pub fn begin_link(&mut self, document: &str, transform: DAffine3) -> NodeAction {
        if !self.prefs.links {
            log::debug!("link {document} skipped (links disabled)");
            self.skipped_links += 1;
            return NodeAction::Skip;
        }
        log::debug!("link begin: {document}");
        self.transforms.push_composed(transform);
        self.source.enter_link_document(document);
        NodeAction::Proceed
    }

    pub fn end_link(&mut self) {
        if self.skipped_links > 0 {
            self.skipped_links -= 1;
            return;
        }
        self.transforms.pop();
        self.source.exit_link_document();
        log::debug!("link end");
    }

    // ========================================================================
    // Materials
    // ========================================================================

    /// Resolves and registers the active material; records whether it
    /// carries a texture, which controls texcoord accumulation for the
    /// polygon batches that follow.
    pub fn on_material(&mut self, material: &MaterialNode) {
        self.material_has_texture = false;

        if !self.prefs.materials {
            // Streams still separate per material identity even when no
            // material entries are emitted.
            self.current_material = Some(material.id.clone());
            return;
        }

        let resolved = self.source.resolve_material(material);
        self.current_material = Some(resolved.key.clone());

        let outcome = materials::register(
            &resolved,
            &self.prefs,
            &mut self.materials,
            &mut self.images,
            &mut self.samplers,
            &mut self.textures,
            &mut self.schema,
        );
        if resolved.is_placeholder() {
            self.placeholder_materials.insert(resolved.key.clone());
        }
        self.material_has_texture = outcome.has_texture;
        if outcome.has_texture && !self.khr_texture_transform_added && outcome.uses_transform {
            self.extensions_used.push("KHR_texture_transform".to_owned());
            self.khr_texture_transform_added = true;
        }
    }

    // ========================================================================
    // Polygon batches — the hot path
    // ========================================================================

    /// Accumulates one triangulated batch into the stream for the
    /// current `(element, material)` pair.
    pub fn on_polygon_batch(&mut self, batch: &PolygonBatch) {
        if self.skip_element {
            return;
        }
        let Some(current) = &self.element else {
            log::warn!("polygon batch outside an element, dropped");
            return;
        };
        if let Err(reason) = validate_batch(batch) {
            // One bad geometry read never aborts the traversal; the
            // element just loses this batch.
            log::error!("bad polygon batch for {}: {reason}", current.name);
            return;
        }

        let effective = self.transforms.current();
        let points: Vec<glam::DVec3> = if self.prefs.instancing {
            // Local-space mode. Two observed shapes need correcting:
            // geometry delivered after an empty instance pair arrives
            // pre-transformed and is pulled back to local space; nested
            // sub-instance geometry at depth 2 is composed forward.
            if self.instance_end_completed && self.instance_depth == 0 {
                let inverse = self.cached_transform.inverse();
                batch
                    .points
                    .iter()
                    .map(|p| inverse.transform_point3(*p))
                    .collect()
            } else if self.instance_depth == 2 {
                batch
                    .points
                    .iter()
                    .map(|p| effective.transform_point3(*p))
                    .collect()
            } else {
                batch.points.clone()
            }
        } else {
            batch
                .points
                .iter()
                .map(|p| effective.transform_point3(*p))
                .collect()
        };

        let normals = batch
            .normals
            .as_deref()
            .filter(|_| self.prefs.normals);
        let uvs = batch.uvs.as_deref().filter(|_| self.material_has_texture);
        let normal_mat = normal_matrix(&effective);

        let material_key = self
            .current_material
            .clone()
            .unwrap_or_else(|| NULL_MATERIAL_KEY.to_owned());
        let key = StreamKey::new(current.unique_id.clone(), material_key);
        let stream = self.streams.stream(key);

        for (facet_index, facet) in batch.facets.iter().enumerate() {
            for &point_index in facet {
                let welded = stream.weld(points[point_index as usize]);
                stream.push_face_index(welded);

                if let Some(normals) = normals {
                    let source_normal = match batch.normal_distribution {
                        NormalDistribution::PerVertex => normals[point_index as usize],
                        NormalDistribution::PerFacet => normals[facet_index],
                    };
                    let n = (normal_mat * source_normal).normalize_or_zero();
                    stream.set_normal(welded, n);
                }
                if let Some(uvs) = uvs {
                    stream.set_texcoord(welded, uvs[point_index as usize]);
                }
            }
        }

        log::trace!(
            "batch: {} facets into {} welded vertices",
            batch.facets.len(),
            stream.vertex_count()
        );
    }

    // ========================================================================
    // Session end
    // ========================================================================

    /// Flags the session as canceled; checked once, at [`Self::finish`].
    pub fn cancel(&mut self) {
        self.canceled = true;
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    /// Current transform-stack depth above the session root. Zero between
    /// top-level elements.
    #[must_use]
    pub fn transform_depth(&self) -> usize {
        self.transforms.depth()
    }

    /// Closes the session. A canceled session emits nothing; its state
    /// is dropped with the context either way.
    #[must_use]
    pub fn finish(self) -> Option<GltfArtifacts> {
        if self.canceled {
            log::info!("export session canceled, discarding buffered results");
            return None;
        }

        let byte_length = self.buffer.len();
        let buffers = if byte_length > 0 {
            vec![document::Buffer {
                byte_length,
                uri: None,
            }]
        } else {
            Vec::new()
        };

        log::info!(
            "export session finished: {} nodes, {} meshes, {} materials, {byte_length} buffer bytes",
            self.nodes.len(),
            self.meshes.len(),
            self.materials.len(),
        );

        let extensions = (self.prefs.metadata && !self.schema.is_empty()).then(|| {
            SchemaExtensions {
                ext_structural_metadata: self.schema,
            }
        });

        let document = document::Root {
            asset: self.asset,
            scene: Some(0),
            scenes: self.scenes,
            nodes: self.nodes.into_items(),
            meshes: self.meshes.into_items(),
            materials: self.materials.into_items(),
            accessors: self.accessors,
            buffer_views: self.buffer_views,
            buffers,
            images: self.images.into_items(),
            samplers: self.samplers.into_items(),
            textures: self.textures.into_items(),
            extensions_used: self.extensions_used,
            extensions,
        };

        Some(GltfArtifacts {
            document,
            binary: self.buffer.into_bytes(),
        })
    }
}

fn class_display_name(info: &crate::model::ElementInfo) -> String {
    match (&info.category, &info.family) {
        (Some(c), Some(f)) => format!("{c} {f}"),
        (Some(c), None) => c.clone(),
        (None, Some(f)) => f.clone(),
        (None, None) => "Undefined".to_owned(),
    }
}

fn validate_batch(batch: &PolygonBatch) -> std::result::Result<(), String> {
    let point_count = batch.points.len();
    for facet in &batch.facets {
        for &i in facet {
            if i as usize >= point_count {
                return Err(format!("facet index {i} out of {point_count} points"));
            }
        }
    }
    if let Some(normals) = &batch.normals {
        let expected = match batch.normal_distribution {
            NormalDistribution::PerVertex => point_count,
            NormalDistribution::PerFacet => batch.facets.len(),
        };
        if normals.len() < expected {
            return Err(format!(
                "{} normals for {expected} expected",
                normals.len()
            ));
        }
    }
    if let Some(uvs) = &batch.uvs {
        if uvs.len() < point_count {
            return Err(format!("{} uvs for {point_count} points", uvs.len()));
        }
    }
    Ok(())
}
