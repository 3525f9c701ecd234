//! Per-element geometry accumulation: quantized vertex welding and
//! per-material triangle streams.
//!
//! During polygon-batch events every incoming vertex is welded into the
//! stream's local vertex table by quantized-position equality, and the
//! (new or reused) local index is appended to the stream's triangle list.
//! Welding is local to one `(element, material)` stream; streams never
//! share vertices across materials or elements.

pub mod dedup;

use glam::{DVec2, DVec3};
use rustc_hash::FxHashMap;

/// Positions are quantized to this fixed scale (one micro-unit) before
/// welding and hashing. The de-quantized key values are what end up in
/// the output buffers, so streams that are identical after quantization
/// are identical byte-for-byte.
pub const QUANT_SCALE: f64 = 1.0e6;

/// A position quantized to [`QUANT_SCALE`].
///
/// Equal keys within one stream always resolve to the same local vertex
/// index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexKey(pub [i64; 3]);

impl VertexKey {
    #[must_use]
    pub fn from_point(p: DVec3) -> Self {
        Self([
            (p.x * QUANT_SCALE).round() as i64,
            (p.y * QUANT_SCALE).round() as i64,
            (p.z * QUANT_SCALE).round() as i64,
        ])
    }

    /// The de-quantized position this key stands for.
    #[must_use]
    pub fn to_point(self) -> DVec3 {
        DVec3::new(
            self.0[0] as f64 / QUANT_SCALE,
            self.0[1] as f64 / QUANT_SCALE,
            self.0[2] as f64 / QUANT_SCALE,
        )
    }
}

/// Identity of one geometry stream: which element and which material the
/// accumulated triangles belong to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub element: String,
    pub material: String,
}

impl StreamKey {
    #[must_use]
    pub fn new(element: impl Into<String>, material: impl Into<String>) -> Self {
        Self {
            element: element.into(),
            material: material.into(),
        }
    }
}

/// Accumulator for one `(element, material)` stream: a welded vertex
/// table, a flat triangle-index list, and optional normal/texcoord
/// arrays aligned to the welded index space.
#[derive(Debug, Default, Clone)]
pub struct GeometryStream {
    table: FxHashMap<VertexKey, u32>,
    order: Vec<VertexKey>,
    faces: Vec<u32>,
    normals: Vec<DVec3>,
    texcoords: Vec<DVec2>,
    has_normals: bool,
    has_texcoords: bool,
}

impl GeometryStream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Welds `position` into the vertex table, returning its local index.
    ///
    /// Idempotent for equal quantized positions: the same key always
    /// yields the same index within this stream instance.
    pub fn weld(&mut self, position: DVec3) -> u32 {
        let key = VertexKey::from_point(position);
        if let Some(&i) = self.table.get(&key) {
            return i;
        }
        let i = self.order.len() as u32;
        self.table.insert(key, i);
        self.order.push(key);
        i
    }

    /// Appends one corner of a triangle.
    pub fn push_face_index(&mut self, index: u32) {
        self.faces.push(index);
    }

    /// Records the normal for a welded vertex. The first write for an
    /// index wins; later welds of the same position keep it.
    pub fn set_normal(&mut self, index: u32, normal: DVec3) {
        self.has_normals = true;
        let i = index as usize;
        if self.normals.len() <= i {
            self.normals.resize(i + 1, DVec3::Z);
        } else {
            return;
        }
        self.normals[i] = normal;
    }

    /// Records the texture coordinate for a welded vertex; first write
    /// wins, like [`Self::set_normal`].
    pub fn set_texcoord(&mut self, index: u32, uv: DVec2) {
        self.has_texcoords = true;
        let i = index as usize;
        if self.texcoords.len() <= i {
            self.texcoords.resize(i + 1, DVec2::ZERO);
        } else {
            return;
        }
        self.texcoords[i] = uv;
    }

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.order.len()
    }

    #[inline]
    #[must_use]
    pub fn index_count(&self) -> usize {
        self.faces.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Flattens the weld table in index order into plain arrays ready for
    /// buffer assembly and hashing.
    #[must_use]
    pub fn finalize(&self) -> FinalizedStream {
        let mut positions = Vec::with_capacity(self.order.len() * 3);
        for key in &self.order {
            let p = key.to_point();
            positions.push(p.x as f32);
            positions.push(p.y as f32);
            positions.push(p.z as f32);
        }

        let normals = self.has_normals.then(|| {
            let mut out = Vec::with_capacity(self.order.len() * 3);
            for i in 0..self.order.len() {
                let n = self.normals.get(i).copied().unwrap_or(DVec3::Z);
                out.push(n.x as f32);
                out.push(n.y as f32);
                out.push(n.z as f32);
            }
            out
        });

        let texcoords = self.has_texcoords.then(|| {
            let mut out = Vec::with_capacity(self.order.len() * 2);
            for i in 0..self.order.len() {
                let uv = self.texcoords.get(i).copied().unwrap_or(DVec2::ZERO);
                out.push(uv.x as f32);
                out.push(uv.y as f32);
            }
            out
        });

        FinalizedStream {
            welded_keys: self.order.clone(),
            positions,
            indices: self.faces.clone(),
            normals,
            texcoords,
        }
    }
}

/// A finalized stream: flat arrays in welded-index order.
#[derive(Debug, Clone)]
pub struct FinalizedStream {
    /// The welded quantized keys, index order. Canonical input for
    /// content hashing.
    pub welded_keys: Vec<VertexKey>,
    /// `x,y,z` per vertex.
    pub positions: Vec<f32>,
    /// Flat triangle list into the local vertex table.
    pub indices: Vec<u32>,
    /// `x,y,z` per vertex, if normals were accumulated.
    pub normals: Option<Vec<f32>>,
    /// `u,v` per vertex, if the stream's material carries a texture.
    pub texcoords: Option<Vec<f32>>,
}

impl FinalizedStream {
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.welded_keys.len()
    }
}

/// The set of streams accumulated for the current element, insertion
/// ordered. Reset at every element begin.
#[derive(Debug, Default)]
pub struct StreamSet {
    index: FxHashMap<StreamKey, usize>,
    streams: Vec<(StreamKey, GeometryStream)>,
}

impl StreamSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The stream for `key`, created on first use.
    pub fn stream(&mut self, key: StreamKey) -> &mut GeometryStream {
        if let Some(&i) = self.index.get(&key) {
            return &mut self.streams[i].1;
        }
        let i = self.streams.len();
        self.index.insert(key.clone(), i);
        self.streams.push((key, GeometryStream::new()));
        &mut self.streams[i].1
    }

    pub fn reset(&mut self) {
        self.index.clear();
        self.streams.clear();
    }

    #[must_use]
    pub fn total_vertices(&self) -> usize {
        self.streams.iter().map(|(_, s)| s.vertex_count()).sum()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StreamKey, &GeometryStream)> {
        self.streams.iter().map(|(k, s)| (k, s))
    }

    /// Finalizes every non-empty stream, insertion order.
    #[must_use]
    pub fn finalize_all(&self) -> Vec<(StreamKey, FinalizedStream)> {
        self.streams
            .iter()
            .filter(|(_, s)| !s.is_empty())
            .map(|(k, s)| (k.clone(), s.finalize()))
            .collect()
    }
}
