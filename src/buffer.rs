//! Binary buffer assembly.
//!
//! Finished geometry streams are appended to one growing byte buffer in
//! a fixed order — positions, normals, texcoords, indices — each range
//! 4-byte aligned and exposed through a bufferView/accessor pair. Bytes,
//! once written, are never mutated or reordered; a session only ever
//! appends.

use crate::document::{
    Accessor, BufferView, COMPONENT_FLOAT, COMPONENT_UNSIGNED_BYTE, COMPONENT_UNSIGNED_INT,
    COMPONENT_UNSIGNED_SHORT, TARGET_ARRAY_BUFFER, TARGET_ELEMENT_ARRAY_BUFFER, TYPE_SCALAR,
    TYPE_VEC2, TYPE_VEC3,
};
use crate::geometry::FinalizedStream;

/// Accessor indices for one assembled stream, ready to be referenced
/// from a mesh primitive.
#[derive(Debug, Clone, Copy)]
pub struct StreamAccessors {
    pub position: usize,
    pub normal: Option<usize>,
    pub texcoord: Option<usize>,
    pub indices: usize,
}

/// The smallest index component type sufficient for `max_index`.
#[must_use]
pub fn index_component_type(max_index: u32) -> u32 {
    if max_index < 0x100 {
        COMPONENT_UNSIGNED_BYTE
    } else if max_index < 0x1_0000 {
        COMPONENT_UNSIGNED_SHORT
    } else {
        COMPONENT_UNSIGNED_INT
    }
}

/// Owner of the session's single growing binary buffer.
#[derive(Debug, Default)]
pub struct BufferBuilder {
    bytes: Vec<u8>,
}

impl BufferBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Appends one finalized stream, emitting its bufferViews and
    /// accessors. Content is deterministic for identical input; only the
    /// absolute byte offsets depend on prior buffer occupancy.
    pub fn append(
        &mut self,
        stream: &FinalizedStream,
        accessors: &mut Vec<Accessor>,
        views: &mut Vec<BufferView>,
    ) -> StreamAccessors {
        let vertex_count = stream.vertex_count();

        // Positions, with min/max bounds
        let (min, max) = position_bounds(&stream.positions);
        let view = self.push_f32_view(&stream.positions, views, TARGET_ARRAY_BUFFER);
        let position = accessors.len();
        accessors.push(Accessor {
            buffer_view: view,
            byte_offset: None,
            component_type: COMPONENT_FLOAT,
            count: vertex_count,
            accessor_type: TYPE_VEC3.to_owned(),
            min: Some(min),
            max: Some(max),
        });

        let normal = stream.normals.as_ref().map(|normals| {
            let view = self.push_f32_view(normals, views, TARGET_ARRAY_BUFFER);
            let i = accessors.len();
            accessors.push(Accessor {
                buffer_view: view,
                byte_offset: None,
                component_type: COMPONENT_FLOAT,
                count: vertex_count,
                accessor_type: TYPE_VEC3.to_owned(),
                min: None,
                max: None,
            });
            i
        });

        let texcoord = stream.texcoords.as_ref().map(|uvs| {
            let view = self.push_f32_view(uvs, views, TARGET_ARRAY_BUFFER);
            let i = accessors.len();
            accessors.push(Accessor {
                buffer_view: view,
                byte_offset: None,
                component_type: COMPONENT_FLOAT,
                count: vertex_count,
                accessor_type: TYPE_VEC2.to_owned(),
                min: None,
                max: None,
            });
            i
        });

        // Indices last, at the narrowest sufficient width
        let max_index = stream.indices.iter().copied().max().unwrap_or(0);
        let component_type = index_component_type(max_index);
        self.align();
        let byte_offset = self.bytes.len();
        match component_type {
            COMPONENT_UNSIGNED_BYTE => {
                for &i in &stream.indices {
                    self.bytes.push(i as u8);
                }
            }
            COMPONENT_UNSIGNED_SHORT => {
                for &i in &stream.indices {
                    self.bytes.extend_from_slice(&(i as u16).to_le_bytes());
                }
            }
            _ => {
                for &i in &stream.indices {
                    self.bytes.extend_from_slice(&i.to_le_bytes());
                }
            }
        }
        let view = views.len();
        views.push(BufferView {
            buffer: 0,
            byte_offset: Some(byte_offset),
            byte_length: self.bytes.len() - byte_offset,
            target: Some(TARGET_ELEMENT_ARRAY_BUFFER),
        });
        let indices = accessors.len();
        accessors.push(Accessor {
            buffer_view: view,
            byte_offset: None,
            component_type,
            count: stream.indices.len(),
            accessor_type: TYPE_SCALAR.to_owned(),
            min: None,
            max: None,
        });

        StreamAccessors {
            position,
            normal,
            texcoord,
            indices,
        }
    }

    fn align(&mut self) {
        while self.bytes.len() % 4 != 0 {
            self.bytes.push(0);
        }
    }

    fn push_f32_view(
        &mut self,
        values: &[f32],
        views: &mut Vec<BufferView>,
        target: u32,
    ) -> usize {
        self.align();
        let byte_offset = self.bytes.len();
        for v in values {
            self.bytes.extend_from_slice(&v.to_le_bytes());
        }
        let i = views.len();
        views.push(BufferView {
            buffer: 0,
            byte_offset: Some(byte_offset),
            byte_length: values.len() * 4,
            target: Some(target),
        });
        i
    }
}

fn position_bounds(positions: &[f32]) -> (Vec<f32>, Vec<f32>) {
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for chunk in positions.chunks_exact(3) {
        for axis in 0..3 {
            min[axis] = min[axis].min(chunk[axis]);
            max[axis] = max[axis].max(chunk[axis]);
        }
    }
    if positions.is_empty() {
        min = [0.0; 3];
        max = [0.0; 3];
    }
    (min.to_vec(), max.to_vec())
}
