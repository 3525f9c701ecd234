//! Geometry reuse across repeated instances.
//!
//! At element end the finalized streams are hashed into a fixed-width
//! content digest; equal digests mean the element's geometry is treated
//! as identical to one already emitted, and the node reuses the existing
//! mesh index instead of growing the buffer. Digest collision without
//! true content equality is an accepted, unguarded risk.

use rustc_hash::FxHashMap;
use xxhash_rust::xxh3::xxh3_128;

use super::{FinalizedStream, StreamKey, QUANT_SCALE};

/// Computes the canonical content digest over an element's finalized
/// streams.
///
/// The serialization is canonical: streams are ordered by material key,
/// each stream contributes its fields in a fixed order, and all numeric
/// data is quantized to integers before hashing — the digest never
/// depends on map iteration order, float formatting, or locale.
#[must_use]
pub fn content_digest(streams: &[(StreamKey, FinalizedStream)]) -> u128 {
    let mut ordered: Vec<&(StreamKey, FinalizedStream)> = streams.iter().collect();
    ordered.sort_by(|a, b| a.0.material.cmp(&b.0.material));

    let mut canon: Vec<u8> = Vec::new();
    for (key, stream) in ordered {
        canon.extend_from_slice(&(key.material.len() as u64).to_le_bytes());
        canon.extend_from_slice(key.material.as_bytes());

        canon.extend_from_slice(&(stream.welded_keys.len() as u64).to_le_bytes());
        for vk in &stream.welded_keys {
            for c in vk.0 {
                canon.extend_from_slice(&c.to_le_bytes());
            }
        }

        canon.extend_from_slice(&(stream.indices.len() as u64).to_le_bytes());
        for i in &stream.indices {
            canon.extend_from_slice(&i.to_le_bytes());
        }

        push_quantized_channel(&mut canon, stream.normals.as_deref());
        push_quantized_channel(&mut canon, stream.texcoords.as_deref());
    }

    xxh3_128(&canon)
}

fn push_quantized_channel(canon: &mut Vec<u8>, channel: Option<&[f32]>) {
    match channel {
        Some(values) => {
            canon.push(1);
            canon.extend_from_slice(&(values.len() as u64).to_le_bytes());
            for v in values {
                let q = (f64::from(*v) * QUANT_SCALE).round() as i64;
                canon.extend_from_slice(&q.to_le_bytes());
            }
        }
        None => canon.push(0),
    }
}

/// digest → mesh index table, living for the whole session.
#[derive(Debug, Default)]
pub struct MeshCache {
    table: FxHashMap<u128, usize>,
}

impl MeshCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn lookup(&self, digest: u128) -> Option<usize> {
        self.table.get(&digest).copied()
    }

    pub fn record(&mut self, digest: u128, mesh_index: usize) {
        self.table.insert(digest, mesh_index);
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
