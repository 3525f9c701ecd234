//! Content Digest and Mesh Cache Tests
//!
//! Tests for:
//! - Digest equality for byte-identical streams after quantization
//! - Digest sensitivity to positions, indices, channels, material keys
//! - Canonical ordering (stream insertion order never matters)
//! - Mesh cache lookup/record

use glam::{DVec2, DVec3};

use bimgltf::geometry::dedup::{content_digest, MeshCache};
use bimgltf::geometry::{FinalizedStream, GeometryStream, StreamKey};

fn triangle_stream(offset: DVec3) -> FinalizedStream {
    let mut stream = GeometryStream::new();
    let i0 = stream.weld(offset);
    let i1 = stream.weld(offset + DVec3::X);
    let i2 = stream.weld(offset + DVec3::Y);
    for i in [i0, i1, i2] {
        stream.push_face_index(i);
    }
    stream.finalize()
}

// ============================================================================
// Digest Equality Tests
// ============================================================================

#[test]
fn identical_streams_hash_identically() {
    let a = vec![(StreamKey::new("e1", "m"), triangle_stream(DVec3::ZERO))];
    let b = vec![(StreamKey::new("e2", "m"), triangle_stream(DVec3::ZERO))];
    // Different elements, same per-material content: equal digests.
    assert_eq!(content_digest(&a), content_digest(&b));
}

#[test]
fn sub_quantum_jitter_does_not_change_the_digest() {
    let a = vec![(StreamKey::new("e", "m"), triangle_stream(DVec3::ZERO))];
    let b = vec![(
        StreamKey::new("e", "m"),
        triangle_stream(DVec3::splat(1.0e-9)),
    )];
    assert_eq!(content_digest(&a), content_digest(&b));
}

#[test]
fn moved_geometry_changes_the_digest() {
    let a = vec![(StreamKey::new("e", "m"), triangle_stream(DVec3::ZERO))];
    let b = vec![(
        StreamKey::new("e", "m"),
        triangle_stream(DVec3::new(10.0, 0.0, 0.0)),
    )];
    assert_ne!(content_digest(&a), content_digest(&b));
}

#[test]
fn material_key_participates_in_the_digest() {
    let a = vec![(StreamKey::new("e", "brick"), triangle_stream(DVec3::ZERO))];
    let b = vec![(StreamKey::new("e", "plaster"), triangle_stream(DVec3::ZERO))];
    assert_ne!(content_digest(&a), content_digest(&b));
}

#[test]
fn index_order_participates_in_the_digest() {
    let mut a = GeometryStream::new();
    let mut b = GeometryStream::new();
    for s in [&mut a, &mut b] {
        s.weld(DVec3::ZERO);
        s.weld(DVec3::X);
        s.weld(DVec3::Y);
    }
    for i in [0, 1, 2] {
        a.push_face_index(i);
    }
    for i in [0, 2, 1] {
        b.push_face_index(i);
    }
    let a = vec![(StreamKey::new("e", "m"), a.finalize())];
    let b = vec![(StreamKey::new("e", "m"), b.finalize())];
    assert_ne!(content_digest(&a), content_digest(&b));
}

#[test]
fn normal_channel_participates_in_the_digest() {
    let bare = triangle_stream(DVec3::ZERO);

    let mut with_normals = GeometryStream::new();
    let i0 = with_normals.weld(DVec3::ZERO);
    let i1 = with_normals.weld(DVec3::X);
    let i2 = with_normals.weld(DVec3::Y);
    for i in [i0, i1, i2] {
        with_normals.push_face_index(i);
        with_normals.set_normal(i, DVec3::Z);
    }

    let a = vec![(StreamKey::new("e", "m"), bare)];
    let b = vec![(StreamKey::new("e", "m"), with_normals.finalize())];
    assert_ne!(content_digest(&a), content_digest(&b));
}

#[test]
fn texcoord_values_participate_in_the_digest() {
    let make = |u: f64| {
        let mut s = GeometryStream::new();
        let i = s.weld(DVec3::ZERO);
        s.push_face_index(i);
        s.set_texcoord(i, DVec2::new(u, 0.0));
        vec![(StreamKey::new("e", "m"), s.finalize())]
    };
    assert_ne!(content_digest(&make(0.0)), content_digest(&make(0.5)));
}

// ============================================================================
// Canonical Ordering Tests
// ============================================================================

#[test]
fn stream_insertion_order_never_matters() {
    let brick = triangle_stream(DVec3::ZERO);
    let plaster = triangle_stream(DVec3::new(5.0, 0.0, 0.0));

    let forward = vec![
        (StreamKey::new("e", "brick"), brick.clone()),
        (StreamKey::new("e", "plaster"), plaster.clone()),
    ];
    let reversed = vec![
        (StreamKey::new("e", "plaster"), plaster),
        (StreamKey::new("e", "brick"), brick),
    ];
    assert_eq!(content_digest(&forward), content_digest(&reversed));
}

// ============================================================================
// Mesh Cache Tests
// ============================================================================

#[test]
fn cache_round_trip() {
    let mut cache = MeshCache::new();
    let digest = content_digest(&[(StreamKey::new("e", "m"), triangle_stream(DVec3::ZERO))]);

    assert!(cache.lookup(digest).is_none());
    cache.record(digest, 7);
    assert_eq!(cache.lookup(digest), Some(7));
    assert_eq!(cache.len(), 1);
}
