//! Geometry Stream Tests
//!
//! Tests for:
//! - Quantized vertex welding (idempotence, index stability)
//! - Triangle index accumulation
//! - Stream finalization (positions, normals, texcoords in index order)
//! - Stream sets (per-material separation, reset)

use glam::{DVec2, DVec3};

use bimgltf::geometry::{GeometryStream, StreamKey, StreamSet, VertexKey, QUANT_SCALE};

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

// ============================================================================
// Vertex Key Tests
// ============================================================================

#[test]
fn vertex_key_quantizes_to_fixed_scale() {
    let key = VertexKey::from_point(DVec3::new(1.25, -2.5, 0.0));
    assert_eq!(key.0, [1_250_000, -2_500_000, 0]);
}

#[test]
fn vertex_key_round_trips_through_dequantization() {
    let p = DVec3::new(3.141592, -0.000001, 12.0);
    let key = VertexKey::from_point(p);
    let back = key.to_point();
    assert!((back.x - p.x).abs() < 1.0 / QUANT_SCALE);
    assert!((back.y - p.y).abs() < 1.0 / QUANT_SCALE);
    assert!((back.z - p.z).abs() < 1.0 / QUANT_SCALE);
}

#[test]
fn positions_within_quantum_collapse_to_one_key() {
    let a = VertexKey::from_point(DVec3::new(1.0, 2.0, 3.0));
    let b = VertexKey::from_point(DVec3::new(1.0 + 1.0e-8, 2.0, 3.0 - 1.0e-8));
    assert_eq!(a, b);
}

// ============================================================================
// Welding Tests
// ============================================================================

#[test]
fn welding_same_position_twice_returns_one_index() {
    let mut stream = GeometryStream::new();
    let i0 = stream.weld(DVec3::new(1.0, 2.0, 3.0));
    let i1 = stream.weld(DVec3::new(1.0, 2.0, 3.0));
    assert_eq!(i0, i1);
    assert_eq!(stream.vertex_count(), 1);
}

#[test]
fn distinct_positions_get_sequential_indices() {
    let mut stream = GeometryStream::new();
    assert_eq!(stream.weld(DVec3::ZERO), 0);
    assert_eq!(stream.weld(DVec3::X), 1);
    assert_eq!(stream.weld(DVec3::Y), 2);
    assert_eq!(stream.weld(DVec3::ZERO), 0);
    assert_eq!(stream.vertex_count(), 3);
}

#[test]
fn welding_is_local_to_one_stream() {
    let mut a = GeometryStream::new();
    let mut b = GeometryStream::new();
    a.weld(DVec3::new(5.0, 5.0, 5.0));
    let i = b.weld(DVec3::new(7.0, 7.0, 7.0));
    // A fresh stream starts its own index space.
    assert_eq!(i, 0);
}

// ============================================================================
// Finalization Tests
// ============================================================================

#[test]
fn finalize_flattens_in_weld_order() {
    let mut stream = GeometryStream::new();
    let i0 = stream.weld(DVec3::new(0.0, 0.0, 0.0));
    let i1 = stream.weld(DVec3::new(1.0, 0.0, 0.0));
    let i2 = stream.weld(DVec3::new(0.0, 1.0, 0.0));
    for i in [i0, i1, i2] {
        stream.push_face_index(i);
    }

    let finalized = stream.finalize();
    assert_eq!(finalized.vertex_count(), 3);
    assert_eq!(finalized.positions.len(), 9);
    assert!(approx(finalized.positions[3], 1.0));
    assert!(approx(finalized.positions[7], 1.0));
    assert_eq!(finalized.indices, vec![0, 1, 2]);
    assert!(finalized.normals.is_none());
    assert!(finalized.texcoords.is_none());
}

#[test]
fn finalize_aligns_normals_and_texcoords_to_vertices() {
    let mut stream = GeometryStream::new();
    let i0 = stream.weld(DVec3::ZERO);
    let i1 = stream.weld(DVec3::X);
    stream.set_normal(i0, DVec3::Z);
    stream.set_normal(i1, DVec3::Z);
    stream.set_texcoord(i0, DVec2::new(0.0, 0.0));
    stream.set_texcoord(i1, DVec2::new(1.0, 0.0));

    let finalized = stream.finalize();
    let normals = finalized.normals.expect("normals recorded");
    let texcoords = finalized.texcoords.expect("texcoords recorded");
    assert_eq!(normals.len(), 6);
    assert_eq!(texcoords.len(), 4);
    assert!(approx(normals[2], 1.0));
    assert!(approx(texcoords[2], 1.0));
}

#[test]
fn first_normal_write_wins_for_a_welded_vertex() {
    let mut stream = GeometryStream::new();
    let i = stream.weld(DVec3::ZERO);
    stream.set_normal(i, DVec3::X);
    stream.set_normal(i, DVec3::Y);

    let normals = stream.finalize().normals.unwrap();
    assert!(approx(normals[0], 1.0));
    assert!(approx(normals[1], 0.0));
}

// ============================================================================
// Stream Set Tests
// ============================================================================

#[test]
fn stream_set_separates_by_material() {
    let mut set = StreamSet::new();
    set.stream(StreamKey::new("wall", "brick")).weld(DVec3::ZERO);
    set.stream(StreamKey::new("wall", "plaster")).weld(DVec3::ZERO);
    set.stream(StreamKey::new("wall", "brick")).weld(DVec3::X);

    assert_eq!(set.iter().count(), 2);
    assert_eq!(set.total_vertices(), 3);
    let brick = set.stream(StreamKey::new("wall", "brick"));
    assert_eq!(brick.vertex_count(), 2);
}

#[test]
fn stream_set_reset_clears_everything() {
    let mut set = StreamSet::new();
    set.stream(StreamKey::new("a", "m")).weld(DVec3::ZERO);
    set.reset();
    assert!(set.is_empty());
    assert_eq!(set.total_vertices(), 0);
}

#[test]
fn finalize_all_skips_empty_streams() {
    let mut set = StreamSet::new();
    set.stream(StreamKey::new("a", "m")).weld(DVec3::ZERO);
    let _untouched = set.stream(StreamKey::new("a", "other"));

    let finalized = set.finalize_all();
    assert_eq!(finalized.len(), 1);
    assert_eq!(finalized[0].0.material, "m");
}
