//! Output Writer Tests
//!
//! Tests for:
//! - GLB container layout (header, chunk alignment and padding)
//! - Embedded data-URI output
//! - Separate .gltf + .bin output with URI wiring

use std::collections::HashMap;

use glam::{DVec2, DVec3};

use bimgltf::{
    DocumentInfo, ElementId, ElementInfo, ExportContext, GltfArtifacts, MaterialNode,
    ModelSource, PolygonBatch, Preferences, ResolvedMaterial,
};

// ============================================================================
// Minimal session producing one triangle
// ============================================================================

#[derive(Default)]
struct OneWallModel;

impl ModelSource for OneWallModel {
    fn document_info(&self) -> DocumentInfo {
        DocumentInfo {
            name: Some("Writer Test".to_owned()),
            properties: Vec::new(),
        }
    }

    fn element(&mut self, id: &ElementId) -> Option<ElementInfo> {
        Some(ElementInfo {
            unique_id: id.0.clone(),
            category: Some("Walls".to_owned()),
            visible: true,
            ..ElementInfo::default()
        })
    }

    fn resolve_material(&mut self, _node: &MaterialNode) -> ResolvedMaterial {
        let mut m = ResolvedMaterial::invalid();
        m.key = "m".to_owned();
        m.name = "Plain".to_owned();
        m.kind = bimgltf::MaterialKind::Valid;
        m
    }
}

fn artifacts() -> GltfArtifacts {
    let mut ctx = ExportContext::new(OneWallModel, Preferences::default());
    let id = ElementId("w1".to_owned());
    ctx.begin_element(&id);
    ctx.on_material(&MaterialNode { id: "m".to_owned() });
    ctx.on_polygon_batch(&PolygonBatch {
        points: vec![DVec3::ZERO, DVec3::X, DVec3::Y],
        facets: vec![[0, 1, 2]],
        normals: Some(vec![DVec3::Z; 3]),
        uvs: Some(vec![DVec2::ZERO; 3]),
        ..PolygonBatch::default()
    });
    ctx.end_element(&id);
    ctx.finish().unwrap()
}

// ============================================================================
// GLB Tests
// ============================================================================

#[test]
fn glb_header_and_chunks() {
    let artifacts = artifacts();
    let glb = artifacts.to_glb().unwrap();

    assert_eq!(&glb[0..4], b"glTF");
    assert_eq!(u32::from_le_bytes(glb[4..8].try_into().unwrap()), 2);
    let total = u32::from_le_bytes(glb[8..12].try_into().unwrap()) as usize;
    assert_eq!(total, glb.len());
    assert_eq!(total % 4, 0);

    let json_len = u32::from_le_bytes(glb[12..16].try_into().unwrap()) as usize;
    assert_eq!(json_len % 4, 0);
    assert_eq!(&glb[16..20], b"JSON");

    let json: serde_json::Value =
        serde_json::from_slice(glb[20..20 + json_len].trim_ascii_end()).unwrap();
    assert_eq!(json["asset"]["version"], "2.0");
    // GLB buffers carry no URI.
    assert!(json["buffers"][0].get("uri").is_none());

    let bin_start = 20 + json_len;
    let bin_len = u32::from_le_bytes(glb[bin_start..bin_start + 4].try_into().unwrap()) as usize;
    assert_eq!(&glb[bin_start + 4..bin_start + 8], b"BIN\0");
    assert_eq!(bin_start + 8 + bin_len, glb.len());
    assert_eq!(
        &glb[bin_start + 8..bin_start + 8 + artifacts.binary.len()],
        &artifacts.binary[..]
    );
}

// ============================================================================
// Embedded Tests
// ============================================================================

#[test]
fn embedded_json_inlines_the_buffer() {
    let artifacts = artifacts();
    let json_text = artifacts.to_embedded_json().unwrap();
    let json: serde_json::Value = serde_json::from_str(&json_text).unwrap();

    let uri = json["buffers"][0]["uri"].as_str().unwrap();
    assert!(uri.starts_with("data:application/octet-stream;base64,"));
    assert_eq!(
        json["buffers"][0]["byteLength"].as_u64().unwrap() as usize,
        artifacts.binary.len()
    );
}

// ============================================================================
// File Output Tests
// ============================================================================

#[test]
fn write_gltf_produces_json_and_sibling_bin() {
    let artifacts = artifacts();
    let dir = std::env::temp_dir().join("bimgltf_writer_tests");
    std::fs::create_dir_all(&dir).unwrap();
    let gltf_path = dir.join("out.gltf");

    artifacts.write_gltf(&gltf_path).unwrap();

    let bin_path = dir.join("out.bin");
    let bin = std::fs::read(&bin_path).unwrap();
    assert_eq!(bin, artifacts.binary);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&gltf_path).unwrap()).unwrap();
    assert_eq!(json["buffers"][0]["uri"], "out.bin");
    assert_eq!(json["scenes"][0]["name"], "Writer Test");

    std::fs::remove_file(gltf_path).ok();
    std::fs::remove_file(bin_path).ok();
}
