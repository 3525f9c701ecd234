//! File output for a finished session.
//!
//! Three output shapes, all carrying the same document: glTF JSON with a
//! sibling `.bin`, a single GLB container, or a single JSON file with
//! the buffer embedded as a base64 data URI. Any further packaging
//! (tiling, zipping) belongs to the caller.

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::document::Root;
use crate::errors::Result;

const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
const GLB_VERSION: u32 = 2;
const GLB_CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"
const GLB_CHUNK_BIN: u32 = 0x004E_4942; // "BIN\0"

/// Everything a finished session produced: the JSON document and the
/// binary buffer it references.
#[derive(Debug, Clone)]
pub struct GltfArtifacts {
    pub document: Root,
    pub binary: Vec<u8>,
}

impl GltfArtifacts {
    /// Writes `<path>` as glTF JSON and a sibling `.bin` holding the
    /// buffer, referenced by file name.
    pub fn write_gltf(&self, path: &Path) -> Result<()> {
        let bin_path = path.with_extension("bin");
        fs::write(&bin_path, &self.binary)?;

        let bin_uri = bin_path
            .file_name()
            .map_or_else(|| "buffer.bin".to_owned(), |n| n.to_string_lossy().into_owned());

        let document = self.document_with_uri(Some(bin_uri));
        fs::write(path, serde_json::to_string_pretty(&document)?)?;
        log::info!("wrote {} and {}", path.display(), bin_path.display());
        Ok(())
    }

    /// Writes a single binary GLB container.
    pub fn write_glb(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_glb()?)?;
        log::info!("wrote {}", path.display());
        Ok(())
    }

    /// Writes a single self-contained JSON file with the buffer embedded
    /// as a base64 data URI.
    pub fn write_embedded(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_embedded_json()?)?;
        log::info!("wrote {}", path.display());
        Ok(())
    }

    /// GLB container bytes: 12-byte header, space-padded JSON chunk,
    /// zero-padded BIN chunk.
    pub fn to_glb(&self) -> Result<Vec<u8>> {
        let document = self.document_with_uri(None);
        let json = serde_json::to_string(&document)?;
        let json_bytes = json.as_bytes();

        let json_padding = (4 - (json_bytes.len() % 4)) % 4;
        let padded_json_len = json_bytes.len() + json_padding;
        let bin_padding = (4 - (self.binary.len() % 4)) % 4;
        let padded_bin_len = self.binary.len() + bin_padding;

        let total_len = 12 + 8 + padded_json_len + 8 + padded_bin_len;
        let mut out = Vec::with_capacity(total_len);

        out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
        out.extend_from_slice(&GLB_VERSION.to_le_bytes());
        out.extend_from_slice(&(total_len as u32).to_le_bytes());

        out.extend_from_slice(&(padded_json_len as u32).to_le_bytes());
        out.extend_from_slice(&GLB_CHUNK_JSON.to_le_bytes());
        out.extend_from_slice(json_bytes);
        out.resize(out.len() + json_padding, b' ');

        out.extend_from_slice(&(padded_bin_len as u32).to_le_bytes());
        out.extend_from_slice(&GLB_CHUNK_BIN.to_le_bytes());
        out.extend_from_slice(&self.binary);
        out.resize(out.len() + bin_padding, 0);

        Ok(out)
    }

    /// JSON with the buffer as a `data:` URI.
    pub fn to_embedded_json(&self) -> Result<String> {
        let uri = format!(
            "data:application/octet-stream;base64,{}",
            BASE64.encode(&self.binary)
        );
        let document = self.document_with_uri(Some(uri));
        Ok(serde_json::to_string_pretty(&document)?)
    }

    fn document_with_uri(&self, uri: Option<String>) -> Root {
        let mut document = self.document.clone();
        if let Some(buffer) = document.buffers.first_mut() {
            buffer.uri = uri;
        }
        document
    }
}
