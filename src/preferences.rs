//! Export preferences.
//!
//! Options toggling what the traversal accumulates and how node
//! transforms are baked. Serializable so a front end can persist them
//! per project.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    /// Resolve and emit materials; off leaves primitives unmaterialed.
    pub materials: bool,
    /// Emit base-color textures (and texture coordinates) for materials
    /// that carry one.
    pub textures: bool,
    /// Accumulate and emit vertex normals.
    pub normals: bool,
    /// Descend into linked sub-documents.
    pub links: bool,
    /// Attach structural-metadata classes and property maps.
    pub metadata: bool,
    /// Keep instanced geometry in local space so repeated instances can
    /// share meshes via node matrices. Off by default: depth tracking
    /// across all observed event shapes is not reliable enough, so the
    /// default path bakes world-space vertices instead.
    pub instancing: bool,
    /// Rotate the root node from Z-up model space to glTF's Y-up.
    pub flip_axis: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            materials: true,
            textures: true,
            normals: true,
            links: false,
            metadata: true,
            instancing: false,
            flip_axis: false,
        }
    }
}

impl Preferences {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip() {
        let mut prefs = Preferences::default();
        prefs.links = true;
        prefs.normals = false;
        let restored = Preferences::from_json(&prefs.to_json().unwrap()).unwrap();
        assert!(restored.links);
        assert!(!restored.normals);
        assert!(restored.materials);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let prefs = Preferences::from_json("{}").unwrap();
        assert!(prefs.materials);
        assert!(!prefs.instancing);
    }
}
