//! Preset persistence.
//!
//! A thin facade over the graph that saves, loads, tunes, and shares named
//! relationship profiles. The manager borrows the graph per call and owns
//! only the storage handle it was given; storage is an injectable
//! key-value interface so hosts can plug in localStorage, a file, or the
//! in-memory default.

use log::warn;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::{Result, Vib3Error};
use crate::utils::time::{format_iso8601, unix_now_ms};

use super::graph::{GraphConfig, LayerGraph};
use super::profiles::{BUILT_IN_PROFILES, is_built_in_profile};
use super::Layer;

/// Default storage key.
pub const DEFAULT_STORAGE_KEY: &str = "vib3_layer_presets";

/// Injectable key-value storage.
pub trait ProfileStore {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&mut self, key: &str, value: &str);
}

/// The default in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: FxHashMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for MemoryStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: &str) {
        self.items.insert(key.to_string(), value.to_string());
    }
}

/// Optional descriptive metadata on a saved preset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresetMetadata {
    pub description: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// One persisted preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedPreset {
    pub name: String,
    pub config: GraphConfig,
    #[serde(default)]
    pub metadata: PresetMetadata,
}

/// `list()` result: user preset names plus the reserved built-ins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetList {
    pub user: Vec<String>,
    pub built_in: Vec<&'static str>,
}

/// Shareable library export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryExport {
    pub version: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub exported_at: String,
    pub count: usize,
    pub presets: BTreeMap<String, SavedPreset>,
}

/// `import_library` outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

/// Saves, loads, tunes and shares relationship profiles.
pub struct LayerPresetManager {
    store: Box<dyn ProfileStore>,
    storage_key: String,
}

impl Default for LayerPresetManager {
    fn default() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }
}

impl LayerPresetManager {
    #[must_use]
    pub fn new(store: Box<dyn ProfileStore>) -> Self {
        Self::with_storage_key(store, DEFAULT_STORAGE_KEY)
    }

    #[must_use]
    pub fn with_storage_key(store: Box<dyn ProfileStore>, storage_key: &str) -> Self {
        Self {
            store,
            storage_key: storage_key.to_string(),
        }
    }

    // ========================================================================
    // Persistence primitives
    // ========================================================================

    fn load_map(&self) -> BTreeMap<String, SavedPreset> {
        let Some(json) = self.store.get_item(&self.storage_key) else {
            return BTreeMap::new();
        };
        match serde_json::from_str(&json) {
            Ok(map) => map,
            Err(e) => {
                warn!("preset storage under '{}' is corrupt: {e}", self.storage_key);
                BTreeMap::new()
            }
        }
    }

    fn save_map(&mut self, map: &BTreeMap<String, SavedPreset>) -> Result<()> {
        let json = serde_json::to_string(map)?;
        self.store.set_item(&self.storage_key, &json);
        Ok(())
    }

    // ========================================================================
    // CRUD
    // ========================================================================

    /// Saves the graph's current configuration under `name`. Built-in
    /// profile names are reserved.
    pub fn save(
        &mut self,
        graph: &LayerGraph,
        name: &str,
        metadata: Option<PresetMetadata>,
    ) -> Result<()> {
        if is_built_in_profile(name) {
            return Err(Vib3Error::PresetConflict(name.to_string()));
        }
        let mut map = self.load_map();
        let now = format_iso8601(unix_now_ms());
        let mut metadata = metadata.unwrap_or_default();
        metadata.created_at = map
            .get(name)
            .and_then(|existing| existing.metadata.created_at.clone())
            .or(Some(now.clone()));
        metadata.updated_at = Some(now);

        map.insert(
            name.to_string(),
            SavedPreset {
                name: name.to_string(),
                config: graph.export_config(),
                metadata,
            },
        );
        self.save_map(&map)
    }

    /// Loads a built-in profile or a saved user preset into the graph.
    /// Returns `false` when the name is unknown.
    pub fn load(&self, graph: &mut LayerGraph, name: &str) -> bool {
        if is_built_in_profile(name) {
            return graph.load_profile(name).is_ok();
        }
        let map = self.load_map();
        match map.get(name) {
            Some(preset) => match graph.import_config(&preset.config) {
                Ok(()) => true,
                Err(e) => {
                    warn!("preset '{name}' failed to import: {e}");
                    false
                }
            },
            None => false,
        }
    }

    /// Deletes a user preset. Deleting a built-in fails with
    /// [`Vib3Error::PresetConflict`].
    pub fn delete(&mut self, name: &str) -> Result<bool> {
        if is_built_in_profile(name) {
            return Err(Vib3Error::PresetConflict(name.to_string()));
        }
        let mut map = self.load_map();
        let removed = map.remove(name).is_some();
        if removed {
            self.save_map(&map)?;
        }
        Ok(removed)
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        is_built_in_profile(name) || self.load_map().contains_key(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<SavedPreset> {
        self.load_map().get(name).cloned()
    }

    #[must_use]
    pub fn list(&self) -> PresetList {
        PresetList {
            user: self.load_map().keys().cloned().collect(),
            built_in: BUILT_IN_PROFILES.to_vec(),
        }
    }

    // ========================================================================
    // Tuning
    // ========================================================================

    /// Merges a config patch onto `layer`'s current relationship and
    /// re-instantiates it (fresh transient state). The patch is a JSON
    /// object of config fields, e.g. `{"gain": 0.4}`. Returns `false` when
    /// the layer has no tunable relationship or the merged config is
    /// invalid.
    pub fn tune(&self, graph: &mut LayerGraph, layer: Layer, patch: &serde_json::Value) -> bool {
        let Some(relationship) = graph.relationship(layer) else {
            return false;
        };
        if !relationship.is_serializable() {
            warn!("tune({layer}): custom relationships cannot be tuned");
            return false;
        }
        let Ok(mut value) = serde_json::to_value(relationship) else {
            return false;
        };
        let (Some(target), Some(fields)) = (value.as_object_mut(), patch.as_object()) else {
            return false;
        };
        for (key, field) in fields {
            if key == "preset" {
                continue;
            }
            target.insert(key.clone(), field.clone());
        }
        match serde_json::from_value(value) {
            Ok(merged) => {
                graph.set_relationship(layer, merged);
                true
            }
            Err(e) => {
                warn!("tune({layer}): merged config rejected: {e}");
                false
            }
        }
    }

    // ========================================================================
    // Library sharing
    // ========================================================================

    #[must_use]
    pub fn export_library(&self) -> LibraryExport {
        let presets = self.load_map();
        LibraryExport {
            version: "1.0".to_string(),
            kind: "vib3_layer_presets".to_string(),
            exported_at: format_iso8601(unix_now_ms()),
            count: presets.len(),
            presets,
        }
    }

    /// Imports a library. Reserved names are always skipped; existing user
    /// presets are skipped unless `overwrite`.
    pub fn import_library(&mut self, library: &LibraryExport, overwrite: bool) -> Result<ImportReport> {
        if library.kind != "vib3_layer_presets" {
            return Err(Vib3Error::InvalidBuffer(format!(
                "not a preset library: type '{}'",
                library.kind
            )));
        }
        let mut map = self.load_map();
        let mut report = ImportReport::default();
        for (name, preset) in &library.presets {
            if is_built_in_profile(name) || (!overwrite && map.contains_key(name)) {
                report.skipped += 1;
                continue;
            }
            map.insert(name.clone(), preset.clone());
            report.imported += 1;
        }
        self.save_map(&map)?;
        Ok(report)
    }
}
