//! The layer relationship graph.
//!
//! One designated keystone layer drives every other layer through its
//! relationship. The keystone is the single root; followers are leaves, so
//! cycles cannot be constructed. A layer without a relationship resolves to
//! the keystone unchanged.

use log::warn;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::{Result, Vib3Error};
use crate::params::VisualParams;

use super::profiles::built_in_profile;
use super::relationship::{Relationship, RelationshipState};
use super::Layer;

struct LayerSlot {
    relationship: Relationship,
    state: RelationshipState,
}

/// Serializable snapshot of a graph: keystone, per-layer relationships,
/// shader assignment, active profile metadata. Layer keys serialize as the
/// layer names, so foreign configs are validated on import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphConfig {
    pub keystone: Layer,
    /// Follower relationships, keyed by layer name.
    pub layers: BTreeMap<String, Relationship>,
    #[serde(default)]
    pub shaders: BTreeMap<String, String>,
    #[serde(default)]
    pub active_profile: Option<String>,
}

impl GraphConfig {
    #[must_use]
    pub fn empty(keystone: Layer) -> Self {
        Self {
            keystone,
            layers: BTreeMap::new(),
            shaders: BTreeMap::new(),
            active_profile: None,
        }
    }

    /// Builder used by the built-in profile table.
    #[must_use]
    pub fn with_layer(mut self, layer: Layer, relationship: Relationship) -> Self {
        self.layers.insert(layer.name().to_string(), relationship);
        self
    }
}

/// The graph: keystone + followers + optional shader assignment.
pub struct LayerGraph {
    keystone: Layer,
    slots: FxHashMap<Layer, LayerSlot>,
    shaders: FxHashMap<Layer, String>,
    active_profile: Option<String>,
}

impl Default for LayerGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerGraph {
    /// An empty graph: every layer resolves to the keystone identity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keystone: Layer::DEFAULT_KEYSTONE,
            slots: FxHashMap::default(),
            shaders: FxHashMap::default(),
            active_profile: None,
        }
    }

    /// A graph initialized from a built-in profile name.
    pub fn from_profile(name: &str) -> Result<Self> {
        let mut graph = Self::new();
        graph.load_profile(name)?;
        Ok(graph)
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Derives `layer`'s parameters from the keystone record.
    ///
    /// The keystone layer always resolves to its input unchanged; a layer
    /// without a relationship does too.
    pub fn resolve(
        &mut self,
        keystone: &VisualParams,
        layer: Layer,
        frame_time_ms: f64,
    ) -> VisualParams {
        if layer == self.keystone {
            return keystone.clone();
        }
        match self.slots.get_mut(&layer) {
            Some(slot) => slot
                .relationship
                .resolve(keystone, &mut slot.state, frame_time_ms),
            None => keystone.clone(),
        }
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    #[must_use]
    pub fn keystone(&self) -> Layer {
        self.keystone
    }

    /// Moves the keystone. The new keystone's own relationship is dropped
    /// (the keystone has none, by construction).
    pub fn set_keystone(&mut self, layer: Layer) {
        self.keystone = layer;
        self.slots.remove(&layer);
    }

    /// Installs a relationship for a follower layer with fresh state.
    /// Assigning to the keystone is ignored with a warning.
    pub fn set_relationship(&mut self, layer: Layer, relationship: Relationship) {
        if layer == self.keystone {
            warn!("set_relationship({layer}): layer is the keystone; ignored");
            return;
        }
        self.slots.insert(
            layer,
            LayerSlot {
                relationship,
                state: RelationshipState::new(),
            },
        );
    }

    /// Demotes a layer back to the keystone identity.
    pub fn remove_relationship(&mut self, layer: Layer) -> bool {
        self.slots.remove(&layer).is_some()
    }

    #[must_use]
    pub fn relationship(&self, layer: Layer) -> Option<&Relationship> {
        self.slots.get(&layer).map(|slot| &slot.relationship)
    }

    pub fn set_layer_shader(&mut self, layer: Layer, shader: impl Into<String>) {
        self.shaders.insert(layer, shader.into());
    }

    #[must_use]
    pub fn layer_shader(&self, layer: Layer) -> Option<&str> {
        self.shaders.get(&layer).map(String::as_str)
    }

    #[must_use]
    pub fn active_profile(&self) -> Option<&str> {
        self.active_profile.as_deref()
    }

    /// Drops every per-layer transient state (used on profile switches).
    pub fn reset_states(&mut self) {
        for slot in self.slots.values_mut() {
            slot.state.reset();
        }
    }

    // ========================================================================
    // Profiles and config round trips
    // ========================================================================

    /// Loads a built-in profile. All transient state is discarded.
    pub fn load_profile(&mut self, name: &str) -> Result<()> {
        let Some(config) = built_in_profile(name) else {
            return Err(Vib3Error::ProfileNotFound(name.to_string()));
        };
        self.apply_config_unchecked(&config);
        self.active_profile = Some(name.to_string());
        Ok(())
    }

    /// Exports the serializable snapshot. Custom (closure) relationships
    /// cannot be represented and are skipped with a warning.
    #[must_use]
    pub fn export_config(&self) -> GraphConfig {
        let mut config = GraphConfig::empty(self.keystone);
        for (layer, slot) in &self.slots {
            if slot.relationship.is_serializable() {
                config
                    .layers
                    .insert(layer.name().to_string(), slot.relationship.clone());
            } else {
                warn!("export_config: custom relationship on '{layer}' skipped");
            }
        }
        for (layer, shader) in &self.shaders {
            config.shaders.insert(layer.name().to_string(), shader.clone());
        }
        config.active_profile = self.active_profile.clone();
        config
    }

    /// Replaces the graph from a config snapshot. Unknown layer names fail
    /// with [`Vib3Error::LayerUnknown`]; transient state is reset.
    pub fn import_config(&mut self, config: &GraphConfig) -> Result<()> {
        // Validate before mutating anything.
        for name in config.layers.keys().chain(config.shaders.keys()) {
            if Layer::from_name(name).is_none() {
                return Err(Vib3Error::LayerUnknown(name.clone()));
            }
        }
        self.apply_config_unchecked(config);
        self.active_profile = config.active_profile.clone();
        Ok(())
    }

    fn apply_config_unchecked(&mut self, config: &GraphConfig) {
        self.keystone = config.keystone;
        self.slots.clear();
        self.shaders.clear();
        for (name, relationship) in &config.layers {
            let Some(layer) = Layer::from_name(name) else {
                continue;
            };
            if layer == config.keystone {
                warn!("config assigns a relationship to the keystone '{layer}'; dropped");
                continue;
            }
            self.slots.insert(
                layer,
                LayerSlot {
                    relationship: relationship.clone(),
                    state: RelationshipState::new(),
                },
            );
        }
        for (name, shader) in &config.shaders {
            if let Some(layer) = Layer::from_name(name) {
                self.shaders.insert(layer, shader.clone());
            }
        }
    }
}
