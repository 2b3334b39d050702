//! Layer Model
//!
//! The five-canvas stack and the relationship machinery that derives every
//! follower layer's parameters from one keystone layer.

pub mod graph;
pub mod manager;
pub mod profiles;
pub mod relationship;

pub use graph::{GraphConfig, LayerGraph};
pub use manager::{
    ImportReport, LayerPresetManager, LibraryExport, MemoryStore, PresetList, PresetMetadata,
    ProfileStore, SavedPreset,
};
pub use profiles::{BUILT_IN_PROFILES, built_in_profile, is_built_in_profile};
pub use relationship::{CustomRelationship, MirrorChannel, Relationship, RelationshipState};

use serde::{Deserialize, Serialize};

/// The fixed five-element canvas stack. Declaration order is both the
/// z-stack (back to front) and the natural iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Background,
    Shadow,
    Content,
    Highlight,
    Accent,
}

impl Layer {
    /// Back-to-front z order.
    pub const Z_ORDER: [Layer; 5] = [
        Layer::Background,
        Layer::Shadow,
        Layer::Content,
        Layer::Highlight,
        Layer::Accent,
    ];

    /// The default keystone.
    pub const DEFAULT_KEYSTONE: Layer = Layer::Content;

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Layer::Background => "background",
            Layer::Shadow => "shadow",
            Layer::Content => "content",
            Layer::Highlight => "highlight",
            Layer::Accent => "accent",
        }
    }

    /// Parses a layer name; the set is closed, anything else is an error at
    /// the config-import boundary.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Layer> {
        match name {
            "background" => Some(Layer::Background),
            "shadow" => Some(Layer::Shadow),
            "content" => Some(Layer::Content),
            "highlight" => Some(Layer::Highlight),
            "accent" => Some(Layer::Accent),
            _ => None,
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
