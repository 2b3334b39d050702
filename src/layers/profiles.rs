//! Built-in relationship profiles.
//!
//! Five named profiles ship with the core. Their names are reserved: the
//! preset manager refuses to save, delete, or import user presets under
//! them. Each profile keeps `content` as the keystone and assigns one
//! preset per follower layer.

use super::graph::GraphConfig;
use super::relationship::{GOLDEN_ANGLE_DEG, MirrorChannel, Relationship};
use super::Layer;
use crate::params::Channel;

/// The reserved profile names.
pub const BUILT_IN_PROFILES: [&str; 5] = ["holographic", "symmetry", "chord", "storm", "legacy"];

#[must_use]
pub fn is_built_in_profile(name: &str) -> bool {
    BUILT_IN_PROFILES.contains(&name)
}

/// The config of a built-in profile, `None` for unknown names.
#[must_use]
pub fn built_in_profile(name: &str) -> Option<GraphConfig> {
    let mut config = match name {
        // Echo'd backdrop, complementary shadow, golden-angle highlight,
        // rotation-reactive accent.
        "holographic" => GraphConfig::empty(Layer::Content)
            .with_layer(
                Layer::Background,
                Relationship::Echo {
                    gain: 0.6,
                    delay_ms: 120.0,
                    damp: 0.35,
                },
            )
            .with_layer(
                Layer::Shadow,
                Relationship::Complement {
                    opacity: 1.0,
                    channels: vec![MirrorChannel::at_midpoint(Channel::GridDensity)],
                },
            )
            .with_layer(
                Layer::Highlight,
                Relationship::Harmonic {
                    offset_deg: GOLDEN_ANGLE_DEG,
                    intensity_bias: 0.1,
                },
            )
            .with_layer(
                Layer::Accent,
                Relationship::Reactive {
                    gain: 2.0,
                    clamp: 3.0,
                },
            ),

        // Mirrored hue and morph planes around a slow echo, with a lagging
        // accent.
        "symmetry" => GraphConfig::empty(Layer::Content)
            .with_layer(
                Layer::Background,
                Relationship::Symmetry {
                    channel: Channel::Hue,
                    center: 180.0,
                },
            )
            .with_layer(
                Layer::Shadow,
                Relationship::Echo {
                    gain: 0.5,
                    delay_ms: 200.0,
                    damp: 0.5,
                },
            )
            .with_layer(
                Layer::Highlight,
                Relationship::Symmetry {
                    channel: Channel::MorphFactor,
                    center: 1.0,
                },
            )
            .with_layer(Layer::Accent, Relationship::Chase { lag_ms: 180.0 }),

        // Analogous hue triad with a complementary shadow.
        "chord" => GraphConfig::empty(Layer::Content)
            .with_layer(
                Layer::Background,
                Relationship::Chord {
                    offset_deg: 300.0,
                    sat_bias: -0.1,
                },
            )
            .with_layer(
                Layer::Shadow,
                Relationship::Complement {
                    opacity: 0.8,
                    channels: Vec::new(),
                },
            )
            .with_layer(
                Layer::Highlight,
                Relationship::Chord {
                    offset_deg: 60.0,
                    sat_bias: 0.05,
                },
            )
            .with_layer(
                Layer::Accent,
                Relationship::Harmonic {
                    offset_deg: GOLDEN_ANGLE_DEG,
                    intensity_bias: 0.15,
                },
            ),

        // Chaos amplification at two strengths, a damped echo floor, and a
        // hard-reacting accent.
        "storm" => GraphConfig::empty(Layer::Content)
            .with_layer(
                Layer::Background,
                Relationship::Storm {
                    chaos_gain: 1.6,
                    speed_gain: 1.25,
                },
            )
            .with_layer(
                Layer::Shadow,
                Relationship::Echo {
                    gain: 0.7,
                    delay_ms: 90.0,
                    damp: 0.3,
                },
            )
            .with_layer(
                Layer::Highlight,
                Relationship::Storm {
                    chaos_gain: 2.2,
                    speed_gain: 1.5,
                },
            )
            .with_layer(
                Layer::Accent,
                Relationship::Reactive {
                    gain: 3.0,
                    clamp: 4.0,
                },
            ),

        // The deprecated static multiplier table (opacity / density).
        // The keystone's own 0.8/1.0 row collapses into the identity.
        "legacy" => GraphConfig::empty(Layer::Content)
            .with_layer(
                Layer::Background,
                Relationship::Legacy {
                    opacity: 0.2,
                    density_mult: 0.4,
                },
            )
            .with_layer(
                Layer::Shadow,
                Relationship::Legacy {
                    opacity: 0.4,
                    density_mult: 0.8,
                },
            )
            .with_layer(
                Layer::Highlight,
                Relationship::Legacy {
                    opacity: 0.6,
                    density_mult: 1.5,
                },
            )
            .with_layer(
                Layer::Accent,
                Relationship::Legacy {
                    opacity: 0.3,
                    density_mult: 2.5,
                },
            ),

        _ => return None,
    };
    config.active_profile = Some(name.to_string());
    Some(config)
}
