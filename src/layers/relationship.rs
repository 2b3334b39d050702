//! The relationship catalog.
//!
//! A relationship is a pure function from the keystone parameter record to
//! one follower layer's record. Each preset is a tagged variant carrying
//! its config inline; per-layer transient state (smoothing histories, the
//! chase FIFO, the previous rotation sample) lives in a separate
//! [`RelationshipState`] slot advanced only by `resolve`. For identical
//! (inputs, state, time) the output is identical.

use std::collections::VecDeque;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::params::{Channel, VisualParams};

/// Longest history the chase FIFO keeps beyond its lag window, in ms.
const CHASE_HISTORY_SLACK_MS: f64 = 500.0;

/// The golden angle, the default harmonic hue offset.
pub const GOLDEN_ANGLE_DEG: f32 = 137.508;

/// One mirrored channel of a `complement` coupling. A missing center means
/// the channel's range midpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorChannel {
    pub channel: Channel,
    pub center: Option<f32>,
}

impl MirrorChannel {
    #[must_use]
    pub fn at_midpoint(channel: Channel) -> Self {
        Self {
            channel,
            center: None,
        }
    }
}

/// Host-provided relationship function. Replayable in-process, never
/// serializable.
#[derive(Clone)]
pub struct CustomRelationship(
    Rc<dyn Fn(&VisualParams, f64, &mut RelationshipState) -> VisualParams>,
);

impl CustomRelationship {
    #[must_use]
    pub fn new(
        f: impl Fn(&VisualParams, f64, &mut RelationshipState) -> VisualParams + 'static,
    ) -> Self {
        Self(Rc::new(f))
    }
}

impl std::fmt::Debug for CustomRelationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CustomRelationship(..)")
    }
}

impl PartialEq for CustomRelationship {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Per-layer transient state. Reset on profile load and config import.
#[derive(Debug, Clone, Default)]
pub struct RelationshipState {
    /// Smoothed channel values of the echo IIR.
    smoothed: Option<VisualParams>,
    /// Keystone snapshots for the chase lag, oldest first.
    history: VecDeque<(f64, VisualParams)>,
    /// Previous W-plane rotation sample for the reactive velocity estimate.
    prev_rot: Option<(f64, [f32; 3])>,
    last_time_ms: Option<f64>,
}

impl RelationshipState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A named, configurable derivation of one follower layer from the
/// keystone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "preset", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Relationship {
    /// Output equals input.
    Identity,
    /// Attenuated follower: channels scaled by `gain` lag behind the
    /// keystone through a first-order IIR whose step response reaches
    /// `1 - damp` after `delay_ms`.
    Echo { gain: f32, delay_ms: f32, damp: f32 },
    /// Inverted coupling: hue rotates 180°, opacity inverts against
    /// intensity, listed channels mirror around their centers.
    Complement {
        opacity: f32,
        channels: Vec<MirrorChannel>,
    },
    /// Hue-shifted companion.
    Harmonic { offset_deg: f32, intensity_bias: f32 },
    /// Intensity tracks the W-plane rotation velocity.
    Reactive { gain: f32, clamp: f32 },
    /// Timing lag: outputs the keystone snapshot from `lag_ms` ago.
    Chase { lag_ms: f32 },
    /// Reflects one channel about `center`.
    Symmetry { channel: Channel, center: f32 },
    /// Analogous hue plus coupled saturation.
    Chord { offset_deg: f32, sat_bias: f32 },
    /// Coupled chaos amplifier.
    Storm { chaos_gain: f32, speed_gain: f32 },
    /// The deprecated static multiplier table.
    Legacy { opacity: f32, density_mult: f32 },
    /// Host closure.
    #[serde(skip)]
    Custom(CustomRelationship),
}

impl Relationship {
    /// Harmonic at the golden angle with no intensity bias.
    #[must_use]
    pub fn harmonic_default() -> Self {
        Relationship::Harmonic {
            offset_deg: GOLDEN_ANGLE_DEG,
            intensity_bias: 0.0,
        }
    }

    #[must_use]
    pub fn preset_name(&self) -> &'static str {
        match self {
            Relationship::Identity => "identity",
            Relationship::Echo { .. } => "echo",
            Relationship::Complement { .. } => "complement",
            Relationship::Harmonic { .. } => "harmonic",
            Relationship::Reactive { .. } => "reactive",
            Relationship::Chase { .. } => "chase",
            Relationship::Symmetry { .. } => "symmetry",
            Relationship::Chord { .. } => "chord",
            Relationship::Storm { .. } => "storm",
            Relationship::Legacy { .. } => "legacy",
            Relationship::Custom(_) => "custom",
        }
    }

    #[must_use]
    pub fn is_serializable(&self) -> bool {
        !matches!(self, Relationship::Custom(_))
    }

    /// Derives the follower record and advances the state slot.
    pub fn resolve(
        &self,
        keystone: &VisualParams,
        state: &mut RelationshipState,
        time_ms: f64,
    ) -> VisualParams {
        let out = match self {
            Relationship::Identity => keystone.clone(),
            Relationship::Echo {
                gain,
                delay_ms,
                damp,
            } => resolve_echo(keystone, state, time_ms, *gain, *delay_ms, *damp),
            Relationship::Complement { opacity, channels } => {
                let mut out = keystone.clone();
                out.hue = (out.hue + 180.0).rem_euclid(360.0);
                out.layer_opacity = (opacity * (1.0 - keystone.intensity)).clamp(0.0, 1.0);
                for mirror in channels {
                    let center = mirror.center.unwrap_or_else(|| mirror.channel.midpoint());
                    let value = mirror.channel.get(keystone);
                    mirror
                        .channel
                        .set(&mut out, mirror.channel.clamp(2.0 * center - value));
                }
                out
            }
            Relationship::Harmonic {
                offset_deg,
                intensity_bias,
            } => {
                let mut out = keystone.clone();
                out.hue = (out.hue + offset_deg).rem_euclid(360.0);
                out.intensity = (out.intensity + intensity_bias).clamp(0.0, 1.0);
                out
            }
            Relationship::Reactive { gain, clamp } => {
                resolve_reactive(keystone, state, time_ms, *gain, *clamp)
            }
            Relationship::Chase { lag_ms } => resolve_chase(keystone, state, time_ms, *lag_ms),
            Relationship::Symmetry { channel, center } => {
                let mut out = keystone.clone();
                let value = channel.get(keystone);
                channel.set(&mut out, channel.clamp(2.0 * center - value));
                out
            }
            Relationship::Chord {
                offset_deg,
                sat_bias,
            } => {
                let mut out = keystone.clone();
                out.hue = (out.hue + offset_deg).rem_euclid(360.0);
                out.saturation = (out.saturation + sat_bias).clamp(0.0, 1.0);
                out
            }
            Relationship::Storm {
                chaos_gain,
                speed_gain,
            } => {
                let mut out = keystone.clone();
                out.chaos = (out.chaos * chaos_gain).clamp(0.0, 1.0);
                out.speed = (out.speed * speed_gain).clamp(0.1, 3.0);
                out
            }
            Relationship::Legacy {
                opacity,
                density_mult,
            } => {
                let mut out = keystone.clone();
                out.layer_opacity = *opacity;
                out.density_mult = *density_mult;
                out
            }
            Relationship::Custom(custom) => (custom.0)(keystone, time_ms, state),
        };
        state.last_time_ms = Some(time_ms);
        out
    }
}

/// Echo: scale the magnitude channels by `gain`, then drag every scalar
/// channel through a frame-rate-independent IIR. `tau` is derived from the
/// (delay, damp) pair: the step response covers `1 - damp` of a step after
/// `delay_ms`.
fn resolve_echo(
    keystone: &VisualParams,
    state: &mut RelationshipState,
    time_ms: f64,
    gain: f32,
    delay_ms: f32,
    damp: f32,
) -> VisualParams {
    let mut target = keystone.clone();
    target.intensity = (target.intensity * gain).clamp(0.0, 1.0);
    target.saturation = (target.saturation * gain).clamp(0.0, 1.0);
    target.layer_opacity = gain.clamp(0.0, 1.0);

    let Some(previous) = state.smoothed.clone() else {
        // First sample snaps to the target.
        state.smoothed = Some(target.clone());
        return target;
    };

    let dt_ms = state
        .last_time_ms
        .map_or(0.0, |last| (time_ms - last).max(0.0));
    if dt_ms <= 0.0 {
        // Time stood still; hold the smoothed value.
        return previous;
    }

    let damp = damp.clamp(1e-3, 1.0 - 1e-3);
    let tau_ms = f64::from(delay_ms.max(f32::EPSILON)) / f64::from(-damp.ln());
    let alpha = (1.0 - (-dt_ms / tau_ms).exp()) as f32;

    let mut out = target.clone();
    for channel in Channel::ALL {
        let prev = channel.get(&previous);
        let next = channel.get(&target);
        let value = if channel.wraps() {
            // Shortest-arc blend keeps the hue from sweeping the long way.
            let mut delta = (next - prev).rem_euclid(360.0);
            if delta > 180.0 {
                delta -= 360.0;
            }
            (prev + delta * alpha).rem_euclid(360.0)
        } else {
            prev + (next - prev) * alpha
        };
        channel.set(&mut out, value);
    }
    out.layer_opacity = previous.layer_opacity + (target.layer_opacity - previous.layer_opacity) * alpha;

    state.smoothed = Some(out.clone());
    out
}

/// Reactive: derived intensity follows the magnitude of the W-plane
/// rotation velocity.
fn resolve_reactive(
    keystone: &VisualParams,
    state: &mut RelationshipState,
    time_ms: f64,
    gain: f32,
    clamp: f32,
) -> VisualParams {
    let rot = [keystone.rot4d_xw, keystone.rot4d_yw, keystone.rot4d_zw];
    let velocity = match state.prev_rot {
        Some((prev_time, prev_rot)) if time_ms > prev_time => {
            let dt = ((time_ms - prev_time) / 1000.0) as f32;
            let dx = rot[0] - prev_rot[0];
            let dy = rot[1] - prev_rot[1];
            let dz = rot[2] - prev_rot[2];
            (dx * dx + dy * dy + dz * dz).sqrt() / dt
        }
        _ => 0.0,
    };
    state.prev_rot = Some((time_ms, rot));

    let mut out = keystone.clone();
    out.intensity = (keystone.intensity + gain * velocity.min(clamp)).clamp(0.0, 1.0);
    out
}

/// Chase: output the keystone snapshot from `lag_ms` ago, linearly
/// interpolated between the two bracketing samples.
fn resolve_chase(
    keystone: &VisualParams,
    state: &mut RelationshipState,
    time_ms: f64,
    lag_ms: f32,
) -> VisualParams {
    state.history.push_back((time_ms, keystone.clone()));

    let lag = f64::from(lag_ms.max(0.0));
    let target_time = time_ms - lag;
    while let Some((t, _)) = state.history.front() {
        if *t < target_time - CHASE_HISTORY_SLACK_MS && state.history.len() > 2 {
            state.history.pop_front();
        } else {
            break;
        }
    }

    // Find the two samples bracketing the target time.
    let mut before: Option<&(f64, VisualParams)> = None;
    let mut after: Option<&(f64, VisualParams)> = None;
    for sample in &state.history {
        if sample.0 <= target_time {
            before = Some(sample);
        } else {
            after = Some(sample);
            break;
        }
    }

    match (before, after) {
        (Some((t0, p0)), Some((t1, p1))) => {
            let span = t1 - t0;
            let t = if span > 0.0 {
                ((target_time - t0) / span) as f32
            } else {
                0.0
            };
            let mut out = p0.clone();
            for channel in Channel::ALL {
                let a = channel.get(p0);
                let b = channel.get(p1);
                let value = if channel.wraps() {
                    let mut delta = (b - a).rem_euclid(360.0);
                    if delta > 180.0 {
                        delta -= 360.0;
                    }
                    (a + delta * t).rem_euclid(360.0)
                } else {
                    a + (b - a) * t
                };
                channel.set(&mut out, value);
            }
            out
        }
        (Some((_, p0)), None) => p0.clone(),
        // Not enough history yet: the oldest snapshot stands in.
        (None, _) => state
            .history
            .front()
            .map_or_else(|| keystone.clone(), |(_, p)| p.clone()),
    }
}
