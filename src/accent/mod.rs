//! Accent System
//!
//! Projects the same parameter model the shaders consume into CSS custom
//! properties, so DOM chrome (glass panels, borders, shadows, transition
//! timing) stays mathematically aligned with the GPU visuals. The
//! projection itself is a pure function; `update` adds per-channel
//! frame-rate-independent smoothing in front of it.

use crate::params::{Channel, ParamSource, VisualParams};
use crate::utils::smoothing::{Ema, channel_tau};

/// The fixed transition easing every rhythm-timed element shares.
pub const RHYTHM_EASE: &str = "cubic-bezier(0.23, 1, 0.32, 1)";

/// One derived CSS custom property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccentVar {
    pub name: &'static str,
    pub value: String,
}

/// The channels the accent projection reads, in smoothing order.
const INPUT_CHANNELS: [Channel; 10] = [
    Channel::Hue,
    Channel::Saturation,
    Channel::Intensity,
    Channel::Chaos,
    Channel::Speed,
    Channel::Dimension,
    Channel::MorphFactor,
    Channel::Rot4dXw,
    Channel::Rot4dYw,
    Channel::Rot4dZw,
];

/// Smooths the parameter source and derives the CSS custom-property map.
pub struct AccentSystem {
    smoothers: [Ema; INPUT_CHANNELS.len()],
    last_time_ms: Option<f64>,
}

impl Default for AccentSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl AccentSystem {
    #[must_use]
    pub fn new() -> Self {
        Self {
            smoothers: INPUT_CHANNELS
                .map(|channel| Ema::new(channel_tau(channel).unwrap_or(0.1))),
            last_time_ms: None,
        }
    }

    /// Reads the source, advances every channel smoother by the elapsed
    /// time, and derives the property map from the smoothed values.
    pub fn update(&mut self, source: &dyn ParamSource, ts_ms: f64) -> Vec<AccentVar> {
        let raw = source.snapshot();
        let dt = self
            .last_time_ms
            .map_or(0.0, |last| ((ts_ms - last) / 1000.0).max(0.0) as f32);
        self.last_time_ms = Some(ts_ms);

        let mut smoothed = raw.clone();
        for (channel, smoother) in INPUT_CHANNELS.iter().zip(&mut self.smoothers) {
            let target = channel.clamp(channel.get(&raw));
            channel.set(&mut smoothed, smoother.advance(target, dt));
        }
        Self::derive(&smoothed)
    }

    /// Forgets smoothing history; the next update snaps to its input.
    pub fn reset(&mut self) {
        for smoother in &mut self.smoothers {
            smoother.reset();
        }
        self.last_time_ms = None;
    }

    /// The pure projection: clamps each input to its legal range and
    /// derives every property. Equal inputs yield identical output maps.
    #[must_use]
    pub fn derive(params: &VisualParams) -> Vec<AccentVar> {
        let hue = Channel::Hue.clamp(params.hue);
        let saturation = Channel::Saturation.clamp(params.saturation);
        let intensity = Channel::Intensity.clamp(params.intensity);
        let chaos = Channel::Chaos.clamp(params.chaos);
        let speed = Channel::Speed.clamp(params.speed);
        let dimension = Channel::Dimension.clamp(params.dimension);
        let morph = Channel::MorphFactor.clamp(params.morph_factor);

        let complement = (hue + 180.0).rem_euclid(360.0);
        let rot_magnitude = params.rot4d_w_magnitude();

        let mut vars = Vec::with_capacity(20);
        let mut push = |name: &'static str, value: String| vars.push(AccentVar { name, value });

        // Chromatic wheel.
        push("--accent-hue", fmt_hue(hue));
        push("--accent-complement", fmt_hue(complement));
        push("--accent-split-warm", fmt_hue((hue + 150.0).rem_euclid(360.0)));
        push("--accent-split-cool", fmt_hue((hue + 210.0).rem_euclid(360.0)));
        push("--accent-analogous-a", fmt_hue((hue + 60.0).rem_euclid(360.0)));
        push("--accent-analogous-b", fmt_hue((hue + 300.0).rem_euclid(360.0)));
        push("--accent-harmonic", fmt_hue((hue + 137.508).rem_euclid(360.0)));
        push("--accent-saturation", fmt_ratio(saturation));

        // Glass (complement coupling).
        push("--glass-depth", fmt_ratio(0.35 + intensity * 0.35));
        push("--glass-blur", fmt_px(12.0 + chaos * 20.0));
        push("--glass-tint", fmt_hue(complement));

        // Energy (reactive coupling).
        push(
            "--energy-intensity",
            fmt_ratio(0.05 + (rot_magnitude / 6.0).min(1.0) * 0.15),
        );
        push("--energy-hue", fmt_hue(complement));
        push("--energy-pulse", fmt_seconds(0.8 + (1.0 - speed / 3.0) * 2.4));

        // Depth (echo coupling).
        push("--depth-shadow", fmt_px(8.0 + (4.5 - dimension) * 16.0));
        push(
            "--depth-shadow-alpha",
            fmt_ratio(0.2 + (4.5 - dimension) / 6.0),
        );
        push("--depth-radius", fmt_px(12.0 + morph * 8.0));
        push("--depth-lift", fmt_px(morph * 2.0));

        // Rhythm (chase coupling).
        push("--rhythm-duration", fmt_seconds(0.4 + (1.0 - speed / 3.0)));
        push("--rhythm-ease", RHYTHM_EASE.to_string());

        vars
    }
}

// ---- Formatting: fixed fractional digits per unit family -------------------

fn fmt_hue(deg: f32) -> String {
    format!("{deg:.1}")
}

fn fmt_ratio(v: f32) -> String {
    format!("{v:.3}")
}

fn fmt_px(v: f32) -> String {
    format!("{v:.1}px")
}

fn fmt_seconds(v: f32) -> String {
    format!("{v:.2}s")
}
