//! Frame-rate-independent exponential smoothing.
//!
//! Every smoothed channel in the core (relationship lag, accent input
//! filtering) goes through the same first-order smoother with
//! `alpha = 1 - exp(-dt / tau)`, which makes the step response depend only
//! on wall-clock time, never on frame rate.

use crate::params::Channel;

/// First-order exponential moving average with a wall-clock time constant.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    /// Time constant in seconds.
    pub tau: f32,
    value: Option<f32>,
}

impl Ema {
    #[must_use]
    pub fn new(tau: f32) -> Self {
        Self { tau, value: None }
    }

    /// Advances the smoother by `dt` seconds toward `target` and returns the
    /// smoothed value. The first sample snaps to `target`.
    pub fn advance(&mut self, target: f32, dt: f32) -> f32 {
        let next = match self.value {
            None => target,
            Some(current) => {
                if self.tau <= f32::EPSILON || dt <= 0.0 {
                    target
                } else {
                    let alpha = 1.0 - (-dt / self.tau).exp();
                    current + (target - current) * alpha
                }
            }
        };
        self.value = Some(next);
        next
    }

    /// Current smoothed value, or `None` before the first sample.
    #[must_use]
    pub fn value(&self) -> Option<f32> {
        self.value
    }

    /// Forgets all history; the next sample snaps to its target.
    pub fn reset(&mut self) {
        self.value = None;
    }
}

/// Normative per-channel smoothing time constants, in seconds.
///
/// Channels not listed here are passed through unsmoothed.
#[must_use]
pub fn channel_tau(channel: Channel) -> Option<f32> {
    let tau = match channel {
        Channel::Speed => 0.08,
        Channel::Chaos | Channel::GridDensity => 0.10,
        Channel::MorphFactor | Channel::Intensity => 0.12,
        Channel::Saturation => 0.15,
        Channel::Dimension => 0.20,
        Channel::Hue => 0.25,
        Channel::Rot4dXw | Channel::Rot4dYw | Channel::Rot4dZw => 0.10,
        _ => return None,
    };
    Some(tau)
}
