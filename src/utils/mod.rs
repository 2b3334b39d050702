pub mod smoothing;
pub mod time;

pub use smoothing::{Ema, channel_tau};
pub use time::{format_iso8601, now_ms, unix_now_ms};
