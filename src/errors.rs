//! Error Types
//!
//! This module defines the error types used throughout the rendering core.
//!
//! # Overview
//!
//! The main error type [`Vib3Error`] covers the failure modes that are
//! allowed to reach callers:
//! - backend acquisition failures (no adapter, no device, no surface)
//! - command buffer misuse (recording after seal, bad binary payloads)
//! - preset/profile conflicts and malformed graph configs
//!
//! GPU-facing failures (shader compile/link errors, pipeline rejection,
//! framebuffer completeness) are deliberately *not* part of this enum: they
//! are recorded on the affected object and surfaced on inspection, so a
//! broken shader never tears down the rest of the layer stack.
//!
//! # Usage
//!
//! All public APIs that can fail return [`Result<T>`], an alias for
//! `std::result::Result<T, Vib3Error>`.

use thiserror::Error;

/// The main error type for the VIB3 rendering core.
#[derive(Error, Debug)]
pub enum Vib3Error {
    // ========================================================================
    // GPU & Backend Errors
    // ========================================================================
    /// No usable GPU backend exists (WebGPU and GL fallbacks all failed).
    #[error("No WebGPU or WebGL-class adapter is available")]
    BackendUnavailable,

    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// Failed to create a rendering surface from the supplied target.
    #[error("Failed to create surface: {0}")]
    SurfaceCreateFailed(String),

    // ========================================================================
    // Command Buffer Errors
    // ========================================================================
    /// Attempted to record onto a sealed command buffer.
    #[error("Command buffer is sealed; call reset() before recording")]
    BufferSealed,

    /// Binary deserialization failed: bad magic, bad version, or truncation.
    #[error("Invalid command buffer payload: {0}")]
    InvalidBuffer(String),

    /// A `Custom` command (opaque callback) cannot be serialized.
    #[error("Command buffer contains a non-serializable Custom command")]
    UnserializableCommand,

    // ========================================================================
    // Layer Graph & Preset Errors
    // ========================================================================
    /// Attempted to save, delete, or import over a reserved built-in profile.
    #[error("'{0}' is a reserved built-in profile name")]
    PresetConflict(String),

    /// A graph config referenced a layer outside the fixed five-layer set.
    #[error("Unknown layer name: '{0}'")]
    LayerUnknown(String),

    /// A named user preset or built-in profile does not exist.
    #[error("Unknown profile: '{0}'")]
    ProfileNotFound(String),

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// JSON encoding/decoding error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Alias for `Result<T, Vib3Error>`.
pub type Result<T> = std::result::Result<T, Vib3Error>;
