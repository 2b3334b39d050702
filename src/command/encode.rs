//! Command buffer serialization.
//!
//! Two equivalent encodings exist: a JSON document, and a framed binary
//! payload for FFI transport — magic `'VCB1'`, big-endian u32 format
//! version, big-endian u32 payload length, then the UTF-8 JSON document.
//! The wire numbering of command types is a cross-language contract and
//! must never be re-ordered; tags 0x13..=0x1F stay reserved, and commands
//! outside the original wire set use extension tags from 0x20 up.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, Vib3Error};

use super::buffer::{BufferStats, CommandBuffer, SortMode};
use super::{Command, RecordedCommand};

/// `'VCB1'`.
pub const BINARY_MAGIC: [u8; 4] = *b"VCB1";

/// Current format version, in the header and the JSON payload.
pub const FORMAT_VERSION: u32 = 1;

/// Normative wire tag of a command. `None` only for `Custom`, which does
/// not serialize.
#[must_use]
pub fn wire_tag(command: &Command) -> Option<u32> {
    let tag = match command {
        Command::Clear(_) => 0x01,
        Command::SetViewport { .. } => 0x02,
        Command::BindShader { .. } => 0x03,
        Command::SetUniform { .. } | Command::SetUniforms { .. } => 0x04,
        Command::BindVertexArray { .. } => 0x05,
        Command::BindIndexBuffer { .. } => 0x06,
        Command::Draw { .. } => 0x07,
        Command::DrawIndexed { .. } => 0x08,
        Command::DrawInstanced { .. } => 0x09,
        Command::SetBlendMode { .. } => 0x0A,
        Command::SetDepthState(_) => 0x0B,
        Command::PushState => 0x0C,
        Command::PopState => 0x0D,
        Command::SetScissor { .. } => 0x0E,
        Command::BindTexture { .. } => 0x10,
        Command::SetRotor { .. } => 0x11,
        Command::SetProjection(_) => 0x12,
        // Extension tags, above the reserved range.
        Command::SetState(_) => 0x20,
        Command::BindRenderTarget { .. } => 0x21,
        Command::DrawIndexedInstanced { .. } => 0x22,
        Command::Custom { .. } => return None,
    };
    Some(tag)
}

#[derive(Debug, Serialize, Deserialize)]
struct Payload {
    version: u32,
    sealed: bool,
    // Not part of the normative payload shape: absent in foreign payloads
    // (decodes to submission order) and omitted when it carries no
    // information.
    #[serde(
        rename = "sortMode",
        default,
        skip_serializing_if = "sort_mode_is_default"
    )]
    sort_mode: SortMode,
    commands: Vec<Entry>,
    stats: BufferStats,
}

fn sort_mode_is_default(mode: &SortMode) -> bool {
    *mode == SortMode::None
}

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    #[serde(rename = "type")]
    tag: u32,
    data: EntryData,
    timestamp: f64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryData {
    id: u64,
    sort_key: i64,
    priority: i32,
    depth: Option<f32>,
    label: Option<String>,
    command: Command,
}

impl CommandBuffer {
    /// Serializes to the JSON document form. Fails with
    /// [`Vib3Error::UnserializableCommand`] if a `Custom` command was
    /// recorded.
    pub fn to_json(&self) -> Result<String> {
        if self.has_custom_commands() {
            return Err(Vib3Error::UnserializableCommand);
        }
        let payload = Payload {
            version: FORMAT_VERSION,
            sealed: self.is_sealed(),
            sort_mode: self.sort_mode(),
            commands: self
                .commands()
                .iter()
                .map(|recorded| Entry {
                    tag: wire_tag(&recorded.command).expect("custom commands rejected above"),
                    data: EntryData {
                        id: recorded.id,
                        sort_key: recorded.sort_key,
                        priority: recorded.priority,
                        depth: recorded.depth,
                        label: recorded.label.clone(),
                        command: recorded.command.clone(),
                    },
                    timestamp: recorded.timestamp_ms,
                })
                .collect(),
            stats: self.stats(),
        };
        Ok(serde_json::to_string(&payload)?)
    }

    /// Reconstructs a buffer from the JSON document form.
    pub fn from_json(json: &str) -> Result<Self> {
        let payload: Payload =
            serde_json::from_str(json).map_err(|e| Vib3Error::InvalidBuffer(e.to_string()))?;
        if payload.version != FORMAT_VERSION {
            return Err(Vib3Error::InvalidBuffer(format!(
                "unsupported format version {}",
                payload.version
            )));
        }
        let mut commands = Vec::with_capacity(payload.commands.len());
        for entry in payload.commands {
            let expected = wire_tag(&entry.data.command);
            if expected != Some(entry.tag) {
                return Err(Vib3Error::InvalidBuffer(format!(
                    "command tag 0x{:02X} does not match its payload",
                    entry.tag
                )));
            }
            commands.push(RecordedCommand {
                id: entry.data.id,
                sort_key: entry.data.sort_key,
                priority: entry.data.priority,
                depth: entry.data.depth,
                label: entry.data.label,
                timestamp_ms: entry.timestamp,
                command: entry.data.command,
            });
        }
        Ok(Self::restore(
            commands,
            payload.sort_mode,
            payload.sealed,
            payload.stats,
        ))
    }

    /// Serializes to the framed binary form.
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        let json = self.to_json()?;
        let payload = json.as_bytes();
        let mut out = Vec::with_capacity(12 + payload.len());
        out.extend_from_slice(&BINARY_MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        Ok(out)
    }

    /// Reconstructs a buffer from the framed binary form.
    pub fn from_binary(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 12 {
            return Err(Vib3Error::InvalidBuffer("header truncated".to_string()));
        }
        if bytes[0..4] != BINARY_MAGIC {
            return Err(Vib3Error::InvalidBuffer("bad magic".to_string()));
        }
        let version = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != FORMAT_VERSION {
            return Err(Vib3Error::InvalidBuffer(format!(
                "unsupported format version {version}"
            )));
        }
        let length = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let Some(payload) = bytes.get(12..12 + length) else {
            return Err(Vib3Error::InvalidBuffer("payload truncated".to_string()));
        };
        let json = std::str::from_utf8(payload)
            .map_err(|e| Vib3Error::InvalidBuffer(e.to_string()))?;
        Self::from_json(json)
    }
}
