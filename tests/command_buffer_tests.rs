//! Command Buffer Tests
//!
//! Tests for:
//! - Recording, chaining, seal/version semantics
//! - Default priorities and the four sort algorithms (idempotence included)
//! - Execution dispatch against a recording backend
//! - JSON + binary serialization: magic bytes, round trips, rejection of
//!   bad payloads and Custom commands
//! - The buffer pool

mod common;

use common::RecordingBackend;
use vib3::Backend;
use vib3::backend::ClearRequest;
use vib3::command::encode::{BINARY_MAGIC, wire_tag};
use vib3::command::{Command, CommandBuffer, CommandBufferPool, SortMode};
use vib3::errors::Vib3Error;
use vib3::state::RenderState;
use vib3::UniformValue;

fn scenario_buffer() -> CommandBuffer {
    // clear; setViewport; setPipeline("holographic"); setUniforms; draw(6)
    let mut buffer = CommandBuffer::new();
    buffer
        .clear(ClearRequest::color_only([0.0, 0.0, 0.0, 1.0]))
        .unwrap()
        .set_viewport(0, 0, 400, 400)
        .unwrap()
        .set_pipeline("holographic")
        .unwrap()
        .set_uniforms([("u_time".to_string(), UniformValue::Float(0.5))])
        .unwrap()
        .draw(6)
        .unwrap();
    buffer
}

// ============================================================================
// Recording Tests
// ============================================================================

#[test]
fn recording_updates_stats_and_version() {
    let buffer = scenario_buffer();
    let stats = buffer.stats();
    assert_eq!(stats.command_count, 5);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.triangles, 2);
    assert_eq!(buffer.version(), 5, "every record bumps the version");
}

#[test]
fn command_ids_are_monotonic() {
    let buffer = scenario_buffer();
    let ids: Vec<u64> = buffer.commands().iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
}

#[test]
fn sealed_buffer_rejects_recording() {
    let mut buffer = scenario_buffer();
    buffer.seal();
    assert!(buffer.is_sealed());
    assert!(matches!(buffer.draw(3), Err(Vib3Error::BufferSealed)));
}

#[test]
fn reset_reopens_a_sealed_buffer() {
    let mut buffer = scenario_buffer();
    buffer.seal();
    buffer.reset();
    assert!(!buffer.is_sealed());
    assert!(buffer.is_empty());
    assert_eq!(buffer.stats().command_count, 0);
    buffer.draw(3).unwrap();
    assert_eq!(buffer.len(), 1);
}

#[test]
fn depth_and_label_attach_to_the_next_command() {
    let mut buffer = CommandBuffer::new();
    buffer.depth(2.5).label("far quad").draw(6).unwrap();
    buffer.draw(6).unwrap();
    let commands = buffer.commands();
    assert_eq!(commands[0].depth, Some(2.5));
    assert_eq!(commands[0].label.as_deref(), Some("far quad"));
    assert_eq!(commands[1].depth, None, "depth applies to one command only");
}

// ============================================================================
// Priority Tests
// ============================================================================

#[test]
fn default_priorities_follow_the_phase_table() {
    assert_eq!(
        Command::Clear(ClearRequest::default()).default_priority(),
        1000
    );
    assert_eq!(
        Command::BindRenderTarget { target: None }.default_priority(),
        950
    );
    assert_eq!(
        Command::SetState(RenderState::opaque()).default_priority(),
        900
    );
    assert_eq!(
        Command::BindShader {
            name: "x".to_string()
        }
        .default_priority(),
        800
    );
    assert_eq!(
        Command::BindTexture {
            texture: 1,
            slot: 0
        }
        .default_priority(),
        700
    );
    assert_eq!(Command::BindVertexArray { vao: 1 }.default_priority(), 600);
    assert_eq!(
        Command::SetUniform {
            name: "u_time".to_string(),
            value: UniformValue::Float(0.0)
        }
        .default_priority(),
        500
    );
    assert_eq!(
        Command::Draw {
            vertex_count: 3,
            first_vertex: 0
        }
        .default_priority(),
        0
    );
}

// ============================================================================
// Sort Tests
// ============================================================================

#[test]
fn state_sort_orders_by_descending_priority() {
    let mut buffer = CommandBuffer::with_sort_mode(SortMode::State);
    buffer.draw(3).unwrap();
    buffer.set_pipeline("p").unwrap();
    buffer.clear(ClearRequest::default()).unwrap();
    buffer.sort();

    let priorities: Vec<i32> = buffer.commands().iter().map(|c| c.priority).collect();
    assert_eq!(priorities, vec![1000, 800, 0]);
}

#[test]
fn state_sort_breaks_ties_on_sort_key() {
    let mut buffer = CommandBuffer::with_sort_mode(SortMode::State);
    buffer.sort_key(5).set_pipeline("b").unwrap();
    buffer.sort_key(1).set_pipeline("a").unwrap();
    buffer.sort();

    let names: Vec<&str> = buffer
        .commands()
        .iter()
        .map(|c| match &c.command {
            Command::BindShader { name } => name.as_str(),
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn sort_is_idempotent() {
    for mode in [SortMode::State, SortMode::FrontToBack, SortMode::BackToFront] {
        let mut buffer = CommandBuffer::with_sort_mode(mode);
        buffer.depth(3.0).draw(6).unwrap();
        buffer.clear(ClearRequest::default()).unwrap();
        buffer.depth(1.0).draw(6).unwrap();
        buffer.set_pipeline("p").unwrap();
        buffer.depth(2.0).draw(6).unwrap();

        buffer.sort();
        let once: Vec<u64> = buffer.commands().iter().map(|c| c.id).collect();
        buffer.sort();
        buffer.sort();
        let thrice: Vec<u64> = buffer.commands().iter().map(|c| c.id).collect();
        assert_eq!(once, thrice, "{mode:?} sort must be idempotent");
    }
}

#[test]
fn front_to_back_sorts_draws_by_ascending_depth() {
    let mut buffer = CommandBuffer::with_sort_mode(SortMode::FrontToBack);
    buffer.depth(3.0).draw(6).unwrap();
    buffer.set_pipeline("p").unwrap();
    buffer.depth(1.0).draw(6).unwrap();
    buffer.depth(2.0).draw(6).unwrap();
    buffer.sort();

    let commands = buffer.commands();
    // Non-draw first, then draws by ascending depth.
    assert!(matches!(commands[0].command, Command::BindShader { .. }));
    let depths: Vec<f32> = commands[1..].iter().filter_map(|c| c.depth).collect();
    assert_eq!(depths, vec![1.0, 2.0, 3.0]);
}

#[test]
fn back_to_front_sorts_draws_by_descending_depth() {
    let mut buffer = CommandBuffer::with_sort_mode(SortMode::BackToFront);
    buffer.depth(1.0).draw(6).unwrap();
    buffer.depth(3.0).draw(6).unwrap();
    buffer.depth(2.0).draw(6).unwrap();
    buffer.sort();

    let depths: Vec<f32> = buffer.commands().iter().filter_map(|c| c.depth).collect();
    assert_eq!(depths, vec![3.0, 2.0, 1.0]);
}

#[test]
fn none_mode_preserves_submission_order() {
    let mut buffer = CommandBuffer::new();
    buffer.draw(3).unwrap();
    buffer.clear(ClearRequest::default()).unwrap();
    buffer.sort();
    let ids: Vec<u64> = buffer.commands().iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn custom_comparator_drives_the_order() {
    let mut buffer = CommandBuffer::with_sort_mode(SortMode::Custom);
    buffer.sort_key(2).draw(3).unwrap();
    buffer.sort_key(9).draw(3).unwrap();
    buffer.sort_key(4).draw(3).unwrap();
    buffer.set_comparator(|a, b| b.sort_key.cmp(&a.sort_key));
    buffer.sort();
    let keys: Vec<i64> = buffer.commands().iter().map(|c| c.sort_key).collect();
    assert_eq!(keys, vec![9, 4, 2]);
}

#[test]
fn mutation_invalidates_the_sorted_bit() {
    let mut buffer = CommandBuffer::with_sort_mode(SortMode::State);
    buffer.draw(3).unwrap();
    buffer.clear(ClearRequest::default()).unwrap();
    buffer.sort();
    buffer.set_pipeline("late").unwrap();
    buffer.sort();
    // The late bind must have been re-sorted above the draw.
    assert!(matches!(
        buffer.commands()[1].command,
        Command::BindShader { .. }
    ));
}

// ============================================================================
// Execution Tests
// ============================================================================

#[test]
fn execute_dispatches_in_sorted_order() {
    let mut backend = RecordingBackend::new().with_program("holographic");
    let mut buffer = scenario_buffer();
    let stats = buffer.execute(&mut backend);

    assert_eq!(stats.command_count, 5);
    assert_eq!(backend.stats().draw_calls, 1);
    assert!(backend.log_str().contains("bind_shader(holographic)"));
    assert!(backend.log_str().ends_with("draw(6)"));
}

#[test]
fn execute_with_profiling_reports_a_time() {
    let mut backend = RecordingBackend::new().with_program("holographic");
    let mut buffer = scenario_buffer();
    let report = buffer.execute_with_profiling(&mut backend);
    assert_eq!(report.stats.draw_calls, 1);
    assert!(report.execution_time_ms >= 0.0);
}

#[test]
fn custom_commands_execute_in_process() {
    let mut backend = RecordingBackend::new();
    let mut buffer = CommandBuffer::new();
    buffer
        .custom(|backend| backend.set_rotor([0.0; 8]))
        .unwrap();
    buffer.execute(&mut backend);
    assert_eq!(backend.log_str(), "set_rotor");
}

// ============================================================================
// Serialization Tests
// ============================================================================

#[test]
fn binary_header_is_vcb1_with_version_one() {
    let buffer = scenario_buffer();
    let bytes = buffer.to_binary().unwrap();
    assert_eq!(&bytes[0..4], b"VCB1");
    assert_eq!(&bytes[0..4], &BINARY_MAGIC);
    assert_eq!(&bytes[4..8], &[0, 0, 0, 1]);
    let length = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    assert_eq!(bytes.len(), 12 + length);
}

#[test]
fn binary_round_trip_preserves_everything() {
    let mut buffer = scenario_buffer();
    buffer.seal();
    let bytes = buffer.to_binary().unwrap();
    let restored = CommandBuffer::from_binary(&bytes).unwrap();

    assert_eq!(restored.stats().command_count, 5);
    assert_eq!(restored.stats().draw_calls, 1);
    assert!(restored.is_sealed());
    assert_eq!(restored.commands(), buffer.commands());

    // Bit-exact: a second encode of the restored buffer matches.
    assert_eq!(restored.to_binary().unwrap(), bytes);
}

#[test]
fn round_trip_covers_every_serializable_variant() {
    use vib3::backend::{BufferHandle, BufferUsage, IndexFormat, Projection, ProjectionKind};

    let mut buffer = CommandBuffer::new();
    buffer.clear(ClearRequest::default()).unwrap();
    buffer.set_state(RenderState::transparent4d()).unwrap();
    buffer.set_viewport(0, 0, 64, 64).unwrap();
    buffer.set_scissor(8, 8, 48, 48).unwrap();
    buffer.set_pipeline("p").unwrap();
    buffer.bind_texture(11, 2).unwrap();
    buffer.bind_vertex_array(3).unwrap();
    buffer
        .bind_index_buffer(
            BufferHandle {
                id: 4,
                usage: BufferUsage::Index,
                size: 96,
            },
            IndexFormat::U16,
        )
        .unwrap();
    buffer.bind_render_target(Some(7)).unwrap();
    buffer
        .set_uniform("u_hue", UniformValue::Float(200.0))
        .unwrap();
    buffer.set_rotor([0.5; 8]).unwrap();
    buffer
        .set_projection(Projection {
            kind: ProjectionKind::Stereographic,
            dimension: 4.2,
            fov: Some(72.0),
            near: None,
            far: None,
        })
        .unwrap();
    buffer.draw_indexed(36).unwrap();
    buffer.draw_instanced(6, 10).unwrap();
    buffer.draw_indexed_instanced(36, 4).unwrap();
    buffer.set_blend_mode(vib3::state::BlendMode::Additive).unwrap();
    buffer
        .set_depth_state(vib3::state::DepthState::default())
        .unwrap();
    buffer.push_state().unwrap();
    buffer.pop_state().unwrap();
    buffer.bind_render_target(None).unwrap();

    let restored = CommandBuffer::from_binary(&buffer.to_binary().unwrap()).unwrap();
    assert_eq!(restored.commands(), buffer.commands());
}

#[test]
fn from_binary_rejects_bad_magic() {
    let mut bytes = scenario_buffer().to_binary().unwrap();
    bytes[0] = b'X';
    assert!(matches!(
        CommandBuffer::from_binary(&bytes),
        Err(Vib3Error::InvalidBuffer(_))
    ));
}

#[test]
fn from_binary_rejects_truncated_payloads() {
    let bytes = scenario_buffer().to_binary().unwrap();
    assert!(matches!(
        CommandBuffer::from_binary(&bytes[..bytes.len() - 3]),
        Err(Vib3Error::InvalidBuffer(_))
    ));
    assert!(matches!(
        CommandBuffer::from_binary(&bytes[..8]),
        Err(Vib3Error::InvalidBuffer(_))
    ));
}

#[test]
fn custom_commands_refuse_to_serialize() {
    let mut buffer = CommandBuffer::new();
    buffer.custom(|_| {}).unwrap();
    assert!(matches!(
        buffer.to_binary(),
        Err(Vib3Error::UnserializableCommand)
    ));
    assert!(matches!(
        buffer.to_json(),
        Err(Vib3Error::UnserializableCommand)
    ));
}

#[test]
fn spec_shaped_foreign_payload_decodes() {
    // The normative payload carries only {version, sealed, commands, stats};
    // a buffer emitted by another language has no sortMode key.
    let json = r#"{
        "version": 1,
        "sealed": false,
        "commands": [
            {
                "type": 7,
                "data": {
                    "id": 1,
                    "sortKey": 0,
                    "priority": 0,
                    "depth": null,
                    "label": null,
                    "command": { "cmd": "draw", "vertexCount": 6, "firstVertex": 0 }
                },
                "timestamp": 12.5
            }
        ],
        "stats": { "commandCount": 1, "drawCalls": 1, "stateChanges": 0, "triangles": 2 }
    }"#;
    let buffer = CommandBuffer::from_json(json).unwrap();
    assert_eq!(buffer.sort_mode(), SortMode::None);
    assert_eq!(buffer.stats().draw_calls, 1);
    assert_eq!(buffer.len(), 1);
}

#[test]
fn default_sort_mode_is_not_emitted() {
    let json = scenario_buffer().to_json().unwrap();
    assert!(
        !json.contains("sortMode"),
        "default-mode payloads must keep the normative shape"
    );
}

#[test]
fn non_default_sort_mode_round_trips() {
    let mut buffer = CommandBuffer::with_sort_mode(SortMode::State);
    buffer.draw(6).unwrap();
    let restored = CommandBuffer::from_binary(&buffer.to_binary().unwrap()).unwrap();
    assert_eq!(restored.sort_mode(), SortMode::State);
}

#[test]
fn wire_tags_follow_the_normative_numbering() {
    assert_eq!(wire_tag(&Command::Clear(ClearRequest::default())), Some(0x01));
    assert_eq!(
        wire_tag(&Command::SetViewport {
            x: 0,
            y: 0,
            width: 1,
            height: 1
        }),
        Some(0x02)
    );
    assert_eq!(
        wire_tag(&Command::BindShader {
            name: "p".to_string()
        }),
        Some(0x03)
    );
    assert_eq!(
        wire_tag(&Command::Draw {
            vertex_count: 3,
            first_vertex: 0
        }),
        Some(0x07)
    );
    assert_eq!(wire_tag(&Command::PushState), Some(0x0C));
    assert_eq!(wire_tag(&Command::PopState), Some(0x0D));
    assert_eq!(
        wire_tag(&Command::BindTexture {
            texture: 1,
            slot: 0
        }),
        Some(0x10)
    );
    assert_eq!(wire_tag(&Command::SetRotor { rotor: [0.0; 8] }), Some(0x11));
    assert_eq!(
        wire_tag(&Command::Custom {
            callback: vib3::command::CustomCommand::default()
        }),
        None
    );
}

// ============================================================================
// Pool Tests
// ============================================================================

#[test]
fn pool_reuses_released_buffers() {
    let mut pool = CommandBufferPool::new();
    let mut buffer = pool.acquire();
    buffer.draw(6).unwrap();
    assert_eq!(pool.in_use_count(), 1);

    pool.release(buffer);
    assert_eq!(pool.free_count(), 1);
    assert_eq!(pool.in_use_count(), 0);

    let reused = pool.acquire();
    assert!(reused.is_empty(), "acquire returns a reset buffer");
    assert_eq!(pool.free_count(), 0);
}

#[test]
fn pool_release_all_forgets_outstanding() {
    let mut pool = CommandBufferPool::new();
    let _a = pool.acquire();
    let _b = pool.acquire();
    assert_eq!(pool.in_use_count(), 2);
    pool.release_all();
    assert_eq!(pool.in_use_count(), 0);
}
