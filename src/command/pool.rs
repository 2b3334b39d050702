//! Command buffer pooling.
//!
//! Per-frame recording reuses buffers instead of reallocating their command
//! storage. `acquire` hands out a reset buffer; `release` returns it to the
//! free list.

use super::buffer::{CommandBuffer, SortMode};

/// A free list of reusable command buffers.
pub struct CommandBufferPool {
    free: Vec<CommandBuffer>,
    in_use: usize,
    sort_mode: SortMode,
}

impl Default for CommandBufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBufferPool {
    #[must_use]
    pub fn new() -> Self {
        Self::with_sort_mode(SortMode::None)
    }

    /// Buffers handed out by this pool start in the given sort mode.
    #[must_use]
    pub fn with_sort_mode(sort_mode: SortMode) -> Self {
        Self {
            free: Vec::new(),
            in_use: 0,
            sort_mode,
        }
    }

    /// Returns a reset buffer, reusing a pooled one when available.
    pub fn acquire(&mut self) -> CommandBuffer {
        self.in_use += 1;
        match self.free.pop() {
            Some(mut buffer) => {
                buffer.reset();
                buffer.set_sort_mode(self.sort_mode);
                buffer
            }
            None => CommandBuffer::with_sort_mode(self.sort_mode),
        }
    }

    /// Clears a buffer and returns it to the free list.
    pub fn release(&mut self, mut buffer: CommandBuffer) {
        buffer.reset();
        self.free.push(buffer);
        self.in_use = self.in_use.saturating_sub(1);
    }

    /// Forgets every outstanding acquisition. Buffers still owned by
    /// callers are simply no longer counted.
    pub fn release_all(&mut self) {
        self.in_use = 0;
    }

    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    #[must_use]
    pub fn in_use_count(&self) -> usize {
        self.in_use
    }
}
