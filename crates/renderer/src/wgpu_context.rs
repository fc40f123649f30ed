//! [`GraphicsContext`] backed by wgpu.
//!
//! wgpu has no vertex-array objects or implicit draw state, so this backend
//! keeps the binding model in a [`GlState`], turns every buffer upload into a
//! wgpu buffer, and queues draw calls. The queue is replayed into a render pass
//! by [`WgpuContext::replay`], where each attribute slot of the drawn vertex
//! array becomes the vertex-buffer slot of the same number.

use std::collections::HashMap;

use wgpu::{
    Buffer, BufferUsages, Device, IndexFormat, Queue, RenderPass, VertexFormat,
    util::{BufferInitDescriptor, DeviceExt},
};

use crate::{
    context::{
        AttributeFormat, AttributeLayout, BufferId, BufferTarget, BufferUsage, GraphicsContext,
        GraphicsError, GraphicsResult, IndexType, VertexArrayId,
    },
    state::GlState,
};

impl AttributeFormat {
    pub const fn to_wgpu(self) -> VertexFormat {
        match self {
            AttributeFormat::Float32x2 => VertexFormat::Float32x2,
            AttributeFormat::Float32x3 => VertexFormat::Float32x3,
        }
    }
}

impl IndexType {
    pub const fn to_wgpu(self) -> IndexFormat {
        match self {
            IndexType::U16 => IndexFormat::Uint16,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum DrawKind {
    Arrays { first: u32, count: u32 },
    Elements { count: u32, index_type: IndexType, offset: u64 },
}

#[derive(Clone, Copy, Debug)]
struct DrawCall {
    vertex_array: VertexArrayId,
    kind: DrawKind,
}

/// Draws issued since the current frame began.
#[derive(Debug, Default)]
struct DrawQueue {
    calls: Vec<DrawCall>,
}

impl DrawQueue {
    fn push(&mut self, call: DrawCall) {
        self.calls.push(call);
    }

    fn len(&self) -> usize {
        self.calls.len()
    }

    /// Drop draws left by a frame that never reached replay. Returns how many.
    fn begin_frame(&mut self) -> usize {
        let stale = self.calls.len();
        self.calls.clear();
        stale
    }

    fn take(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.calls)
    }
}

pub struct WgpuContext {
    device: Device,
    queue: Queue,
    state: GlState,
    buffers: HashMap<BufferId, Buffer>,
    pending: DrawQueue,
}

impl WgpuContext {
    pub fn new(device: Device, queue: Queue) -> Self {
        Self {
            device,
            queue,
            state: GlState::new(),
            buffers: HashMap::new(),
            pending: DrawQueue::default(),
        }
    }

    #[inline]
    pub fn device(&self) -> &Device {
        &self.device
    }

    #[inline]
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    #[inline]
    pub fn pending_draws(&self) -> usize {
        self.pending.len()
    }

    /// Start a frame: draws queued by an earlier frame that failed before
    /// [`replay`](Self::replay) are discarded.
    pub fn begin_frame(&mut self) {
        let stale = self.pending.begin_frame();
        if stale > 0 {
            log::debug!("Discarded {} draws from an unfinished frame", stale);
        }
    }

    /// Encode all queued draws into `pass` and clear the queue.
    ///
    /// `formats[i]` is the format the bound pipeline expects at vertex-buffer
    /// slot `i`; draws whose vertex array does not provide a matching enabled
    /// attribute for every slot are skipped with a warning. Returns the number
    /// of draws encoded.
    pub fn replay(&mut self, pass: &mut RenderPass<'_>, formats: &[AttributeFormat]) -> usize {
        let pending = self.pending.take();
        let mut encoded = 0;

        'draws: for call in pending {
            let Some(vao) = self.state.vertex_array(call.vertex_array) else {
                log::warn!("Skipping draw: {} was deleted", call.vertex_array);
                continue;
            };

            for (slot, &format) in formats.iter().enumerate() {
                let slot = slot as u32;
                let Some(binding) = vao.attribute(slot).filter(|b| b.enabled) else {
                    log::warn!("Skipping draw: {} has no slot {}", call.vertex_array, slot);
                    continue 'draws;
                };
                if binding.layout.format != format {
                    log::warn!(
                        "Skipping draw: {} slot {} is {:?}, pipeline expects {:?}",
                        call.vertex_array,
                        slot,
                        binding.layout.format,
                        format
                    );
                    continue 'draws;
                }
                let Some(buffer) = self.buffers.get(&binding.buffer) else {
                    log::warn!("Skipping draw: {} has no data", binding.buffer);
                    continue 'draws;
                };
                if buffer.size() <= binding.layout.offset {
                    continue 'draws;
                }
                pass.set_vertex_buffer(slot, buffer.slice(binding.layout.offset..));
            }

            match call.kind {
                DrawKind::Arrays { first, count } => {
                    if count == 0 {
                        continue;
                    }
                    pass.draw(first..first + count, 0..1);
                }
                DrawKind::Elements {
                    count,
                    index_type,
                    offset,
                } => {
                    let Some(buffer) = vao
                        .element_buffer()
                        .and_then(|id| self.buffers.get(&id))
                    else {
                        log::warn!("Skipping draw: {} has no index data", call.vertex_array);
                        continue;
                    };
                    if count == 0 || buffer.size() <= offset {
                        continue;
                    }
                    pass.set_index_buffer(buffer.slice(offset..), index_type.to_wgpu());
                    pass.draw_indexed(0..count, 0, 0..1);
                }
            }
            encoded += 1;
        }

        encoded
    }
}

impl GraphicsContext for WgpuContext {
    fn create_vertex_array(&mut self) -> VertexArrayId {
        self.state.create_vertex_array()
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) -> GraphicsResult<()> {
        self.state.bind_vertex_array(vertex_array)
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.state.delete_vertex_array(vertex_array);
    }

    fn create_buffer(&mut self) -> BufferId {
        self.state.create_buffer()
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) -> GraphicsResult<()> {
        self.state.bind_buffer(target, buffer)
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) -> GraphicsResult<()> {
        let id = self.state.require_buffer(target)?;
        let usage = match (target, usage) {
            (BufferTarget::Array, BufferUsage::StaticDraw) => BufferUsages::VERTEX,
            (BufferTarget::Element, BufferUsage::StaticDraw) => BufferUsages::INDEX,
        };
        let label = format!("{target:?} {id}");
        let buffer = self.device.create_buffer_init(&BufferInitDescriptor {
            label: Some(&label),
            contents: data,
            usage,
        });
        log::debug!("Uploaded {} bytes into {}", data.len(), label);
        if let Some(old) = self.buffers.insert(id, buffer) {
            old.destroy();
        }
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.state.delete_buffer(buffer);
        if let Some(buffer) = self.buffers.remove(&buffer) {
            buffer.destroy();
        }
    }

    fn vertex_attrib_pointer(&mut self, slot: u32, layout: AttributeLayout) -> GraphicsResult<()> {
        self.state.vertex_attrib_pointer(slot, layout)
    }

    fn enable_vertex_attrib_array(&mut self, slot: u32) -> GraphicsResult<()> {
        self.state.enable_vertex_attrib_array(slot)
    }

    fn draw_arrays(&mut self, first: u32, count: u32) -> GraphicsResult<()> {
        let (vertex_array, _) = self.state.current()?;
        self.pending.push(DrawCall {
            vertex_array,
            kind: DrawKind::Arrays { first, count },
        });
        Ok(())
    }

    fn draw_elements(&mut self, count: u32, index_type: IndexType, offset: u64) -> GraphicsResult<()> {
        let (vertex_array, state) = self.state.current()?;
        if state.element_buffer().is_none() {
            return Err(GraphicsError::NoElementBuffer(vertex_array));
        }
        self.pending.push(DrawCall {
            vertex_array,
            kind: DrawKind::Elements {
                count,
                index_type,
                offset,
            },
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(vertex_array: VertexArrayId, count: u32) -> DrawCall {
        DrawCall {
            vertex_array,
            kind: DrawKind::Arrays { first: 0, count },
        }
    }

    #[test]
    fn unfinished_frame_draws_are_discarded() {
        let mut gl = GlState::new();
        let vao = gl.create_vertex_array();
        let mut queue = DrawQueue::default();

        // Frame 1 queues a draw, then fails to acquire its surface texture.
        assert_eq!(queue.begin_frame(), 0);
        queue.push(call(vao, 3));

        // Frame 2 must replay only its own draw.
        assert_eq!(queue.begin_frame(), 1);
        queue.push(call(vao, 6));
        let drawn = queue.take();
        assert_eq!(drawn.len(), 1);
        assert!(matches!(drawn[0].kind, DrawKind::Arrays { count: 6, .. }));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn formats_map_to_wgpu() {
        assert_eq!(AttributeFormat::Float32x3.to_wgpu(), VertexFormat::Float32x3);
        assert_eq!(AttributeFormat::Float32x2.to_wgpu(), VertexFormat::Float32x2);
        assert_eq!(IndexType::U16.to_wgpu(), IndexFormat::Uint16);
    }
}
