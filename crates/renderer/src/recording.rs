//! Headless [`GraphicsContext`] that records every command and keeps buffer
//! contents in memory. Used for tests and the `--headless` dry run.

use std::collections::HashMap;

use crate::{
    context::{
        AttributeLayout, BufferId, BufferTarget, BufferUsage, GraphicsContext, GraphicsError,
        GraphicsResult, IndexType, VertexArrayId,
    },
    state::{GlState, VertexArrayState},
};

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    CreateVertexArray(VertexArrayId),
    BindVertexArray(Option<VertexArrayId>),
    DeleteVertexArray(VertexArrayId),
    CreateBuffer(BufferId),
    BindBuffer {
        target: BufferTarget,
        buffer: Option<BufferId>,
    },
    BufferData {
        target: BufferTarget,
        buffer: BufferId,
        len: usize,
        usage: BufferUsage,
    },
    DeleteBuffer(BufferId),
    VertexAttribPointer {
        slot: u32,
        layout: AttributeLayout,
    },
    EnableVertexAttribArray(u32),
    DrawArrays {
        vertex_array: VertexArrayId,
        first: u32,
        count: u32,
    },
    DrawElements {
        vertex_array: VertexArrayId,
        count: u32,
        index_type: IndexType,
        offset: u64,
    },
}

impl Command {
    #[inline]
    pub fn is_draw(&self) -> bool {
        matches!(self, Command::DrawArrays { .. } | Command::DrawElements { .. })
    }
}

#[derive(Debug, Default)]
pub struct RecordingContext {
    state: GlState,
    commands: Vec<Command>,
    contents: HashMap<BufferId, Vec<u8>>,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn draw_calls(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter().filter(|c| c.is_draw())
    }

    /// Bytes last uploaded into `buffer`.
    pub fn buffer_contents(&self, buffer: BufferId) -> Option<&[u8]> {
        self.contents.get(&buffer).map(Vec::as_slice)
    }

    pub fn vertex_array(&self, id: VertexArrayId) -> Option<&VertexArrayState> {
        self.state.vertex_array(id)
    }

    #[inline]
    pub fn state(&self) -> &GlState {
        &self.state
    }

    /// `true` when no vertex array, array buffer or element buffer is bound.
    pub fn is_unbound(&self) -> bool {
        self.state.bound_vertex_array().is_none()
            && self.state.bound_buffer(BufferTarget::Array).is_none()
            && self.state.bound_buffer(BufferTarget::Element).is_none()
    }

    /// Number of live GPU objects (vertex arrays + buffers).
    pub fn live_objects(&self) -> usize {
        self.state.live_vertex_arrays() + self.state.live_buffers()
    }

    /// Total bytes held by live buffers.
    pub fn resident_bytes(&self) -> usize {
        self.contents.values().map(Vec::len).sum()
    }

    fn record(&mut self, command: Command) {
        log::trace!("gl: {command:?}");
        self.commands.push(command);
    }
}

impl GraphicsContext for RecordingContext {
    fn create_vertex_array(&mut self) -> VertexArrayId {
        let id = self.state.create_vertex_array();
        self.record(Command::CreateVertexArray(id));
        id
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) -> GraphicsResult<()> {
        self.state.bind_vertex_array(vertex_array)?;
        self.record(Command::BindVertexArray(vertex_array));
        Ok(())
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        if self.state.delete_vertex_array(vertex_array) {
            self.record(Command::DeleteVertexArray(vertex_array));
        }
    }

    fn create_buffer(&mut self) -> BufferId {
        let id = self.state.create_buffer();
        self.record(Command::CreateBuffer(id));
        id
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) -> GraphicsResult<()> {
        self.state.bind_buffer(target, buffer)?;
        self.record(Command::BindBuffer { target, buffer });
        Ok(())
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) -> GraphicsResult<()> {
        let buffer = self.state.require_buffer(target)?;
        self.contents.insert(buffer, data.to_vec());
        self.record(Command::BufferData {
            target,
            buffer,
            len: data.len(),
            usage,
        });
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if self.state.delete_buffer(buffer) {
            self.contents.remove(&buffer);
            self.record(Command::DeleteBuffer(buffer));
        }
    }

    fn vertex_attrib_pointer(&mut self, slot: u32, layout: AttributeLayout) -> GraphicsResult<()> {
        self.state.vertex_attrib_pointer(slot, layout)?;
        self.record(Command::VertexAttribPointer { slot, layout });
        Ok(())
    }

    fn enable_vertex_attrib_array(&mut self, slot: u32) -> GraphicsResult<()> {
        self.state.enable_vertex_attrib_array(slot)?;
        self.record(Command::EnableVertexAttribArray(slot));
        Ok(())
    }

    fn draw_arrays(&mut self, first: u32, count: u32) -> GraphicsResult<()> {
        let (vertex_array, _) = self.state.current()?;
        self.record(Command::DrawArrays {
            vertex_array,
            first,
            count,
        });
        Ok(())
    }

    fn draw_elements(&mut self, count: u32, index_type: IndexType, offset: u64) -> GraphicsResult<()> {
        let (vertex_array, state) = self.state.current()?;
        if state.element_buffer().is_none() {
            return Err(GraphicsError::NoElementBuffer(vertex_array));
        }
        self.record(Command::DrawElements {
            vertex_array,
            count,
            index_type,
            offset,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_buffer_contents_per_object() {
        let mut ctx = RecordingContext::new();
        let buf = ctx.create_buffer();
        ctx.bind_buffer(BufferTarget::Array, Some(buf)).unwrap();
        ctx.buffer_data(BufferTarget::Array, &[1, 2, 3, 4], BufferUsage::StaticDraw)
            .unwrap();

        assert_eq!(ctx.buffer_contents(buf), Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(ctx.resident_bytes(), 4);

        ctx.delete_buffer(buf);
        assert_eq!(ctx.buffer_contents(buf), None);
        assert_eq!(ctx.live_objects(), 0);
    }

    #[test]
    fn buffer_data_needs_a_binding() {
        let mut ctx = RecordingContext::new();
        assert_eq!(
            ctx.buffer_data(BufferTarget::Element, &[0, 0], BufferUsage::StaticDraw),
            Err(GraphicsError::NoBufferBound(BufferTarget::Element))
        );
        assert!(ctx.commands().is_empty());
    }

    #[test]
    fn indexed_draw_requires_element_buffer() {
        let mut ctx = RecordingContext::new();
        let vao = ctx.create_vertex_array();
        ctx.bind_vertex_array(Some(vao)).unwrap();
        assert_eq!(
            ctx.draw_elements(3, IndexType::U16, 0),
            Err(GraphicsError::NoElementBuffer(vao))
        );
        ctx.draw_arrays(0, 3).unwrap();
        assert_eq!(ctx.draw_calls().count(), 1);
    }

    #[test]
    fn deleting_twice_records_once() {
        let mut ctx = RecordingContext::new();
        let vao = ctx.create_vertex_array();
        ctx.delete_vertex_array(vao);
        ctx.delete_vertex_array(vao);
        let deletes = ctx
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::DeleteVertexArray(_)))
            .count();
        assert_eq!(deletes, 1);
    }
}
