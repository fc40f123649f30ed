//! Binding-state bookkeeping shared by the context backends.
//!
//! Rules tracked here:
//! - an attribute slot captures the array buffer bound when the pointer is set;
//! - the element buffer binding belongs to the bound vertex array, and only
//!   falls back to a context-level binding while no vertex array is bound;
//! - deleting an object clears every binding that refers to it.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;

use crate::context::{
    AttributeLayout, BufferId, BufferTarget, GraphicsError, GraphicsResult, MAX_VERTEX_ATTRIBUTES,
    VertexArrayId,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttributeBinding {
    pub buffer: BufferId,
    pub layout: AttributeLayout,
    pub enabled: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VertexArrayState {
    attributes: [Option<AttributeBinding>; MAX_VERTEX_ATTRIBUTES as usize],
    element_buffer: Option<BufferId>,
}

impl VertexArrayState {
    pub fn attribute(&self, slot: u32) -> Option<&AttributeBinding> {
        self.attributes.get(slot as usize)?.as_ref()
    }

    /// Enabled slots in ascending order.
    pub fn enabled_attributes(&self) -> impl Iterator<Item = (u32, &AttributeBinding)> {
        self.attributes
            .iter()
            .enumerate()
            .filter_map(|(slot, binding)| match binding {
                Some(b) if b.enabled => Some((slot as u32, b)),
                _ => None,
            })
    }

    #[inline]
    pub fn element_buffer(&self) -> Option<BufferId> {
        self.element_buffer
    }

    fn forget_buffer(&mut self, buffer: BufferId) {
        for slot in &mut self.attributes {
            if slot.is_some_and(|b| b.buffer == buffer) {
                *slot = None;
            }
        }
        if self.element_buffer == Some(buffer) {
            self.element_buffer = None;
        }
    }
}

#[derive(Debug, Default)]
pub struct GlState {
    issued: u32,
    vertex_arrays: HashMap<VertexArrayId, VertexArrayState>,
    buffers: HashSet<BufferId>,
    vertex_array: Option<VertexArrayId>,
    array_buffer: Option<BufferId>,
    element_buffer: Option<BufferId>,
}

impl GlState {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> NonZeroU32 {
        let id = NonZeroU32::MIN.saturating_add(self.issued);
        self.issued += 1;
        id
    }

    pub fn create_vertex_array(&mut self) -> VertexArrayId {
        let id = VertexArrayId(self.next_id());
        self.vertex_arrays.insert(id, VertexArrayState::default());
        id
    }

    pub fn create_buffer(&mut self) -> BufferId {
        let id = BufferId(self.next_id());
        self.buffers.insert(id);
        id
    }

    /// Returns `false` if the vertex array did not exist.
    pub fn delete_vertex_array(&mut self, id: VertexArrayId) -> bool {
        if self.vertex_array == Some(id) {
            self.vertex_array = None;
        }
        self.vertex_arrays.remove(&id).is_some()
    }

    /// Returns `false` if the buffer did not exist.
    pub fn delete_buffer(&mut self, id: BufferId) -> bool {
        if !self.buffers.remove(&id) {
            return false;
        }
        if self.array_buffer == Some(id) {
            self.array_buffer = None;
        }
        if self.element_buffer == Some(id) {
            self.element_buffer = None;
        }
        for state in self.vertex_arrays.values_mut() {
            state.forget_buffer(id);
        }
        true
    }

    pub fn bind_vertex_array(&mut self, id: Option<VertexArrayId>) -> GraphicsResult<()> {
        if let Some(id) = id {
            if !self.vertex_arrays.contains_key(&id) {
                return Err(GraphicsError::UnknownVertexArray(id));
            }
        }
        self.vertex_array = id;
        Ok(())
    }

    pub fn bind_buffer(&mut self, target: BufferTarget, id: Option<BufferId>) -> GraphicsResult<()> {
        if let Some(id) = id {
            if !self.buffers.contains(&id) {
                return Err(GraphicsError::UnknownBuffer(id));
            }
        }
        match target {
            BufferTarget::Array => self.array_buffer = id,
            BufferTarget::Element => match self.vertex_array {
                Some(vao) => {
                    if let Some(state) = self.vertex_arrays.get_mut(&vao) {
                        state.element_buffer = id;
                    }
                }
                None => self.element_buffer = id,
            },
        }
        Ok(())
    }

    #[inline]
    pub fn bound_vertex_array(&self) -> Option<VertexArrayId> {
        self.vertex_array
    }

    pub fn bound_buffer(&self, target: BufferTarget) -> Option<BufferId> {
        match target {
            BufferTarget::Array => self.array_buffer,
            BufferTarget::Element => match self.vertex_array {
                Some(vao) => self.vertex_arrays.get(&vao).and_then(|s| s.element_buffer),
                None => self.element_buffer,
            },
        }
    }

    /// Buffer bound to `target`, or an error naming the empty target.
    pub fn require_buffer(&self, target: BufferTarget) -> GraphicsResult<BufferId> {
        self.bound_buffer(target)
            .ok_or(GraphicsError::NoBufferBound(target))
    }

    /// The bound vertex array and its state.
    pub fn current(&self) -> GraphicsResult<(VertexArrayId, &VertexArrayState)> {
        let id = self.vertex_array.ok_or(GraphicsError::NoVertexArrayBound)?;
        let state = self
            .vertex_arrays
            .get(&id)
            .ok_or(GraphicsError::UnknownVertexArray(id))?;
        Ok((id, state))
    }

    fn current_mut(&mut self) -> GraphicsResult<&mut VertexArrayState> {
        let id = self.vertex_array.ok_or(GraphicsError::NoVertexArrayBound)?;
        self.vertex_arrays
            .get_mut(&id)
            .ok_or(GraphicsError::UnknownVertexArray(id))
    }

    pub fn vertex_attrib_pointer(&mut self, slot: u32, layout: AttributeLayout) -> GraphicsResult<()> {
        if slot >= MAX_VERTEX_ATTRIBUTES {
            return Err(GraphicsError::AttributeSlotOutOfRange(slot));
        }
        let buffer = self.require_buffer(BufferTarget::Array)?;
        let state = self.current_mut()?;
        let enabled = state.attributes[slot as usize].is_some_and(|b| b.enabled);
        state.attributes[slot as usize] = Some(AttributeBinding {
            buffer,
            layout,
            enabled,
        });
        Ok(())
    }

    pub fn enable_vertex_attrib_array(&mut self, slot: u32) -> GraphicsResult<()> {
        if slot >= MAX_VERTEX_ATTRIBUTES {
            return Err(GraphicsError::AttributeSlotOutOfRange(slot));
        }
        let state = self.current_mut()?;
        match state.attributes[slot as usize].as_mut() {
            Some(binding) => {
                binding.enabled = true;
                Ok(())
            }
            None => Err(GraphicsError::AttributeNotConfigured(slot)),
        }
    }

    pub fn vertex_array(&self, id: VertexArrayId) -> Option<&VertexArrayState> {
        self.vertex_arrays.get(&id)
    }

    #[inline]
    pub fn contains_buffer(&self, id: BufferId) -> bool {
        self.buffers.contains(&id)
    }

    #[inline]
    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    #[inline]
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }
}
