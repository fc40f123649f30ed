//! Graphics context boundary: typed object handles and the command set the
//! uploader and draw path need.
//!
//! The model follows the classic vertex-array API: a vertex array records
//! which buffer feeds each attribute slot plus the element (index) buffer, and
//! "current" bindings decide what buffer/attribute calls act on. The bindings
//! live in the context object passed to every call rather than in ambient
//! global state, so several contexts (or a recording test double) can coexist.

use std::{fmt, num::NonZeroU32};

use thiserror::Error;

/// Highest attribute slot + 1 accepted by [`GraphicsContext::vertex_attrib_pointer`].
pub const MAX_VERTEX_ATTRIBUTES: u32 = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayId(pub NonZeroU32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub NonZeroU32);

impl fmt::Display for VertexArrayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vao#{}", self.0)
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buf#{}", self.0)
    }
}

/// Binding point a buffer is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex attribute data.
    Array,
    /// Index data; the binding is stored in the bound vertex array.
    Element,
}

/// Expected update frequency of a buffer's contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Written once, drawn many times.
    StaticDraw,
}

/// Component layout of one vertex attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeFormat {
    Float32x2,
    Float32x3,
}

impl AttributeFormat {
    #[inline]
    pub const fn components(self) -> u32 {
        match self {
            AttributeFormat::Float32x2 => 2,
            AttributeFormat::Float32x3 => 3,
        }
    }

    /// Size in bytes of one tightly-packed element.
    #[inline]
    pub const fn size(self) -> u32 {
        self.components() * std::mem::size_of::<f32>() as u32
    }
}

/// How an attribute slot reads from the array buffer bound at setup time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AttributeLayout {
    pub format: AttributeFormat,
    /// Bytes between consecutive elements.
    pub stride: u32,
    /// Byte offset of the first element.
    pub offset: u64,
}

impl AttributeLayout {
    /// Tightly packed layout starting at offset 0.
    #[inline]
    pub const fn packed(format: AttributeFormat) -> Self {
        Self {
            format,
            stride: format.size(),
            offset: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
}

impl IndexType {
    #[inline]
    pub const fn size(self) -> u64 {
        match self {
            IndexType::U16 => 2,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    #[error("unknown vertex array {0}")]
    UnknownVertexArray(VertexArrayId),
    #[error("unknown buffer {0}")]
    UnknownBuffer(BufferId),
    #[error("no vertex array bound")]
    NoVertexArrayBound,
    #[error("no buffer bound to {0:?} target")]
    NoBufferBound(BufferTarget),
    #[error("attribute slot {0} is out of range")]
    AttributeSlotOutOfRange(u32),
    #[error("attribute slot {0} was never configured")]
    AttributeNotConfigured(u32),
    #[error("indexed draw without an element buffer in {0}")]
    NoElementBuffer(VertexArrayId),
    #[error("refusing to upload invalid mesh: {0}")]
    InvalidMesh(String),
}

pub type GraphicsResult<T> = Result<T, GraphicsError>;

/// Explicit graphics context handed to the uploader and draw path.
///
/// Creation and deletion never fail; deleting an unknown object is a no-op.
/// Calls that depend on bindings return [`GraphicsError`] when the binding they
/// need is missing.
pub trait GraphicsContext {
    fn create_vertex_array(&mut self) -> VertexArrayId;
    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) -> GraphicsResult<()>;
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId);

    fn create_buffer(&mut self) -> BufferId;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) -> GraphicsResult<()>;
    /// Replace the contents of the buffer bound to `target`.
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) -> GraphicsResult<()>;
    fn delete_buffer(&mut self, buffer: BufferId);

    /// Point `slot` of the bound vertex array at the bound array buffer.
    fn vertex_attrib_pointer(&mut self, slot: u32, layout: AttributeLayout) -> GraphicsResult<()>;
    fn enable_vertex_attrib_array(&mut self, slot: u32) -> GraphicsResult<()>;

    /// Non-indexed triangle-list draw from the bound vertex array.
    fn draw_arrays(&mut self, first: u32, count: u32) -> GraphicsResult<()>;
    /// Indexed triangle-list draw; `offset` is in bytes into the element buffer.
    fn draw_elements(&mut self, count: u32, index_type: IndexType, offset: u64) -> GraphicsResult<()>;
}
