//! Errors produced while building a [`Mesh`](crate::mesh::Mesh).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to load OBJ file {}: {reason:#}", .path.display())]
    Obj {
        path: PathBuf,
        reason: anyhow::Error,
    },

    #[error("mesh {source_name} has no positions")]
    MissingPositions { source_name: String },

    #[error("mesh {source_name} has no normals")]
    MissingNormals { source_name: String },

    #[error("unknown shape kind '{0}' (expected plane, cube or sphere)")]
    UnknownShape(String),

    #[error("generated shape has {points} points; 16-bit indices address at most 65536")]
    TooManyPoints { points: usize },

    #[error("{attribute} has {actual} entries, expected {expected}")]
    AttributeLengthMismatch {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("draw count is {actual}, expected {expected}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("index {index} at position {at} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        index: u16,
        at: usize,
        vertex_count: usize,
    },

    #[error("corner {corner} references {attribute} {index}, but only {len} exist")]
    CornerOutOfRange {
        attribute: &'static str,
        corner: usize,
        index: u32,
        len: usize,
    },

    #[error("draw count {0} is not a multiple of 3")]
    NotTriangleList(usize),
}

pub type BuildResult<T> = Result<T, BuildError>;
