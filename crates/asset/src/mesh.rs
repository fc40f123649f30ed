//! CPU-side mesh representation shared by the OBJ and procedural build paths.

use crate::error::{BuildError, BuildResult};

/// Unified triangle-list mesh.
///
/// Attributes are stored as separate tightly-packed streams (3 floats per
/// position/normal, 2 floats per texture coordinate), which is the layout the
/// uploader hands to the GPU unchanged. When `indices` is empty the mesh is a
/// flat vertex stream and `count == positions.len()`; otherwise it is indexed
/// and `count == indices.len()`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tcoords: Vec<[f32; 2]>,
    pub indices: Vec<u16>,
    pub count: u32,
}

impl Mesh {
    #[inline]
    pub fn is_indexed(&self) -> bool {
        !self.indices.is_empty()
    }

    #[inline]
    pub fn has_tcoords(&self) -> bool {
        !self.tcoords.is_empty()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> u32 {
        self.count / 3
    }

    /// Check the structural invariants the uploader and renderer rely on.
    pub fn validate(&self) -> BuildResult<()> {
        let vertex_count = self.positions.len();

        if self.normals.len() != vertex_count {
            return Err(BuildError::AttributeLengthMismatch {
                attribute: "normals",
                expected: vertex_count,
                actual: self.normals.len(),
            });
        }
        if self.has_tcoords() && self.tcoords.len() != vertex_count {
            return Err(BuildError::AttributeLengthMismatch {
                attribute: "tcoords",
                expected: vertex_count,
                actual: self.tcoords.len(),
            });
        }

        let expected = if self.is_indexed() {
            self.indices.len()
        } else {
            vertex_count
        };
        if self.count as usize != expected {
            return Err(BuildError::CountMismatch {
                expected,
                actual: self.count as usize,
            });
        }
        if self.count % 3 != 0 {
            return Err(BuildError::NotTriangleList(self.count as usize));
        }

        if let Some((at, &index)) = self
            .indices
            .iter()
            .enumerate()
            .find(|&(_, &i)| i as usize >= vertex_count)
        {
            return Err(BuildError::IndexOutOfRange {
                index,
                at,
                vertex_count,
            });
        }

        Ok(())
    }

    /// Axis-aligned bounds of all positions, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let first = *self.positions.first()?;
        let bounds = self
            .positions
            .iter()
            .fold((first, first), |(mut min, mut max), p| {
                for axis in 0..3 {
                    min[axis] = min[axis].min(p[axis]);
                    max[axis] = max[axis].max(p[axis]);
                }
                (min, max)
            });
        Some(bounds)
    }
}
