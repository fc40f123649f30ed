//! Mesh upload: one vertex array, one static buffer per attribute stream and
//! an optional 16-bit index buffer.
//!
//! Attribute slots: 0 = position (3 × f32), 1 = normal (3 × f32),
//! 2 = texture coordinate (2 × f32, only when present).

use asset::Mesh;

use crate::context::{
    AttributeFormat, AttributeLayout, BufferId, BufferTarget, BufferUsage, GraphicsContext,
    GraphicsError, GraphicsResult, VertexArrayId,
};

pub const POSITION_SLOT: u32 = 0;
pub const NORMAL_SLOT: u32 = 1;
pub const TCOORD_SLOT: u32 = 2;

/// GPU objects created for one mesh. `None` means the object was not created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GpuHandles {
    pub vertex_array: Option<VertexArrayId>,
    pub positions: Option<BufferId>,
    pub normals: Option<BufferId>,
    pub tcoords: Option<BufferId>,
    pub indices: Option<BufferId>,
}

impl GpuHandles {
    pub fn buffers(&self) -> impl Iterator<Item = BufferId> {
        [self.positions, self.normals, self.tcoords, self.indices]
            .into_iter()
            .flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_array.is_none() && self.buffers().next().is_none()
    }

    fn release<C: GraphicsContext + ?Sized>(&mut self, ctx: &mut C) {
        for buffer in self.buffers() {
            ctx.delete_buffer(buffer);
        }
        if let Some(vao) = self.vertex_array {
            ctx.delete_vertex_array(vao);
        }
        *self = GpuHandles::default();
    }
}

/// A mesh together with the GPU objects that hold its data.
///
/// The objects belong to the context the mesh was uploaded with and must be
/// released with [`GpuMesh::destroy`] on that same context.
#[derive(Debug)]
pub struct GpuMesh {
    mesh: Mesh,
    handles: GpuHandles,
}

impl GpuMesh {
    #[inline]
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    #[inline]
    pub fn handles(&self) -> &GpuHandles {
        &self.handles
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.mesh.count
    }

    /// Delete every GPU object and hand back the CPU mesh.
    pub fn destroy<C: GraphicsContext + ?Sized>(mut self, ctx: &mut C) -> Mesh {
        log::debug!("Releasing mesh objects {:?}", self.handles);
        self.handles.release(ctx);
        std::mem::take(&mut self.mesh)
    }
}

impl Drop for GpuMesh {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            log::warn!(
                "GpuMesh dropped without destroy(); leaking {:?} and {} buffer(s)",
                self.handles.vertex_array,
                self.handles.buffers().count()
            );
        }
    }
}

/// Upload `mesh` into new GPU objects. Bindings are cleared before returning.
///
/// A mesh that fails [`Mesh::validate`] is rejected before any object is
/// created. If a later step fails, objects created so far are deleted and the
/// error is returned.
pub fn upload_mesh<C: GraphicsContext + ?Sized>(ctx: &mut C, mesh: Mesh) -> GraphicsResult<GpuMesh> {
    mesh.validate()
        .map_err(|err| GraphicsError::InvalidMesh(err.to_string()))?;

    let mut handles = GpuHandles::default();
    match upload_into(ctx, &mesh, &mut handles) {
        Ok(()) => {
            log::debug!(
                "Uploaded mesh: {} vertices, {} indices, tcoords={} -> {:?}",
                mesh.vertex_count(),
                mesh.indices.len(),
                mesh.has_tcoords(),
                handles
            );
            Ok(GpuMesh { mesh, handles })
        }
        Err(err) => {
            let unbind = [
                ctx.bind_vertex_array(None),
                ctx.bind_buffer(BufferTarget::Array, None),
                ctx.bind_buffer(BufferTarget::Element, None),
            ];
            for unbind_err in unbind.into_iter().filter_map(Result::err) {
                log::debug!("Unbind after failed upload: {unbind_err}");
            }
            handles.release(ctx);
            Err(err)
        }
    }
}

fn upload_into<C: GraphicsContext + ?Sized>(
    ctx: &mut C,
    mesh: &Mesh,
    handles: &mut GpuHandles,
) -> GraphicsResult<()> {
    let vao = ctx.create_vertex_array();
    handles.vertex_array = Some(vao);
    ctx.bind_vertex_array(Some(vao))?;

    handles.positions = Some(upload_attribute(
        ctx,
        POSITION_SLOT,
        AttributeFormat::Float32x3,
        bytemuck::cast_slice(&mesh.positions),
    )?);
    handles.normals = Some(upload_attribute(
        ctx,
        NORMAL_SLOT,
        AttributeFormat::Float32x3,
        bytemuck::cast_slice(&mesh.normals),
    )?);
    if mesh.has_tcoords() {
        handles.tcoords = Some(upload_attribute(
            ctx,
            TCOORD_SLOT,
            AttributeFormat::Float32x2,
            bytemuck::cast_slice(&mesh.tcoords),
        )?);
    }

    if mesh.is_indexed() {
        let ebo = ctx.create_buffer();
        handles.indices = Some(ebo);
        ctx.bind_buffer(BufferTarget::Element, Some(ebo))?;
        ctx.buffer_data(
            BufferTarget::Element,
            bytemuck::cast_slice(&mesh.indices),
            BufferUsage::StaticDraw,
        )?;
    }

    // Vertex array first, so the element binding it captured survives.
    ctx.bind_vertex_array(None)?;
    ctx.bind_buffer(BufferTarget::Array, None)?;
    ctx.bind_buffer(BufferTarget::Element, None)?;
    Ok(())
}

fn upload_attribute<C: GraphicsContext + ?Sized>(
    ctx: &mut C,
    slot: u32,
    format: AttributeFormat,
    data: &[u8],
) -> GraphicsResult<BufferId> {
    let buffer = ctx.create_buffer();
    ctx.bind_buffer(BufferTarget::Array, Some(buffer))?;
    ctx.buffer_data(BufferTarget::Array, data, BufferUsage::StaticDraw)?;
    ctx.vertex_attrib_pointer(slot, AttributeLayout::packed(format))?;
    ctx.enable_vertex_attrib_array(slot)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use asset::{ShapeKind, build_from_obj, build_from_shape, obj::load_obj_from_str};

    use super::*;
    use crate::recording::{Command, RecordingContext};

    fn flat_mesh(with_tcoords: bool) -> Mesh {
        let src = if with_tcoords {
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nvn 0 0 1\nf 1/1/1 2/2/1 3/3/1\n"
        } else {
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1\n"
        };
        build_from_obj(load_obj_from_str(src).unwrap(), "inline.obj").unwrap()
    }

    #[test]
    fn handles_follow_present_attributes() {
        let cases = [
            flat_mesh(false),
            flat_mesh(true),
            build_from_shape(ShapeKind::Cube).unwrap(),
            build_from_shape(ShapeKind::Plane).unwrap(),
        ];

        for mesh in cases {
            let mut ctx = RecordingContext::new();
            let (has_tcoords, indexed) = (mesh.has_tcoords(), mesh.is_indexed());
            let gpu = upload_mesh(&mut ctx, mesh).unwrap();
            let h = gpu.handles();

            assert!(h.vertex_array.is_some());
            assert!(h.positions.is_some());
            assert!(h.normals.is_some());
            assert_eq!(h.tcoords.is_some(), has_tcoords);
            assert_eq!(h.indices.is_some(), indexed);
            assert!(ctx.is_unbound());
            gpu.destroy(&mut ctx);
        }
    }

    #[test]
    fn buffers_keep_packed_layout() {
        let mut ctx = RecordingContext::new();
        let mesh = build_from_shape(ShapeKind::Plane).unwrap();
        let gpu = upload_mesh(&mut ctx, mesh).unwrap();
        let h = *gpu.handles();
        let m = gpu.mesh();

        let positions = ctx.buffer_contents(h.positions.unwrap()).unwrap();
        assert_eq!(positions.len(), m.positions.len() * 12);
        assert_eq!(positions, bytemuck::cast_slice::<[f32; 3], u8>(&m.positions[..]));

        let tcoords = ctx.buffer_contents(h.tcoords.unwrap()).unwrap();
        assert_eq!(tcoords.len(), m.tcoords.len() * 8);

        let indices = ctx.buffer_contents(h.indices.unwrap()).unwrap();
        assert_eq!(indices.len(), m.indices.len() * 2);
        assert_eq!(&indices[..2], &m.indices[0].to_ne_bytes());

        gpu.destroy(&mut ctx);
    }

    #[test]
    fn vertex_array_captures_slots_and_index_buffer() {
        let mut ctx = RecordingContext::new();
        let gpu = upload_mesh(&mut ctx, build_from_shape(ShapeKind::Plane).unwrap()).unwrap();
        let h = *gpu.handles();
        let vao = ctx.vertex_array(h.vertex_array.unwrap()).unwrap();

        let slots: Vec<(u32, Option<BufferId>, AttributeFormat)> = vao
            .enabled_attributes()
            .map(|(slot, b)| (slot, Some(b.buffer), b.layout.format))
            .collect();
        assert_eq!(
            slots,
            vec![
                (POSITION_SLOT, h.positions, AttributeFormat::Float32x3),
                (NORMAL_SLOT, h.normals, AttributeFormat::Float32x3),
                (TCOORD_SLOT, h.tcoords, AttributeFormat::Float32x2),
            ]
        );
        assert_eq!(vao.element_buffer(), h.indices);
        gpu.destroy(&mut ctx);
    }

    #[test]
    fn all_uploads_are_static() {
        let mut ctx = RecordingContext::new();
        let gpu = upload_mesh(&mut ctx, build_from_shape(ShapeKind::Cube).unwrap()).unwrap();
        let uploads: Vec<&Command> = ctx
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::BufferData { .. }))
            .collect();
        assert_eq!(uploads.len(), 3);
        assert!(uploads.iter().all(|c| matches!(
            c,
            Command::BufferData { usage: BufferUsage::StaticDraw, .. }
        )));
        gpu.destroy(&mut ctx);
    }

    #[test]
    fn destroy_releases_everything() {
        let mut ctx = RecordingContext::new();
        let mesh = build_from_shape(ShapeKind::Plane).unwrap();
        let original = mesh.clone();
        let gpu = upload_mesh(&mut ctx, mesh).unwrap();
        assert_eq!(ctx.live_objects(), 5);

        let returned = gpu.destroy(&mut ctx);
        assert_eq!(ctx.live_objects(), 0);
        assert_eq!(ctx.resident_bytes(), 0);
        assert_eq!(returned, original);
    }

    /// Context whose index uploads fail, to exercise cleanup.
    struct FailingElements(RecordingContext);

    impl GraphicsContext for FailingElements {
        fn create_vertex_array(&mut self) -> VertexArrayId {
            self.0.create_vertex_array()
        }
        fn bind_vertex_array(&mut self, v: Option<VertexArrayId>) -> GraphicsResult<()> {
            self.0.bind_vertex_array(v)
        }
        fn delete_vertex_array(&mut self, v: VertexArrayId) {
            self.0.delete_vertex_array(v)
        }
        fn create_buffer(&mut self) -> BufferId {
            self.0.create_buffer()
        }
        fn bind_buffer(&mut self, t: BufferTarget, b: Option<BufferId>) -> GraphicsResult<()> {
            self.0.bind_buffer(t, b)
        }
        fn buffer_data(&mut self, t: BufferTarget, d: &[u8], u: BufferUsage) -> GraphicsResult<()> {
            if t == BufferTarget::Element {
                return Err(crate::context::GraphicsError::NoBufferBound(t));
            }
            self.0.buffer_data(t, d, u)
        }
        fn delete_buffer(&mut self, b: BufferId) {
            self.0.delete_buffer(b)
        }
        fn vertex_attrib_pointer(&mut self, s: u32, l: AttributeLayout) -> GraphicsResult<()> {
            self.0.vertex_attrib_pointer(s, l)
        }
        fn enable_vertex_attrib_array(&mut self, s: u32) -> GraphicsResult<()> {
            self.0.enable_vertex_attrib_array(s)
        }
        fn draw_arrays(&mut self, f: u32, c: u32) -> GraphicsResult<()> {
            self.0.draw_arrays(f, c)
        }
        fn draw_elements(&mut self, c: u32, t: crate::context::IndexType, o: u64) -> GraphicsResult<()> {
            self.0.draw_elements(c, t, o)
        }
    }

    #[test]
    fn failed_upload_leaves_nothing_behind() {
        let mut ctx = FailingElements(RecordingContext::new());
        let result = upload_mesh(&mut ctx, build_from_shape(ShapeKind::Cube).unwrap());
        assert!(result.is_err());
        assert_eq!(ctx.0.live_objects(), 0);
        assert!(ctx.0.is_unbound());
    }

    #[test]
    fn invalid_mesh_is_rejected_before_any_object() {
        let mesh = Mesh {
            positions: vec![[0.0; 3]; 3],
            normals: vec![[0.0, 0.0, 1.0]],
            count: 9,
            ..Mesh::default()
        };
        let mut ctx = RecordingContext::new();
        let err = upload_mesh(&mut ctx, mesh).unwrap_err();
        assert!(matches!(err, GraphicsError::InvalidMesh(_)), "{err}");
        assert!(ctx.commands().is_empty());
        assert_eq!(ctx.live_objects(), 0);
    }
}
