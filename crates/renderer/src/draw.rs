//! Draw an uploaded mesh as a triangle list.

use crate::{
    context::{GraphicsContext, GraphicsError, GraphicsResult, IndexType},
    upload::GpuMesh,
};

/// Indexed draw when the mesh has an index buffer, otherwise a flat draw of
/// `count` vertices. The vertex array is unbound afterwards.
pub fn draw_mesh<C: GraphicsContext + ?Sized>(ctx: &mut C, mesh: &GpuMesh) -> GraphicsResult<()> {
    let handles = mesh.handles();
    let vao = handles
        .vertex_array
        .ok_or(GraphicsError::NoVertexArrayBound)?;

    ctx.bind_vertex_array(Some(vao))?;
    let result = if handles.indices.is_some() {
        ctx.draw_elements(mesh.count(), IndexType::U16, 0)
    } else {
        ctx.draw_arrays(0, mesh.count())
    };
    ctx.bind_vertex_array(None)?;
    result
}

#[cfg(test)]
mod tests {
    use asset::{ShapeKind, build_from_obj, build_from_shape, obj::load_obj_from_str};

    use super::*;
    use crate::{
        recording::{Command, RecordingContext},
        upload::upload_mesh,
    };

    #[test]
    fn indexed_mesh_draws_elements() {
        let mut ctx = RecordingContext::new();
        let mesh = build_from_shape(ShapeKind::Cube).unwrap();
        let gpu = upload_mesh(&mut ctx, mesh).unwrap();
        ctx.take_commands();

        draw_mesh(&mut ctx, &gpu).unwrap();
        let vao = gpu.handles().vertex_array.unwrap();
        assert_eq!(
            ctx.commands(),
            &[
                Command::BindVertexArray(Some(vao)),
                Command::DrawElements {
                    vertex_array: vao,
                    count: 36,
                    index_type: IndexType::U16,
                    offset: 0,
                },
                Command::BindVertexArray(None),
            ]
        );
        gpu.destroy(&mut ctx);
    }

    #[test]
    fn flat_mesh_draws_arrays() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 2 0 0\nv 3 0 0\nv 2 1 0\nvn 0 0 1\n\
                   f 1//1 2//1 3//1\nf 4//1 5//1 6//1\n";
        let mesh = build_from_obj(load_obj_from_str(src).unwrap(), "two.obj").unwrap();
        let vertex_count = mesh.positions.len() as u32;

        let mut ctx = RecordingContext::new();
        let gpu = upload_mesh(&mut ctx, mesh).unwrap();
        draw_mesh(&mut ctx, &gpu).unwrap();
        draw_mesh(&mut ctx, &gpu).unwrap();

        let draws: Vec<&Command> = ctx.draw_calls().collect();
        assert_eq!(draws.len(), 2);
        assert!(draws.iter().all(|c| matches!(
            c,
            Command::DrawArrays { first: 0, count, .. } if *count == vertex_count
        )));
        assert!(ctx.is_unbound());
        gpu.destroy(&mut ctx);
    }
}
