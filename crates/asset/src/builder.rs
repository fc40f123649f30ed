//! Mesh construction from OBJ files and procedural shapes.
//!
//! The OBJ path expands per-attribute indexed corners into a flat vertex
//! stream (one vertex per corner, no deduplication). The procedural path keeps
//! the generator's shared vertices and copies its triangle list as the index
//! buffer. Intermediate records are taken by value and dropped before the
//! builder returns.

use std::path::{Path, PathBuf};

use crate::{
    error::{BuildError, BuildResult},
    mesh::Mesh,
    obj::{self, ObjData},
    shapes::{ShapeKind, ShapeMesh},
};

/// Where a mesh comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum MeshSource {
    ObjFile(PathBuf),
    Shape(ShapeKind),
}

impl MeshSource {
    pub fn build(&self) -> BuildResult<Mesh> {
        match self {
            MeshSource::ObjFile(path) => build_from_obj_file(path),
            MeshSource::Shape(kind) => build_from_shape(*kind),
        }
    }
}

impl std::fmt::Display for MeshSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeshSource::ObjFile(path) => write!(f, "{}", path.display()),
            MeshSource::Shape(kind) => write!(f, "shape:{kind}"),
        }
    }
}

/// Load an OBJ file and flatten it into a non-indexed [`Mesh`].
pub fn build_from_obj_file(path: impl AsRef<Path>) -> BuildResult<Mesh> {
    let path = path.as_ref();
    let obj = obj::load_obj_from_path(path).map_err(|reason| BuildError::Obj {
        path: path.to_path_buf(),
        reason,
    })?;
    let mesh = build_from_obj(obj, &path.display().to_string())?;
    log::info!(
        "Loaded mesh {}: {} vertices, {} triangles, tcoords={}",
        path.display(),
        mesh.vertex_count(),
        mesh.triangle_count(),
        mesh.has_tcoords()
    );
    Ok(mesh)
}

/// Flatten parsed OBJ data. `source` names the data in diagnostics.
pub fn build_from_obj(obj: ObjData, source: &str) -> BuildResult<Mesh> {
    if obj.position_count() <= 1 {
        return Err(BuildError::MissingPositions {
            source_name: source.to_owned(),
        });
    }
    if obj.normal_count() <= 1 {
        return Err(BuildError::MissingNormals {
            source_name: source.to_owned(),
        });
    }

    let count = obj.index_count();
    let mut mesh = Mesh {
        positions: Vec::with_capacity(count),
        normals: Vec::with_capacity(count),
        ..Mesh::default()
    };

    for (at, corner) in obj.indices.iter().enumerate() {
        mesh.positions
            .push(corner_attribute(&obj.positions, "position", at, corner.p)?);
        mesh.normals
            .push(corner_attribute(&obj.normals, "normal", at, corner.n)?);
    }

    if obj.texcoord_count() > 1 {
        mesh.tcoords = obj
            .indices
            .iter()
            .enumerate()
            .map(|(at, corner)| corner_attribute(&obj.texcoords, "texcoord", at, corner.t))
            .collect::<BuildResult<_>>()?;
    } else {
        log::warn!("Mesh {} loaded without texture coordinates", source);
    }

    mesh.count = count as u32;
    mesh.validate()?;
    Ok(mesh)
}

fn corner_attribute<T: Copy>(
    values: &[T],
    attribute: &'static str,
    corner: usize,
    index: u32,
) -> BuildResult<T> {
    values
        .get(index as usize)
        .copied()
        .ok_or(BuildError::CornerOutOfRange {
            attribute,
            corner,
            index,
            len: values.len(),
        })
}

/// Generate a primitive shape and convert it into an indexed [`Mesh`].
pub fn build_from_shape(kind: ShapeKind) -> BuildResult<Mesh> {
    let shape = kind.generate()?;
    let mesh = build_from_shape_mesh(shape, kind.name())?;
    log::info!(
        "Generated {} mesh: {} points, {} triangles",
        kind,
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

/// Convert generator output. Normals are computed if the generator left them unset.
pub fn build_from_shape_mesh(mut shape: ShapeMesh, source: &str) -> BuildResult<Mesh> {
    if shape.npoints() == 0 {
        return Err(BuildError::MissingPositions {
            source_name: source.to_owned(),
        });
    }
    if shape.triangles.len() % 3 != 0 {
        return Err(BuildError::NotTriangleList(shape.triangles.len()));
    }
    let vertex_count = shape.npoints();
    if let Some((at, &index)) = shape
        .triangles
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
    if shape.normals.is_none() {
        shape.compute_normals();
    }

    let count = shape.triangles.len();
    let ShapeMesh {
        points,
        normals,
        tcoords,
        triangles,
    } = shape;

    let tcoords = tcoords.unwrap_or_else(|| {
        log::warn!("Mesh {} generated without texture coordinates", source);
        Vec::new()
    });

    let mesh = Mesh {
        positions: points,
        normals: normals.unwrap_or_default(),
        tcoords,
        indices: triangles,
        count: count as u32,
    };
    mesh.validate()?;
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::obj::load_obj_from_str;
    use crate::test_log;

    const TWO_TRIANGLES: &str = "\
v 0 0 0
v 1 0 0
v 0 1 0
v 2 0 0
v 3 0 0
v 2 1 0
vn 0 0 1
f 1//1 2//1 3//1
f 4//1 5//1 6//1
";

    const TEXTURED_QUAD: &str = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn two_triangles_without_tcoords_warn_once() {
        test_log::init();
        test_log::take();
        let obj = load_obj_from_str(TWO_TRIANGLES).expect("parse");
        let mesh = build_from_obj(obj, "two_triangles.obj").expect("build");

        assert_eq!(mesh.count, 6);
        assert_eq!(mesh.positions.len(), 6);
        assert_eq!(mesh.normals.len(), 6);
        assert!(mesh.tcoords.is_empty());
        assert!(mesh.indices.is_empty());

        let warnings = test_log::take();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("two_triangles.obj"));
    }

    #[test]
    fn textured_obj_streams_match_count() {
        test_log::init();
        test_log::take();
        let obj = load_obj_from_str(TEXTURED_QUAD).expect("parse");
        let mesh = build_from_obj(obj, "quad.obj").expect("build");

        assert_eq!(mesh.count, 6);
        assert_eq!(mesh.positions.len(), 6);
        assert_eq!(mesh.normals.len(), 6);
        assert_eq!(mesh.tcoords.len(), 6);
        assert!(!mesh.is_indexed());
        assert!(test_log::take().is_empty());
    }

    #[test]
    fn shared_corners_are_duplicated() {
        let obj = load_obj_from_str(TEXTURED_QUAD).expect("parse");
        let mesh = build_from_obj(obj, "quad.obj").expect("build");
        // Fan (1,2,3)(1,3,4): corners 0 and 3 are the same OBJ vertex.
        assert_eq!(mesh.positions[0], mesh.positions[3]);
        assert_eq!(mesh.positions[2], mesh.positions[4]);
        assert_eq!(mesh.positions[5], [0.0, 1.0, 0.0]);
        assert_eq!(mesh.tcoords[2], [1.0, 1.0]);
    }

    #[test]
    fn obj_without_normals_is_rejected() {
        let obj = load_obj_from_str("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").expect("parse");
        assert!(matches!(
            build_from_obj(obj, "flat.obj"),
            Err(BuildError::MissingNormals { source_name }) if source_name == "flat.obj"
        ));
    }

    #[test]
    fn obj_without_positions_is_rejected() {
        let obj = load_obj_from_str("# empty\n").expect("parse");
        assert!(matches!(
            build_from_obj(obj, "empty.obj"),
            Err(BuildError::MissingPositions { .. })
        ));
    }

    #[test]
    fn obj_file_round_trip() {
        let mut file = tempfile::Builder::new()
            .suffix(".obj")
            .tempfile()
            .expect("tempfile");
        file.write_all(TEXTURED_QUAD.as_bytes()).expect("write obj");

        let mesh = build_from_obj_file(file.path()).expect("build from file");
        assert_eq!(mesh.count, 6);
        assert_eq!(mesh.tcoords.len(), 6);

        let from_source = MeshSource::ObjFile(file.path().to_path_buf())
            .build()
            .expect("build from source");
        assert_eq!(from_source, mesh);
    }

    #[test]
    fn bundled_pyramid_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../assets/models/pyramid.obj");
        let mesh = build_from_obj_file(path).expect("pyramid");
        // Base quad (2 triangles) + 4 sides.
        assert_eq!(mesh.count, 18);
        assert_eq!(mesh.tcoords.len(), 18);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn missing_obj_file_reports_path() {
        let err = build_from_obj_file("/no/such/mesh.obj").unwrap_err();
        assert!(matches!(&err, BuildError::Obj { path, .. } if path.ends_with("mesh.obj")));
        assert!(err.to_string().contains("/no/such/mesh.obj"));
    }

    #[test]
    fn cube_is_indexed_with_36_indices() {
        let mesh = build_from_shape(ShapeKind::Cube).expect("cube");
        assert_eq!(mesh.indices.len(), 36);
        assert_eq!(mesh.count, 36);
        assert_eq!(mesh.positions.len(), 8);
        assert_eq!(mesh.normals.len(), 8);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.positions.len()));
    }

    #[test]
    fn every_shape_satisfies_index_contract() {
        for kind in ShapeKind::ALL {
            let shape = kind.generate().expect("generate");
            let (npoints, ntriangles) = (shape.npoints(), shape.ntriangles());
            let mesh = build_from_shape(kind).expect("build");

            assert_eq!(mesh.indices.len(), 3 * ntriangles, "{kind}");
            assert_eq!(mesh.count as usize, 3 * ntriangles, "{kind}");
            assert_eq!(mesh.positions.len(), npoints, "{kind}");
            assert_eq!(mesh.normals.len(), npoints, "{kind}");
            assert!(mesh.indices.iter().all(|&i| (i as usize) < npoints), "{kind}");
        }
    }

    #[test]
    fn shapes_without_tcoords_warn() {
        test_log::init();
        test_log::take();
        let plane = build_from_shape(ShapeKind::Plane).expect("plane");
        assert_eq!(plane.tcoords.len(), plane.positions.len());
        assert!(test_log::take().is_empty());

        let sphere = build_from_shape(ShapeKind::SubdividedSphere).expect("sphere");
        assert!(sphere.tcoords.is_empty());
        let warnings = test_log::take();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("sphere"));
    }

    #[test]
    fn obj_corner_out_of_range_is_an_error() {
        let mut obj = ObjData::default();
        obj.positions.push([1.0, 0.0, 0.0]);
        obj.normals.push([0.0, 0.0, 1.0]);
        obj.indices = vec![obj::ObjIndex { p: 5, t: 0, n: 1 }; 3];

        let err = build_from_obj(obj, "broken").unwrap_err();
        assert!(
            matches!(
                err,
                BuildError::CornerOutOfRange {
                    attribute: "position",
                    corner: 0,
                    index: 5,
                    len: 2
                }
            ),
            "{err}"
        );
    }

    #[test]
    fn shape_index_out_of_range_is_an_error() {
        let shape = ShapeMesh {
            points: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            triangles: vec![0, 1, 9],
            ..ShapeMesh::default()
        };
        let err = build_from_shape_mesh(shape, "broken").unwrap_err();
        assert!(
            matches!(
                err,
                BuildError::IndexOutOfRange {
                    index: 9,
                    at: 2,
                    vertex_count: 3
                }
            ),
            "{err}"
        );
    }

    #[test]
    fn partial_triangle_is_an_error() {
        let shape = ShapeMesh {
            points: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            triangles: vec![0, 1, 2, 0, 1],
            ..ShapeMesh::default()
        };
        let err = build_from_shape_mesh(shape, "broken").unwrap_err();
        assert!(matches!(err, BuildError::NotTriangleList(5)), "{err}");
    }

    #[test]
    fn shape_source_matches_direct_build() {
        let direct = build_from_shape(ShapeKind::Plane).expect("plane");
        let via_source = MeshSource::Shape(ShapeKind::Plane).build().expect("plane");
        assert_eq!(direct, via_source);
        assert_eq!(MeshSource::Shape(ShapeKind::Plane).to_string(), "shape:plane");
    }
}
