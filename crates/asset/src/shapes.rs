//! Procedural primitive shapes with 16-bit triangle indices.
//!
//! Generators produce shared-vertex meshes: every point is referenced by all
//! the triangles around it. Normals are left unset until
//! [`ShapeMesh::compute_normals`] is called.

use std::{collections::HashMap, fmt, str::FromStr};

use glam::Vec3;

use crate::error::{BuildError, BuildResult};

/// Shapes the procedural build path can generate.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ShapeKind {
    Plane,
    Cube,
    SubdividedSphere,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 3] = [ShapeKind::Plane, ShapeKind::Cube, ShapeKind::SubdividedSphere];

    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::Plane => "plane",
            ShapeKind::Cube => "cube",
            ShapeKind::SubdividedSphere => "sphere",
        }
    }

    /// Run the generator for this kind with its default parameters.
    pub fn generate(self) -> BuildResult<ShapeMesh> {
        match self {
            ShapeKind::Plane => create_plane(1, 1),
            ShapeKind::Cube => Ok(create_cube()),
            ShapeKind::SubdividedSphere => create_subdivided_sphere(1),
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShapeKind {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plane" => Ok(ShapeKind::Plane),
            "cube" | "box" => Ok(ShapeKind::Cube),
            "sphere" | "subdivided-sphere" | "subdivided_sphere" => Ok(ShapeKind::SubdividedSphere),
            _ => Err(BuildError::UnknownShape(s.to_owned())),
        }
    }
}

/// Generator output: point-indexed attributes plus a triangle list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShapeMesh {
    pub points: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub tcoords: Option<Vec<[f32; 2]>>,
    /// Three indices per triangle, each `< points.len()`.
    pub triangles: Vec<u16>,
}

impl ShapeMesh {
    #[inline]
    pub fn npoints(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn ntriangles(&self) -> usize {
        self.triangles.len() / 3
    }

    /// Smooth per-point normals: the sum of adjacent unit face normals, normalized.
    ///
    /// Triangles referencing a point that does not exist contribute nothing.
    pub fn compute_normals(&mut self) {
        let mut sums = vec![Vec3::ZERO; self.points.len()];

        for tri in self.triangles.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let (Some(&pa), Some(&pb), Some(&pc)) =
                (self.points.get(a), self.points.get(b), self.points.get(c))
            else {
                continue;
            };
            let (pa, pb, pc) = (Vec3::from(pa), Vec3::from(pb), Vec3::from(pc));
            let face = (pb - pa).cross(pc - pa).normalize_or_zero();
            sums[a] += face;
            sums[b] += face;
            sums[c] += face;
        }

        self.normals = Some(
            sums.into_iter()
                .map(|n| n.normalize_or_zero().to_array())
                .collect(),
        );
    }
}

fn point_index(i: usize) -> BuildResult<u16> {
    u16::try_from(i).map_err(|_| BuildError::TooManyPoints { points: i + 1 })
}

/// Unit square in the XY plane split into `slices × stacks` cells, facing +Z.
pub fn create_plane(slices: u32, stacks: u32) -> BuildResult<ShapeMesh> {
    let slices = slices.max(1) as usize;
    let stacks = stacks.max(1) as usize;
    let row = slices + 1;
    let npoints = row * (stacks + 1);
    if npoints > u16::MAX as usize + 1 {
        return Err(BuildError::TooManyPoints { points: npoints });
    }

    let mut points = Vec::with_capacity(npoints);
    let mut tcoords = Vec::with_capacity(npoints);
    for stack in 0..=stacks {
        for slice in 0..=slices {
            let u = slice as f32 / slices as f32;
            let v = stack as f32 / stacks as f32;
            points.push([u, v, 0.0]);
            tcoords.push([u, v]);
        }
    }

    let mut triangles = Vec::with_capacity(slices * stacks * 6);
    for stack in 0..stacks {
        for slice in 0..slices {
            let a = point_index(stack * row + slice)?;
            let b = point_index(stack * row + slice + 1)?;
            let c = point_index((stack + 1) * row + slice + 1)?;
            let d = point_index((stack + 1) * row + slice)?;
            // CCW around +Z
            triangles.extend_from_slice(&[a, b, c, a, c, d]);
        }
    }

    Ok(ShapeMesh {
        points,
        normals: None,
        tcoords: Some(tcoords),
        triangles,
    })
}

/// Unit cube spanning [0, 1] on each axis, 8 shared corners, 12 outward triangles.
pub fn create_cube() -> ShapeMesh {
    const POINTS: [[f32; 3]; 8] = [
        [0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 1.0, 1.0],
        [1.0, 1.0, 1.0],
        [1.0, 0.0, 1.0],
    ];
    const QUADS: [[u16; 4]; 6] = [
        [7, 6, 5, 4], // +Z
        [0, 1, 2, 3], // -Z
        [6, 7, 3, 2], // +X
        [5, 6, 2, 1], // +Y
        [4, 5, 1, 0], // -X
        [7, 4, 0, 3], // -Y
    ];

    let triangles = QUADS
        .iter()
        .flat_map(|&[a, b, c, d]| [a, b, c, c, d, a])
        .collect();

    ShapeMesh {
        points: POINTS.to_vec(),
        normals: None,
        tcoords: None,
        triangles,
    }
}

/// Icosahedron subdivided `nsubd` times and projected onto the unit sphere.
pub fn create_subdivided_sphere(nsubd: u32) -> BuildResult<ShapeMesh> {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
    let mut points: Vec<Vec3> = [
        [-1.0, t, 0.0],
        [1.0, t, 0.0],
        [-1.0, -t, 0.0],
        [1.0, -t, 0.0],
        [0.0, -1.0, t],
        [0.0, 1.0, t],
        [0.0, -1.0, -t],
        [0.0, 1.0, -t],
        [t, 0.0, -1.0],
        [t, 0.0, 1.0],
        [-t, 0.0, -1.0],
        [-t, 0.0, 1.0],
    ]
    .into_iter()
    .map(|p| Vec3::from(p).normalize())
    .collect();

    let mut triangles: Vec<u16> = vec![
        0, 11, 5, 0, 5, 1, 0, 1, 7, 0, 7, 10, 0, 10, 11, //
        1, 5, 9, 5, 11, 4, 11, 10, 2, 10, 7, 6, 7, 1, 8, //
        3, 9, 4, 3, 4, 2, 3, 2, 6, 3, 6, 8, 3, 8, 9, //
        4, 9, 5, 2, 4, 11, 6, 2, 10, 8, 6, 7, 9, 8, 1,
    ];

    for _ in 0..nsubd {
        let mut midpoints: HashMap<(u16, u16), u16> = HashMap::new();
        let mut next = Vec::with_capacity(triangles.len() * 4);

        let mut midpoint = |a: u16, b: u16, points: &mut Vec<Vec3>| -> BuildResult<u16> {
            let key = (a.min(b), a.max(b));
            if let Some(&idx) = midpoints.get(&key) {
                return Ok(idx);
            }
            let idx = point_index(points.len())?;
            let mid = (points[a as usize] + points[b as usize]) * 0.5;
            points.push(mid.normalize());
            midpoints.insert(key, idx);
            Ok(idx)
        };

        for tri in triangles.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]];
            let ab = midpoint(a, b, &mut points)?;
            let bc = midpoint(b, c, &mut points)?;
            let ca = midpoint(c, a, &mut points)?;
            next.extend_from_slice(&[a, ab, ca, b, bc, ab, c, ca, bc, ab, bc, ca]);
        }
        triangles = next;
    }

    Ok(ShapeMesh {
        points: points.into_iter().map(|p| p.to_array()).collect(),
        normals: None,
        tcoords: None,
        triangles,
    })
}
