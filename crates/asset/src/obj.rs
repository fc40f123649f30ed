//! Minimal OBJ parser supporting positions, normals and texture coordinates.
//!
//! The parser keeps OBJ's per-attribute indexing: every face corner references
//! a position, a texture coordinate and a normal independently. Slot 0 of each
//! attribute array is a reserved default entry, so a corner that omits an
//! attribute refers to index 0 and the `*_count()` accessors include that slot.

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result, anyhow};

/// One face corner: indices into the attribute arrays of [`ObjData`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ObjIndex {
    pub p: u32,
    pub t: u32,
    pub n: u32,
}

/// Parsed OBJ contents, triangulated into a flat corner list.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjData {
    pub positions: Vec<[f32; 3]>,
    pub texcoords: Vec<[f32; 2]>,
    pub normals: Vec<[f32; 3]>,
    /// Three corners per triangle.
    pub indices: Vec<ObjIndex>,
}

impl Default for ObjData {
    fn default() -> Self {
        Self {
            positions: vec![[0.0; 3]],
            texcoords: vec![[0.0; 2]],
            normals: vec![[0.0, 0.0, 1.0]],
            indices: Vec::new(),
        }
    }
}

impl ObjData {
    #[inline]
    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn texcoord_count(&self) -> usize {
        self.texcoords.len()
    }

    #[inline]
    pub fn normal_count(&self) -> usize {
        self.normals.len()
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Load an OBJ file from a file path.
pub fn load_obj_from_path(path: impl AsRef<Path>) -> Result<ObjData> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open OBJ file: {}", path.as_ref().display()))?;
    load_obj_from_reader(BufReader::new(file))
}

/// Load an OBJ file from a [`BufRead`] implementation.
pub fn load_obj_from_reader<R: BufRead>(reader: R) -> Result<ObjData> {
    parse_obj(reader)
}

/// Convenience helper to parse an OBJ string literal.
pub fn load_obj_from_str(contents: &str) -> Result<ObjData> {
    parse_obj(io::Cursor::new(contents))
}

fn parse_obj<R: BufRead>(reader: R) -> Result<ObjData> {
    let mut obj = ObjData::default();
    let mut face: Vec<ObjIndex> = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", line_no + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let tag = parts
            .next()
            .ok_or_else(|| anyhow!("Malformed OBJ line {}: '{}'", line_no + 1, trimmed))?;

        match tag {
            "v" => {
                let x = parse_f32(parts.next(), line_no, "x coordinate")?;
                let y = parse_f32(parts.next(), line_no, "y coordinate")?;
                let z = parse_f32(parts.next(), line_no, "z coordinate")?;
                obj.positions.push([x, y, z]);
            }
            "vt" => {
                let u = parse_f32(parts.next(), line_no, "u coordinate")?;
                // `vt u` alone is legal; v defaults to 0.
                let v = match parts.next() {
                    Some(token) => parse_f32(Some(token), line_no, "v coordinate")?,
                    None => 0.0,
                };
                obj.texcoords.push([u, v]);
            }
            "vn" => {
                let nx = parse_f32(parts.next(), line_no, "nx coordinate")?;
                let ny = parse_f32(parts.next(), line_no, "ny coordinate")?;
                let nz = parse_f32(parts.next(), line_no, "nz coordinate")?;
                obj.normals.push([nx, ny, nz]);
            }
            "f" => {
                face.clear();
                for part in parts {
                    face.push(parse_face_vertex(part, &obj, line_no)?);
                }

                if face.len() < 3 {
                    log::debug!(
                        "Skipping degenerate face with {} corners on line {}",
                        face.len(),
                        line_no + 1
                    );
                    continue;
                }
                // Triangulate fan
                for tri in 1..(face.len() - 1) {
                    obj.indices.push(face[0]);
                    obj.indices.push(face[tri]);
                    obj.indices.push(face[tri + 1]);
                }
            }
            _ => {
                // Ignore other directives (o/g/s/usemtl/mtllib/etc.)
            }
        }
    }

    log::debug!(
        "Parsed OBJ: {} positions, {} texcoords, {} normals, {} triangles",
        obj.position_count() - 1,
        obj.texcoord_count() - 1,
        obj.normal_count() - 1,
        obj.triangle_count()
    );

    Ok(obj)
}

fn parse_f32(value: Option<&str>, line_no: usize, what: &str) -> Result<f32> {
    let token = value.ok_or_else(|| anyhow!("Missing {} on line {}", what, line_no + 1))?;
    token
        .parse::<f32>()
        .with_context(|| format!("Failed to parse {} on line {}", what, line_no + 1))
}

fn parse_face_vertex(token: &str, obj: &ObjData, line_no: usize) -> Result<ObjIndex> {
    let mut split = token.split('/');
    let pos = split
        .next()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow!("Malformed face element '{}' on line {}", token, line_no + 1))?;
    let p = resolve_index(pos, obj.position_count(), line_no)?;

    let t = match split.next() {
        Some(value) if !value.is_empty() => resolve_index(value, obj.texcoord_count(), line_no)?,
        _ => 0,
    };

    let n = match split.next() {
        Some(value) if !value.is_empty() => resolve_index(value, obj.normal_count(), line_no)?,
        _ => 0,
    };

    Ok(ObjIndex { p, t, n })
}

/// Resolve a 1-based (or negative, relative) OBJ index against an attribute
/// array whose slot 0 is the reserved default, so positive indices map 1:1.
fn resolve_index(token: &str, len: usize, line_no: usize) -> Result<u32> {
    let raw = token
        .parse::<i64>()
        .with_context(|| format!("Invalid index '{}' on line {}", token, line_no + 1))?;
    if raw == 0 {
        anyhow::bail!("OBJ indices are 1-based; found 0 on line {}", line_no + 1);
    }

    let idx = if raw > 0 { raw } else { len as i64 + raw };

    if idx < 1 || idx as usize >= len {
        anyhow::bail!(
            "OBJ index {} resolved out of bounds (len={}) on line {}",
            raw,
            len - 1,
            line_no + 1
        );
    }

    u32::try_from(idx).with_context(|| format!("OBJ index {} too large on line {}", raw, line_no + 1))
}
