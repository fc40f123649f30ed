//! Asset loading: OBJ parsing, procedural shapes and conversion into the
//! engine's unified [`Mesh`].

pub mod builder;
pub mod error;
pub mod mesh;
pub mod obj;
pub mod shapes;

pub use builder::{MeshSource, build_from_obj, build_from_obj_file, build_from_shape};
pub use error::{BuildError, BuildResult};
pub use mesh::Mesh;
pub use shapes::ShapeKind;
