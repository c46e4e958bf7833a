//! Mesh containers and assembly.
//!
//! - [`MeshSection`]: triangle soup of one polygonized slab, local indices
//! - [`Mesh`]: the welded, indexed mesh handed to the renderer
//! - [`assemble`]: merges sections and welds duplicate vertices

mod assembly;
mod mesh;

pub use assembly::{assemble, merge_sections, weld, FALLBACK_NORMAL};
pub use mesh::*;
