//! Isosurface extraction for terrain chunks.
//!
//! This module converts a chunk's effective density into a renderable mesh in two
//! phases:
//! 1. **Polygonize**: the chunk's `[0, N)` cell range along Z is split into
//!    contiguous slabs, and each slab is run through marching cubes on the rayon
//!    pool into its own `MeshSection`. Slabs share no mutable state.
//! 2. **Assemble**: once every slab has finished, the sections are merged in slab
//!    order and welded into one indexed `Mesh` (see [`assemble`]).
//!
//! # Architecture
//! - `tables`: marching cubes lookup tables
//! - `marching_cubes`: per-cube polygonization and slab traversal
//! - `mesh/`: mesh containers and the assembler
//!
//! # Determinism
//! `rayon`'s indexed `collect` keeps sections in slab order, and cells inside a slab
//! are visited Z-major. The assembled mesh is therefore identical for any section
//! count.

use std::ops::Range;

use rayon::prelude::*;

use crate::engine_state::{config::TerrainConfig, voxels::chunk::DensityView};

pub mod marching_cubes;
mod mesh;
pub mod tables;

pub use marching_cubes::{march_cube, polygonize_range};
pub use mesh::*;

/// Parameters of one meshing pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonizeSettings {
    /// Isosurface threshold
    pub surface_level: f32,
    /// World units per voxel
    pub voxel_scale: f32,
    /// Placeholder color assigned to every triangle
    pub color: [u8; 4],
    /// Number of parallel Z slabs
    pub section_count: usize,
}

impl PolygonizeSettings {
    /// Builds the meshing parameters from the terrain configuration.
    pub fn from_config(config: &TerrainConfig) -> Self {
        Self {
            surface_level: config.surface_level,
            voxel_scale: config.voxel_scale,
            color: config.meshing.surface_color,
            section_count: config.section_count(),
        }
    }
}

/// Splits `0..resolution` into `count` contiguous, non-overlapping ranges.
///
/// `count` is clamped to `[1, resolution]`, so no range is empty unless the
/// resolution itself is zero.
pub fn section_ranges(resolution: usize, count: usize) -> Vec<Range<usize>> {
    let count = count.clamp(1, resolution.max(1));
    (0..count)
        .map(|section| (section * resolution / count)..((section + 1) * resolution / count))
        .collect()
}

/// Polygonizes a whole chunk in parallel slabs.
///
/// Blocks until every slab has been processed. Sections are returned in slab order
/// with local indices.
pub fn polygonize(view: DensityView<'_>, settings: &PolygonizeSettings) -> Vec<MeshSection> {
    section_ranges(view.field().resolution(), settings.section_count)
        .into_par_iter()
        .map(|range| polygonize_range(view, range, settings))
        .collect()
}

/// Polygonizes and assembles a chunk mesh.
///
/// # Arguments
/// * `view` - The chunk's effective density
/// * `settings` - Meshing parameters
/// * `weld_precision` - Quantization step used to weld duplicate vertices
pub fn build_mesh(view: DensityView<'_>, settings: &PolygonizeSettings, weld_precision: f32) -> Mesh {
    assemble(&polygonize(view, settings), weld_precision)
}
