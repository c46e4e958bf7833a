//! # Chunk Module
//!
//! This module provides the `Chunk` struct, the unit of terrain the engine streams,
//! edits, meshes and persists, together with the coordinate conventions shared by
//! the rest of the voxel code.
//!
//! ## Coordinate Spaces
//!
//! - **Chunk coordinates**: integer `(cx, cy, cz)` naming a chunk.
//! - **Voxel space**: integer grid of density samples. Chunk `c` with resolution
//!   `N` covers voxels `c * N ..= c * N + N`; the last layer is shared with the
//!   neighbouring chunk so that surfaces meet at chunk borders.
//! - **Chunk-local voxel space**: voxel space minus the chunk's voxel origin.
//!   Modification maps are keyed in this space.
//! - **World space**: voxel space times the voxel scale.
//!
//! ## Storage
//!
//! A chunk owns:
//! - `density`: the immutable base samples, behind an `Arc` so background jobs can
//!   read them without copying
//! - `modifications`: accumulated sculpting deltas
//! - `mesh`: the mesh currently shown for the chunk
//!
//! ## Lifecycle
//!
//! ```text
//! Unreserved -> Reserved -> Generating -> Ready -> [Editing -> Remeshing -> Ready]* -> Unloading -> Destroyed
//! ```
//!
//! `Unreserved`, `Reserved`, `Generating` and `Destroyed` describe coordinates the
//! `World` holds no `Chunk` for (or only a placeholder); a `Chunk` value itself is
//! always in one of the remaining states.

use std::sync::Arc;

use cgmath::{Point3, Vector3};

use super::editor::{self, Brush};
use crate::engine_state::rendering::Mesh;

pub mod density;
pub mod modification;

pub use density::{DensityField, DensityView};
pub use modification::ModificationMap;

/// Lifecycle state of a chunk coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkState {
    /// Nothing is known about the coordinate
    Unreserved,
    /// Reserved and waiting in the pending queue
    Reserved,
    /// Density generation and the first mesh are in flight
    Generating,
    /// Built and displayed
    Ready,
    /// An edit is being applied to the modification map
    Editing,
    /// A rebuilt mesh has been requested and has not been applied yet
    Remeshing,
    /// Leaving the world; no further updates are accepted
    Unloading,
    /// Removed from the world
    Destroyed,
}

/// Identity of one incarnation of a chunk.
///
/// Every reservation gets a fresh `generation`, so a ticket held by a background
/// job stops matching once its chunk is destroyed, even if the same coordinate is
/// loaded again later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkTicket {
    /// Chunk coordinate
    pub coordinate: Point3<i32>,
    /// Reservation counter value
    pub generation: u64,
}

/// A built terrain chunk.
#[derive(Debug)]
pub struct Chunk {
    ticket: ChunkTicket,
    state: ChunkState,
    density: Arc<DensityField>,
    modifications: ModificationMap,
    mesh: Mesh,
    /// Revision of the most recently requested mesh
    mesh_revision: u64,
    /// Revision of the mesh currently held in `mesh`
    applied_mesh_revision: u64,
    /// Bumped on every edit that changed the modification map
    modification_revision: u64,
}

impl Chunk {
    /// Creates a `Ready` chunk from the products of its generation job.
    ///
    /// # Arguments
    /// * `ticket` - The reservation the chunk was generated for
    /// * `density` - Base density samples
    /// * `modifications` - Edits loaded from storage
    /// * `mesh` - The initial mesh
    pub fn new(
        ticket: ChunkTicket,
        density: Arc<DensityField>,
        modifications: ModificationMap,
        mesh: Mesh,
    ) -> Self {
        Self {
            ticket,
            state: ChunkState::Ready,
            density,
            modifications,
            mesh,
            mesh_revision: 0,
            applied_mesh_revision: 0,
            modification_revision: 0,
        }
    }

    /// Continues the modification revision count of an earlier incarnation whose
    /// edits were loaded from storage.
    pub fn with_modification_revision(mut self, revision: u64) -> Self {
        self.modification_revision = revision;
        self
    }

    /// Chunk coordinate.
    pub fn coordinate(&self) -> Point3<i32> {
        self.ticket.coordinate
    }

    /// The reservation this chunk belongs to.
    pub fn ticket(&self) -> ChunkTicket {
        self.ticket
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ChunkState {
        self.state
    }

    /// Shared handle to the base density samples.
    pub fn density(&self) -> &Arc<DensityField> {
        &self.density
    }

    /// Accumulated edits.
    pub fn modifications(&self) -> &ModificationMap {
        &self.modifications
    }

    /// Effective density: base samples plus edits.
    pub fn view(&self) -> DensityView<'_> {
        DensityView::new(&self.density, &self.modifications)
    }

    /// The mesh currently shown for this chunk.
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Revision of the most recently requested mesh.
    pub fn mesh_revision(&self) -> u64 {
        self.mesh_revision
    }

    /// Number of edits that changed the modification map so far.
    pub fn modification_revision(&self) -> u64 {
        self.modification_revision
    }

    /// Applies a brush stroke centered at a chunk-local voxel-space position.
    ///
    /// # Returns
    /// The number of voxels whose delta changed. When it is non-zero the chunk is
    /// left in `Editing` and the caller is expected to request a remesh.
    pub fn apply_brush(&mut self, local: Vector3<f32>, brush: &Brush, dt: f32) -> usize {
        if self.state == ChunkState::Unloading {
            return 0;
        }
        let touched = editor::apply_brush(&mut self.modifications, local, brush, dt);
        if touched > 0 {
            self.state = ChunkState::Editing;
            self.modification_revision += 1;
        }
        touched
    }

    /// Adds edits recorded while the chunk was still being generated.
    ///
    /// # Returns
    /// The number of merged entries. A non-empty merge counts as one edit.
    pub fn merge_edits(&mut self, edits: &ModificationMap) -> usize {
        if edits.is_empty() {
            return 0;
        }
        for (voxel, delta) in edits.iter() {
            self.modifications.accumulate(voxel, delta);
        }
        self.modification_revision += 1;
        edits.len()
    }

    /// Requests a new mesh and returns the revision the rebuilt mesh must carry.
    pub fn begin_remesh(&mut self) -> u64 {
        self.mesh_revision += 1;
        self.state = ChunkState::Remeshing;
        self.mesh_revision
    }

    /// Installs a rebuilt mesh unless a newer one is already in place.
    ///
    /// # Returns
    /// `true` if the mesh was installed. The chunk becomes `Ready` again once the
    /// latest requested revision has been applied.
    pub fn apply_mesh(&mut self, revision: u64, mesh: Mesh) -> bool {
        if self.state == ChunkState::Unloading || revision <= self.applied_mesh_revision {
            return false;
        }
        self.mesh = mesh;
        self.applied_mesh_revision = revision;
        if self.applied_mesh_revision >= self.mesh_revision {
            self.state = ChunkState::Ready;
        }
        true
    }

    /// Marks the chunk as leaving the world.
    pub fn begin_unload(&mut self) {
        self.state = ChunkState::Unloading;
    }
}

/// Chunk coordinate containing a world-space position.
///
/// Each axis is `floor(position / chunk_world_size)`.
pub fn chunk_coordinate_of(position: Point3<f32>, chunk_world_size: f32) -> Point3<i32> {
    Point3::new(
        (position.x / chunk_world_size).floor() as i32,
        (position.y / chunk_world_size).floor() as i32,
        (position.z / chunk_world_size).floor() as i32,
    )
}

/// World-space position of a chunk's sample `(0, 0, 0)`.
pub fn chunk_world_origin(coordinate: Point3<i32>, chunk_world_size: f32) -> Point3<f32> {
    Point3::new(
        coordinate.x as f32 * chunk_world_size,
        coordinate.y as f32 * chunk_world_size,
        coordinate.z as f32 * chunk_world_size,
    )
}

/// World-space center of a chunk.
pub fn chunk_world_center(coordinate: Point3<i32>, chunk_world_size: f32) -> Point3<f32> {
    let half = chunk_world_size * 0.5;
    chunk_world_origin(coordinate, chunk_world_size) + Vector3::new(half, half, half)
}

/// Voxel-space position of a chunk's sample `(0, 0, 0)`.
pub fn chunk_voxel_origin(coordinate: Point3<i32>, resolution: usize) -> Point3<i32> {
    let resolution = resolution as i32;
    Point3::new(
        coordinate.x * resolution,
        coordinate.y * resolution,
        coordinate.z * resolution,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_chunk() -> Chunk {
        let ticket = ChunkTicket {
            coordinate: Point3::new(0, 0, 0),
            generation: 1,
        };
        let field = DensityField::from_fn(8, |_, _, z| z as f32 - 4.0);
        Chunk::new(ticket, Arc::new(field), ModificationMap::new(), Mesh::new())
    }

    fn brush() -> Brush {
        Brush {
            strength_per_second: -1.0,
            radius: 2.0,
        }
    }

    #[test]
    fn coordinates_floor_negative_positions() {
        assert_eq!(
            chunk_coordinate_of(Point3::new(-0.5, 31.9, 32.0), 32.0),
            Point3::new(-1, 0, 1)
        );
        assert_eq!(chunk_world_origin(Point3::new(-1, 2, 0), 16.0), Point3::new(-16.0, 32.0, 0.0));
        assert_eq!(chunk_world_center(Point3::new(0, 0, 0), 16.0), Point3::new(8.0, 8.0, 8.0));
        assert_eq!(chunk_voxel_origin(Point3::new(2, -1, 3), 8), Point3::new(16, -8, 24));
    }

    #[test]
    fn edits_move_through_remeshing_back_to_ready() {
        let mut chunk = ready_chunk();
        assert_eq!(chunk.state(), ChunkState::Ready);

        let touched = chunk.apply_brush(Vector3::new(4.0, 4.0, 4.0), &brush(), 0.2);
        assert!(touched > 0);
        assert_eq!(chunk.state(), ChunkState::Editing);
        assert_eq!(chunk.modification_revision(), 1);

        let revision = chunk.begin_remesh();
        assert_eq!(chunk.state(), ChunkState::Remeshing);
        assert!(chunk.apply_mesh(revision, Mesh::new()));
        assert_eq!(chunk.state(), ChunkState::Ready);
    }

    #[test]
    fn merged_edits_add_to_loaded_ones() {
        let mut loaded = ModificationMap::new();
        loaded.insert(Point3::new(1, 1, 1), 0.5);
        let mut chunk = ready_chunk();
        chunk = Chunk::new(chunk.ticket(), chunk.density().clone(), loaded, Mesh::new())
            .with_modification_revision(3);

        let mut deferred = ModificationMap::new();
        deferred.accumulate(Point3::new(1, 1, 1), -2.0);
        deferred.accumulate(Point3::new(0, 0, 0), 1.0);

        assert_eq!(chunk.merge_edits(&ModificationMap::new()), 0);
        assert_eq!(chunk.modification_revision(), 3);
        assert_eq!(chunk.merge_edits(&deferred), 2);
        assert_eq!(chunk.modification_revision(), 4);
        assert_eq!(chunk.modifications().get(Point3::new(1, 1, 1)), Some(-1.5));
        assert_eq!(chunk.modifications().get(Point3::new(0, 0, 0)), Some(1.0));
    }

    #[test]
    fn stale_meshes_are_dropped() {
        let mut chunk = ready_chunk();
        let first = chunk.begin_remesh();
        let second = chunk.begin_remesh();

        assert!(chunk.apply_mesh(second, Mesh::new()));
        assert!(!chunk.apply_mesh(first, Mesh::new()));
        assert_eq!(chunk.state(), ChunkState::Ready);
    }

    #[test]
    fn older_mesh_keeps_chunk_remeshing() {
        let mut chunk = ready_chunk();
        let first = chunk.begin_remesh();
        let _second = chunk.begin_remesh();

        assert!(chunk.apply_mesh(first, Mesh::new()));
        assert_eq!(chunk.state(), ChunkState::Remeshing);
    }

    #[test]
    fn unloading_chunks_ignore_edits_and_meshes() {
        let mut chunk = ready_chunk();
        let revision = chunk.begin_remesh();
        chunk.begin_unload();

        assert_eq!(chunk.apply_brush(Vector3::new(4.0, 4.0, 4.0), &brush(), 0.2), 0);
        assert!(!chunk.apply_mesh(revision, Mesh::new()));
        assert!(chunk.modifications().is_empty());
    }
}
