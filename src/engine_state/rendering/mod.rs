//! Rendering boundary of the terrain engine.
//!
//! The engine never draws anything itself. Finished chunk meshes are handed to a
//! [`MeshSink`], which the embedding application implements on top of whatever
//! renderer it uses. This module also contains the meshing pipeline that produces
//! those meshes and the background task that rebuilds a mesh after an edit.

use cgmath::Point3;
use log::debug;

use crate::core::MtResource;

pub mod meshing;
pub mod tasks;
mod vertex;

pub use meshing::Mesh;
pub use vertex::Vertex;

/// A finished chunk mesh, ready to replace whatever the renderer shows for the chunk.
#[derive(Debug, Clone, Copy)]
pub struct MeshUpdate<'a> {
    /// Chunk coordinate
    pub coordinate: Point3<i32>,
    /// World-space position that mesh positions are relative to
    pub origin: Point3<f32>,
    /// The assembled mesh
    pub mesh: &'a Mesh,
    /// Material name the surface should be drawn with
    pub material: &'a str,
}

/// Consumer of finished chunk meshes.
///
/// Calls only ever come from the thread that drives the engine.
pub trait MeshSink {
    /// Replaces the displayed surface of `update.coordinate`.
    fn apply_mesh(&mut self, update: MeshUpdate<'_>);

    /// Removes the displayed surface of a destroyed chunk.
    fn remove_mesh(&mut self, coordinate: Point3<i32>);
}

impl<T: MeshSink + Send + Sync + 'static> MeshSink for MtResource<T> {
    fn apply_mesh(&mut self, update: MeshUpdate<'_>) {
        self.get_mut().apply_mesh(update);
    }

    fn remove_mesh(&mut self, coordinate: Point3<i32>) {
        self.get_mut().remove_mesh(coordinate);
    }
}

/// A sink that only logs and counts what it receives.
///
/// Used by the headless runner and handy while wiring up a real renderer.
#[derive(Debug, Default)]
pub struct LoggingMeshSink {
    /// Number of meshes applied so far
    pub meshes_applied: usize,
    /// Number of meshes removed so far
    pub meshes_removed: usize,
    /// Triangles in the most recently applied mesh
    pub last_triangle_count: usize,
}

impl MeshSink for LoggingMeshSink {
    fn apply_mesh(&mut self, update: MeshUpdate<'_>) {
        self.meshes_applied += 1;
        self.last_triangle_count = update.mesh.triangle_count();
        debug!(
            "Mesh for chunk {:?}: {} vertices, {} triangles, material {}",
            update.coordinate,
            update.mesh.vertex_count(),
            update.mesh.triangle_count(),
            update.material
        );
    }

    fn remove_mesh(&mut self, coordinate: Point3<i32>) {
        self.meshes_removed += 1;
        debug!("Removed mesh for chunk {:?}", coordinate);
    }
}
