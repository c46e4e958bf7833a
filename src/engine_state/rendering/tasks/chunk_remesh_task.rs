//! Task for rebuilding the mesh of an edited chunk in a background thread.
//!
//! The task works on a snapshot: the chunk's shared base density plus a copy of its
//! modification map taken when the remesh was requested. The world is free to keep
//! editing the chunk while the task runs; the result carries the mesh revision it
//! was requested for, and `Chunk::apply_mesh` rejects it if a newer mesh has already
//! been installed.

use std::sync::Arc;

use log::trace;

use crate::engine_state::{
    rendering::{
        meshing::{assemble, polygonize, MeshSection, PolygonizeSettings},
        MeshUpdate,
    },
    task_management::task::{Task, TaskContext, TaskResult},
    voxels::chunk::{chunk_world_origin, Chunk, ChunkTicket, DensityField, DensityView, ModificationMap},
};

/// A task that polygonizes a snapshot of a chunk's effective density.
pub struct ChunkRemeshTask {
    ticket: ChunkTicket,
    revision: u64,
    density: Arc<DensityField>,
    modifications: ModificationMap,
    settings: PolygonizeSettings,
}

impl ChunkRemeshTask {
    /// Creates a remesh task for `chunk`, tagged with the `revision` returned by
    /// `Chunk::begin_remesh`.
    pub fn new(chunk: &Chunk, revision: u64, settings: PolygonizeSettings) -> Self {
        ChunkRemeshTask {
            ticket: chunk.ticket(),
            revision,
            density: chunk.density().clone(),
            modifications: chunk.modifications().clone(),
            settings,
        }
    }
}

impl Task for ChunkRemeshTask {
    fn process(&self) -> Box<dyn TaskResult + Send> {
        let view = DensityView::new(&self.density, &self.modifications);
        Box::new(ChunkRemeshTaskResult {
            ticket: self.ticket,
            revision: self.revision,
            sections: polygonize(view, &self.settings),
        })
    }
}

/// Polygonized sections of a remeshed chunk, waiting to be assembled.
pub struct ChunkRemeshTaskResult {
    ticket: ChunkTicket,
    revision: u64,
    sections: Vec<MeshSection>,
}

impl TaskResult for ChunkRemeshTaskResult {
    /// Assembles the mesh, installs it on the chunk and forwards it to the sink.
    ///
    /// Nothing happens if the chunk was destroyed or a newer mesh is in place.
    fn handle_result(self: Box<Self>, context: &mut TaskContext<'_>) -> Vec<Box<dyn Task + Send>> {
        let coordinate = self.ticket.coordinate;
        let Some(chunk) = context.world.chunk_for(self.ticket) else {
            trace!("Dropping remesh of released chunk {:?}", coordinate);
            return Vec::new();
        };

        let mesh = assemble(&self.sections, context.config.meshing.weld_precision);
        if !chunk.apply_mesh(self.revision, mesh) {
            trace!(
                "Dropping stale mesh revision {} of chunk {:?}",
                self.revision,
                coordinate
            );
            return Vec::new();
        }

        context.sink.apply_mesh(MeshUpdate {
            coordinate,
            origin: chunk_world_origin(coordinate, context.config.chunk_world_size()),
            mesh: chunk.mesh(),
            material: &context.config.meshing.material,
        });
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Point3, Vector3};

    use super::*;
    use crate::core::MtResource;
    use crate::engine_state::config::TerrainConfig;
    use crate::engine_state::rendering::{LoggingMeshSink, Mesh};
    use crate::engine_state::voxels::chunk::ChunkState;
    use crate::engine_state::voxels::editor::Brush;
    use crate::engine_state::voxels::world::World;

    fn config() -> TerrainConfig {
        TerrainConfig {
            chunk_resolution: 8,
            ..TerrainConfig::default()
        }
    }

    /// A loaded chunk at the origin, solid below z = 3.5.
    fn loaded_world(config: &TerrainConfig) -> (World, ChunkTicket) {
        let mut world = World::new();
        let ticket = world.reserve(Point3::new(0, 0, 0)).unwrap();
        world.pop_pending();
        let field = DensityField::from_fn(config.chunk_resolution, |_, _, z| 3.5 - z as f32);
        world.complete_generation(Chunk::new(
            ticket,
            Arc::new(field),
            ModificationMap::new(),
            Mesh::new(),
        ));
        (world, ticket)
    }

    fn request_remesh(world: &mut World, ticket: ChunkTicket, config: &TerrainConfig) -> ChunkRemeshTask {
        let chunk = world.chunk_for(ticket).unwrap();
        let brush = Brush {
            strength_per_second: 5.0,
            radius: 2.0,
        };
        assert!(chunk.apply_brush(Vector3::new(4.0, 4.0, 3.0), &brush, 0.1) > 0);
        let revision = chunk.begin_remesh();
        ChunkRemeshTask::new(chunk, revision, PolygonizeSettings::from_config(config))
    }

    fn handle(task: &ChunkRemeshTask, world: &mut World, sink: &mut LoggingMeshSink, config: &TerrainConfig) {
        let mut context = TaskContext {
            world,
            sink,
            config,
        };
        assert!(task.process().handle_result(&mut context).is_empty());
    }

    #[test]
    fn remesh_installs_and_forwards_the_mesh() {
        let config = config();
        let (mut world, ticket) = loaded_world(&config);
        let mut sink = LoggingMeshSink::default();

        let task = request_remesh(&mut world, ticket, &config);
        assert_eq!(world.state_of(ticket.coordinate), ChunkState::Remeshing);
        handle(&task, &mut world, &mut sink, &config);

        assert_eq!(world.state_of(ticket.coordinate), ChunkState::Ready);
        assert!(!world.chunk(ticket.coordinate).unwrap().mesh().is_empty());
        assert_eq!(sink.meshes_applied, 1);
    }

    #[test]
    fn older_revisions_are_dropped() {
        let config = config();
        let (mut world, ticket) = loaded_world(&config);
        let mut sink = LoggingMeshSink::default();

        let first = request_remesh(&mut world, ticket, &config);
        let second = request_remesh(&mut world, ticket, &config);

        handle(&second, &mut world, &mut sink, &config);
        handle(&first, &mut world, &mut sink, &config);

        assert_eq!(sink.meshes_applied, 1);
        assert_eq!(world.state_of(ticket.coordinate), ChunkState::Ready);
    }

    #[test]
    fn results_for_released_chunks_are_dropped() {
        let config = config();
        let (mut world, ticket) = loaded_world(&config);
        let sink = MtResource::new(LoggingMeshSink::default());

        let task = request_remesh(&mut world, ticket, &config);
        world.unload(ticket.coordinate);

        let mut handle_sink = sink.clone();
        let mut context = TaskContext {
            world: &mut world,
            sink: &mut handle_sink,
            config: &config,
        };
        task.process().handle_result(&mut context);

        assert_eq!(sink.get().meshes_applied, 0);
    }
}
