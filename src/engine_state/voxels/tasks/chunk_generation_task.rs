//! # Chunk Generation Task
//!
//! This module defines the `ChunkGenerationTask`, which builds a chunk from scratch
//! on a worker thread: base density, saved edits and the first mesh. It is
//! scheduled by the engine for every coordinate the streamer starts.

use std::sync::Arc;

use log::{debug, warn};
use web_time::{Duration, Instant};

use crate::engine_state::{
    persistence::{ModificationStore, SaveModificationsTask},
    rendering::{
        meshing::{assemble, polygonize, MeshSection, PolygonizeSettings},
        tasks::ChunkRemeshTask,
        MeshUpdate,
    },
    task_management::task::{Task, TaskContext, TaskResult},
    voxels::{
        chunk::{chunk_voxel_origin, chunk_world_origin, Chunk, ChunkTicket, DensityField, DensityView, ModificationMap},
        sampler::DensitySampler,
    },
};

/// A task that generates one chunk.
///
/// The task is responsible for:
/// 1. Sampling the base density field at the chunk's voxel origin
/// 2. Loading the chunk's saved edits
/// 3. Polygonizing the effective density
///
/// Assembly of the polygonized sections happens on the engine thread, where the
/// result is also discarded if the chunk was released in the meantime. Strokes that
/// reached the chunk while it was generating are merged there too; they schedule a
/// save and a remesh as follow-up tasks.
pub struct ChunkGenerationTask {
    ticket: ChunkTicket,
    sampler: Arc<dyn DensitySampler>,
    store: Arc<ModificationStore>,
    resolution: usize,
    settings: PolygonizeSettings,
}

impl ChunkGenerationTask {
    /// Creates a new chunk generation task.
    ///
    /// # Arguments
    /// * `ticket` - The reservation being generated
    /// * `sampler` - Base density source
    /// * `store` - Where the chunk's saved edits are loaded from
    /// * `resolution` - Cells per chunk edge
    /// * `settings` - Meshing parameters
    pub fn new(
        ticket: ChunkTicket,
        sampler: Arc<dyn DensitySampler>,
        store: Arc<ModificationStore>,
        resolution: usize,
        settings: PolygonizeSettings,
    ) -> Self {
        ChunkGenerationTask {
            ticket,
            sampler,
            store,
            resolution,
            settings,
        }
    }
}

impl Task for ChunkGenerationTask {
    fn process(&self) -> Box<dyn TaskResult + Send> {
        let start = Instant::now();
        let coordinate = self.ticket.coordinate;

        let origin = chunk_voxel_origin(coordinate, self.resolution);
        let density = DensityField::generate(origin, self.resolution, self.sampler.as_ref());

        let (revision, modifications) = match self.store.load_with_revision(coordinate) {
            Ok(loaded) => loaded,
            Err(error) => {
                warn!("Ignoring saved edits of chunk {:?}: {:#}", coordinate, error);
                (0, ModificationMap::new())
            }
        };

        let sections = polygonize(DensityView::new(&density, &modifications), &self.settings);

        Box::new(ChunkGenerationTaskResult {
            ticket: self.ticket,
            store: self.store.clone(),
            density: Arc::new(density),
            modifications,
            revision,
            sections,
            elapsed: start.elapsed(),
        })
    }
}

/// The products of a chunk generation task.
pub struct ChunkGenerationTaskResult {
    ticket: ChunkTicket,
    store: Arc<ModificationStore>,
    density: Arc<DensityField>,
    modifications: ModificationMap,
    /// Modification revision the loaded edits were saved under
    revision: u64,
    sections: Vec<MeshSection>,
    elapsed: Duration,
}

impl TaskResult for ChunkGenerationTaskResult {
    /// Installs the chunk and hands its mesh to the sink.
    fn handle_result(self: Box<Self>, context: &mut TaskContext<'_>) -> Vec<Box<dyn Task + Send>> {
        let ChunkGenerationTaskResult {
            ticket,
            store,
            density,
            modifications,
            revision,
            sections,
            elapsed,
        } = *self;
        let coordinate = ticket.coordinate;
        if !context.world.is_current(ticket) {
            debug!("Dropping generation of released chunk {:?}", coordinate);
            return Vec::new();
        }

        let mesh = assemble(&sections, context.config.meshing.weld_precision);
        let chunk =
            Chunk::new(ticket, density, modifications, mesh).with_modification_revision(revision);
        let Some(chunk) = context.world.complete_generation(chunk) else {
            return Vec::new();
        };

        debug!(
            "Generated chunk {:?} in {:?}: {} triangles, {} edits",
            coordinate,
            elapsed,
            chunk.mesh().triangle_count(),
            chunk.modifications().len()
        );

        context.sink.apply_mesh(MeshUpdate {
            coordinate,
            origin: chunk_world_origin(coordinate, context.config.chunk_world_size()),
            mesh: chunk.mesh(),
            material: &context.config.meshing.material,
        });

        if chunk.modification_revision() == revision {
            return Vec::new();
        }

        // Deferred strokes were merged: the mesh above predates them.
        let mut follow_ups: Vec<Box<dyn Task + Send>> = Vec::new();
        if store.stage(coordinate, chunk.modification_revision(), chunk.modifications().clone()) {
            follow_ups.push(Box::new(SaveModificationsTask::new(store, coordinate)));
        }
        let mesh_revision = chunk.begin_remesh();
        follow_ups.push(Box::new(ChunkRemeshTask::new(
            chunk,
            mesh_revision,
            PolygonizeSettings::from_config(context.config),
        )));
        follow_ups
    }
}
