//! # Engine State Module
//!
//! The core engine module that ties the terrain subsystems together.
//!
//! ## Key Components
//!
//! * `EngineState` - The main state container the embedding application drives
//! * `config` - Terrain tunables, loadable from JSON
//! * `persistence` - Per-chunk storage of edits
//! * `rendering` - Meshing pipeline and the renderer hand-off
//! * `task_management` - Worker pool for generation, remeshing and saving
//! * `voxels` - Chunk data, the world, streaming, editing and hit tests
//!
//! ## Architecture
//!
//! `EngineState` owns the `World` and is the only place it is mutated. Once per
//! simulation step the application calls [`EngineState::tick`] with the current
//! streaming center; in between it may sculpt. Heavy work (density sampling,
//! polygonization, file writes) runs on the task manager's workers, and its results
//! are applied at the start of the next tick.
//!
//! ## Example
//!
//! ```no_run
//! use cgmath::{Point3, Vector3};
//! use voxel_terrain::{EngineState, LoggingMeshSink, TerrainConfig};
//!
//! let mut engine = EngineState::with_defaults(
//!     TerrainConfig::default(),
//!     Box::new(LoggingMeshSink::default()),
//! )?;
//!
//! let eye = Point3::new(16.0, 16.0, 40.0);
//! loop {
//!     engine.tick(eye);
//!     engine.sculpt_along_ray(eye, Vector3::new(0.0, 0.0, -1.0), 1.0 / 60.0);
//!     # break;
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::sync::Arc;

use anyhow::Result;
use cgmath::{Point3, Vector3};
use log::{debug, info};
use web_time::{Duration, Instant};

use crate::engine_state::{
    config::TerrainConfig,
    persistence::{BlobStore, FileBlobStore, ModificationStore, SaveModificationsTask},
    rendering::{meshing::PolygonizeSettings, tasks::ChunkRemeshTask, MeshSink},
    task_management::{TaskContext, TaskManager},
    voxels::{
        editor::{self, chunks_touched_by, world_to_local, Brush, EditThrottle},
        raycast::{self, Ray, RayHit},
        sampler::{DensitySampler, FbmNoiseSampler},
        streaming::{ChunkStreamer, StreamerTick},
        tasks::ChunkGenerationTask,
        world::World,
    },
};

pub mod config;
pub mod persistence;
pub mod rendering;
pub mod task_management;
pub mod voxels;

/// The main state container of the terrain engine.
///
/// This struct owns every subsystem and coordinates their interactions: streaming
/// decides which chunks exist, the task manager builds them, the editor changes them
/// and the modification store persists the changes.
pub struct EngineState {
    config: TerrainConfig,
    /// Task manager for background work
    task_manager: TaskManager,
    /// Every chunk slot
    world: World,
    streamer: ChunkStreamer,
    sampler: Arc<dyn DensitySampler>,
    store: Arc<ModificationStore>,
    /// Receiver of finished meshes
    sink: Box<dyn MeshSink>,
    throttle: EditThrottle,
    settings: PolygonizeSettings,
}

impl EngineState {
    /// Creates a new engine with all subsystems initialized.
    ///
    /// # Arguments
    /// * `config` - Terrain configuration; validated here
    /// * `sampler` - Base density source
    /// * `blobs` - Where per-chunk edits are stored
    /// * `sink` - Receiver of finished chunk meshes
    ///
    /// # Errors
    /// Fails if the configuration is invalid or the worker threads cannot be started.
    pub fn new(
        config: TerrainConfig,
        sampler: Arc<dyn DensitySampler>,
        blobs: Arc<dyn BlobStore>,
        sink: Box<dyn MeshSink>,
    ) -> Result<Self> {
        config.validate()?;

        let task_manager = TaskManager::new(config.worker_count())?;
        info!(
            "Terrain engine ready: {}^3 voxel chunks, load radius {}, {} workers, {} sections per chunk",
            config.chunk_resolution,
            config.streaming.load_radius,
            task_manager.worker_count(),
            config.section_count()
        );

        Ok(Self {
            streamer: ChunkStreamer::from_config(&config),
            throttle: EditThrottle::new(config.editing.interval),
            settings: PolygonizeSettings::from_config(&config),
            store: Arc::new(ModificationStore::csv(blobs)),
            world: World::new(),
            task_manager,
            sampler,
            sink,
            config,
        })
    }

    /// Creates an engine with the fBm noise sampler and edits stored as files under
    /// `config.save_directory`.
    pub fn with_defaults(config: TerrainConfig, sink: Box<dyn MeshSink>) -> Result<Self> {
        let sampler = Arc::new(FbmNoiseSampler::new(&config.noise));
        let blobs = Arc::new(FileBlobStore::new(config.save_directory.clone()));
        Self::new(config, sampler, blobs, sink)
    }

    /// Advances the engine by one simulation step.
    ///
    /// Applies finished background work, runs one streaming step around `center`
    /// (a world-space position), starts generation for the chunks the streamer
    /// released from the pending queue and removes the meshes of destroyed chunks.
    pub fn tick(&mut self, center: Point3<f32>) -> StreamerTick {
        self.process_completed_tasks();

        let tick = self.streamer.tick(&mut self.world, center);
        for coordinate in &tick.unloaded {
            self.sink.remove_mesh(*coordinate);
            self.store.release(*coordinate);
        }
        for ticket in &tick.started {
            self.task_manager.publish_task(Box::new(ChunkGenerationTask::new(
                *ticket,
                self.sampler.clone(),
                self.store.clone(),
                self.config.chunk_resolution,
                self.settings.clone(),
            )));
        }
        if !tick.started.is_empty() || !tick.unloaded.is_empty() {
            debug!(
                "Streaming tick: {} started, {} unloaded, {} reserved, {} loaded",
                tick.started.len(),
                tick.unloaded.len(),
                tick.reserved,
                self.world.loaded_count()
            );
        }

        self.task_manager.process_queued_tasks();
        tick
    }

    /// Processes completed and queued tasks without streaming.
    pub fn process_tasks(&mut self) {
        self.process_completed_tasks();
        self.task_manager.process_queued_tasks();
    }

    fn process_completed_tasks(&mut self) -> usize {
        let mut context = TaskContext {
            world: &mut self.world,
            sink: self.sink.as_mut(),
            config: &self.config,
        };
        self.task_manager.process_completed_tasks(&mut context)
    }

    /// Sculpts every chunk the brush reaches.
    ///
    /// Chunks sharing a border receive the same stroke in their own local space.
    /// Each changed chunk gets its edits staged for saving and a remesh scheduled.
    /// Coordinates that are reserved or still generating keep the stroke as a
    /// deferred edit, which is merged once the chunk is built. Coordinates without
    /// a slot are not edited.
    ///
    /// # Returns
    /// The number of voxel deltas changed across all chunks.
    pub fn sculpt_at(&mut self, position: Point3<f32>, brush: &Brush, dt: f32) -> usize {
        let resolution = self.config.chunk_resolution;
        let voxel_scale = self.config.voxel_scale;

        let mut touched = 0;
        for coordinate in chunks_touched_by(position, brush.radius, resolution, voxel_scale) {
            let local = world_to_local(position, coordinate, resolution, voxel_scale);
            let Some(chunk) = self.world.chunk_mut(coordinate) else {
                if let Some(deferred) = self.world.deferred_edits_mut(coordinate) {
                    touched += editor::apply_brush(deferred, local, brush, dt);
                }
                continue;
            };
            let changed = chunk.apply_brush(local, brush, dt);
            if changed == 0 {
                continue;
            }
            touched += changed;

            let staged = self.store.stage(
                coordinate,
                chunk.modification_revision(),
                chunk.modifications().clone(),
            );
            if staged {
                self.task_manager
                    .publish_task(Box::new(SaveModificationsTask::new(self.store.clone(), coordinate)));
            }

            let revision = chunk.begin_remesh();
            self.task_manager.publish_task(Box::new(ChunkRemeshTask::new(
                chunk,
                revision,
                self.settings.clone(),
            )));
        }
        touched
    }

    /// Continuous sculpting driven by a pointer ray.
    ///
    /// Call once per frame while the sculpt input is held. Frame times accumulate in
    /// the edit throttle; when `editing.interval` seconds have built up, the ray is
    /// cast and the configured brush is applied at the hit with the accumulated
    /// window as its duration.
    ///
    /// # Returns
    /// The hit that was sculpted, if an edit fired and the ray met the terrain.
    pub fn sculpt_along_ray(&mut self, origin: Point3<f32>, direction: Vector3<f32>, dt: f32) -> Option<RayHit> {
        let window = self.throttle.advance(dt)?;
        let hit = self.raycast(origin, direction, self.config.editing.max_range)?;
        let brush = Brush::from_config(&self.config.editing);
        self.sculpt_at(hit.position, &brush, window);
        Some(hit)
    }

    /// Discards the partially accumulated edit window, e.g. when the sculpt input is
    /// released.
    pub fn stop_sculpting(&mut self) {
        self.throttle.reset();
    }

    /// Casts a ray against the loaded terrain.
    pub fn raycast(&self, origin: Point3<f32>, direction: Vector3<f32>, max_range: f32) -> Option<RayHit> {
        let ray = Ray {
            origin,
            direction,
            max_range,
        };
        raycast::raycast(&self.world, ray, &self.config)
    }

    /// The chunk slots.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The active configuration.
    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// The store edits are loaded from and saved to.
    pub fn modification_store(&self) -> &Arc<ModificationStore> {
        &self.store
    }

    /// Whether no background work is running or queued.
    pub fn is_idle(&self) -> bool {
        self.task_manager.is_idle()
    }

    /// Applies finished work until every background task is done.
    ///
    /// # Returns
    /// `false` if work was still outstanding after `timeout`.
    pub fn wait_until_idle(&mut self, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            self.process_tasks();
            if self.task_manager.is_idle() {
                return true;
            }
            if start.elapsed() >= timeout {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}
