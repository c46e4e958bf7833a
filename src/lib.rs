#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Terrain
//!
//! A chunked, editable voxel terrain engine. Each chunk holds a procedurally
//! generated density field, a sparse map of sculpted density deltas and a triangle
//! mesh extracted with marching cubes.
//!
//! ## Key Modules
//!
//! * `core` - Shared-ownership primitives used throughout the engine
//! * `engine_state` - The engine: streaming, meshing, editing, persistence and the
//!   worker pool that runs them
//!
//! ## Architecture
//!
//! The engine follows a modular architecture with clear separation between:
//! * Chunk data and lifecycle (`World`, `ChunkStreamer`)
//! * Isosurface extraction and mesh assembly
//! * Sculpting and hit testing
//! * Persistence of edits behind a codec and a blob store
//! * Task scheduling and execution
//!
//! Nothing is drawn here. Finished meshes are handed to a [`MeshSink`] supplied by
//! the embedding application.
//!
//! ## Usage
//!
//! ```no_run
//! fn main() -> anyhow::Result<()> {
//!     voxel_terrain::run()
//! }
//! ```

use cgmath::{InnerSpace, Point3, Vector3};
use log::{info, warn};
use web_time::{Duration, Instant};

pub mod core;
pub mod engine_state;

pub use engine_state::config::TerrainConfig;
pub use engine_state::persistence::{BlobStore, FileBlobStore, MemoryBlobStore, ModificationStore};
pub use engine_state::rendering::{LoggingMeshSink, Mesh, MeshSink, MeshUpdate, Vertex};
pub use engine_state::voxels::chunk::{Chunk, ChunkState, ChunkTicket, ModificationMap};
pub use engine_state::voxels::editor::Brush;
pub use engine_state::voxels::raycast::RayHit;
pub use engine_state::voxels::sampler::{DensitySampler, FbmNoiseSampler};
pub use engine_state::voxels::streaming::ChunkStreamer;
pub use engine_state::voxels::world::World;
pub use engine_state::EngineState;

use crate::core::MtResource;

/// Simulation steps the headless demo runs.
const DEMO_STEPS: usize = 600;

/// Simulated frame time of the headless demo.
const DEMO_FRAME_TIME: f32 = 1.0 / 60.0;

/// Runs a headless demo of the engine.
///
/// Logging is configured from `RUST_LOG`. The first command line argument, if any,
/// is a JSON `TerrainConfig`. The demo flies the streaming center along the X axis
/// while sculpting straight down, then waits for the background work to drain and
/// logs what the renderer would have received.
pub fn run() -> anyhow::Result<()> {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");

    let config = match std::env::args().nth(1) {
        Some(path) => TerrainConfig::from_json_file(path)?,
        None => TerrainConfig::default(),
    };
    let chunk_world_size = config.chunk_world_size();

    let sink = MtResource::new(LoggingMeshSink::default());
    let mut engine = EngineState::with_defaults(config, Box::new(sink.clone()))?;

    let start = Instant::now();
    let velocity = Vector3::new(chunk_world_size * 0.25, 0.0, 0.0);
    let down = Vector3::new(0.2, 0.0, -1.0).normalize();
    let mut center = Point3::new(0.0, 0.0, chunk_world_size * 0.5);
    let mut sculpted = 0;

    for _ in 0..DEMO_STEPS {
        engine.tick(center);
        if engine.sculpt_along_ray(center, down, DEMO_FRAME_TIME).is_some() {
            sculpted += 1;
        }
        center += velocity * DEMO_FRAME_TIME;
    }

    if !engine.wait_until_idle(Duration::from_secs(60)) {
        warn!("Background work still running after shutdown timeout");
    }

    let received = sink.get();
    info!(
        "Demo finished in {:?}: {} chunks loaded, {} meshes applied, {} removed, {} strokes",
        start.elapsed(),
        engine.world().loaded_count(),
        received.meshes_applied,
        received.meshes_removed,
        sculpted
    );
    Ok(())
}
