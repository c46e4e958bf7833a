//! Background tasks for the rendering system.
//!
//! # Available Tasks
//! - `ChunkRemeshTask`: Rebuilds the mesh of an edited chunk

pub mod chunk_remesh_task;

pub use chunk_remesh_task::ChunkRemeshTask;
