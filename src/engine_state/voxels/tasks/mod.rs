//! # Voxel Task System
//!
//! Background work that creates chunks. Remeshing after an edit lives with the
//! rest of the meshing code in `rendering::tasks`.

pub mod chunk_generation_task;

pub use chunk_generation_task::ChunkGenerationTask;
