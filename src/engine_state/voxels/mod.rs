//! # Voxel Terrain Core
//!
//! This module contains the data side of the terrain: what a chunk holds, where
//! chunks exist, and how they change.
//!
//! ## Architecture
//!
//! * **Chunk**: Base density samples, sparse edit deltas and the current mesh of one
//!   cubic region, plus its lifecycle state
//! * **Sampler**: The procedural density source chunks are generated from
//! * **World**: Every chunk slot (reserved, generating or loaded) and the pending queue
//! * **Streaming**: Keeps the loaded set centered on a moving position
//! * **Editor**: Spherical falloff sculpting and the edit throttle
//! * **Raycast**: Hit tests against the loaded terrain
//! * **Tasks**: Background chunk generation
//!
//! ## Data Flow
//!
//! 1. The streamer reserves coordinates around the center and starts generating them
//! 2. Generation tasks sample the density, load saved edits and polygonize
//! 3. The engine installs the chunk in the world and hands its mesh to the renderer
//! 4. Edits accumulate deltas into a chunk and trigger a remesh and a save
//!
//! ## Thread Safety
//!
//! The `World` is owned by the engine thread. Workers only ever see `Arc`ed density
//! fields and copied modification snapshots.

pub mod chunk;
pub mod editor;
pub mod raycast;
pub mod sampler;
pub mod streaming;
pub mod tasks;
pub mod world;
