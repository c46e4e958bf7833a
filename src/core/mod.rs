//! # Core Module
//!
//! Concurrency primitives shared by the rest of the engine.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource with read-write locking
//!
//! Chunk data itself is never shared through these handles: worker tasks receive
//! owned snapshots, and the `World` stays confined to the main thread.

pub mod mt_resource;

pub use mt_resource::MtResource;
