//! # Task System Core Traits
//!
//! This module defines the building blocks of the task system, which runs terrain
//! work (chunk generation, remeshing, saving) on worker threads.
//!
//! ## Core Components
//! - `Task`: A unit of work that runs on a worker thread
//! - `TaskResult`: The outcome of a task, applied on the engine thread
//! - `TaskContext`: The engine state a result may touch while it is applied
//!
//! ## Task Lifecycle
//! 1. A `Task` is created and scheduled via `TaskManager::publish_task()`
//! 2. The task's `process()` method is called on a worker thread
//! 3. The task returns a boxed `TaskResult`
//! 4. The result's `handle_result()` is called on the engine thread
//! 5. The result can mutate the world, push meshes to the sink and spawn new tasks
//!
//! ## Thread Safety
//! - Tasks own everything they read: `Arc`ed density fields, cloned modification
//!   snapshots and shared stores. They never hold a reference into the `World`.
//! - The `World` is only touched from `handle_result()`, on the engine thread.

use crate::engine_state::config::TerrainConfig;
use crate::engine_state::rendering::MeshSink;
use crate::engine_state::voxels::world::World;

/// Engine state handed to task results on the engine thread.
pub struct TaskContext<'a> {
    /// The chunk slots
    pub world: &'a mut World,
    /// Receiver of finished meshes
    pub sink: &'a mut dyn MeshSink,
    /// Active terrain configuration
    pub config: &'a TerrainConfig,
}

/// A unit of work that can be executed on a worker thread.
///
/// Tasks should be self-contained and coarse-grained: one chunk's worth of work.
pub trait Task: Send {
    /// Performs the work.
    ///
    /// Runs on a worker thread. Errors are handled internally and reported through
    /// the returned result.
    fn process(&self) -> Box<dyn TaskResult + Send>;
}

/// The result of processing a `Task`.
pub trait TaskResult: Send {
    /// Applies the result on the engine thread.
    ///
    /// Results of tasks whose chunk has been destroyed or superseded in the meantime
    /// must be dropped here without side effects.
    ///
    /// # Returns
    /// Follow-up tasks to schedule, possibly none.
    fn handle_result(self: Box<Self>, context: &mut TaskContext<'_>) -> Vec<Box<dyn Task + Send>>;
}
