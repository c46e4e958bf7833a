//! Background write of a chunk's staged modifications.

use std::sync::Arc;

use cgmath::Point3;
use log::warn;

use super::ModificationStore;
use crate::engine_state::task_management::task::{Task, TaskContext, TaskResult};

/// Flushes the staged snapshot of one chunk to the blob store.
///
/// Published by the engine right after an edit has been staged with
/// `ModificationStore::stage`. If several saves of the same chunk are queued, the
/// first one to run writes the newest snapshot and the rest find nothing to do.
pub struct SaveModificationsTask {
    store: Arc<ModificationStore>,
    coordinate: Point3<i32>,
}

impl SaveModificationsTask {
    /// Creates a save task for the chunk at `coordinate`.
    pub fn new(store: Arc<ModificationStore>, coordinate: Point3<i32>) -> Self {
        Self { store, coordinate }
    }
}

impl Task for SaveModificationsTask {
    fn process(&self) -> Box<dyn TaskResult + Send> {
        Box::new(SaveModificationsTaskResult {
            coordinate: self.coordinate,
            outcome: self.store.flush(self.coordinate),
        })
    }
}

/// Outcome of a save, reported on the engine thread.
pub struct SaveModificationsTaskResult {
    coordinate: Point3<i32>,
    outcome: anyhow::Result<bool>,
}

impl TaskResult for SaveModificationsTaskResult {
    /// Failed saves are logged and not retried.
    fn handle_result(self: Box<Self>, _context: &mut TaskContext<'_>) -> Vec<Box<dyn Task + Send>> {
        if let Err(error) = self.outcome {
            warn!("Edits of chunk {:?} were not saved: {:#}", self.coordinate, error);
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::config::TerrainConfig;
    use crate::engine_state::persistence::MemoryBlobStore;
    use crate::engine_state::rendering::LoggingMeshSink;
    use crate::engine_state::voxels::chunk::ModificationMap;
    use crate::engine_state::voxels::world::World;

    #[test]
    fn processing_writes_the_staged_snapshot() {
        let blobs = MemoryBlobStore::new();
        let store = Arc::new(ModificationStore::csv(Arc::new(blobs.clone())));
        let coordinate = Point3::new(1, 1, 1);
        let snapshot: ModificationMap = [(Point3::new(2, 3, 4), -0.5_f32)].into_iter().collect();
        assert!(store.stage(coordinate, 1, snapshot.clone()));

        let task = SaveModificationsTask::new(store.clone(), coordinate);
        let result = task.process();

        assert_eq!(blobs.keys(), vec!["Chunk_1_1_1.sav".to_string()]);
        assert_eq!(store.load(coordinate).unwrap(), snapshot);

        let mut world = World::new();
        let mut sink = LoggingMeshSink::default();
        let config = TerrainConfig::default();
        let mut context = TaskContext {
            world: &mut world,
            sink: &mut sink,
            config: &config,
        };
        assert!(result.handle_result(&mut context).is_empty());
    }
}
