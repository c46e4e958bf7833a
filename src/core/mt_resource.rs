use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A thread-safe, reference-counted resource container with read-write locking.
///
/// `MtResource` is the shared-ownership handle used wherever state has to be
/// reachable from both the main thread and the worker pool, such as the in-memory
/// blob store or the per-chunk save ledger. It wraps an `Arc<RwLock<T>>`.
///
/// # Type Parameters
/// - `T`: The type of the contained resource, must be `Send + Sync`
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use voxel_terrain::core::MtResource;
///
/// let saved_revisions = MtResource::new(HashMap::<&str, u64>::new());
/// let worker_view = saved_revisions.clone();
///
/// std::thread::spawn(move || {
///     worker_view.get_mut().insert("Chunk_0_0_0.sav", 3);
/// })
/// .join()
/// .unwrap();
///
/// assert_eq!(saved_revisions.get().get("Chunk_0_0_0.sav"), Some(&3));
/// ```
///
/// # Performance Considerations
/// - Read operations (`get()`) can occur concurrently
/// - Write operations (`get_mut()`) are exclusive and will block other operations
#[derive(Debug, Default)]
pub struct MtResource<T: Send + Sync> {
    resource: Arc<RwLock<T>>,
}

impl<T: Send + Sync + 'static> MtResource<T> {
    /// Creates a new `MtResource` containing the given value.
    pub fn new(resource: T) -> Self {
        Self {
            resource: Arc::new(RwLock::new(resource)),
        }
    }

    /// Returns a read-only guard over the contained value.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    pub fn get(&self) -> RwLockReadGuard<'_, T> {
        self.resource.read().unwrap()
    }

    /// Returns a mutable guard over the contained value.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    pub fn get_mut(&self) -> RwLockWriteGuard<'_, T> {
        self.resource.write().unwrap()
    }
}

impl<T: Send + Sync> Clone for MtResource<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_same_value() {
        let deltas = MtResource::new(vec![0.5_f32]);
        let other = deltas.clone();

        other.get_mut().push(-0.25);

        assert_eq!(deltas.get().as_slice(), &[0.5, -0.25]);
        drop(other);
        assert_eq!(deltas.get().len(), 2);
    }
}
