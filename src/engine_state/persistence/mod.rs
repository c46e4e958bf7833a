//! # Persistence
//!
//! Terrain edits are saved per chunk as a blob named `Chunk_{x}_{y}_{z}.sav`.
//! Only the modification map is written; the base density is regenerated from the
//! sampler on load.
//!
//! Saving happens in two steps. The engine thread `stage`s a snapshot of a chunk's
//! modifications tagged with the chunk's modification revision, then a worker
//! `flush`es it. The `SaveLedger` guarantees that:
//! - at most one write per chunk is in flight
//! - a snapshot is never written after a newer one for the same chunk
//! - a load issued while a save is staged sees the staged snapshot
//!
//! When a chunk is unloaded the engine `release`s it, and its ledger entries are
//! dropped as soon as nothing is left to write. A later incarnation then starts
//! counting revisions from zero again, against a ledger that holds nothing older.

mod blob_store;
mod codec;
mod save_task;

pub use blob_store::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use codec::{CsvModificationCodec, ModificationCodec};
pub use save_task::SaveModificationsTask;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use cgmath::Point3;
use log::{debug, trace};

use crate::core::MtResource;
use crate::engine_state::voxels::chunk::ModificationMap;

/// Blob key of a chunk's save file.
pub fn chunk_key(coordinate: Point3<i32>) -> String {
    format!("Chunk_{}_{}_{}.sav", coordinate.x, coordinate.y, coordinate.z)
}

/// Per-chunk bookkeeping of staged and written snapshots.
#[derive(Debug, Default)]
struct SaveLedger {
    /// Revision most recently written to the blob store
    written: HashMap<Point3<i32>, u64>,
    /// Newest snapshot waiting to be written
    staged: HashMap<Point3<i32>, (u64, ModificationMap)>,
    /// Chunks a worker is currently writing
    writing: HashSet<Point3<i32>>,
    /// Unloaded chunks whose entries go once their writes are done
    released: HashSet<Point3<i32>>,
}

impl SaveLedger {
    fn evict_if_settled(&mut self, coordinate: Point3<i32>) {
        if self.released.contains(&coordinate)
            && !self.staged.contains_key(&coordinate)
            && !self.writing.contains(&coordinate)
        {
            self.released.remove(&coordinate);
            self.written.remove(&coordinate);
        }
    }
}

/// Loads and saves per-chunk modification maps.
pub struct ModificationStore {
    blobs: Arc<dyn BlobStore>,
    codec: Box<dyn ModificationCodec>,
    ledger: MtResource<SaveLedger>,
}

impl ModificationStore {
    /// Creates a store over `blobs` using `codec` for the file format.
    pub fn new(blobs: Arc<dyn BlobStore>, codec: Box<dyn ModificationCodec>) -> Self {
        Self {
            blobs,
            codec,
            ledger: MtResource::new(SaveLedger::default()),
        }
    }

    /// Creates a store that writes the `x,y,z,delta` text format.
    pub fn csv(blobs: Arc<dyn BlobStore>) -> Self {
        Self::new(blobs, Box::new(CsvModificationCodec))
    }

    /// Queues a snapshot of a chunk's modifications for writing.
    ///
    /// # Returns
    /// `false` if the snapshot is empty or not newer than what is already staged or
    /// written for that chunk; nothing is queued then.
    pub fn stage(&self, coordinate: Point3<i32>, revision: u64, snapshot: ModificationMap) -> bool {
        if snapshot.is_empty() {
            return false;
        }

        let mut ledger = self.ledger.get_mut();
        let newest = ledger
            .staged
            .get(&coordinate)
            .map(|(staged, _)| *staged)
            .into_iter()
            .chain(ledger.written.get(&coordinate).copied())
            .max();
        if newest.is_some_and(|newest| revision <= newest) {
            trace!(
                "Ignoring save of chunk {:?} at revision {} (have {:?})",
                coordinate,
                revision,
                newest
            );
            return false;
        }

        ledger.released.remove(&coordinate);
        ledger.staged.insert(coordinate, (revision, snapshot));
        true
    }

    /// Writes the newest staged snapshot of a chunk, and any that are staged while
    /// the write is in progress.
    ///
    /// # Returns
    /// `Ok(true)` if something was written, `Ok(false)` if there was nothing to do or
    /// another worker is already writing this chunk.
    pub fn flush(&self, coordinate: Point3<i32>) -> Result<bool> {
        if !self.ledger.get_mut().writing.insert(coordinate) {
            return Ok(false);
        }

        let mut wrote = false;
        loop {
            let (revision, snapshot) = {
                let mut ledger = self.ledger.get_mut();
                let written = ledger.written.get(&coordinate).copied();
                let newer = match ledger.staged.get(&coordinate) {
                    Some((revision, snapshot)) if written.map_or(true, |w| *revision > w) => {
                        Some((*revision, snapshot.clone()))
                    }
                    _ => None,
                };
                match newer {
                    Some(newer) => newer,
                    None => {
                        ledger.staged.remove(&coordinate);
                        ledger.writing.remove(&coordinate);
                        ledger.evict_if_settled(coordinate);
                        return Ok(wrote);
                    }
                }
            };

            let key = chunk_key(coordinate);
            let bytes = self.codec.encode(&snapshot);
            if let Err(error) = self.blobs.write(&key, &bytes) {
                self.ledger.get_mut().writing.remove(&coordinate);
                return Err(error).with_context(|| format!("saving chunk {:?}", coordinate));
            }

            debug!(
                "Saved {} modifications of chunk {:?} at revision {}",
                snapshot.len(),
                coordinate,
                revision
            );
            self.ledger.get_mut().written.insert(coordinate, revision);
            wrote = true;
        }
    }

    /// Stages and immediately writes a snapshot.
    pub fn save(&self, coordinate: Point3<i32>, revision: u64, modifications: &ModificationMap) -> Result<bool> {
        if !self.stage(coordinate, revision, modifications.clone()) {
            return Ok(false);
        }
        self.flush(coordinate)
    }

    /// Reads the saved modifications of a chunk.
    ///
    /// A staged but unwritten snapshot takes precedence over the stored blob. A chunk
    /// that was never saved yields an empty map.
    pub fn load(&self, coordinate: Point3<i32>) -> Result<ModificationMap> {
        self.load_with_revision(coordinate).map(|(_, modifications)| modifications)
    }

    /// Like [`load`](Self::load), also returning the revision of the snapshot this
    /// session staged or wrote last for the chunk (`0` if none).
    ///
    /// A reloaded chunk continues counting from this revision, so its later saves
    /// are not mistaken for stale ones.
    pub fn load_with_revision(&self, coordinate: Point3<i32>) -> Result<(u64, ModificationMap)> {
        let written = {
            let ledger = self.ledger.get();
            if let Some((revision, snapshot)) = ledger.staged.get(&coordinate) {
                return Ok((*revision, snapshot.clone()));
            }
            ledger.written.get(&coordinate).copied().unwrap_or(0)
        };

        let key = chunk_key(coordinate);
        let bytes = self
            .blobs
            .read(&key)
            .with_context(|| format!("loading chunk {:?}", coordinate))?;
        let modifications = bytes
            .map(|bytes| self.codec.decode(&bytes))
            .unwrap_or_default();
        Ok((written, modifications))
    }

    /// Loads a chunk's saved modifications into `modifications`, overwriting entries
    /// that exist in both.
    ///
    /// # Returns
    /// The number of loaded entries.
    pub fn load_into(&self, coordinate: Point3<i32>, modifications: &mut ModificationMap) -> Result<usize> {
        let loaded = self.load(coordinate)?;
        modifications.overwrite_from(&loaded);
        Ok(loaded.len())
    }

    /// Forgets the bookkeeping of an unloaded chunk once its pending writes finish.
    ///
    /// A snapshot that is still staged keeps the entry alive, including one whose
    /// write failed.
    pub fn release(&self, coordinate: Point3<i32>) {
        let mut ledger = self.ledger.get_mut();
        ledger.released.insert(coordinate);
        ledger.evict_if_settled(coordinate);
    }

    /// Number of chunks the save ledger holds state for.
    pub fn tracked_chunks(&self) -> usize {
        let ledger = self.ledger.get();
        ledger
            .written
            .keys()
            .chain(ledger.staged.keys())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Whether any snapshot is staged but not yet written.
    pub fn has_pending_saves(&self) -> bool {
        !self.ledger.get().staged.is_empty()
    }
}

impl std::fmt::Debug for ModificationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ledger = self.ledger.get();
        f.debug_struct("ModificationStore")
            .field("staged", &ledger.staged.len())
            .field("written", &ledger.written.len())
            .field("released", &ledger.released.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edits(entries: &[((i32, i32, i32), f32)]) -> ModificationMap {
        entries
            .iter()
            .map(|&((x, y, z), delta)| (Point3::new(x, y, z), delta))
            .collect()
    }

    /// A blob store whose writes always fail.
    struct BrokenStore;

    impl BlobStore for BrokenStore {
        fn read(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }

        fn write(&self, key: &str, _bytes: &[u8]) -> Result<()> {
            anyhow::bail!("disk full while writing {}", key)
        }
    }

    #[test]
    fn keys_name_the_chunk() {
        assert_eq!(chunk_key(Point3::new(-1, 0, 12)), "Chunk_-1_0_12.sav");
    }

    #[test]
    fn saved_modifications_load_back() {
        let blobs = MemoryBlobStore::new();
        let store = ModificationStore::csv(Arc::new(blobs.clone()));
        let coordinate = Point3::new(2, -3, 0);
        let saved = edits(&[((0, 0, 0), -0.5), ((15, 3, 7), 0.125)]);

        assert!(store.save(coordinate, 1, &saved).unwrap());

        assert_eq!(blobs.keys(), vec!["Chunk_2_-3_0.sav".to_string()]);
        assert!(!store.has_pending_saves());
        assert_eq!(store.load(coordinate).unwrap(), saved);
    }

    #[test]
    fn unsaved_chunks_load_empty() {
        let store = ModificationStore::csv(Arc::new(MemoryBlobStore::new()));
        assert!(store.load(Point3::new(9, 9, 9)).unwrap().is_empty());
    }

    #[test]
    fn loading_overwrites_existing_entries() {
        let store = ModificationStore::csv(Arc::new(MemoryBlobStore::new()));
        let coordinate = Point3::new(0, 0, 0);
        store
            .save(coordinate, 1, &edits(&[((1, 1, 1), 2.0)]))
            .unwrap();

        let mut current = edits(&[((1, 1, 1), -7.0), ((2, 2, 2), 1.0)]);
        assert_eq!(store.load_into(coordinate, &mut current).unwrap(), 1);

        assert_eq!(current.get(Point3::new(1, 1, 1)), Some(2.0));
        assert_eq!(current.get(Point3::new(2, 2, 2)), Some(1.0));
    }

    #[test]
    fn older_snapshots_never_replace_newer_ones() {
        let blobs = MemoryBlobStore::new();
        let store = ModificationStore::csv(Arc::new(blobs.clone()));
        let coordinate = Point3::new(0, 1, 0);
        let newer = edits(&[((0, 0, 0), -2.0)]);

        assert!(store.save(coordinate, 5, &newer).unwrap());
        assert!(!store.stage(coordinate, 4, edits(&[((0, 0, 0), -1.0)])));
        assert!(!store.stage(coordinate, 5, edits(&[((0, 0, 0), -1.0)])));
        assert!(!store.flush(coordinate).unwrap());

        assert_eq!(store.load(coordinate).unwrap(), newer);
        assert_eq!(store.load_with_revision(coordinate).unwrap().0, 5);
    }

    #[test]
    fn staged_snapshots_are_visible_before_they_are_written() {
        let store = ModificationStore::csv(Arc::new(MemoryBlobStore::new()));
        let coordinate = Point3::new(4, 4, 4);
        let first = edits(&[((0, 0, 0), 1.0)]);
        let second = edits(&[((0, 0, 0), 1.5), ((1, 0, 0), 0.5)]);

        assert!(store.stage(coordinate, 1, first));
        assert!(store.stage(coordinate, 2, second.clone()));
        assert!(store.has_pending_saves());
        assert_eq!(store.load(coordinate).unwrap(), second);

        assert!(store.flush(coordinate).unwrap());
        assert_eq!(store.load(coordinate).unwrap(), second);
    }

    #[test]
    fn empty_maps_are_not_saved() {
        let blobs = MemoryBlobStore::new();
        let store = ModificationStore::csv(Arc::new(blobs.clone()));
        assert!(!store.save(Point3::new(0, 0, 0), 1, &ModificationMap::new()).unwrap());
        assert!(blobs.is_empty());
    }

    #[test]
    fn failed_writes_report_errors_and_keep_the_snapshot() {
        let store = ModificationStore::csv(Arc::new(BrokenStore));
        let coordinate = Point3::new(1, 2, 3);
        let snapshot = edits(&[((0, 0, 0), 1.0)]);

        let error = store.save(coordinate, 1, &snapshot).unwrap_err();
        assert!(format!("{:#}", error).contains("disk full"));

        // Still staged, so the edits are not lost for this session.
        assert_eq!(store.load(coordinate).unwrap(), snapshot);
    }

    #[test]
    fn released_chunks_are_forgotten_once_written() {
        let blobs = MemoryBlobStore::new();
        let store = ModificationStore::csv(Arc::new(blobs.clone()));
        let saved = edits(&[((0, 0, 0), -1.0)]);
        for x in 0..4 {
            store.save(Point3::new(x, 0, 0), 3, &saved).unwrap();
        }
        assert_eq!(store.tracked_chunks(), 4);

        for x in 0..4 {
            store.release(Point3::new(x, 0, 0));
        }
        assert_eq!(store.tracked_chunks(), 0);
        assert_eq!(blobs.len(), 4);

        // The file is still there; only the revision count starts over.
        let (revision, loaded) = store.load_with_revision(Point3::new(2, 0, 0)).unwrap();
        assert_eq!(revision, 0);
        assert_eq!(loaded, saved);
        assert!(store.stage(Point3::new(2, 0, 0), 1, edits(&[((0, 0, 0), -2.0)])));
    }

    #[test]
    fn release_waits_for_staged_snapshots() {
        let store = ModificationStore::csv(Arc::new(MemoryBlobStore::new()));
        let coordinate = Point3::new(5, 0, 0);
        let snapshot = edits(&[((1, 1, 1), 0.5)]);

        assert!(store.stage(coordinate, 2, snapshot.clone()));
        store.release(coordinate);
        assert_eq!(store.tracked_chunks(), 1);
        assert_eq!(store.load_with_revision(coordinate).unwrap(), (2, snapshot));

        assert!(store.flush(coordinate).unwrap());
        assert_eq!(store.tracked_chunks(), 0);
    }

    #[test]
    fn staging_again_cancels_a_release() {
        let store = ModificationStore::csv(Arc::new(MemoryBlobStore::new()));
        let coordinate = Point3::new(0, 0, 7);

        assert!(store.stage(coordinate, 1, edits(&[((0, 0, 0), 1.0)])));
        store.release(coordinate);
        assert!(store.stage(coordinate, 2, edits(&[((0, 0, 0), 2.0)])));
        assert!(store.flush(coordinate).unwrap());

        assert_eq!(store.tracked_chunks(), 1);
        assert_eq!(store.load_with_revision(coordinate).unwrap().0, 2);
    }

    #[test]
    fn file_store_persists_between_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let coordinate = Point3::new(-4, 0, 1);
        let saved = edits(&[((3, 3, 3), -0.75), ((-1, 16, 2), 0.2)]);

        {
            let store = ModificationStore::csv(Arc::new(FileBlobStore::new(dir.path())));
            store.save(coordinate, 1, &saved).unwrap();
        }

        let store = ModificationStore::csv(Arc::new(FileBlobStore::new(dir.path())));
        assert_eq!(store.load(coordinate).unwrap(), saved);
        assert!(dir.path().join("Chunk_-4_0_1.sav").exists());
    }
}
