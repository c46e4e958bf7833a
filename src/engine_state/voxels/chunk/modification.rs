//! Sparse, additive density edits layered over a chunk's base field.

use std::collections::HashMap;

use cgmath::Point3;

/// Mapping from voxel coordinate to an accumulated signed density delta.
///
/// Keys are chunk-local voxel coordinates but are not bounded to the chunk's
/// `[0, N]` window. Entries are only ever added or updated, never removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModificationMap {
    deltas: HashMap<Point3<i32>, f32>,
}

impl ModificationMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `delta` to the entry at `voxel`, creating it at `0.0` first if absent.
    pub fn accumulate(&mut self, voxel: Point3<i32>, delta: f32) {
        *self.deltas.entry(voxel).or_insert(0.0) += delta;
    }

    /// Overwrites the entry at `voxel`.
    pub fn insert(&mut self, voxel: Point3<i32>, delta: f32) {
        self.deltas.insert(voxel, delta);
    }

    /// The accumulated delta at `voxel`, or `0.0` if it was never edited.
    #[inline]
    pub fn delta_at(&self, voxel: Point3<i32>) -> f32 {
        self.deltas.get(&voxel).copied().unwrap_or(0.0)
    }

    /// Looks up an entry without defaulting.
    pub fn get(&self, voxel: Point3<i32>) -> Option<f32> {
        self.deltas.get(&voxel).copied()
    }

    /// Copies every entry of `other` into `self`, overwriting existing keys.
    pub fn overwrite_from(&mut self, other: &ModificationMap) {
        self.deltas
            .extend(other.deltas.iter().map(|(voxel, delta)| (*voxel, *delta)));
    }

    /// Number of edited voxels.
    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    /// Whether no voxel has been edited.
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Iterates over `(voxel, delta)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (Point3<i32>, f32)> + '_ {
        self.deltas.iter().map(|(voxel, delta)| (*voxel, *delta))
    }

    /// Entries sorted by `(z, y, x)`, for reproducible output.
    pub fn sorted_entries(&self) -> Vec<(Point3<i32>, f32)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by_key(|(voxel, _)| (voxel.z, voxel.y, voxel.x));
        entries
    }
}

impl FromIterator<(Point3<i32>, f32)> for ModificationMap {
    fn from_iter<I: IntoIterator<Item = (Point3<i32>, f32)>>(iter: I) -> Self {
        let mut map = ModificationMap::new();
        for (voxel, delta) in iter {
            map.insert(voxel, delta);
        }
        map
    }
}
