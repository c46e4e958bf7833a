//! # World Module
//!
//! This module provides the `World` struct, which owns every chunk slot of the
//! terrain and the queue of coordinates waiting to be generated.
//!
//! ## Architecture
//!
//! The world is a sparse map from chunk coordinate to a `ChunkSlot`:
//! - `Reserved`: the coordinate sits in the pending queue
//! - `Generating`: a generation job for the coordinate is in flight
//! - `Loaded`: the chunk is built
//!
//! A coordinate is reserved at most once until its slot is removed again, so the
//! pending queue and the slot map together never hold a coordinate twice.
//!
//! Strokes that reach a reserved or generating coordinate are kept as deferred
//! edits and folded into the chunk when its generation completes.
//!
//! ## Threading
//!
//! The world lives on the thread that drives the engine and is never shared with
//! workers. Background jobs carry a `ChunkTicket` instead of a reference; their
//! results are only applied while `is_current` still holds for that ticket.

use std::collections::{HashMap, VecDeque};

use cgmath::Point3;

use crate::engine_state::voxels::chunk::{Chunk, ChunkState, ChunkTicket, ModificationMap};

/// What the world knows about one chunk coordinate.
#[derive(Debug)]
enum ChunkSlot {
    Reserved(ChunkTicket),
    Generating(ChunkTicket),
    Loaded(Box<Chunk>),
}

impl ChunkSlot {
    fn ticket(&self) -> ChunkTicket {
        match self {
            ChunkSlot::Reserved(ticket) | ChunkSlot::Generating(ticket) => *ticket,
            ChunkSlot::Loaded(chunk) => chunk.ticket(),
        }
    }
}

/// The set of reserved, generating and loaded chunks.
///
/// # Examples
///
/// ```
/// use cgmath::Point3;
/// use voxel_terrain::World;
///
/// let mut world = World::new();
/// let ticket = world.reserve(Point3::new(0, 0, 0)).unwrap();
///
/// // A reserved coordinate cannot be queued twice.
/// assert!(world.reserve(Point3::new(0, 0, 0)).is_none());
/// assert_eq!(world.pop_pending(), Some(ticket));
/// assert!(world.is_current(ticket));
/// ```
#[derive(Debug, Default)]
pub struct World {
    slots: HashMap<Point3<i32>, ChunkSlot>,
    pending: VecDeque<ChunkTicket>,
    /// Edits for coordinates that have a slot but no built chunk yet
    deferred_edits: HashMap<Point3<i32>, ModificationMap>,
    next_generation: u64,
}

impl World {
    /// Creates a new, empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a coordinate and appends it to the pending queue.
    ///
    /// # Returns
    /// The new ticket, or `None` if the coordinate already has a slot.
    pub fn reserve(&mut self, coordinate: Point3<i32>) -> Option<ChunkTicket> {
        if self.slots.contains_key(&coordinate) {
            return None;
        }

        self.next_generation += 1;
        let ticket = ChunkTicket {
            coordinate,
            generation: self.next_generation,
        };
        self.slots.insert(coordinate, ChunkSlot::Reserved(ticket));
        self.pending.push_back(ticket);
        Some(ticket)
    }

    /// Takes the oldest pending coordinate and marks it as generating.
    pub fn pop_pending(&mut self) -> Option<ChunkTicket> {
        while let Some(ticket) = self.pending.pop_front() {
            if let Some(slot) = self.slots.get_mut(&ticket.coordinate) {
                if matches!(slot, ChunkSlot::Reserved(reserved) if *reserved == ticket) {
                    *slot = ChunkSlot::Generating(ticket);
                    return Some(ticket);
                }
            }
        }
        None
    }

    /// Whether `ticket` still names the live incarnation of its coordinate.
    pub fn is_current(&self, ticket: ChunkTicket) -> bool {
        self.slots
            .get(&ticket.coordinate)
            .is_some_and(|slot| slot.ticket() == ticket)
    }

    /// Installs a freshly generated chunk.
    ///
    /// Deferred edits recorded for the coordinate are added to the chunk's
    /// modifications first; the chunk's modification revision moves on if there were
    /// any, and its mesh is then out of date.
    ///
    /// # Returns
    /// The installed chunk, or `None` if its ticket is no longer generating (the
    /// coordinate was released in the meantime). The chunk is dropped in that case.
    pub fn complete_generation(&mut self, mut chunk: Chunk) -> Option<&mut Chunk> {
        let ticket = chunk.ticket();
        let slot = self.slots.get_mut(&ticket.coordinate)?;
        if !matches!(slot, ChunkSlot::Generating(generating) if *generating == ticket) {
            return None;
        }
        if let Some(edits) = self.deferred_edits.remove(&ticket.coordinate) {
            chunk.merge_edits(&edits);
        }
        *slot = ChunkSlot::Loaded(Box::new(chunk));
        match slot {
            ChunkSlot::Loaded(chunk) => Some(&mut **chunk),
            _ => None,
        }
    }

    /// Deferred edits of a coordinate that is reserved or generating.
    ///
    /// # Returns
    /// `None` if the coordinate is unreserved or already loaded; edit the loaded
    /// chunk directly in that case.
    pub fn deferred_edits_mut(&mut self, coordinate: Point3<i32>) -> Option<&mut ModificationMap> {
        match self.slots.get(&coordinate)? {
            ChunkSlot::Reserved(_) | ChunkSlot::Generating(_) => {
                Some(self.deferred_edits.entry(coordinate).or_default())
            }
            ChunkSlot::Loaded(_) => None,
        }
    }

    /// The loaded chunk at `coordinate`.
    pub fn chunk(&self, coordinate: Point3<i32>) -> Option<&Chunk> {
        match self.slots.get(&coordinate)? {
            ChunkSlot::Loaded(chunk) => Some(chunk.as_ref()),
            _ => None,
        }
    }

    /// Mutable access to the loaded chunk at `coordinate`.
    pub fn chunk_mut(&mut self, coordinate: Point3<i32>) -> Option<&mut Chunk> {
        match self.slots.get_mut(&coordinate)? {
            ChunkSlot::Loaded(chunk) => Some(chunk.as_mut()),
            _ => None,
        }
    }

    /// Mutable access to a loaded chunk, only if it is still the incarnation `ticket`
    /// refers to.
    pub fn chunk_for(&mut self, ticket: ChunkTicket) -> Option<&mut Chunk> {
        self.chunk_mut(ticket.coordinate)
            .filter(|chunk| chunk.ticket() == ticket)
    }

    /// Removes a loaded chunk from the world.
    ///
    /// Reserved and generating coordinates are left alone. Outstanding tickets for
    /// the removed chunk stop being current.
    pub fn unload(&mut self, coordinate: Point3<i32>) -> Option<Box<Chunk>> {
        if !matches!(self.slots.get(&coordinate), Some(ChunkSlot::Loaded(_))) {
            return None;
        }
        match self.slots.remove(&coordinate) {
            Some(ChunkSlot::Loaded(mut chunk)) => {
                chunk.begin_unload();
                Some(chunk)
            }
            _ => None,
        }
    }

    /// Lifecycle state of a coordinate.
    pub fn state_of(&self, coordinate: Point3<i32>) -> ChunkState {
        match self.slots.get(&coordinate) {
            None => ChunkState::Unreserved,
            Some(ChunkSlot::Reserved(_)) => ChunkState::Reserved,
            Some(ChunkSlot::Generating(_)) => ChunkState::Generating,
            Some(ChunkSlot::Loaded(chunk)) => chunk.state(),
        }
    }

    /// Whether the coordinate has any slot.
    pub fn contains(&self, coordinate: Point3<i32>) -> bool {
        self.slots.contains_key(&coordinate)
    }

    /// Iterates over the built chunks.
    pub fn loaded_chunks(&self) -> impl Iterator<Item = &Chunk> + '_ {
        self.slots.values().filter_map(|slot| match slot {
            ChunkSlot::Loaded(chunk) => Some(chunk.as_ref()),
            _ => None,
        })
    }

    /// Coordinates of the built chunks.
    pub fn loaded_coordinates(&self) -> Vec<Point3<i32>> {
        self.loaded_chunks().map(Chunk::coordinate).collect()
    }

    /// Number of built chunks.
    pub fn loaded_count(&self) -> usize {
        self.loaded_chunks().count()
    }

    /// Number of coordinates waiting in the pending queue.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of coordinates with a slot of any kind.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no coordinate has a slot.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
