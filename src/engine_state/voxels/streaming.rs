//! # Chunk Streaming
//!
//! The `ChunkStreamer` decides which chunks should exist around a moving center and
//! rate-limits how fast they are generated. It is driven once per simulation step by
//! the engine; each tick does, in order:
//!
//! 1. Dequeue up to `chunks_per_tick` pending coordinates and hand them back to the
//!    caller to start generating.
//! 2. Destroy loaded chunks whose center is further than `retention_radius` chunks
//!    from the streaming center.
//! 3. Reserve every coordinate of the load cube around the center's chunk that
//!    has no slot yet, nearest first.
//!
//! The load cube holds every offset `o` with `max(|o.x|, |o.y|, |o.z|) <=
//! load_radius` (in chunks). Its corners sit `sqrt(3)` times further out than its
//! faces, which is why the retention radius is checked against the corners.

use cgmath::{MetricSpace, Point3, Vector3};

use super::chunk::{chunk_coordinate_of, chunk_world_center, ChunkTicket};
use super::world::World;
use crate::engine_state::config::TerrainConfig;

/// What one streaming tick changed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StreamerTick {
    /// Coordinates that moved from `Reserved` to `Generating`
    pub started: Vec<ChunkTicket>,
    /// Chunks that were destroyed
    pub unloaded: Vec<Point3<i32>>,
    /// Number of coordinates newly reserved
    pub reserved: usize,
}

/// Keeps the loaded set centered on a moving position.
#[derive(Debug, Clone)]
pub struct ChunkStreamer {
    chunk_world_size: f32,
    retention_radius: f32,
    chunks_per_tick: usize,
    /// Load cube offsets, sorted nearest first
    offsets: Vec<Vector3<i32>>,
}

impl ChunkStreamer {
    /// Creates a streamer.
    ///
    /// # Arguments
    /// * `chunk_world_size` - Edge length of a chunk in world units
    /// * `load_radius` - Half edge of the load cube, in chunks
    /// * `retention_radius` - Distance in chunks beyond which chunks are destroyed
    /// * `chunks_per_tick` - Generation starts allowed per tick
    pub fn new(
        chunk_world_size: f32,
        load_radius: i32,
        retention_radius: f32,
        chunks_per_tick: usize,
    ) -> Self {
        Self {
            chunk_world_size,
            retention_radius,
            chunks_per_tick,
            offsets: cube_offsets(load_radius),
        }
    }

    /// Creates a streamer from the terrain configuration.
    pub fn from_config(config: &TerrainConfig) -> Self {
        Self::new(
            config.chunk_world_size(),
            config.streaming.load_radius,
            config.streaming.retention_radius,
            config.streaming.chunks_per_tick,
        )
    }

    /// Number of chunks in the load cube.
    pub fn desired_count(&self) -> usize {
        self.offsets.len()
    }

    /// Chunk coordinates the streamer wants loaded around `center`, nearest first.
    pub fn desired_coordinates(&self, center: Point3<f32>) -> impl Iterator<Item = Point3<i32>> + '_ {
        let origin = chunk_coordinate_of(center, self.chunk_world_size);
        self.offsets.iter().map(move |offset| origin + *offset)
    }

    /// Runs one streaming step around `center` (a world-space position).
    pub fn tick(&self, world: &mut World, center: Point3<f32>) -> StreamerTick {
        let mut result = StreamerTick::default();

        for _ in 0..self.chunks_per_tick {
            match world.pop_pending() {
                Some(ticket) => result.started.push(ticket),
                None => break,
            }
        }

        let retention = self.retention_radius * self.chunk_world_size;
        let mut outside: Vec<Point3<i32>> = world
            .loaded_coordinates()
            .into_iter()
            .filter(|coordinate| {
                chunk_world_center(*coordinate, self.chunk_world_size).distance(center) > retention
            })
            .collect();
        outside.sort_by_key(|c| (c.z, c.y, c.x));
        for coordinate in outside {
            if world.unload(coordinate).is_some() {
                result.unloaded.push(coordinate);
            }
        }

        for coordinate in self.desired_coordinates(center) {
            if world.reserve(coordinate).is_some() {
                result.reserved += 1;
            }
        }

        result
    }
}

/// Integer offsets of the cube `[-radius, radius]^3`, sorted by distance.
fn cube_offsets(radius: i32) -> Vec<Vector3<i32>> {
    let radius = radius.max(0);
    let mut offsets = Vec::new();
    for z in -radius..=radius {
        for y in -radius..=radius {
            for x in -radius..=radius {
                offsets.push(Vector3::new(x, y, z));
            }
        }
    }
    offsets.sort_by_key(|o| (o.x * o.x + o.y * o.y + o.z * o.z, o.z, o.y, o.x));
    offsets
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine_state::rendering::Mesh;
    use crate::engine_state::voxels::chunk::{Chunk, ChunkState, DensityField, ModificationMap};

    fn finish_all(world: &mut World, tickets: &[ChunkTicket]) {
        for ticket in tickets {
            let field = DensityField::from_fn(1, |_, _, _| 0.0);
            let chunk = Chunk::new(*ticket, Arc::new(field), ModificationMap::new(), Mesh::new());
            world.complete_generation(chunk);
        }
    }

    #[test]
    fn cube_contains_expected_offsets() {
        assert_eq!(cube_offsets(0), vec![Vector3::new(0, 0, 0)]);
        assert_eq!(cube_offsets(1).len(), 27);
        assert_eq!(cube_offsets(5).len(), 1331);

        let offsets = cube_offsets(2);
        assert_eq!(offsets.len(), 125);
        assert_eq!(offsets[0], Vector3::new(0, 0, 0));
        assert!(offsets[1..7].iter().all(|o| o.x * o.x + o.y * o.y + o.z * o.z == 1));
        assert_eq!(offsets.last().map(|o| o.x.abs() + o.y.abs() + o.z.abs()), Some(6));
    }

    #[test]
    fn first_tick_reserves_and_later_ticks_start_up_to_the_limit() {
        let streamer = ChunkStreamer::new(16.0, 1, 3.0, 10);
        let mut world = World::new();
        let center = Point3::new(8.0, 8.0, 8.0);

        let first = streamer.tick(&mut world, center);
        assert!(first.started.is_empty());
        assert_eq!(first.reserved, 27);
        assert_eq!(world.state_of(Point3::new(0, 0, 0)), ChunkState::Reserved);

        let second = streamer.tick(&mut world, center);
        assert_eq!(second.started.len(), 10);
        assert_eq!(second.reserved, 0);
        // Nearest first.
        assert_eq!(second.started[0].coordinate, Point3::new(0, 0, 0));

        streamer.tick(&mut world, center);
        let fourth = streamer.tick(&mut world, center);
        assert_eq!(fourth.started.len(), 7);
        assert_eq!(world.pending_len(), 0);
        // Cube corners come last.
        assert_eq!(fourth.started[6].coordinate.x.abs(), 1);
        assert_eq!(fourth.started[6].coordinate.y.abs(), 1);
        assert_eq!(fourth.started[6].coordinate.z.abs(), 1);
    }

    #[test]
    fn moving_away_destroys_far_chunks_and_reserves_new_ones() {
        let streamer = ChunkStreamer::new(16.0, 1, 3.0, 27);
        let mut world = World::new();

        streamer.tick(&mut world, Point3::new(8.0, 8.0, 8.0));
        let started = streamer.tick(&mut world, Point3::new(8.0, 8.0, 8.0)).started;
        finish_all(&mut world, &started);
        assert_eq!(world.loaded_count(), 27);

        let far = Point3::new(8.0 + 16.0 * 10.0, 8.0, 8.0);
        let tick = streamer.tick(&mut world, far);

        assert_eq!(tick.unloaded.len(), 27);
        assert_eq!(world.loaded_count(), 0);
        assert_eq!(tick.reserved, 27);
        assert_eq!(world.state_of(Point3::new(10, 0, 0)), ChunkState::Reserved);
        for ticket in started {
            assert!(!world.is_current(ticket));
        }
    }

    #[test]
    fn chunks_inside_retention_survive() {
        let streamer = ChunkStreamer::new(16.0, 1, 3.0, 27);
        let mut world = World::new();
        streamer.tick(&mut world, Point3::new(8.0, 8.0, 8.0));
        let started = streamer.tick(&mut world, Point3::new(8.0, 8.0, 8.0)).started;
        finish_all(&mut world, &started);

        // One chunk over: every old chunk center is within three chunks.
        let tick = streamer.tick(&mut world, Point3::new(24.0, 8.0, 8.0));
        assert!(tick.unloaded.is_empty());
        assert_eq!(world.loaded_count(), 27);
        assert_eq!(tick.reserved, 9);
    }

    #[test]
    fn desired_set_tracks_negative_positions() {
        let streamer = ChunkStreamer::new(32.0, 0, 1.0, 1);
        let desired: Vec<_> = streamer.desired_coordinates(Point3::new(-1.0, 5.0, -33.0)).collect();
        assert_eq!(desired, vec![Point3::new(-1, 0, -2)]);
    }
}
