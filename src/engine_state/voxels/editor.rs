//! # Terrain Editor
//!
//! Sculpting adds signed density deltas inside a sphere with a linear falloff:
//!
//! ```text
//! delta(v) = (1 - |v - p| / radius) * strength_per_second * dt    for |v - p| < radius
//! ```
//!
//! Deltas are accumulated into the chunk's `ModificationMap`, never written over the
//! base field, so strokes commute and can be replayed from storage in any order.
//!
//! A brush can overlap several chunks. Neighbouring chunks share their border layer
//! of voxels, so every chunk whose grid the brush reaches receives the stroke in its
//! own local coordinates, which keeps the surfaces on both sides of a border equal.

use cgmath::{MetricSpace, Point3, Vector3};

use super::chunk::{chunk_world_origin, ModificationMap};
use crate::engine_state::config::EditingConfig;

/// Spherical sculpting brush.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush {
    /// Density change per second at the brush center; negative values dig
    pub strength_per_second: f32,
    /// Radius in voxels
    pub radius: f32,
}

impl Brush {
    /// The brush described by the editing configuration.
    pub fn from_config(config: &EditingConfig) -> Self {
        Self {
            strength_per_second: config.strength_per_second,
            radius: config.radius,
        }
    }
}

/// Applies one brush stroke to a modification map.
///
/// # Arguments
/// * `modifications` - The chunk's edit deltas
/// * `local` - Brush center in chunk-local voxel space
/// * `brush` - Strength and radius
/// * `dt` - Seconds the stroke represents
///
/// # Returns
/// The number of voxels that received a delta.
pub fn apply_brush(
    modifications: &mut ModificationMap,
    local: Vector3<f32>,
    brush: &Brush,
    dt: f32,
) -> usize {
    let amount = brush.strength_per_second * dt;
    if brush.radius <= 0.0 || amount == 0.0 {
        return 0;
    }

    let center = Point3::new(local.x, local.y, local.z);
    let min = Point3::new(
        (local.x - brush.radius).floor() as i32,
        (local.y - brush.radius).floor() as i32,
        (local.z - brush.radius).floor() as i32,
    );
    let max = Point3::new(
        (local.x + brush.radius).ceil() as i32,
        (local.y + brush.radius).ceil() as i32,
        (local.z + brush.radius).ceil() as i32,
    );

    let mut touched = 0;
    for z in min.z..=max.z {
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                let voxel = Point3::new(x as f32, y as f32, z as f32);
                let distance = voxel.distance(center);
                if distance >= brush.radius {
                    continue;
                }
                let falloff = 1.0 - distance / brush.radius;
                modifications.accumulate(Point3::new(x, y, z), falloff * amount);
                touched += 1;
            }
        }
    }
    touched
}

/// Converts a world-space position into a chunk's local voxel space.
pub fn world_to_local(
    position: Point3<f32>,
    coordinate: Point3<i32>,
    resolution: usize,
    voxel_scale: f32,
) -> Vector3<f32> {
    let origin = chunk_world_origin(coordinate, resolution as f32 * voxel_scale);
    (position - origin) / voxel_scale
}

/// Every chunk whose sample grid a brush at `position` can reach.
///
/// # Arguments
/// * `position` - Brush center in world space
/// * `radius` - Brush radius in voxels
/// * `resolution` - Voxels per chunk axis
/// * `voxel_scale` - World units per voxel
pub fn chunks_touched_by(
    position: Point3<f32>,
    radius: f32,
    resolution: usize,
    voxel_scale: f32,
) -> Vec<Point3<i32>> {
    let n = resolution as i32;
    let center = position / voxel_scale;

    // Chunk c owns voxels c*n ..= c*n + n along each axis.
    let axis = |value: f32| {
        let low = (value - radius).ceil() as i32;
        let high = (value + radius).floor() as i32;
        let first = -((n - low).div_euclid(n));
        let last = high.div_euclid(n);
        first..=last
    };

    let (xs, ys, zs) = (axis(center.x), axis(center.y), axis(center.z));
    let mut chunks = Vec::new();
    for z in zs {
        for y in ys.clone() {
            for x in xs.clone() {
                chunks.push(Point3::new(x, y, z));
            }
        }
    }
    chunks
}

/// Rate limiter for continuous sculpting.
///
/// Frame times are accumulated; once at least `interval` seconds have built up, one
/// edit fires with the whole accumulated window as its `dt` and the window restarts.
#[derive(Debug, Clone, PartialEq)]
pub struct EditThrottle {
    interval: f32,
    accumulated: f32,
}

impl EditThrottle {
    /// Creates a throttle that fires at most once per `interval` seconds.
    pub fn new(interval: f32) -> Self {
        Self {
            interval,
            accumulated: 0.0,
        }
    }

    /// Adds a frame's delta time.
    ///
    /// # Returns
    /// The elapsed window in seconds when an edit should fire, otherwise `None`.
    pub fn advance(&mut self, dt: f32) -> Option<f32> {
        self.accumulated += dt.max(0.0);
        if self.accumulated > 0.0 && self.accumulated >= self.interval {
            let window = self.accumulated;
            self.accumulated = 0.0;
            Some(window)
        } else {
            None
        }
    }

    /// Drops any partially accumulated window, e.g. when the sculpt input is released.
    pub fn reset(&mut self) {
        self.accumulated = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DIG: Brush = Brush {
        strength_per_second: -1.0,
        radius: 4.0,
    };

    #[test]
    fn falloff_is_linear_and_strictly_inside_radius() {
        let mut modifications = ModificationMap::new();
        let center = Vector3::new(10.0, 10.0, 10.0);
        let touched = apply_brush(&mut modifications, center, &DIG, 0.2);

        let expected = (6..=14)
            .flat_map(|z| (6..=14).flat_map(move |y| (6..=14).map(move |x| (x, y, z))))
            .filter(|&(x, y, z): &(i32, i32, i32)| {
                let (dx, dy, dz) = (x - 10, y - 10, z - 10);
                dx * dx + dy * dy + dz * dz < 16
            })
            .count();
        assert_eq!(touched, expected);
        assert_eq!(modifications.len(), expected);

        assert_relative_eq!(modifications.delta_at(Point3::new(10, 10, 10)), -0.2);
        assert_relative_eq!(modifications.delta_at(Point3::new(12, 10, 10)), -0.1);
        assert_eq!(modifications.get(Point3::new(14, 10, 10)), None);
        assert_eq!(modifications.get(Point3::new(13, 13, 10)), None);

        for (voxel, delta) in modifications.iter() {
            let voxel = Point3::new(voxel.x as f32, voxel.y as f32, voxel.z as f32);
            assert!(voxel.distance(Point3::new(10.0, 10.0, 10.0)) < 4.0);
            assert!(delta < 0.0);
        }
    }

    #[test]
    fn falloff_magnitude_decreases_with_distance() {
        let mut modifications = ModificationMap::new();
        apply_brush(&mut modifications, Vector3::new(0.0, 0.0, 0.0), &DIG, 0.2);

        let along_axis: Vec<f32> = (0..4)
            .map(|x| modifications.delta_at(Point3::new(x, 0, 0)).abs())
            .collect();
        for pair in along_axis.windows(2) {
            assert!(pair[0] > pair[1]);
        }
    }

    #[test]
    fn repeated_strokes_accumulate() {
        let mut modifications = ModificationMap::new();
        let brush = Brush {
            strength_per_second: 2.0,
            radius: 2.0,
        };
        apply_brush(&mut modifications, Vector3::new(1.0, 1.0, 1.0), &brush, 0.25);
        apply_brush(&mut modifications, Vector3::new(1.0, 1.0, 1.0), &brush, 0.25);

        assert_relative_eq!(modifications.delta_at(Point3::new(1, 1, 1)), 1.0);
    }

    #[test]
    fn zero_strength_or_time_changes_nothing() {
        let mut modifications = ModificationMap::new();
        assert_eq!(apply_brush(&mut modifications, Vector3::new(0.0, 0.0, 0.0), &DIG, 0.0), 0);
        assert!(modifications.is_empty());
    }

    #[test]
    fn world_positions_map_into_chunk_space() {
        let local = world_to_local(Point3::new(70.0, -2.0, 16.0), Point3::new(1, -1, 0), 16, 2.0);
        assert_eq!(local, Vector3::new(19.0, 15.0, 8.0));
    }

    #[test]
    fn brushes_near_borders_touch_neighbours() {
        let inside = chunks_touched_by(Point3::new(4.0, 4.0, 4.0), 1.0, 8, 1.0);
        assert_eq!(inside, vec![Point3::new(0, 0, 0)]);

        // Voxel 0 is shared with chunk -1, whose grid ends at voxel 8 of its own.
        let corner = chunks_touched_by(Point3::new(0.5, 0.5, 0.5), 1.0, 8, 1.0);
        assert_eq!(corner.len(), 8);
        assert!(corner.contains(&Point3::new(-1, -1, -1)));
        assert!(corner.contains(&Point3::new(0, 0, 0)));
    }

    #[test]
    fn throttle_fires_once_per_window() {
        let mut throttle = EditThrottle::new(0.2);
        assert_eq!(throttle.advance(0.125), None);
        assert_eq!(throttle.advance(0.125), Some(0.25));
        assert_eq!(throttle.advance(0.125), None);

        throttle.reset();
        assert_eq!(throttle.advance(0.125), None);

        let mut every_frame = EditThrottle::new(0.0);
        assert_eq!(every_frame.advance(0.5), Some(0.5));
        assert_eq!(every_frame.advance(0.0), None);
    }
}
