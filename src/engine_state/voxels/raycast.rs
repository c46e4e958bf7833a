//! Ray hit tests against the loaded terrain.
//!
//! The ray is marched in half-voxel steps through the effective density of whichever
//! loaded chunk contains the current sample. The first sample above the surface level
//! is refined by bisection against the previous one. Chunks that are not loaded
//! count as empty space. A ray takes at most `MAX_RAY_STEPS` samples before the
//! refinement.

use cgmath::{InnerSpace, Point3, Vector3};

use super::chunk::chunk_coordinate_of;
use super::editor::world_to_local;
use super::world::World;
use crate::engine_state::config::TerrainConfig;

/// Bisection steps used to refine a hit.
const REFINE_STEPS: usize = 10;

/// Upper bound on the marching samples of one ray. Rays longer than this many
/// half-voxel steps are cut short.
pub const MAX_RAY_STEPS: u64 = 1 << 20;

/// A ray in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Start point
    pub origin: Point3<f32>,
    /// Direction; does not need to be normalized
    pub direction: Vector3<f32>,
    /// Maximum distance to test, in world units
    pub max_range: f32,
}

/// Where a ray met the terrain surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// World-space hit point
    pub position: Point3<f32>,
    /// Chunk containing the hit point
    pub chunk: Point3<i32>,
    /// Distance from the ray origin
    pub distance: f32,
}

/// Effective density at a world position, if its chunk is loaded.
pub fn density_at(world: &World, position: Point3<f32>, config: &TerrainConfig) -> Option<f32> {
    let coordinate = chunk_coordinate_of(position, config.chunk_world_size());
    let chunk = world.chunk(coordinate)?;
    let local = world_to_local(position, coordinate, config.chunk_resolution, config.voxel_scale);
    Some(chunk.view().density_at(local))
}

/// Casts a ray against the terrain.
///
/// # Returns
/// The first point along the ray where the density exceeds the surface level, or
/// `None` if no loaded terrain is hit within `max_range`.
pub fn raycast(world: &World, ray: Ray, config: &TerrainConfig) -> Option<RayHit> {
    let length = ray.direction.magnitude();
    if !(length > f32::EPSILON) || !(ray.max_range >= 0.0) {
        return None;
    }
    let direction = ray.direction / length;
    let solid = |t: f32| {
        density_at(world, ray.origin + direction * t, config)
            .is_some_and(|density| density > config.surface_level)
    };

    let step = config.voxel_scale * 0.5;
    let steps = ((ray.max_range / step).ceil() as u64).min(MAX_RAY_STEPS);
    let mut crossing = None;
    let mut previous = 0.0;
    for i in 0..=steps {
        let t = (i as f32 * step).min(ray.max_range);
        if solid(t) {
            crossing = Some((previous, t));
            break;
        }
        previous = t;
    }

    let (mut outside, mut inside) = crossing?;
    if inside > 0.0 {
        for _ in 0..REFINE_STEPS {
            let middle = (outside + inside) * 0.5;
            if solid(middle) {
                inside = middle;
            } else {
                outside = middle;
            }
        }
    }

    let position = ray.origin + direction * inside;
    Some(RayHit {
        position,
        chunk: chunk_coordinate_of(position, config.chunk_world_size()),
        distance: inside,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine_state::rendering::Mesh;
    use crate::engine_state::voxels::chunk::{Chunk, DensityField, ModificationMap};

    /// A loaded 8^3 chunk at the origin, solid below z = 3.5.
    fn world_with_ground(config: &TerrainConfig) -> World {
        let mut world = World::new();
        let ticket = world.reserve(Point3::new(0, 0, 0)).unwrap();
        world.pop_pending();
        let field = DensityField::from_fn(config.chunk_resolution, |_, _, z| 3.5 - z as f32);
        world.complete_generation(Chunk::new(
            ticket,
            Arc::new(field),
            ModificationMap::new(),
            Mesh::new(),
        ));
        world
    }

    fn config() -> TerrainConfig {
        TerrainConfig {
            chunk_resolution: 8,
            ..TerrainConfig::default()
        }
    }

    #[test]
    fn downward_ray_hits_the_ground() {
        let config = config();
        let world = world_with_ground(&config);
        let ray = Ray {
            origin: Point3::new(4.0, 4.0, 7.5),
            direction: Vector3::new(0.0, 0.0, -2.0),
            max_range: 100.0,
        };

        let hit = raycast(&world, ray, &config).unwrap();
        assert!((hit.position.z - 3.5).abs() < 0.01, "hit at {:?}", hit.position);
        assert!((hit.distance - 4.0).abs() < 0.01);
        assert_eq!(hit.chunk, Point3::new(0, 0, 0));
    }

    #[test]
    fn rays_that_stay_in_the_air_miss() {
        let config = config();
        let world = world_with_ground(&config);
        let upward = Ray {
            origin: Point3::new(4.0, 4.0, 6.0),
            direction: Vector3::new(0.0, 0.0, 1.0),
            max_range: 50.0,
        };
        let short = Ray {
            origin: Point3::new(4.0, 4.0, 7.5),
            direction: Vector3::new(0.0, 0.0, -1.0),
            max_range: 2.0,
        };

        assert!(raycast(&world, upward, &config).is_none());
        assert!(raycast(&world, short, &config).is_none());
    }

    #[test]
    fn very_long_rays_terminate() {
        let config = config();
        let world = world_with_ground(&config);
        let ray = Ray {
            origin: Point3::new(4.0, 4.0, 7.5),
            direction: Vector3::new(1.0, 0.0, 0.0),
            max_range: 1.0e7,
        };
        assert!(raycast(&world, ray, &config).is_none());

        let endless = Ray {
            max_range: f32::INFINITY,
            ..ray
        };
        assert!(raycast(&world, endless, &config).is_none());

        let down = Ray {
            direction: Vector3::new(0.0, 0.0, -1.0),
            max_range: 1.0e9,
            ..ray
        };
        let hit = raycast(&world, down, &config).unwrap();
        assert!((hit.position.z - 3.5).abs() < 0.01, "hit at {:?}", hit.position);
    }

    #[test]
    fn unloaded_space_is_empty() {
        let config = config();
        let world = World::new();
        let ray = Ray {
            origin: Point3::new(4.0, 4.0, 7.5),
            direction: Vector3::new(0.0, 0.0, -1.0),
            max_range: 100.0,
        };
        assert!(raycast(&world, ray, &config).is_none());
        assert!(density_at(&world, Point3::new(1.0, 1.0, 1.0), &config).is_none());
    }
}
