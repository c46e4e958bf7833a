//! # Density Field
//!
//! A dense `(N+1)^3` grid of base density samples for one chunk, plus the
//! `DensityView` that layers a chunk's `ModificationMap` on top of it.
//!
//! Sample `(x, y, z)` lives at flat offset `z * (N+1)^2 + y * (N+1) + x`. The base
//! field is written once, during generation, and is shared read-only afterwards.

use cgmath::{Point3, Vector3};

use super::modification::ModificationMap;
use crate::engine_state::voxels::sampler::DensitySampler;

/// Base density samples of one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityField {
    resolution: usize,
    samples: Vec<f32>,
}

impl DensityField {
    /// Samples `sampler` at every grid point of a chunk whose voxel-space origin is
    /// `origin`.
    ///
    /// # Arguments
    /// * `origin` - Voxel-space position of sample `(0, 0, 0)`
    /// * `resolution` - Voxels per axis (`N`)
    /// * `sampler` - The base density function
    pub fn generate(origin: Point3<i32>, resolution: usize, sampler: &dyn DensitySampler) -> Self {
        Self::from_fn(resolution, |x, y, z| {
            sampler.sample(
                (x as i32 + origin.x) as f32,
                (y as i32 + origin.y) as f32,
                (z as i32 + origin.z) as f32,
            )
        })
    }

    /// Builds a field by evaluating `f` at every local grid point.
    pub fn from_fn(resolution: usize, mut f: impl FnMut(usize, usize, usize) -> f32) -> Self {
        let dimension = resolution + 1;
        let mut samples = Vec::with_capacity(dimension * dimension * dimension);
        for z in 0..dimension {
            for y in 0..dimension {
                for x in 0..dimension {
                    samples.push(f(x, y, z));
                }
            }
        }
        Self {
            resolution,
            samples,
        }
    }

    /// Voxels per axis (`N`).
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Samples per axis (`N + 1`).
    pub fn dimension(&self) -> usize {
        self.resolution + 1
    }

    /// Flat offset of sample `(x, y, z)`.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        let dimension = self.dimension();
        z * dimension * dimension + y * dimension + x
    }

    /// Sample at an in-range grid point.
    ///
    /// # Panics
    /// Panics if any coordinate exceeds `N`.
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        self.samples[self.index(x, y, z)]
    }

    /// Sample at an arbitrary grid point, with each coordinate clamped into `[0, N]`.
    #[inline]
    pub fn get_clamped(&self, x: i32, y: i32, z: i32) -> f32 {
        let max = self.resolution as i32;
        self.get(
            x.clamp(0, max) as usize,
            y.clamp(0, max) as usize,
            z.clamp(0, max) as usize,
        )
    }

    /// All samples in storage order.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

/// Effective density of a chunk: base samples plus accumulated edits.
#[derive(Debug, Clone, Copy)]
pub struct DensityView<'a> {
    field: &'a DensityField,
    modifications: &'a ModificationMap,
}

impl<'a> DensityView<'a> {
    /// Pairs a base field with its edits.
    pub fn new(field: &'a DensityField, modifications: &'a ModificationMap) -> Self {
        Self {
            field,
            modifications,
        }
    }

    /// The underlying base field.
    pub fn field(&self) -> &'a DensityField {
        self.field
    }

    /// Base sample (clamped to the grid) plus the delta stored for that exact voxel.
    #[inline]
    pub fn density(&self, x: i32, y: i32, z: i32) -> f32 {
        self.field.get_clamped(x, y, z) + self.modifications.delta_at(Point3::new(x, y, z))
    }

    /// Trilinearly interpolated effective density at a continuous local position.
    pub fn density_at(&self, local: Vector3<f32>) -> f32 {
        let base = Point3::new(
            local.x.floor() as i32,
            local.y.floor() as i32,
            local.z.floor() as i32,
        );
        let tx = local.x - base.x as f32;
        let ty = local.y - base.y as f32;
        let tz = local.z - base.z as f32;

        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
        let corner = |dx: i32, dy: i32, dz: i32| self.density(base.x + dx, base.y + dy, base.z + dz);

        let x00 = lerp(corner(0, 0, 0), corner(1, 0, 0), tx);
        let x10 = lerp(corner(0, 1, 0), corner(1, 1, 0), tx);
        let x01 = lerp(corner(0, 0, 1), corner(1, 0, 1), tx);
        let x11 = lerp(corner(0, 1, 1), corner(1, 1, 1), tx);
        lerp(lerp(x00, x10, ty), lerp(x01, x11, ty), tz)
    }
}
