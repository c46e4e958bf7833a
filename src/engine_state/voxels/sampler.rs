//! # Density Samplers
//!
//! The base density of every chunk comes from a pure function `f(x, y, z) -> f32`
//! evaluated in voxel space. The engine only depends on the `DensitySampler` trait;
//! `FbmNoiseSampler` is the fractal Perlin implementation the terrain ships with.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use crate::engine_state::config::NoiseConfig;

/// A pure scalar field sampled in voxel-space coordinates.
///
/// Implementations must be deterministic: the same coordinates always return the
/// same value, since chunk borders are sampled independently by neighboring chunks.
pub trait DensitySampler: Send + Sync {
    /// Returns the density at the given voxel-space position.
    fn sample(&self, x: f32, y: f32, z: f32) -> f32;
}

impl<F> DensitySampler for F
where
    F: Fn(f32, f32, f32) -> f32 + Send + Sync,
{
    fn sample(&self, x: f32, y: f32, z: f32) -> f32 {
        self(x, y, z)
    }
}

/// Fractal Brownian motion over Perlin noise.
pub struct FbmNoiseSampler {
    fbm: Fbm<Perlin>,
    config: NoiseConfig,
}

impl FbmNoiseSampler {
    /// Builds the sampler from its configuration.
    pub fn new(config: &NoiseConfig) -> Self {
        let fbm = Fbm::<Perlin>::new(config.seed)
            .set_frequency(config.frequency)
            .set_octaves(config.octaves.max(1))
            .set_lacunarity(config.lacunarity)
            .set_persistence(config.persistence);
        Self {
            fbm,
            config: config.clone(),
        }
    }
}

impl DensitySampler for FbmNoiseSampler {
    fn sample(&self, x: f32, y: f32, z: f32) -> f32 {
        self.fbm.get([x as f64, y as f64, z as f64]) as f32
    }
}

impl std::fmt::Debug for FbmNoiseSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FbmNoiseSampler")
            .field("config", &self.config)
            .finish()
    }
}
