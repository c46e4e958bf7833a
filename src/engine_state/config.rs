//! # Terrain Configuration
//!
//! All tunables of the terrain engine live in `TerrainConfig`. The defaults match the
//! values the terrain was originally tuned with; a JSON file can override any subset
//! of them because every struct is `#[serde(default)]`.
//!
//! ```json
//! {
//!     "chunk_resolution": 24,
//!     "streaming": { "load_radius": 3, "retention_radius": 7 },
//!     "editing": { "strength_per_second": 2.0 }
//! }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::engine_state::voxels::raycast::MAX_RAY_STEPS;

/// Parameters of the fractal Perlin noise used for the base density field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Permutation seed
    pub seed: u32,
    /// Base frequency, in cycles per voxel
    pub frequency: f64,
    /// Number of fBm octaves
    pub octaves: usize,
    /// Frequency multiplier between octaves
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves
    pub persistence: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            frequency: 0.03,
            octaves: 3,
            lacunarity: 2.0,
            persistence: 0.5,
        }
    }
}

/// Controls which chunks exist around the streaming center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Half edge, in chunks, of the cube of chunks kept loaded around the center
    pub load_radius: i32,
    /// Distance, in chunks, beyond which a loaded chunk is destroyed
    pub retention_radius: f32,
    /// How many pending chunks start generating per tick
    pub chunks_per_tick: usize,
}

impl StreamingConfig {
    /// Smallest retention radius that keeps every chunk of the load cube.
    ///
    /// The corner chunk of the cube has its center up to `sqrt(3) * (r + 0.5)`
    /// chunks from a streaming center anywhere inside the center chunk.
    pub fn min_retention_radius(&self) -> f32 {
        3.0_f32.sqrt() * (self.load_radius as f32 + 0.5)
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            load_radius: 5,
            retention_radius: 10.0,
            chunks_per_tick: 4,
        }
    }
}

/// Polygonization and mesh assembly settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshingConfig {
    /// Number of parallel Z sections per chunk; `None` picks one from the hardware
    pub section_count: Option<usize>,
    /// Quantization step, in world units, used to weld duplicate vertices
    pub weld_precision: f32,
    /// Placeholder per-triangle color
    pub surface_color: [u8; 4],
    /// Material name handed to the renderer
    pub material: String,
}

impl Default for MeshingConfig {
    fn default() -> Self {
        Self {
            section_count: None,
            weld_precision: 0.001,
            surface_color: [200, 200, 200, 255],
            material: "terrain".to_string(),
        }
    }
}

/// Sculpting brush and throttling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditingConfig {
    /// Brush radius in voxels
    pub radius: f32,
    /// Density change per second at the brush center; negative values dig
    pub strength_per_second: f32,
    /// Seconds of accumulated frame time between two throttled edits
    pub interval: f32,
    /// Maximum ray length, in world units, for sculpting hit tests
    pub max_range: f32,
}

impl Default for EditingConfig {
    fn default() -> Self {
        Self {
            radius: 4.0,
            strength_per_second: -1.0,
            interval: 0.2,
            max_range: 5000.0,
        }
    }
}

/// Top level configuration of the terrain engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Voxels per chunk axis (`N`); a chunk stores `(N+1)^3` samples
    pub chunk_resolution: usize,
    /// World units per voxel
    pub voxel_scale: f32,
    /// Density threshold of the extracted isosurface
    pub surface_level: f32,
    /// Worker thread count; `None` uses the available parallelism
    pub worker_count: Option<usize>,
    /// Directory holding per-chunk modification files
    pub save_directory: PathBuf,
    /// Base density noise
    pub noise: NoiseConfig,
    /// Chunk streaming
    pub streaming: StreamingConfig,
    /// Polygonization
    pub meshing: MeshingConfig,
    /// Sculpting
    pub editing: EditingConfig,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            chunk_resolution: 32,
            voxel_scale: 1.0,
            surface_level: 0.0,
            worker_count: None,
            save_directory: PathBuf::from("saved/voxel_chunks"),
            noise: NoiseConfig::default(),
            streaming: StreamingConfig::default(),
            meshing: MeshingConfig::default(),
            editing: EditingConfig::default(),
        }
    }
}

impl TerrainConfig {
    /// Reads a configuration from a JSON file. Missing fields fall back to defaults.
    ///
    /// # Errors
    /// Fails if the file cannot be read, is not valid JSON, or does not validate.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading terrain config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parses a configuration from JSON text and validates it.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: TerrainConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the engine relies on.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_resolution == 0 {
            bail!("chunk_resolution must be at least 1");
        }
        if !(self.voxel_scale > 0.0) {
            bail!("voxel_scale must be positive, got {}", self.voxel_scale);
        }
        if !(self.meshing.weld_precision > 0.0) {
            bail!(
                "meshing.weld_precision must be positive, got {}",
                self.meshing.weld_precision
            );
        }
        if self.streaming.chunks_per_tick == 0 {
            bail!("streaming.chunks_per_tick must be at least 1");
        }
        if self.streaming.load_radius < 0 {
            bail!("streaming.load_radius must not be negative");
        }
        let reach = self.streaming.min_retention_radius();
        if !(self.streaming.retention_radius >= reach) {
            bail!(
                "streaming.retention_radius ({}) must be at least sqrt(3) * (load_radius + 0.5) ({:.3})",
                self.streaming.retention_radius,
                reach
            );
        }
        if self.editing.radius <= 0.0 {
            bail!("editing.radius must be positive");
        }
        if self.editing.interval < 0.0 {
            bail!("editing.interval must not be negative");
        }
        let ray_steps = self.editing.max_range / (self.voxel_scale * 0.5);
        if !(self.editing.max_range > 0.0) || !(ray_steps <= MAX_RAY_STEPS as f32) {
            bail!(
                "editing.max_range must be positive and at most {} half-voxel steps, got {}",
                MAX_RAY_STEPS,
                self.editing.max_range
            );
        }
        if self.worker_count == Some(0) {
            bail!("worker_count must be at least 1 when set");
        }
        Ok(())
    }

    /// Edge length of one chunk in world units.
    pub fn chunk_world_size(&self) -> f32 {
        self.chunk_resolution as f32 * self.voxel_scale
    }

    /// Number of polygonization sections per chunk.
    pub fn section_count(&self) -> usize {
        self.meshing
            .section_count
            .unwrap_or_else(default_section_count)
            .clamp(1, self.chunk_resolution.max(1))
    }

    /// Number of worker threads the task manager spawns.
    pub fn worker_count(&self) -> usize {
        self.worker_count.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// Half the available hardware threads, at least one.
pub fn default_section_count() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cores / 2).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = TerrainConfig::default();
        config.validate().unwrap();
        assert_eq!(config.chunk_world_size(), 32.0);
        assert!(config.section_count() >= 1);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = TerrainConfig::from_json_str(
            r#"{ "chunk_resolution": 16, "streaming": { "load_radius": 2, "retention_radius": 4.5 } }"#,
        )
        .unwrap();

        assert_eq!(config.chunk_resolution, 16);
        assert_eq!(config.streaming.load_radius, 2);
        assert_eq!(config.streaming.chunks_per_tick, 4);
        assert_eq!(config.editing, EditingConfig::default());
        assert_eq!(config.noise.frequency, 0.03);
    }

    #[test]
    fn retention_must_cover_the_load_cube() {
        let mut config = TerrainConfig::default();
        config.streaming.retention_radius = config.streaming.load_radius as f32 + 1.0;
        assert!(config.validate().is_err());

        config.streaming.load_radius = 1;
        config.streaming.retention_radius = 2.5;
        assert!(config.validate().is_err());
        config.streaming.retention_radius = 2.6;
        config.validate().unwrap();
    }

    #[test]
    fn ray_range_must_be_finite_and_bounded() {
        let mut config = TerrainConfig::default();
        for max_range in [0.0, -1.0, f32::NAN, f32::INFINITY, 1.0e7] {
            config.editing.max_range = max_range;
            assert!(config.validate().is_err(), "accepted {}", max_range);
        }
        config.editing.max_range = 100_000.0;
        config.validate().unwrap();
    }

    #[test]
    fn rejects_zero_resolution() {
        assert!(TerrainConfig::from_json_str(r#"{ "chunk_resolution": 0 }"#).is_err());
    }

    #[test]
    fn section_count_is_clamped_to_resolution() {
        let mut config = TerrainConfig::default();
        config.chunk_resolution = 4;
        config.meshing.section_count = Some(64);
        assert_eq!(config.section_count(), 4);

        config.meshing.section_count = Some(0);
        assert_eq!(config.section_count(), 1);
    }

    #[test]
    fn reads_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terrain.json");
        std::fs::write(&path, r#"{ "surface_level": 0.25, "meshing": { "material": "rock" } }"#)
            .unwrap();

        let config = TerrainConfig::from_json_file(&path).unwrap();
        assert_eq!(config.surface_level, 0.25);
        assert_eq!(config.meshing.material, "rock");
        assert!(TerrainConfig::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
