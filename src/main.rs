//! # Voxel Terrain Demo Entry Point
//!
//! Runs the library's headless demo: streams terrain around a moving point, sculpts
//! it and logs the resulting mesh traffic.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- [terrain.json]
//! ```

fn main() -> anyhow::Result<()> {
    voxel_terrain::run()
}
