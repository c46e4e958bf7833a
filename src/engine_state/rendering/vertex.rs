//! Vertex data structures for terrain rendering.
//!
//! The mesh assembler stores vertex attributes as separate arrays. Renderers that
//! want a single interleaved buffer can request `Vertex`s instead, which are plain
//! old data and can be uploaded with `bytemuck::cast_slice`.

/// An interleaved terrain vertex.
///
/// # Memory Layout
/// - Position: [f32; 3] (12 bytes)
/// - Normal: [f32; 3] (12 bytes)
/// - Texture Coordinates: [f32; 2] (8 bytes)
/// - Color: [u8; 4] (4 bytes)
///
/// Total size: 36 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Position relative to the chunk's world origin
    pub position: [f32; 3],
    /// Unit surface normal
    pub normal: [f32; 3],
    /// Planar texture coordinates
    pub tex_coords: [f32; 2],
    /// RGBA color
    pub color: [u8; 4],
}

impl Vertex {
    /// Creates a new vertex.
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coords: [f32; 2], color: [u8; 4]) -> Self {
        Vertex {
            position,
            normal,
            tex_coords,
            color,
        }
    }
}
