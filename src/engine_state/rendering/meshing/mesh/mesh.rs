//! Mesh data structures produced by the polygonizer and the assembler.
//!
//! Both hold vertex attributes as parallel arrays, matching what a procedural mesh
//! renderer consumes: positions, normals, colors (and texture coordinates for the
//! final mesh), plus a triangle index list.

use crate::engine_state::rendering::Vertex;

/// Triangle soup produced by polygonizing one slab of a chunk.
///
/// Every triangle owns three fresh vertices, and indices are local to the section
/// (the first vertex is index `0`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshSection {
    /// Vertex positions
    pub positions: Vec<[f32; 3]>,
    /// Per-vertex normals (the normal of the owning triangle)
    pub normals: Vec<[f32; 3]>,
    /// Per-vertex colors
    pub colors: Vec<[u8; 4]>,
    /// Triangle indices, three per triangle
    pub indices: Vec<u32>,
}

impl MeshSection {
    /// Creates an empty section.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Whether the section produced no geometry.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Appends a triangle with its own three vertices.
    ///
    /// # Arguments
    /// * `corners` - Vertex positions in the order they are stored
    /// * `normal` - Face normal shared by all three vertices
    /// * `color` - Face color shared by all three vertices
    /// * `winding` - Order in which the stored vertices are referenced by the indices
    pub fn push_triangle(
        &mut self,
        corners: [[f32; 3]; 3],
        normal: [f32; 3],
        color: [u8; 4],
        winding: [u32; 3],
    ) {
        let base = self.positions.len() as u32;
        self.positions.extend_from_slice(&corners);
        self.normals.extend_from_slice(&[normal; 3]);
        self.colors.extend_from_slice(&[color; 3]);
        self.indices
            .extend(winding.iter().map(|corner| base + corner));
    }
}

/// The final, welded mesh of one chunk.
///
/// Invariants: all attribute arrays have the same length, every index is smaller
/// than that length, and no triangle references the same vertex twice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Vertex positions, relative to the chunk's world origin
    pub positions: Vec<[f32; 3]>,
    /// Averaged unit normals
    pub normals: Vec<[f32; 3]>,
    /// Planar texture coordinates
    pub uvs: Vec<[f32; 2]>,
    /// Vertex colors
    pub colors: Vec<[u8; 4]>,
    /// Triangle indices, three per triangle
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Creates an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Whether the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Interleaves the attribute arrays into renderer-ready vertices.
    pub fn vertices(&self) -> Vec<Vertex> {
        self.positions
            .iter()
            .zip(&self.normals)
            .zip(&self.uvs)
            .zip(&self.colors)
            .map(|(((position, normal), uv), color)| Vertex::new(*position, *normal, *uv, *color))
            .collect()
    }

    /// Iterates over the triangles as index triplets.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|triangle| [triangle[0], triangle[1], triangle[2]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_triangle_offsets_indices_by_winding() {
        let mut section = MeshSection::new();
        let corners = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        section.push_triangle(corners, [0.0, 0.0, 1.0], [1, 2, 3, 4], [0, 1, 2]);
        section.push_triangle(corners, [0.0, 0.0, 1.0], [1, 2, 3, 4], [2, 1, 0]);

        assert_eq!(section.vertex_count(), 6);
        assert_eq!(section.triangle_count(), 2);
        assert_eq!(section.indices, vec![0, 1, 2, 5, 4, 3]);
        assert_eq!(section.colors.len(), 6);
    }

    #[test]
    fn vertices_interleave_attributes() {
        let mesh = Mesh {
            positions: vec![[1.0, 2.0, 3.0]],
            normals: vec![[0.0, 0.0, 1.0]],
            uvs: vec![[1.0, 2.0]],
            colors: vec![[9, 9, 9, 9]],
            indices: Vec::new(),
        };

        let vertices = mesh.vertices();
        assert_eq!(vertices.len(), 1);
        assert_eq!(vertices[0].position, [1.0, 2.0, 3.0]);
        assert_eq!(vertices[0].tex_coords, [1.0, 2.0]);
    }
}
