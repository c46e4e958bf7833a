//! # Mesh Assembly
//!
//! Turns the per-section triangle soups of one chunk into a single indexed mesh.
//!
//! ## Steps
//!
//! 1. **Merge**: sections are concatenated in section order (never completion
//!    order) and each section's indices are shifted by the number of vertices
//!    appended before it.
//! 2. **Weld**: every vertex position is quantized to a grid of `precision` world
//!    units. The first vertex seen for a grid key becomes a final vertex; later
//!    ones reuse its index and add their normal to it. Accumulated normals are
//!    normalized at the end.
//! 3. **Cull**: a triangle whose three welded indices are not pairwise distinct is
//!    dropped.
//!
//! Welding is a single hash-map pass, linear in the number of vertices.

use std::collections::HashMap;

use cgmath::{InnerSpace, Vector3};

use super::mesh::{Mesh, MeshSection};

/// Normal used when accumulated normals cancel out.
pub const FALLBACK_NORMAL: [f32; 3] = [0.0, 0.0, 1.0];

/// Concatenates sections in order, re-basing each section's indices.
pub fn merge_sections(sections: &[MeshSection]) -> MeshSection {
    let vertex_total = sections.iter().map(MeshSection::vertex_count).sum();
    let index_total = sections.iter().map(|section| section.indices.len()).sum();

    let mut merged = MeshSection {
        positions: Vec::with_capacity(vertex_total),
        normals: Vec::with_capacity(vertex_total),
        colors: Vec::with_capacity(vertex_total),
        indices: Vec::with_capacity(index_total),
    };

    for section in sections {
        let offset = merged.positions.len() as u32;
        merged.positions.extend_from_slice(&section.positions);
        merged.normals.extend_from_slice(&section.normals);
        merged.colors.extend_from_slice(&section.colors);
        merged
            .indices
            .extend(section.indices.iter().map(|index| index + offset));
    }

    merged
}

/// Welds duplicate vertices of a merged soup and drops degenerate triangles.
///
/// # Arguments
/// * `soup` - Merged triangle soup, indices already global
/// * `precision` - Quantization step, in the same units as the positions
///
/// # Returns
/// An indexed mesh with averaged unit normals and planar texture coordinates.
pub fn weld(soup: &MeshSection, precision: f32) -> Mesh {
    let mut lookup: HashMap<[i64; 3], u32> = HashMap::with_capacity(soup.vertex_count() / 2);
    let mut mesh = Mesh::new();
    let mut accumulated: Vec<Vector3<f32>> = Vec::new();

    let quantize = |position: [f32; 3]| {
        [
            (position[0] / precision).round() as i64,
            (position[1] / precision).round() as i64,
            (position[2] / precision).round() as i64,
        ]
    };

    let mut weld_vertex = |source: u32, mesh: &mut Mesh, accumulated: &mut Vec<Vector3<f32>>| {
        let source = source as usize;
        let position = soup.positions[source];
        let normal = Vector3::from(soup.normals[source]);
        let key = quantize(position);

        if let Some(&existing) = lookup.get(&key) {
            accumulated[existing as usize] += normal;
            return existing;
        }

        let index = mesh.positions.len() as u32;
        lookup.insert(key, index);
        mesh.positions.push(position);
        mesh.uvs.push([position[0], position[1]]);
        mesh.colors.push(soup.colors[source]);
        accumulated.push(normal);
        index
    };

    for triangle in soup.indices.chunks_exact(3) {
        let a = weld_vertex(triangle[0], &mut mesh, &mut accumulated);
        let b = weld_vertex(triangle[1], &mut mesh, &mut accumulated);
        let c = weld_vertex(triangle[2], &mut mesh, &mut accumulated);

        if a != b && b != c && c != a {
            mesh.indices.extend_from_slice(&[a, b, c]);
        }
    }

    mesh.normals = accumulated
        .into_iter()
        .map(|normal| {
            if normal.magnitude2() > f32::EPSILON {
                normal.normalize().into()
            } else {
                FALLBACK_NORMAL
            }
        })
        .collect();

    mesh
}

/// Merges and welds the sections of one chunk.
pub fn assemble(sections: &[MeshSection], precision: f32) -> Mesh {
    weld(&merge_sections(sections), precision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const UP: [f32; 3] = [0.0, 0.0, 1.0];
    const GREY: [u8; 4] = [200, 200, 200, 255];

    fn quad_section(z: f32) -> MeshSection {
        let mut section = MeshSection::new();
        section.push_triangle(
            [[0.0, 0.0, z], [1.0, 0.0, z], [1.0, 1.0, z]],
            UP,
            GREY,
            [0, 1, 2],
        );
        section.push_triangle(
            [[0.0, 0.0, z], [1.0, 1.0, z], [0.0, 1.0, z]],
            UP,
            GREY,
            [0, 1, 2],
        );
        section
    }

    #[test]
    fn merge_offsets_later_sections() {
        let merged = merge_sections(&[quad_section(0.0), MeshSection::new(), quad_section(1.0)]);

        assert_eq!(merged.vertex_count(), 12);
        assert_eq!(&merged.indices[6..9], &[6, 7, 8]);
        assert_eq!(merged.positions[6], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn weld_shares_vertices_within_precision() {
        let mut section = quad_section(0.0);
        // A tiny jitter well below the weld step must still collapse.
        section.positions[3][0] += 0.0001;

        let mesh = assemble(&[section], 0.001);

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.uvs.len(), 4);
        assert_eq!(mesh.colors.len(), 4);
    }

    #[test]
    fn weld_averages_normals() {
        let mut section = MeshSection::new();
        section.push_triangle(
            [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            [1.0, 0.0, 0.0],
            GREY,
            [0, 1, 2],
        );
        section.push_triangle(
            [[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]],
            [0.0, 1.0, 0.0],
            GREY,
            [0, 1, 2],
        );

        let mesh = assemble(&[section], 0.001);
        let shared = mesh.normals[0];
        let half = std::f32::consts::FRAC_1_SQRT_2;

        assert_eq!(mesh.vertex_count(), 4);
        assert_relative_eq!(shared[0], half, epsilon = 1e-6);
        assert_relative_eq!(shared[1], half, epsilon = 1e-6);
        assert_relative_eq!(mesh.normals[1][0], 1.0);
    }

    #[test]
    fn cancelled_normals_fall_back_to_up() {
        let mut section = MeshSection::new();
        let corners = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        section.push_triangle(corners, [1.0, 0.0, 0.0], GREY, [0, 1, 2]);
        section.push_triangle(corners, [-1.0, 0.0, 0.0], GREY, [0, 1, 2]);

        let mesh = assemble(&[section], 0.001);
        assert!(mesh.normals.iter().all(|normal| *normal == FALLBACK_NORMAL));
    }

    #[test]
    fn degenerate_triangles_are_dropped() {
        let mut section = quad_section(0.0);
        section.push_triangle(
            [[5.0, 5.0, 5.0], [5.0, 5.0, 5.0], [6.0, 5.0, 5.0]],
            UP,
            GREY,
            [0, 1, 2],
        );

        let mesh = assemble(&[section], 0.001);

        assert_eq!(mesh.triangle_count(), 2);
        for [a, b, c] in mesh.triangles() {
            assert!(a != b && b != c && c != a);
        }
        let count = mesh.vertex_count() as u32;
        assert!(mesh.indices.iter().all(|&index| index < count));
    }

    #[test]
    fn empty_input_gives_empty_mesh() {
        let mesh = assemble(&[], 0.001);
        assert!(mesh.is_empty());
        assert_eq!(mesh.vertex_count(), 0);
    }
}
