//! Per-cube marching cubes.
//!
//! `march_cube` polygonizes a single unit cube from its eight corner densities;
//! `polygonize_range` walks a slab of cells and collects the resulting triangles into
//! a `MeshSection`.

use std::ops::Range;

use cgmath::{InnerSpace, Vector3};

use super::mesh::MeshSection;
use super::tables::{CORNER_OFFSETS, EDGE_CORNERS, EDGE_DIRECTIONS, EDGE_TABLE, TRI_TABLE};
use super::PolygonizeSettings;
use crate::engine_state::voxels::chunk::DensityView;

/// Normal used for triangles whose cross product vanishes.
pub const UP_NORMAL: Vector3<f32> = Vector3::new(0.0, 0.0, 1.0);

/// Density differences below this are treated as a flat edge.
const FLAT_EDGE_EPSILON: f32 = 1e-6;

/// Bit `i` is set when corner `i` is at or below the surface level.
pub fn cube_mask(corners: &[f32; 8], surface_level: f32) -> u8 {
    corners
        .iter()
        .enumerate()
        .filter(|(_, density)| **density <= surface_level)
        .fold(0u8, |mask, (corner, _)| mask | (1 << corner))
}

/// Position of the surface crossing along an edge, as a fraction from `a` to `b`.
///
/// Clamped into `[0, 1]`; a flat edge crosses at its midpoint.
#[inline]
pub fn interpolation_offset(a: f32, b: f32, surface_level: f32) -> f32 {
    let delta = b - a;
    if delta.abs() < FLAT_EDGE_EPSILON {
        return 0.5;
    }
    ((surface_level - a) / delta).clamp(0.0, 1.0)
}

/// Triangle winding for a meshing pass.
///
/// Non-negative surface levels keep the table order, negative ones reverse it.
pub fn winding_for(surface_level: f32) -> [u32; 3] {
    if surface_level >= 0.0 {
        [0, 1, 2]
    } else {
        [2, 1, 0]
    }
}

/// Normalized face normal of a triangle in table order.
pub fn face_normal(triangle: &[Vector3<f32>; 3]) -> Vector3<f32> {
    let normal = (triangle[1] - triangle[0]).cross(triangle[2] - triangle[0]);
    if normal.magnitude2() > f32::EPSILON * f32::EPSILON {
        normal.normalize()
    } else {
        UP_NORMAL
    }
}

/// Polygonizes one unit cube.
///
/// # Arguments
/// * `corners` - Effective densities at the cube corners, in `CORNER_OFFSETS` order
/// * `surface_level` - Isosurface threshold
/// * `emit` - Called once per triangle with its vertices in table order, relative to
///   the cube's minimum corner
///
/// # Returns
/// The number of triangles emitted (at most five).
pub fn march_cube(
    corners: &[f32; 8],
    surface_level: f32,
    mut emit: impl FnMut([Vector3<f32>; 3]),
) -> usize {
    let mask = cube_mask(corners, surface_level) as usize;
    let edge_flags = EDGE_TABLE[mask];
    if edge_flags == 0 {
        return 0;
    }

    let mut edge_vertices = [Vector3::new(0.0, 0.0, 0.0); 12];
    for (edge, vertex) in edge_vertices.iter_mut().enumerate() {
        if edge_flags & (1 << edge) == 0 {
            continue;
        }
        let [start, end] = EDGE_CORNERS[edge];
        let t = interpolation_offset(corners[start], corners[end], surface_level);
        let origin = CORNER_OFFSETS[start];
        let direction = EDGE_DIRECTIONS[edge];
        *vertex = Vector3::new(
            origin[0] as f32 + t * direction[0],
            origin[1] as f32 + t * direction[1],
            origin[2] as f32 + t * direction[2],
        );
    }

    let mut emitted = 0;
    for triangle in TRI_TABLE[mask].chunks_exact(3) {
        if triangle[0] < 0 {
            break;
        }
        emit([
            edge_vertices[triangle[0] as usize],
            edge_vertices[triangle[1] as usize],
            edge_vertices[triangle[2] as usize],
        ]);
        emitted += 1;
    }
    emitted
}

/// Polygonizes every cell whose Z index lies in `z_range`.
///
/// Cells are visited Z-major, then Y, then X, so concatenating consecutive ranges
/// reproduces the triangle order of a single pass over the whole chunk.
pub fn polygonize_range(
    view: DensityView<'_>,
    z_range: Range<usize>,
    settings: &PolygonizeSettings,
) -> MeshSection {
    let resolution = view.field().resolution();
    let winding = winding_for(settings.surface_level);
    let mut section = MeshSection::new();
    let mut corners = [0.0f32; 8];

    for z in z_range {
        for y in 0..resolution {
            for x in 0..resolution {
                let cell = Vector3::new(x as f32, y as f32, z as f32);
                for (density, offset) in corners.iter_mut().zip(CORNER_OFFSETS.iter()) {
                    *density = view.density(
                        x as i32 + offset[0],
                        y as i32 + offset[1],
                        z as i32 + offset[2],
                    );
                }

                march_cube(&corners, settings.surface_level, |triangle| {
                    let world = triangle.map(|vertex| (cell + vertex) * settings.voxel_scale);
                    let normal = face_normal(&world);
                    section.push_triangle(
                        world.map(Into::into),
                        normal.into(),
                        settings.color,
                        winding,
                    );
                });
            }
        }
    }

    section
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::chunk::{DensityField, ModificationMap};
    use approx::assert_relative_eq;

    const HALF_SPLIT: [f32; 8] = [-1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0];

    #[test]
    fn uniform_cubes_produce_nothing() {
        let mut triangles = 0;
        assert_eq!(march_cube(&[1.0; 8], 0.0, |_| triangles += 1), 0);
        assert_eq!(march_cube(&[-1.0; 8], 0.0, |_| triangles += 1), 0);
        assert_eq!(triangles, 0);
        assert_eq!(cube_mask(&[1.0; 8], 0.0), 0);
        assert_eq!(cube_mask(&[-1.0; 8], 0.0), 255);
    }

    #[test]
    fn half_split_cube_yields_horizontal_quad() {
        let mut triangles = Vec::new();
        let count = march_cube(&HALF_SPLIT, 0.0, |triangle| triangles.push(triangle));

        assert_eq!(count, 2);
        for triangle in &triangles {
            for vertex in triangle {
                assert_relative_eq!(vertex.z, 0.5);
            }
            let normal = face_normal(triangle);
            assert_relative_eq!(normal.z.abs(), 1.0);
        }
    }

    #[test]
    fn interpolation_handles_flat_and_out_of_range_edges() {
        assert_eq!(interpolation_offset(2.0, 2.0, 0.0), 0.5);
        assert_eq!(interpolation_offset(-1.0, 1.0, 0.0), 0.5);
        assert_relative_eq!(interpolation_offset(-1.0, 3.0, 0.0), 0.25);
        assert_eq!(interpolation_offset(1.0, 2.0, 0.0), 0.0);
        assert_eq!(interpolation_offset(-2.0, -1.0, 0.0), 1.0);
    }

    #[test]
    fn winding_follows_surface_level_sign() {
        assert_eq!(winding_for(0.0), [0, 1, 2]);
        assert_eq!(winding_for(0.5), [0, 1, 2]);
        assert_eq!(winding_for(-0.5), [2, 1, 0]);
    }

    #[test]
    fn degenerate_triangle_normal_is_up() {
        let point = Vector3::new(1.0, 1.0, 1.0);
        assert_eq!(face_normal(&[point, point, point]), UP_NORMAL);
    }

    #[test]
    fn range_output_is_scaled_and_local() {
        // Ground plane at z = 1.5 in a 4^3 chunk.
        let field = DensityField::from_fn(4, |_, _, z| z as f32 - 1.5);
        let modifications = ModificationMap::new();
        let settings = PolygonizeSettings {
            surface_level: 0.0,
            voxel_scale: 2.0,
            color: [1, 2, 3, 4],
            section_count: 1,
        };

        let section = polygonize_range(DensityView::new(&field, &modifications), 0..4, &settings);

        // 16 cells straddle the plane, two triangles each.
        assert_eq!(section.triangle_count(), 32);
        assert!(section
            .positions
            .iter()
            .all(|position| (position[2] - 3.0).abs() < 1e-5));
        assert!(section.colors.iter().all(|color| *color == [1, 2, 3, 4]));

        let empty = polygonize_range(DensityView::new(&field, &modifications), 3..4, &settings);
        assert!(empty.is_empty());
    }
}
