//! Procedural meshes.
//!
//! All primitives are centered on the origin and wound counter-clockwise
//! when seen from outside, which the default vertex stage treats as
//! front-facing.

use crate::data::Triangle;
use glam::Vec3;
use std::f32::consts::{PI, TAU};

/// Axis-aligned cube with edge length `size`: 12 triangles, two per face,
/// faces ordered +X, -X, +Y, -Y, +Z, -Z.
pub fn cube(size: f32) -> Vec<Triangle> {
    let h = size * 0.5;
    // (normal, u, v) with u x v == normal.
    let faces = [
        (Vec3::X, Vec3::Y, Vec3::Z),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::Z, Vec3::X),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::Y, Vec3::X),
    ];

    let mut triangles = Vec::with_capacity(12);
    for (normal, u, v) in faces {
        let c = normal * h;
        let (u, v) = (u * h, v * h);
        push_quad(&mut triangles, [c - u - v, c + u - v, c + u + v, c - u + v]);
    }
    triangles
}

/// Square in the XZ plane facing +Y, split into `subdivisions` cells per side.
pub fn plane(size: f32, subdivisions: u32) -> Vec<Triangle> {
    let n = subdivisions.max(1);
    let step = size / n as f32;
    let origin = -size * 0.5;

    let mut triangles = Vec::with_capacity((n * n * 2) as usize);
    for i in 0..n {
        for j in 0..n {
            let x0 = origin + i as f32 * step;
            let z0 = origin + j as f32 * step;
            let (x1, z1) = (x0 + step, z0 + step);
            push_quad(
                &mut triangles,
                [
                    Vec3::new(x0, 0.0, z0),
                    Vec3::new(x0, 0.0, z1),
                    Vec3::new(x1, 0.0, z1),
                    Vec3::new(x1, 0.0, z0),
                ],
            );
        }
    }
    triangles
}

/// Latitude/longitude sphere. The pole rows use one triangle per segment.
pub fn uv_sphere(rings: u32, segments: u32, radius: f32) -> Vec<Triangle> {
    let rings = rings.max(2);
    let segments = segments.max(3);
    let point = |ring: u32, segment: u32| {
        let theta = PI * ring as f32 / rings as f32;
        let phi = TAU * segment as f32 / segments as f32;
        radius * Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin())
    };

    let mut triangles = Vec::with_capacity((segments * (rings - 1) * 2) as usize);
    for ring in 0..rings {
        for segment in 0..segments {
            let a = point(ring, segment);
            let b = point(ring, segment + 1);
            let c = point(ring + 1, segment + 1);
            let d = point(ring + 1, segment);
            if ring != 0 {
                triangles.push(Triangle::new(a, b, c));
            }
            if ring != rings - 1 {
                triangles.push(Triangle::new(a, c, d));
            }
        }
    }
    triangles
}

fn push_quad(out: &mut Vec<Triangle>, [a, b, c, d]: [Vec3; 4]) {
    out.push(Triangle::new(a, b, c));
    out.push(Triangle::new(a, c, d));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normal(t: &Triangle) -> Vec3 {
        let [a, b, c] = t.vertices;
        (b - a).cross(c - a)
    }

    fn centroid(t: &Triangle) -> Vec3 {
        (t.vertices[0] + t.vertices[1] + t.vertices[2]) / 3.0
    }

    #[test]
    fn cube_faces_point_outwards_in_order() {
        let tris = cube(2.0);
        assert_eq!(tris.len(), 12);
        for t in &tris {
            assert!(normal(t).dot(centroid(t)) > 0.0);
        }
        // Triangles 8 and 9 form the +Z face.
        assert!(tris[8].vertices.iter().all(|v| v.z == 1.0));
        assert!(tris[9].vertices.iter().all(|v| v.z == 1.0));
    }

    #[test]
    fn plane_faces_up() {
        let tris = plane(4.0, 3);
        assert_eq!(tris.len(), 18);
        assert!(tris.iter().all(|t| normal(t).y > 0.0));
    }

    #[test]
    fn consecutive_pairs_share_a_face() {
        for tris in [cube(1.0), plane(2.0, 4)] {
            assert_eq!(tris.len() % 2, 0);
            for pair in tris.chunks(2) {
                let (n0, n1) = (normal(&pair[0]).normalize(), normal(&pair[1]).normalize());
                assert!(n0.dot(n1) > 0.9999);
                assert!((pair[1].vertices[0] - pair[0].vertices[0]).dot(n0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn sphere_pole_rows_hold_one_triangle_per_segment() {
        let (rings, segments) = (4, 6);
        let tris = uv_sphere(rings, segments, 1.0);
        let top = &tris[..segments as usize];
        assert!(top.iter().all(|t| t.vertices[0].y == 1.0));
        assert!(tris[segments as usize].vertices[0].y < 1.0);
    }

    #[test]
    fn sphere_is_closed_and_outward() {
        let tris = uv_sphere(8, 12, 1.5);
        assert_eq!(tris.len(), 12 * (2 * 8 - 2));
        for t in &tris {
            assert!(normal(t).dot(centroid(t)) > 0.0);
            for v in t.vertices {
                assert!((v.length() - 1.5).abs() < 1e-4);
            }
        }
    }
}
