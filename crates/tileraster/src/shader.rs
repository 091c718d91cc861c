//! The shader contract the pipeline is generic over.

use crate::data::{edge, StateMask, TransformedTriangle, Triangle};
use glam::{Mat4, Vec3, Vec4};

/// Depth every pixel starts the frame with. Larger depths are nearer, so the
/// most negative finite value loses every depth test.
pub const CLEAR_DEPTH: f32 = f32::MIN;

/// A vertex and fragment program.
///
/// Each implementing type gets its own kernel set in the
/// [`KernelRegistry`](crate::KernelRegistry), compiled on first use.
pub trait Shader: Send + Sync + 'static {
    fn clear_color(&self) -> u32 {
        pack_rgba(0, 0, 0, 255)
    }

    fn clear_depth(&self) -> f32 {
        CLEAR_DEPTH
    }

    /// Projects one object-space triangle with `matrix` onto a
    /// `width` x `height` target and classifies it.
    fn vertex(
        &self,
        triangle: &Triangle,
        matrix: &Mat4,
        width: u32,
        height: u32,
    ) -> TransformedTriangle {
        project_triangle(triangle, matrix, width, height)
    }

    /// Color of pixel `(x, y)` covered by `triangle`. `triangle_index` is the
    /// triangle's index in the batch-wide triangle store.
    fn fragment(&self, x: u32, y: u32, triangle: &TransformedTriangle, triangle_index: u32)
        -> u32;
}

/// Packs 8-bit channels so that the in-memory byte order is R, G, B, A.
#[inline]
pub const fn pack_rgba(r: u8, g: u8, b: u8, a: u8) -> u32 {
    u32::from_le_bytes([r, g, b, a])
}

#[inline]
pub const fn unpack_rgba(color: u32) -> [u8; 4] {
    color.to_le_bytes()
}

/// Packs an opaque color from channels in `0.0..=1.0`.
#[inline]
pub fn pack_unit_rgb(rgb: Vec3) -> u32 {
    let c = (rgb.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
    pack_rgba(c.x as u8, c.y as u8, c.z as u8, 255)
}

/// Default vertex stage: homogeneous transform, perspective divide, viewport
/// mapping and reject classification.
///
/// Screen x grows to the right and screen y grows downwards. A vertex with
/// non-positive `w` or depth above 1 sets the near-plane bit; a triangle
/// that is not counter-clockwise in normalized device coordinates sets the
/// back-facing bit.
pub fn project_triangle(
    triangle: &Triangle,
    matrix: &Mat4,
    width: u32,
    height: u32,
) -> TransformedTriangle {
    let clip: [Vec4; 3] = triangle.vertices.map(|v| *matrix * v.extend(1.0));
    let ndc: [Vec3; 3] = clip.map(|c| c.truncate() / c.w);

    let mut state = StateMask::VISIBLE;
    if clip.iter().any(|c| c.w <= 0.0) || ndc.iter().any(|p| p.z > 1.0) {
        state.insert(StateMask::NEAR_PLANE);
    }
    let area = edge(ndc[0].truncate(), ndc[1].truncate(), ndc[2].truncate());
    if area.is_nan() || area <= 0.0 {
        state.insert(StateMask::BACK_FACING);
    }

    let half_w = width as f32 * 0.5;
    let half_h = height as f32 * 0.5;
    let points = ndc.map(|p| Vec3::new((p.x + 1.0) * half_w, (1.0 - p.y) * half_h, p.z));

    let det = edge(
        points[0].truncate(),
        points[1].truncate(),
        points[2].truncate(),
    );
    let inv_det = if det != 0.0 && det.is_finite() {
        det.recip()
    } else {
        0.0
    };

    let min = points[0].min(points[1]).min(points[2]);
    let max = points[0].max(points[1]).max(points[2]);

    TransformedTriangle {
        points,
        w: Vec3::new(clip[0].w, clip[1].w, clip[2].w),
        bounds: [min.x, min.y, max.x, max.y],
        depth: (ndc[0].z + ndc[1].z + ndc[2].z) / 3.0,
        inv_det,
        state,
        mesh: 0,
    }
}
