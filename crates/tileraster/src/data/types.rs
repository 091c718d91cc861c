//! Core data types, laid out for device buffers.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};
use std::cmp::Ordering;
use std::ops::Range;

/// Index of a mesh inside a [`crate::MeshBatch`].
pub type MeshId = u32;

/// Three object-space points. Immutable once stored.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Triangle {
    pub vertices: [Vec3; 3],
}

impl Triangle {
    pub const fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self {
            vertices: [a, b, c],
        }
    }
}

/// Per-triangle reject bits.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct StateMask(pub u32);

impl StateMask {
    pub const VISIBLE: StateMask = StateMask(0);
    /// A vertex has clip-space depth above 1 or lies behind the viewer.
    pub const NEAR_PLANE: StateMask = StateMask(1 << 0);
    /// The projected triangle has non-positive signed area.
    pub const BACK_FACING: StateMask = StateMask(1 << 1);

    #[inline]
    pub fn contains(self, other: StateMask) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: StateMask) {
        self.0 |= other.0;
    }

    /// True when any reject bit is set.
    #[inline]
    pub fn is_rejected(self) -> bool {
        self.0 != 0
    }
}

impl std::ops::BitOr for StateMask {
    type Output = StateMask;

    fn bitor(self, rhs: StateMask) -> StateMask {
        StateMask(self.0 | rhs.0)
    }
}

/// A triangle after the vertex stage, rewritten in place every frame.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TransformedTriangle {
    /// Screen-space x/y in pixels, z is the perspective-divided depth.
    pub points: [Vec3; 3],
    /// Homogeneous w of each vertex.
    pub w: Vec3,
    /// `[min_x, min_y, max_x, max_y]` in pixels.
    pub bounds: [f32; 4],
    /// Mean of the three vertex depths; used to order tile records.
    pub depth: f32,
    /// Reciprocal of the screen-space edge determinant, 0 when degenerate.
    pub inv_det: f32,
    pub state: StateMask,
    pub mesh: MeshId,
}

impl TransformedTriangle {
    /// A triangle that takes no further part in the frame.
    pub const REJECTED: TransformedTriangle = TransformedTriangle {
        points: [Vec3::ZERO; 3],
        w: Vec3::ZERO,
        bounds: [0.0; 4],
        depth: 0.0,
        inv_det: 0.0,
        state: StateMask(StateMask::NEAR_PLANE.0 | StateMask::BACK_FACING.0),
        mesh: 0,
    };

    #[inline]
    pub fn is_rejected(&self) -> bool {
        self.state.is_rejected()
    }

    /// Barycentric weights of the screen point `(x, y)`.
    #[inline]
    pub fn barycentric(&self, x: f32, y: f32) -> Vec3 {
        let p = Vec2::new(x, y);
        let [a, b, c] = self.points.map(|v| v.truncate());
        Vec3::new(
            edge(b, c, p) * self.inv_det,
            edge(c, a, p) * self.inv_det,
            edge(a, b, p) * self.inv_det,
        )
    }

    /// Depth interpolated with barycentric weights.
    #[inline]
    pub fn depth_at(&self, bary: Vec3) -> f32 {
        bary.dot(Vec3::new(
            self.points[0].z,
            self.points[1].z,
            self.points[2].z,
        ))
    }

    /// Homogeneous w interpolated with barycentric weights.
    #[inline]
    pub fn w_at(&self, bary: Vec3) -> f32 {
        bary.dot(self.w)
    }
}

/// Signed double area of `(a, b, p)`; positive when counter-clockwise in a
/// y-up frame.
#[inline]
pub fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b - a).perp_dot(p - a)
}

/// Per-mesh metadata: its range in the triangle store and its matrices.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshTicket {
    pub model: Mat4,
    /// `camera * model`, refreshed by `apply_camera`.
    pub combined: Mat4,
    pub start_index: u32,
    pub count: u32,
    pub _pad: [u32; 2],
}

impl MeshTicket {
    pub fn new(start_index: u32, count: u32, model: Mat4) -> Self {
        Self {
            model,
            combined: model,
            start_index,
            count,
            _pad: [0; 2],
        }
    }

    /// One past the last triangle of this mesh.
    #[inline]
    pub fn end(&self) -> u32 {
        self.start_index + self.count
    }

    #[inline]
    pub fn range(&self) -> Range<u32> {
        self.start_index..self.end()
    }

    #[inline]
    pub fn contains(&self, index: u32) -> bool {
        self.range().contains(&index)
    }
}

/// Position, rotation (degrees) and scale of one mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshTransform {
    pub position: Vec3,
    /// Euler angles in degrees, applied X then Y then Z.
    pub rotation_degrees: Vec3,
    pub scale: Vec3,
}

impl Default for MeshTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation_degrees: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl MeshTransform {
    pub fn new(position: Vec3, rotation_degrees: Vec3, scale: Vec3) -> Self {
        Self {
            position,
            rotation_degrees,
            scale,
        }
    }

    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn matrix(&self) -> Mat4 {
        let r = self.rotation_degrees;
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_z(r.z.to_radians())
            * Mat4::from_rotation_y(r.y.to_radians())
            * Mat4::from_rotation_x(r.x.to_radians())
            * Mat4::from_scale(self.scale)
    }
}

/// A reference to one surviving triangle inside one tile's bin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileTriangleRecord {
    pub mesh: MeshId,
    /// Triangle index local to `mesh`.
    pub local_index: u32,
    pub depth: f32,
}

impl TileTriangleRecord {
    pub const EMPTY: TileTriangleRecord = TileTriangleRecord {
        mesh: 0,
        local_index: 0,
        depth: 0.0,
    };

    /// Draw order inside a tile: ascending depth, ties broken by identity so
    /// the order does not depend on bin arrival order.
    #[inline]
    pub fn draw_order(&self, other: &Self) -> Ordering {
        self.depth
            .total_cmp(&other.depth)
            .then(self.mesh.cmp(&other.mesh))
            .then(self.local_index.cmp(&other.local_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen_triangle(a: [f32; 2], b: [f32; 2], c: [f32; 2]) -> TransformedTriangle {
        let points = [a, b, c].map(|p| Vec3::new(p[0], p[1], 0.5));
        let det = edge(
            points[0].truncate(),
            points[1].truncate(),
            points[2].truncate(),
        );
        TransformedTriangle {
            points,
            w: Vec3::ONE,
            inv_det: det.recip(),
            ..TransformedTriangle::default()
        }
    }

    #[test]
    fn barycentric_weights_sum_to_one_and_hit_vertices() {
        let tri = screen_triangle([0.0, 0.0], [10.0, 0.0], [0.0, 10.0]);
        let at_a = tri.barycentric(0.0, 0.0);
        assert!((at_a - Vec3::X).length() < 1e-6);
        let at_c = tri.barycentric(0.0, 10.0);
        assert!((at_c - Vec3::Z).length() < 1e-6);

        let inside = tri.barycentric(2.0, 3.0);
        assert!((inside.x + inside.y + inside.z - 1.0).abs() < 1e-6);
        assert!(inside.min_element() >= 0.0);

        let outside = tri.barycentric(9.0, 9.0);
        assert!(outside.min_element() < 0.0);
    }

    #[test]
    fn barycentric_is_orientation_independent() {
        let ccw = screen_triangle([0.0, 0.0], [10.0, 0.0], [0.0, 10.0]);
        let cw = screen_triangle([0.0, 0.0], [0.0, 10.0], [10.0, 0.0]);
        assert!(ccw.barycentric(2.0, 2.0).min_element() >= 0.0);
        assert!(cw.barycentric(2.0, 2.0).min_element() >= 0.0);
    }

    #[test]
    fn state_mask_bits_are_independent() {
        let mut mask = StateMask::VISIBLE;
        assert!(!mask.is_rejected());
        mask.insert(StateMask::BACK_FACING);
        assert!(mask.contains(StateMask::BACK_FACING));
        assert!(!mask.contains(StateMask::NEAR_PLANE));
        assert!(TransformedTriangle::REJECTED
            .state
            .contains(StateMask::NEAR_PLANE | StateMask::BACK_FACING));
    }

    #[test]
    fn transform_matrix_applies_scale_rotation_translation() {
        let t = MeshTransform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.0, 90.0, 0.0),
            Vec3::splat(2.0),
        );
        let p = t.matrix().transform_point3(Vec3::X);
        // scale -> (2,0,0), rotate 90 deg about Y -> (0,0,-2), translate.
        assert!((p - Vec3::new(1.0, 2.0, 1.0)).length() < 1e-5);
    }

    #[test]
    fn record_order_breaks_depth_ties_by_identity() {
        let a = TileTriangleRecord {
            mesh: 0,
            local_index: 4,
            depth: 0.25,
        };
        let b = TileTriangleRecord {
            mesh: 1,
            local_index: 0,
            depth: 0.25,
        };
        let c = TileTriangleRecord {
            mesh: 0,
            local_index: 0,
            depth: 0.5,
        };
        assert_eq!(a.draw_order(&b), Ordering::Less);
        assert_eq!(b.draw_order(&c), Ordering::Less);
        assert_eq!(a.draw_order(&a), Ordering::Equal);
    }

    #[test]
    fn ticket_layout_has_no_padding() {
        assert_eq!(std::mem::size_of::<MeshTicket>(), 144);
        assert_eq!(std::mem::size_of::<TransformedTriangle>(), 80);
    }
}
