//! Reference shaders used by the viewer, the bench and the tests.

use crate::data::{MeshId, TransformedTriangle};
use crate::shader::{pack_rgba, pack_unit_rgb, unpack_rgba, Shader};
use glam::Vec3;

const PALETTE: [u32; 8] = [
    pack_rgba(230, 96, 80, 255),
    pack_rgba(96, 176, 232, 255),
    pack_rgba(240, 196, 88, 255),
    pack_rgba(120, 200, 120, 255),
    pack_rgba(180, 128, 220, 255),
    pack_rgba(232, 150, 60, 255),
    pack_rgba(80, 200, 196, 255),
    pack_rgba(210, 210, 210, 255),
];

/// Brightness per face of a box, in cube-face order (+X, -X, +Y, -Y, +Z, -Z).
const FACE_SHADE: [f32; 6] = [0.80, 0.55, 1.00, 0.40, 0.90, 0.65];

/// One palette color per mesh, darkened per face so box edges read clearly.
///
/// Faces are taken as consecutive triangle pairs. That lines up with the
/// quads of [`crate::geometry::cube`] and [`crate::geometry::plane`]. The pole
/// rows of [`crate::geometry::uv_sphere`] hold one triangle per segment, so
/// there a pair spans two neighbouring segments.
#[derive(Debug, Clone)]
pub struct FlatShader {
    palette: Vec<u32>,
    background: u32,
}

impl Default for FlatShader {
    fn default() -> Self {
        Self {
            palette: PALETTE.to_vec(),
            background: pack_rgba(24, 26, 32, 255),
        }
    }
}

impl FlatShader {
    pub fn with_palette(palette: Vec<u32>) -> Self {
        Self {
            palette,
            ..Self::default()
        }
    }

    /// Color drawn for triangle `triangle_index` of mesh `mesh`.
    pub fn color_for(&self, mesh: MeshId, triangle_index: u32) -> u32 {
        if self.palette.is_empty() {
            return pack_rgba(255, 255, 255, 255);
        }
        let base = self.palette[mesh as usize % self.palette.len()];
        let shade = FACE_SHADE[(triangle_index as usize / 2) % FACE_SHADE.len()];
        let [r, g, b, _] = unpack_rgba(base);
        pack_unit_rgb(Vec3::new(r as f32, g as f32, b as f32) / 255.0 * shade)
    }
}

impl Shader for FlatShader {
    fn clear_color(&self) -> u32 {
        self.background
    }

    fn fragment(&self, _x: u32, _y: u32, triangle: &TransformedTriangle, index: u32) -> u32 {
        self.color_for(triangle.mesh, index)
    }
}

/// Grayscale of the interpolated depth. Near surfaces are bright.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthShader;

impl Shader for DepthShader {
    fn fragment(&self, x: u32, y: u32, triangle: &TransformedTriangle, _index: u32) -> u32 {
        let bary = triangle.barycentric(x as f32 + 0.5, y as f32 + 0.5);
        let depth = triangle.depth_at(bary).clamp(0.0, 1.0);
        pack_unit_rgb(Vec3::splat(depth.sqrt()))
    }
}

/// Barycentric weights as red, green and blue.
#[derive(Debug, Clone, Copy, Default)]
pub struct BarycentricShader;

impl Shader for BarycentricShader {
    fn fragment(&self, x: u32, y: u32, triangle: &TransformedTriangle, _index: u32) -> u32 {
        pack_unit_rgb(triangle.barycentric(x as f32 + 0.5, y as f32 + 0.5))
    }
}
