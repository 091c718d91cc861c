use glam::{Mat4, Vec3};

/// Look-at camera with an infinite reverse-Z projection.
///
/// Depth after projection is `z_near / distance`: 1 at the near plane,
/// approaching 0 far away, above 1 closer than the near plane. That matches
/// the pipeline's "larger depth wins" test and its near-plane reject.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_degrees: f32,
    pub z_near: f32,
    pub aspect: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_degrees: 60.0,
            z_near: 0.1,
            aspect: 16.0 / 9.0,
        }
    }
}

impl Camera {
    pub fn looking_at(eye: Vec3, target: Vec3, aspect: f32) -> Self {
        Self {
            eye,
            target,
            aspect,
            ..Self::default()
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_infinite_reverse_rh(self.fov_y_degrees.to_radians(), self.aspect, self.z_near)
    }

    /// The matrix handed to [`crate::MeshBatch::apply_camera`].
    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearer_points_get_larger_depth() {
        let camera = Camera::looking_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 1.0);
        let m = camera.view_proj();
        let depth = |z: f32| m.project_point3(Vec3::new(0.0, 0.0, z)).z;

        assert!(depth(1.0) > depth(0.0));
        assert!(depth(0.0) > depth(-10.0));
        assert!((depth(5.0 - camera.z_near) - 1.0).abs() < 1e-4);
        assert!(depth(4.95) > 1.0);
    }

    #[test]
    fn target_projects_to_the_center() {
        let camera = Camera::looking_at(Vec3::new(3.0, 2.0, 1.0), Vec3::new(0.0, 1.0, 0.0), 1.5);
        let ndc = camera.view_proj().project_point3(camera.target);
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
    }
}
