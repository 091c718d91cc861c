use glam::Vec3;
use tileraster::Camera;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

const MIN_RADIUS: f32 = 1.5;
const MAX_RADIUS: f32 = 250.0;

/// Camera orbiting a fixed target point, Y up.
#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    /// Point the camera looks at.
    pub target: Vec3,
    /// Distance from the target.
    pub radius: f32,
    /// Rotation about the Y axis (radians), 0 looking down -Z.
    pub azimuth_rad: f32,
    /// Angle above the XZ plane (radians).
    pub elevation_rad: f32,
    pub fov_y_degrees: f32,
}

impl OrbitCamera {
    pub fn new(target: Vec3, radius: f32) -> Self {
        Self {
            target,
            radius: radius.clamp(MIN_RADIUS, MAX_RADIUS),
            azimuth_rad: 0.0,
            elevation_rad: 30.0f32.to_radians(),
            fov_y_degrees: 60.0,
        }
    }

    /// Orbit that sees the same view as `camera`.
    pub fn from_camera(camera: &Camera) -> Self {
        let offset = camera.eye - camera.target;
        let radius = offset.length().max(MIN_RADIUS);
        Self {
            target: camera.target,
            radius,
            azimuth_rad: offset.x.atan2(offset.z),
            elevation_rad: (offset.y / radius).clamp(-1.0, 1.0).asin(),
            fov_y_degrees: camera.fov_y_degrees,
        }
    }

    pub fn eye(&self) -> Vec3 {
        let (sin_az, cos_az) = self.azimuth_rad.sin_cos();
        let (sin_el, cos_el) = self.elevation_rad.sin_cos();
        self.target + self.radius * Vec3::new(cos_el * sin_az, sin_el, cos_el * cos_az)
    }

    /// Rasterizer camera for an output with the given aspect ratio.
    pub fn to_camera(&self, aspect: f32) -> Camera {
        Camera {
            fov_y_degrees: self.fov_y_degrees,
            ..Camera::looking_at(self.eye(), self.target, aspect)
        }
    }
}

/// Turns mouse input into orbit and zoom.
#[derive(Debug, Default)]
pub struct CameraController {
    mouse_down: bool,
    last_mouse: Option<(f64, f64)>,
}

impl CameraController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_event(&mut self, event: &WindowEvent, camera: &mut OrbitCamera) {
        match event {
            WindowEvent::MouseInput { button, state, .. } => {
                if *button == MouseButton::Left {
                    self.mouse_down = *state == ElementState::Pressed;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.handle_cursor_orbit((position.x, position.y), camera);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 120.0,
                };
                Self::zoom(scroll, camera);
            }
            _ => {}
        }
    }

    /// Positive `delta` moves closer.
    fn zoom(delta: f32, camera: &mut OrbitCamera) {
        camera.radius = (camera.radius * 1.1f32.powf(-delta)).clamp(MIN_RADIUS, MAX_RADIUS);
    }

    fn handle_cursor_orbit(&mut self, xy: (f64, f64), camera: &mut OrbitCamera) {
        if let (Some(last), true) = (self.last_mouse, self.mouse_down) {
            let dx = ((xy.0 - last.0) * 0.005) as f32;
            let dy = ((xy.1 - last.1) * 0.005) as f32;

            camera.azimuth_rad -= dx;
            // Stay above the ground and short of the pole, where look-at degenerates.
            camera.elevation_rad =
                (camera.elevation_rad + dy).clamp(2.0f32.to_radians(), 88.0f32.to_radians());
        }
        self.last_mouse = Some(xy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eye_sits_at_radius_above_target() {
        let orbit = OrbitCamera::new(Vec3::new(1.0, 0.0, 0.0), 10.0);
        let eye = orbit.eye();
        assert!(((eye - orbit.target).length() - 10.0).abs() < 1e-4);
        assert!(eye.y > 0.0);
        assert!(eye.z > 0.0);
    }

    #[test]
    fn from_camera_keeps_the_eye() {
        let camera = Camera::looking_at(Vec3::new(3.0, 4.0, 5.0), Vec3::new(0.0, -0.5, 0.0), 1.0);
        let orbit = OrbitCamera::from_camera(&camera);
        assert!((orbit.eye() - camera.eye).length() < 1e-4);
        assert_eq!(orbit.to_camera(2.0).aspect, 2.0);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut orbit = OrbitCamera::new(Vec3::ZERO, 5.0);
        CameraController::zoom(-200.0, &mut orbit);
        assert_eq!(orbit.radius, MAX_RADIUS);
        CameraController::zoom(200.0, &mut orbit);
        assert_eq!(orbit.radius, MIN_RADIUS);
    }
}
