//! A grid of spinning primitives over a ground plane, shared by the viewer
//! and the bench.

use crate::camera::Camera;
use crate::data::{MeshId, MeshTransform};
use crate::error::Result;
use crate::geometry;
use crate::mesh::MeshBatch;
use glam::Vec3;

#[derive(Debug, Clone, Copy)]
struct SceneObject {
    mesh: MeshId,
    base: MeshTransform,
    /// Degrees per second about each axis.
    spin: Vec3,
}

pub struct DemoScene {
    batch: MeshBatch,
    objects: Vec<SceneObject>,
    extent: f32,
}

impl DemoScene {
    /// `grid` x `grid` objects, alternating cubes and spheres, `spacing` apart.
    pub fn grid(grid: u32, spacing: f32) -> Self {
        let mut batch = MeshBatch::new();
        let cube = geometry::cube(1.0);
        let sphere = geometry::uv_sphere(12, 16, 0.6);

        let grid = grid.max(1);
        let half = (grid - 1) as f32 * spacing * 0.5;
        let extent = half + spacing;
        batch.add_mesh(
            &geometry::plane(extent * 2.0, grid * 2),
            MeshTransform::at(Vec3::new(0.0, -1.0, 0.0)),
        );

        let mut objects = Vec::with_capacity((grid * grid) as usize);
        for row in 0..grid {
            for col in 0..grid {
                let position = Vec3::new(
                    col as f32 * spacing - half,
                    0.0,
                    row as f32 * spacing - half,
                );
                let base = MeshTransform::at(position);
                let triangles = if (row + col) % 2 == 0 { &cube } else { &sphere };
                let mesh = batch.add_mesh(triangles, base);
                let k = (row * grid + col) as f32;
                objects.push(SceneObject {
                    mesh,
                    base,
                    spin: Vec3::new(15.0 + 7.0 * (k % 3.0), 40.0 + 11.0 * (k % 5.0), 0.0),
                });
            }
        }

        log::info!(
            "Demo scene: {} meshes, {} triangles",
            batch.mesh_count(),
            batch.triangle_count()
        );

        Self {
            batch,
            objects,
            extent,
        }
    }

    /// Poses every object for `time` seconds since start.
    pub fn animate(&mut self, time: f32) -> Result<()> {
        for object in &self.objects {
            let mut transform = object.base;
            transform.rotation_degrees = object.spin * time;
            transform.position.y = (time * 1.5 + object.mesh as f32).sin() * 0.25;
            self.batch.set_mesh_transform(object.mesh, transform)?;
        }
        Ok(())
    }

    /// A camera that frames the whole grid from above and in front.
    pub fn camera(&self, aspect: f32) -> Camera {
        let distance = self.extent * 2.2 + 2.0;
        Camera::looking_at(
            Vec3::new(0.0, distance * 0.6, distance),
            Vec3::new(0.0, -0.5, 0.0),
            aspect,
        )
    }

    /// Radius of the area the scene occupies.
    pub fn extent(&self) -> f32 {
        self.extent
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn batch(&self) -> &MeshBatch {
        &self.batch
    }

    pub fn batch_mut(&mut self) -> &mut MeshBatch {
        &mut self.batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_adds_ground_and_objects() {
        let scene = DemoScene::grid(3, 2.5);
        assert_eq!(scene.object_count(), 9);
        assert_eq!(scene.batch().mesh_count(), 10);
        assert!(scene
            .batch()
            .tickets()
            .covers(scene.batch().triangle_count() as u32));
    }

    #[test]
    fn animate_touches_only_tickets() {
        let mut scene = DemoScene::grid(2, 2.0);
        scene.animate(1.25).unwrap();
        let spun = scene.batch().transform(1).unwrap();
        assert_ne!(spun.rotation_degrees, Vec3::ZERO);
        assert!(scene.batch().dirty().tickets);
    }
}
