//! The per-frame pipeline: clear, transform, bin, sort-and-draw.

use crate::config::{RasterConfig, DEFAULT_TILE_CAPACITY};
use crate::device::Device;
use crate::error::{RasterError, Result};
use crate::frame::FrameBuffer;
use crate::kernels::{self, BinReport};
use crate::mesh::{MeshBatch, UploadReport};
use crate::registry::KernelRegistry;
use crate::shader::Shader;
use crate::tiles::TileCache;
use std::time::{Duration, Instant};

/// Wall time spent in each stage of one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageTimings {
    pub upload: Duration,
    pub clear: Duration,
    pub transform: Duration,
    pub bin: Duration,
    pub draw: Duration,
    pub download: Duration,
    pub total: Duration,
}

/// What happened during the last rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub frame_index: u64,
    pub meshes: usize,
    pub triangles: usize,
    pub near_rejected: u32,
    pub back_face_rejected: u32,
    /// Triangles with at least one retained tile record.
    pub binned_triangles: u32,
    pub records: u64,
    /// Records lost to full tiles.
    pub dropped_records: u64,
    pub overflowing_tiles: u32,
    pub busiest_tile: u32,
    pub upload: UploadReport,
    pub timings: StageTimings,
}

/// Owns the device, the kernel registry, the tile cache and the frame buffer.
///
/// `CAP` is the number of records each tile keeps per frame.
pub struct Rasterizer<const CAP: usize = DEFAULT_TILE_CAPACITY> {
    config: RasterConfig,
    device: Device,
    kernels: KernelRegistry,
    tiles: TileCache<CAP>,
    frame: FrameBuffer,
    last_stats: FrameStats,
    frame_index: u64,
    overflow_reported: bool,
}

impl<const CAP: usize> Rasterizer<CAP> {
    pub fn new(config: RasterConfig) -> Result<Self> {
        config.validate()?;
        let device = Device::new(&config)?;
        Self::with_device(config, device)
    }

    /// Builds a rasterizer on an existing device.
    pub fn with_device(config: RasterConfig, device: Device) -> Result<Self> {
        config.validate()?;
        let tiles = TileCache::new(&device, config.width, config.height, config.tile_size)?;
        let frame = FrameBuffer::new(&device, config.width, config.height)?;

        Ok(Self {
            config,
            device,
            kernels: KernelRegistry::new(),
            tiles,
            frame,
            last_stats: FrameStats::default(),
            frame_index: 0,
            overflow_reported: false,
        })
    }

    /// Changes the output resolution. Must be called between frames.
    ///
    /// If the new buffers do not fit the memory budget, the previous
    /// resolution is restored and the allocation error is returned.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let config = self.config.clone().with_resolution(width, height);
        config.validate()?;
        if config == self.config {
            return Ok(());
        }
        if let Err(err) = self.reallocate(width, height) {
            log::warn!(
                "Resize to {}x{} failed, keeping {}x{}: {}",
                width,
                height,
                self.config.width,
                self.config.height,
                err
            );
            self.reallocate(self.config.width, self.config.height)?;
            return Err(err);
        }
        self.config = config;
        Ok(())
    }

    /// Resizes the tile bins and the frame. Each frees its old buffers before
    /// reserving new ones, so a failure can leave either side empty.
    fn reallocate(&mut self, width: u32, height: u32) -> Result<()> {
        self.tiles.resize(&self.device, width, height)?;
        self.frame.resize(&self.device, width, height)?;
        Ok(())
    }

    /// Renders `batch` with `shader` and returns the downloaded frame.
    ///
    /// The caller applies the camera to the batch beforehand.
    pub fn render<S: Shader>(&mut self, batch: &mut MeshBatch, shader: &S) -> Result<&FrameBuffer> {
        let frame_start = Instant::now();
        let mut timings = StageTimings::default();
        let set = self.kernels.kernels_for::<S>();
        let (width, height) = (self.config.width, self.config.height);
        let frame_size = (self.frame.width(), self.frame.height());
        if self.tiles.resolution() != (width, height) || frame_size != (width, height) {
            return Err(RasterError::InvalidConfig(format!(
                "buffers are not allocated for {}x{}",
                width, height
            )));
        }

        let start = Instant::now();
        let upload = batch.upload_if_dirty(&self.device)?;
        self.frame.upload_if_dirty(&self.device);
        timings.upload = start.elapsed();

        let start = Instant::now();
        kernels::clear::run(
            &self.device,
            &set.clear,
            self.frame.device_frame(),
            &self.tiles,
            shader.clear_color(),
            shader.clear_depth(),
        );
        self.frame.mark_device_written();
        timings.clear = start.elapsed();

        let mut report = BinReport::default();
        if let Some(mut view) = batch.device_view() {
            let start = Instant::now();
            kernels::transform::run(
                &self.device,
                &set.transform,
                shader,
                &mut view,
                width,
                height,
            );
            timings.transform = start.elapsed();

            let start = Instant::now();
            report = kernels::bin::run(
                &self.device,
                &set.bin,
                &*view.scratch,
                view.tickets,
                &self.tiles,
            );
            timings.bin = start.elapsed();

            let start = Instant::now();
            kernels::draw::run(
                &self.device,
                &set.draw,
                shader,
                &*view.scratch,
                view.tickets,
                &self.tiles,
                self.frame.device_frame(),
            );
            timings.draw = start.elapsed();
        }

        self.device.synchronize();
        let start = Instant::now();
        self.frame.download_if_dirty(&self.device);
        timings.download = start.elapsed();
        timings.total = frame_start.elapsed();

        let occupancy = self.tiles.occupancy();
        self.last_stats = FrameStats {
            frame_index: self.frame_index,
            meshes: batch.mesh_count(),
            triangles: batch.triangle_count(),
            near_rejected: report.near_rejected,
            back_face_rejected: report.back_face_rejected,
            binned_triangles: report.binned_triangles,
            records: occupancy.records,
            dropped_records: occupancy.dropped,
            overflowing_tiles: occupancy.overflowing_tiles,
            busiest_tile: occupancy.busiest,
            upload,
            timings,
        };
        self.frame_index += 1;
        self.report_frame();

        Ok(&self.frame)
    }

    fn report_frame(&mut self) {
        let stats = &self.last_stats;
        log::debug!(
            "frame {}: {} tris ({} near, {} back), {} records, {} dropped, {:.2} ms",
            stats.frame_index,
            stats.triangles,
            stats.near_rejected,
            stats.back_face_rejected,
            stats.records,
            stats.dropped_records,
            stats.timings.total.as_secs_f64() * 1000.0
        );

        let overflowing = stats.overflowing_tiles > 0;
        if overflowing && !self.overflow_reported {
            log::warn!(
                "{} tiles exceeded their capacity of {} (busiest wanted {}); {} records dropped",
                stats.overflowing_tiles,
                CAP,
                stats.busiest_tile,
                stats.dropped_records
            );
        }
        self.overflow_reported = overflowing;
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn tiles(&self) -> &TileCache<CAP> {
        &self.tiles
    }

    pub fn kernels(&self) -> &KernelRegistry {
        &self.kernels
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    pub fn last_stats(&self) -> &FrameStats {
        &self.last_stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::data::{MeshTransform, TileTriangleRecord, Triangle};
    use crate::geometry;
    use crate::registry::KernelKind;
    use crate::shader::pack_rgba;
    use crate::shaders::{BarycentricShader, DepthShader, FlatShader};
    use glam::{Mat4, Vec3};
    use std::collections::HashSet;

    fn config(width: u32, height: u32) -> RasterConfig {
        RasterConfig {
            width,
            height,
            tile_size: 8,
            worker_threads: Some(2),
            ..RasterConfig::default()
        }
    }

    fn ndc_triangle(a: [f32; 2], b: [f32; 2], c: [f32; 2], z: f32) -> Triangle {
        Triangle::new(
            Vec3::new(a[0], a[1], z),
            Vec3::new(b[0], b[1], z),
            Vec3::new(c[0], c[1], z),
        )
    }

    /// Every `(mesh, local)` pair present in any tile bin.
    fn binned<const CAP: usize>(raster: &Rasterizer<CAP>) -> HashSet<(u32, u32)> {
        let tiles = raster.tiles();
        let mut seen = HashSet::new();
        for tile in 0..tiles.tile_count() {
            for slot in 0..tiles.len(tile) {
                let record: TileTriangleRecord = tiles.record(tile, slot).unwrap();
                seen.insert((record.mesh, record.local_index));
            }
        }
        seen
    }

    fn to_pixel(m: Mat4, p: Vec3, width: u32, height: u32) -> (u32, u32) {
        let ndc = m.project_point3(p);
        let x = (ndc.x + 1.0) * 0.5 * width as f32;
        let y = (1.0 - ndc.y) * 0.5 * height as f32;
        (x as u32, y as u32)
    }

    #[test]
    fn two_cubes_bin_exactly_their_visible_faces() {
        let mut raster = Rasterizer::<512>::new(config(64, 64)).unwrap();
        let mut batch = MeshBatch::new();
        let left = batch.add_mesh(&geometry::cube(1.0), MeshTransform::at(Vec3::NEG_X));
        let right = batch.add_mesh(&geometry::cube(1.0), MeshTransform::at(Vec3::X));

        let camera = Camera::looking_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 1.0);
        batch.apply_camera(camera.view_proj());

        let shader = FlatShader::default();
        raster.render(&mut batch, &shader).unwrap();
        let stats = *raster.last_stats();

        // Each cube shows its front face and the side facing the other cube.
        assert_eq!(stats.triangles, 24);
        assert_eq!(stats.near_rejected, 0);
        assert_eq!(stats.back_face_rejected, 16);
        let visible = binned(&raster);
        assert_eq!(visible.len(), 8);
        assert_eq!(stats.binned_triangles, 8);
        assert!(visible.contains(&(left, 8)) && visible.contains(&(right, 9)));
        assert!(visible.contains(&(left, 0)) && visible.contains(&(right, 2)));

        let (x, y) = to_pixel(camera.view_proj(), Vec3::new(-1.0, 0.0, 0.5), 64, 64);
        assert_eq!(raster.frame().pixel(x, y), Some(shader.color_for(left, 8)));
        let (x, y) = to_pixel(camera.view_proj(), Vec3::new(1.0, 0.0, 0.5), 64, 64);
        assert_eq!(raster.frame().pixel(x, y), Some(shader.color_for(right, 8)));
        assert_eq!(raster.frame().pixel(0, 0), Some(shader.clear_color()));
    }

    #[test]
    fn nearer_mesh_wins_where_meshes_overlap() {
        let mut raster = Rasterizer::<512>::new(config(64, 64)).unwrap();
        let mut batch = MeshBatch::new();
        let far = batch.add_mesh(
            &geometry::cube(4.0),
            MeshTransform::at(Vec3::new(0.0, 0.0, -4.0)),
        );
        let near = batch.add_mesh(&geometry::cube(1.0), MeshTransform::default());
        let camera = Camera::looking_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 1.0);
        batch.apply_camera(camera.view_proj());

        let shader = FlatShader::default();
        let frame = raster.render(&mut batch, &shader).unwrap();

        let (x, y) = to_pixel(camera.view_proj(), Vec3::new(0.0, 0.0, 0.5), 64, 64);
        assert_eq!(frame.pixel(x, y), Some(shader.color_for(near, 8)));
        assert!(frame.depth_at(x, y).unwrap() > 0.0);

        let (x, y) = to_pixel(camera.view_proj(), Vec3::new(1.5, 0.0, -2.0), 64, 64);
        assert_eq!(frame.pixel(x, y), Some(shader.color_for(far, 8)));
    }

    #[test]
    fn triangle_spanning_five_by_five_tiles() {
        let mut raster = Rasterizer::<512>::new(config(64, 64)).unwrap();
        let mut batch = MeshBatch::new();
        // Screen bounds 8.5..39.5 on both axes.
        let tri = ndc_triangle(
            [-0.734375, -0.234375],
            [0.234375, -0.234375],
            [-0.734375, 0.734375],
            0.5,
        );
        batch.add_mesh(&[tri], MeshTransform::default());
        raster.render(&mut batch, &BarycentricShader).unwrap();

        let tiles = raster.tiles();
        let holding = (0..tiles.tile_count())
            .filter(|&t| tiles.len(t) == 1)
            .count();
        assert_eq!(holding, 25);
        assert_eq!(raster.last_stats().records, 25);
    }

    #[test]
    fn full_tile_drops_extra_triangles_without_touching_neighbours() {
        let mut raster = Rasterizer::<2>::new(config(64, 64)).unwrap();
        let mut batch = MeshBatch::new();
        // Three small triangles inside pixels 58..62, tile (7, 7).
        let triangles: Vec<Triangle> = [0.1, 0.2, 0.3]
            .into_iter()
            .map(|z| ndc_triangle([0.82, -0.93], [0.93, -0.93], [0.82, -0.82], z))
            .collect();
        batch.add_mesh(&triangles, MeshTransform::default());
        raster.render(&mut batch, &DepthShader).unwrap();

        let tiles = raster.tiles();
        let tile = tiles.tile_index(7, 7);
        assert_eq!(tiles.raw_count(tile), 3);
        assert_eq!(tiles.len(tile), 2);
        assert_eq!(tiles.raw_count(tiles.tile_index(6, 7)), 0);
        assert_eq!(tiles.raw_count(tiles.tile_index(7, 6)), 0);
        assert_eq!(tiles.raw_count(tile - 1), 0);

        let stats = raster.last_stats();
        assert_eq!(stats.records, 2);
        assert_eq!(stats.dropped_records, 1);
        assert_eq!(stats.overflowing_tiles, 1);

        // Whichever two were kept, something was drawn in the tile.
        let frame = raster.frame();
        let inside = frame.pixel(59, 60).unwrap();
        assert_ne!(inside, DepthShader.clear_color());
        assert_eq!(frame.pixel(50, 50), Some(DepthShader.clear_color()));
    }

    #[test]
    fn rejected_triangles_reach_no_tile() {
        let mut raster = Rasterizer::<512>::new(config(32, 32)).unwrap();
        let mut batch = MeshBatch::new();
        let visible = ndc_triangle([-0.5, -0.5], [0.5, -0.5], [-0.5, 0.5], 0.5);
        let clockwise = ndc_triangle([-0.5, -0.5], [-0.5, 0.5], [0.5, -0.5], 0.5);
        let too_near = ndc_triangle([-0.5, -0.5], [0.5, -0.5], [-0.5, 0.5], 1.5);
        let mesh = batch.add_mesh(&[visible, clockwise, too_near], MeshTransform::default());

        raster.render(&mut batch, &DepthShader).unwrap();
        let stats = raster.last_stats();
        assert_eq!(stats.near_rejected, 1);
        assert_eq!(stats.back_face_rejected, 1);
        assert_eq!(binned(&raster), HashSet::from([(mesh, 0)]));
    }

    #[test]
    fn rendering_twice_is_byte_identical() {
        let mut raster = Rasterizer::<512>::new(config(48, 40)).unwrap();
        let mut batch = MeshBatch::new();
        // Two coplanar triangles overlap with equal depth.
        let a = ndc_triangle([-0.9, -0.9], [0.8, -0.9], [-0.9, 0.8], 0.4);
        let b = ndc_triangle([-0.6, -0.7], [0.9, -0.2], [-0.3, 0.9], 0.4);
        batch.add_mesh(&[a, b], MeshTransform::default());
        batch.add_mesh(&geometry::cube(0.5), MeshTransform::at(Vec3::new(0.2, 0.1, 0.0)));

        raster.render(&mut batch, &BarycentricShader).unwrap();
        let color = raster.frame().color().to_vec();
        let depth: Vec<u32> = raster.frame().depth().iter().map(|d| d.to_bits()).collect();

        for _ in 0..3 {
            let frame = raster.render(&mut batch, &BarycentricShader).unwrap();
            assert_eq!(frame.color(), color.as_slice());
            let again: Vec<u32> = frame.depth().iter().map(|d| d.to_bits()).collect();
            assert_eq!(again, depth);
        }
    }

    #[test]
    fn kernels_compile_once_per_shader_type() {
        let mut raster = Rasterizer::<64>::new(config(16, 16)).unwrap();
        let mut batch = MeshBatch::new();
        batch.add_mesh(&geometry::cube(1.0), MeshTransform::default());

        raster.render(&mut batch, &FlatShader::default()).unwrap();
        raster.render(&mut batch, &FlatShader::default()).unwrap();
        raster.render(&mut batch, &DepthShader).unwrap();

        let registry = raster.kernels();
        assert_eq!(registry.compilations(), 2);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(crate::registry::ShaderTag::of::<FlatShader>()));

        let before = raster.device().stats();
        raster.render(&mut batch, &DepthShader).unwrap();
        let delta = raster.device().stats().since(&before);
        assert_eq!(delta.dispatches, KernelKind::ALL.len() as u64);
        assert_eq!(delta.synchronizations, 1);
    }

    #[test]
    fn first_frame_uploads_geometry_only() {
        let mut raster = Rasterizer::<64>::new(config(32, 32)).unwrap();
        let mut batch = MeshBatch::new();
        batch.add_mesh(&geometry::cube(1.0), MeshTransform::default());

        let before = raster.device().stats();
        raster.render(&mut batch, &FlatShader::default()).unwrap();
        let delta = raster.device().stats().since(&before);

        assert_eq!(delta.uploads, 2);
        assert_eq!(
            delta.upload_bytes as usize,
            12 * std::mem::size_of::<Triangle>() + std::mem::size_of::<crate::data::MeshTicket>()
        );
        assert_eq!(delta.downloads, 2);
    }

    #[test]
    fn steady_frames_upload_tickets_only() {
        let mut raster = Rasterizer::<512>::new(config(32, 32)).unwrap();
        let mut batch = MeshBatch::new();
        for i in 0..3 {
            batch.add_mesh(&geometry::cube(0.5), MeshTransform::at(Vec3::X * i as f32));
        }
        raster.render(&mut batch, &DepthShader).unwrap();
        assert!(raster.last_stats().upload.triangles);

        let camera = Camera::looking_at(Vec3::new(1.0, 1.0, 4.0), Vec3::ZERO, 1.0);
        batch.apply_camera(camera.view_proj());
        let before = raster.device().stats();
        raster.render(&mut batch, &DepthShader).unwrap();
        let delta = raster.device().stats().since(&before);

        let upload = raster.last_stats().upload;
        assert!(!upload.triangles);
        assert!(upload.tickets);
        assert_eq!(
            delta.upload_bytes as usize,
            3 * std::mem::size_of::<crate::data::MeshTicket>()
        );
    }

    #[test]
    fn resize_reallocates_tiles_and_frame() {
        let mut raster = Rasterizer::<16>::new(config(32, 32)).unwrap();
        raster.resize(40, 24).unwrap();
        assert_eq!(raster.tiles().tiles_across(), (5, 3));
        assert_eq!(raster.frame().color().len(), 40 * 24);
        assert!(raster.resize(0, 24).is_err());

        let mut batch = MeshBatch::new();
        batch.add_mesh(&geometry::cube(1.0), MeshTransform::default());
        batch.apply_camera(Camera::looking_at(Vec3::Z * 4.0, Vec3::ZERO, 40.0 / 24.0).view_proj());
        let frame = raster.render(&mut batch, &DepthShader).unwrap();
        assert_eq!((frame.width(), frame.height()), (40, 24));
        assert_ne!(frame.pixel(20, 12), Some(pack_rgba(0, 0, 0, 255)));
    }

    #[test]
    fn failed_resize_keeps_rendering_at_the_old_size() {
        let mut raster = Rasterizer::<1>::new(RasterConfig {
            device_memory_budget: 20_000,
            ..config(32, 32)
        })
        .unwrap();
        let mut batch = MeshBatch::new();
        batch.add_mesh(&geometry::cube(1.0), MeshTransform::default());
        batch.apply_camera(Camera::looking_at(Vec3::Z * 4.0, Vec3::ZERO, 1.0).view_proj());
        raster.render(&mut batch, &DepthShader).unwrap();

        let err = raster.resize(64, 64).unwrap_err();
        assert!(matches!(err, RasterError::OutOfDeviceMemory { .. }));
        assert_eq!((raster.config().width, raster.config().height), (32, 32));
        assert_eq!(raster.tiles().resolution(), (32, 32));

        let frame = raster.render(&mut batch, &DepthShader).unwrap();
        assert_eq!((frame.width(), frame.height()), (32, 32));
        assert_eq!(frame.color().len(), 32 * 32);
        assert!(raster.last_stats().binned_triangles > 0);
    }

    #[test]
    fn empty_batch_renders_the_clear_color() {
        let mut raster = Rasterizer::<8>::new(config(16, 8)).unwrap();
        let mut batch = MeshBatch::new();
        batch.add_mesh(&[], MeshTransform::default());
        let frame = raster.render(&mut batch, &FlatShader::default()).unwrap();
        let clear = FlatShader::default().clear_color();
        assert!(frame.color().iter().all(|&c| c == clear));
        assert!(frame.depth().iter().all(|&d| d == f32::MIN));
    }
}
