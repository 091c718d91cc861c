use crate::{
    camera::{CameraController, OrbitCamera},
    config::{scaled_resolution, ShaderKind, ViewerArgs},
    renderer::Renderer,
    ui::{self, HudInfo, ViewSettings},
};
use anyhow::Result;
use std::{sync::Arc, time::Instant};
use tileraster::{BarycentricShader, DemoScene, DepthShader, FlatShader, Rasterizer};
use winit::{event::WindowEvent, window::Window};

pub struct App {
    pub renderer: Renderer,
    pub camera: OrbitCamera,
    pub camera_controller: CameraController,
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    pub raster: Rasterizer,
    pub scene: DemoScene,
    pub settings: ViewSettings,
    spacing: f32,
    flat: FlatShader,
    scene_time: f32,
    last_frame: Instant,
    fps: f32,
}

impl App {
    pub async fn new(window: Arc<Window>, args: &ViewerArgs) -> Result<Self> {
        let renderer = Renderer::new(window.clone(), !args.no_vsync).await?;
        let size = renderer.gfx.size;

        let settings = ViewSettings {
            shader: args.shader,
            animate: true,
            render_scale: args.render_scale.clamp(0.1, 1.0),
            grid: args.grid.clamp(1, 16),
        };

        let (width, height) = scaled_resolution(size.width, size.height, settings.render_scale);
        let raster = Rasterizer::new(args.raster_config(width, height))?;
        let scene = DemoScene::grid(settings.grid, args.spacing);
        let camera = OrbitCamera::from_camera(&scene.camera(width as f32 / height as f32));

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            &*window,
            None,
            None,
        );

        Ok(Self {
            renderer,
            camera,
            camera_controller: CameraController::new(),
            egui_ctx,
            egui_state,
            raster,
            scene,
            settings,
            spacing: args.spacing,
            flat: FlatShader::default(),
            scene_time: 0.0,
            last_frame: Instant::now(),
            fps: 0.0,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.renderer.resize(new_size);
            self.resize_raster();
        }
    }

    /// Matches the rasterizer to the window size and render scale.
    fn resize_raster(&mut self) {
        let size = self.renderer.gfx.size;
        let max_side = self.renderer.gfx.max_texture_side();
        let (width, height) = scaled_resolution(size.width, size.height, self.settings.render_scale);
        if let Err(err) = self.raster.resize(width.min(max_side), height.min(max_side)) {
            log::error!("Failed to resize rasterizer to {}x{}: {}", width, height, err);
        }
    }

    pub fn handle_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(window, event);
        if response.consumed {
            return true;
        }

        self.camera_controller.handle_event(event, &mut self.camera);

        if let WindowEvent::Resized(physical_size) = event {
            self.resize(*physical_size);
        }

        false
    }

    /// Animates the scene and runs one rasterizer frame.
    fn rasterize(&mut self) -> tileraster::Result<()> {
        if self.settings.animate {
            self.scene.animate(self.scene_time)?;
        }

        let (width, height) = (self.raster.frame().width(), self.raster.frame().height());
        let camera = self.camera.to_camera(width as f32 / height.max(1) as f32);
        self.scene.batch_mut().apply_camera(camera.view_proj());

        let batch = self.scene.batch_mut();
        let frame = match self.settings.shader {
            ShaderKind::Flat => self.raster.render(batch, &self.flat)?,
            ShaderKind::Depth => self.raster.render(batch, &DepthShader)?,
            ShaderKind::Barycentric => self.raster.render(batch, &BarycentricShader)?,
        };
        self.renderer.upload_frame(frame);
        Ok(())
    }

    fn tick(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        if dt > 0.0 {
            // Exponential moving average so the readout is legible.
            self.fps = if self.fps == 0.0 { 1.0 / dt } else { self.fps * 0.9 + 0.1 / dt };
        }
        if self.settings.animate {
            self.scene_time += dt;
        }
    }

    /// Applies changes made in the controls window.
    fn apply_settings(&mut self, previous: ViewSettings) {
        if self.settings.grid != previous.grid {
            self.scene = DemoScene::grid(self.settings.grid, self.spacing);
            let (width, height) = (self.raster.frame().width(), self.raster.frame().height());
            let framing = OrbitCamera::from_camera(&self.scene.camera(width as f32 / height as f32));
            self.camera.radius = framing.radius;
        }
        if self.settings.render_scale != previous.render_scale {
            self.resize_raster();
        }
    }

    pub fn render(&mut self, window: &Window) -> Result<(), wgpu::SurfaceError> {
        self.tick();
        if let Err(err) = self.rasterize() {
            log::error!("Rasterizer error: {}", err);
        }

        let frame = self.renderer.gfx.surface.get_current_texture()?;
        let swap_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.renderer.draw_frame(&swap_view);

        let egui_input = self.egui_state.take_egui_input(window);
        self.egui_ctx.begin_frame(egui_input);

        let info = HudInfo {
            fps: self.fps,
            resolution: (self.raster.frame().width(), self.raster.frame().height()),
            tile_size: self.raster.config().tile_size,
            worker_threads: self.raster.device().worker_threads(),
            device_memory: self.raster.device().memory_in_use(),
        };
        ui::draw_hud(&self.egui_ctx, &info, self.raster.last_stats());

        let previous = self.settings;
        ui::draw_controls(&self.egui_ctx, &mut self.settings);

        let egui_output = self.egui_ctx.end_frame();
        self.renderer.draw_ui(&swap_view, &self.egui_ctx, egui_output);
        frame.present();

        self.apply_settings(previous);
        Ok(())
    }
}
