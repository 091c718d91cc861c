//! GPU side of the viewer: presents rasterized frames and the egui overlay.

pub mod context;
pub mod frame_texture;
pub mod present;

use self::{context::GfxContext, frame_texture::FrameTexture, present::FramePresenter};
use std::sync::Arc;
use tileraster::FrameBuffer;
use winit::window::Window;

pub struct Renderer {
    pub gfx: GfxContext,
    pub frame_texture: FrameTexture,
    pub presenter: FramePresenter,
    pub egui_renderer: egui_wgpu::Renderer,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, vsync: bool) -> anyhow::Result<Self> {
        let gfx = GfxContext::new(window, vsync).await?;
        let frame_texture = FrameTexture::new(&gfx.device, 1, 1);
        let presenter = FramePresenter::new(&gfx.device, gfx.config.format, &frame_texture.view);
        let egui_renderer = egui_wgpu::Renderer::new(&gfx.device, gfx.config.format, None, 1);

        Ok(Self {
            gfx,
            frame_texture,
            presenter,
            egui_renderer,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        self.gfx.resize(new_size);
    }

    /// Copies the latest rasterized frame to the GPU.
    pub fn upload_frame(&mut self, frame: &FrameBuffer) {
        if self
            .frame_texture
            .upload(&self.gfx.device, &self.gfx.queue, frame)
        {
            self.presenter.rebind(&self.gfx.device, &self.frame_texture.view);
        }
    }

    /// Draws the frame texture onto `swap_view`.
    pub fn draw_frame(&self, swap_view: &wgpu::TextureView) {
        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        self.presenter.draw(&mut encoder, swap_view);
        self.gfx.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Uploads egui's textures and meshes and paints them over `swap_view`.
    pub fn draw_ui(&mut self, swap_view: &wgpu::TextureView, ctx: &egui::Context, output: egui::FullOutput) {
        let pixels_per_point = ctx.pixels_per_point();
        let shapes = ctx.tessellate(output.shapes, pixels_per_point);
        let screen = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.gfx.config.width, self.gfx.config.height],
            pixels_per_point,
        };

        for (id, delta) in &output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.gfx.device, &self.gfx.queue, *id, delta);
        }

        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("UI Encoder"),
            });
        let user_buffers = self.egui_renderer.update_buffers(
            &self.gfx.device,
            &self.gfx.queue,
            &mut encoder,
            &shapes,
            &screen,
        );

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("HUD Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.egui_renderer.render(&mut pass, &shapes, &screen);
        }

        for id in &output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.gfx.queue.submit(
            user_buffers
                .into_iter()
                .chain(std::iter::once(encoder.finish())),
        );
    }
}
