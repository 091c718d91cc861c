use tileraster::FrameBuffer;

/// Texel format matching the rasterizer's packed RGBA colors.
pub const FRAME_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// GPU copy of the rasterizer's color buffer.
pub struct FrameTexture {
    texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    size: wgpu::Extent3d,
}

impl FrameTexture {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Raster Frame"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FRAME_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view, size }
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    /// Copies `frame` into the texture, recreating it first if the
    /// resolution changed. Returns `true` when the texture was recreated,
    /// which invalidates bind groups holding the old view.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, frame: &FrameBuffer) -> bool {
        let (width, height) = (frame.width(), frame.height());
        if width == 0 || height == 0 {
            return false;
        }

        let recreated = width != self.size.width || height != self.size.height;
        if recreated {
            log::debug!("Frame texture resized to {}x{}", width, height);
            *self = Self::new(device, width, height);
        }

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            frame.as_bytes(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            self.size,
        );
        recreated
    }
}
