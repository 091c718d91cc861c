//! Color and depth targets, mirrored between host and device.

use crate::device::{AtomicBuffer, Device};
use crate::error::Result;
use crate::registry::Kernel;
use crate::shader::CLEAR_DEPTH;

/// Device half of the frame buffer.
///
/// Cells are atomic so that the per-tile draw units can write their disjoint
/// pixel ranges through a shared reference.
pub struct DeviceFrame {
    width: u32,
    height: u32,
    color: AtomicBuffer,
    depth: AtomicBuffer,
}

impl DeviceFrame {
    fn new(device: &Device, width: u32, height: u32) -> Result<Self> {
        let pixels = width as usize * height as usize;
        Ok(Self {
            width,
            height,
            color: device.allocate_atomic(pixels)?,
            depth: device.allocate_atomic(pixels)?,
        })
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.color.len()
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    pub fn color(&self, index: usize) -> u32 {
        self.color.load(index)
    }

    #[inline]
    pub fn store_color(&self, index: usize, color: u32) {
        self.color.store(index, color)
    }

    #[inline]
    pub fn depth(&self, index: usize) -> f32 {
        f32::from_bits(self.depth.load(index))
    }

    #[inline]
    pub fn store_depth(&self, index: usize, depth: f32) {
        self.depth.store(index, depth.to_bits())
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Packed RGBA color and depth for every pixel of the output.
///
/// The host arrays and the device arrays are separate; each side carries a
/// flag saying it holds data the other has not seen yet, and transfers only
/// happen when that flag is set.
pub struct FrameBuffer {
    width: u32,
    height: u32,
    color: Vec<u32>,
    depth: Vec<f32>,
    device: DeviceFrame,
    host_dirty: bool,
    device_dirty: bool,
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("host_dirty", &self.host_dirty)
            .field("device_dirty", &self.device_dirty)
            .finish()
    }
}

impl FrameBuffer {
    pub fn new(device: &Device, width: u32, height: u32) -> Result<Self> {
        let pixels = width as usize * height as usize;
        Ok(Self {
            width,
            height,
            color: vec![0; pixels],
            depth: vec![CLEAR_DEPTH; pixels],
            device: DeviceFrame::new(device, width, height)?,
            host_dirty: false,
            device_dirty: false,
        })
    }

    /// Reallocates both sides for a new resolution. Returns `false` when the
    /// resolution is unchanged.
    pub fn resize(&mut self, device: &Device, width: u32, height: u32) -> Result<bool> {
        if (width, height) == (self.width, self.height) {
            return Ok(false);
        }
        self.device = DeviceFrame::new(device, 0, 0)?;
        self.width = 0;
        self.height = 0;
        self.color = Vec::new();
        self.depth = Vec::new();
        *self = Self::new(device, width, height)?;
        log::info!("Frame buffer resized to {}x{}", width, height);
        Ok(true)
    }

    /// Fills the device arrays with `color` and `depth`.
    pub fn clear(&mut self, device: &Device, kernel: &Kernel, color: u32, depth: f32) {
        crate::kernels::clear::clear_frame(device, kernel, &self.device, color, depth);
        self.device_dirty = true;
    }

    /// Sends host-side edits to the device. Returns whether a transfer happened.
    pub fn upload_if_dirty(&mut self, device: &Device) -> bool {
        if !self.host_dirty {
            return false;
        }
        device.upload_atomic(&self.device.color, &self.color);
        device.upload_atomic(&self.device.depth, bytemuck::cast_slice(&self.depth));
        self.host_dirty = false;
        true
    }

    /// Fetches device-side results. Returns whether a transfer happened.
    pub fn download_if_dirty(&mut self, device: &Device) -> bool {
        if !self.device_dirty {
            return false;
        }
        device.download_atomic(&mut self.color, &self.device.color);
        device.download_atomic(bytemuck::cast_slice_mut(&mut self.depth), &self.device.depth);
        self.device_dirty = false;
        true
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Packed colors, row-major from the top-left pixel.
    pub fn color(&self) -> &[u32] {
        &self.color
    }

    pub fn depth(&self) -> &[f32] {
        &self.depth
    }

    /// Mutable host colors; marks the host side newer.
    pub fn color_mut(&mut self) -> &mut [u32] {
        self.host_dirty = true;
        &mut self.color
    }

    /// Mutable host depths; marks the host side newer.
    pub fn depth_mut(&mut self) -> &mut [f32] {
        self.host_dirty = true;
        &mut self.depth
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        self.index(x, y).map(|i| self.color[i])
    }

    pub fn depth_at(&self, x: u32, y: u32) -> Option<f32> {
        self.index(x, y).map(|i| self.depth[i])
    }

    /// Color as bytes in R, G, B, A order.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.color)
    }

    pub fn is_host_dirty(&self) -> bool {
        self.host_dirty
    }

    pub fn is_device_dirty(&self) -> bool {
        self.device_dirty
    }

    pub(crate) fn device_frame(&self) -> &DeviceFrame {
        &self.device
    }

    /// Records that a kernel wrote the device arrays.
    pub(crate) fn mark_device_written(&mut self) {
        self.device_dirty = true;
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height)
            .then(|| y as usize * self.width as usize + x as usize)
    }
}
