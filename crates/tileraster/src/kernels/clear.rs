//! Clear stage.

use crate::device::Device;
use crate::frame::DeviceFrame;
use crate::registry::Kernel;
use crate::tiles::TileCache;

/// Fills every pixel of `frame` with `color` and `depth`.
pub fn clear_frame(device: &Device, kernel: &Kernel, frame: &DeviceFrame, color: u32, depth: f32) {
    device.dispatch(kernel, frame.pixel_count(), |i| {
        frame.store_color(i, color);
        frame.store_depth(i, depth);
    });
}

/// Clears the frame and zeroes every tile counter in one dispatch.
pub fn run<const CAP: usize>(
    device: &Device,
    kernel: &Kernel,
    frame: &DeviceFrame,
    tiles: &TileCache<CAP>,
    color: u32,
    depth: f32,
) {
    let pixels = frame.pixel_count();
    let tile_count = tiles.tile_count();
    device.dispatch(kernel, pixels.max(tile_count), |i| {
        if i < pixels {
            frame.store_color(i, color);
            frame.store_depth(i, depth);
        }
        if i < tile_count {
            tiles.reset_tile(i);
        }
    });
}
