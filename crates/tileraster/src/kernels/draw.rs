//! Sort-and-draw stage: one unit of work per tile.

use crate::data::{MeshTicket, TileTriangleRecord, TransformedTriangle};
use crate::device::Device;
use crate::frame::DeviceFrame;
use crate::kernels::sort::heap_sort_by;
use crate::registry::Kernel;
use crate::shader::Shader;
use crate::tiles::{TileCache, TileRect};

/// Depth-sorts every tile's records and rasterizes them into `frame`.
///
/// Each unit owns one tile and therefore a disjoint set of pixels. Scratch
/// for the records and their draw order lives on the unit's stack.
pub fn run<S: Shader, const CAP: usize>(
    device: &Device,
    kernel: &Kernel,
    shader: &S,
    scratch: &[TransformedTriangle],
    tickets: &[MeshTicket],
    tiles: &TileCache<CAP>,
    frame: &DeviceFrame,
) {
    device.dispatch(kernel, tiles.tile_count(), |tile| {
        let mut records = [TileTriangleRecord::EMPTY; CAP];
        let mut order = [0u32; CAP];

        let n = tiles.load_records(tile, &mut records);
        for (slot, entry) in order[..n].iter_mut().enumerate() {
            *entry = slot as u32;
        }
        heap_sort_by(&mut order[..n], |&a, &b| {
            records[a as usize].draw_order(&records[b as usize])
        });

        let rect = tiles.tile_rect(tile);
        for &slot in &order[..n] {
            let record = &records[slot as usize];
            let Some(ticket) = tickets.get(record.mesh as usize) else {
                continue;
            };
            let index = ticket.start_index + record.local_index;
            if let Some(triangle) = scratch.get(index as usize) {
                draw_triangle(shader, frame, rect, triangle, index);
            }
        }
    });
}

fn draw_triangle<S: Shader>(
    shader: &S,
    frame: &DeviceFrame,
    rect: TileRect,
    triangle: &TransformedTriangle,
    index: u32,
) {
    let [min_x, min_y, max_x, max_y] = triangle.bounds;
    let x0 = (min_x.floor().max(rect.x0 as f32) as u32).max(rect.x0);
    let y0 = (min_y.floor().max(rect.y0 as f32) as u32).max(rect.y0);
    let x1 = (max_x.ceil().min(rect.x1 as f32).max(0.0) as u32).min(rect.x1);
    let y1 = (max_y.ceil().min(rect.y1 as f32).max(0.0) as u32).min(rect.y1);

    for y in y0..y1 {
        let py = y as f32 + 0.5;
        for x in x0..x1 {
            let bary = triangle.barycentric(x as f32 + 0.5, py);
            if !(0.0..=1.0).contains(&bary.x)
                || !(0.0..=1.0).contains(&bary.y)
                || !(0.0..=1.0).contains(&bary.z)
            {
                continue;
            }
            if triangle.w_at(bary) <= 0.0 {
                continue;
            }

            let pixel = frame.index(x, y);
            let depth = triangle.depth_at(bary);
            if depth >= frame.depth(pixel) {
                frame.store_depth(pixel, depth);
                // Only commit color if the depth we wrote is still there.
                if frame.depth(pixel) == depth {
                    frame.store_color(pixel, shader.fragment(x, y, triangle, index));
                }
            }
        }
    }
}
