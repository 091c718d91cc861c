//! Binning stage: one unit of work per transformed triangle.

use crate::data::{MeshTicket, StateMask, TransformedTriangle};
use crate::device::Device;
use crate::registry::Kernel;
use crate::tiles::TileCache;
use std::sync::atomic::{AtomicU32, Ordering};

/// Reject and record counts gathered while binning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinReport {
    pub near_rejected: u32,
    pub back_face_rejected: u32,
    /// Triangles with at least one stored record.
    pub binned_triangles: u32,
    /// Records stored across all tiles.
    pub stored_records: u32,
}

/// Bins every surviving triangle of `scratch` into `tiles`.
///
/// Tile counters must have been zeroed by the clear stage.
pub fn run<const CAP: usize>(
    device: &Device,
    kernel: &Kernel,
    scratch: &[TransformedTriangle],
    tickets: &[MeshTicket],
    tiles: &TileCache<CAP>,
) -> BinReport {
    let near = AtomicU32::new(0);
    let back = AtomicU32::new(0);
    let binned = AtomicU32::new(0);
    let stored = AtomicU32::new(0);

    device.dispatch(kernel, scratch.len(), |i| {
        let triangle = &scratch[i];
        if triangle.is_rejected() {
            if triangle.state.contains(StateMask::NEAR_PLANE) {
                near.fetch_add(1, Ordering::Relaxed);
            }
            if triangle.state.contains(StateMask::BACK_FACING) {
                back.fetch_add(1, Ordering::Relaxed);
            }
            return;
        }

        let local = i as u32 - tickets[triangle.mesh as usize].start_index;
        let written = tiles.bin(triangle.mesh, local, triangle);
        if written > 0 {
            binned.fetch_add(1, Ordering::Relaxed);
        }
        stored.fetch_add(written, Ordering::Relaxed);
    });

    BinReport {
        near_rejected: near.into_inner(),
        back_face_rejected: back.into_inner(),
        binned_triangles: binned.into_inner(),
        stored_records: stored.into_inner(),
    }
}
