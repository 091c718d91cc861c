//! Screen tiles and their fixed-capacity triangle bins.
//!
//! Each tile owns a counter and `CAP` record slots in two device arrays.
//! Binning reserves a slot with one atomic fetch-add on the counter; a
//! reservation at or past `CAP` is dropped. The counter is not clamped, so
//! after binning it still reports how many triangles wanted the tile.

use crate::config::DEFAULT_TILE_CAPACITY;
use crate::data::{MeshId, TileTriangleRecord, TransformedTriangle};
use crate::device::{AtomicBuffer, Device};
use crate::error::{RasterError, Result};
use std::sync::atomic::Ordering;

/// Cells per record slot: mesh id, local index, depth bits.
const RECORD_WORDS: usize = 3;

/// Inclusive range of tile coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl TileRange {
    /// Number of tiles in the range; never zero.
    pub fn count(&self) -> usize {
        (self.x1 - self.x0 + 1) as usize * (self.y1 - self.y0 + 1) as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> {
        let TileRange { x0, y0, x1, y1 } = *self;
        (y0..=y1).flat_map(move |y| (x0..=x1).map(move |x| (x, y)))
    }
}

/// Pixel rectangle of one tile, half-open and clipped to the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

/// Tile occupancy after a bin pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinOccupancy {
    /// Records stored across all tiles.
    pub records: u64,
    /// Reservations that found their tile full.
    pub dropped: u64,
    /// Tiles whose raw count exceeded capacity.
    pub overflowing_tiles: u32,
    /// Largest raw count of any tile.
    pub busiest: u32,
}

/// Per-tile bins for the current output resolution.
pub struct TileCache<const CAP: usize = DEFAULT_TILE_CAPACITY> {
    width: u32,
    height: u32,
    tile_size: u32,
    tiles_x: u32,
    tiles_y: u32,
    counts: AtomicBuffer,
    records: AtomicBuffer,
}

impl<const CAP: usize> std::fmt::Debug for TileCache<CAP> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCache")
            .field("capacity", &CAP)
            .field("resolution", &(self.width, self.height))
            .field("tile_size", &self.tile_size)
            .field("tiles", &(self.tiles_x, self.tiles_y))
            .finish()
    }
}

impl<const CAP: usize> TileCache<CAP> {
    /// Records each tile can retain per frame.
    pub const CAPACITY: usize = CAP;

    pub fn new(device: &Device, width: u32, height: u32, tile_size: u32) -> Result<Self> {
        if CAP == 0 {
            return Err(RasterError::InvalidConfig(
                "tile capacity must be at least 1".into(),
            ));
        }
        if tile_size == 0 {
            return Err(RasterError::InvalidConfig(
                "tile size must be at least 1".into(),
            ));
        }

        let tiles_x = width.div_ceil(tile_size);
        let tiles_y = height.div_ceil(tile_size);
        let tile_count = tiles_x as usize * tiles_y as usize;

        let counts = device.allocate_atomic(tile_count)?;
        let records = device.allocate_atomic(tile_count.saturating_mul(CAP * RECORD_WORDS))?;

        log::info!(
            "Tile cache {}x{} tiles of {}px for {}x{} (capacity {}, {:.1} MiB)",
            tiles_x,
            tiles_y,
            tile_size,
            width,
            height,
            CAP,
            (counts.size_bytes() + records.size_bytes()) as f64 / (1024.0 * 1024.0)
        );

        Ok(Self {
            width,
            height,
            tile_size,
            tiles_x,
            tiles_y,
            counts,
            records,
        })
    }

    /// Reallocates the bins for a new resolution. Returns `false` when the
    /// resolution is unchanged and nothing was reallocated.
    ///
    /// On allocation failure the cache is left with zero tiles.
    pub fn resize(&mut self, device: &Device, width: u32, height: u32) -> Result<bool> {
        if (width, height) == (self.width, self.height) {
            return Ok(false);
        }

        // Old bins go back to the budget before the new ones are reserved.
        self.width = 0;
        self.height = 0;
        self.tiles_x = 0;
        self.tiles_y = 0;
        self.counts = device.allocate_atomic(0)?;
        self.records = device.allocate_atomic(0)?;

        *self = Self::new(device, width, height, self.tile_size)?;
        Ok(true)
    }

    /// Zeroes one tile's counter. Run by the clear kernel.
    #[inline]
    pub(crate) fn reset_tile(&self, tile: usize) {
        self.counts.store(tile, 0);
    }

    /// Inclusive tile range covered by a screen-space bounding box, or
    /// `None` when the box lies entirely outside the output.
    pub fn tile_range(&self, bounds: [f32; 4]) -> Option<TileRange> {
        let [min_x, min_y, max_x, max_y] = bounds;
        if self.tiles_x == 0
            || self.tiles_y == 0
            || !(max_x >= 0.0 && max_y >= 0.0)
            || !(min_x < self.width as f32 && min_y < self.height as f32)
        {
            return None;
        }

        let size = self.tile_size as f32;
        let first = |v: f32, tiles: u32| ((v / size).floor().max(0.0) as u32).min(tiles - 1);
        let last = |v: f32, tiles: u32| ((v / size).ceil().max(0.0) as u32).min(tiles - 1);

        Some(TileRange {
            x0: first(min_x, self.tiles_x),
            y0: first(min_y, self.tiles_y),
            x1: last(max_x, self.tiles_x),
            y1: last(max_y, self.tiles_y),
        })
    }

    /// Bins one surviving triangle into every tile its bounds overlap and
    /// returns how many records were stored.
    pub fn bin(&self, mesh: MeshId, local_index: u32, triangle: &TransformedTriangle) -> u32 {
        let Some(range) = self.tile_range(triangle.bounds) else {
            return 0;
        };

        let mut stored = 0;
        for (tx, ty) in range.iter() {
            let tile = self.tile_index(tx, ty);
            let slot = self.counts.cells()[tile].fetch_add(1, Ordering::Relaxed) as usize;
            if slot < CAP {
                self.write_record(tile, slot, mesh, local_index, triangle.depth);
                stored += 1;
            }
        }
        stored
    }

    fn write_record(&self, tile: usize, slot: usize, mesh: MeshId, local: u32, depth: f32) {
        let base = (tile * CAP + slot) * RECORD_WORDS;
        self.records.store(base, mesh);
        self.records.store(base + 1, local);
        self.records.store(base + 2, depth.to_bits());
    }

    /// Number of triangles that tried to enter `tile` this frame.
    #[inline]
    pub fn raw_count(&self, tile: usize) -> u32 {
        self.counts.load(tile)
    }

    /// Records actually retained by `tile`.
    #[inline]
    pub fn len(&self, tile: usize) -> usize {
        (self.raw_count(tile) as usize).min(CAP)
    }

    pub fn record(&self, tile: usize, slot: usize) -> Option<TileTriangleRecord> {
        if slot >= self.len(tile) {
            return None;
        }
        let base = (tile * CAP + slot) * RECORD_WORDS;
        Some(TileTriangleRecord {
            mesh: self.records.load(base),
            local_index: self.records.load(base + 1),
            depth: f32::from_bits(self.records.load(base + 2)),
        })
    }

    /// Copies the retained records of `tile` into `out` and returns how many.
    pub fn load_records(&self, tile: usize, out: &mut [TileTriangleRecord; CAP]) -> usize {
        let n = self.len(tile);
        for (slot, record) in out[..n].iter_mut().enumerate() {
            let base = (tile * CAP + slot) * RECORD_WORDS;
            *record = TileTriangleRecord {
                mesh: self.records.load(base),
                local_index: self.records.load(base + 1),
                depth: f32::from_bits(self.records.load(base + 2)),
            };
        }
        n
    }

    /// Summarises the counters. Call only after the bin stage has completed.
    pub fn occupancy(&self) -> BinOccupancy {
        let mut summary = BinOccupancy::default();
        for tile in 0..self.tile_count() {
            let raw = self.raw_count(tile);
            let kept = (raw as usize).min(CAP) as u64;
            summary.records += kept;
            summary.dropped += raw as u64 - kept;
            summary.busiest = summary.busiest.max(raw);
            if raw as usize > CAP {
                summary.overflowing_tiles += 1;
            }
        }
        summary
    }

    #[inline]
    pub fn tile_index(&self, tx: u32, ty: u32) -> usize {
        ty as usize * self.tiles_x as usize + tx as usize
    }

    pub fn tile_rect(&self, tile: usize) -> TileRect {
        let tx = (tile % self.tiles_x as usize) as u32;
        let ty = (tile / self.tiles_x as usize) as u32;
        let x0 = tx * self.tile_size;
        let y0 = ty * self.tile_size;
        TileRect {
            x0,
            y0,
            x1: (x0 + self.tile_size).min(self.width),
            y1: (y0 + self.tile_size).min(self.height),
        }
    }

    pub fn tile_count(&self) -> usize {
        self.tiles_x as usize * self.tiles_y as usize
    }

    pub fn tiles_across(&self) -> (u32, u32) {
        (self.tiles_x, self.tiles_y)
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RasterConfig;

    fn device() -> Device {
        let config = RasterConfig {
            worker_threads: Some(2),
            ..RasterConfig::default()
        };
        Device::new(&config).unwrap()
    }

    fn with_bounds(bounds: [f32; 4], depth: f32) -> TransformedTriangle {
        TransformedTriangle {
            bounds,
            depth,
            ..TransformedTriangle::default()
        }
    }

    #[test]
    fn box_spanning_five_tiles_each_way_lands_in_25() {
        let device = device();
        let tiles = TileCache::<16>::new(&device, 64, 64, 8).unwrap();

        let tri = with_bounds([8.5, 8.5, 39.5, 39.5], 0.5);
        let range = tiles.tile_range(tri.bounds).unwrap();
        assert_eq!(
            range,
            TileRange {
                x0: 1,
                y0: 1,
                x1: 5,
                y1: 5
            }
        );
        assert_eq!(tiles.bin(0, 0, &tri), 25);

        let hit: Vec<usize> = (0..tiles.tile_count())
            .filter(|&t| tiles.raw_count(t) == 1)
            .collect();
        assert_eq!(hit.len(), 25);
        assert!(hit.contains(&tiles.tile_index(5, 5)));
        assert!(!hit.contains(&tiles.tile_index(6, 1)));
    }

    #[test]
    fn ranges_clamp_at_the_output_edge() {
        let device = device();
        let tiles = TileCache::<16>::new(&device, 64, 64, 8).unwrap();

        let range = tiles.tile_range([40.5, 40.5, 70.0, 70.0]).unwrap();
        assert_eq!(range.count(), 9);

        let range = tiles.tile_range([-20.0, -3.0, 2.0, 2.0]).unwrap();
        assert_eq!((range.x0, range.y0, range.x1, range.y1), (0, 0, 1, 1));

        assert_eq!(tiles.tile_range([64.0, 0.0, 80.0, 10.0]), None);
        assert_eq!(tiles.tile_range([-9.0, -9.0, -1.0, -1.0]), None);
    }

    #[test]
    fn overflow_keeps_capacity_and_spares_neighbours() {
        let device = device();
        let tiles = TileCache::<2>::new(&device, 64, 64, 8).unwrap();
        let tile = tiles.tile_index(7, 7);

        for local in 0..3 {
            let tri = with_bounds([58.0, 58.0, 62.0, 62.0], local as f32 * 0.1);
            let stored = tiles.bin(0, local, &tri);
            assert_eq!(stored, u32::from(local < 2));
        }

        assert_eq!(tiles.raw_count(tile), 3);
        assert_eq!(tiles.len(tile), 2);
        assert_eq!(tiles.record(tile, 2), None);
        assert_eq!(tiles.raw_count(tiles.tile_index(6, 7)), 0);
        assert_eq!(tiles.raw_count(tiles.tile_index(7, 6)), 0);

        let mut out = [TileTriangleRecord::EMPTY; 2];
        assert_eq!(tiles.load_records(tile, &mut out), 2);
        let mut locals: Vec<u32> = out.iter().map(|r| r.local_index).collect();
        locals.sort_unstable();
        assert_eq!(locals, vec![0, 1]);

        let summary = tiles.occupancy();
        assert_eq!(summary.records, 2);
        assert_eq!(summary.dropped, 1);
        assert_eq!(summary.overflowing_tiles, 1);
        assert_eq!(summary.busiest, 3);
    }

    #[test]
    fn edge_tiles_are_clipped_rects() {
        let device = device();
        let tiles = TileCache::<4>::new(&device, 20, 10, 8).unwrap();
        assert_eq!(tiles.tiles_across(), (3, 2));
        assert_eq!(
            tiles.tile_rect(tiles.tile_index(2, 1)),
            TileRect {
                x0: 16,
                y0: 8,
                x1: 20,
                y1: 10
            }
        );
    }

    #[test]
    fn resize_reallocates_only_on_change() {
        let device = device();
        let mut tiles = TileCache::<8>::new(&device, 64, 64, 8).unwrap();
        let before = device.memory_in_use();

        assert!(!tiles.resize(&device, 64, 64).unwrap());
        assert!(tiles.resize(&device, 128, 64).unwrap());
        assert_eq!(tiles.tile_count(), 128);
        assert_eq!(device.memory_in_use(), before * 2);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let device = device();
        assert!(matches!(
            TileCache::<0>::new(&device, 8, 8, 8),
            Err(RasterError::InvalidConfig(_))
        ));
    }
}
