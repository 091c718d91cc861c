//! Rasterizer configuration.

use crate::error::{RasterError, Result};

/// Pixels per tile edge.
pub const DEFAULT_TILE_SIZE: u32 = 8;

/// Records each tile can hold per frame. Used as the default for the
/// `CAP` const parameter of [`crate::TileCache`] and [`crate::Rasterizer`].
pub const DEFAULT_TILE_CAPACITY: usize = 512;

/// Default device memory budget (1 GiB).
pub const DEFAULT_DEVICE_MEMORY_BUDGET: usize = 1 << 30;

/// Largest tile edge accepted by [`RasterConfig::validate`].
pub const MAX_TILE_SIZE: u32 = 256;

/// Runtime settings for a [`crate::Rasterizer`] and its [`crate::Device`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Tile edge length in pixels.
    pub tile_size: u32,
    /// Worker threads for the device pool; `None` lets rayon decide.
    pub worker_threads: Option<usize>,
    /// Upper bound on bytes held by device allocations.
    pub device_memory_budget: usize,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            tile_size: DEFAULT_TILE_SIZE,
            worker_threads: None,
            device_memory_budget: DEFAULT_DEVICE_MEMORY_BUDGET,
        }
    }
}

impl RasterConfig {
    /// Returns a copy with the given output resolution.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Checks the settings before any device resource is created.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RasterError::InvalidConfig(format!(
                "resolution must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.tile_size == 0 || self.tile_size > MAX_TILE_SIZE {
            return Err(RasterError::InvalidConfig(format!(
                "tile size must be in 1..={MAX_TILE_SIZE}, got {}",
                self.tile_size
            )));
        }
        if self.worker_threads == Some(0) {
            return Err(RasterError::InvalidConfig(
                "worker thread count must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Number of tiles across and down for the configured resolution.
    pub fn tiles_across(&self) -> (u32, u32) {
        (
            self.width.div_ceil(self.tile_size),
            self.height.div_ceil(self.tile_size),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RasterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tiles_across(), (160, 90));
    }

    #[test]
    fn rejects_zero_resolution_and_tile_size() {
        assert!(RasterConfig::default()
            .with_resolution(0, 10)
            .validate()
            .is_err());

        let config = RasterConfig {
            tile_size: 0,
            ..RasterConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RasterConfig {
            worker_threads: Some(0),
            ..RasterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_tiles_round_up() {
        let config = RasterConfig::default().with_resolution(65, 63);
        assert_eq!(config.tiles_across(), (9, 8));
    }
}
