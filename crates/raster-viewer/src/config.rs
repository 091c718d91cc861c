use clap::{Parser, ValueEnum};
use tileraster::{RasterConfig, DEFAULT_DEVICE_MEMORY_BUDGET, DEFAULT_TILE_SIZE};

/// Fragment stage used to color the rasterized scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShaderKind {
    /// One color per mesh, shaded per face.
    Flat,
    /// Interpolated depth as grayscale.
    Depth,
    /// Barycentric weights as RGB.
    Barycentric,
}

impl ShaderKind {
    pub const ALL: [ShaderKind; 3] = [ShaderKind::Flat, ShaderKind::Depth, ShaderKind::Barycentric];

    pub fn label(self) -> &'static str {
        match self {
            ShaderKind::Flat => "Flat",
            ShaderKind::Depth => "Depth",
            ShaderKind::Barycentric => "Barycentric",
        }
    }
}

/// `raster_viewer` - watch the tile rasterizer draw a spinning demo scene.
///
/// Every frame is produced by the CPU rasterizer and then shown through
/// wgpu. Drag with the left mouse button to orbit, scroll to zoom.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct ViewerArgs {
    /// Initial window width in logical pixels.
    #[arg(long, default_value_t = 1280, env = "RASTER_WINDOW_WIDTH")]
    pub width: u32,

    /// Initial window height in logical pixels.
    #[arg(long, default_value_t = 720, env = "RASTER_WINDOW_HEIGHT")]
    pub height: u32,

    /// Rasterizer resolution as a fraction of the window size.
    ///
    /// Values below 1 trade sharpness for frame rate.
    #[arg(long, default_value_t = 0.5, env = "RASTER_RENDER_SCALE")]
    pub render_scale: f32,

    /// Tile edge length in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "RASTER_TILE_SIZE")]
    pub tile_size: u32,

    /// Worker threads for the rasterizer; defaults to one per core.
    #[arg(long, env = "RASTER_THREADS")]
    pub threads: Option<usize>,

    /// Device memory budget in MiB.
    #[arg(long, default_value_t = DEFAULT_DEVICE_MEMORY_BUDGET >> 20, env = "RASTER_BUDGET_MIB")]
    pub budget_mib: usize,

    /// Objects per side of the demo grid.
    #[arg(long, default_value_t = 6, env = "RASTER_GRID")]
    pub grid: u32,

    /// Distance between neighbouring objects.
    #[arg(long, default_value_t = 2.5)]
    pub spacing: f32,

    /// Initial shader.
    #[arg(long, value_enum, default_value_t = ShaderKind::Flat)]
    pub shader: ShaderKind,

    /// Present without waiting for vertical sync.
    #[arg(long)]
    pub no_vsync: bool,
}

impl ViewerArgs {
    /// Rasterizer settings for an output of `width` x `height` pixels.
    pub fn raster_config(&self, width: u32, height: u32) -> RasterConfig {
        RasterConfig {
            width,
            height,
            tile_size: self.tile_size,
            worker_threads: self.threads,
            device_memory_budget: self.budget_mib << 20,
        }
    }
}

/// Rasterizer resolution for a window of `width` x `height` at `scale`.
pub fn scaled_resolution(width: u32, height: u32, scale: f32) -> (u32, u32) {
    let scale = scale.clamp(0.1, 1.0);
    let scaled = |v: u32| ((v as f32 * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let args = ViewerArgs::parse_from(["raster_viewer"]);
        assert_eq!(args.shader, ShaderKind::Flat);
        assert_eq!(args.tile_size, DEFAULT_TILE_SIZE);

        let config = args.raster_config(640, 360);
        assert!(config.validate().is_ok());
        assert_eq!(config.device_memory_budget, DEFAULT_DEVICE_MEMORY_BUDGET);
    }

    #[test]
    fn shader_flag_accepts_value_names() {
        let args = ViewerArgs::parse_from(["raster_viewer", "--shader", "barycentric", "--threads", "3"]);
        assert_eq!(args.shader, ShaderKind::Barycentric);
        assert_eq!(args.raster_config(8, 8).worker_threads, Some(3));
    }

    #[test]
    fn scaled_resolution_never_reaches_zero() {
        assert_eq!(scaled_resolution(1280, 720, 0.5), (640, 360));
        assert_eq!(scaled_resolution(3, 1, 0.1), (1, 1));
        assert_eq!(scaled_resolution(100, 50, 4.0), (100, 50));
    }
}
