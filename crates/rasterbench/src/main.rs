//! Headless driver for the tile rasterizer.
//!
//! Renders the animated demo scene for a fixed number of frames, prints a
//! per-stage timing table and can save the last frame as PNG.

mod report;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use report::{BenchSummary, FrameCounters, TimingLog};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tileraster::{
    BarycentricShader, DemoScene, DepthShader, FlatShader, FrameBuffer, RasterConfig, Rasterizer,
    Shader, DEFAULT_DEVICE_MEMORY_BUDGET, DEFAULT_TILE_SIZE,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ShaderKind {
    Flat,
    Depth,
    Barycentric,
}

impl std::fmt::Display for ShaderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ShaderKind::Flat => "flat",
            ShaderKind::Depth => "depth",
            ShaderKind::Barycentric => "barycentric",
        };
        f.write_str(s)
    }
}

/// Records kept per tile. Picks the rasterizer's compile-time capacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum TileCapacity {
    #[value(name = "64")]
    Small,
    #[value(name = "512")]
    Default,
    #[value(name = "2048")]
    Large,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "rasterbench", version, about)]
struct Args {
    #[arg(long, default_value_t = 1280, env = "RASTER_WIDTH")]
    width: u32,

    #[arg(long, default_value_t = 720, env = "RASTER_HEIGHT")]
    height: u32,

    /// Tile edge length in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "RASTER_TILE_SIZE")]
    tile_size: u32,

    #[arg(long, value_enum, default_value_t = TileCapacity::Default)]
    tile_capacity: TileCapacity,

    /// Objects per side of the demo grid.
    #[arg(long, default_value_t = 8)]
    grid: u32,

    #[arg(long, default_value_t = 2.5)]
    spacing: f32,

    /// Measured frames.
    #[arg(long, default_value_t = 120)]
    frames: usize,

    /// Unmeasured frames rendered first.
    #[arg(long, default_value_t = 5)]
    warmup: usize,

    /// Scene time advanced per frame, in seconds. 0 renders a still scene.
    #[arg(long, default_value_t = 1.0 / 60.0)]
    time_step: f32,

    #[arg(long, value_enum, default_value_t = ShaderKind::Flat)]
    shader: ShaderKind,

    /// Worker threads; defaults to one per core.
    #[arg(long, env = "RASTER_THREADS")]
    threads: Option<usize>,

    /// Device memory budget in MiB.
    #[arg(long, default_value_t = DEFAULT_DEVICE_MEMORY_BUDGET >> 20, env = "RASTER_BUDGET_MIB")]
    budget_mib: usize,

    /// Write the last frame's colors as PNG.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write the last frame's depth buffer as a grayscale PNG.
    #[arg(long)]
    depth_output: Option<PathBuf>,

    /// Write the summary as JSON.
    #[arg(long)]
    stats_json: Option<PathBuf>,
}

impl Args {
    fn raster_config(&self) -> RasterConfig {
        RasterConfig {
            width: self.width,
            height: self.height,
            tile_size: self.tile_size,
            worker_threads: self.threads,
            device_memory_budget: self.budget_mib << 20,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let summary = match args.tile_capacity {
        TileCapacity::Small => run_with_capacity::<64>(&args)?,
        TileCapacity::Default => run_with_capacity::<512>(&args)?,
        TileCapacity::Large => run_with_capacity::<2048>(&args)?,
    };

    println!("{summary}");

    if let Some(path) = &args.stats_json {
        let json = serde_json::to_string_pretty(&summary)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        info!("Wrote stats to {}", path.display());
    }
    Ok(())
}

fn run_with_capacity<const CAP: usize>(args: &Args) -> Result<BenchSummary> {
    match args.shader {
        ShaderKind::Flat => run::<_, CAP>(args, &FlatShader::default()),
        ShaderKind::Depth => run::<_, CAP>(args, &DepthShader),
        ShaderKind::Barycentric => run::<_, CAP>(args, &BarycentricShader),
    }
}

fn run<S: Shader, const CAP: usize>(args: &Args, shader: &S) -> Result<BenchSummary> {
    let mut raster = Rasterizer::<CAP>::new(args.raster_config())?;
    let mut scene = DemoScene::grid(args.grid, args.spacing);
    let camera = scene.camera(args.width as f32 / args.height.max(1) as f32);
    scene.batch_mut().apply_camera(camera.view_proj());

    info!(
        "Rendering {} warmup + {} frames at {}x{} with the {} shader",
        args.warmup, args.frames, args.width, args.height, args.shader
    );

    let mut time = 0.0f32;
    let mut step = |raster: &mut Rasterizer<CAP>, scene: &mut DemoScene| -> Result<()> {
        scene.animate(time)?;
        raster.render(scene.batch_mut(), shader)?;
        time += args.time_step;
        Ok(())
    };

    for _ in 0..args.warmup {
        step(&mut raster, &mut scene)?;
    }

    let before = raster.device().stats();
    let mut log = TimingLog::with_capacity(args.frames);
    for _ in 0..args.frames {
        step(&mut raster, &mut scene)?;
        let stats = raster.last_stats();
        debug!(
            "frame {}: {:.2} ms, {} records",
            stats.frame_index,
            stats.timings.total.as_secs_f64() * 1000.0,
            stats.records
        );
        log.push(stats.timings);
    }
    let transfers = raster.device().stats().since(&before);

    if let Some(path) = &args.output {
        save_color_png(raster.frame(), path)?;
        info!("Wrote color to {}", path.display());
    }
    if let Some(path) = &args.depth_output {
        save_depth_png(raster.frame(), path)?;
        info!("Wrote depth to {}", path.display());
    }

    let stats = raster.last_stats();
    Ok(BenchSummary {
        width: args.width,
        height: args.height,
        tile_size: args.tile_size,
        tile_capacity: CAP,
        worker_threads: raster.device().worker_threads(),
        shader: args.shader.to_string(),
        meshes: stats.meshes,
        triangles: stats.triangles,
        frames: log.len(),
        fps: log.fps(),
        stages: log.report(),
        last_frame: FrameCounters::from(stats),
        transfers: transfers.into(),
        device_memory_bytes: raster.device().memory_in_use(),
    })
}

fn save_color_png(frame: &FrameBuffer, path: &Path) -> Result<()> {
    let img = image::RgbaImage::from_raw(frame.width(), frame.height(), frame.as_bytes().to_vec())
        .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", frame.width(), frame.height()))?;
    img.save(path).with_context(|| format!("writing {}", path.display()))
}

/// Uncovered pixels are black; covered ones scale with depth so that the
/// nearest surface in the frame is white.
fn save_depth_png(frame: &FrameBuffer, path: &Path) -> Result<()> {
    let covered = |d: f32| d.is_finite() && d > 0.0;
    let max = frame
        .depth()
        .iter()
        .copied()
        .filter(|&d| covered(d))
        .fold(0.0f32, f32::max);
    let scale = if max > 0.0 { 255.0 / max } else { 0.0 };

    let gray: Vec<u8> = frame
        .depth()
        .iter()
        .map(|&d| if covered(d) { (d * scale).round().clamp(0.0, 255.0) as u8 } else { 0 })
        .collect();

    let img = image::GrayImage::from_raw(frame.width(), frame.height(), gray)
        .ok_or_else(|| anyhow!("depth buffer does not match {}x{}", frame.width(), frame.height()))?;
    img.save(path).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_args(extra: &[&str]) -> Args {
        let mut argv = vec![
            "rasterbench", "--width", "96", "--height", "64", "--grid", "2", "--frames", "3",
            "--warmup", "1", "--threads", "2",
        ];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn capacity_flag_uses_value_names() {
        let args = small_args(&["--tile-capacity", "64", "--shader", "depth"]);
        assert_eq!(args.tile_capacity, TileCapacity::Small);
        assert_eq!(args.shader, ShaderKind::Depth);
        assert_eq!(args.raster_config().worker_threads, Some(2));
    }

    #[test]
    fn short_run_reports_every_frame() {
        let args = small_args(&[]);
        let summary = run_with_capacity::<512>(&args).unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.meshes, 5);
        assert_eq!(summary.tile_capacity, 512);
        assert!(summary.last_frame.records > 0);
        assert_eq!(summary.transfers.synchronizations, 3);
        assert!(summary.to_string().contains("transform"));
    }

    #[test]
    fn writes_color_and_depth_pngs() {
        let dir = std::env::temp_dir().join(format!("rasterbench-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let color = dir.join("color.png");
        let depth = dir.join("depth.png");

        let args = small_args(&[
            "--output",
            color.to_str().unwrap(),
            "--depth-output",
            depth.to_str().unwrap(),
        ]);
        run_with_capacity::<64>(&args).unwrap();

        let img = image::open(&color).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (96, 64));
        let gray = image::open(&depth).unwrap().to_luma8();
        assert!(gray.pixels().any(|p| p.0[0] == 255));

        fs::remove_dir_all(&dir).unwrap();
    }
}
