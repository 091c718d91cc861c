//! Aggregated benchmark results, printable and serializable to JSON.

use serde::Serialize;
use std::time::Duration;
use tileraster::{FrameStats, StageTimings, TransferStats};

/// Spread of one stage's wall time over the measured frames, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageSummary {
    pub mean_ms: f64,
    pub min_ms: f64,
    pub p95_ms: f64,
    pub max_ms: f64,
}

impl StageSummary {
    fn from_samples(samples: &mut [f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        samples.sort_by(f64::total_cmp);
        let n = samples.len();
        let p95 = ((n as f64 * 0.95).ceil() as usize).clamp(1, n) - 1;
        Self {
            mean_ms: samples.iter().sum::<f64>() / n as f64,
            min_ms: samples[0],
            p95_ms: samples[p95],
            max_ms: samples[n - 1],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StageReport {
    pub upload: StageSummary,
    pub clear: StageSummary,
    pub transform: StageSummary,
    pub bin: StageSummary,
    pub draw: StageSummary,
    pub download: StageSummary,
    pub total: StageSummary,
}

/// Counters from the last measured frame.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FrameCounters {
    pub near_rejected: u32,
    pub back_face_rejected: u32,
    pub binned_triangles: u32,
    pub records: u64,
    pub dropped_records: u64,
    pub overflowing_tiles: u32,
    pub busiest_tile: u32,
}

impl From<&FrameStats> for FrameCounters {
    fn from(stats: &FrameStats) -> Self {
        Self {
            near_rejected: stats.near_rejected,
            back_face_rejected: stats.back_face_rejected,
            binned_triangles: stats.binned_triangles,
            records: stats.records,
            dropped_records: stats.dropped_records,
            overflowing_tiles: stats.overflowing_tiles,
            busiest_tile: stats.busiest_tile,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TransferTotals {
    pub uploads: u64,
    pub upload_bytes: u64,
    pub downloads: u64,
    pub download_bytes: u64,
    pub dispatches: u64,
    pub synchronizations: u64,
}

impl From<TransferStats> for TransferTotals {
    fn from(t: TransferStats) -> Self {
        Self {
            uploads: t.uploads,
            upload_bytes: t.upload_bytes,
            downloads: t.downloads,
            download_bytes: t.download_bytes,
            dispatches: t.dispatches,
            synchronizations: t.synchronizations,
        }
    }
}

/// Everything `rasterbench` prints and optionally writes with `--stats-json`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BenchSummary {
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub tile_capacity: usize,
    pub worker_threads: usize,
    pub shader: String,
    pub meshes: usize,
    pub triangles: usize,
    pub frames: usize,
    pub fps: f64,
    pub stages: StageReport,
    pub last_frame: FrameCounters,
    /// Device traffic over the measured frames only.
    pub transfers: TransferTotals,
    pub device_memory_bytes: usize,
}

/// Collects per-frame timings during the measured run.
#[derive(Debug, Default)]
pub struct TimingLog {
    frames: Vec<StageTimings>,
}

impl TimingLog {
    pub fn with_capacity(frames: usize) -> Self {
        Self {
            frames: Vec::with_capacity(frames),
        }
    }

    pub fn push(&mut self, timings: StageTimings) {
        self.frames.push(timings);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn stage(&self, pick: impl Fn(&StageTimings) -> Duration) -> StageSummary {
        let mut samples: Vec<f64> = self
            .frames
            .iter()
            .map(|t| pick(t).as_secs_f64() * 1000.0)
            .collect();
        StageSummary::from_samples(&mut samples)
    }

    pub fn report(&self) -> StageReport {
        StageReport {
            upload: self.stage(|t| t.upload),
            clear: self.stage(|t| t.clear),
            transform: self.stage(|t| t.transform),
            bin: self.stage(|t| t.bin),
            draw: self.stage(|t| t.draw),
            download: self.stage(|t| t.download),
            total: self.stage(|t| t.total),
        }
    }

    /// Frames per second implied by the mean total frame time.
    pub fn fps(&self) -> f64 {
        let mean = self.stage(|t| t.total).mean_ms;
        if mean > 0.0 {
            1000.0 / mean
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for BenchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{}x{} | tiles {}px cap {} | {} threads | shader {}",
            self.width, self.height, self.tile_size, self.tile_capacity, self.worker_threads, self.shader
        )?;
        writeln!(
            f,
            "{} meshes, {} triangles, {} frames, {:.1} fps",
            self.meshes, self.triangles, self.frames, self.fps
        )?;
        writeln!(f, "{:<10} {:>9} {:>9} {:>9} {:>9}", "stage", "mean", "min", "p95", "max")?;
        let s = &self.stages;
        for (name, stage) in [
            ("upload", s.upload),
            ("clear", s.clear),
            ("transform", s.transform),
            ("bin", s.bin),
            ("draw", s.draw),
            ("download", s.download),
            ("total", s.total),
        ] {
            writeln!(
                f,
                "{:<10} {:>9.3} {:>9.3} {:>9.3} {:>9.3}",
                name, stage.mean_ms, stage.min_ms, stage.p95_ms, stage.max_ms
            )?;
        }
        let c = &self.last_frame;
        write!(
            f,
            "last frame: {} near / {} back-face rejects, {} binned, {} records ({} dropped in {} tiles, busiest {})",
            c.near_rejected,
            c.back_face_rejected,
            c.binned_triangles,
            c.records,
            c.dropped_records,
            c.overflowing_tiles,
            c.busiest_tile
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timings(total_ms: u64) -> StageTimings {
        StageTimings {
            draw: Duration::from_millis(total_ms / 2),
            total: Duration::from_millis(total_ms),
            ..StageTimings::default()
        }
    }

    #[test]
    fn summary_orders_samples() {
        let mut log = TimingLog::with_capacity(4);
        for ms in [40, 10, 30, 20] {
            log.push(timings(ms));
        }
        let report = log.report();
        assert_eq!(report.total.min_ms, 10.0);
        assert_eq!(report.total.max_ms, 40.0);
        assert_eq!(report.total.p95_ms, 40.0);
        assert_eq!(report.total.mean_ms, 25.0);
        assert_eq!(report.draw.mean_ms, 12.5);
        assert_eq!(log.fps(), 40.0);
    }

    #[test]
    fn empty_log_reports_zeros() {
        let log = TimingLog::default();
        assert!(log.is_empty());
        assert_eq!(log.report().total, StageSummary::default());
        assert_eq!(log.fps(), 0.0);
    }

    #[test]
    fn p95_picks_the_right_rank() {
        let mut samples: Vec<f64> = (1..=100).map(f64::from).collect();
        let summary = StageSummary::from_samples(&mut samples);
        assert_eq!(summary.p95_ms, 95.0);
    }

    #[test]
    fn summary_serializes_stage_names() {
        let summary = BenchSummary {
            width: 64,
            height: 32,
            frames: 3,
            ..BenchSummary::default()
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["width"], 64);
        assert!(json["stages"]["transform"]["p95_ms"].is_number());
        assert!(json["last_frame"]["dropped_records"].is_number());
    }
}
