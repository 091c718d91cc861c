use crate::config::ShaderKind;
use std::time::Duration;
use tileraster::FrameStats;

/// Knobs exposed in the controls window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSettings {
    pub shader: ShaderKind,
    pub animate: bool,
    pub render_scale: f32,
    pub grid: u32,
}

/// What the HUD shows besides the frame statistics.
#[derive(Debug, Clone, Copy)]
pub struct HudInfo {
    pub fps: f32,
    pub resolution: (u32, u32),
    pub tile_size: u32,
    pub worker_threads: usize,
    pub device_memory: usize,
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

pub fn draw_hud(ctx: &egui::Context, info: &HudInfo, stats: &FrameStats) {
    egui::Window::new("Rasterizer")
        .anchor(egui::Align2::LEFT_TOP, [10.0, 10.0])
        .resizable(false)
        .collapsible(true)
        .show(ctx, |ui| {
            ui.label(format!(
                "{:.1} fps | {}x{} | {} px tiles | {} threads",
                info.fps, info.resolution.0, info.resolution.1, info.tile_size, info.worker_threads
            ));
            ui.label(format!(
                "{} meshes, {} triangles, {:.1} MiB on device",
                stats.meshes,
                stats.triangles,
                info.device_memory as f64 / (1024.0 * 1024.0)
            ));
            ui.separator();
            ui.label(format!(
                "rejected: {} near, {} back-facing",
                stats.near_rejected, stats.back_face_rejected
            ));
            ui.label(format!(
                "binned: {} triangles, {} records, busiest tile {}",
                stats.binned_triangles, stats.records, stats.busiest_tile
            ));
            if stats.dropped_records > 0 {
                ui.colored_label(
                    egui::Color32::from_rgb(240, 160, 60),
                    format!(
                        "overflow: {} records dropped in {} tiles",
                        stats.dropped_records, stats.overflowing_tiles
                    ),
                );
            }
            ui.separator();

            let t = &stats.timings;
            egui::Grid::new("stage_timings").striped(true).show(ui, |ui| {
                for (name, d) in [
                    ("upload", t.upload),
                    ("clear", t.clear),
                    ("transform", t.transform),
                    ("bin", t.bin),
                    ("draw", t.draw),
                    ("download", t.download),
                    ("total", t.total),
                ] {
                    ui.label(name);
                    ui.label(format!("{:.2} ms", ms(d)));
                    ui.end_row();
                }
            });
        });
}

pub fn draw_controls(ctx: &egui::Context, settings: &mut ViewSettings) {
    egui::Window::new("Controls")
        .anchor(egui::Align2::RIGHT_TOP, [-10.0, 10.0])
        .resizable(false)
        .show(ctx, |ui| {
            egui::ComboBox::from_label("Shader")
                .selected_text(settings.shader.label())
                .show_ui(ui, |ui| {
                    for kind in ShaderKind::ALL {
                        ui.selectable_value(&mut settings.shader, kind, kind.label());
                    }
                });
            ui.checkbox(&mut settings.animate, "Animate");
            ui.add(egui::Slider::new(&mut settings.render_scale, 0.1..=1.0).text("Render scale"));
            ui.add(egui::Slider::new(&mut settings.grid, 1..=16).text("Grid"));
        });
}
