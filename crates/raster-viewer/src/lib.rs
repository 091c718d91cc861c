//! Live viewer for the tile rasterizer.
//!
//! The rasterizer runs on the CPU device every frame. Its color buffer is
//! copied into a texture, stretched over the window by a full-screen pass and
//! overlaid with an egui HUD.

pub mod app;
pub mod camera;
pub mod config;
pub mod renderer;
pub mod ui;
