// src/lib.rs
//! Tile-based deferred triangle rasterizer.
//!
//! Many meshes are stored in one flat triangle array and addressed through
//! per-mesh tickets. Every frame the pipeline runs four data-parallel stages
//! on the [`device::Device`]:
//! - clear the frame buffer and the tile bins,
//! - transform and classify every triangle of the batch,
//! - bin surviving triangles into fixed-capacity screen tiles,
//! - depth-sort each tile and rasterize it with a per-pixel depth test.

pub mod camera;
pub mod config;
pub mod data;
pub mod device;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod kernels;
pub mod mesh;
pub mod pipeline;
pub mod registry;
pub mod scene;
pub mod shader;
pub mod shaders;
pub mod tiles;

pub use camera::Camera;
pub use config::{
    RasterConfig, DEFAULT_DEVICE_MEMORY_BUDGET, DEFAULT_TILE_CAPACITY, DEFAULT_TILE_SIZE,
};
pub use data::{
    MeshId, MeshTicket, MeshTransform, StateMask, TileTriangleRecord, TransformedTriangle,
    Triangle,
};
pub use device::{Device, TransferStats};
pub use error::{RasterError, Result};
pub use frame::FrameBuffer;
pub use mesh::{DirtyState, MeshBatch, UploadReport};
pub use pipeline::{FrameStats, Rasterizer, StageTimings};
pub use registry::{KernelKind, KernelRegistry, ShaderTag};
pub use scene::DemoScene;
pub use shader::{pack_rgba, pack_unit_rgb, unpack_rgba, Shader, CLEAR_DEPTH};
pub use shaders::{BarycentricShader, DepthShader, FlatShader};
pub use tiles::{BinOccupancy, TileCache, TileRange, TileRect};
