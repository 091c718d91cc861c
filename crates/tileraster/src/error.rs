use crate::data::MeshId;

/// Errors surfaced by the rasterizer.
///
/// Policy-level outcomes (tile overflow, rejected triangles) are not errors;
/// only allocation failures and API misuse are reported.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("device out of memory: requested {requested} bytes, {available} bytes available")]
    OutOfDeviceMemory { requested: usize, available: usize },

    #[error("unknown mesh id {0}")]
    UnknownMesh(MeshId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build device worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T, E = RasterError> = std::result::Result<T, E>;
