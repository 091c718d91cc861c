// src/data/mod.rs
//! Data layouts shared by the host and the device kernels.

pub mod types;

pub use self::types::{
    edge, MeshId, MeshTicket, MeshTransform, StateMask, TileTriangleRecord, TransformedTriangle,
    Triangle,
};
