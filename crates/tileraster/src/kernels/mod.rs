// src/kernels/mod.rs
//! Kernel bodies for the four pipeline stages.
//!
//! Each `run` function issues exactly one dispatch and returns once every
//! unit of work has finished.

pub mod bin;
pub mod clear;
pub mod draw;
pub mod sort;
pub mod transform;

pub use self::bin::BinReport;
