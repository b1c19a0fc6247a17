//! # sru-core
//!
//! Core types for the SRU recurrence engine.
//!
//! Provides:
//! - `Shape` with stack storage for the low ranks used by the scan
//! - `SruDims`, the (batch, feature, time) extents of one invocation
//! - `Buffer` / `BufferView`: contiguous f32 data tagged with a shape
//! - `Device` selection (CPU, CUDA)
//! - `SruError` and the crate-wide `Result`

pub mod shape;
pub mod device;
pub mod buffer;
pub mod error;

pub use buffer::{concat_time, Buffer, BufferView};
pub use device::Device;
pub use error::SruError;
pub use shape::{Shape, SruDims};

pub type Result<T> = std::result::Result<T, SruError>;
