//! CUDA backend for the SRU scan.
//!
//! Provides:
//! - Device context management (lazy singleton per GPU)
//! - GPU memory allocation and host↔device transfers
//! - Kernel launcher with runtime PTX compilation and caching
//! - The column-per-thread forward scan kernel

pub mod context;
pub mod memory;
pub mod launch;
pub mod ops;
