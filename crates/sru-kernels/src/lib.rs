//! # sru-kernels
//!
//! Column-scan kernels for the SRU forward recurrence.
//!
//! Provides:
//! - Gate primitives (`sigmoid`, `squash`) and the cell nonlinearity switch
//! - CPU scan: one column per rayon task, sequential over time
//! - CUDA scan: one thread per column, PTX compiled at runtime (behind `cuda` feature)

pub mod activation;
pub mod cpu_scan;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use activation::{sigmoid, squash, Nonlinearity};
pub use cpu_scan::{sru_forward_f32, sru_scan_column};
