//! CUDA kernel launcher with PTX compilation and caching.
//!
//! Compiles CUDA C source at runtime via NVRTC, caches loaded modules
//! per device, and sizes launches for the column-per-thread scan.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use cudarc::driver::{CudaDevice, CudaFunction, LaunchConfig};
use parking_lot::Mutex;

use super::context::CudaError;

/// Registry of compiled PTX modules per device.
/// Key: (device_idx, module_name)
static LOADED: OnceLock<Mutex<HashSet<(usize, String)>>> = OnceLock::new();

fn loaded_set() -> &'static Mutex<HashSet<(usize, String)>> {
    LOADED.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Ensure a module is compiled and loaded on the given device.
/// No-op if already loaded.
pub fn ensure_module(
    device: &Arc<CudaDevice>,
    device_idx: usize,
    module_name: &'static str,
    func_names: &[&'static str],
    cuda_source: &str,
) -> Result<(), CudaError> {
    let key = (device_idx, module_name.to_string());
    // Held across compilation so two threads never compile the same module.
    let mut set = loaded_set().lock();
    if set.contains(&key) {
        return Ok(());
    }

    let ptx = cudarc::nvrtc::compile_ptx(cuda_source).map_err(|e| CudaError::PtxCompile {
        module: module_name.to_string(),
        msg: e.to_string(),
    })?;

    device
        .load_ptx(ptx, module_name, func_names)
        .map_err(|e| CudaError::ModuleLoad {
            module: module_name.to_string(),
            msg: e.to_string(),
        })?;

    tracing::info!("loaded CUDA module '{}' on device {}", module_name, device_idx);
    set.insert(key);
    Ok(())
}

/// Get a kernel function handle, loading the module if needed.
pub fn get_or_load_func(
    device: &Arc<CudaDevice>,
    device_idx: usize,
    module_name: &'static str,
    func_name: &'static str,
    cuda_source: &str,
) -> Result<CudaFunction, CudaError> {
    ensure_module(device, device_idx, module_name, &[func_name], cuda_source)?;
    device
        .get_func(module_name, func_name)
        .ok_or_else(|| CudaError::FuncNotFound {
            module: module_name.to_string(),
            func: func_name.to_string(),
        })
}

/// One thread per column: `min(block_size, columns)` threads per block
/// and enough blocks to cover every column.
pub fn column_grid(columns: usize, block_size: usize) -> LaunchConfig {
    let threads = block_size.min(columns).max(1);
    let blocks = columns.div_ceil(threads);
    LaunchConfig {
        grid_dim: (blocks.max(1) as u32, 1, 1),
        block_dim: (threads as u32, 1, 1),
        shared_mem_bytes: 0,
    }
}
