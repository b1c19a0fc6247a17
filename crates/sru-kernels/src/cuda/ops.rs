//! CUDA dispatch for the SRU forward scan.
//!
//! Loads the scan module (compiled from `.cu` source at runtime), allocates
//! output GPU memory, launches one thread per column, and returns the
//! output buffers.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use cudarc::driver::{CudaDevice, CudaSlice, LaunchAsync};
use parking_lot::Mutex;

use sru_core::SruDims;

use super::context::{get_device, CudaError};
use super::launch::{column_grid, ensure_module, get_or_load_func};
use super::memory::CudaBuffer;

const SRU_FORWARD_CU: &str = include_str!("kernels/sru_forward.cu");
const SRU_MODULE: &str = "sru_forward";
const SRU_FORWARD_FN: &str = "sru_forward_f32";

/// Per-device cached one-float dummy buffer. Passed as the `c0` pointer
/// when no initial state is given; the kernel never reads it while
/// `has_c0 == 0`.
static DUMMY_BUFS: OnceLock<Mutex<HashMap<usize, Arc<CudaSlice<f32>>>>> = OnceLock::new();

fn get_dummy_buf(dev: &Arc<CudaDevice>, dev_idx: usize) -> Result<Arc<CudaSlice<f32>>, CudaError> {
    let map_mu = DUMMY_BUFS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut map = map_mu.lock();
    if let Some(buf) = map.get(&dev_idx) {
        return Ok(Arc::clone(buf));
    }
    let buf = Arc::new(
        dev.alloc_zeros::<f32>(1)
            .map_err(|e| CudaError::MemoryError(e.to_string()))?,
    );
    map.insert(dev_idx, Arc::clone(&buf));
    Ok(buf)
}

/// Compile and load the scan module on a device ahead of the first launch.
pub fn load_sru_module(dev: &Arc<CudaDevice>, dev_idx: usize) -> Result<(), CudaError> {
    ensure_module(dev, dev_idx, SRU_MODULE, &[SRU_FORWARD_FN], SRU_FORWARD_CU)
}

fn as_u32(name: &str, v: usize) -> Result<u32, CudaError> {
    u32::try_from(v).map_err(|_| CudaError::LaunchError(format!("{name}={v} exceeds u32")))
}

/// Launch the forward scan on device-resident buffers.
///
/// Returns `(hidden, cell, last_cell)`. Callers must not pass
/// `dims.columns() == 0` or `dims.time == 0`; those cases have nothing
/// to launch.
#[allow(clippy::too_many_arguments)]
pub fn cuda_sru_forward_f32(
    dev: &Arc<CudaDevice>,
    dev_idx: usize,
    x: &CudaSlice<f32>,
    u: &CudaSlice<f32>,
    bias: &CudaSlice<f32>,
    c0: Option<&CudaSlice<f32>>,
    dims: SruDims,
    use_tanh: bool,
    block_size: usize,
) -> Result<(CudaSlice<f32>, CudaSlice<f32>, CudaSlice<f32>), CudaError> {
    let columns = dims.columns();
    let seq_len = dims.seq_shape().numel();

    let hidden = dev
        .alloc_zeros::<f32>(seq_len)
        .map_err(|e| CudaError::MemoryError(e.to_string()))?;
    let cell = dev
        .alloc_zeros::<f32>(seq_len)
        .map_err(|e| CudaError::MemoryError(e.to_string()))?;
    let last_cell = dev
        .alloc_zeros::<f32>(columns)
        .map_err(|e| CudaError::MemoryError(e.to_string()))?;

    let has_c0: u32 = c0.is_some() as u32;
    let dummy = get_dummy_buf(dev, dev_idx)?;
    let c0_ptr = c0.unwrap_or(&*dummy);

    let f = get_or_load_func(dev, dev_idx, SRU_MODULE, SRU_FORWARD_FN, SRU_FORWARD_CU)?;
    let cfg = column_grid(columns, block_size);
    tracing::trace!(
        "sru_forward_f32 launch: grid={:?} block={:?} columns={} time={}",
        cfg.grid_dim,
        cfg.block_dim,
        columns,
        dims.time,
    );

    let params = (
        x,
        u,
        bias,
        has_c0,
        c0_ptr,
        &hidden,
        &cell,
        &last_cell,
        as_u32("columns", columns)?,
        as_u32("feature", dims.feature)?,
        as_u32("time", dims.time)?,
        use_tanh as u32,
    );
    unsafe {
        f.launch(cfg, params)
            .map_err(|e| CudaError::LaunchError(e.to_string()))?;
    }

    Ok((hidden, cell, last_cell))
}

/// Host-side scan result.
#[derive(Debug, Clone, PartialEq)]
pub struct CudaScanOutput {
    pub hidden: Vec<f32>,
    pub cell: Vec<f32>,
    pub last_cell: Vec<f32>,
}

/// Upload host inputs, run the scan on `device_idx`, download the outputs.
///
/// Degenerate problems (no columns or no steps) are answered on the host
/// without touching the device.
#[allow(clippy::too_many_arguments)]
pub fn sru_forward_cuda(
    device_idx: usize,
    x: &[f32],
    u: &[f32],
    bias: &[f32],
    c0: Option<&[f32]>,
    dims: SruDims,
    use_tanh: bool,
    block_size: usize,
) -> Result<CudaScanOutput, CudaError> {
    if dims.columns() == 0 || dims.time == 0 {
        return Ok(CudaScanOutput {
            hidden: Vec::new(),
            cell: Vec::new(),
            last_cell: c0.map_or_else(|| vec![0.0; dims.columns()], <[f32]>::to_vec),
        });
    }

    let dev = get_device(device_idx)?;

    let x_gpu = CudaBuffer::from_host(device_idx, x)?;
    let u_gpu = CudaBuffer::from_host(device_idx, u)?;
    let bias_gpu = CudaBuffer::from_host(device_idx, bias)?;
    let c0_gpu = c0.map(|s| CudaBuffer::from_host(device_idx, s)).transpose()?;

    let (hidden, cell, last_cell) = cuda_sru_forward_f32(
        &dev,
        device_idx,
        x_gpu.as_cuda_slice(),
        u_gpu.as_cuda_slice(),
        bias_gpu.as_cuda_slice(),
        c0_gpu.as_ref().map(|b| b.as_cuda_slice()),
        dims,
        use_tanh,
        block_size,
    )?;

    let seq_len = dims.seq_shape().numel();
    Ok(CudaScanOutput {
        hidden: CudaBuffer::wrap(hidden, device_idx, seq_len).to_host()?,
        cell: CudaBuffer::wrap(cell, device_idx, seq_len).to_host()?,
        last_cell: CudaBuffer::wrap(last_cell, device_idx, dims.columns()).to_host()?,
    })
}
