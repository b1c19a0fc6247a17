//! GPU handles for the scan backend.
//!
//! One `CudaDevice` per GPU index, opened on first use and shared by every
//! engine that targets that index.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use cudarc::driver::CudaDevice;
use parking_lot::Mutex;

use sru_core::SruError;

static OPEN_DEVICES: OnceLock<Mutex<HashMap<usize, Arc<CudaDevice>>>> = OnceLock::new();

/// Open (or reuse) the handle for `device_idx`.
pub fn get_device(device_idx: usize) -> Result<Arc<CudaDevice>, CudaError> {
    let mut open = OPEN_DEVICES.get_or_init(Default::default).lock();
    if let Some(dev) = open.get(&device_idx) {
        return Ok(Arc::clone(dev));
    }

    let available = device_count();
    if device_idx >= available {
        return Err(CudaError::DeviceInit(format!(
            "cuda:{} requested, {} device(s) visible",
            device_idx, available
        )));
    }
    let dev = CudaDevice::new(device_idx)
        .map_err(|e| CudaError::DeviceInit(format!("cuda:{}: {}", device_idx, e)))?;
    tracing::info!("opened cuda:{} for SRU scans", device_idx);
    open.insert(device_idx, Arc::clone(&dev));
    Ok(dev)
}

/// Number of GPUs the driver reports; 0 when there is no usable driver.
pub fn device_count() -> usize {
    match CudaDevice::count() {
        Ok(n) => usize::try_from(n).unwrap_or(0),
        Err(e) => {
            tracing::debug!("CUDA driver unavailable: {}", e);
            0
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CudaError {
    #[error("cannot open CUDA device: {0}")]
    DeviceInit(String),

    #[error("NVRTC could not compile '{module}': {msg}")]
    PtxCompile { module: String, msg: String },

    #[error("loading module '{module}' failed: {msg}")]
    ModuleLoad { module: String, msg: String },

    #[error("kernel '{func}' missing from module '{module}'")]
    FuncNotFound { module: String, func: String },

    #[error("scan launch failed: {0}")]
    LaunchError(String),

    #[error("device memory: {0}")]
    MemoryError(String),
}

/// A device that cannot be opened makes the backend unusable. Every other
/// failure belongs to the call that hit it.
impl From<CudaError> for SruError {
    fn from(e: CudaError) -> Self {
        match e {
            CudaError::DeviceInit(_) => SruError::UnsupportedBackend(e.to_string()),
            other => SruError::CudaError(other.to_string()),
        }
    }
}
