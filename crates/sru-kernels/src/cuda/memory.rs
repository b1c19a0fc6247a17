//! Device-resident f32 buffers and host transfers.

use std::sync::Arc;

use cudarc::driver::CudaSlice;

use super::context::{get_device, CudaError};

/// An f32 buffer living on one GPU.
#[derive(Debug, Clone)]
pub struct CudaBuffer {
    inner: Arc<CudaSlice<f32>>,
    device_idx: usize,
    len: usize,
}

impl CudaBuffer {
    /// Upload a host slice (blocking).
    pub fn from_host(device_idx: usize, data: &[f32]) -> Result<Self, CudaError> {
        let slice = get_device(device_idx)?.htod_sync_copy(data).map_err(|e| {
            CudaError::MemoryError(format!("upload of {} floats: {}", data.len(), e))
        })?;
        Ok(Self::wrap(slice, device_idx, data.len()))
    }

    pub(crate) fn wrap(slice: CudaSlice<f32>, device_idx: usize, len: usize) -> Self {
        Self {
            inner: Arc::new(slice),
            device_idx,
            len,
        }
    }

    /// Download to a host vector. Waits for pending work on the device.
    pub fn to_host(&self) -> Result<Vec<f32>, CudaError> {
        get_device(self.device_idx)?
            .dtoh_sync_copy(&*self.inner)
            .map_err(|e| CudaError::MemoryError(format!("download of {} floats: {}", self.len, e)))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_cuda_slice(&self) -> &CudaSlice<f32> {
        &self.inner
    }
}
