//! The recurrence engine: validation, backend dispatch and runtime setup.
//!
//! Two execution paths share one contract:
//! - **CPU**: `sru_kernels::cpu_scan`, columns spread over rayon workers.
//! - **CUDA** (requires `cuda` feature): one GPU thread per column.
//!
//! There is no fallback between them. A CUDA engine that cannot reach its
//! device fails with `UnsupportedBackend` instead of quietly running on CPU.

use std::sync::{Arc, OnceLock};

use sru_core::{Buffer, Device, Result, SruDims, SruError};
use sru_kernels::{cpu_scan, Nonlinearity};

use crate::config::ScanConfig;
use crate::inputs::{validate, ScanInputs, ScanOutput, ScanOutputMut};

/// One-time execution resources, built by `init`.
#[derive(Debug)]
struct Runtime {
    /// Dedicated CPU pool when `num_threads` is set.
    pool: Option<rayon::ThreadPool>,
}

/// Stateless SRU forward scan.
///
/// Cloning is cheap; clones share the initialized runtime.
#[derive(Debug, Clone)]
pub struct RecurrenceEngine {
    config: ScanConfig,
    runtime: Arc<OnceLock<Runtime>>,
}

impl RecurrenceEngine {
    /// Create an engine. Validates the config but does not touch the device.
    pub fn new(config: ScanConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            runtime: Arc::new(OnceLock::new()),
        })
    }

    /// CPU engine with default settings.
    pub fn cpu() -> Self {
        Self {
            config: ScanConfig::default(),
            runtime: Arc::new(OnceLock::new()),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn device(&self) -> Device {
        self.config.device
    }

    pub fn nonlinearity(&self) -> Nonlinearity {
        Nonlinearity::from_use_tanh(self.config.use_tanh)
    }

    /// Same engine with the cell nonlinearity switched.
    pub fn with_tanh(&self, use_tanh: bool) -> Self {
        Self {
            config: self.config.clone().with_tanh(use_tanh),
            runtime: Arc::clone(&self.runtime),
        }
    }

    /// Prepare the execution substrate: the CPU thread pool, or the CUDA
    /// device handle and compiled scan module.
    ///
    /// Idempotent. `scan` calls it on first use, so calling it up front
    /// only moves the setup cost (and any device error) earlier.
    pub fn init(&self) -> Result<()> {
        self.runtime().map(|_| ())
    }

    fn runtime(&self) -> Result<&Runtime> {
        if let Some(rt) = self.runtime.get() {
            return Ok(rt);
        }
        let rt = build_runtime(&self.config)?;
        Ok(self.runtime.get_or_init(|| rt))
    }

    /// Scan every column and return freshly allocated outputs.
    pub fn scan(&self, inputs: &ScanInputs<'_>) -> Result<ScanOutput> {
        let dims = validate(inputs)?;
        let mut hidden = Buffer::zeros(dims.seq_shape());
        let mut cell = Buffer::zeros(dims.seq_shape());
        let mut last_cell = Buffer::zeros(dims.state_shape());

        self.dispatch(
            inputs,
            dims,
            hidden.data_mut(),
            cell.data_mut(),
            last_cell.data_mut(),
        )?;

        Ok(ScanOutput {
            hidden,
            cell,
            last_cell,
        })
    }

    /// Scan every column into caller-allocated outputs.
    ///
    /// Output lengths are checked together with the inputs; nothing is
    /// written unless every check passes.
    pub fn scan_into(
        &self,
        inputs: &ScanInputs<'_>,
        out: &mut ScanOutputMut<'_>,
    ) -> Result<SruDims> {
        let dims = validate(inputs)?;
        out.check(dims)?;
        self.dispatch(inputs, dims, out.hidden, out.cell, out.last_cell)?;
        Ok(dims)
    }

    fn dispatch(
        &self,
        inputs: &ScanInputs<'_>,
        dims: SruDims,
        hidden: &mut [f32],
        cell: &mut [f32],
        last_cell: &mut [f32],
    ) -> Result<()> {
        let c0 = inputs.c0.as_ref().map(|c| c.data());

        tracing::debug!(
            "sru scan: {} columns={} device={} tanh={} chained={}",
            dims,
            dims.columns(),
            self.config.device,
            self.config.use_tanh,
            c0.is_some(),
        );

        // Nothing to scan: answered on the host, the backend is never set up.
        if dims.time == 0 || dims.columns() == 0 {
            match c0 {
                Some(c0) => last_cell.copy_from_slice(c0),
                None => last_cell.fill(0.0),
            }
            return Ok(());
        }

        let runtime = self.runtime()?;

        match self.config.device {
            Device::Cpu => {
                let mut run = || {
                    cpu_scan::sru_forward_f32(
                        inputs.x.data(),
                        inputs.u.data(),
                        inputs.bias.data(),
                        c0,
                        dims,
                        self.nonlinearity(),
                        hidden,
                        cell,
                        last_cell,
                        self.config.min_parallel_columns,
                    )
                };
                match &runtime.pool {
                    Some(pool) => pool.install(run),
                    None => run(),
                }
            }
            Device::Cuda(idx) => self.dispatch_cuda(idx, inputs, dims, hidden, cell, last_cell),
        }
    }

    #[cfg(feature = "cuda")]
    fn dispatch_cuda(
        &self,
        device_idx: usize,
        inputs: &ScanInputs<'_>,
        dims: SruDims,
        hidden: &mut [f32],
        cell: &mut [f32],
        last_cell: &mut [f32],
    ) -> Result<()> {
        let out = sru_kernels::cuda::ops::sru_forward_cuda(
            device_idx,
            inputs.x.data(),
            inputs.u.data(),
            inputs.bias.data(),
            inputs.c0.as_ref().map(|c| c.data()),
            dims,
            self.config.use_tanh,
            self.config.block_size,
        )?;
        hidden.copy_from_slice(&out.hidden);
        cell.copy_from_slice(&out.cell);
        last_cell.copy_from_slice(&out.last_cell);
        Ok(())
    }

    #[cfg(not(feature = "cuda"))]
    fn dispatch_cuda(
        &self,
        device_idx: usize,
        _inputs: &ScanInputs<'_>,
        _dims: SruDims,
        _hidden: &mut [f32],
        _cell: &mut [f32],
        _last_cell: &mut [f32],
    ) -> Result<()> {
        Err(cuda_not_built(device_idx))
    }
}

fn build_runtime(config: &ScanConfig) -> Result<Runtime> {
    match config.device {
        Device::Cpu => {
            let pool = match config.num_threads {
                Some(n) => Some(
                    rayon::ThreadPoolBuilder::new()
                        .num_threads(n)
                        .thread_name(|i| format!("sru-scan-{i}"))
                        .build()
                        .map_err(|e| {
                            SruError::UnsupportedBackend(format!("cpu thread pool: {e}"))
                        })?,
                ),
                None => None,
            };
            let threads = pool
                .as_ref()
                .map_or_else(rayon::current_num_threads, |p| p.current_num_threads());
            tracing::info!("SRU CPU runtime ready ({} worker threads)", threads);
            Ok(Runtime { pool })
        }
        Device::Cuda(idx) => init_cuda(idx).map(|()| Runtime { pool: None }),
    }
}

#[cfg(feature = "cuda")]
fn init_cuda(device_idx: usize) -> Result<()> {
    use sru_kernels::cuda::{context::get_device, ops::load_sru_module};

    let dev = get_device(device_idx)?;
    load_sru_module(&dev, device_idx)?;
    tracing::info!("SRU CUDA runtime ready on cuda:{}", device_idx);
    Ok(())
}

#[cfg(not(feature = "cuda"))]
fn init_cuda(device_idx: usize) -> Result<()> {
    Err(cuda_not_built(device_idx))
}

#[cfg(not(feature = "cuda"))]
fn cuda_not_built(device_idx: usize) -> SruError {
    SruError::UnsupportedBackend(format!(
        "cuda:{device_idx} requested but sru-engine was built without the `cuda` feature"
    ))
}
