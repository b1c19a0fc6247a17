//! Scan inputs, outputs and shape validation.

use sru_core::{Buffer, BufferView, Result, SruDims, SruError};

/// Borrowed inputs of one scan.
///
/// - `x`: raw input, (batch, feature, time)
/// - `u`: pre-activations, (batch, feature, time, 3), planes update / forget / reset
/// - `bias`: (2, feature), forget bias row then reset bias row
/// - `c0`: carried cell state, (batch, feature); zeros when `None`
#[derive(Debug, Clone)]
pub struct ScanInputs<'a> {
    pub x: BufferView<'a>,
    pub u: BufferView<'a>,
    pub bias: BufferView<'a>,
    pub c0: Option<BufferView<'a>>,
}

impl<'a> ScanInputs<'a> {
    /// Inputs for a fresh recurrence (zero initial state).
    pub fn new(x: BufferView<'a>, u: BufferView<'a>, bias: BufferView<'a>) -> Self {
        Self {
            x,
            u,
            bias,
            c0: None,
        }
    }

    /// Continue from a previous call's final cell state.
    pub fn with_initial_state(mut self, c0: BufferView<'a>) -> Self {
        self.c0 = Some(c0);
        self
    }

    /// Validated extents, see [`validate`].
    pub fn dims(&self) -> Result<SruDims> {
        validate(self)
    }
}

/// Check every buffer against the extents implied by `x`.
///
/// Runs before any column is touched, so a bad call produces no output.
pub fn validate(inputs: &ScanInputs<'_>) -> Result<SruDims> {
    let x = inputs.x.dims();
    if x.len() != 3 {
        return Err(SruError::shape("x rank", &[3], &[x.len()]));
    }
    let dims = SruDims::new(x[0], x[1], x[2]);
    // a zero-length time axis lets `x` hold any batch and feature
    if dims.checked_columns().is_none() {
        return Err(SruError::shape("columns", &[usize::MAX], &x[..2]));
    }

    let expected = dims.gate_shape();
    if inputs.u.shape() != &expected {
        return Err(SruError::shape("u", expected.dims(), inputs.u.dims()));
    }

    let expected = dims.bias_shape();
    if inputs.bias.shape() != &expected {
        return Err(SruError::shape("bias", expected.dims(), inputs.bias.dims()));
    }

    if let Some(c0) = &inputs.c0 {
        let expected = dims.state_shape();
        if c0.shape() != &expected {
            return Err(SruError::shape("c0", expected.dims(), c0.dims()));
        }
    }

    Ok(dims)
}

/// Owned outputs of one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutput {
    /// Hidden states, (batch, feature, time).
    pub hidden: Buffer,
    /// Cell states, (batch, feature, time).
    pub cell: Buffer,
    /// Cell state after the last step, (batch, feature). Pass it as the
    /// next call's initial state to continue the sequence.
    pub last_cell: Buffer,
}

/// Caller-allocated output slices for [`crate::RecurrenceEngine::scan_into`].
#[derive(Debug)]
pub struct ScanOutputMut<'a> {
    pub hidden: &'a mut [f32],
    pub cell: &'a mut [f32],
    pub last_cell: &'a mut [f32],
}

impl ScanOutputMut<'_> {
    pub(crate) fn check(&self, dims: SruDims) -> Result<()> {
        let seq = dims.seq_shape().numel();
        if self.hidden.len() != seq {
            return Err(SruError::shape("hidden", &[seq], &[self.hidden.len()]));
        }
        if self.cell.len() != seq {
            return Err(SruError::shape("cell", &[seq], &[self.cell.len()]));
        }
        if self.last_cell.len() != dims.columns() {
            return Err(SruError::shape(
                "last_cell",
                &[dims.columns()],
                &[self.last_cell.len()],
            ));
        }
        Ok(())
    }
}
