//! Host-side state chaining.
//!
//! The engine never remembers anything between calls. Continuing a
//! sequence means passing the previous call's `last_cell` as the next
//! call's `c0`; these helpers do that for callers that process long
//! sequences in pieces.

use sru_core::{concat_time, Buffer, BufferView, Result};

use crate::engine::RecurrenceEngine;
use crate::inputs::{validate, ScanInputs, ScanOutput};

/// Scan `inputs` in time chunks of `chunk_len` steps, threading the cell
/// state from chunk to chunk.
///
/// Produces exactly the same outputs as a single `engine.scan(inputs)`.
/// A `chunk_len` of 0 is treated as "one chunk".
pub fn scan_chunked(
    engine: &RecurrenceEngine,
    inputs: &ScanInputs<'_>,
    chunk_len: usize,
) -> Result<ScanOutput> {
    let dims = validate(inputs)?;
    let chunk_len = if chunk_len == 0 {
        tracing::warn!("scan_chunked: chunk_len=0, scanning {} steps in one call", dims.time);
        dims.time
    } else {
        chunk_len
    };
    if dims.time <= chunk_len {
        return engine.scan(inputs);
    }

    let num_chunks = dims.time.div_ceil(chunk_len);
    tracing::debug!("scan_chunked: {} in {} chunks of <= {} steps", dims, num_chunks, chunk_len);

    let mut carried: Option<Buffer> = inputs.c0.as_ref().map(BufferView::to_buffer);
    let mut hidden_parts = Vec::with_capacity(num_chunks);
    let mut cell_parts = Vec::with_capacity(num_chunks);

    let mut start = 0;
    while start < dims.time {
        let len = chunk_len.min(dims.time - start);
        let x = inputs.x.slice_time(start, len)?;
        let u = inputs.u.slice_time(start, len)?;

        let mut chunk = ScanInputs::new(x.view(), u.view(), inputs.bias.clone());
        if let Some(c) = &carried {
            chunk = chunk.with_initial_state(c.view());
        }
        let out = engine.scan(&chunk)?;

        hidden_parts.push(out.hidden);
        cell_parts.push(out.cell);
        carried = Some(out.last_cell);
        start += len;
    }

    Ok(ScanOutput {
        hidden: concat_time(&hidden_parts)?,
        cell: concat_time(&cell_parts)?,
        last_cell: carried.unwrap_or_else(|| Buffer::zeros(dims.state_shape())),
    })
}

/// Cell state carried by the host across successive scans of one stream.
///
/// Starts empty (zero initial state). Each `step` scans with the carried
/// state and replaces it with the new `last_cell`; `reset_state` starts a
/// new stream.
#[derive(Debug, Clone, Default)]
pub struct SequenceState {
    cell: Option<Buffer>,
}

impl SequenceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a known cell state, (batch, feature).
    pub fn from_cell(cell: Buffer) -> Self {
        Self { cell: Some(cell) }
    }

    /// The carried cell state, `None` before the first step.
    pub fn state(&self) -> Option<&Buffer> {
        self.cell.as_ref()
    }

    pub fn reset_state(&mut self) {
        self.cell = None;
    }

    /// Scan the next piece of the stream.
    ///
    /// On error the carried state is left untouched.
    pub fn step(
        &mut self,
        engine: &RecurrenceEngine,
        x: BufferView<'_>,
        u: BufferView<'_>,
        bias: BufferView<'_>,
    ) -> Result<ScanOutput> {
        let mut inputs = ScanInputs::new(x, u, bias);
        if let Some(c) = &self.cell {
            inputs = inputs.with_initial_state(c.view());
        }
        let out = engine.scan(&inputs)?;
        self.cell = Some(out.last_cell.clone());
        Ok(out)
    }
}
