//! # sru-engine
//!
//! Forward pass of the Simple Recurrent Unit.
//!
//! Given pre-computed gate pre-activations `U` (update, forget, reset), a
//! per-feature bias pair and an optional carried cell state, the engine
//! scans every (batch, feature) column over time and returns the hidden
//! states, the cell states and the final cell state.
//!
//! The engine keeps no state between calls. Long sequences are processed
//! in pieces by feeding one call's `last_cell` into the next call's
//! initial state; `scan_chunked` and `SequenceState` do that bookkeeping
//! for the host.

pub mod config;
pub mod inputs;
pub mod engine;
pub mod chain;

pub use chain::{scan_chunked, SequenceState};
pub use config::ScanConfig;
pub use engine::RecurrenceEngine;
pub use inputs::{validate, ScanInputs, ScanOutput, ScanOutputMut};

pub use sru_core::{Buffer, BufferView, Device, Result, SruDims, SruError};
