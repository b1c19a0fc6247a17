//! SRU forward scan on CPU.
//!
//! Each (batch, feature) column owns a contiguous run of `time` steps in
//! X, C and H (and `3 * time` in U), so columns map onto disjoint
//! `chunks_mut` of the outputs. Columns fan out over rayon; a column's
//! time loop always runs on one worker, in increasing `t`.

use rayon::prelude::*;

use sru_core::{SruDims, SruError};

use crate::activation::{sigmoid, Nonlinearity};

/// Default number of columns below which the scan stays on the calling thread.
pub const PAR_COLUMN_THRESHOLD: usize = 64;

/// Scan one column over its whole time axis.
///
/// - `x`: raw input, length `time`
/// - `u`: interleaved `[z, f, r]` pre-activations, length `3 * time`
/// - `bias_f`, `bias_r`: this column's forget and reset biases
/// - `c0`: carried cell state
/// - `h`, `c`: outputs, length `time`
///
/// Returns the cell state after the last step (`c0` when `time == 0`).
///
/// Slice lengths must agree; debug builds assert it.
#[allow(clippy::too_many_arguments)]
#[inline]
pub fn sru_scan_column(
    x: &[f32],
    u: &[f32],
    bias_f: f32,
    bias_r: f32,
    c0: f32,
    nonlin: Nonlinearity,
    h: &mut [f32],
    c: &mut [f32],
) -> f32 {
    debug_assert_eq!(u.len(), SruDims::GATES * x.len(), "u must hold 3 planes per step");
    debug_assert_eq!(h.len(), x.len(), "hidden run length");
    debug_assert_eq!(c.len(), x.len(), "cell run length");

    let mut ct = c0;
    let steps = x
        .iter()
        .zip(u.chunks_exact(SruDims::GATES))
        .zip(h.iter_mut().zip(c.iter_mut()));

    for ((&xt, gates), (ht, c_out)) in steps {
        let zt = gates[0];
        let ft = sigmoid(gates[1] + bias_f);
        let rt = sigmoid(gates[2] + bias_r);

        ct = ft * (ct - zt) + zt;
        *c_out = ct;

        let g = nonlin.apply(ct);
        *ht = rt * (g - xt) + xt;
    }
    ct
}

/// Forward scan over every column of a (batch, feature, time) problem.
///
/// - `x`: (batch, feature, time)
/// - `u`: (batch, feature, time, 3)
/// - `bias`: (2, feature), forget row then reset row
/// - `c0`: (batch, feature), zeros when `None`
/// - `hidden`, `cell`: (batch, feature, time) outputs
/// - `last_cell`: (batch, feature) output
///
/// Runs inside whatever rayon pool the caller installs.
#[allow(clippy::too_many_arguments)]
pub fn sru_forward_f32(
    x: &[f32],
    u: &[f32],
    bias: &[f32],
    c0: Option<&[f32]>,
    dims: SruDims,
    nonlin: Nonlinearity,
    hidden: &mut [f32],
    cell: &mut [f32],
    last_cell: &mut [f32],
    min_parallel_columns: usize,
) -> Result<(), SruError> {
    check_len("x", x, dims.seq_shape().numel())?;
    check_len("u", u, dims.gate_shape().numel())?;
    check_len("bias", bias, dims.bias_shape().numel())?;
    if let Some(c0) = c0 {
        check_len("c0", c0, dims.columns())?;
    }
    check_len("hidden", hidden, dims.seq_shape().numel())?;
    check_len("cell", cell, dims.seq_shape().numel())?;
    check_len("last_cell", last_cell, dims.columns())?;

    let time = dims.time;
    if time == 0 {
        match c0 {
            Some(c0) => last_cell.copy_from_slice(c0),
            None => last_cell.fill(0.0),
        }
        return Ok(());
    }

    let feature = dims.feature;
    let (bias_f, bias_r) = bias.split_at(feature);
    let gate_run = time * SruDims::GATES;

    let run_column = |col: usize, h_col: &mut [f32], c_col: &mut [f32], last: &mut f32| {
        let f = col % feature;
        *last = sru_scan_column(
            &x[col * time..(col + 1) * time],
            &u[col * gate_run..(col + 1) * gate_run],
            bias_f[f],
            bias_r[f],
            c0.map_or(0.0, |c0| c0[col]),
            nonlin,
            h_col,
            c_col,
        );
    };

    if dims.columns() >= min_parallel_columns {
        hidden
            .par_chunks_mut(time)
            .zip(cell.par_chunks_mut(time))
            .zip(last_cell.par_iter_mut())
            .enumerate()
            .for_each(|(col, ((h_col, c_col), last))| run_column(col, h_col, c_col, last));
    } else {
        hidden
            .chunks_mut(time)
            .zip(cell.chunks_mut(time))
            .zip(last_cell.iter_mut())
            .enumerate()
            .for_each(|(col, ((h_col, c_col), last))| run_column(col, h_col, c_col, last));
    }

    Ok(())
}

fn check_len(name: &'static str, data: &[f32], expected: usize) -> Result<(), SruError> {
    if data.len() != expected {
        return Err(SruError::shape(name, &[expected], &[data.len()]));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &[f32], b: &[f32], tol: f32) {
        assert_eq!(a.len(), b.len(), "length mismatch: {} vs {}", a.len(), b.len());
        for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
            assert!((x - y).abs() < tol, "element {i} differs: {x} vs {y} (tol={tol})");
        }
    }

    struct Problem {
        dims: SruDims,
        x: Vec<f32>,
        u: Vec<f32>,
        bias: Vec<f32>,
        c0: Vec<f32>,
    }

    fn problem(batch: usize, feature: usize, time: usize) -> Problem {
        let dims = SruDims::new(batch, feature, time);
        let wave = |i: usize, k: usize| ((i * k + 3) % 17) as f32 * 0.125 - 1.0;
        Problem {
            dims,
            x: (0..dims.seq_shape().numel()).map(|i| wave(i, 7)).collect(),
            u: (0..dims.gate_shape().numel()).map(|i| wave(i, 5)).collect(),
            bias: (0..2 * feature).map(|i| wave(i, 3) * 0.5).collect(),
            c0: (0..dims.columns()).map(|i| wave(i, 11) * 0.25).collect(),
        }
    }

    type Outputs = (Vec<f32>, Vec<f32>, Vec<f32>);

    fn run(p: &Problem, c0: Option<&[f32]>, nonlin: Nonlinearity, threshold: usize) -> Outputs {
        let n = p.dims.seq_shape().numel();
        let mut h = vec![f32::NAN; n];
        let mut c = vec![f32::NAN; n];
        let mut last = vec![f32::NAN; p.dims.columns()];
        sru_forward_f32(
            &p.x,
            &p.u,
            &p.bias,
            c0,
            p.dims,
            nonlin,
            &mut h,
            &mut c,
            &mut last,
            threshold,
        )
        .unwrap();
        (h, c, last)
    }

    #[test]
    fn test_column_matches_hand_computation() {
        // one step: z=0.5, f=0, r=0, bf=0, br=0 -> ft=rt=0.5
        let mut h = [0.0];
        let mut c = [0.0];
        let last = sru_scan_column(
            &[1.0],
            &[0.5, 0.0, 0.0],
            0.0,
            0.0,
            2.0,
            Nonlinearity::Identity,
            &mut h,
            &mut c,
        );
        // c = 0.5 * (2.0 - 0.5) + 0.5 = 1.25
        assert_eq!(c[0], 1.25);
        assert_eq!(last, 1.25);
        // h = 0.5 * (1.25 - 1.0) + 1.0 = 1.125
        assert_eq!(h[0], 1.125);
    }

    fn step_tanh(u: [f32; 3]) -> (f32, f32) {
        let mut h = [0.0];
        let mut c = [0.0];
        sru_scan_column(&[0.0], &u, 0.0, 0.0, 0.0, Nonlinearity::Tanh, &mut h, &mut c);
        (h[0], c[0])
    }

    #[test]
    fn test_column_applies_tanh_to_hidden_only() {
        // ft -> 0 so c = z = 0; rt -> 1 so h = tanh(c)
        let (h, c) = step_tanh([0.0, -100.0, 100.0]);
        assert_eq!(c, 0.0);
        assert_eq!(h, 0.0);

        let (h, c) = step_tanh([3.0, -100.0, 100.0]);
        assert_eq!(c, 3.0);
        assert_close(&[h], &[3.0f32.tanh()], 1e-6);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "cell run length")]
    fn test_column_rejects_short_output_run() {
        let mut h = [0.0; 2];
        let mut c = [0.0; 1];
        sru_scan_column(
            &[0.1, 0.2],
            &[0.0; 6],
            0.0,
            0.0,
            0.0,
            Nonlinearity::Identity,
            &mut h,
            &mut c,
        );
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "u must hold 3 planes per step")]
    fn test_column_rejects_short_gate_run() {
        let mut h = [0.0; 2];
        let mut c = [0.0; 2];
        sru_scan_column(
            &[0.1, 0.2],
            &[0.0; 5],
            0.0,
            0.0,
            0.0,
            Nonlinearity::Identity,
            &mut h,
            &mut c,
        );
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let p = problem(3, 40, 9);
        for nonlin in [Nonlinearity::Identity, Nonlinearity::Tanh] {
            let seq = run(&p, Some(&p.c0), nonlin, usize::MAX);
            let par = run(&p, Some(&p.c0), nonlin, 1);
            assert_eq!(seq, par);
        }
    }

    #[test]
    fn test_last_cell_is_final_step() {
        let p = problem(2, 3, 5);
        let (_, c, last) = run(&p, None, Nonlinearity::Tanh, PAR_COLUMN_THRESHOLD);
        for col in 0..p.dims.columns() {
            assert_eq!(last[col], c[col * 5 + 4]);
        }
    }

    #[test]
    fn test_bias_rows_broadcast_over_batch() {
        // identical inputs in both batch entries -> identical outputs
        let mut p = problem(2, 4, 6);
        let half_x = p.x.len() / 2;
        let half_u = p.u.len() / 2;
        let (a, b) = p.x.split_at_mut(half_x);
        b.copy_from_slice(a);
        let (a, b) = p.u.split_at_mut(half_u);
        b.copy_from_slice(a);

        let (h, c, _) = run(&p, None, Nonlinearity::Tanh, 1);
        assert_eq!(h[..half_x], h[half_x..]);
        assert_eq!(c[..half_x], c[half_x..]);
    }

    #[test]
    fn test_zero_time_copies_initial_state() {
        let p = problem(2, 3, 0);
        let (h, c, last) = run(&p, Some(&p.c0), Nonlinearity::Tanh, 1);
        assert!(h.is_empty());
        assert!(c.is_empty());
        assert_eq!(last, p.c0);

        let (_, _, last) = run(&p, None, Nonlinearity::Tanh, 1);
        assert_eq!(last, vec![0.0; 6]);
    }

    #[test]
    fn test_zero_columns() {
        let p = problem(0, 4, 5);
        let (h, c, last) = run(&p, None, Nonlinearity::Identity, 1);
        assert!(h.is_empty() && c.is_empty() && last.is_empty());

        let p = problem(3, 0, 5);
        let (h, _, last) = run(&p, None, Nonlinearity::Identity, 1);
        assert!(h.is_empty() && last.is_empty());
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let p = problem(1, 2, 3);
        let mut h = vec![0.0; 6];
        let mut c = vec![0.0; 6];
        let mut last = vec![0.0; 2];
        let err = sru_forward_f32(
            &p.x,
            &p.u[..p.u.len() - 1],
            &p.bias,
            None,
            p.dims,
            Nonlinearity::Identity,
            &mut h,
            &mut c,
            &mut last,
            1,
        )
        .unwrap_err();
        assert_eq!(err, SruError::shape("u", &[18], &[17]));
    }
}
