//! Contiguous f32 buffers tagged with a shape.
//!
//! `Buffer` owns its data, `BufferView` borrows it. Both guarantee
//! `data.len() == shape.numel()` at construction.

use crate::{Result, Shape, SruError};

/// Owned row-major f32 buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer {
    data: Vec<f32>,
    shape: Shape,
}

impl Buffer {
    /// Wrap `data`, checking its length against `shape`.
    pub fn new(data: Vec<f32>, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        check_data_len(&shape, data.len())?;
        Ok(Self { data, shape })
    }

    /// Copy a slice into a new buffer of the given dims.
    pub fn from_f32(data: &[f32], dims: &[usize]) -> Result<Self> {
        Self::new(data.to_vec(), Shape::new(dims))
    }

    /// Zero-filled buffer.
    pub fn zeros(shape: impl Into<Shape>) -> Self {
        let shape = shape.into();
        Self {
            data: vec![0.0; shape.numel()],
            shape,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Borrow as a view.
    pub fn view(&self) -> BufferView<'_> {
        BufferView {
            data: &self.data,
            shape: self.shape.clone(),
        }
    }
}

/// Borrowed row-major f32 buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferView<'a> {
    data: &'a [f32],
    shape: Shape,
}

impl<'a> BufferView<'a> {
    /// Borrow `data` as `dims`, checking the length.
    pub fn new(data: &'a [f32], dims: &[usize]) -> Result<Self> {
        let shape = Shape::new(dims);
        check_data_len(&shape, data.len())?;
        Ok(Self { data, shape })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn data(&self) -> &'a [f32] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_buffer(&self) -> Buffer {
        Buffer {
            data: self.data.to_vec(),
            shape: self.shape.clone(),
        }
    }

    /// Copy steps `start..start + len` out of a (batch, feature, time, ...)
    /// buffer. Axis 2 is time; any trailing axes travel with each step.
    pub fn slice_time(&self, start: usize, len: usize) -> Result<Buffer> {
        let dims = self.shape.dims();
        if dims.len() < 3 {
            return Err(SruError::shape("time-major buffer", &[0, 0, 0], dims));
        }
        let time = dims[2];
        let end = start
            .checked_add(len)
            .filter(|&end| end <= time)
            .ok_or_else(|| SruError::shape("time window", &[time], &[start.saturating_add(len)]))?;

        let columns = column_count(dims)?;
        let inner = Shape::new(&dims[3..]).numel();
        let mut data = Vec::with_capacity(columns.saturating_mul(len).saturating_mul(inner));
        for col in 0..columns {
            let base = col * time * inner;
            data.extend_from_slice(&self.data[base + start * inner..base + end * inner]);
        }

        let mut out_dims = dims.to_vec();
        out_dims[2] = len;
        Ok(Buffer {
            data,
            shape: Shape::from(out_dims),
        })
    }
}

fn check_data_len(shape: &Shape, len: usize) -> Result<()> {
    let numel = shape
        .checked_numel()
        .ok_or_else(|| SruError::shape("buffer extent", &[usize::MAX], shape.dims()))?;
    if len != numel {
        return Err(SruError::shape("buffer", &[numel], &[len]));
    }
    Ok(())
}

/// Number of columns of a (batch, feature, ...) buffer.
fn column_count(dims: &[usize]) -> Result<usize> {
    dims[0]
        .checked_mul(dims[1])
        .ok_or_else(|| SruError::shape("columns", &[usize::MAX], &dims[..2]))
}

/// Concatenate (batch, feature, time, ...) buffers along the time axis.
///
/// All parts must agree on every axis except time.
pub fn concat_time(parts: &[Buffer]) -> Result<Buffer> {
    let first = parts
        .first()
        .ok_or_else(|| SruError::shape("time chunks", &[1], &[0]))?;
    let dims = first.dims();
    if dims.len() < 3 {
        return Err(SruError::shape("time-major buffer", &[0, 0, 0], dims));
    }

    let mut total_time = 0usize;
    for p in parts {
        let pd = p.dims();
        if pd.len() != dims.len() || pd[..2] != dims[..2] || pd[3..] != dims[3..] {
            let mut expected = dims.to_vec();
            if pd.len() == dims.len() {
                expected[2] = pd[2];
            }
            return Err(SruError::shape("time chunk", &expected, pd));
        }
        total_time = total_time
            .checked_add(pd[2])
            .ok_or_else(|| SruError::shape("time chunks", &[usize::MAX], &[total_time, pd[2]]))?;
    }

    let columns = column_count(dims)?;
    let inner = Shape::new(&dims[3..]).numel();
    let total: usize = parts.iter().map(Buffer::len).sum();
    let mut data = Vec::with_capacity(total);
    for col in 0..columns {
        for p in parts {
            let run = p.dims()[2] * inner;
            data.extend_from_slice(&p.data[col * run..(col + 1) * run]);
        }
    }

    let mut out_dims = dims.to_vec();
    out_dims[2] = total_time;
    Ok(Buffer {
        data,
        shape: Shape::from(out_dims),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iota(n: usize) -> Vec<f32> {
        (0..n).map(|i| i as f32).collect()
    }

    #[test]
    fn test_new_checks_len() {
        assert!(Buffer::new(vec![0.0; 6], [2, 3]).is_ok());
        let err = Buffer::new(vec![0.0; 5], [2, 3]).unwrap_err();
        assert_eq!(err, SruError::shape("buffer", &[6], &[5]));
        assert!(BufferView::new(&[1.0, 2.0], &[3]).is_err());
    }

    #[test]
    fn test_new_rejects_overflowing_extent() {
        let err = BufferView::new(&[], &[usize::MAX, 2, 1]).unwrap_err();
        assert_eq!(err, SruError::shape("buffer extent", &[usize::MAX], &[usize::MAX, 2, 1]));
        assert!(Buffer::new(vec![], [usize::MAX, 4]).is_err());

        // a zero extent keeps the count at 0
        let v = BufferView::new(&[], &[usize::MAX, 2, 0]).unwrap();
        assert!(v.is_empty());
        assert!(matches!(
            v.slice_time(0, 0),
            Err(SruError::ShapeMismatch { name: "columns", .. })
        ));
    }

    #[test]
    fn test_zeros_and_view() {
        let b = Buffer::zeros([2, 0, 4]);
        assert!(b.is_empty());
        assert_eq!(b.view().dims(), &[2, 0, 4]);
    }

    #[test]
    fn test_slice_time_rank3() {
        // 2 columns, 4 steps
        let data = iota(8);
        let v = BufferView::new(&data, &[1, 2, 4]).unwrap();
        let s = v.slice_time(1, 2).unwrap();
        assert_eq!(s.dims(), &[1, 2, 2]);
        assert_eq!(s.data(), &[1.0, 2.0, 5.0, 6.0]);
    }

    #[test]
    fn test_slice_time_rank4_keeps_gate_planes() {
        let data = iota(12); // 1x2 columns, 2 steps, 3 planes
        let v = BufferView::new(&data, &[1, 2, 2, 3]).unwrap();
        let s = v.slice_time(1, 1).unwrap();
        assert_eq!(s.dims(), &[1, 2, 1, 3]);
        assert_eq!(s.data(), &[3.0, 4.0, 5.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn test_slice_time_out_of_range() {
        let data = iota(8);
        let v = BufferView::new(&data, &[1, 2, 4]).unwrap();
        assert!(v.slice_time(3, 2).is_err());
        assert!(v.slice_time(usize::MAX, 2).is_err());
        assert_eq!(v.slice_time(4, 0).unwrap().len(), 0);
    }

    #[test]
    fn test_concat_time_inverts_slice() {
        let data = iota(2 * 3 * 5);
        let v = BufferView::new(&data, &[2, 3, 5]).unwrap();
        let parts = vec![
            v.slice_time(0, 2).unwrap(),
            v.slice_time(2, 0).unwrap(),
            v.slice_time(2, 3).unwrap(),
        ];
        let joined = concat_time(&parts).unwrap();
        assert_eq!(joined, v.to_buffer());
    }

    #[test]
    fn test_concat_time_rejects_mismatch() {
        let a = Buffer::zeros([1, 2, 3]);
        let b = Buffer::zeros([1, 3, 3]);
        assert!(concat_time(&[a, b]).is_err());
        assert!(concat_time(&[]).is_err());
    }
}
