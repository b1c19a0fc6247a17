//! Gate and cell activations on scalars.
//!
//! Plain `f32` arithmetic with no fast approximations, so CPU and GPU
//! results agree to rounding.

/// Sigmoid: 1 / (1 + exp(-x))
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Saturating squash of the cell state into (-1, 1).
#[inline]
pub fn squash(x: f32) -> f32 {
    x.tanh()
}

/// Transform applied to the cell state before it mixes into the hidden state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Nonlinearity {
    /// g = c
    Identity,
    /// g = tanh(c)
    #[default]
    Tanh,
}

impl Nonlinearity {
    pub fn from_use_tanh(use_tanh: bool) -> Self {
        if use_tanh {
            Nonlinearity::Tanh
        } else {
            Nonlinearity::Identity
        }
    }

    pub fn is_saturating(&self) -> bool {
        matches!(self, Nonlinearity::Tanh)
    }

    #[inline]
    pub fn apply(&self, c: f32) -> f32 {
        match self {
            Nonlinearity::Identity => c,
            Nonlinearity::Tanh => squash(c),
        }
    }
}
