use ndarray::{ArrayD, Ix2};

use super::{Dense, Dropout, Flatten};
use crate::{Result, arch::activations::ActFn};

#[derive(Clone, Debug, PartialEq)]
pub enum Layer {
    Flatten(Flatten),
    Dense(Dense),
    Dropout(Dropout),
}

impl Layer {
    pub fn flatten() -> Self {
        Self::Flatten(Flatten::new())
    }

    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self::Dense(Dense::new(dim, act_fn))
    }

    pub fn dropout(rate: f32) -> Result<Self> {
        Ok(Self::Dropout(Dropout::new(rate)?))
    }

    /// Returns the amount of parameters this layer consumes.
    pub fn size(&self) -> usize {
        match self {
            Self::Dense(l) => l.size(),
            Self::Flatten(_) | Self::Dropout(_) => 0,
        }
    }

    pub fn forward(&self, params: &[f32], x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        match self {
            Self::Flatten(l) => l.forward(x),
            Self::Dense(l) => {
                let x = x.into_dimensionality::<Ix2>()?;
                Ok(l.forward(params, x.view())?.into_dyn())
            }
            Self::Dropout(l) => Ok(l.forward(x)),
        }
    }
}
