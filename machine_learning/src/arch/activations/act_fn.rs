use ndarray::{Array2, Axis};

use super::{Relu, Softmax};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ActFn {
    Relu(Relu),
    Softmax(Softmax),
}

impl ActFn {
    pub fn relu() -> Self {
        Self::Relu(Relu::new())
    }

    pub fn softmax() -> Self {
        Self::Softmax(Softmax::new())
    }

    /// Applies the activation in place over a batch of weighted sums, one sample per row.
    pub fn apply(&self, z: &mut Array2<f32>) {
        match self {
            Self::Relu(a) => z.mapv_inplace(|z| a.f(z)),
            Self::Softmax(a) => a.apply(z.view_mut(), Axis(1)),
        }
    }
}
