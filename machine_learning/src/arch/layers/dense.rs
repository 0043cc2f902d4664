use ndarray::{linalg, prelude::*};

use crate::{MlErr, Result, arch::activations::ActFn};

/// A fully connected layer, `act_fn(x · W + b)`.
///
/// The layer doesn't own its parameters, they are handed to it on each pass as a raw slice
/// holding the kernel (row-major, `dim.0` rows by `dim.1` columns) followed by the bias.
#[derive(Clone, Debug, PartialEq)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The input and output widths.
    /// * `act_fn` - An optional activation applied to the weighted sums.
    ///
    /// # Returns
    /// A new `Dense` instance.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    pub fn act_fn(&self) -> Option<ActFn> {
        self.act_fn
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Makes a forward pass through the layer.
    ///
    /// # Arguments
    /// * `params` - This layer's parameter slice.
    /// * `x` - A batch of samples, one per row.
    ///
    /// # Returns
    /// The activations for the batch or an error if the input width is wrong.
    pub fn forward(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense input width",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        let mut z = Array2::zeros((x.nrows(), self.dim.1));
        linalg::general_mat_mul(1.0, &x, &w, 0.0, &mut z);
        z += &b;

        if let Some(act_fn) = &self.act_fn {
            act_fn.apply(&mut z);
        }

        Ok(z)
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    ///
    /// # Arguments
    /// * `params` - A slice of parameters.
    ///
    /// # Returns
    /// A tuple containing the weights and biases.
    pub fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        if params.len() != self.size {
            return Err(MlErr::SizeMismatch {
                what: "dense parameters",
                got: params.len(),
                expected: self.size,
            });
        }

        let w_size = self.size - self.dim.1;
        let weights = ArrayView2::from_shape(self.dim, &params[..w_size])?;
        let biases = ArrayView1::from_shape(self.dim.1, &params[w_size..])?;
        Ok((weights, biases))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affine_then_relu() {
        let dense = Dense::new((2, 3), Some(ActFn::relu()));
        let params = [
            1., 0., -1., // w row 0
            0., 1., -1., // w row 1
            0.5, -3., 0., // b
        ];
        let x = array![[1., 2.]];

        let y = dense.forward(&params, x.view()).unwrap();
        assert_eq!(y, array![[1.5, 0., 0.]]);
    }

    #[test]
    fn rejects_wrong_input_width() {
        let dense = Dense::new((2, 1), None);
        let x = array![[1., 2., 3.]];

        let err = dense.forward(&[0.; 3], x.view()).unwrap_err();
        assert!(matches!(err, MlErr::SizeMismatch { got: 3, expected: 2, .. }));
    }

    #[test]
    fn rejects_short_params() {
        let dense = Dense::new((2, 2), None);
        assert!(dense.view_params(&[0.; 5]).is_err());
    }
}
