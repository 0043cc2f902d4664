use ndarray::{Array2, ArrayViewD, Ix2};

use super::layers::Layer;
use crate::{MlErr, Result};

/// A sequential model: information flows forward through its layers, each one consuming its
/// own slice of a flat parameter buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns the amount of parameters in the model.
    pub fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    /// Makes a forward pass through the network.
    ///
    /// # Arguments
    /// * `params` - The model's parameters, laid out layer after layer.
    /// * `x` - The input batch, the first axis indexing samples.
    ///
    /// # Returns
    /// The prediction for the given input, one row per sample, or an error if occurred.
    pub fn forward(&self, params: &[f32], x: ArrayViewD<f32>) -> Result<Array2<f32>> {
        let size = self.size();
        if params.len() != size {
            return Err(MlErr::SizeMismatch {
                what: "model parameters",
                got: params.len(),
                expected: size,
            });
        }

        let mut front = Front::new(params);
        let mut x = x.to_owned();

        for layer in &self.layers {
            let params = front.next(layer.size()).ok_or(MlErr::SizeMismatch {
                what: "model parameters",
                got: params.len(),
                expected: size,
            })?;

            x = layer.forward(params, x)?;
        }

        Ok(x.into_dimensionality::<Ix2>()?)
    }
}

/// Hands out consecutive slices of a parameter buffer.
struct Front<'a> {
    rest: &'a [f32],
}

impl<'a> Front<'a> {
    fn new(params: &'a [f32]) -> Self {
        Self { rest: params }
    }

    fn next(&mut self, n: usize) -> Option<&'a [f32]> {
        if n > self.rest.len() {
            return None;
        }

        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        Some(head)
    }
}
