use ndarray::ArrayD;

use crate::Result;

/// Collapses every axis but the batch one, so each sample becomes a row.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Flatten;

impl Flatten {
    pub fn new() -> Self {
        Self
    }

    /// Returns the width of a flattened sample of the given shape.
    pub fn width(sample_shape: &[usize]) -> usize {
        sample_shape.iter().product()
    }

    pub fn forward(&self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        if x.ndim() == 2 {
            return Ok(x);
        }

        let batch = x.shape().first().copied().unwrap_or(1);
        let width = Self::width(x.shape().get(1..).unwrap_or_default());
        let x = x.as_standard_layout().into_owned();

        Ok(x.into_shape_with_order((batch, width))?.into_dyn())
    }
}
