use ndarray::ArrayD;

use crate::{MlErr, Result};

/// Dropout as it behaves at inference: the identity. The rate is kept so the layer can be
/// described and serialized along with the rest of the model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dropout {
    rate: f32,
}

impl Dropout {
    /// Creates a new `Dropout` layer.
    ///
    /// # Arguments
    /// * `rate` - The probability of dropping an activation while training, within `[0, 1)`.
    ///
    /// # Returns
    /// A new `Dropout` instance or an error if the rate is out of range.
    pub fn new(rate: f32) -> Result<Self> {
        if !(0.0..1.0).contains(&rate) {
            return Err(MlErr::InvalidDropoutRate(rate));
        }

        Ok(Self { rate })
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn forward(&self, x: ArrayD<f32>) -> ArrayD<f32> {
        x
    }
}
