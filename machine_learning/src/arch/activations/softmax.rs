use ndarray::{ArrayViewMut, Axis, Dimension};

/// Normalizes every lane along an axis into a probability distribution.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Softmax;

impl Softmax {
    pub fn new() -> Self {
        Self
    }

    /// Applies the softmax in place over each lane of `z` along `axis`.
    ///
    /// The lane maximum is subtracted before exponentiating so large logits don't overflow.
    ///
    /// # Arguments
    /// * `z` - The logits, overwritten with the probabilities.
    /// * `axis` - The axis the distribution lies on.
    pub fn apply<D: Dimension>(&self, mut z: ArrayViewMut<'_, f32, D>, axis: Axis) {
        for mut lane in z.lanes_mut(axis) {
            let max = lane.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            lane.mapv_inplace(|v| (v - max).exp());

            let sum = lane.sum();
            lane.mapv_inplace(|v| v / sum);
        }
    }
}
