use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewD};

use crate::{
    MlErr, Result,
    arch::{Sequential, layers::Layer},
    spec::{ActFnSpec, ModelSpec, dense_name},
};

/// A classifier ready for inference: its architecture together with the parameters of every
/// layer. It is never mutated once built.
#[derive(Clone, Debug)]
pub struct Classifier {
    spec: ModelSpec,
    net: Sequential,
    params: Vec<f32>,
}

/// A borrowed view of one dense layer's parameters.
#[derive(Debug)]
pub struct DenseParams<'a> {
    pub name: String,
    pub act_fn: Option<ActFnSpec>,
    pub kernel: ArrayView2<'a, f32>,
    pub bias: ArrayView1<'a, f32>,
}

impl Classifier {
    /// Creates a new `Classifier`.
    ///
    /// # Arguments
    /// * `spec` - The architecture.
    /// * `params` - Every dense layer's kernel followed by its bias, in layer order.
    ///
    /// # Returns
    /// A new `Classifier` or an error if the spec is invalid or the parameters don't fit it.
    pub fn new(spec: ModelSpec, params: Vec<f32>) -> Result<Self> {
        let net = spec.build()?;

        if params.len() != net.size() {
            return Err(MlErr::SizeMismatch {
                what: "classifier parameters",
                got: params.len(),
                expected: net.size(),
            });
        }

        Ok(Self { spec, net, params })
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// The shape of a single sample, without the batch axis.
    pub fn input_shape(&self) -> &[usize] {
        &self.spec.input_shape
    }

    pub fn num_classes(&self) -> usize {
        self.spec.num_classes().unwrap_or_default()
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// Returns a view over every dense layer's parameters, named after their position.
    pub fn dense_params(&self) -> Result<Vec<DenseParams<'_>>> {
        let mut params = &self.params[..];
        let mut dense = Vec::new();

        for layer in self.net.layers() {
            let Layer::Dense(l) = layer else {
                continue;
            };

            let (head, tail) = params.split_at(l.size());
            let (kernel, bias) = l.view_params(head)?;
            params = tail;

            dense.push(DenseParams {
                name: dense_name(dense.len()),
                act_fn: l.act_fn().map(Into::into),
                kernel,
                bias,
            });
        }

        Ok(dense)
    }

    /// Scores a batch of samples.
    ///
    /// # Arguments
    /// * `x` - The batch, its first axis indexing samples and the rest matching `input_shape`.
    ///
    /// # Returns
    /// One row of class scores per sample.
    pub fn predict(&self, x: ArrayViewD<f32>) -> Result<Array2<f32>> {
        if x.ndim() == 0 || x.shape()[1..] != self.spec.input_shape[..] {
            return Err(MlErr::InputShapeMismatch {
                got: x.shape().to_vec(),
                expected: self.spec.input_shape.clone(),
            });
        }

        self.net.forward(&self.params, x)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array, IxDyn};

    use super::*;
    use crate::spec::LayerSpec;

    fn tiny() -> ModelSpec {
        ModelSpec {
            name: "tiny".into(),
            input_shape: vec![2],
            layers: vec![
                LayerSpec::Dense {
                    dim: (2, 2),
                    act_fn: Some(ActFnSpec::Relu),
                },
                LayerSpec::Dropout { rate: 0.2 },
                LayerSpec::Dense {
                    dim: (2, 3),
                    act_fn: Some(ActFnSpec::Softmax),
                },
            ],
        }
    }

    #[test]
    fn rejects_params_that_dont_fit() {
        let err = Classifier::new(tiny(), vec![0.; 4]).unwrap_err();
        assert!(matches!(err, MlErr::SizeMismatch { got: 4, expected: 15, .. }));
    }

    #[test]
    fn exposes_named_dense_params() {
        let params: Vec<f32> = (0..15).map(|i| i as f32).collect();
        let classifier = Classifier::new(tiny(), params).unwrap();
        let dense = classifier.dense_params().unwrap();

        assert_eq!(dense.len(), 2);
        assert_eq!(dense[0].name, "dense");
        assert_eq!(dense[0].kernel.shape(), &[2, 2]);
        assert_eq!(dense[0].bias.to_vec(), [4., 5.]);
        assert_eq!(dense[1].name, "dense_1");
        assert_eq!(dense[1].kernel[[0, 0]], 6.);
        assert_eq!(dense[1].act_fn, Some(ActFnSpec::Softmax));
    }

    #[test]
    fn predict_checks_sample_shape() {
        let classifier = Classifier::new(tiny(), vec![0.; 15]).unwrap();

        let x = Array::zeros(IxDyn(&[4, 3]));
        assert!(matches!(
            classifier.predict(x.view()),
            Err(MlErr::InputShapeMismatch { .. })
        ));

        let x = Array::zeros(IxDyn(&[4, 2]));
        let y = classifier.predict(x.view()).unwrap();
        assert_eq!(y.shape(), &[4, 3]);
        assert!(y.iter().all(|&p| (p - 1. / 3.).abs() < 1e-6));
    }
}
