use serde::{Deserialize, Serialize};

use crate::{
    MlErr, Result,
    arch::{
        Sequential,
        activations::ActFn,
        layers::{Flatten, Layer},
    },
};

/// The specification for the `ActFn` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnSpec {
    Relu,
    Softmax,
}

/// The specification for the `Layer` enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    Flatten,
    Dense {
        dim: (usize, usize),
        act_fn: Option<ActFnSpec>,
    },
    Dropout {
        rate: f32,
    },
}

/// The architecture of a classifier: the shape of a single sample and the ordered layers that
/// turn it into one score per class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub input_shape: Vec<usize>,
    pub layers: Vec<LayerSpec>,
}

/// Returns the name of the `i`-th dense layer, `dense`, `dense_1`, `dense_2` and so on.
pub fn dense_name(i: usize) -> String {
    match i {
        0 => "dense".to_string(),
        i => format!("dense_{i}"),
    }
}

impl ModelSpec {
    /// Checks that the layers chain: the flattened sample width feeds the first dense layer,
    /// each dense layer's input matches the previous output, and dropout rates are valid.
    ///
    /// # Returns
    /// An error describing the first inconsistency found.
    pub fn validate(&self) -> Result<()> {
        if self.input_shape.is_empty() || self.input_shape.contains(&0) {
            return Err(MlErr::InvalidSpec(format!(
                "input shape {:?} must be non-empty with positive dimensions",
                self.input_shape
            )));
        }

        let mut width = match self.input_shape[..] {
            [n] => Some(n),
            _ => None,
        };
        let mut ndense = 0;

        for (i, layer) in self.layers.iter().enumerate() {
            match *layer {
                LayerSpec::Flatten => {
                    if width.is_none() {
                        width = Some(Flatten::width(&self.input_shape));
                    }
                }
                LayerSpec::Dense { dim: (n, m), .. } => {
                    let Some(w) = width else {
                        return Err(MlErr::InvalidSpec(format!(
                            "layer {i}: dense layer applied to an unflattened input"
                        )));
                    };
                    if n == 0 || m == 0 {
                        return Err(MlErr::InvalidSpec(format!(
                            "layer {i}: dense dimensions ({n}, {m}) must be positive"
                        )));
                    }
                    if n != w {
                        return Err(MlErr::InvalidSpec(format!(
                            "layer {i}: input size ({n}) does not match \
                             previous layer output size ({w})"
                        )));
                    }

                    width = Some(m);
                    ndense += 1;
                }
                LayerSpec::Dropout { rate } => {
                    if !(0.0..1.0).contains(&rate) {
                        return Err(MlErr::InvalidSpec(format!(
                            "layer {i}: dropout rate {rate} is not within [0, 1)"
                        )));
                    }
                }
            }
        }

        if ndense == 0 {
            return Err(MlErr::InvalidSpec(
                "model must have at least one dense layer".into(),
            ));
        }

        Ok(())
    }

    /// Returns the width of the last dense layer, the amount of classes the model scores.
    pub fn num_classes(&self) -> Option<usize> {
        self.dense_dims().last().map(|&(_, m)| m)
    }

    /// Returns the dimensions of every dense layer, in order.
    pub fn dense_dims(&self) -> Vec<(usize, usize)> {
        self.layers
            .iter()
            .filter_map(|layer| match *layer {
                LayerSpec::Dense { dim, .. } => Some(dim),
                _ => None,
            })
            .collect()
    }

    /// Returns the amount of parameters the model holds.
    pub fn size(&self) -> usize {
        self.dense_dims().iter().map(|&(n, m)| (n + 1) * m).sum()
    }

    /// Builds the `Sequential` network this specification describes.
    ///
    /// # Returns
    /// The network or an error if the specification is invalid.
    pub fn build(&self) -> Result<Sequential> {
        self.validate()?;

        let layers = self
            .layers
            .iter()
            .map(|layer| match *layer {
                LayerSpec::Flatten => Ok(Layer::flatten()),
                LayerSpec::Dense { dim, act_fn } => Ok(Layer::dense(dim, act_fn.map(Into::into))),
                LayerSpec::Dropout { rate } => Layer::dropout(rate),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Sequential::new(layers))
    }
}

impl From<ActFnSpec> for ActFn {
    fn from(value: ActFnSpec) -> Self {
        match value {
            ActFnSpec::Relu => ActFn::relu(),
            ActFnSpec::Softmax => ActFn::softmax(),
        }
    }
}

impl From<ActFn> for ActFnSpec {
    fn from(value: ActFn) -> Self {
        match value {
            ActFn::Relu(_) => ActFnSpec::Relu,
            ActFn::Softmax(_) => ActFnSpec::Softmax,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(input_shape: Vec<usize>, layers: Vec<LayerSpec>) -> ModelSpec {
        ModelSpec {
            name: "test".into(),
            input_shape,
            layers,
        }
    }

    #[test]
    fn dense_names_follow_layer_order() {
        assert_eq!(dense_name(0), "dense");
        assert_eq!(dense_name(1), "dense_1");
        assert_eq!(dense_name(12), "dense_12");
    }

    #[test]
    fn accepts_chained_layers() {
        let spec = spec(
            vec![2, 3],
            vec![
                LayerSpec::Flatten,
                LayerSpec::Dense {
                    dim: (6, 4),
                    act_fn: Some(ActFnSpec::Relu),
                },
                LayerSpec::Dropout { rate: 0.2 },
                LayerSpec::Dense {
                    dim: (4, 3),
                    act_fn: Some(ActFnSpec::Softmax),
                },
            ],
        );

        spec.validate().unwrap();
        assert_eq!(spec.num_classes(), Some(3));
        assert_eq!(spec.size(), 7 * 4 + 5 * 3);
        assert_eq!(spec.build().unwrap().size(), spec.size());
    }

    #[test]
    fn rejects_broken_chain() {
        let spec = spec(
            vec![4],
            vec![
                LayerSpec::Dense {
                    dim: (4, 8),
                    act_fn: None,
                },
                LayerSpec::Dense {
                    dim: (7, 2),
                    act_fn: None,
                },
            ],
        );

        let err = spec.validate().unwrap_err().to_string();
        assert!(err.contains("layer 1"), "{err}");
    }

    #[test]
    fn rejects_dense_before_flatten() {
        let spec = spec(
            vec![2, 2],
            vec![LayerSpec::Dense {
                dim: (4, 1),
                act_fn: None,
            }],
        );

        assert!(spec.validate().is_err());
    }

    #[test]
    fn rejects_models_without_dense_layers() {
        let spec = spec(vec![2, 2], vec![LayerSpec::Flatten]);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn deserializes_snake_case_layers() {
        let json = r#"{
            "name": "tiny",
            "input_shape": [2],
            "layers": [
                {"dense": {"dim": [2, 2], "act_fn": "relu"}},
                {"dropout": {"rate": 0.1}},
                {"dense": {"dim": [2, 1], "act_fn": null}}
            ]
        }"#;

        let spec: ModelSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.layers.len(), 3);
        spec.validate().unwrap();
    }
}
