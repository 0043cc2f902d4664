use crate::spec::{ActFnSpec, LayerSpec, ModelSpec};

/// Side of the square grayscale images the reference classifiers take.
pub const IMAGE_SIDE: usize = 28;

/// Amount of classes the reference classifiers score, one per digit.
pub const NUM_CLASSES: usize = 10;

const PIXELS: usize = IMAGE_SIDE * IMAGE_SIDE;
const DROPOUT_RATE: f32 = 0.2;

/// flatten(28×28) → dense(512, relu) → dropout → dense(512, relu) → dropout → dense(10, softmax).
pub fn mlp_512x2() -> ModelSpec {
    ModelSpec {
        name: "mlp_512x2".into(),
        input_shape: vec![IMAGE_SIDE, IMAGE_SIDE],
        layers: vec![
            LayerSpec::Flatten,
            relu(PIXELS, 512),
            LayerSpec::Dropout { rate: DROPOUT_RATE },
            relu(512, 512),
            LayerSpec::Dropout { rate: DROPOUT_RATE },
            softmax(512, NUM_CLASSES),
        ],
    }
}

/// flatten(28×28×1) → dense(128, relu) → dropout → dense(10, softmax).
pub fn mlp_128() -> ModelSpec {
    ModelSpec {
        name: "mlp_128".into(),
        input_shape: vec![IMAGE_SIDE, IMAGE_SIDE, 1],
        layers: vec![
            LayerSpec::Flatten,
            relu(PIXELS, 128),
            LayerSpec::Dropout { rate: DROPOUT_RATE },
            softmax(128, NUM_CLASSES),
        ],
    }
}

fn relu(n: usize, m: usize) -> LayerSpec {
    LayerSpec::Dense {
        dim: (n, m),
        act_fn: Some(ActFnSpec::Relu),
    }
}

fn softmax(n: usize, m: usize) -> LayerSpec {
    LayerSpec::Dense {
        dim: (n, m),
        act_fn: Some(ActFnSpec::Softmax),
    }
}

/// An ordered list of known architectures to try when a weight blob doesn't describe its own.
#[derive(Debug, Clone)]
pub struct Registry {
    entries: Vec<ModelSpec>,
}

impl Registry {
    /// Creates a new `Registry`.
    ///
    /// # Arguments
    /// * `entries` - The architectures, most likely first.
    ///
    /// # Returns
    /// A new `Registry` instance.
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = ModelSpec>,
    {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// The digit classifier architectures, the two-hidden-layer one first.
    pub fn mnist() -> Self {
        Self::new([mlp_512x2(), mlp_128()])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelSpec> {
        self.entries.iter()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::mnist()
    }
}
