pub mod arch;
mod classifier;
pub mod error;
pub mod registry;
pub mod spec;

pub use classifier::{Classifier, DenseParams};
pub use error::{MlErr, Result};
pub use registry::Registry;
pub use spec::{ActFnSpec, LayerSpec, ModelSpec};
