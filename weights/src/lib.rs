mod blob;
mod codec;
pub mod error;
mod loader;

pub use blob::{BlobWriter, MODEL_CONFIG_KEY, Tensor, TensorEntry, WeightBlob, write_classifier};
pub use codec::{decode_f32, encode_f32};
pub use error::{Result, WeightsErr};
pub use loader::{LoadOrigin, Loaded, WeightLoader, load_weights};
