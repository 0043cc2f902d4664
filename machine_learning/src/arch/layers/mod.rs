mod dense;
mod dropout;
mod flatten;
mod layer;

pub use dense::Dense;
pub use dropout::Dropout;
pub use flatten::Flatten;
pub use layer::Layer;
