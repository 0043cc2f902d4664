pub mod error;
mod file;
mod graph;
mod lower;
mod result;
mod session;
mod test;

pub use error::{GraphErr, Result};
pub use file::{FORMAT, PortableGraph};
pub use graph::{DEFAULT_OPSET, Dim, GraphDef, MAX_OPSET, MIN_OPSET, Node, Op, ValueInfo};
pub use lower::{Signature, lower};
pub use result::InferenceResult;
pub use session::Session;
