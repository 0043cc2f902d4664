use std::{error::Error, fmt, io, path::PathBuf};

use machine_learning::MlErr;
use ndarray::ShapeError;
use weights::WeightsErr;

use crate::Dim;

/// The portable graph module's result type.
pub type Result<T> = std::result::Result<T, GraphErr>;

/// Failures building, reading or running a portable graph.
#[derive(Debug)]
pub enum GraphErr {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Weights(WeightsErr),
    Json(serde_json::Error),
    Ml(MlErr),
    Shape(ShapeError),
    /// The file isn't a portable graph or lacks one of its required metadata entries.
    UnsupportedFormat(String),
    UnsupportedOpset(i64),
    /// The graph definition breaks one of its structural rules.
    Invalid(String),
    MissingFeed(String),
    InputMismatch {
        name: String,
        got: Vec<usize>,
        expected: Vec<Dim>,
    },
    /// A node received operands it can't be applied to.
    Op {
        node: String,
        msg: String,
    },
}

impl fmt::Display for GraphErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "io error on {}: {source}", path.display()),
            Self::Weights(e) => write!(f, "{e}"),
            Self::Json(e) => write!(f, "invalid graph definition: {e}"),
            Self::Ml(e) => write!(f, "{e}"),
            Self::Shape(e) => write!(f, "shape error: {e}"),
            Self::UnsupportedFormat(msg) => write!(f, "unsupported graph file: {msg}"),
            Self::UnsupportedOpset(v) => write!(f, "unsupported operator set version {v}"),
            Self::Invalid(msg) => write!(f, "invalid graph: {msg}"),
            Self::MissingFeed(name) => write!(f, "no value fed for graph input {name}"),
            Self::InputMismatch {
                name,
                got,
                expected,
            } => {
                let expected: Vec<_> = expected.iter().map(Dim::to_string).collect();
                write!(
                    f,
                    "input {name} has shape {got:?}, expected [{}]",
                    expected.join(", ")
                )
            }
            Self::Op { node, msg } => write!(f, "node {node}: {msg}"),
        }
    }
}

impl Error for GraphErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Weights(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Ml(e) => Some(e),
            Self::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WeightsErr> for GraphErr {
    fn from(value: WeightsErr) -> Self {
        Self::Weights(value)
    }
}

impl From<serde_json::Error> for GraphErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<MlErr> for GraphErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

impl From<ShapeError> for GraphErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}
