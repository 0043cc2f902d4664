use std::{error::Error, fmt, io, path::PathBuf};

use machine_learning::MlErr;
use safetensors::SafeTensorError;

/// The weights module's result type.
pub type Result<T> = std::result::Result<T, WeightsErr>;

/// Failures reading, writing or fitting serialized weights.
#[derive(Debug)]
pub enum WeightsErr {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    SafeTensors(SafeTensorError),
    Json(serde_json::Error),
    Ml(MlErr),
    UnsupportedDtype(String),
    CorruptTensor {
        name: String,
        len: usize,
        width: usize,
    },
    MissingModelConfig,
    MissingTensor(String),
    DuplicateTensor(String),
    ShapeMismatch {
        tensor: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    LayerCountMismatch {
        got: usize,
        expected: usize,
    },
    NoCompatibleArchitecture {
        primary: Box<WeightsErr>,
        attempts: Vec<(String, WeightsErr)>,
    },
}

impl fmt::Display for WeightsErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightsErr::Io { path, source } => write!(f, "io error on {}: {source}", path.display()),
            WeightsErr::SafeTensors(e) => write!(f, "invalid tensor container: {e}"),
            WeightsErr::Json(e) => write!(f, "invalid model config: {e}"),
            WeightsErr::Ml(e) => write!(f, "{e}"),
            WeightsErr::UnsupportedDtype(dtype) => write!(f, "unsupported tensor dtype {dtype}"),
            WeightsErr::CorruptTensor { name, len, width } => write!(
                f,
                "tensor {name} holds {len} bytes, not a multiple of its {width}-byte elements"
            ),
            WeightsErr::MissingModelConfig => write!(f, "the blob carries no model config"),
            WeightsErr::MissingTensor(name) => write!(f, "missing tensor {name}"),
            WeightsErr::DuplicateTensor(name) => {
                write!(f, "more than one stored tensor maps to {name}")
            }
            WeightsErr::ShapeMismatch {
                tensor,
                got,
                expected,
            } => write!(
                f,
                "shape mismatch for {tensor}: got {got:?}, expected {expected:?}"
            ),
            WeightsErr::LayerCountMismatch { got, expected } => write!(
                f,
                "the blob stores {got} dense layer(s), the architecture has {expected}"
            ),
            WeightsErr::NoCompatibleArchitecture { primary, attempts } => {
                write!(f, "no architecture fits the stored weights (full model: {primary}")?;
                for (name, e) in attempts {
                    write!(f, "; {name}: {e}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl Error for WeightsErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WeightsErr::Io { source, .. } => Some(source),
            WeightsErr::SafeTensors(e) => Some(e),
            WeightsErr::Json(e) => Some(e),
            WeightsErr::Ml(e) => Some(e),
            WeightsErr::NoCompatibleArchitecture { primary, .. } => Some(primary.as_ref()),
            _ => None,
        }
    }
}

impl From<SafeTensorError> for WeightsErr {
    fn from(value: SafeTensorError) -> Self {
        Self::SafeTensors(value)
    }
}

impl From<serde_json::Error> for WeightsErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<MlErr> for WeightsErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}
