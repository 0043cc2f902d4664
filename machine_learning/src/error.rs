use std::{
    error::Error,
    fmt::{self, Display},
};

use ndarray::ShapeError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    InputShapeMismatch {
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    InvalidSpec(String),
    InvalidDropoutRate(f32),
    Shape(ShapeError),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => {
                format!("There's a size mismatch in {what}, got {got} and expected {expected}")
            }
            MlErr::InputShapeMismatch { got, expected } => format!(
                "The input has shape {got:?} but the model expects a batch of {expected:?}"
            ),
            MlErr::InvalidSpec(msg) => format!("Invalid model specification: {msg}"),
            MlErr::InvalidDropoutRate(rate) => {
                format!("The dropout rate must lie in [0, 1), got {rate}")
            }
            MlErr::Shape(e) => format!("Failed to reshape an array: {e}"),
        };

        write!(f, "{s}")
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}
