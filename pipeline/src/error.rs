use std::{fmt, io, path::PathBuf};

use machine_learning::MlErr;
use portable_graph::GraphErr;
use weights::WeightsErr;

/// The pipeline module's result type.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// All errors that can occur while exporting, converting or verifying a model.
#[derive(Debug)]
pub enum PipelineError {
    /// Invalid configuration, caught before touching any file.
    InvalidConfig(String),
    Io {
        path: PathBuf,
        source: io::Error,
    },
    /// The weights couldn't be loaded into any known architecture.
    Weights(WeightsErr),
    Graph(GraphErr),
    Ml(MlErr),
    Json(serde_json::Error),
    /// The conversion tool couldn't be started at all.
    Spawn {
        program: PathBuf,
        source: io::Error,
    },
    /// The converted graph couldn't be opened for verification.
    GraphLoad {
        path: PathBuf,
        source: GraphErr,
    },
    Image(image::ImageError),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Io { path, source } => write!(f, "io error on {}: {source}", path.display()),
            Self::Weights(e) => write!(f, "{e}"),
            Self::Graph(e) => write!(f, "{e}"),
            Self::Ml(e) => write!(f, "{e}"),
            Self::Json(e) => write!(f, "invalid json: {e}"),
            Self::Spawn { program, source } => {
                write!(f, "failed to run {}: {source}", program.display())
            }
            Self::GraphLoad { path, source } => {
                write!(f, "failed to load graph {}: {source}", path.display())
            }
            Self::Image(e) => write!(f, "image error: {e}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } | Self::Spawn { source, .. } => Some(source),
            Self::Weights(e) => Some(e),
            Self::Graph(e) | Self::GraphLoad { source: e, .. } => Some(e),
            Self::Ml(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Image(e) => Some(e),
            Self::InvalidConfig(_) => None,
        }
    }
}

impl From<WeightsErr> for PipelineError {
    fn from(e: WeightsErr) -> Self {
        Self::Weights(e)
    }
}

impl From<GraphErr> for PipelineError {
    fn from(e: GraphErr) -> Self {
        Self::Graph(e)
    }
}

impl From<MlErr> for PipelineError {
    fn from(e: MlErr) -> Self {
        Self::Ml(e)
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(e: image::ImageError) -> Self {
        Self::Image(e)
    }
}
