use std::{
    fs,
    path::{Path, PathBuf},
};

use portable_graph::{MAX_OPSET, MIN_OPSET, Signature};
use serde::{Deserialize, Serialize};

use super::{ConverterConfig, VerifierConfig};
use crate::{PipelineError, Result};

/// Everything a conversion run needs to know, loadable from a JSON file.
///
/// Missing fields take their default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// The serialized weight blob to convert.
    pub weights: PathBuf,
    /// Where the portable graph is written.
    pub output: PathBuf,
    /// The scratch directory the interchange export lives in while converting.
    pub interchange_dir: PathBuf,
    /// Leave the interchange directory behind instead of removing it.
    pub keep_interchange: bool,
    pub opset: i64,
    pub input_name: String,
    pub output_name: String,
    /// Seeds the smoke prediction run right after loading.
    pub seed: Option<u64>,
    pub converter: ConverterConfig,
    pub verifier: VerifierConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let signature = Signature::default();

        Self {
            weights: PathBuf::from("mnist_model.safetensors"),
            output: PathBuf::from("digit_classifier.graph"),
            interchange_dir: PathBuf::from("mnist_saved_model"),
            keep_interchange: false,
            opset: portable_graph::DEFAULT_OPSET,
            input_name: signature.input,
            output_name: signature.output,
            seed: None,
            converter: ConverterConfig::default(),
            verifier: VerifierConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Reads a configuration from a JSON file.
    ///
    /// # Errors
    /// Fails if the file can't be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(PipelineError::io(path))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn signature(&self) -> Signature {
        Signature {
            input: self.input_name.clone(),
            output: self.output_name.clone(),
        }
    }

    /// Checks the configuration before anything is read or written.
    pub fn validate(&self) -> Result<()> {
        let paths = [
            ("weights", &self.weights),
            ("output", &self.output),
            ("interchange_dir", &self.interchange_dir),
        ];

        if let Some((name, _)) = paths.iter().find(|(_, p)| p.as_os_str().is_empty()) {
            return Err(PipelineError::InvalidConfig(format!("{name} must not be empty")));
        }

        if self.interchange_dir == self.output || self.interchange_dir == self.weights {
            return Err(PipelineError::InvalidConfig(format!(
                "interchange_dir ({}) must differ from the weights and output paths, \
                 it is removed after converting",
                self.interchange_dir.display()
            )));
        }

        if !(MIN_OPSET..=MAX_OPSET).contains(&self.opset) {
            return Err(PipelineError::InvalidConfig(format!(
                "opset ({}) must be within {MIN_OPSET} and {MAX_OPSET}",
                self.opset
            )));
        }

        if self.input_name.is_empty() || self.output_name.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "input and output names must not be empty".into(),
            ));
        }

        if self.input_name == self.output_name {
            return Err(PipelineError::InvalidConfig(format!(
                "input and output can't both be named {}",
                self.input_name
            )));
        }

        if self.converter.program.is_some() && self.converter.args.is_empty() {
            log::warn!("the conversion tool is given no arguments, it won't know what to convert");
        }

        if !(self.verifier.tolerance > 0.) {
            return Err(PipelineError::InvalidConfig(format!(
                "tolerance ({}) must be greater than 0",
                self.verifier.tolerance
            )));
        }

        Ok(())
    }
}
