use std::{
    fs,
    path::{Path, PathBuf},
};

use log::info;
use machine_learning::{Classifier, ModelSpec};
use portable_graph::{Dim, Signature, ValueInfo};
use serde::{Deserialize, Serialize};
use weights::{WeightBlob, load_weights, write_classifier};

use crate::{PipelineError, Result};

/// The file describing an exported model.
pub const MANIFEST_FILE: &str = "model.json";

/// The file holding an exported model's weights.
pub const VARIABLES_FILE: &str = "variables.safetensors";

const FORMAT_VERSION: u32 = 1;

/// The architecture and serving signature of an exported model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub model: ModelSpec,
    pub inputs: Vec<ValueInfo>,
    pub outputs: Vec<ValueInfo>,
}

/// Writes classifiers out as interchange directories.
#[derive(Debug, Clone, Default)]
pub struct Exporter {
    signature: Signature,
}

impl Exporter {
    pub fn new(signature: Signature) -> Self {
        Self { signature }
    }

    /// Exports a classifier into `dir`, creating it if needed.
    ///
    /// # Arguments
    /// * `classifier` - The model to export.
    /// * `dir` - The directory the manifest and the variables are written to.
    ///
    /// # Returns
    /// The manifest that was written.
    pub fn export<P: AsRef<Path>>(&self, classifier: &Classifier, dir: P) -> Result<Manifest> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(PipelineError::io(dir))?;

        let mut input_shape = vec![Dim::Symbolic("batch".into())];
        input_shape.extend(classifier.input_shape().iter().map(|&n| Dim::Fixed(n)));
        let output_shape = vec![
            Dim::Symbolic("batch".into()),
            Dim::Fixed(classifier.num_classes()),
        ];

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            model: classifier.spec().clone(),
            inputs: vec![ValueInfo::float(self.signature.input.clone(), input_shape)],
            outputs: vec![ValueInfo::float(self.signature.output.clone(), output_shape)],
        };

        let manifest_path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(&manifest)?;
        fs::write(&manifest_path, json).map_err(PipelineError::io(&manifest_path))?;

        write_classifier(classifier, false)?.write(dir.join(VARIABLES_FILE))?;

        info!("exported {} to {}", manifest.model.name, dir.display());
        Ok(manifest)
    }
}

/// An exported model read back from its directory.
#[derive(Debug)]
pub struct Interchange {
    dir: PathBuf,
    manifest: Manifest,
    classifier: Classifier,
}

impl Interchange {
    /// Reads an interchange directory.
    ///
    /// # Errors
    /// Fails if either file is missing or unreadable, the format version is unknown or the
    /// variables don't fit the described architecture.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let manifest_path = dir.join(MANIFEST_FILE);
        let json = fs::read_to_string(&manifest_path).map_err(PipelineError::io(&manifest_path))?;
        let manifest: Manifest = serde_json::from_str(&json)?;

        if manifest.format_version != FORMAT_VERSION {
            return Err(PipelineError::InvalidConfig(format!(
                "{} has format version {}, expected {FORMAT_VERSION}",
                manifest_path.display(),
                manifest.format_version
            )));
        }

        if manifest.inputs.len() != 1 || manifest.outputs.len() != 1 {
            return Err(PipelineError::InvalidConfig(format!(
                "{} must declare exactly one input and one output",
                manifest_path.display()
            )));
        }

        let blob = WeightBlob::open(dir.join(VARIABLES_FILE))?;
        let classifier = load_weights(&blob, &manifest.model)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            manifest,
            classifier,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn signature(&self) -> Signature {
        Signature {
            input: self.manifest.inputs[0].name.clone(),
            output: self.manifest.outputs[0].name.clone(),
        }
    }
}
