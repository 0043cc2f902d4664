pub mod configs;
mod converter;
pub mod error;
mod export;
mod preprocess;
mod scratch;
mod verifier;

use std::{fs, path::Path};

use log::{info, warn};
use machine_learning::{Classifier, ModelSpec, Registry};
use ndarray::{ArrayD, IxDyn};
use ndarray_rand::RandomExt;
use portable_graph::{InferenceResult, PortableGraph};
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::StandardNormal;
use weights::{LoadOrigin, Loaded, WeightLoader};

pub use configs::{ConverterConfig, PipelineConfig, VerifierConfig};
pub use converter::{ConversionOutcome, FormatConverter};
pub use error::{PipelineError, Result};
pub use export::{Exporter, Interchange, MANIFEST_FILE, Manifest, VARIABLES_FILE};
pub use preprocess::load_digit;
pub use scratch::ScratchDir;
pub use verifier::{
    ModelInfo, Scenario, ScenarioOutcome, ScenarioReport, VerificationReport, Verifier,
};

/// The prediction made right after loading, before anything is exported.
#[derive(Debug, Clone, PartialEq)]
pub struct SmokeTest {
    pub output_shape: Vec<usize>,
    pub predicted_class: Option<usize>,
}

/// The signature and size of a freshly converted graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSummary {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub size: u64,
}

impl GraphSummary {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let graph = PortableGraph::open(path)?;
        let size = fs::metadata(path).map_err(PipelineError::io(path))?.len();
        let def = graph.def();

        Ok(Self {
            inputs: def.inputs.iter().map(|v| v.name.clone()).collect(),
            outputs: def.outputs.iter().map(|v| v.name.clone()).collect(),
            size,
        })
    }

    pub fn size_kb(&self) -> f64 {
        self.size as f64 / 1024.
    }
}

/// Everything a conversion run went through.
#[derive(Debug)]
pub struct ConversionReport {
    pub model: ModelSpec,
    pub origin: LoadOrigin,
    pub smoke: SmokeTest,
    pub outcome: ConversionOutcome,
    /// Present when the conversion succeeded and the produced graph could be read back.
    pub summary: Option<GraphSummary>,
}

impl ConversionReport {
    pub fn succeeded(&self) -> bool {
        self.outcome.succeeded()
    }
}

/// Converts a weight blob into a portable graph.
///
/// The weights are loaded, falling back on the known architectures, exported to a scratch
/// interchange directory and handed to the conversion tool. The scratch directory is removed
/// once the tool is done, unless told to keep it.
///
/// # Errors
/// Returns a `PipelineError` if the configuration is invalid, the weights can't be loaded or
/// exported, or the tool can't be started. A tool that runs and fails is reported in the
/// returned report instead.
pub fn convert(config: &PipelineConfig) -> Result<ConversionReport> {
    config.validate()?;

    let loader = WeightLoader::new(Registry::mnist());
    let Loaded { classifier, origin } = loader.load(&config.weights)?;
    info!("loaded {} ({origin:?})", classifier.spec().name);

    let smoke = smoke_test(&classifier, config.seed)?;
    info!(
        "smoke prediction: output shape {:?}, class {:?}",
        smoke.output_shape, smoke.predicted_class
    );

    let scratch = ScratchDir::create(&config.interchange_dir)?;
    Exporter::new(config.signature()).export(&classifier, scratch.path())?;

    let converter = FormatConverter::from_config(&config.converter)?;
    let outcome = converter.convert(scratch.path(), &config.output, config.opset)?;

    let summary = if outcome.succeeded() {
        GraphSummary::read(&config.output)
            .inspect_err(|e| warn!("failed to read back {}: {e}", config.output.display()))
            .ok()
    } else {
        None
    };

    if config.keep_interchange {
        let dir = scratch.keep();
        info!("kept interchange directory {}", dir.display());
    } else if let Err(e) = scratch.close() {
        warn!("{e}");
    }

    Ok(ConversionReport {
        model: classifier.spec().clone(),
        origin,
        smoke,
        outcome,
        summary,
    })
}

/// Opens the graph at `model` and runs every verification scenario on it.
///
/// # Errors
/// Only fails if the graph can't be loaded, scenario failures are part of the report.
pub fn verify<P: AsRef<Path>>(model: P, config: &VerifierConfig) -> Result<VerificationReport> {
    Ok(Verifier::open(model, config.clone())?.run())
}

fn smoke_test(classifier: &Classifier, seed: Option<u64>) -> Result<SmokeTest> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut shape = vec![1];
    shape.extend_from_slice(classifier.input_shape());
    let x: ArrayD<f32> = ArrayD::random_using(IxDyn(&shape), StandardNormal, &mut rng);

    let y = classifier.predict(x.view())?;
    let predicted_class = y
        .rows()
        .into_iter()
        .next()
        .and_then(|row| InferenceResult::new(row.to_vec()).predicted_class());

    Ok(SmokeTest {
        output_shape: y.shape().to_vec(),
        predicted_class,
    })
}
