use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use log::{info, warn};
use machine_learning::registry::NUM_CLASSES;
use ndarray::{ArrayD, IxDyn};
use ndarray_rand::RandomExt;
use portable_graph::{Dim, GraphErr, InferenceResult, Session};
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::StandardNormal;

use crate::{PipelineError, Result, configs::VerifierConfig, preprocess};

/// What a graph declares about its input and output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub input_name: String,
    pub input_shape: Vec<Dim>,
    pub input_dtype: String,
    pub output_name: String,
}

impl ModelInfo {
    /// The input shape with every symbolic dimension set to one.
    pub fn concrete_input_shape(&self) -> Vec<usize> {
        self.input_shape.iter().map(|dim| dim.size_or(1)).collect()
    }
}

/// One input a graph is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scenario {
    /// Standard normal noise.
    RandomNormal,
    /// A real digit picture.
    Image(PathBuf),
    /// An empty, all black image.
    Zeros,
    /// An all white image.
    Ones,
}

impl Scenario {
    /// Whether a failure of this scenario fails the whole verification.
    pub fn is_required(&self) -> bool {
        !matches!(self, Self::Image(_))
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RandomNormal => write!(f, "random input"),
            Self::Image(path) => write!(f, "real image ({})", path.display()),
            Self::Zeros => write!(f, "all zeros input (empty image)"),
            Self::Ones => write!(f, "all ones input (white image)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioOutcome {
    Passed {
        result: InferenceResult,
        normalized: bool,
    },
    Failed {
        reason: String,
        result: Option<InferenceResult>,
    },
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub outcome: ScenarioOutcome,
}

impl ScenarioReport {
    pub fn failed(&self) -> bool {
        matches!(self.outcome, ScenarioOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    pub info: ModelInfo,
    pub scenarios: Vec<ScenarioReport>,
    /// The size in bytes of the graph file.
    pub model_size: Option<u64>,
}

impl VerificationReport {
    /// Whether every required scenario ran and produced one finite score per class.
    pub fn passed(&self) -> bool {
        self.scenarios
            .iter()
            .all(|report| !(report.scenario.is_required() && report.failed()))
    }
}

/// Checks a converted graph by running it on a fixed set of inputs.
#[derive(Debug)]
pub struct Verifier {
    path: PathBuf,
    session: Session,
    config: VerifierConfig,
}

impl Verifier {
    /// Opens the graph at `path`.
    ///
    /// # Errors
    /// `PipelineError::GraphLoad` if the graph can't be read or isn't valid. Verification can't
    /// go any further without it.
    pub fn open<P: AsRef<Path>>(path: P, config: VerifierConfig) -> Result<Self> {
        let path = path.as_ref();
        let graph_load = |source| PipelineError::GraphLoad {
            path: path.to_path_buf(),
            source,
        };

        let session = Session::open(path).map_err(graph_load)?;
        if session.inputs().len() != 1 || session.outputs().is_empty() {
            return Err(graph_load(GraphErr::Invalid(format!(
                "expected a single input graph, found {} input(s)",
                session.inputs().len()
            ))));
        }

        let output = &session.outputs()[0];
        if !matches!(output.shape.as_slice(), [_, Dim::Fixed(NUM_CLASSES)]) {
            let shape: Vec<_> = output.shape.iter().map(Dim::to_string).collect();
            return Err(graph_load(GraphErr::Invalid(format!(
                "expected {} to be shaped [batch, {NUM_CLASSES}], found [{}]",
                output.name,
                shape.join(", ")
            ))));
        }

        info!("loaded graph {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            session,
            config,
        })
    }

    pub fn info(&self) -> ModelInfo {
        let input = &self.session.inputs()[0];
        let output = &self.session.outputs()[0];

        ModelInfo {
            input_name: input.name.clone(),
            input_shape: input.shape.clone(),
            input_dtype: input.dtype.clone(),
            output_name: output.name.clone(),
        }
    }

    /// The scenarios `run` goes through, in order.
    pub fn scenarios(&self) -> Vec<Scenario> {
        let mut scenarios = vec![Scenario::RandomNormal];
        scenarios.extend(self.config.image.clone().map(Scenario::Image));
        scenarios.extend([Scenario::Zeros, Scenario::Ones]);
        scenarios
    }

    /// Runs every scenario. Failures are recorded in the report, never returned.
    pub fn run(&self) -> VerificationReport {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let scenarios = self
            .scenarios()
            .into_iter()
            .map(|scenario| {
                let outcome = self.run_scenario(&scenario, &mut rng);
                ScenarioReport { scenario, outcome }
            })
            .collect();

        VerificationReport {
            info: self.info(),
            scenarios,
            model_size: fs::metadata(&self.path).ok().map(|m| m.len()),
        }
    }

    fn run_scenario(&self, scenario: &Scenario, rng: &mut StdRng) -> ScenarioOutcome {
        let shape = self.info().concrete_input_shape();

        let x = match scenario {
            Scenario::RandomNormal => ArrayD::random_using(IxDyn(&shape), StandardNormal, rng),
            Scenario::Zeros => ArrayD::zeros(IxDyn(&shape)),
            Scenario::Ones => ArrayD::ones(IxDyn(&shape)),
            Scenario::Image(path) if !path.exists() => {
                warn!("{} not found, skipping the image scenario", path.display());
                return ScenarioOutcome::Skipped(format!("{} not found", path.display()));
            }
            Scenario::Image(path) => match preprocess::load_digit(path, &shape) {
                Ok(x) => x,
                Err(e) => {
                    warn!("failed to process {}: {e}", path.display());
                    return ScenarioOutcome::Failed {
                        reason: e.to_string(),
                        result: None,
                    };
                }
            },
        };

        let result = match self.session.predict(x) {
            Ok(results) => results.into_iter().next(),
            Err(e) => {
                warn!("{scenario}: {e}");
                return ScenarioOutcome::Failed {
                    reason: e.to_string(),
                    result: None,
                };
            }
        };

        let Some(result) = result else {
            return ScenarioOutcome::Failed {
                reason: "the graph returned no scores".into(),
                result: None,
            };
        };

        if result.scores().len() != NUM_CLASSES {
            warn!("{scenario}: {} scores", result.scores().len());
            return ScenarioOutcome::Failed {
                reason: format!(
                    "expected {NUM_CLASSES} scores, the graph returned {}",
                    result.scores().len()
                ),
                result: Some(result),
            };
        }

        if !result.is_finite() {
            warn!("{scenario}: non-finite scores {:?}", result.scores());
            return ScenarioOutcome::Failed {
                reason: "the scores aren't all finite".into(),
                result: Some(result),
            };
        }

        let normalized = result.is_normalized(self.config.tolerance);
        info!(
            "{scenario}: predicted {:?} with confidence {:?}",
            result.predicted_class(),
            result.confidence()
        );

        ScenarioOutcome::Passed { result, normalized }
    }
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma};
    use machine_learning::{ActFnSpec, Classifier, LayerSpec, ModelSpec, registry};
    use ndarray::Array2;
    use portable_graph::{GraphDef, Node, Op, PortableGraph, Signature, ValueInfo, lower};

    use super::*;

    fn write_graph(dir: &Path, seed: u64) -> PathBuf {
        let spec = registry::mlp_512x2();
        let params = (0..spec.size())
            .map(|i| ((i as u64 * 31 + seed) % 17) as f32 * 0.002 - 0.016)
            .collect();
        let classifier = Classifier::new(spec, params).unwrap();

        let path = dir.join("model.graph");
        lower(&classifier, 13, &Signature::default())
            .unwrap()
            .write(&path)
            .unwrap();
        path
    }

    fn config(image: Option<PathBuf>) -> VerifierConfig {
        VerifierConfig {
            image,
            seed: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn missing_images_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_graph(dir.path(), 1);

        let verifier = Verifier::open(&path, config(Some(dir.path().join("test.png")))).unwrap();
        let report = verifier.run();

        assert!(report.passed());
        assert_eq!(report.scenarios.len(), 4);
        assert!(matches!(
            report.scenarios[1].outcome,
            ScenarioOutcome::Skipped(_)
        ));
        assert_eq!(report.info.input_name, "input");
        assert_eq!(report.info.concrete_input_shape(), [1, 28, 28]);
        assert!(report.model_size.unwrap() > 0);

        for report in report.scenarios.iter().filter(|r| r.scenario.is_required()) {
            let ScenarioOutcome::Passed { result, normalized } = &report.outcome else {
                panic!("{} did not pass", report.scenario);
            };
            assert!(normalized);
            assert_eq!(result.scores().len(), 10);
        }
    }

    #[test]
    fn real_images_are_classified() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_graph(dir.path(), 2);
        let image = dir.path().join("digit.png");
        GrayImage::from_fn(40, 40, |x, _| Luma([if x < 20 { 255 } else { 0 }]))
            .save(&image)
            .unwrap();

        let report = Verifier::open(&path, config(Some(image))).unwrap().run();
        assert!(matches!(
            report.scenarios[1].outcome,
            ScenarioOutcome::Passed { .. }
        ));
    }

    #[test]
    fn unreadable_images_dont_fail_the_verification() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_graph(dir.path(), 3);
        let image = dir.path().join("broken.png");
        fs::write(&image, b"not a png").unwrap();

        let report = Verifier::open(&path, config(Some(image))).unwrap().run();
        assert!(report.scenarios[1].failed());
        assert!(report.passed());
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_graph(dir.path(), 4);
        let verifier = Verifier::open(&path, config(None)).unwrap();

        assert_eq!(verifier.scenarios().len(), 3);
        assert_eq!(verifier.run(), verifier.run());
    }

    #[test]
    fn unloadable_graphs_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.graph");
        fs::write(&path, b"garbage").unwrap();

        assert!(matches!(
            Verifier::open(&path, config(None)),
            Err(PipelineError::GraphLoad { .. })
        ));
        assert!(matches!(
            Verifier::open(dir.path().join("absent.graph"), config(None)),
            Err(PipelineError::GraphLoad { .. })
        ));
    }

    #[test]
    fn graphs_must_score_ten_classes() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ModelSpec {
            name: "three".into(),
            input_shape: vec![28, 28],
            layers: vec![
                LayerSpec::Flatten,
                LayerSpec::Dense {
                    dim: (784, 3),
                    act_fn: Some(ActFnSpec::Softmax),
                },
            ],
        };
        let params = vec![0.01; spec.size()];
        let path = dir.path().join("three.graph");
        lower(&Classifier::new(spec, params).unwrap(), 13, &Signature::default())
            .unwrap()
            .write(&path)
            .unwrap();

        assert!(matches!(
            Verifier::open(&path, config(None)),
            Err(PipelineError::GraphLoad { .. })
        ));
    }

    #[test]
    fn short_score_vectors_fail_every_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let batch = || Dim::Symbolic("batch".into());

        // declares ten classes but only ever returns three scores
        let def = GraphDef {
            opset_version: 13,
            producer: "test".into(),
            inputs: vec![ValueInfo::float("input", vec![batch(), Dim::Fixed(3)])],
            outputs: vec![ValueInfo::float("output", vec![batch(), Dim::Fixed(10)])],
            nodes: vec![Node {
                name: "project".into(),
                op: Op::MatMul,
                inputs: vec!["input".into(), "w".into()],
                outputs: vec!["output".into()],
            }],
        };
        let w = Array2::<f32>::eye(3).into_dyn();
        let path = dir.path().join("liar.graph");
        PortableGraph::new(def, vec![("w".into(), w)])
            .unwrap()
            .write(&path)
            .unwrap();

        let report = Verifier::open(&path, config(None)).unwrap().run();

        assert!(!report.passed());
        assert!(report.scenarios.iter().all(ScenarioReport::failed));
        let ScenarioOutcome::Failed { reason, result } = &report.scenarios[0].outcome else {
            panic!("the random input scenario passed");
        };
        assert!(reason.contains("expected 10 scores"));
        assert_eq!(result.as_ref().unwrap().scores().len(), 3);
    }
}
