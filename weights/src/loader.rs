use std::path::Path;

use log::{debug, info, warn};
use machine_learning::{Classifier, ModelSpec, Registry, spec::dense_name};

use crate::{Result, Tensor, WeightBlob, WeightsErr, blob::natural_cmp};

/// Which path produced a loaded classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOrigin {
    /// The blob described its own architecture.
    FullModel,
    /// The blob's weights were fitted into the named reference architecture.
    Reference(String),
}

/// A classifier together with the way it was obtained.
#[derive(Debug)]
pub struct Loaded {
    pub classifier: Classifier,
    pub origin: LoadOrigin,
}

/// Turns weight blobs into classifiers, falling back to known architectures when the blob
/// doesn't carry a usable description of its own.
#[derive(Debug, Clone, Default)]
pub struct WeightLoader {
    registry: Registry,
}

impl WeightLoader {
    /// Creates a new `WeightLoader`.
    ///
    /// # Arguments
    /// * `registry` - The architectures to try, in order, when the full model can't be loaded.
    ///
    /// # Returns
    /// A new `WeightLoader` instance.
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Loaded> {
        let path = path.as_ref();
        info!("loading weights from {}", path.display());
        let blob = WeightBlob::open(path)?;
        self.load_blob(&blob)
    }

    /// Loads a classifier out of a blob.
    ///
    /// The full model is tried first. Whatever makes it fail, each registry architecture is
    /// then tried in turn with the blob's raw tensors.
    ///
    /// # Errors
    /// `WeightsErr::NoCompatibleArchitecture` when no architecture fits, carrying every attempt's
    /// failure. Reading the blob itself may also fail.
    pub fn load_blob(&self, blob: &WeightBlob) -> Result<Loaded> {
        let primary = match self.load_full(blob) {
            Ok(classifier) => {
                info!("loaded full model {}", classifier.spec().name);
                return Ok(Loaded {
                    classifier,
                    origin: LoadOrigin::FullModel,
                });
            }
            Err(e) => e,
        };

        warn!("full model load failed: {primary}");
        let mut attempts = Vec::new();

        for spec in self.registry.iter() {
            match load_weights(blob, spec) {
                Ok(classifier) => {
                    info!("loaded weights into reference architecture {}", spec.name);
                    return Ok(Loaded {
                        classifier,
                        origin: LoadOrigin::Reference(spec.name.clone()),
                    });
                }
                Err(e) => {
                    debug!("reference architecture {} rejected: {e}", spec.name);
                    attempts.push((spec.name.clone(), e));
                }
            }
        }

        Err(WeightsErr::NoCompatibleArchitecture {
            primary: Box::new(primary),
            attempts,
        })
    }

    fn load_full(&self, blob: &WeightBlob) -> Result<Classifier> {
        let config = blob.model_config()?.ok_or(WeightsErr::MissingModelConfig)?;
        let spec: ModelSpec = serde_json::from_str(&config)?;
        load_weights(blob, &spec)
    }
}

/// Loads only the numeric tensors of a blob into the given architecture.
///
/// Tensors are grouped by layer (`dense/kernel`, `dense/bias`, …). The blob must store exactly
/// as many layers as `spec` has dense layers. When every one of them finds a group with its name
/// the groups are matched by name, otherwise they are matched by position in natural name order. Kernels are stored `(in, out)`; tensors named `weight`
/// are stored `(out, in)` and get transposed.
///
/// # Errors
/// Fails with a shape or layer count mismatch when the stored tensors don't fit `spec`.
pub fn load_weights(blob: &WeightBlob, spec: &ModelSpec) -> Result<Classifier> {
    spec.validate()?;

    let groups = group_tensors(blob)?;
    let dims = spec.dense_dims();

    if groups.len() != dims.len() {
        return Err(WeightsErr::LayerCountMismatch {
            got: groups.len(),
            expected: dims.len(),
        });
    }

    let by_name: Option<Vec<&LayerTensors>> = (0..dims.len())
        .map(|i| groups.iter().find(|g| g.layer == dense_name(i)))
        .collect();
    let selected = by_name.unwrap_or_else(|| groups.iter().collect());

    let mut params = Vec::with_capacity(spec.size());
    for (&(n, m), group) in dims.iter().zip(selected) {
        params.extend(group.kernel(blob, n, m)?);
        params.extend(group.bias(blob, m)?);
    }

    Ok(Classifier::new(spec.clone(), params)?)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum KernelLayout {
    InOut,
    OutIn,
}

/// The tensor names stored for one layer.
#[derive(Debug, Default)]
struct LayerTensors {
    layer: String,
    kernel: Option<(String, Option<KernelLayout>)>,
    bias: Option<String>,
}

impl LayerTensors {
    fn kernel(&self, blob: &WeightBlob, n: usize, m: usize) -> Result<Vec<f32>> {
        let (name, layout) = self
            .kernel
            .as_ref()
            .ok_or_else(|| WeightsErr::MissingTensor(format!("{}/kernel", self.layer)))?;
        let Tensor { shape, values } = blob.tensor(name)?;

        match layout {
            Some(KernelLayout::OutIn) if shape == [m, n] => {
                Ok((0..n * m).map(|k| values[(k % m) * n + k / m]).collect())
            }
            Some(KernelLayout::InOut) | None if shape == [n, m] => Ok(values),
            _ => Err(WeightsErr::ShapeMismatch {
                tensor: name.clone(),
                got: shape,
                expected: vec![n, m],
            }),
        }
    }

    fn bias(&self, blob: &WeightBlob, m: usize) -> Result<Vec<f32>> {
        let name = self
            .bias
            .as_ref()
            .ok_or_else(|| WeightsErr::MissingTensor(format!("{}/bias", self.layer)))?;
        let Tensor { shape, values } = blob.tensor(name)?;

        if shape != [m] {
            return Err(WeightsErr::ShapeMismatch {
                tensor: name.clone(),
                got: shape,
                expected: vec![m],
            });
        }

        Ok(values)
    }
}

/// Splits a tensor name such as `dense_1/kernel`, `model_weights/dense_1/dense_1/kernel:0` or
/// `fc.weight` into its layer and parameter parts. The layer is the component right before the
/// parameter, so leading model prefixes are dropped.
fn split_name(name: &str) -> Option<(&str, &str)> {
    let name = name.split(':').next().unwrap_or(name);
    let (path, param) = name.rsplit_once(['/', '.'])?;
    let layer = path.rsplit(['/', '.']).next().unwrap_or(path);
    Some((layer, param))
}

fn group_tensors(blob: &WeightBlob) -> Result<Vec<LayerTensors>> {
    let mut groups: Vec<LayerTensors> = Vec::new();

    for entry in blob.entries()? {
        let Some((layer, param)) = split_name(&entry.name) else {
            debug!("ignoring tensor {} with no layer prefix", entry.name);
            continue;
        };

        let idx = match groups.iter().position(|g| g.layer == layer) {
            Some(idx) => idx,
            None => {
                groups.push(LayerTensors {
                    layer: layer.to_string(),
                    ..Default::default()
                });
                groups.len() - 1
            }
        };
        let group = &mut groups[idx];

        match param {
            "kernel" => {
                let kernel = (entry.name, Some(KernelLayout::InOut));
                set_once(&mut group.kernel, kernel, &group.layer, "kernel")?
            }
            "weight" => {
                let kernel = (entry.name, Some(KernelLayout::OutIn));
                set_once(&mut group.kernel, kernel, &group.layer, "kernel")?
            }
            "bias" => set_once(&mut group.bias, entry.name, &group.layer, "bias")?,
            other => debug!("ignoring tensor {} ({other})", entry.name),
        }
    }

    groups.retain(|g| g.kernel.is_some() || g.bias.is_some());
    groups.sort_by(|a, b| natural_cmp(&a.layer, &b.layer));
    Ok(groups)
}

/// Fills `slot`, failing if an earlier tensor already did.
fn set_once<T>(slot: &mut Option<T>, value: T, layer: &str, param: &str) -> Result<()> {
    if slot.is_some() {
        return Err(WeightsErr::DuplicateTensor(format!("{layer}/{param}")));
    }
    *slot = Some(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use machine_learning::{ActFnSpec, LayerSpec, registry};

    use super::*;
    use crate::{BlobWriter, MODEL_CONFIG_KEY, write_classifier};

    fn tiny_spec() -> ModelSpec {
        ModelSpec {
            name: "tiny".into(),
            input_shape: vec![2, 2],
            layers: vec![
                LayerSpec::Flatten,
                LayerSpec::Dense {
                    dim: (4, 3),
                    act_fn: Some(ActFnSpec::Relu),
                },
                LayerSpec::Dense {
                    dim: (3, 2),
                    act_fn: Some(ActFnSpec::Softmax),
                },
            ],
        }
    }

    fn tiny() -> Classifier {
        let spec = tiny_spec();
        let params = (0..spec.size()).map(|i| i as f32 / 10.).collect();
        Classifier::new(spec, params).unwrap()
    }

    fn blob(writer: BlobWriter) -> WeightBlob {
        WeightBlob::from_bytes(writer.to_bytes().unwrap()).unwrap()
    }

    fn loader() -> WeightLoader {
        WeightLoader::new(Registry::new([registry::mlp_128(), tiny_spec()]))
    }

    #[test]
    fn splits_common_tensor_names() {
        assert_eq!(split_name("dense/kernel"), Some(("dense", "kernel")));
        assert_eq!(
            split_name("dense_1/dense_1/kernel:0"),
            Some(("dense_1", "kernel"))
        );
        assert_eq!(
            split_name("model_weights/dense/dense/kernel:0"),
            Some(("dense", "kernel"))
        );
        assert_eq!(split_name("sequential/dense_1/bias"), Some(("dense_1", "bias")));
        assert_eq!(split_name("fc.weight"), Some(("fc", "weight")));
        assert_eq!(split_name("orphan"), None);
    }

    #[test]
    fn full_model_blobs_load_directly() {
        let loaded = loader()
            .load_blob(&blob(write_classifier(&tiny(), true).unwrap()))
            .unwrap();

        assert_eq!(loaded.origin, LoadOrigin::FullModel);
        assert_eq!(loaded.classifier.params(), tiny().params());
    }

    #[test]
    fn weights_only_blobs_fall_back_to_the_registry() {
        let loaded = loader()
            .load_blob(&blob(write_classifier(&tiny(), false).unwrap()))
            .unwrap();

        assert_eq!(loaded.origin, LoadOrigin::Reference("tiny".into()));
        assert_eq!(loaded.classifier.params(), tiny().params());
    }

    #[test]
    fn corrupt_configs_fall_back_too() {
        let writer = write_classifier(&tiny(), false)
            .unwrap()
            .metadata(MODEL_CONFIG_KEY, "{ not json");

        let loaded = loader().load_blob(&blob(writer)).unwrap();
        assert_eq!(loaded.origin, LoadOrigin::Reference("tiny".into()));
    }

    #[test]
    fn matches_renamed_layers_by_position() {
        let c = tiny();
        let params = c.params();

        // dense: 4 * 3 kernel + 3 bias, dense_1: 3 * 2 kernel + 2 bias
        let writer = BlobWriter::new()
            .tensor("hidden_2/kernel", &[4, 3], &params[..12])
            .tensor("hidden_2/bias", &[3], &params[12..15])
            .tensor("hidden_10/kernel", &[3, 2], &params[15..21])
            .tensor("hidden_10/bias", &[2], &params[21..]);

        let classifier = load_weights(&blob(writer), &tiny_spec()).unwrap();
        assert_eq!(classifier.params(), c.params());
    }

    #[test]
    fn transposes_out_in_weights() {
        let spec = ModelSpec {
            name: "t".into(),
            input_shape: vec![2],
            layers: vec![LayerSpec::Dense {
                dim: (2, 3),
                act_fn: None,
            }],
        };

        // (out, in) = (3, 2)
        let writer = BlobWriter::new()
            .tensor("fc.weight", &[3, 2], &[1., 2., 3., 4., 5., 6.])
            .tensor("fc.bias", &[3], &[0., 0., 0.]);

        let classifier = load_weights(&blob(writer), &spec).unwrap();
        assert_eq!(&classifier.params()[..6], &[1., 3., 5., 2., 4., 6.]);
    }

    #[test]
    fn mismatching_shapes_are_fatal() {
        let writer = BlobWriter::new()
            .tensor("dense/kernel", &[5, 3], &[0.; 15])
            .tensor("dense/bias", &[3], &[0.; 3])
            .tensor("dense_1/kernel", &[3, 2], &[0.; 6])
            .tensor("dense_1/bias", &[2], &[0.; 2]);

        let err = loader().load_blob(&blob(writer)).unwrap_err();
        let WeightsErr::NoCompatibleArchitecture { primary, attempts } = &err else {
            panic!("unexpected error {err}");
        };

        assert!(matches!(**primary, WeightsErr::MissingModelConfig));
        assert_eq!(attempts.len(), 2);
        assert!(matches!(
            attempts[1].1,
            WeightsErr::ShapeMismatch { ref got, .. } if got == &[5, 3]
        ));
        assert!(err.to_string().contains("mlp_128"));
    }

    #[test]
    fn layer_count_mismatch() {
        let writer = BlobWriter::new()
            .tensor("a/kernel", &[4, 3], &[0.; 12])
            .tensor("a/bias", &[3], &[0.; 3]);

        assert!(matches!(
            load_weights(&blob(writer), &tiny_spec()),
            Err(WeightsErr::LayerCountMismatch { got: 1, expected: 2 })
        ));
    }

    #[test]
    fn extra_stored_layers_are_rejected() {
        let writer = BlobWriter::new()
            .tensor("dense/kernel", &[784, 128], &vec![0.; 784 * 128])
            .tensor("dense/bias", &[128], &[0.; 128])
            .tensor("dense_1/kernel", &[128, 10], &[0.; 1280])
            .tensor("dense_1/bias", &[10], &[0.; 10])
            .tensor("dense_2/kernel", &[10, 10], &[0.; 100])
            .tensor("dense_2/bias", &[10], &[0.; 10]);

        assert!(matches!(
            load_weights(&blob(writer), &registry::mlp_128()),
            Err(WeightsErr::LayerCountMismatch { got: 3, expected: 2 })
        ));
    }

    #[test]
    fn model_prefixes_are_ignored() {
        let c = tiny();
        let params = c.params();

        let writer = BlobWriter::new()
            .tensor("model_weights/dense/dense/kernel:0", &[4, 3], &params[..12])
            .tensor("model_weights/dense/dense/bias:0", &[3], &params[12..15])
            .tensor("model_weights/dense_1/dense_1/kernel:0", &[3, 2], &params[15..21])
            .tensor("model_weights/dense_1/dense_1/bias:0", &[2], &params[21..]);

        let classifier = load_weights(&blob(writer), &tiny_spec()).unwrap();
        assert_eq!(classifier.params(), c.params());
    }

    #[test]
    fn duplicate_tensors_are_rejected() {
        let writer = BlobWriter::new()
            .tensor("a/dense/kernel", &[4, 3], &[0.; 12])
            .tensor("b/dense/kernel", &[4, 3], &[1.; 12])
            .tensor("dense/bias", &[3], &[0.; 3]);

        assert!(matches!(
            load_weights(&blob(writer), &tiny_spec()),
            Err(WeightsErr::DuplicateTensor(ref name)) if name == "dense/kernel"
        ));
    }
}
