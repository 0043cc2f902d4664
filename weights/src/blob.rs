use std::{cmp::Ordering, collections::HashMap, fs, path::Path};

use machine_learning::Classifier;
use safetensors::{Dtype, SafeTensors, tensor::TensorView};

use crate::{Result, WeightsErr, codec};

/// Metadata key under which a full-model blob stores its architecture as JSON.
pub const MODEL_CONFIG_KEY: &str = "model_config";

/// A name, dtype and shape triple describing one stored tensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorEntry {
    pub name: String,
    pub dtype: String,
    pub shape: Vec<usize>,
}

/// A tensor decoded to `f32`, its values in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

/// A serialized weight container mapping tensor names to tensors, plus string metadata.
#[derive(Debug, Clone)]
pub struct WeightBlob {
    data: Vec<u8>,
}

impl WeightBlob {
    /// Reads a blob from disk.
    ///
    /// # Errors
    /// Fails if the file can't be read or isn't a valid tensor container.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| WeightsErr::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_bytes(data)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        SafeTensors::deserialize(&data)?;
        Ok(Self { data })
    }

    /// Returns the size of the serialized blob in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Returns the blob's string metadata, empty if it has none.
    pub fn metadata(&self) -> Result<HashMap<String, String>> {
        let (_, metadata) = SafeTensors::read_metadata(&self.data)?;
        Ok(metadata.metadata().clone().unwrap_or_default())
    }

    /// Returns the JSON architecture a full-model save embeds, if any.
    pub fn model_config(&self) -> Result<Option<String>> {
        Ok(self.metadata()?.remove(MODEL_CONFIG_KEY))
    }

    /// Lists every stored tensor, sorted by name in natural order.
    pub fn entries(&self) -> Result<Vec<TensorEntry>> {
        let tensors = SafeTensors::deserialize(&self.data)?;
        let mut entries: Vec<_> = tensors
            .tensors()
            .into_iter()
            .map(|(name, view)| TensorEntry {
                name,
                dtype: format!("{:?}", view.dtype()),
                shape: view.shape().to_vec(),
            })
            .collect();

        entries.sort_by(|a, b| natural_cmp(&a.name, &b.name));
        Ok(entries)
    }

    /// Decodes the tensor called `name`.
    pub fn tensor(&self, name: &str) -> Result<Tensor> {
        let tensors = SafeTensors::deserialize(&self.data)?;
        let view = tensors
            .tensor(name)
            .map_err(|_| WeightsErr::MissingTensor(name.to_string()))?;

        Ok(Tensor {
            shape: view.shape().to_vec(),
            values: codec::decode_f32(name, view.dtype(), view.data())?,
        })
    }
}

/// Accumulates `f32` tensors and metadata and serializes them as a single container.
#[derive(Debug, Default)]
pub struct BlobWriter {
    tensors: Vec<(String, Vec<usize>, Vec<u8>)>,
    metadata: HashMap<String, String>,
}

impl BlobWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Adds a tensor.
    ///
    /// # Arguments
    /// * `name` - The tensor's name, unique within the blob.
    /// * `shape` - Its dimensions.
    /// * `values` - Its row-major values, as many as the shape holds.
    pub fn tensor<N: Into<String>>(mut self, name: N, shape: &[usize], values: &[f32]) -> Self {
        self.tensors
            .push((name.into(), shape.to_vec(), codec::encode_f32(values)));
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let views = self
            .tensors
            .iter()
            .map(|(name, shape, bytes)| {
                Ok((name.as_str(), TensorView::new(Dtype::F32, shape.clone(), bytes)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let metadata = (!self.metadata.is_empty()).then(|| self.metadata.clone());
        Ok(safetensors::serialize(views, &metadata)?)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_bytes()?).map_err(|source| WeightsErr::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Lays a classifier's dense parameters out as `<layer>/kernel` and `<layer>/bias` tensors.
///
/// # Arguments
/// * `classifier` - The model to serialize.
/// * `with_config` - Whether to embed the architecture, as a full-model save does, or store
///   the weights alone.
pub fn write_classifier(classifier: &Classifier, with_config: bool) -> Result<BlobWriter> {
    let mut writer = BlobWriter::new();

    if with_config {
        writer = writer.metadata(MODEL_CONFIG_KEY, serde_json::to_string(classifier.spec())?);
    }

    for dense in classifier.dense_params()? {
        let kernel: Vec<f32> = dense.kernel.iter().copied().collect();
        let bias: Vec<f32> = dense.bias.iter().copied().collect();

        writer = writer
            .tensor(format!("{}/kernel", dense.name), dense.kernel.shape(), &kernel)
            .tensor(format!("{}/bias", dense.name), dense.bias.shape(), &bias);
    }

    Ok(writer)
}

/// Orders names so that numeric runs compare by value: `dense_2` sorts before `dense_10`.
pub(crate) fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a, b);

    loop {
        match (a.chars().next(), b.chars().next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let a_end = a.find(|c: char| !c.is_ascii_digit()).unwrap_or(a.len());
                let b_end = b.find(|c: char| !c.is_ascii_digit()).unwrap_or(b.len());
                let a_num = a[..a_end].trim_start_matches('0');
                let b_num = b[..b_end].trim_start_matches('0');

                let ord = a_num.len().cmp(&b_num.len()).then_with(|| a_num.cmp(b_num));
                if ord != Ordering::Equal {
                    return ord;
                }

                a = &a[a_end..];
                b = &b[b_end..];
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }

                a = &a[x.len_utf8()..];
                b = &b[y.len_utf8()..];
            }
        }
    }
}
