use std::{fs, path::Path};

use log::debug;
use ndarray::{ArrayD, IxDyn};
use weights::{BlobWriter, Tensor, WeightBlob};

use crate::{GraphDef, GraphErr, Result};

/// Marks a tensor container as a portable graph.
pub const FORMAT: &str = "portable-graph/1";

const FORMAT_KEY: &str = "format";
const GRAPH_KEY: &str = "graph";

/// A graph definition together with its constant tensors, stored as a single file.
#[derive(Debug, Clone)]
pub struct PortableGraph {
    def: GraphDef,
    initializers: Vec<(String, ArrayD<f32>)>,
}

impl PortableGraph {
    /// Creates a new `PortableGraph`.
    ///
    /// # Arguments
    /// * `def` - The graph structure.
    /// * `initializers` - The named constant tensors its nodes read.
    ///
    /// # Returns
    /// The graph, or an error if `def` isn't valid given those initializers.
    pub fn new(def: GraphDef, initializers: Vec<(String, ArrayD<f32>)>) -> Result<Self> {
        def.validate(initializers.iter().map(|(name, _)| name.as_str()))?;
        Ok(Self { def, initializers })
    }

    pub fn def(&self) -> &GraphDef {
        &self.def
    }

    pub fn initializers(&self) -> &[(String, ArrayD<f32>)] {
        &self.initializers
    }

    pub fn initializer(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.initializers
            .iter()
            .find_map(|(n, tensor)| (n == name).then_some(tensor))
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("reading graph from {}", path.display());
        Self::from_blob(&WeightBlob::open(path)?)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_blob(&WeightBlob::from_bytes(data)?)
    }

    fn from_blob(blob: &WeightBlob) -> Result<Self> {
        let mut metadata = blob.metadata()?;

        match metadata.remove(FORMAT_KEY) {
            Some(format) if format == FORMAT => {}
            Some(format) => return Err(GraphErr::UnsupportedFormat(format!("format {format}"))),
            None => return Err(GraphErr::UnsupportedFormat("no format marker".into())),
        }

        let graph = metadata
            .remove(GRAPH_KEY)
            .ok_or_else(|| GraphErr::UnsupportedFormat("no graph definition".into()))?;
        let def: GraphDef = serde_json::from_str(&graph)?;

        let initializers = blob
            .entries()?
            .into_iter()
            .map(|entry| {
                let Tensor { shape, values } = blob.tensor(&entry.name)?;
                Ok((entry.name, ArrayD::from_shape_vec(IxDyn(&shape), values)?))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(def, initializers)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = BlobWriter::new()
            .metadata(FORMAT_KEY, FORMAT)
            .metadata(GRAPH_KEY, serde_json::to_string(&self.def)?);

        for (name, tensor) in &self.initializers {
            let values: Vec<f32> = tensor.iter().copied().collect();
            writer = writer.tensor(name.as_str(), tensor.shape(), &values);
        }

        Ok(writer.to_bytes()?)
    }

    /// Writes the graph to `path`, replacing any existing file.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        fs::write(path, bytes).map_err(|source| GraphErr::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
