use log::debug;
use machine_learning::{ActFnSpec, Classifier, LayerSpec};

use crate::{Dim, GraphDef, Node, Op, PortableGraph, Result, ValueInfo};

const BATCH: &str = "batch";
const PRODUCER: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

/// The names a graph exposes for its input and its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub input: String,
    pub output: String,
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            input: "input".into(),
            output: "output".into(),
        }
    }
}

/// Lowers a classifier into a portable graph.
///
/// Dropout layers vanish, flatten becomes a `Flatten` on axis 1 and every dense layer becomes a
/// `MatMul` against its kernel, an `Add` of its bias and its activation, if any. The input keeps
/// the classifier's sample shape behind a symbolic batch dimension.
///
/// # Arguments
/// * `classifier` - The model to lower.
/// * `opset` - The operator set version to declare.
/// * `signature` - The names of the graph's input and output.
///
/// # Returns
/// A validated graph or the reason it couldn't be built.
pub fn lower(classifier: &Classifier, opset: i64, signature: &Signature) -> Result<PortableGraph> {
    let spec = classifier.spec();
    let mut dense = classifier.dense_params()?.into_iter();
    let mut nodes = Vec::new();
    let mut initializers = Vec::new();
    let mut current = signature.input.clone();

    for layer in &spec.layers {
        match layer {
            LayerSpec::Flatten => {
                let op = Op::Flatten { axis: 1 };
                current = push(&mut nodes, "flatten".into(), op, vec![current]);
            }
            LayerSpec::Dropout { .. } => debug!("dropping dropout layer from the graph"),
            LayerSpec::Dense { .. } => {
                let Some(params) = dense.next() else {
                    break;
                };

                let kernel = format!("{}/kernel", params.name);
                let bias = format!("{}/bias", params.name);
                initializers.push((kernel.clone(), params.kernel.to_owned().into_dyn()));
                initializers.push((bias.clone(), params.bias.to_owned().into_dyn()));

                current = push(
                    &mut nodes,
                    format!("{}/MatMul", params.name),
                    Op::MatMul,
                    vec![current, kernel],
                );
                current = push(
                    &mut nodes,
                    format!("{}/BiasAdd", params.name),
                    Op::Add,
                    vec![current, bias],
                );

                current = match params.act_fn {
                    Some(ActFnSpec::Relu) => push(
                        &mut nodes,
                        format!("{}/Relu", params.name),
                        Op::Relu,
                        vec![current],
                    ),
                    Some(ActFnSpec::Softmax) => push(
                        &mut nodes,
                        format!("{}/Softmax", params.name),
                        Op::Softmax { axis: -1 },
                        vec![current],
                    ),
                    None => current,
                };
            }
        }
    }

    nodes.push(Node {
        name: signature.output.clone(),
        op: Op::Identity,
        inputs: vec![current],
        outputs: vec![signature.output.clone()],
    });

    let mut input_shape = vec![Dim::Symbolic(BATCH.into())];
    input_shape.extend(spec.input_shape.iter().map(|&n| Dim::Fixed(n)));
    let output_shape = vec![Dim::Symbolic(BATCH.into()), Dim::Fixed(classifier.num_classes())];

    let def = GraphDef {
        opset_version: opset,
        producer: PRODUCER.into(),
        inputs: vec![ValueInfo::float(signature.input.clone(), input_shape)],
        outputs: vec![ValueInfo::float(signature.output.clone(), output_shape)],
        nodes,
    };

    PortableGraph::new(def, initializers)
}

/// Appends a node and returns the name of the value it produces.
fn push(nodes: &mut Vec<Node>, name: String, op: Op, inputs: Vec<String>) -> String {
    let output = format!("{name}:0");
    nodes.push(Node {
        name,
        op,
        inputs,
        outputs: vec![output.clone()],
    });
    output
}
