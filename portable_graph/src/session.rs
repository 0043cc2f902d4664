use std::{collections::HashMap, path::Path};

use log::debug;
use machine_learning::arch::activations::{Relu, Softmax};
use ndarray::{ArrayD, ArrayViewD, Axis, Ix2, IxDyn};

use crate::{GraphErr, InferenceResult, Node, Op, PortableGraph, Result, ValueInfo};

/// An inference session over a portable graph.
///
/// The graph is checked once when the session is created, after which it may be run any number
/// of times.
#[derive(Debug, Clone)]
pub struct Session {
    graph: PortableGraph,
}

impl Session {
    pub fn new(graph: PortableGraph) -> Self {
        Self { graph }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        PortableGraph::open(path).map(Self::new)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        PortableGraph::from_bytes(data).map(Self::new)
    }

    pub fn graph(&self) -> &PortableGraph {
        &self.graph
    }

    pub fn inputs(&self) -> &[ValueInfo] {
        &self.graph.def().inputs
    }

    pub fn outputs(&self) -> &[ValueInfo] {
        &self.graph.def().outputs
    }

    /// Evaluates the graph.
    ///
    /// # Arguments
    /// * `feeds` - One value for each graph input, by name.
    ///
    /// # Returns
    /// The graph outputs, in declaration order.
    pub fn run(&self, feeds: Vec<(String, ArrayD<f32>)>) -> Result<Vec<ArrayD<f32>>> {
        let mut values: HashMap<String, ArrayD<f32>> = feeds.into_iter().collect();

        for input in self.inputs() {
            let value = values
                .get(&input.name)
                .ok_or_else(|| GraphErr::MissingFeed(input.name.clone()))?;

            let shape = value.shape();
            let fits = shape.len() == input.shape.len()
                && input.shape.iter().zip(shape).all(|(dim, &n)| dim.accepts(n));

            if !fits {
                return Err(GraphErr::InputMismatch {
                    name: input.name.clone(),
                    got: shape.to_vec(),
                    expected: input.shape.clone(),
                });
            }
        }

        for node in &self.graph.def().nodes {
            let output = self.eval(node, &values)?;
            debug!("{} -> {:?}", node.name, output.shape());
            values.insert(node.outputs[0].clone(), output);
        }

        self.outputs()
            .iter()
            .map(|output| {
                values
                    .remove(&output.name)
                    .ok_or_else(|| GraphErr::Invalid(format!("{} was not produced", output.name)))
            })
            .collect()
    }

    /// Runs a batch through a single-input graph and splits its first output into one result
    /// per sample.
    pub fn predict(&self, x: ArrayD<f32>) -> Result<Vec<InferenceResult>> {
        let [input] = self.inputs() else {
            return Err(GraphErr::Invalid(format!(
                "predict needs a single input graph, this one has {}",
                self.inputs().len()
            )));
        };

        let outputs = self.run(vec![(input.name.clone(), x)])?;
        let scores = outputs
            .into_iter()
            .next()
            .ok_or_else(|| GraphErr::Invalid("the graph has no outputs".into()))?
            .into_dimensionality::<Ix2>()?;

        Ok(scores
            .rows()
            .into_iter()
            .map(|row| InferenceResult::new(row.to_vec()))
            .collect())
    }

    fn value<'a>(
        &'a self,
        values: &'a HashMap<String, ArrayD<f32>>,
        name: &str,
    ) -> Result<ArrayViewD<'a, f32>> {
        values
            .get(name)
            .or_else(|| self.graph.initializer(name))
            .map(|value| value.view())
            .ok_or_else(|| GraphErr::Invalid(format!("value {name} is undefined")))
    }

    fn eval(&self, node: &Node, values: &HashMap<String, ArrayD<f32>>) -> Result<ArrayD<f32>> {
        let x = self.value(values, &node.inputs[0])?;
        let op_err = |msg: String| GraphErr::Op {
            node: node.name.clone(),
            msg,
        };

        let y = match node.op {
            Op::Flatten { axis } => {
                // flattening on the rank itself yields a single column of whole samples
                let axis = normalize_axis(axis, x.ndim())
                    .or((axis == x.ndim() as i64).then_some(x.ndim()))
                    .ok_or_else(|| {
                        op_err(format!("axis {axis} out of range for rank {}", x.ndim()))
                    })?;
                let rows = x.shape()[..axis].iter().product::<usize>();
                let cols = x.shape()[axis..].iter().product::<usize>();

                x.as_standard_layout()
                    .into_owned()
                    .into_shape_with_order(IxDyn(&[rows, cols]))?
            }
            Op::MatMul => {
                let a = x.into_dimensionality::<Ix2>()?;
                let b = self.value(values, &node.inputs[1])?.into_dimensionality::<Ix2>()?;

                if a.ncols() != b.nrows() {
                    return Err(op_err(format!(
                        "can't multiply {:?} by {:?}",
                        a.shape(),
                        b.shape()
                    )));
                }

                a.dot(&b).into_dyn()
            }
            Op::Add => {
                let b = self.value(values, &node.inputs[1])?;
                let b = b.broadcast(x.raw_dim()).ok_or_else(|| {
                    op_err(format!("can't broadcast {:?} to {:?}", b.shape(), x.shape()))
                })?;

                &x + &b
            }
            Op::Relu => x.mapv(|z| Relu.f(z)),
            Op::Softmax { axis } => {
                let axis = normalize_axis(axis, x.ndim()).ok_or_else(|| {
                    op_err(format!("axis {axis} out of range for rank {}", x.ndim()))
                })?;

                let mut y = x.to_owned();
                Softmax.apply(y.view_mut(), Axis(axis));
                y
            }
            Op::Identity => x.to_owned(),
        };

        Ok(y)
    }
}

/// Resolves a possibly negative axis against a rank.
fn normalize_axis(axis: i64, rank: usize) -> Option<usize> {
    let rank = rank as i64;
    let axis = if axis < 0 { axis + rank } else { axis };
    (0..rank).contains(&axis).then_some(axis as usize)
}

#[cfg(test)]
mod tests {
    use ndarray::{Array, array};

    use super::*;
    use crate::{Dim, GraphDef, Node};

    fn node(name: &str, op: Op, inputs: &[&str]) -> Node {
        Node {
            name: name.into(),
            op,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: vec![format!("{name}:0")],
        }
    }

    /// x (batch, 2, 2) → flatten → matmul w (4, 2) → add b → softmax
    fn session() -> Session {
        let def = GraphDef {
            opset_version: 13,
            producer: "test".into(),
            inputs: vec![ValueInfo::float(
                "x",
                vec![Dim::Symbolic("n".into()), Dim::Fixed(2), Dim::Fixed(2)],
            )],
            outputs: vec![ValueInfo::float(
                "sm:0",
                vec![Dim::Symbolic("n".into()), Dim::Fixed(2)],
            )],
            nodes: vec![
                node("fl", Op::Flatten { axis: 1 }, &["x"]),
                node("mm", Op::MatMul, &["fl:0", "w"]),
                node("add", Op::Add, &["mm:0", "b"]),
                node("sm", Op::Softmax { axis: -1 }, &["add:0"]),
            ],
        };

        let w = array![[1., 0.], [0., 1.], [1., 0.], [0., 1.]].into_dyn();
        let b = array![0., 1.].into_dyn();
        let graph = PortableGraph::new(def, vec![("w".into(), w), ("b".into(), b)]).unwrap();
        Session::new(graph)
    }

    #[test]
    fn evaluates_nodes_in_order() {
        let x = array![[[1., 2.], [3., 4.]], [[0., 0.], [0., 0.]]].into_dyn();
        let results = session().predict(x).unwrap();

        // logits: [1 + 3, 2 + 4 + 1] = [4, 7] and [0, 1]
        let softmax = |a: f32, b: f32| {
            let (ea, eb) = (a.exp(), b.exp());
            [ea / (ea + eb), eb / (ea + eb)]
        };

        assert_eq!(results.len(), 2);
        for (result, expected) in results.iter().zip([softmax(4., 7.), softmax(0., 1.)]) {
            for (got, expected) in result.scores().iter().zip(expected) {
                assert!((got - expected).abs() < 1e-6);
            }
            assert_eq!(result.predicted_class(), Some(1));
        }
    }

    #[test]
    fn rejects_inputs_of_the_wrong_shape() {
        let x = Array::zeros(IxDyn(&[1, 3, 2]));
        assert!(matches!(
            session().predict(x),
            Err(GraphErr::InputMismatch { .. })
        ));

        let x = Array::zeros(IxDyn(&[1, 4]));
        assert!(session().predict(x).is_err());
    }

    #[test]
    fn missing_feeds() {
        let err = session()
            .run(vec![("y".into(), Array::zeros(IxDyn(&[1, 2, 2])))])
            .unwrap_err();
        assert!(matches!(err, GraphErr::MissingFeed(name) if name == "x"));
    }

    #[test]
    fn axes() {
        assert_eq!(normalize_axis(-1, 2), Some(1));
        assert_eq!(normalize_axis(1, 2), Some(1));
        assert_eq!(normalize_axis(2, 2), None);
        assert_eq!(normalize_axis(-3, 2), None);
    }
}
