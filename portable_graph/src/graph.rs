use std::{collections::HashSet, fmt};

use serde::{Deserialize, Serialize};

use crate::{GraphErr, Result};

/// The oldest operator set version the runtime executes.
pub const MIN_OPSET: i64 = 11;

/// The newest operator set version the runtime executes.
pub const MAX_OPSET: i64 = 13;

/// The operator set version graphs are converted to unless told otherwise.
pub const DEFAULT_OPSET: i64 = 13;

/// The only element type graph values carry.
pub(crate) const FLOAT: &str = "float32";

/// One dimension of a declared value shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dim {
    Fixed(usize),
    /// A named dimension whose size is only known at run time, such as the batch size.
    Symbolic(String),
}

impl Dim {
    pub fn accepts(&self, size: usize) -> bool {
        match self {
            Self::Fixed(n) => *n == size,
            Self::Symbolic(_) => true,
        }
    }

    /// Returns the fixed size, or `default` for symbolic dimensions.
    pub fn size_or(&self, default: usize) -> usize {
        match self {
            Self::Fixed(n) => *n,
            Self::Symbolic(_) => default,
        }
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{n}"),
            Self::Symbolic(name) => write!(f, "{name}"),
        }
    }
}

/// A named graph input or output with its declared element type and shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueInfo {
    pub name: String,
    pub dtype: String,
    pub shape: Vec<Dim>,
}

impl ValueInfo {
    pub fn float<N: Into<String>>(name: N, shape: Vec<Dim>) -> Self {
        Self {
            name: name.into(),
            dtype: FLOAT.to_string(),
            shape,
        }
    }
}

/// The operators a graph node may apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    /// Collapses the dimensions before and from `axis` into a matrix.
    Flatten { axis: i64 },
    MatMul,
    /// Elementwise addition, broadcasting the second operand into the first.
    Add,
    Relu,
    Softmax { axis: i64 },
    Identity,
}

impl Op {
    /// Returns the amount of inputs the operator takes.
    pub fn arity(&self) -> usize {
        match self {
            Self::MatMul | Self::Add => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub op: Op,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// The structure of a portable graph: its signature and the nodes to evaluate, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDef {
    pub opset_version: i64,
    pub producer: String,
    pub inputs: Vec<ValueInfo>,
    pub outputs: Vec<ValueInfo>,
    pub nodes: Vec<Node>,
}

impl GraphDef {
    /// Checks that the graph can be evaluated front to back.
    ///
    /// Every value name is defined once, every node reads values defined before it and every
    /// graph output is produced.
    ///
    /// # Arguments
    /// * `initializers` - The names of the constant tensors stored alongside the graph.
    pub fn validate<'a, I>(&self, initializers: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        if !(MIN_OPSET..=MAX_OPSET).contains(&self.opset_version) {
            return Err(GraphErr::UnsupportedOpset(self.opset_version));
        }

        if self.inputs.is_empty() || self.outputs.is_empty() {
            return Err(GraphErr::Invalid(
                "a graph needs at least one input and one output".into(),
            ));
        }

        for value in self.inputs.iter().chain(&self.outputs) {
            if value.dtype != FLOAT {
                return Err(GraphErr::Invalid(format!(
                    "value {} has unsupported element type {}",
                    value.name, value.dtype
                )));
            }
        }

        let mut defined = HashSet::new();
        for name in initializers {
            define(&mut defined, name)?;
        }
        for input in &self.inputs {
            define(&mut defined, &input.name)?;
        }

        for node in &self.nodes {
            if node.inputs.len() != node.op.arity() || node.outputs.len() != 1 {
                return Err(GraphErr::Invalid(format!(
                    "node {} takes {} input(s) and produces 1 output, got {} and {}",
                    node.name,
                    node.op.arity(),
                    node.inputs.len(),
                    node.outputs.len()
                )));
            }

            if let Some(missing) = node.inputs.iter().find(|i| !defined.contains(*i)) {
                return Err(GraphErr::Invalid(format!(
                    "node {} reads {missing} before it is defined",
                    node.name
                )));
            }

            for output in &node.outputs {
                define(&mut defined, output)?;
            }
        }

        if let Some(missing) = self.outputs.iter().find(|o| !defined.contains(&o.name)) {
            return Err(GraphErr::Invalid(format!(
                "graph output {} is never produced",
                missing.name
            )));
        }

        Ok(())
    }
}

fn define(defined: &mut HashSet<String>, name: &str) -> Result<()> {
    if !defined.insert(name.to_string()) {
        return Err(GraphErr::Invalid(format!("value {name} is defined twice")));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> GraphDef {
        GraphDef {
            opset_version: DEFAULT_OPSET,
            producer: "test".into(),
            inputs: vec![ValueInfo::float(
                "x",
                vec![Dim::Symbolic("batch".into()), Dim::Fixed(2)],
            )],
            outputs: vec![ValueInfo::float(
                "y",
                vec![Dim::Symbolic("batch".into()), Dim::Fixed(3)],
            )],
            nodes: vec![
                Node {
                    name: "mm".into(),
                    op: Op::MatMul,
                    inputs: vec!["x".into(), "w".into()],
                    outputs: vec!["h".into()],
                },
                Node {
                    name: "sm".into(),
                    op: Op::Softmax { axis: -1 },
                    inputs: vec!["h".into()],
                    outputs: vec!["y".into()],
                },
            ],
        }
    }

    #[test]
    fn well_formed_graphs_pass() {
        graph().validate(["w"]).unwrap();
    }

    #[test]
    fn undefined_values_are_rejected() {
        let err = graph().validate([]).unwrap_err();
        assert!(err.to_string().contains("reads w"));
    }

    #[test]
    fn duplicates_and_unproduced_outputs_are_rejected() {
        assert!(graph().validate(["w", "x"]).is_err());

        let mut g = graph();
        g.outputs[0].name = "z".into();
        assert!(g.validate(["w"]).unwrap_err().to_string().contains("never produced"));
    }

    #[test]
    fn opset_must_be_supported() {
        let mut g = graph();
        g.opset_version = 9;
        assert!(matches!(g.validate(["w"]), Err(GraphErr::UnsupportedOpset(9))));
    }

    #[test]
    fn dims_serialize_untagged() {
        let shape = vec![Dim::Symbolic("batch".into()), Dim::Fixed(28)];
        let json = serde_json::to_string(&shape).unwrap();

        assert_eq!(json, r#"["batch",28]"#);
        assert_eq!(serde_json::from_str::<Vec<Dim>>(&json).unwrap(), shape);
    }
}
