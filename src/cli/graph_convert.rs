//! Graph conversion tool, run out of process by `convert`

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;
use pipeline::Interchange;
use portable_graph::ValueInfo;

/// Lowers an interchange directory into a portable graph file.
pub fn graph_convert(saved_model: PathBuf, output: PathBuf, opset: i64) -> Result<()> {
    let interchange = Interchange::open(&saved_model)
        .with_context(|| format!("reading {}", saved_model.display()))?;
    info!(
        "converting {} with opset {opset}",
        interchange.manifest().model.name
    );

    let graph = portable_graph::lower(interchange.classifier(), opset, &interchange.signature())?;
    graph
        .write(&output)
        .with_context(|| format!("writing {}", output.display()))?;

    let def = graph.def();
    println!("inputs: {}", names(&def.inputs));
    println!("outputs: {}", names(&def.outputs));
    println!("nodes: {}", def.nodes.len());

    Ok(())
}

fn names(values: &[ValueInfo]) -> String {
    let names: Vec<_> = values.iter().map(|v| v.name.as_str()).collect();
    names.join(", ")
}
