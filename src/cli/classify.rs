//! Classify command

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use portable_graph::Session;

use super::{print_prediction, print_probabilities};

/// Classifies one digit picture with a portable graph.
pub fn classify(model: PathBuf, image: PathBuf) -> Result<()> {
    let session = Session::open(&model)
        .with_context(|| format!("loading graph {}", model.display()))?;

    let [input] = session.inputs() else {
        bail!("{} must have a single input", model.display());
    };
    let shape: Vec<usize> = input.shape.iter().map(|dim| dim.size_or(1)).collect();

    let x = pipeline::load_digit(&image, &shape)
        .with_context(|| format!("processing {}", image.display()))?;
    let Some(result) = session.predict(x)?.into_iter().next() else {
        bail!("the graph returned no scores");
    };

    println!("Image: {}", image.display());
    print_prediction(&result);
    print_probabilities(&result);

    Ok(())
}
