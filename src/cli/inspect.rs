//! Inspect command

use std::path::PathBuf;

use anyhow::Result;
use weights::{MODEL_CONFIG_KEY, WeightBlob};

/// Lists every tensor stored in a weight blob, along with its metadata.
pub fn inspect(path: PathBuf) -> Result<()> {
    let blob = WeightBlob::open(&path)?;
    println!("Weights: {} ({} bytes)\n", path.display(), blob.byte_len());

    let mut metadata: Vec<_> = blob.metadata()?.into_iter().collect();
    metadata.sort();

    if metadata.is_empty() {
        println!("No metadata, weights only");
    }
    for (key, value) in &metadata {
        if key == MODEL_CONFIG_KEY {
            println!("{key}: {} bytes of model config", value.len());
        } else {
            println!("{key}: {value}");
        }
    }

    println!();
    let mut total = 0;
    for entry in blob.entries()? {
        let count: usize = entry.shape.iter().product();
        total += count;
        println!("  {:<32} {:<6} {:?}", entry.name, entry.dtype, entry.shape);
    }
    println!("\nTotal values: {total}");

    Ok(())
}
