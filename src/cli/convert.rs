//! Convert command

use std::path::PathBuf;

use anyhow::{Context, Result};
use machine_learning::{LayerSpec, ModelSpec, spec::dense_name};
use pipeline::PipelineConfig;
use weights::LoadOrigin;

use super::heading;

/// Flags given to `convert`, each overriding its configuration value.
pub struct ConvertOptions {
    pub config: Option<PathBuf>,
    pub weights: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub interchange_dir: Option<PathBuf>,
    pub keep_interchange: bool,
    pub opset: Option<i64>,
    pub tool: Option<PathBuf>,
    pub tool_args: Vec<String>,
    pub seed: Option<u64>,
}

impl ConvertOptions {
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(weights) = self.weights {
            config.weights = weights;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(dir) = self.interchange_dir {
            config.interchange_dir = dir;
        }
        if let Some(opset) = self.opset {
            config.opset = opset;
        }
        if let Some(tool) = self.tool {
            config.converter.program = Some(tool);
        }
        if !self.tool_args.is_empty() {
            config.converter.args = self.tool_args;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.keep_interchange |= self.keep_interchange;

        Ok(config)
    }
}

/// Converts a weight blob into a portable graph, returning whether the tool succeeded.
pub fn convert(options: ConvertOptions) -> Result<bool> {
    let config = options.into_config()?;
    let report = pipeline::convert(&config)?;

    match &report.origin {
        LoadOrigin::FullModel => println!("Model loaded successfully"),
        LoadOrigin::Reference(name) => {
            println!("Direct load failed, weights loaded into reference architecture {name}")
        }
    }

    print_summary(&report.model);
    println!("\nModel works! Output shape: {:?}", report.smoke.output_shape);
    if let Some(class) = report.smoke.predicted_class {
        println!("Test prediction: {class}");
    }
    println!("Exported to {}", config.interchange_dir.display());

    print!("{}", report.outcome.stdout);

    if !report.succeeded() {
        println!("Conversion failed (exit code {:?}):", report.outcome.status);
        eprint!("{}", report.outcome.stderr);
        return Ok(false);
    }

    println!("SUCCESS! {} created", config.output.display());
    if let Some(summary) = &report.summary {
        println!("\nGraph Info:");
        println!("  Inputs: {:?}", summary.inputs);
        println!("  Outputs: {:?}", summary.outputs);
        println!("  File size: {:.2} KB", summary.size_kb());
    }

    println!("\nDone!");
    Ok(true)
}

/// Prints every layer with its output shape and parameter count.
fn print_summary(spec: &ModelSpec) {
    heading(&format!("Model: \"{}\"", spec.name));
    println!("{:<20}{:<20}{:>12}", "Layer", "Output Shape", "Param #");

    let mut shape: Vec<String> = spec.input_shape.iter().map(|n| n.to_string()).collect();
    let (mut ndense, mut nflatten, mut ndropout) = (0, 0, 0);

    for layer in &spec.layers {
        let (name, params) = match *layer {
            LayerSpec::Flatten => {
                let width: usize = spec.input_shape.iter().product();
                shape = vec![width.to_string()];
                (numbered("flatten", &mut nflatten), 0)
            }
            LayerSpec::Dense { dim: (n, m), .. } => {
                shape = vec![m.to_string()];
                ndense += 1;
                (dense_name(ndense - 1), (n + 1) * m)
            }
            LayerSpec::Dropout { .. } => (numbered("dropout", &mut ndropout), 0),
        };

        let shape = format!("(None, {})", shape.join(", "));
        println!("{name:<20}{shape:<20}{params:>12}");
    }

    println!("Total params: {}", spec.size());
}

fn numbered(kind: &str, count: &mut usize) -> String {
    let name = match *count {
        0 => kind.to_string(),
        i => format!("{kind}_{i}"),
    };
    *count += 1;
    name
}
