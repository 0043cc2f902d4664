//! Verify command

use std::path::PathBuf;

use anyhow::{Context, Result};
use pipeline::{PipelineConfig, Scenario, ScenarioOutcome};

use super::{RULE, heading, print_prediction, print_probabilities};

/// Verifies a portable graph, returning whether every required scenario passed.
pub fn verify(
    config: Option<PathBuf>,
    model: Option<PathBuf>,
    image: Option<PathBuf>,
    no_image: bool,
    seed: Option<u64>,
) -> Result<bool> {
    let config = match &config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let model = model.unwrap_or(config.output);
    let mut verifier = config.verifier;
    if image.is_some() {
        verifier.image = image;
    }
    if no_image {
        verifier.image = None;
    }
    if seed.is_some() {
        verifier.seed = seed;
    }

    heading("Graph Verification");

    let report = pipeline::verify(&model, &verifier)?;
    println!("Model loaded successfully");

    let info = &report.info;
    let shape: Vec<_> = info.input_shape.iter().map(|d| d.to_string()).collect();
    println!("\nModel Info:");
    println!("  Input name: {}", info.input_name);
    println!("  Input shape: [{}]", shape.join(", "));
    println!("  Input type: {}", info.input_dtype);
    println!("  Output name: {}", info.output_name);

    for (i, scenario) in report.scenarios.iter().enumerate() {
        heading(&format!("Test {}: {}", i + 1, capitalize(&scenario.scenario.to_string())));

        match &scenario.outcome {
            ScenarioOutcome::Passed { result, normalized } => {
                println!("Model runs successfully");
                print_prediction(result);
                if !normalized {
                    let sum: f32 = result.scores().iter().sum();
                    println!("   Warning: scores add up to {sum}");
                }
                if matches!(scenario.scenario, Scenario::Image(_)) {
                    print_probabilities(result);
                }
            }
            ScenarioOutcome::Failed { reason, result } => {
                println!("Error: {reason}");
                if let Some(result) = result {
                    print_prediction(result);
                }
            }
            ScenarioOutcome::Skipped(reason) => println!("Skipped: {reason}"),
        }
    }

    println!("\n{RULE}");
    let passed = report.passed();
    if passed {
        println!("All tests completed successfully!");
    } else {
        println!("Verification failed");
    }
    println!("{RULE}");

    if let Some(size) = report.model_size {
        println!("Model size: {:.1} KB", size as f64 / 1024.);
    }

    Ok(passed)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
