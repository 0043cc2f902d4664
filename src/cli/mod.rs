//! CLI commands
//!
//! Converts digit classifiers into portable graphs and checks the result.

mod classify;
mod convert;
mod graph_convert;
mod inspect;
mod verify;

pub use classify::classify;
pub use convert::{ConvertOptions, convert};
pub use graph_convert::graph_convert;
pub use inspect::inspect;
pub use verify::verify;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use portable_graph::InferenceResult;

/// Export a pretrained digit classifier to a portable graph and verify it.
#[derive(Parser)]
#[command(name = "digit-export")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a weight blob, export it and convert it into a portable graph
    Convert {
        /// JSON configuration file, flags override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// Weight blob to convert
        #[arg(long)]
        weights: Option<PathBuf>,

        /// Where to write the portable graph
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Scratch directory for the interchange export
        #[arg(long)]
        interchange_dir: Option<PathBuf>,

        /// Keep the interchange directory after converting
        #[arg(long)]
        keep_interchange: bool,

        /// Operator set version of the produced graph
        #[arg(long)]
        opset: Option<i64>,

        /// Conversion tool to run instead of this executable
        #[arg(long)]
        tool: Option<PathBuf>,

        /// Argument for the conversion tool, may be repeated. {input}, {output} and {opset} are
        /// filled in
        #[arg(long = "tool-arg", allow_hyphen_values = true)]
        tool_args: Vec<String>,

        /// Seed for the smoke prediction
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run a portable graph on a set of test inputs
    Verify {
        /// JSON configuration file, flags override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// Portable graph to verify
        #[arg(long, short)]
        model: Option<PathBuf>,

        /// Digit picture to classify
        #[arg(long)]
        image: Option<PathBuf>,

        /// Skip the image scenario
        #[arg(long, conflicts_with = "image")]
        no_image: bool,

        /// Seed for the random input
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List the tensors and metadata of a weight blob
    Inspect {
        /// Weight blob
        weights: PathBuf,
    },

    /// Classify a digit picture with a portable graph
    Classify {
        /// Portable graph
        #[arg(long, short)]
        model: PathBuf,

        /// Digit picture
        image: PathBuf,
    },

    /// Convert an interchange directory into a portable graph
    #[command(hide = true)]
    GraphConvert {
        /// Interchange directory
        #[arg(long)]
        saved_model: PathBuf,

        /// Where to write the portable graph
        #[arg(long)]
        output: PathBuf,

        /// Operator set version of the produced graph
        #[arg(long, default_value_t = portable_graph::DEFAULT_OPSET)]
        opset: i64,
    },
}

const RULE: &str = "============================================================";

fn heading(title: &str) {
    println!("\n{RULE}\n{title}\n{RULE}");
}

fn print_prediction(result: &InferenceResult) {
    match (result.predicted_class(), result.confidence()) {
        (Some(class), Some(confidence)) => {
            println!("   Prediction: {class}");
            println!("   Confidence: {:.2}%", confidence * 100.);
        }
        _ => println!("   Prediction: none, every score is NaN"),
    }
}

fn print_probabilities(result: &InferenceResult) {
    println!("\nAll probabilities:");
    for (digit, p) in result.scores().iter().enumerate() {
        println!("   Digit {digit}: {:.4}%", p * 100.);
    }
}
