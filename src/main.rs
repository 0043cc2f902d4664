mod cli;

use std::process;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands, ConvertOptions};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(cli.command) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    }
}

/// Runs a command, returning whether it succeeded.
fn run(command: Commands) -> Result<bool> {
    match command {
        Commands::Convert {
            config,
            weights,
            output,
            interchange_dir,
            keep_interchange,
            opset,
            tool,
            tool_args,
            seed,
        } => cli::convert(ConvertOptions {
            config,
            weights,
            output,
            interchange_dir,
            keep_interchange,
            opset,
            tool,
            tool_args,
            seed,
        }),
        Commands::Verify {
            config,
            model,
            image,
            no_image,
            seed,
        } => cli::verify(config, model, image, no_image, seed),
        Commands::Inspect { weights } => cli::inspect(weights).map(|_| true),
        Commands::Classify { model, image } => cli::classify(model, image).map(|_| true),
        Commands::GraphConvert {
            saved_model,
            output,
            opset,
        } => cli::graph_convert(saved_model, output, opset).map(|_| true),
    }
}
