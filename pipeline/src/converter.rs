use std::{
    env, fs, io,
    path::{Path, PathBuf},
    process::Command,
};

use log::{debug, info};

use crate::{PipelineError, Result, configs::ConverterConfig};

/// What the conversion tool left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOutcome {
    /// The tool's exit code, `None` if it was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub output: PathBuf,
    /// The size of the produced file, `None` if there's no such file.
    pub output_size: Option<u64>,
}

impl ConversionOutcome {
    /// Whether the tool exited cleanly and produced a non-empty file.
    pub fn succeeded(&self) -> bool {
        self.status == Some(0) && self.output_size.is_some_and(|size| size > 0)
    }
}

/// Runs an external program that turns an interchange directory into a portable graph.
#[derive(Debug, Clone)]
pub struct FormatConverter {
    program: PathBuf,
    args: Vec<String>,
}

impl FormatConverter {
    /// Creates a new `FormatConverter`.
    ///
    /// # Arguments
    /// * `program` - The tool to run.
    /// * `args` - Its arguments, where `{input}`, `{output}` and `{opset}` are replaced on each
    ///   run.
    ///
    /// # Returns
    /// A new `FormatConverter` instance.
    pub fn new<P: Into<PathBuf>>(program: P, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Builds the converter a configuration describes, defaulting to the running executable.
    pub fn from_config(config: &ConverterConfig) -> Result<Self> {
        let program = match &config.program {
            Some(program) => program.clone(),
            None => env::current_exe().map_err(|source| PipelineError::Spawn {
                program: PathBuf::from("<current executable>"),
                source,
            })?,
        };

        Ok(Self::new(program, config.args.clone()))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Returns the arguments for one run, placeholders filled in.
    pub fn args_for(&self, input: &Path, output: &Path, opset: i64) -> Vec<String> {
        let input = input.display().to_string();
        let output = output.display().to_string();
        let opset = opset.to_string();

        self.args
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input)
                    .replace("{output}", &output)
                    .replace("{opset}", &opset)
            })
            .collect()
    }

    /// Runs the tool and waits for it to exit.
    ///
    /// Any file already at `output` is removed first, so only what this run writes counts. A tool
    /// that runs and fails is not an error: its exit code and output are reported in the outcome.
    ///
    /// # Errors
    /// Fails if a stale output can't be removed or the tool can't be started.
    pub fn convert(&self, input: &Path, output: &Path, opset: i64) -> Result<ConversionOutcome> {
        match fs::remove_file(output) {
            Ok(()) => info!("removed stale {}", output.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(PipelineError::io(output)(e)),
        }

        let args = self.args_for(input, output, opset);
        info!("running {} {}", self.program.display(), args.join(" "));

        let result = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|source| PipelineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let output_size = fs::metadata(output).ok().map(|m| m.len());
        debug!(
            "{} exited with {:?}, output size {output_size:?}",
            self.program.display(),
            result.status.code()
        );

        Ok(ConversionOutcome {
            status: result.status.code(),
            stdout: String::from_utf8_lossy(&result.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            output: output.to_path_buf(),
            output_size,
        })
    }
}
