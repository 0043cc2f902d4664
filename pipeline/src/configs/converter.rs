use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The arguments the bundled conversion tool is run with.
pub const DEFAULT_TOOL_ARGS: [&str; 7] = [
    "graph-convert",
    "--saved-model",
    "{input}",
    "--output",
    "{output}",
    "--opset",
    "{opset}",
];

/// How to run the external conversion tool.
///
/// Every argument may use the `{input}`, `{output}` and `{opset}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    /// The program to run, this very executable when unset.
    pub program: Option<PathBuf>,
    pub args: Vec<String>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: DEFAULT_TOOL_ARGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}
