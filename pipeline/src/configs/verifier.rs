use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifierConfig {
    /// A real digit image to classify, skipped if the file doesn't exist.
    pub image: Option<PathBuf>,
    /// Seeds the random input, making runs reproducible.
    pub seed: Option<u64>,
    /// How far from one the scores of a sample may add up to and still count as normalized.
    pub tolerance: f32,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            image: Some(PathBuf::from("test.png")),
            seed: None,
            tolerance: 1e-3,
        }
    }
}
