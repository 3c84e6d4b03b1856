//! Clap-free settings for the run pipeline.

use camino::Utf8PathBuf;

/// Artifact paths are resolved by the [`crate::ports::ArtifactStore`], which owns the
/// repository root.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Artifacts to process; empty means every distinct path named by the findings.
    pub artifacts: Vec<Utf8PathBuf>,
    pub dry_run: bool,
    /// Re-hash the artifact before writing and abort if it changed since load.
    pub require_unchanged_artifact: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            artifacts: Vec::new(),
            dry_run: false,
            require_unchanged_artifact: true,
        }
    }
}
