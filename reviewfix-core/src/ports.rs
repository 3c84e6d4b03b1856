//! Port traits abstracting all I/O away from the pipeline.

use camino::Utf8Path;
use reviewfix_types::Finding;

/// Source of normalized findings.
pub trait FindingSource: Send + Sync {
    /// Where the findings come from, for reports.
    fn origin(&self) -> String;
    fn load_findings(&self) -> anyhow::Result<Vec<Finding>>;
}

/// Artifact storage.
pub trait ArtifactStore: Send + Sync {
    fn read(&self, path: &Utf8Path) -> anyhow::Result<String>;

    /// Replace the contents of `path`. Readers observe either the old or the new contents.
    fn write_atomic(&self, path: &Utf8Path, contents: &str) -> anyhow::Result<()>;
}
