//! Default filesystem-backed port implementations, plus in-memory ones for embedding and tests.

use crate::ports::{ArtifactStore, FindingSource};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use reviewfix_types::Finding;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Loads findings from a JSON or YAML file via `reviewfix_findings::load_findings`.
#[derive(Debug, Clone)]
pub struct FsFindingSource {
    pub path: Utf8PathBuf,
}

impl FsFindingSource {
    pub fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }
}

impl FindingSource for FsFindingSource {
    fn origin(&self) -> String {
        self.path.to_string()
    }

    fn load_findings(&self) -> anyhow::Result<Vec<Finding>> {
        let loaded = reviewfix_findings::load_findings(&self.path)
            .with_context(|| format!("load findings from {}", self.path))?;
        Ok(loaded.findings)
    }
}

/// Pre-normalized findings held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFindingSource {
    findings: Vec<Finding>,
}

impl InMemoryFindingSource {
    pub fn new(findings: Vec<Finding>) -> Self {
        Self { findings }
    }
}

impl FindingSource for InMemoryFindingSource {
    fn origin(&self) -> String {
        "<memory>".to_string()
    }

    fn load_findings(&self) -> anyhow::Result<Vec<Finding>> {
        Ok(self.findings.clone())
    }
}

/// Artifacts on disk, relative paths resolved against `root`.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    pub root: Utf8PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    fn resolve(&self, path: &Utf8Path) -> Utf8PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl ArtifactStore for FsArtifactStore {
    fn read(&self, path: &Utf8Path) -> anyhow::Result<String> {
        let abs = self.resolve(path);
        fs::read_to_string(&abs).with_context(|| format!("read {}", abs))
    }

    /// Write to a temporary file in the same directory, then rename it over `path`.
    fn write_atomic(&self, path: &Utf8Path, contents: &str) -> anyhow::Result<()> {
        let abs = self.resolve(path);
        let dir = match abs.parent() {
            Some(p) if !p.as_str().is_empty() => p.to_path_buf(),
            _ => Utf8PathBuf::from("."),
        };
        fs::create_dir_all(&dir).with_context(|| format!("create parent dir for {}", abs))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("create temporary file in {}", dir))?;
        tmp.write_all(contents.as_bytes())
            .with_context(|| format!("write temporary file for {}", abs))?;
        tmp.as_file()
            .sync_all()
            .with_context(|| format!("sync temporary file for {}", abs))?;
        if let Ok(meta) = fs::metadata(&abs) {
            tmp.as_file()
                .set_permissions(meta.permissions())
                .with_context(|| format!("copy permissions of {}", abs))?;
        }
        tmp.persist(&abs)
            .map_err(|e| e.error)
            .with_context(|| format!("replace {}", abs))?;
        debug!(path = %abs, bytes = contents.len(), "wrote artifact");
        Ok(())
    }
}

/// Artifacts held in memory, keyed by the path as given.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    files: Mutex<BTreeMap<Utf8PathBuf, String>>,
    fail_writes: bool,
    writes: Mutex<u64>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<Utf8PathBuf>, contents: impl Into<String>) -> Self {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), contents.into());
        self
    }

    /// Every write fails and leaves the stored contents untouched.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(Utf8Path::new(path))
            .cloned()
    }

    pub fn writes(&self) -> u64 {
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn read(&self, path: &Utf8Path) -> anyhow::Result<String> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .with_context(|| format!("read {}: not found", path))
    }

    fn write_atomic(&self, path: &Utf8Path, contents: &str) -> anyhow::Result<()> {
        if self.fail_writes {
            anyhow::bail!("write {}: store is read-only", path);
        }
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), contents.to_string());
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}
