use crate::schema::{SchemaError, SchemaVariant, normalize};
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use reviewfix_types::Finding;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingsFormat {
    Json,
    Yaml,
}

impl FindingsFormat {
    /// `.yaml`/`.yml` are YAML; anything else is read as JSON.
    pub fn from_path(path: &Utf8Path) -> Self {
        match path.extension().map(|e| e.to_ascii_lowercase()).as_deref() {
            Some("yaml") | Some("yml") => FindingsFormat::Yaml,
            _ => FindingsFormat::Json,
        }
    }
}

#[derive(Debug, Error)]
pub enum FindingsLoadError {
    #[error("io error: {message}")]
    Io { message: String },

    #[error("parse error: {message}")]
    Parse { message: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[derive(Debug, Clone)]
pub struct LoadedFindings {
    pub path: Utf8PathBuf,
    pub variant: SchemaVariant,
    pub findings: Vec<Finding>,
}

pub fn load_findings(path: &Utf8Path) -> Result<LoadedFindings, FindingsLoadError> {
    debug!(path = %path, "loading findings");

    let text = fs::read_to_string(path).map_err(|e| FindingsLoadError::Io {
        message: e.to_string(),
    })?;

    let (variant, findings) = parse_findings(&text, FindingsFormat::from_path(path))?;

    debug!(path = %path, ?variant, count = findings.len(), "loaded findings");
    Ok(LoadedFindings {
        path: path.to_path_buf(),
        variant,
        findings,
    })
}

pub fn parse_findings(
    text: &str,
    format: FindingsFormat,
) -> Result<(SchemaVariant, Vec<Finding>), FindingsLoadError> {
    let doc: serde_json::Value = match format {
        FindingsFormat::Json => serde_json::from_str(text).map_err(|e| FindingsLoadError::Parse {
            message: e.to_string(),
        })?,
        FindingsFormat::Yaml => serde_yaml::from_str(text).map_err(|e| FindingsLoadError::Parse {
            message: e.to_string(),
        })?,
    };
    Ok(normalize(&doc)?)
}
