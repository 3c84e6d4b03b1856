//! Configuration file loading for reviewfix.
//!
//! Discovers and loads `reviewfix.toml` from the repository root.
//! Merges config file settings with CLI arguments (CLI takes precedence).

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use reviewfix_oracle::OracleConfig;
use serde::Deserialize;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "reviewfix.toml";

/// Top-level configuration from reviewfix.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReviewfixConfig {
    /// Oracle model, endpoint, retry and budget settings.
    pub oracle: OracleConfig,

    /// Pipeline behavior.
    pub run: RunConfig,
}

/// Run section of the config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Execute every stage but never write the artifact.
    pub dry_run: bool,

    /// Abort the commit when the artifact changed on disk since it was loaded.
    pub require_unchanged_artifact: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            require_unchanged_artifact: true,
        }
    }
}

/// Discover the reviewfix.toml config file.
///
/// Returns `None` if no config file is found in `repo_root`.
pub fn discover_config(repo_root: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = repo_root.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

pub fn load_config(path: &Utf8Path) -> anyhow::Result<ReviewfixConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

pub fn parse_config(contents: &str) -> anyhow::Result<ReviewfixConfig> {
    let config: ReviewfixConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load an explicit config file, else the one in `repo_root`, else defaults.
pub fn load_or_default(
    repo_root: &Utf8Path,
    explicit: Option<&Utf8Path>,
) -> anyhow::Result<ReviewfixConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match discover_config(repo_root) {
        Some(path) => load_config(&path),
        None => Ok(ReviewfixConfig::default()),
    }
}

/// Values from `reviewfix run` flags that may override the config file.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub dry_run: bool,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub retry_budget: Option<u32>,
    pub timeout_secs: Option<u64>,
}

/// Merged configuration combining config file and CLI arguments.
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub oracle: OracleConfig,
    pub dry_run: bool,
    pub require_unchanged_artifact: bool,
}

/// Builder for merging config file with CLI arguments.
pub struct ConfigMerger {
    config: ReviewfixConfig,
}

impl ConfigMerger {
    pub fn new(config: ReviewfixConfig) -> Self {
        Self { config }
    }

    /// Merge with run command CLI arguments.
    ///
    /// Flags given on the command line replace the file's values; `--dry-run` can only turn
    /// dry-run on.
    pub fn merge_run_args(self, cli: &RunOverrides) -> MergedConfig {
        let mut oracle = self.config.oracle;
        if let Some(model) = &cli.model {
            oracle.model_id = model.clone();
        }
        if let Some(t) = cli.temperature {
            oracle.temperature = t;
        }
        if let Some(n) = cli.retry_budget {
            oracle.retry_budget = n;
        }
        if let Some(s) = cli.timeout_secs {
            oracle.timeout_secs = s;
        }

        MergedConfig {
            oracle,
            dry_run: cli.dry_run || self.config.run.dry_run,
            require_unchanged_artifact: self.config.run.require_unchanged_artifact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let contents = r#"
[oracle]
model_id = "meta.llama3-8b-instruct-v1:0"
region = "eu-west-1"
endpoint = "http://localhost:9000/"
api_key_env = "MY_TOKEN"
max_output_length = 2048
temperature = 0.2
retry_budget = 5
timeout_secs = 10
max_concurrent_calls = 4
max_total_calls = 20

[oracle.backoff]
base_delay_ms = 250
multiplier = 3
max_delay_ms = 5000

[run]
dry_run = true
require_unchanged_artifact = false
"#;

        let config = parse_config(contents).unwrap();
        assert_eq!(config.oracle.model_id, "meta.llama3-8b-instruct-v1:0");
        assert_eq!(config.oracle.region, "eu-west-1");
        assert_eq!(config.oracle.endpoint_url(), "http://localhost:9000");
        assert_eq!(config.oracle.api_key_env, "MY_TOKEN");
        assert_eq!(config.oracle.max_output_length, 2048);
        assert_eq!(config.oracle.retry_budget, 5);
        assert_eq!(config.oracle.max_concurrent_calls, 4);
        assert_eq!(config.oracle.max_total_calls, Some(20));
        assert_eq!(config.oracle.backoff.base_delay_ms, 250);
        assert_eq!(config.oracle.backoff.multiplier, 3);
        assert!(config.run.dry_run);
        assert!(!config.run.require_unchanged_artifact);
    }

    #[test]
    fn test_parse_minimal_config() {
        let contents = r#"
[oracle]
retry_budget = 1
"#;

        let config = parse_config(contents).unwrap();
        assert_eq!(config.oracle.retry_budget, 1);
        // Defaults
        assert_eq!(config.oracle.model_id, reviewfix_oracle::DEFAULT_MODEL_ID);
        assert_eq!(config.oracle.max_output_length, 1024);
        assert_eq!(config.oracle.backoff.base_delay_ms, 500);
        assert!(!config.run.dry_run);
        assert!(config.run.require_unchanged_artifact);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse_config("").unwrap();
        assert_eq!(config.oracle, OracleConfig::default());
        assert!(config.run.require_unchanged_artifact);
    }

    #[test]
    fn test_parse_rejects_bad_types() {
        let err = parse_config("[oracle]\nretry_budget = \"many\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("invalid TOML"));
    }

    #[test]
    fn test_merge_cli_overrides_file() {
        let config = parse_config("[oracle]\ntemperature = 0.9\nretry_budget = 7\n").unwrap();
        let merged = ConfigMerger::new(config).merge_run_args(&RunOverrides {
            model: Some("other-model".to_string()),
            temperature: Some(0.1),
            ..Default::default()
        });

        assert_eq!(merged.oracle.model_id, "other-model");
        assert_eq!(merged.oracle.temperature, 0.1);
        // Not given on the CLI, so the file wins.
        assert_eq!(merged.oracle.retry_budget, 7);
        assert!(!merged.dry_run);
    }

    #[test]
    fn test_merge_dry_run_from_either_side() {
        let file = parse_config("[run]\ndry_run = true\n").unwrap();
        assert!(ConfigMerger::new(file).merge_run_args(&RunOverrides::default()).dry_run);

        let cli = RunOverrides {
            dry_run: true,
            ..Default::default()
        };
        assert!(
            ConfigMerger::new(ReviewfixConfig::default())
                .merge_run_args(&cli)
                .dry_run
        );
    }

    #[test]
    fn test_discover_config_some_and_none() {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        assert!(discover_config(&root).is_none());

        std::fs::write(root.join(CONFIG_FILE_NAME), "").expect("write config");
        assert!(discover_config(&root).is_some());
    }

    #[test]
    fn test_explicit_config_wins_over_discovered() {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        std::fs::write(root.join(CONFIG_FILE_NAME), "[oracle]\nretry_budget = 2\n").unwrap();
        let explicit = root.join("other.toml");
        std::fs::write(&explicit, "[oracle]\nretry_budget = 9\n").unwrap();

        let cfg = load_or_default(&root, Some(&explicit)).expect("load explicit");
        assert_eq!(cfg.oracle.retry_budget, 9);
        let cfg = load_or_default(&root, None).expect("load discovered");
        assert_eq!(cfg.oracle.retry_budget, 2);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        let err = load_or_default(&root, Some(&root.join("nope.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("nope.toml"));
    }
}
