//! Batch entry points, extracted from the CLI.
//!
//! These are I/O-agnostic: findings come through a [`FindingSource`] and artifacts through an
//! [`ArtifactStore`].

use crate::cancel::CancelSignal;
use crate::orchestrator::{Orchestrator, RunOutcome};
use crate::ports::{ArtifactStore, FindingSource};
use crate::settings::RunSettings;
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use futures::future::join_all;
use reviewfix_domain::{PatchPlanner, PlanOutcome, normalize_path};
use reviewfix_findings::FindingsLoadError;
use reviewfix_oracle::OracleClient;
use reviewfix_render::render_batch_md;
use reviewfix_types::{AbortInfo, AbortKind, Finding, RunState, RunSummary, ToolInfo};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Outcome of `run_batch`: one run per artifact, in processing order.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub runs: Vec<RunOutcome>,
}

impl BatchOutcome {
    pub fn summaries(&self) -> Vec<&RunSummary> {
        self.runs.iter().map(|r| &r.summary).collect()
    }

    /// 0 when every run committed (or there was nothing to do), 2 when any run aborted.
    pub fn exit_code(&self) -> u8 {
        self.runs
            .iter()
            .map(|r| r.summary.exit_code())
            .max()
            .unwrap_or(0)
    }

    /// Concatenated diffs of all runs.
    pub fn patch(&self) -> String {
        self.runs.iter().map(|r| r.patch.as_str()).collect()
    }

    pub fn summary_json(&self) -> anyhow::Result<String> {
        let mut json =
            serde_json::to_string_pretty(&self.summaries()).context("serialize run summaries")?;
        json.push('\n');
        Ok(json)
    }

    pub fn report_md(&self) -> String {
        let summaries: Vec<RunSummary> = self.runs.iter().map(|r| r.summary.clone()).collect();
        render_batch_md(&summaries)
    }
}

/// Artifacts to process: the requested ones, or every distinct finding path in input order.
pub fn select_artifacts(findings: &[Finding], requested: &[Utf8PathBuf]) -> Vec<Utf8PathBuf> {
    if !requested.is_empty() {
        return requested.to_vec();
    }
    let mut seen = BTreeSet::new();
    findings
        .iter()
        .map(|f| normalize_path(f.file_path.as_str()))
        .filter(|p| !p.is_empty() && seen.insert(p.clone()))
        .map(Utf8PathBuf::from)
        .collect()
}

/// Run every artifact concurrently; runs share nothing but the oracle budget.
pub async fn run_many(
    orchestrator: &Orchestrator<'_>,
    artifacts: &[Utf8PathBuf],
    findings: &[Finding],
    cancel: &CancelSignal,
) -> Vec<RunOutcome> {
    join_all(
        artifacts
            .iter()
            .map(|a| orchestrator.run(a, findings, cancel)),
    )
    .await
}

/// Load findings and run the pipeline for each selected artifact.
///
/// A findings file that cannot be loaded aborts every run before planning.
pub async fn run_batch(
    settings: &RunSettings,
    source: &dyn FindingSource,
    store: &dyn ArtifactStore,
    oracle: &OracleClient,
    tool: ToolInfo,
    cancel: &CancelSignal,
) -> BatchOutcome {
    let findings = match source.load_findings() {
        Ok(f) => f,
        Err(err) => return load_failure(settings, source, tool, &err),
    };
    let artifacts = select_artifacts(&findings, &settings.artifacts);
    info!(
        findings = findings.len(),
        artifacts = artifacts.len(),
        origin = %source.origin(),
        "starting batch"
    );

    let orchestrator = Orchestrator::new(store, oracle, settings, tool);
    let runs = run_many(&orchestrator, &artifacts, &findings, cancel).await;
    BatchOutcome { runs }
}

fn load_failure(
    settings: &RunSettings,
    source: &dyn FindingSource,
    tool: ToolInfo,
    err: &anyhow::Error,
) -> BatchOutcome {
    let kind = match err.downcast_ref::<FindingsLoadError>() {
        Some(FindingsLoadError::Io { .. }) => AbortKind::Io,
        Some(_) => AbortKind::Schema,
        None => AbortKind::Io,
    };
    let artifacts = if settings.artifacts.is_empty() {
        vec![Utf8PathBuf::from(source.origin())]
    } else {
        settings.artifacts.clone()
    };
    warn!(
        origin = %source.origin(),
        %kind,
        error = %format!("{err:#}"),
        "cannot load findings"
    );

    let runs = artifacts
        .into_iter()
        .map(|artifact| {
            let mut summary = RunSummary::new(tool.clone(), artifact.as_str());
            summary.dry_run = settings.dry_run;
            summary.state = RunState::Aborted;
            summary.ended_at = Some(Utc::now());
            summary.abort = Some(AbortInfo {
                stage: RunState::Loaded,
                kind,
                message: format!("{err:#}"),
            });
            RunOutcome {
                summary,
                patch: String::new(),
            }
        })
        .collect();
    BatchOutcome { runs }
}

/// `reviewfix plan` output: the edit plan with conflicts and rejections, before any oracle call.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub schema: String,
    pub artifact: String,
    pub line_count: usize,
    #[serde(flatten)]
    pub outcome: PlanOutcome,
}

pub fn plan_artifact(
    source: &dyn FindingSource,
    store: &dyn ArtifactStore,
    artifact: &Utf8Path,
) -> anyhow::Result<PlanReport> {
    let findings = source.load_findings()?;
    let text = store.read(artifact)?;
    let buffer = reviewfix_types::SourceBuffer::from_text(&text);
    let line_count = buffer.line_count();
    let outcome = PatchPlanner::new(artifact)
        .plan_buffer(&findings, &buffer)
        .with_context(|| format!("plan {}", artifact))?;
    debug!(artifact = %artifact, edits = outcome.plan.len(), "planned");
    Ok(PlanReport {
        schema: reviewfix_types::schema::REVIEWFIX_PLAN_V1.to_string(),
        artifact: artifact.to_string(),
        line_count,
        outcome,
    })
}

/// Write the JSON summaries and the combined patch to the given paths.
pub fn write_reports(
    batch: &BatchOutcome,
    summary_out: Option<&Utf8Path>,
    patch_out: Option<&Utf8Path>,
    writer: &dyn ArtifactStore,
) -> anyhow::Result<()> {
    if let Some(path) = summary_out {
        writer
            .write_atomic(path, &batch.summary_json()?)
            .with_context(|| format!("write summary {}", path))?;
    }
    if let Some(path) = patch_out {
        writer
            .write_atomic(path, &batch.patch())
            .with_context(|| format!("write patch {}", path))?;
    }
    Ok(())
}
