//! Per-artifact run state machine.
//!
//! `Loaded → Planned → Resolved → Applied → Verified → Committed`, with `Aborted` reachable
//! from any state. Each stage either advances the state or produces an abort carrying the last
//! state reached; nothing is written unless the run reaches `Committed`.

use crate::cancel::CancelSignal;
use crate::ports::ArtifactStore;
use crate::settings::RunSettings;
use crate::verify::verify;
use camino::Utf8Path;
use chrono::Utc;
use reviewfix_domain::{PatchPlanner, PlanError, PlanOutcome, paths_match};
use reviewfix_edit::{ApplyOutcome, apply_plan, render_patch, sha256_hex};
use reviewfix_oracle::{NO_CORRECTION, OracleClient};
use reviewfix_types::{
    AbortInfo, AbortKind, EditPlan, Finding, FindingId, FindingOutcome, FindingStatus, LineRange,
    RunState, RunSummary, SourceBuffer, ToolInfo,
};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Result of one artifact run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    /// Unified diff of the change; empty when nothing changed or the run aborted.
    pub patch: String,
}

/// Drives runs for one configuration. Cheap to share between concurrent runs.
pub struct Orchestrator<'a> {
    store: &'a dyn ArtifactStore,
    oracle: &'a OracleClient,
    settings: &'a RunSettings,
    tool: ToolInfo,
}

struct Abort {
    stage: RunState,
    kind: AbortKind,
    message: String,
}

fn abort(stage: RunState, kind: AbortKind, message: impl Into<String>) -> Abort {
    Abort {
        stage,
        kind,
        message: message.into(),
    }
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        store: &'a dyn ArtifactStore,
        oracle: &'a OracleClient,
        settings: &'a RunSettings,
        tool: ToolInfo,
    ) -> Self {
        Self {
            store,
            oracle,
            settings,
            tool,
        }
    }

    /// Run the pipeline for `artifact`. Never fails: problems end the run in `Aborted`.
    pub async fn run(
        &self,
        artifact: &Utf8Path,
        findings: &[Finding],
        cancel: &CancelSignal,
    ) -> RunOutcome {
        let mut run = Run::new(self.tool.clone(), artifact, findings, self.settings.dry_run);
        let result = self.drive(&mut run, artifact, findings, cancel).await;
        run.finish(result)
    }

    async fn drive(
        &self,
        run: &mut Run,
        artifact: &Utf8Path,
        findings: &[Finding],
        cancel: &CancelSignal,
    ) -> Result<(), Abort> {
        // Loaded
        let text = self
            .store
            .read(artifact)
            .map_err(|e| abort(RunState::Loaded, AbortKind::Io, format!("{e:#}")))?;
        let before = SourceBuffer::from_text(&text);
        let sha_before = sha256_hex(text.as_bytes());
        run.summary.sha256_before = Some(sha_before.clone());
        debug!(artifact = %artifact, lines = before.line_count(), "artifact loaded");
        check_cancel(cancel, RunState::Loaded)?;

        // Planned
        run.ledger.mark_other_artifacts(findings, artifact);
        let planned = match PatchPlanner::new(artifact).plan_buffer(findings, &before) {
            Ok(outcome) => outcome,
            Err(PlanError::NoValidFindings { target, rejections }) => {
                run.ledger.record_plan(&PlanOutcome {
                    rejections,
                    ..PlanOutcome::default()
                });
                return Err(abort(
                    RunState::Loaded,
                    AbortKind::InvalidRange,
                    format!("no valid findings remain for {target}"),
                ));
            }
            Err(err @ PlanError::Violation(_)) => {
                return Err(abort(RunState::Loaded, AbortKind::InvalidRange, err.to_string()));
            }
        };
        run.ledger.record_plan(&planned);
        run.transition(RunState::Planned);
        check_cancel(cancel, RunState::Planned)?;

        // Resolved
        let plan = self
            .resolve(run, planned.plan, &before, artifact, findings, cancel)
            .await?;
        run.transition(RunState::Resolved);
        check_cancel(cancel, RunState::Resolved)?;

        // Applied; from here on the run completes or aborts without observing cancellation.
        let applied = apply_plan(&before, plan)
            .map_err(|e| abort(RunState::Resolved, AbortKind::Apply, e.to_string()))?;
        run.transition(RunState::Applied);

        // Verified
        verify(&before, &applied)
            .map_err(|e| abort(RunState::Applied, AbortKind::Verify, e.to_string()))?;
        run.transition(RunState::Verified);

        // Committed
        let after_text = applied.buffer.to_text();
        if applied.changed && !self.settings.dry_run {
            self.commit(artifact, &sha_before, &after_text)?;
            run.summary.written = true;
        }
        run.summary.changed = applied.changed;
        run.summary.sha256_after = Some(sha256_hex(after_text.as_bytes()));
        run.patch = render_patch(artifact.as_str(), &text, &after_text);
        run.ledger.record_applied(&applied);
        run.transition(RunState::Committed);
        Ok(())
    }

    /// Fill pending edits through the oracle; unresolved ones are pruned from the plan.
    async fn resolve(
        &self,
        run: &mut Run,
        plan: EditPlan,
        before: &SourceBuffer,
        artifact: &Utf8Path,
        findings: &[Finding],
        cancel: &CancelSignal,
    ) -> Result<EditPlan, Abort> {
        let pending: BTreeSet<FindingId> = plan.pending_ids().into_iter().collect();
        if pending.is_empty() {
            return Ok(plan);
        }

        let wanted: Vec<Finding> = findings
            .iter()
            .filter(|f| pending.contains(&f.id) && paths_match(&f.file_path, artifact))
            .cloned()
            .collect();
        info!(artifact = %artifact, findings = wanted.len(), "resolving fixes through the oracle");

        let proposals = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(abort(
                    RunState::Planned,
                    AbortKind::Cancelled,
                    "cancelled while waiting for the oracle",
                ));
            }
            result = self.oracle.propose(before, &wanted) => result
                .map_err(|e| abort(RunState::Planned, AbortKind::OraclePermanent, e.to_string()))?,
        };

        let pending_edits: Vec<(LineRange, FindingId)> = plan
            .edits()
            .iter()
            .filter(|e| e.replacement.is_pending())
            .map(|e| (e.range, e.source_finding_id.clone()))
            .collect();
        let (resolved, _) = plan.resolve(&proposals.corrections);
        for (range, id) in pending_edits {
            if resolved.edits().iter().any(|e| e.range == range) {
                continue;
            }
            let reason = proposals
                .unresolved
                .get(&id)
                .map(String::as_str)
                .unwrap_or(NO_CORRECTION);
            warn!(artifact = %artifact, finding_id = %id, reason, "finding left unresolved");
            run.ledger.set_planned(
                range,
                FindingStatus::OracleUnresolved,
                Some(reason.to_string()),
            );
        }
        Ok(resolved)
    }

    fn commit(&self, artifact: &Utf8Path, sha_before: &str, after_text: &str) -> Result<(), Abort> {
        let write_abort = |message: String| abort(RunState::Verified, AbortKind::Write, message);

        if self.settings.require_unchanged_artifact {
            let current = self
                .store
                .read(artifact)
                .map_err(|e| write_abort(format!("{e:#}")))?;
            if sha256_hex(current.as_bytes()) != sha_before {
                return Err(write_abort(format!(
                    "{artifact} changed on disk since it was loaded"
                )));
            }
        }
        self.store
            .write_atomic(artifact, after_text)
            .map_err(|e| write_abort(format!("{e:#}")))?;
        info!(artifact = %artifact, bytes = after_text.len(), "artifact written");
        Ok(())
    }
}

fn check_cancel(cancel: &CancelSignal, stage: RunState) -> Result<(), Abort> {
    if cancel.is_cancelled() {
        return Err(abort(stage, AbortKind::Cancelled, "run cancelled"));
    }
    Ok(())
}

/// Mutable state of one run.
struct Run {
    summary: RunSummary,
    ledger: Ledger,
    patch: String,
}

impl Run {
    fn new(tool: ToolInfo, artifact: &Utf8Path, findings: &[Finding], dry_run: bool) -> Self {
        let mut summary = RunSummary::new(tool, artifact.as_str());
        summary.dry_run = dry_run;
        info!(run_id = %summary.run_id, artifact = %artifact, state = %summary.state, "run started");
        Self {
            summary,
            ledger: Ledger::new(findings),
            patch: String::new(),
        }
    }

    fn transition(&mut self, state: RunState) {
        debug!(
            run_id = %self.summary.run_id,
            artifact = %self.summary.artifact,
            from = %self.summary.state,
            to = %state,
            "transition"
        );
        self.summary.state = state;
    }

    fn finish(mut self, result: Result<(), Abort>) -> RunOutcome {
        if let Err(a) = result {
            warn!(
                run_id = %self.summary.run_id,
                artifact = %self.summary.artifact,
                stage = %a.stage,
                kind = %a.kind,
                message = %a.message,
                "run aborted"
            );
            self.ledger.abort_pending(&format!("run aborted: {}", a.kind));
            self.summary.state = RunState::Aborted;
            self.summary.changed = false;
            self.summary.written = false;
            self.summary.sha256_after = None;
            self.summary.abort = Some(AbortInfo {
                stage: a.stage,
                kind: a.kind,
                message: a.message,
            });
            self.patch.clear();
        }
        self.summary.ended_at = Some(Utc::now());
        self.summary.findings = self.ledger.outcomes;
        self.summary.recount();
        info!(
            run_id = %self.summary.run_id,
            artifact = %self.summary.artifact,
            state = %self.summary.state,
            changed = self.summary.changed,
            written = self.summary.written,
            "run finished"
        );
        RunOutcome {
            summary: self.summary,
            patch: self.patch,
        }
    }
}

/// Per-finding outcomes, in input order.
///
/// Every update is keyed by input position, so findings sharing an id stay apart.
struct Ledger {
    outcomes: Vec<FindingOutcome>,
    /// Positions whose status is still open.
    open: BTreeSet<usize>,
    /// Input position of each planned edit, by planned range.
    planned: HashMap<LineRange, usize>,
}

impl Ledger {
    fn new(findings: &[Finding]) -> Self {
        let outcomes = findings
            .iter()
            .map(|f| FindingOutcome {
                id: f.id.clone(),
                file_path: f.file_path.to_string(),
                range: f.range(),
                status: FindingStatus::NotApplied,
                changed: None,
                reason: None,
                kept_by: None,
            })
            .collect();
        Self {
            outcomes,
            open: (0..findings.len()).collect(),
            planned: HashMap::new(),
        }
    }

    /// Close the outcome at `pos`; false when it was already closed.
    fn close(&mut self, pos: usize, status: FindingStatus, reason: Option<String>) -> bool {
        if !self.open.remove(&pos) {
            return false;
        }
        let o = &mut self.outcomes[pos];
        o.status = status;
        o.reason = reason;
        true
    }

    /// Close the outcome of the finding planned at `range`.
    fn set_planned(
        &mut self,
        range: LineRange,
        status: FindingStatus,
        reason: Option<String>,
    ) -> Option<usize> {
        let pos = *self.planned.get(&range)?;
        self.close(pos, status, reason).then_some(pos)
    }

    fn record_plan(&mut self, plan: &PlanOutcome) {
        for r in &plan.rejections {
            self.close(r.position, FindingStatus::InvalidRange, Some(r.error.to_string()));
        }
        for c in &plan.conflicts {
            let reason = format!("overlaps {} kept at {}", c.dropped_range, c.kept_range);
            if self.close(c.dropped_position, FindingStatus::ConflictDropped, Some(reason)) {
                self.outcomes[c.dropped_position].kept_by = Some(c.kept.clone());
            }
        }
        self.planned = plan
            .plan
            .edits()
            .iter()
            .zip(&plan.edit_positions)
            .map(|(e, pos)| (e.range, *pos))
            .collect();
    }

    /// Findings addressed to other artifacts.
    fn mark_other_artifacts(&mut self, findings: &[Finding], artifact: &Utf8Path) {
        for (pos, f) in findings.iter().enumerate() {
            if !paths_match(&f.file_path, artifact) && self.open.remove(&pos) {
                self.outcomes[pos].status = FindingStatus::OtherArtifact;
            }
        }
    }

    fn record_applied(&mut self, applied: &ApplyOutcome) {
        for e in &applied.edits {
            let reason = e
                .already_present
                .then(|| format!("replacement already present at {}; skipped", e.range));
            if let Some(pos) = self.set_planned(e.range, FindingStatus::Applied, reason) {
                self.outcomes[pos].changed = Some(e.changed);
            }
        }
    }

    fn abort_pending(&mut self, reason: &str) {
        for pos in std::mem::take(&mut self.open) {
            let o = &mut self.outcomes[pos];
            o.status = FindingStatus::NotApplied;
            o.reason = Some(reason.to_string());
        }
    }
}
