use crate::finding::{FindingId, LineRange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

/// Orchestrator states. `Aborted` is terminal and reachable from any other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Loaded,
    Planned,
    Resolved,
    Applied,
    Verified,
    Committed,
    Aborted,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Committed | RunState::Aborted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Loaded => "loaded",
            RunState::Planned => "planned",
            RunState::Resolved => "resolved",
            RunState::Applied => "applied",
            RunState::Verified => "verified",
            RunState::Committed => "committed",
            RunState::Aborted => "aborted",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final disposition of one finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingStatus {
    Applied,
    ConflictDropped,
    OracleUnresolved,
    InvalidRange,
    OtherArtifact,
    /// The run aborted before this finding's edit was committed.
    NotApplied,
}

impl FindingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FindingStatus::Applied => "applied",
            FindingStatus::ConflictDropped => "conflict-dropped",
            FindingStatus::OracleUnresolved => "oracle-unresolved",
            FindingStatus::InvalidRange => "invalid-range",
            FindingStatus::OtherArtifact => "other-artifact",
            FindingStatus::NotApplied => "not-applied",
        }
    }
}

impl fmt::Display for FindingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingOutcome {
    pub id: FindingId,
    pub file_path: String,
    pub range: LineRange,
    pub status: FindingStatus,

    /// For applied findings: whether the edit changed the buffer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed: Option<bool>,

    /// Why the finding was not applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// For conflict drops: the finding whose edit was kept instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kept_by: Option<FindingId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbortKind {
    Schema,
    InvalidRange,
    OraclePermanent,
    Apply,
    Verify,
    Write,
    Cancelled,
    Io,
}

impl AbortKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AbortKind::Schema => "schema",
            AbortKind::InvalidRange => "invalid-range",
            AbortKind::OraclePermanent => "oracle-permanent",
            AbortKind::Apply => "apply",
            AbortKind::Verify => "verify",
            AbortKind::Write => "write",
            AbortKind::Cancelled => "cancelled",
            AbortKind::Io => "io",
        }
    }
}

impl fmt::Display for AbortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortInfo {
    /// The last state reached before aborting.
    pub stage: RunState,
    pub kind: AbortKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub total: u64,
    pub applied: u64,
    pub conflict_dropped: u64,
    pub oracle_unresolved: u64,
    pub invalid_range: u64,
    pub other_artifact: u64,
    pub not_applied: u64,
}

/// Machine-readable record of one pipeline run over one artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub schema: String,
    pub tool: ToolInfo,
    pub run_id: Uuid,
    pub artifact: String,
    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    pub state: RunState,
    pub changed: bool,
    pub written: bool,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256_before: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256_after: Option<String>,

    #[serde(default)]
    pub counts: SummaryCounts,

    #[serde(default)]
    pub findings: Vec<FindingOutcome>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort: Option<AbortInfo>,
}

impl RunSummary {
    pub fn new(tool: ToolInfo, artifact: impl Into<String>) -> Self {
        Self {
            schema: crate::schema::REVIEWFIX_SUMMARY_V1.to_string(),
            tool,
            run_id: Uuid::new_v4(),
            artifact: artifact.into(),
            started_at: Utc::now(),
            ended_at: None,
            state: RunState::Loaded,
            changed: false,
            written: false,
            dry_run: false,
            sha256_before: None,
            sha256_after: None,
            counts: SummaryCounts::default(),
            findings: vec![],
            abort: None,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.state == RunState::Committed
    }

    /// 0 on `Committed` (including the no-op case), 2 on `Aborted`.
    pub fn exit_code(&self) -> u8 {
        if self.is_committed() { 0 } else { 2 }
    }

    pub fn outcome(&self, id: &FindingId) -> Option<&FindingOutcome> {
        self.findings.iter().find(|f| &f.id == id)
    }

    pub fn recount(&mut self) {
        let mut counts = SummaryCounts {
            total: self.findings.len() as u64,
            ..SummaryCounts::default()
        };
        for f in &self.findings {
            match f.status {
                FindingStatus::Applied => counts.applied += 1,
                FindingStatus::ConflictDropped => counts.conflict_dropped += 1,
                FindingStatus::OracleUnresolved => counts.oracle_unresolved += 1,
                FindingStatus::InvalidRange => counts.invalid_range += 1,
                FindingStatus::OtherArtifact => counts.other_artifact += 1,
                FindingStatus::NotApplied => counts.not_applied += 1,
            }
        }
        self.counts = counts;
    }
}
