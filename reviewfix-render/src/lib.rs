//! Rendering helpers (markdown) for human-readable run reports.

use reviewfix_types::{FindingStatus, RunSummary};

pub fn render_summary_md(summary: &RunSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("# reviewfix run: `{}`\n\n", summary.artifact));
    out.push_str(&format!("- Run: `{}`\n", summary.run_id));
    out.push_str(&format!("- State: `{}`\n", summary.state));
    out.push_str(&format!(
        "- Changed: {}{}\n",
        summary.changed,
        if summary.dry_run { " (dry run, not written)" } else { "" }
    ));
    if let (Some(before), Some(after)) = (&summary.sha256_before, &summary.sha256_after) {
        out.push_str(&format!("- sha256: {} → {}\n", short(before), short(after)));
    }
    let c = &summary.counts;
    out.push_str(&format!(
        "- Findings: {} (applied {}, conflict-dropped {}, oracle-unresolved {}, invalid-range {})\n",
        c.total, c.applied, c.conflict_dropped, c.oracle_unresolved, c.invalid_range
    ));

    if let Some(abort) = &summary.abort {
        out.push_str(&format!(
            "\n**Aborted** after `{}` ({}): {}\n",
            abort.stage,
            abort.kind,
            abort.message
        ));
    }

    out.push_str("\n## Findings\n\n");
    let relevant: Vec<_> = summary
        .findings
        .iter()
        .filter(|f| f.status != FindingStatus::OtherArtifact)
        .collect();
    if relevant.is_empty() {
        out.push_str("_No findings for this artifact._\n");
        return out;
    }

    out.push_str("| Finding | Lines | Status | Detail |\n");
    out.push_str("|---|---|---|---|\n");
    for f in relevant {
        let detail = match (f.status, &f.reason, &f.kept_by, f.changed) {
            (FindingStatus::ConflictDropped, _, Some(kept), _) => format!("kept `{kept}`"),
            (_, Some(reason), _, _) => reason.clone(),
            (FindingStatus::Applied, _, _, Some(false)) => "no change".to_string(),
            _ => String::new(),
        };
        out.push_str(&format!(
            "| `{}` | {} | `{}` | {} |\n",
            f.id,
            f.range,
            f.status,
            escape_cell(&detail)
        ));
    }
    out
}

/// One section per artifact, separated by rules.
pub fn render_batch_md(summaries: &[RunSummary]) -> String {
    let committed = summaries.iter().filter(|s| s.is_committed()).count();
    let mut out = format!(
        "# reviewfix batch\n\n- Artifacts: {}\n- Committed: {}\n- Aborted: {}\n",
        summaries.len(),
        committed,
        summaries.len() - committed
    );
    for s in summaries {
        out.push_str("\n---\n\n");
        let section = render_summary_md(s)
            .replacen("# ", "## ", 1)
            .replace("\n## Findings", "\n### Findings");
        out.push_str(&section);
    }
    out
}

fn short(sha: &str) -> &str {
    sha.get(..12).unwrap_or(sha)
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reviewfix_types::{
        AbortInfo, AbortKind, FindingId, FindingOutcome, LineRange, RunState, ToolInfo,
    };

    fn summary() -> RunSummary {
        let mut s = RunSummary::new(
            ToolInfo {
                name: "reviewfix".into(),
                version: None,
                commit: None,
            },
            "src/a.py",
        );
        s.state = RunState::Committed;
        s.changed = true;
        s.findings = vec![
            FindingOutcome {
                id: FindingId::from("0"),
                file_path: "src/a.py".into(),
                range: LineRange::new(2, 3),
                status: FindingStatus::Applied,
                changed: Some(true),
                reason: None,
                kept_by: None,
            },
            FindingOutcome {
                id: FindingId::from("1"),
                file_path: "src/a.py".into(),
                range: LineRange::new(3, 4),
                status: FindingStatus::ConflictDropped,
                changed: None,
                reason: Some("overlaps L2-L3".into()),
                kept_by: Some(FindingId::from("0")),
            },
            FindingOutcome {
                id: FindingId::from("2"),
                file_path: "src/b.py".into(),
                range: LineRange::new(1, 1),
                status: FindingStatus::OtherArtifact,
                changed: None,
                reason: None,
                kept_by: None,
            },
        ];
        s.recount();
        s
    }

    #[test]
    fn lists_findings_for_the_artifact_only() {
        let md = render_summary_md(&summary());
        assert!(md.contains("- State: `committed`\n"));
        assert!(md.contains("| `0` | L2-L3 | `applied` |  |\n"));
        assert!(md.contains("| `1` | L3-L4 | `conflict-dropped` | kept `0` |\n"));
        assert!(!md.contains("src/b.py"));
    }

    #[test]
    fn aborted_run_shows_reason() {
        let mut s = summary();
        s.state = RunState::Aborted;
        s.abort = Some(AbortInfo {
            stage: RunState::Verified,
            kind: AbortKind::Write,
            message: "disk full".into(),
        });
        let md = render_summary_md(&s);
        assert!(md.contains("**Aborted** after `verified` (write): disk full\n"));
    }

    #[test]
    fn batch_counts_committed_and_aborted() {
        let mut aborted = summary();
        aborted.state = RunState::Aborted;
        let md = render_batch_md(&[summary(), aborted]);
        let head: Vec<&str> = md.lines().take(5).collect();
        assert_eq!(
            head,
            vec![
                "# reviewfix batch",
                "",
                "- Artifacts: 2",
                "- Committed: 1",
                "- Aborted: 1"
            ]
        );
        assert!(md.contains("## reviewfix run: `src/a.py`"));
    }
}
