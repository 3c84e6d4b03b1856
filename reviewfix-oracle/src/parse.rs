//! Tolerant decoding of oracle replies.
//!
//! Generative models wrap JSON in prose or markdown fences often enough that strict parsing
//! would turn most good answers into retries. Candidates are tried in order: the raw reply, the
//! reply without fences, then every balanced JSON value found inside either.

use crate::error::OracleError;
use reviewfix_types::FindingId;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

const MAX_CANDIDATES: usize = 8;

/// Decode a reply into `id -> replacement`, keeping only ids in `requested`.
///
/// Blank replacements mean "no correction available" and are left out. A reply with no
/// decodable corrections object is a transient failure.
pub fn parse_corrections(
    reply: &str,
    requested: &BTreeSet<FindingId>,
) -> Result<BTreeMap<FindingId, String>, OracleError> {
    let raw = candidates(reply)
        .iter()
        .filter_map(|c| serde_json::from_str::<Value>(c).ok())
        .find_map(|v| interpret(&v))
        .ok_or_else(|| OracleError::transient("malformed oracle reply: no corrections object"))?;

    let mut out = BTreeMap::new();
    for (id, text) in raw {
        let id = FindingId::new(id);
        if !requested.contains(&id) {
            warn!(finding_id = %id, "oracle answered for a finding it was not asked about");
            continue;
        }
        if text.trim().is_empty() {
            continue;
        }
        out.insert(id, text);
    }
    Ok(out)
}

/// `{"corrections":[{"id","replacement"}]}` or a bare `{id: text}` object.
fn interpret(value: &Value) -> Option<Vec<(String, String)>> {
    let obj = value.as_object()?;

    if let Some(list) = obj.get("corrections") {
        let items = list.as_array()?;
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let Some(id) = item.get("id").and_then(id_string) else {
                continue;
            };
            let text = item
                .get("replacement")
                .and_then(Value::as_str)
                .unwrap_or_default();
            out.push((id, text.to_string()));
        }
        return Some(out);
    }

    if obj.is_empty() || !obj.values().all(|v| v.is_string() || v.is_null()) {
        return None;
    }
    Some(
        obj.iter()
            .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
            .collect(),
    )
}

fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn candidates(content: &str) -> Vec<String> {
    let mut out = Vec::new();
    push_unique(&mut out, content);
    if let Some(stripped) = strip_markdown_fences(content) {
        push_unique(&mut out, &stripped);
    }
    let mut idx = 0;
    while idx < out.len() && out.len() < MAX_CANDIDATES {
        let current = out[idx].clone();
        for (start, ch) in current.char_indices() {
            if ch == '{'
                && let Some(found) = balanced_json_from(&current, start)
            {
                push_unique(&mut out, found);
                if out.len() >= MAX_CANDIDATES {
                    break;
                }
            }
        }
        idx += 1;
    }
    out
}

fn push_unique(out: &mut Vec<String>, candidate: &str) {
    let trimmed = candidate.trim();
    if !trimmed.is_empty() && !out.iter().any(|c| c == trimmed) {
        out.push(trimmed.to_string());
    }
}

fn strip_markdown_fences(content: &str) -> Option<String> {
    let start = content.find("```")?;
    let after_open = &content[start + 3..];
    let body = match after_open.find('\n') {
        Some(nl) => &after_open[nl + 1..],
        None => after_open,
    };
    let end = body.find("```")?;
    Some(body[..end].trim().to_string())
}

fn balanced_json_from(content: &str, start: usize) -> Option<&str> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in content[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(ch) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(&content[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
