use crate::finding::LineRange;
use serde::{Deserialize, Serialize};

/// Line terminator used when a buffer is turned back into text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }

    /// Detect from the first terminator in `text`.
    pub fn detect(text: &str) -> Self {
        match text.find('\n') {
            Some(idx) if idx > 0 && text.as_bytes()[idx - 1] == b'\r' => LineEnding::CrLf,
            _ => LineEnding::Lf,
        }
    }
}

/// The line-oriented in-memory form of an artifact.
///
/// Lines are stored without terminators. The buffer remembers its terminator style and whether
/// the text ended with one, so an untouched buffer turns back into the same text. Mixed line
/// endings are normalized to the style of the first line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBuffer {
    lines: Vec<String>,
    ending: LineEnding,
    trailing_newline: bool,
}

impl SourceBuffer {
    pub fn from_text(text: &str) -> Self {
        let ending = LineEnding::detect(text);
        let trailing_newline = text.ends_with('\n');
        Self {
            lines: split_lines(text),
            ending,
            trailing_newline,
        }
    }

    pub fn from_lines(lines: Vec<String>) -> Self {
        Self {
            lines,
            ending: LineEnding::Lf,
            trailing_newline: true,
        }
    }

    /// A new buffer with the same text format but different lines.
    pub fn with_lines(&self, lines: Vec<String>) -> Self {
        Self {
            lines,
            ending: self.ending,
            trailing_newline: self.trailing_newline,
        }
    }

    pub fn to_text(&self) -> String {
        let sep = self.ending.as_str();
        let mut out = self.lines.join(sep);
        if self.trailing_newline && !self.lines.is_empty() {
            out.push_str(sep);
        }
        out
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// 1-based line access.
    pub fn line(&self, number: usize) -> Option<&str> {
        number
            .checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .map(String::as_str)
    }

    /// Lines covered by `range`, or `None` when the range does not fit the buffer.
    pub fn slice(&self, range: LineRange) -> Option<&[String]> {
        if range.start == 0 || range.end < range.start || range.end > self.lines.len() {
            return None;
        }
        Some(&self.lines[range.to_index_range()])
    }

    pub fn ending(&self) -> LineEnding {
        self.ending
    }

    pub fn trailing_newline(&self) -> bool {
        self.trailing_newline
    }
}

/// Split text into lines without terminators.
///
/// A single trailing terminator does not produce an extra empty line; `""` yields no lines.
pub fn split_lines(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let body = text.strip_suffix('\n').unwrap_or(text);
    body.split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
        .collect()
}
