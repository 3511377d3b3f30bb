//! Line classification for task-list markdown.
//!
//! Only ATX headings are recognized. Setext headings (`Title\n=====`) are
//! treated as text.

use regex::Regex;
use std::sync::LazyLock;

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(#{1,6})(?:[ \t]+(.*?))?[ \t]*$").unwrap());

static CLOSING_HASHES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+#+$").unwrap());

static MISSING_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(#{1,6})[^#\s]").unwrap());

static FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^ {0,3}(`{3,}|~{3,})").unwrap());

static TASK_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^task[ \t]+(\d+)[ \t]*[:.)\-][ \t]*").unwrap());

/// What a single line of the document is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum LineKind<'a> {
    /// `#`..`######` followed by whitespace (or nothing).
    Heading { level: usize, text: &'a str },
    /// A `#` run glued to text, e.g. `##Task 1`.
    MissingSpace { level: usize },
    /// Opening or closing code fence.
    Fence { marker: char, len: usize, rest: &'a str },
    Text,
}

pub(super) fn classify(line: &str) -> LineKind<'_> {
    if let Some(caps) = FENCE.captures(line) {
        let run = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let marker = run.chars().next().unwrap_or('`');
        let rest = &line[caps.get(0).map(|m| m.end()).unwrap_or(0)..];
        return LineKind::Fence {
            marker,
            len: run.len(),
            rest,
        };
    }

    if let Some(caps) = HEADING.captures(line) {
        let level = caps.get(1).map(|m| m.len()).unwrap_or(1);
        let raw = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let text = match CLOSING_HASHES.find(raw) {
            Some(m) => &raw[..m.start()],
            // A heading made only of closing hashes, e.g. `## ##`.
            None if raw.chars().all(|c| c == '#') => "",
            None => raw,
        };
        return LineKind::Heading {
            level,
            text: text.trim(),
        };
    }

    if let Some(caps) = MISSING_SPACE.captures(line) {
        let level = caps.get(1).map(|m| m.len()).unwrap_or(1);
        return LineKind::MissingSpace { level };
    }

    LineKind::Text
}

/// Whether `text` uses the `Task N:` naming convention.
pub(super) fn has_task_prefix(text: &str) -> bool {
    TASK_PREFIX.is_match(text)
}

/// Strip a leading `Task N:` (or `Task N.` / `Task N -`) from a heading.
pub(super) fn strip_task_prefix(text: &str) -> &str {
    match TASK_PREFIX.find(text) {
        Some(m) if m.end() < text.len() => text[m.end()..].trim(),
        _ => text.trim(),
    }
}
