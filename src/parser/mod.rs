//! Task list parser.
//!
//! Splits a markdown task list into ordered task sections and materializes
//! each one as an isolated artifact under `tasks/`.
//!
//! # Splitting rule
//!
//! Each heading at the *task level* starts a task. Its body is everything up
//! to the next heading of equal or higher level; deeper headings stay in the
//! body verbatim. The task level is chosen as follows:
//!
//! 1. If any heading uses the `Task N:` convention, the shallowest such
//!    heading level.
//! 2. Otherwise, if the shallowest level holds a single heading that opens the
//!    document and deeper headings exist, that single heading is the document
//!    title and the next level present is the task level.
//! 3. Otherwise, the shallowest level present.
//!
//! Content before the first task heading is preamble and belongs to no task.
//!
//! ```text
//! # Sprint tasks            <- document title (rule 2)
//!
//! ## Task 1: Set up CI      <- task 001_set_up_ci
//! ### Notes                 <- part of task 1's body
//!
//! ## Task 2: Write docs     <- task 002_write_docs
//! ```

mod heading;
mod materialize;

#[cfg(test)]
mod tests;

use crate::context::RunContext;
use crate::error::{Result, RunnerError};
use crate::task::TaskUnit;
use heading::LineKind;
use std::path::Path;

pub use materialize::materialize;

/// Longest slug kept in a task id.
const MAX_SLUG_LEN: usize = 48;

/// One task section as found in the document, before materialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSection {
    /// 1-based position among task sections.
    pub ordinal: usize,
    /// Heading text with any `Task N:` prefix removed.
    pub title: String,
    /// Section content between this heading and the next one at the same or
    /// a higher level, without surrounding blank lines.
    pub body: String,
    /// 1-based line number of the heading.
    pub line: usize,
}

impl TaskSection {
    /// Stable identifier derived from the section position and title.
    pub fn id(&self) -> String {
        format!("{:03}_{}", self.ordinal, slugify(&self.title))
    }
}

/// A heading found outside code fences.
#[derive(Debug, Clone, Copy)]
struct HeadingLine<'a> {
    index: usize,
    level: usize,
    text: &'a str,
}

/// Read, parse, and materialize a task list file.
///
/// Nothing is written unless the whole document parses.
pub fn parse_task_list(path: &Path, ctx: &RunContext) -> Result<Vec<TaskUnit>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        RunnerError::UserError(format!(
            "failed to read task list '{}': {}",
            path.display(),
            e
        ))
    })?;

    let sections = parse_document(&content)?;
    materialize(&sections, ctx)
}

/// Split a markdown document into task sections.
///
/// Pure and deterministic: the same text always yields the same sections.
pub fn parse_document(text: &str) -> Result<Vec<TaskSection>> {
    let lines: Vec<&str> = text.lines().collect();
    let (headings, glued) = scan(&lines)?;

    if headings.is_empty() {
        return Err(RunnerError::EmptyTaskList);
    }

    let task_level = task_level(&headings);

    if let Some(&(index, _)) = glued.iter().find(|(_, level)| *level <= task_level) {
        return Err(parse_error(
            &lines,
            index,
            "missing space after heading marker",
        ));
    }

    let mut sections = Vec::new();
    for (pos, heading) in headings.iter().enumerate() {
        if heading.level != task_level {
            continue;
        }
        if heading.text.is_empty() {
            return Err(parse_error(&lines, heading.index, "task heading has no title"));
        }

        let end = headings[pos + 1..]
            .iter()
            .find(|next| next.level <= task_level)
            .map(|next| next.index)
            .unwrap_or(lines.len());

        sections.push(TaskSection {
            ordinal: sections.len() + 1,
            title: heading::strip_task_prefix(heading.text).to_string(),
            body: section_body(&lines[heading.index + 1..end]),
            line: heading.index + 1,
        });
    }

    if sections.is_empty() {
        return Err(RunnerError::EmptyTaskList);
    }

    Ok(sections)
}

/// Collect headings and glued `#` markers outside fenced code blocks.
fn scan<'a>(lines: &[&'a str]) -> Result<(Vec<HeadingLine<'a>>, Vec<(usize, usize)>)> {
    let mut headings = Vec::new();
    let mut glued = Vec::new();
    let mut open_fence: Option<(usize, char, usize)> = None;

    for (index, line) in lines.iter().enumerate() {
        let kind = heading::classify(line);

        if let Some((_, marker, len)) = open_fence {
            if let LineKind::Fence {
                marker: m,
                len: l,
                rest,
            } = kind
                && m == marker
                && l >= len
                && rest.trim().is_empty()
            {
                open_fence = None;
            }
            continue;
        }

        match kind {
            LineKind::Fence { marker, len, .. } => open_fence = Some((index, marker, len)),
            LineKind::Heading { level, text } => headings.push(HeadingLine { index, level, text }),
            LineKind::MissingSpace { level } => glued.push((index, level)),
            LineKind::Text => {}
        }
    }

    if let Some((index, _, _)) = open_fence {
        return Err(parse_error(lines, index, "code fence is never closed"));
    }

    Ok((headings, glued))
}

fn task_level(headings: &[HeadingLine<'_>]) -> usize {
    if let Some(level) = headings
        .iter()
        .filter(|h| heading::has_task_prefix(h.text))
        .map(|h| h.level)
        .min()
    {
        return level;
    }

    let top = headings.iter().map(|h| h.level).min().unwrap_or(1);
    let at_top = headings.iter().filter(|h| h.level == top).count();
    let next = headings.iter().map(|h| h.level).filter(|&l| l > top).min();

    match next {
        Some(next) if at_top == 1 && headings[0].level == top => next,
        _ => top,
    }
}

fn section_body(lines: &[&str]) -> String {
    let is_blank = |l: &&str| l.trim().is_empty();
    let start = lines.iter().position(|l| !is_blank(l)).unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|l| !is_blank(l))
        .map(|i| i + 1)
        .unwrap_or(start);
    lines[start..end.max(start)].join("\n")
}

fn parse_error(lines: &[&str], index: usize, reason: &str) -> RunnerError {
    RunnerError::ParseError {
        line: index + 1,
        context: lines.get(index).copied().unwrap_or_default().to_string(),
        reason: reason.to_string(),
    }
}

/// Lowercase ASCII slug: alphanumerics kept, every other run becomes `_`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_sep = false;

    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }

    slug.truncate(MAX_SLUG_LEN);
    let slug = slug.trim_end_matches('_').to_string();
    if slug.is_empty() {
        "task".to_string()
    } else {
        slug
    }
}
