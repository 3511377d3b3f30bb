//! Tests for task list parsing and materialization.

use super::*;
use crate::error::RunnerError;
use std::fs;
use tempfile::TempDir;

const TASK_LIST: &str = r#"# Test Tasks

Intro paragraph that belongs to no task.

## Task 1: First Task
This is the first task.

### Details
Nested heading stays in the body.

## Task 2: Second Task
This is the second task.

```bash
## not a heading inside a fence
echo hi
```

## Task 3: Third Task
Alpha bravo charlie.
"#;

#[test]
fn splits_task_prefixed_sections() {
    let sections = parse_document(TASK_LIST).unwrap();

    assert_eq!(sections.len(), 3);
    assert_eq!(sections[0].title, "First Task");
    assert_eq!(sections[1].title, "Second Task");
    assert_eq!(sections[2].title, "Third Task");
    assert_eq!(sections[0].id(), "001_first_task");
    assert_eq!(sections[2].id(), "003_third_task");
    assert_eq!(sections[0].line, 5);
}

#[test]
fn nested_headings_stay_in_body() {
    let sections = parse_document(TASK_LIST).unwrap();
    assert_eq!(
        sections[0].body,
        "This is the first task.\n\n### Details\nNested heading stays in the body."
    );
}

#[test]
fn headings_inside_fences_are_ignored() {
    let sections = parse_document(TASK_LIST).unwrap();
    assert!(sections[1].body.contains("## not a heading inside a fence"));
    assert!(sections[1].body.ends_with("```"));
}

#[test]
fn preamble_is_not_part_of_any_task() {
    let sections = parse_document(TASK_LIST).unwrap();
    for section in &sections {
        assert!(!section.body.contains("Intro paragraph"));
    }
}

#[test]
fn parsing_is_deterministic() {
    let first = parse_document(TASK_LIST).unwrap();
    let second = parse_document(TASK_LIST).unwrap();
    assert_eq!(first, second);
    let ids: Vec<_> = first.iter().map(|s| s.id()).collect();
    let ids_again: Vec<_> = second.iter().map(|s| s.id()).collect();
    assert_eq!(ids, ids_again);
}

#[test]
fn top_level_headings_without_title_rule() {
    let doc = "# Alpha\nDo alpha.\n\n# Beta\nDo beta.\n## Beta notes\nmore\n";
    let sections = parse_document(doc).unwrap();
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0].title, "Alpha");
    assert_eq!(sections[1].body, "Do beta.\n## Beta notes\nmore");
}

#[test]
fn single_top_heading_with_subsections_is_document_title() {
    let doc = "# Backlog\n\n## Fix login\nSteps.\n\n## Update docs\nWrite.\n";
    let sections = parse_document(doc).unwrap();
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0].title, "Fix login");
    assert_eq!(sections[1].title, "Update docs");
}

#[test]
fn single_top_heading_over_one_subsection_is_document_title() {
    let doc = "# Fix bug\nReproduce first.\n## Steps\n1. run it\n";
    let sections = parse_document(doc).unwrap();
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].title, "Steps");
    assert_eq!(sections[0].body, "1. run it");
}

#[test]
fn single_heading_document_is_one_task() {
    let doc = "# Fix bug\nReproduce first.\n";
    let sections = parse_document(doc).unwrap();
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].title, "Fix bug");
    assert_eq!(sections[0].body, "Reproduce first.");
}

#[test]
fn empty_heading_under_document_title_is_parse_error() {
    match parse_document("# Tasks\n\n##\n") {
        Err(RunnerError::ParseError { line, context, .. }) => {
            assert_eq!(line, 3);
            assert_eq!(context, "##");
        }
        other => panic!("expected ParseError, got {:?}", other),
    }
}

#[test]
fn higher_level_heading_ends_task_body() {
    let doc = "## Task 1: One\nbody one\n# Appendix\nappendix text\n## Task 2: Two\nbody two\n";
    let sections = parse_document(doc).unwrap();
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0].body, "body one");
    assert_eq!(sections[1].body, "body two");
}

#[test]
fn crlf_line_endings_are_handled() {
    let doc = "# A\r\nfirst\r\n# B\r\nsecond\r\n";
    let sections = parse_document(doc).unwrap();
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0].body, "first");
}

#[test]
fn empty_document_is_empty_task_list() {
    assert!(matches!(parse_document(""), Err(RunnerError::EmptyTaskList)));
    assert!(matches!(
        parse_document("just some text\nno headings here\n"),
        Err(RunnerError::EmptyTaskList)
    ));
}

#[test]
fn fenced_only_headings_are_empty_task_list() {
    let doc = "```\n# inside\n```\n";
    assert!(matches!(parse_document(doc), Err(RunnerError::EmptyTaskList)));
}

#[test]
fn empty_task_heading_is_parse_error() {
    let doc = "## Task 1: Fine\nbody\n##\nmore\n";
    match parse_document(doc) {
        Err(RunnerError::ParseError { line, context, .. }) => {
            assert_eq!(line, 3);
            assert_eq!(context, "##");
        }
        other => panic!("expected ParseError, got {:?}", other),
    }
}

#[test]
fn glued_heading_marker_is_parse_error() {
    let doc = "## Task 1: Fine\nbody\n##Task 2: Broken\nbody\n";
    match parse_document(doc) {
        Err(RunnerError::ParseError { line, reason, .. }) => {
            assert_eq!(line, 3);
            assert!(reason.contains("missing space"));
        }
        other => panic!("expected ParseError, got {:?}", other),
    }
}

#[test]
fn glued_marker_above_task_level_is_parse_error() {
    let doc = "#Project\n\n## Task 1: A\nx\n\n## Task 2: B\ny\n";
    match parse_document(doc) {
        Err(RunnerError::ParseError { line, context, .. }) => {
            assert_eq!(line, 1);
            assert_eq!(context, "#Project");
        }
        other => panic!("expected ParseError, got {:?}", other),
    }
}

#[test]
fn hashtags_below_task_level_are_allowed() {
    let doc = "# Task 1: Tagging\nUse #rust and #cli tags.\n##cli\n";
    let sections = parse_document(doc).unwrap();
    assert_eq!(sections.len(), 1);
    assert!(sections[0].body.ends_with("##cli"));
}

#[test]
fn unterminated_fence_is_parse_error() {
    let doc = "# Task\n```\nnever closed\n";
    match parse_document(doc) {
        Err(RunnerError::ParseError { line, reason, .. }) => {
            assert_eq!(line, 2);
            assert!(reason.contains("never closed"));
        }
        other => panic!("expected ParseError, got {:?}", other),
    }
}

#[test]
fn slugify_normalizes_titles() {
    assert_eq!(slugify("First Task"), "first_task");
    assert_eq!(slugify("  Fix: the `parser` (again)!  "), "fix_the_parser_again");
    assert_eq!(slugify("Ünïcode only ✓"), "n_code_only");
    assert_eq!(slugify("???"), "task");
    assert!(slugify(&"x".repeat(200)).len() <= MAX_SLUG_LEN);
}

#[test]
fn materialize_writes_isolated_read_only_artifacts() {
    let temp = TempDir::new().unwrap();
    let ctx = RunContext::at(temp.path());
    let sections = parse_document(TASK_LIST).unwrap();

    let units = materialize(&sections, &ctx).unwrap();

    assert_eq!(units.len(), 3);
    for unit in &units {
        assert_eq!(unit.source_path, ctx.task_file(&unit.id));
        let content = fs::read_to_string(&unit.source_path).unwrap();
        assert!(content.starts_with(&format!("# {}\n", unit.title)));
        assert!(content.contains(&unit.body));
        assert!(
            fs::metadata(&unit.source_path)
                .unwrap()
                .permissions()
                .readonly()
        );
    }
}

#[test]
fn artifacts_contain_no_other_task_content() {
    let temp = TempDir::new().unwrap();
    let ctx = RunContext::at(temp.path());
    let units = materialize(&parse_document(TASK_LIST).unwrap(), &ctx).unwrap();

    for a in &units {
        let content = fs::read_to_string(&a.source_path).unwrap();
        for b in units.iter().filter(|b| b.id != a.id) {
            for line in b.body.lines().filter(|l| !l.trim().is_empty()) {
                let unique_to_b = units
                    .iter()
                    .filter(|u| u.id != b.id)
                    .all(|u| !u.body.contains(line));
                if unique_to_b {
                    assert!(
                        !content.contains(line),
                        "artifact {} leaks '{}' from {}",
                        a.id,
                        line,
                        b.id
                    );
                }
            }
        }
    }
}

#[test]
fn materialize_removes_stale_artifacts() {
    let temp = TempDir::new().unwrap();
    let ctx = RunContext::at(temp.path());
    materialize(&parse_document(TASK_LIST).unwrap(), &ctx).unwrap();

    let smaller = "# Only\nsingle task\n";
    let units = materialize(&parse_document(smaller).unwrap(), &ctx).unwrap();

    let files: Vec<_> = fs::read_dir(&ctx.tasks_dir).unwrap().flatten().collect();
    assert_eq!(units.len(), 1);
    assert_eq!(files.len(), 1);
}

#[test]
fn parse_task_list_reports_missing_file() {
    let temp = TempDir::new().unwrap();
    let ctx = RunContext::at(temp.path());
    let err = parse_task_list(&temp.path().join("missing.md"), &ctx).unwrap_err();
    assert!(err.to_string().contains("failed to read task list"));
}

#[test]
fn parse_failure_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let ctx = RunContext::at(temp.path().join("base"));
    let list = temp.path().join("tasks.md");
    fs::write(&list, "no headings at all\n").unwrap();

    let err = parse_task_list(&list, &ctx).unwrap_err();

    assert!(matches!(err, RunnerError::EmptyTaskList));
    assert!(!ctx.tasks_dir.exists());
}
