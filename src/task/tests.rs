//! Tests for the task model and lifecycle table.

use super::*;

#[test]
fn only_forward_transitions_are_legal() {
    use TaskState::*;

    assert!(Pending.can_transition_to(Running));
    assert!(Running.can_transition_to(Completed));
    assert!(Running.can_transition_to(Failed));
    assert!(Running.can_transition_to(TimedOut));

    assert!(!Pending.can_transition_to(Completed));
    assert!(!Pending.can_transition_to(Pending));
    assert!(!Running.can_transition_to(Pending));
    assert!(!Running.can_transition_to(Running));
    for terminal in [Completed, Failed, TimedOut] {
        for next in ALL_STATES {
            assert!(
                !terminal.can_transition_to(*next),
                "{} -> {} must be rejected",
                terminal,
                next
            );
        }
    }
}

#[test]
fn terminal_states() {
    assert!(!TaskState::Pending.is_terminal());
    assert!(!TaskState::Running.is_terminal());
    assert!(TaskState::Completed.is_terminal());
    assert!(TaskState::Failed.is_terminal());
    assert!(TaskState::TimedOut.is_terminal());
}

#[test]
fn state_serializes_snake_case() {
    let json = serde_json::to_string(&TaskState::TimedOut).unwrap();
    assert_eq!(json, "\"timed_out\"");
    let back: TaskState = serde_json::from_str("\"completed\"").unwrap();
    assert_eq!(back, TaskState::Completed);
}

#[test]
fn new_unit_is_pending_with_no_attempts() {
    let unit = TaskUnit::new("001_setup", 1, "Setup", "Do it.", "/tmp/001_setup.md");
    assert_eq!(unit.state, TaskState::Pending);
    assert_eq!(unit.attempt, 0);
    assert!(unit.started_at.is_none());
    assert!(unit.exit_summary.is_none());
    assert!(unit.duration().is_none());
}

#[test]
fn preview_prefers_error_marker() {
    let summary = ExitSummary {
        exit_code: None,
        stdout: "partial output".to_string(),
        error: Some("TASK CANCELLED".to_string()),
        outcome: ExitOutcome::Cancelled,
        ..Default::default()
    };
    assert_eq!(summary.preview(100), "TASK CANCELLED");
}

#[test]
fn preview_uses_stderr_for_failures() {
    let summary = ExitSummary {
        exit_code: Some(2),
        stdout: "some stdout".to_string(),
        stderr: "boom\n  failed hard\n".to_string(),
        ..Default::default()
    };
    assert_eq!(summary.preview(100), "boom failed hard");
}

#[test]
fn preview_keeps_tail_when_truncating() {
    let summary = ExitSummary {
        exit_code: Some(0),
        stdout: "abcdefghijklmnopqrstuvwxyz".to_string(),
        ..Default::default()
    };
    let preview = summary.preview(10);
    assert_eq!(preview.chars().count(), 10);
    assert!(preview.starts_with("..."));
    assert!(preview.ends_with("tuvwxyz"));
}

#[test]
fn exit_summary_round_trips_through_json() {
    let summary = ExitSummary {
        exit_code: Some(1),
        stdout: "out".to_string(),
        stderr: "err".to_string(),
        duration_ms: 1200,
        outcome: ExitOutcome::Exited,
        clean_termination: true,
        error: None,
    };
    let json = serde_json::to_string(&summary).unwrap();
    let back: ExitSummary = serde_json::from_str(&json).unwrap();
    assert_eq!(back, summary);
}
