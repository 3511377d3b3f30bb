//! Tests for the process supervisor.
//!
//! Agents are simulated with `sh` scripts; see `test_support::sh_settings`.

use super::*;
use crate::test_support::{read_pid, script_task, sh_settings, test_ctx};
use serial_test::serial;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

fn supervisor(ctx: &RunContext, timeout: Duration) -> Supervisor {
    Supervisor::new(ctx.clone(), sh_settings(timeout))
}

#[test]
fn successful_agent_completes_with_output() {
    let (_temp, ctx) = test_ctx();
    let task = script_task(
        &ctx,
        1,
        "Greet",
        "echo hello\necho \"id=$ISOTASK_TASK_ID attempt=$ISOTASK_ATTEMPT\"",
    );

    let exec = supervisor(&ctx, Duration::from_secs(10)).execute(&task, &CancelToken::new());

    assert_eq!(exec.state, TaskState::Completed);
    assert_eq!(exec.summary.exit_code, Some(0));
    assert_eq!(exec.summary.outcome, ExitOutcome::Exited);
    assert!(exec.summary.clean_termination);
    assert_eq!(exec.summary.stdout, "hello\nid=001_greet attempt=1\n");
    assert!(exec.ended_at >= exec.started_at);
    assert_eq!(
        std::fs::read_to_string(ctx.result_file(&task.id)).unwrap(),
        exec.summary.stdout
    );
}

#[test]
fn agent_runs_in_fresh_work_dir() {
    let (_temp, ctx) = test_ctx();
    let task = script_task(&ctx, 1, "Scratch", "ls\ntouch leftover\npwd");
    let sup = supervisor(&ctx, Duration::from_secs(10));

    let first = sup.execute(&task, &CancelToken::new());
    let second = sup.execute(&task, &CancelToken::new());

    let work_dir = ctx.task_work_dir(&task.id).canonicalize().unwrap();
    for exec in [&first, &second] {
        assert_eq!(exec.state, TaskState::Completed);
        // `ls` sees an empty directory every time.
        let pwd = exec.summary.stdout.trim();
        assert_eq!(std::path::Path::new(pwd).canonicalize().unwrap(), work_dir);
    }
}

#[test]
fn base_dir_with_spaces_and_quoted_title() {
    let temp = tempfile::TempDir::new().unwrap();
    let ctx = RunContext::at(temp.path().join("my runs").join(".isotask"));
    ctx.ensure_layout().unwrap();
    let task = script_task(&ctx, 1, "Check the user's input", "echo ok");
    let mut settings = sh_settings(Duration::from_secs(10));
    settings.agent.command = "sh {task_file} {title}".to_string();

    let exec = Supervisor::new(ctx.clone(), settings).execute(&task, &CancelToken::new());

    assert_eq!(exec.state, TaskState::Completed);
    assert_eq!(exec.summary.stdout, "ok\n");
}

#[test]
fn nonzero_exit_fails_with_stderr() {
    let (_temp, ctx) = test_ctx();
    let task = script_task(&ctx, 2, "Break", "echo partial\necho boom >&2\nexit 3");

    let exec = supervisor(&ctx, Duration::from_secs(10)).execute(&task, &CancelToken::new());

    assert_eq!(exec.state, TaskState::Failed);
    assert_eq!(exec.summary.exit_code, Some(3));
    assert_eq!(exec.summary.outcome, ExitOutcome::Exited);
    assert_eq!(exec.summary.stdout, "partial\n");
    assert_eq!(exec.summary.stderr, "boom\n");
    assert!(exec.summary.error.is_none());
    assert_eq!(
        std::fs::read_to_string(ctx.error_file(&task.id)).unwrap(),
        "boom\n"
    );
}

#[test]
fn task_artifact_is_fed_on_stdin() {
    let (_temp, ctx) = test_ctx();
    let task = script_task(&ctx, 1, "Echo", "do the thing");
    let mut settings = sh_settings(Duration::from_secs(10));
    settings.agent.command = "cat".to_string();
    settings.agent.stdin = true;

    let exec = Supervisor::new(ctx.clone(), settings).execute(&task, &CancelToken::new());

    assert_eq!(exec.state, TaskState::Completed);
    assert_eq!(exec.summary.stdout, "# Echo\n\ndo the thing\n");
}

#[test]
fn agent_environment_is_applied() {
    let (_temp, ctx) = test_ctx();
    let task = script_task(&ctx, 1, "Env", "echo \"$AGENT_MODE\"");
    let mut settings = sh_settings(Duration::from_secs(10));
    settings.agent.environment = BTreeMap::from([("AGENT_MODE".to_string(), "batch".to_string())]);

    let exec = Supervisor::new(ctx.clone(), settings).execute(&task, &CancelToken::new());

    assert_eq!(exec.summary.stdout, "batch\n");
}

#[test]
#[serial]
fn timeout_kills_agent_within_bound() {
    let (_temp, ctx) = test_ctx();
    let task = script_task(&ctx, 1, "Slow", "echo started\nsleep 10");

    let start = Instant::now();
    let exec = supervisor(&ctx, Duration::from_secs(1)).execute(&task, &CancelToken::new());
    let elapsed = start.elapsed();

    assert_eq!(exec.state, TaskState::TimedOut);
    assert_eq!(exec.summary.outcome, ExitOutcome::TimedOut);
    assert!(exec.summary.clean_termination);
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(3), "took {:?}", elapsed);
    assert_eq!(
        exec.summary.error.as_deref(),
        Some("TASK TIMED OUT AFTER 1 SECONDS")
    );
    assert_eq!(
        std::fs::read_to_string(ctx.result_file(&task.id)).unwrap(),
        "started\nTASK TIMED OUT AFTER 1 SECONDS\n"
    );
}

#[cfg(unix)]
#[test]
#[serial]
fn timeout_leaves_no_descendants() {
    let (_temp, ctx) = test_ctx();
    let task = script_task(
        &ctx,
        1,
        "Forks",
        "sleep 30 &\necho $! > child.pid\nsh -c 'sleep 30' &\necho $! > grandchild.pid\nsleep 30",
    );

    let exec = supervisor(&ctx, Duration::from_secs(1)).execute(&task, &CancelToken::new());

    assert_eq!(exec.state, TaskState::TimedOut);
    let work_dir = ctx.task_work_dir(&task.id);
    for file in ["child.pid", "grandchild.pid"] {
        let pid = read_pid(&work_dir.join(file));
        assert!(
            !crate::test_support::pid_alive(pid),
            "process {} from {} survived",
            pid,
            file
        );
    }
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn timeout_kills_descendant_in_new_session() {
    let (_temp, ctx) = test_ctx();
    let task = script_task(
        &ctx,
        1,
        "Detaches",
        "setsid sleep 30 &\necho $! > detached.pid\nsleep 10",
    );

    let start = Instant::now();
    let exec = supervisor(&ctx, Duration::from_secs(1)).execute(&task, &CancelToken::new());

    assert_eq!(exec.state, TaskState::TimedOut);
    assert!(exec.summary.clean_termination);
    assert!(start.elapsed() < Duration::from_secs(5));
    let pid = read_pid(&ctx.task_work_dir(&task.id).join("detached.pid"));
    assert!(!crate::test_support::pid_alive(pid), "detached process {} survived", pid);
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn descendant_in_new_session_is_killed_after_normal_exit() {
    let (_temp, ctx) = test_ctx();
    let task = script_task(
        &ctx,
        1,
        "Detaches then exits",
        "setsid sleep 30 &\necho $! > detached.pid\nsleep 0.3\necho done",
    );

    let exec = supervisor(&ctx, Duration::from_secs(10)).execute(&task, &CancelToken::new());

    assert_eq!(exec.state, TaskState::Completed);
    assert!(exec.summary.clean_termination);
    let pid = read_pid(&ctx.task_work_dir(&task.id).join("detached.pid"));
    assert!(!crate::test_support::pid_alive(pid), "detached process {} survived", pid);
}

#[cfg(unix)]
#[test]
#[serial]
fn helpers_are_killed_after_normal_exit() {
    let (_temp, ctx) = test_ctx();
    let task = script_task(&ctx, 1, "Leaky", "sleep 30 &\necho $! > helper.pid\necho done");

    let start = Instant::now();
    let exec = supervisor(&ctx, Duration::from_secs(10)).execute(&task, &CancelToken::new());

    assert_eq!(exec.state, TaskState::Completed);
    assert!(exec.summary.clean_termination);
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(exec.summary.stdout.starts_with("done"));

    let pid = read_pid(&ctx.task_work_dir(&task.id).join("helper.pid"));
    assert!(!crate::test_support::pid_alive(pid));
}

#[cfg(unix)]
#[test]
#[serial]
fn sigterm_resistant_agent_is_killed() {
    let (_temp, ctx) = test_ctx();
    let task = script_task(&ctx, 1, "Stubborn", "trap '' TERM\nsleep 10");

    let start = Instant::now();
    let exec = supervisor(&ctx, Duration::from_secs(1)).execute(&task, &CancelToken::new());

    assert_eq!(exec.state, TaskState::TimedOut);
    assert!(exec.summary.clean_termination);
    assert!(exec.summary.exit_code.is_none());
    assert!(start.elapsed() < Duration::from_secs(3));
}

#[test]
#[serial]
fn cancellation_stops_agent() {
    let (_temp, ctx) = test_ctx();
    let task = script_task(&ctx, 1, "Long", "sleep 10");
    let cancel = CancelToken::new();

    let trigger = cancel.clone();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(300));
        trigger.cancel();
    });

    let start = Instant::now();
    let exec = supervisor(&ctx, Duration::from_secs(30)).execute(&task, &cancel);
    canceller.join().unwrap();

    assert_eq!(exec.state, TaskState::Failed);
    assert_eq!(exec.summary.outcome, ExitOutcome::Cancelled);
    assert_eq!(exec.summary.error.as_deref(), Some(CANCELLED_MARKER));
    assert!(exec.summary.stdout.ends_with("TASK CANCELLED\n"));
    assert!(start.elapsed() < Duration::from_secs(3));
}

#[test]
fn missing_program_is_spawn_failure() {
    let (_temp, ctx) = test_ctx();
    let task = script_task(&ctx, 1, "Nope", "true");
    let mut settings = sh_settings(Duration::from_secs(10));
    settings.agent.command = "isotask-no-such-agent-binary {task_file}".to_string();

    let exec = Supervisor::new(ctx.clone(), settings).execute(&task, &CancelToken::new());

    assert_eq!(exec.state, TaskState::Failed);
    assert!(exec.is_spawn_failure());
    assert!(exec.summary.exit_code.is_none());
    let error = exec.summary.error.as_deref().unwrap();
    assert!(error.contains("failed to spawn agent 'isotask-no-such-agent-binary'"));
    assert!(
        std::fs::read_to_string(ctx.error_file(&task.id))
            .unwrap()
            .contains("failed to spawn agent")
    );
}

#[test]
fn bad_command_template_is_spawn_failure() {
    let (_temp, ctx) = test_ctx();
    let task = script_task(&ctx, 1, "Typo", "true");
    let mut settings = sh_settings(Duration::from_secs(10));
    settings.agent.command = "sh {task_fiel}".to_string();

    let exec = Supervisor::new(ctx.clone(), settings).execute(&task, &CancelToken::new());

    assert!(exec.is_spawn_failure());
    assert!(
        exec.summary
            .error
            .as_deref()
            .unwrap()
            .contains("undefined variable 'task_fiel'")
    );
}

#[test]
fn missing_artifact_is_supervisor_error() {
    let (_temp, ctx) = test_ctx();
    let mut task = script_task(&ctx, 1, "Gone", "true");
    task.source_path = ctx.tasks_dir.join("missing.md");
    let mut settings = sh_settings(Duration::from_secs(10));
    settings.agent.stdin = true;

    let exec = Supervisor::new(ctx.clone(), settings).execute(&task, &CancelToken::new());

    assert_eq!(exec.state, TaskState::Failed);
    assert_eq!(exec.summary.outcome, ExitOutcome::SupervisorError);
    assert!(!exec.is_spawn_failure());
}

#[test]
fn settings_follow_config() {
    let mut config = Config::default();
    config.timeout_seconds = 12;
    config.supervisor.kill_grace_ms = 300;

    let settings = SupervisorSettings::from_config(&config);

    assert_eq!(settings.timeout, Duration::from_secs(12));
    assert_eq!(settings.kill_grace, Duration::from_millis(300));
    assert_eq!(settings.poll_interval, Duration::from_millis(50));
    assert_eq!(settings.agent.command, "claude --print");
}

#[test]
fn timeout_marker_formats_seconds() {
    assert_eq!(
        timeout_marker(Duration::from_secs(300)),
        "TASK TIMED OUT AFTER 300 SECONDS"
    );
    assert_eq!(
        timeout_marker(Duration::from_millis(1500)),
        "TASK TIMED OUT AFTER 1.5 SECONDS"
    );
}
