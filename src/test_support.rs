use crate::config::AgentConfig;
use crate::context::RunContext;
use crate::supervisor::SupervisorSettings;
use crate::task::TaskUnit;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard};
use std::time::Duration;
use tempfile::TempDir;

static CWD_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub(crate) struct DirGuard {
    original: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl DirGuard {
    pub(crate) fn new(new_dir: &Path) -> Self {
        // Changing the process current working directory is global and not thread-safe.
        // Lock it so tests don't race even if a #[serial] annotation is missed.
        let lock = CWD_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(new_dir).unwrap();
        Self {
            original,
            _lock: lock,
        }
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}

/// Scratch base directory with its layout created.
pub(crate) fn test_ctx() -> (TempDir, RunContext) {
    let temp = TempDir::new().unwrap();
    let ctx = RunContext::at(temp.path().join(".isotask"));
    ctx.ensure_layout().unwrap();
    (temp, ctx)
}

/// Supervisor settings that run each task artifact as a `sh` script.
///
/// The artifact starts with `# {title}`, which the shell reads as a comment,
/// so a task body is simply the script to run.
pub(crate) fn sh_settings(timeout: Duration) -> SupervisorSettings {
    SupervisorSettings {
        timeout,
        poll_interval: Duration::from_millis(10),
        kill_grace: Duration::from_millis(200),
        reap_timeout: Duration::from_secs(2),
        agent: AgentConfig {
            command: "sh {task_file}".to_string(),
            stdin: false,
            ..Default::default()
        },
    }
}

/// Materialize a single task whose body is a shell script, already in its
/// first attempt.
pub(crate) fn script_task(ctx: &RunContext, ordinal: usize, title: &str, script: &str) -> TaskUnit {
    let id = format!("{:03}_{}", ordinal, crate::parser::slugify(title));
    let path = ctx.task_file(&id);
    std::fs::write(&path, format!("# {}\n\n{}\n", title, script)).unwrap();

    let mut task = TaskUnit::new(id, ordinal, title, script, path);
    task.attempt = 1;
    task
}

/// Markdown task list with one `## Task N: title` section per entry.
pub(crate) fn task_list(sections: &[(&str, &str)]) -> String {
    let mut doc = String::from("# Tasks\n\n");
    for (i, (title, body)) in sections.iter().enumerate() {
        doc.push_str(&format!("## Task {}: {}\n{}\n\n", i + 1, title, body));
    }
    doc
}

#[cfg(unix)]
pub(crate) fn pid_alive(pid: i32) -> bool {
    unsafe { libc::kill(pid, 0) == 0 }
}

/// Read a pid a test script wrote with `echo $! > file`.
pub(crate) fn read_pid(path: &Path) -> i32 {
    std::fs::read_to_string(path)
        .unwrap()
        .trim()
        .parse()
        .unwrap()
}
